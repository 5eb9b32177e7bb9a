use std::sync::Arc;

use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};

use crate::{
    api::requests,
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    // Helper to build per-route limiter
    fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
        let per_ms = if requests_per_min == 0 {
            1
        } else {
            60_000 / requests_per_min as u64
        };
        let cfg = GovernorConfigBuilder::default()
            .per_millisecond(per_ms)
            .burst_size(requests_per_min)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .unwrap();
        Governor::new(&cfg)
    }

    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let register_limiter = Arc::new(build_limiter(config.rate_register_per_min));
    let refresh_limiter = Arc::new(build_limiter(config.rate_refresh_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/register")
                    .wrap(register_limiter.clone())
                    .route(web::post().to(handlers::register)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(refresh_limiter.clone())
                    .route(web::post().to(handlers::refresh_token)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(protected_limiter) // rate limiting
            .service(
                web::scope("/requests")
                    // /requests
                    .service(
                        web::resource("")
                            .route(web::get().to(requests::list_requests))
                            .route(web::post().to(requests::create_request)),
                    )
                    // /requests/assign
                    .service(
                        web::resource("/assign").route(web::post().to(requests::assign_request)),
                    )
                    // /requests/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(requests::get_request))
                            .route(web::put().to(requests::update_request))
                            .route(web::delete().to(requests::delete_request)),
                    )
                    // /requests/{id}/accept
                    .service(
                        web::resource("/{id}/accept")
                            .route(web::put().to(requests::accept_request)),
                    )
                    // /requests/{id}/reject
                    .service(
                        web::resource("/{id}/reject")
                            .route(web::put().to(requests::reject_request)),
                    )
                    // /requests/{id}/convert-to-sick
                    .service(
                        web::resource("/{id}/convert-to-sick")
                            .route(web::post().to(requests::convert_request)),
                    ),
            ),
    );
}
