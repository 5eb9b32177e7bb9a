use actix_web::{FromRequest, HttpRequest, dev::Payload, error::ErrorUnauthorized, web::Data};
use futures::future::{Ready, ready};
use jsonwebtoken::{DecodingKey, Validation, decode};

use crate::auth::jwt::Claims;
use crate::config::Config;
use crate::engine::Principal;
use crate::model::permission::PermissionSet;
use crate::model::role::Role;

/// Session identity extracted from the bearer token. The engine never sees
/// this directly; handlers hand it a `Principal`.
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,

    /// Present only if this user is linked to an employee record
    pub employee_id: Option<u64>,
    pub permissions: PermissionSet,
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let token = match req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
        {
            Some(t) => t,
            None => return ready(Err(ErrorUnauthorized("Missing token"))),
        };

        let config = match req.app_data::<Data<Config>>() {
            Some(c) => c,
            None => {
                return ready(Err(actix_web::error::ErrorInternalServerError(
                    "Config missing",
                )));
            }
        };

        let data = match decode::<Claims>(
            token,
            &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            &Validation::default(),
        ) {
            Ok(d) => d,
            Err(_) => return ready(Err(ErrorUnauthorized("Invalid token"))),
        };

        let role = match Role::from_id(data.claims.role) {
            Some(r) => r,
            None => return ready(Err(ErrorUnauthorized("Invalid role"))),
        };

        ready(Ok(AuthUser {
            user_id: data.claims.user_id,
            username: data.claims.sub,
            role,
            employee_id: data.claims.employee_id,
            permissions: data.claims.perms.into_iter().collect(),
        }))
    }
}

impl AuthUser {
    /// The explicit actor handed to every engine call.
    pub fn principal(&self) -> Principal {
        Principal {
            employee_id: self.employee_id,
            employee_name: self.username.clone(),
            role: self.role,
            permissions: self.permissions.clone(),
        }
    }

    /// Returns true if the user may act on other employees' requests
    pub fn is_reviewer(&self) -> bool {
        self.role.is_reviewer()
    }
}
