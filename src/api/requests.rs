use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::api::AppEngine;
use crate::auth::auth::AuthUser;
use crate::model::filter::FilterSignature;
use crate::model::request::{NewRequest, RequestDetail, RequestPage, RequestPatch, RequestRecord};

/// Self-service payload; the employee identity comes from the session, not
/// the body.
#[derive(Deserialize, ToSchema)]
pub struct CreateRequestDto {
    #[schema(example = "family trip")]
    pub description: String,
    #[serde(flatten)]
    pub detail: RequestDetail,
}

#[derive(Deserialize, ToSchema)]
pub struct RejectDto {
    #[schema(example = "insufficient notice")]
    pub comment: String,
}

/* =========================
Create request (employee self-service)
========================= */
#[utoipa::path(
    post,
    path = "/api/requests",
    request_body(
        content = CreateRequestDto,
        description = "Request payload; the kind tag selects which date fields apply",
        content_type = "application/json"
    ),
    responses(
        (status = 201, description = "Request submitted, status pending", body = RequestRecord),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No employee profile")
    ),
    security(("bearer_auth" = [])),
    tag = "Requests"
)]
pub async fn create_request(
    auth: AuthUser,
    engine: web::Data<AppEngine>,
    payload: web::Json<CreateRequestDto>,
) -> actix_web::Result<impl Responder> {
    let principal = auth.principal();
    let employee_id = principal
        .employee_id
        .ok_or_else(|| actix_web::error::ErrorForbidden("No employee profile"))?;

    let body = payload.into_inner();
    let new = NewRequest {
        employee_id,
        employee_name: principal.employee_name.clone(),
        description: body.description,
        detail: body.detail,
    };

    let record = engine.create(&principal, new).await?;
    Ok(HttpResponse::Created().json(record))
}

/* =========================
Assign request (manager, on behalf of an employee)
========================= */
#[utoipa::path(
    post,
    path = "/api/requests/assign",
    request_body(
        content = NewRequest,
        description = "Request recorded for the named employee; lands in assigned_manually",
        content_type = "application/json"
    ),
    responses(
        (status = 201, description = "Request recorded", body = RequestRecord),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Role or permission check failed")
    ),
    security(("bearer_auth" = [])),
    tag = "Requests"
)]
pub async fn assign_request(
    auth: AuthUser,
    engine: web::Data<AppEngine>,
    payload: web::Json<NewRequest>,
) -> actix_web::Result<impl Responder> {
    let record = engine
        .assign(&auth.principal(), payload.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(record))
}

/* =========================
List requests
========================= */
#[utoipa::path(
    get,
    path = "/api/requests",
    params(FilterSignature),
    responses(
        (status = 200, description = "Paginated request list", body = RequestPage),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Requests"
)]
pub async fn list_requests(
    auth: AuthUser,
    engine: web::Data<AppEngine>,
    query: web::Query<FilterSignature>,
) -> actix_web::Result<impl Responder> {
    let mut filter = query.into_inner();

    // Non-reviewers only ever see their own list.
    if !auth.is_reviewer() {
        let employee_id = auth
            .employee_id
            .ok_or_else(|| actix_web::error::ErrorForbidden("No employee profile"))?;
        filter.employee_id = Some(employee_id);
    }

    let page = engine.list(&filter).await?;
    Ok(HttpResponse::Ok().json(page))
}

/* =========================
Request detail
========================= */
#[utoipa::path(
    get,
    path = "/api/requests/{id}",
    params(("id" = u64, Path, description = "Request id")),
    responses(
        (status = 200, description = "Request found", body = RequestRecord),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Requests"
)]
pub async fn get_request(
    auth: AuthUser,
    engine: web::Data<AppEngine>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let record = engine.get(path.into_inner()).await?;

    if !auth.is_reviewer() && auth.employee_id != Some(record.employee_id) {
        return Err(actix_web::error::ErrorForbidden("Not your request"));
    }
    Ok(HttpResponse::Ok().json(record))
}

/* =========================
Update request
========================= */
/// Owner edit of a pending request, or manager correction of an accepted one.
#[utoipa::path(
    put,
    path = "/api/requests/{id}",
    params(("id" = u64, Path, description = "Request id")),
    request_body = RequestPatch,
    responses(
        (status = 200, description = "Request updated", body = RequestRecord),
        (status = 400, description = "Validation failed or status does not allow editing"),
        (status = 403, description = "Not the owner / missing permission"),
        (status = 404, description = "Request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Requests"
)]
pub async fn update_request(
    auth: AuthUser,
    engine: web::Data<AppEngine>,
    path: web::Path<u64>,
    payload: web::Json<RequestPatch>,
) -> actix_web::Result<impl Responder> {
    let record = engine
        .update(&auth.principal(), path.into_inner(), payload.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(record))
}

/* =========================
Accept request (reviewer)
========================= */
#[utoipa::path(
    put,
    path = "/api/requests/{id}/accept",
    params(("id" = u64, Path, description = "ID of the request to accept")),
    responses(
        (status = 200, description = "Request accepted", body = RequestRecord),
        (status = 400, description = "Not pending anymore"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Role or permission check failed"),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Request changed concurrently")
    ),
    security(("bearer_auth" = [])),
    tag = "Requests"
)]
pub async fn accept_request(
    auth: AuthUser,
    engine: web::Data<AppEngine>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let record = engine.accept(&auth.principal(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(record))
}

/* =========================
Reject request (reviewer)
========================= */
#[utoipa::path(
    put,
    path = "/api/requests/{id}/reject",
    params(("id" = u64, Path, description = "ID of the request to reject")),
    request_body(
        content = RejectDto,
        description = "Reviewer comment; required, never silently empty",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Request rejected", body = RequestRecord),
        (status = 400, description = "Missing comment or not pending anymore"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Role or permission check failed"),
        (status = 404, description = "Request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Requests"
)]
pub async fn reject_request(
    auth: AuthUser,
    engine: web::Data<AppEngine>,
    path: web::Path<u64>,
    payload: web::Json<RejectDto>,
) -> actix_web::Result<impl Responder> {
    let record = engine
        .reject(&auth.principal(), path.into_inner(), &payload.comment)
        .await?;
    Ok(HttpResponse::Ok().json(record))
}

/* =========================
Delete request (reviewer correction)
========================= */
#[utoipa::path(
    delete,
    path = "/api/requests/{id}",
    params(("id" = u64, Path, description = "ID of the request to delete")),
    responses(
        (status = 200, description = "Request deleted"),
        (status = 400, description = "Status does not allow deletion"),
        (status = 403, description = "Role or permission check failed"),
        (status = 404, description = "Request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Requests"
)]
pub async fn delete_request(
    auth: AuthUser,
    engine: web::Data<AppEngine>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    engine.delete(&auth.principal(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Request deleted" })))
}

/* =========================
Convert home visit to sick leave
========================= */
/// Closes the home visit and opens the carried-over sick-leave request in
/// one atomic step.
#[utoipa::path(
    post,
    path = "/api/requests/{id}/convert-to-sick",
    params(("id" = u64, Path, description = "ID of the home-visit request")),
    responses(
        (status = 201, description = "Sick-leave request created", body = RequestRecord),
        (status = 400, description = "Not a convertible home visit"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Request not found"),
        (status = 500, description = "Conversion rolled back; the home visit is unchanged")
    ),
    security(("bearer_auth" = [])),
    tag = "Requests"
)]
pub async fn convert_request(
    auth: AuthUser,
    engine: web::Data<AppEngine>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let record = engine
        .convert_to_sick(&auth.principal(), path.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(record))
}
