use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

use crate::api::requests::{CreateRequestDto, RejectDto};
use crate::model::filter::{FilterSignature, SearchKey};
use crate::model::request::{
    DateRange, DayPart, NewRequest, PermitWindow, RequestDetail, RequestKind, RequestPage,
    RequestPatch, RequestRecord, RequestStatus,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HRM Request API",
        version = "1.0.0",
        description = r#"
## HR back-office request service

Employees submit time-off/permit/mission/home-visit requests; managers and
admins review, accept, reject, reassign, or convert them.

### Key features
- **Six request kinds** behind one lifecycle: ordinary leave, casual leave,
  sick leave, home visit, mission, morning/evening permit
- **Review workflow**: accept / reject (with mandatory comment) / manual
  assignment on an employee's behalf
- **Home-visit conversion**: atomically closes a home visit into a
  sick-leave request
- **Paginated filtered lists** with per-kind page-size defaults

### Security
JWT Bearer authentication. Reviewer actions additionally require
fine-grained permissions carried in the token.
"#,
    ),
    paths(
        crate::api::requests::list_requests,
        crate::api::requests::get_request,
        crate::api::requests::create_request,
        crate::api::requests::assign_request,
        crate::api::requests::update_request,
        crate::api::requests::accept_request,
        crate::api::requests::reject_request,
        crate::api::requests::delete_request,
        crate::api::requests::convert_request,
    ),
    components(
        schemas(
            RequestKind,
            RequestStatus,
            DayPart,
            PermitWindow,
            DateRange,
            RequestDetail,
            RequestRecord,
            RequestPage,
            NewRequest,
            RequestPatch,
            CreateRequestDto,
            RejectDto,
            SearchKey,
            FilterSignature,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Requests", description = "Request lifecycle APIs"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
