use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;

use crate::engine::error::EngineError;

/// The six request kinds share one record shape; the kind discriminant
/// decides which payload variant is populated and which transitions apply.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RequestKind {
    OrdinaryLeave,
    CasualLeave,
    SickLeave,
    HomeVisit,
    Mission,
    Permit,
}

impl RequestKind {
    /// Default list page size when the filter does not set one.
    pub fn default_page_size(&self) -> u64 {
        match self {
            RequestKind::Permit | RequestKind::Mission => 5,
            _ => 10,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
    /// Written by the server-side permit scheduler when a window elapses
    /// unused. No client transition produces it; we only read it back.
    Ignored,
    Edited,
    AssignedManually,
}

/// Day classification for missions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DayPart {
    FullDay,
    HalfDay,
}

/// Time-of-day window for permits.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PermitWindow {
    Morning,
    Evening,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DateRange {
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-03", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[schema(example = 3)]
    pub number_of_days: u32,
}

impl DateRange {
    /// Builds a range with the day count implied from the endpoints.
    pub fn between(start_date: NaiveDate, end_date: NaiveDate) -> Result<Self, EngineError> {
        if end_date < start_date {
            return Err(EngineError::Validation(
                "end_date cannot be before start_date".into(),
            ));
        }
        let number_of_days = (end_date - start_date).num_days() as u32 + 1;
        Ok(Self {
            start_date,
            end_date,
            number_of_days,
        })
    }

    /// A single-day range, used when a home visit converts into sick leave.
    pub fn single(date: NaiveDate) -> Self {
        Self {
            start_date: date,
            end_date: date,
            number_of_days: 1,
        }
    }

    fn check(&self) -> Result<(), EngineError> {
        if self.end_date < self.start_date {
            return Err(EngineError::Validation(
                "end_date cannot be before start_date".into(),
            ));
        }
        if self.number_of_days < 1 {
            return Err(EngineError::Validation("number_of_days must be >= 1".into()));
        }
        let implied = (self.end_date - self.start_date).num_days() as u32 + 1;
        if self.number_of_days != implied {
            return Err(EngineError::Validation(format!(
                "number_of_days must equal {} for the given dates",
                implied
            )));
        }
        Ok(())
    }
}

/// Kind-specific payload. Tagged by `kind` so the wire shape stays flat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RequestDetail {
    OrdinaryLeave {
        #[serde(flatten)]
        range: DateRange,
    },
    CasualLeave {
        #[serde(flatten)]
        range: DateRange,
    },
    SickLeave {
        #[serde(flatten)]
        range: DateRange,
        permit_approval: bool,
        /// Opaque file-store reference; upload/download is delegated.
        medical_report: Option<String>,
    },
    HomeVisit {
        date: NaiveDate,
        permit_approval: bool,
        medical_report: Option<String>,
    },
    Mission {
        date: NaiveDate,
        day_part: DayPart,
    },
    Permit {
        date: NaiveDate,
        window: PermitWindow,
    },
}

impl RequestDetail {
    pub fn kind(&self) -> RequestKind {
        match self {
            RequestDetail::OrdinaryLeave { .. } => RequestKind::OrdinaryLeave,
            RequestDetail::CasualLeave { .. } => RequestKind::CasualLeave,
            RequestDetail::SickLeave { .. } => RequestKind::SickLeave,
            RequestDetail::HomeVisit { .. } => RequestKind::HomeVisit,
            RequestDetail::Mission { .. } => RequestKind::Mission,
            RequestDetail::Permit { .. } => RequestKind::Permit,
        }
    }

    fn check(&self) -> Result<(), EngineError> {
        match self {
            RequestDetail::OrdinaryLeave { range }
            | RequestDetail::CasualLeave { range }
            | RequestDetail::SickLeave { range, .. } => range.check(),
            RequestDetail::HomeVisit { .. }
            | RequestDetail::Mission { .. }
            | RequestDetail::Permit { .. } => Ok(()),
        }
    }
}

// The derive cannot express an internally tagged enum with flattened
// payloads, so the schema is written out by hand as a oneOf over the six
// variant shapes.
impl<'s> ToSchema<'s> for RequestDetail {
    fn schema() -> (
        &'s str,
        utoipa::openapi::RefOr<utoipa::openapi::schema::Schema>,
    ) {
        use utoipa::openapi::Ref;
        use utoipa::openapi::schema::{
            KnownFormat, ObjectBuilder, OneOfBuilder, SchemaFormat, SchemaType,
        };

        let kind_tag = |value: &str| {
            ObjectBuilder::new()
                .schema_type(SchemaType::String)
                .enum_values(Some([value]))
        };
        let date = || {
            ObjectBuilder::new()
                .schema_type(SchemaType::String)
                .format(Some(SchemaFormat::KnownFormat(KnownFormat::Date)))
                .example(Some("2026-01-01".into()))
        };
        let range = |tag: &str| {
            ObjectBuilder::new()
                .property("kind", kind_tag(tag))
                .required("kind")
                .property("start_date", date())
                .required("start_date")
                .property("end_date", date())
                .required("end_date")
                .property(
                    "number_of_days",
                    ObjectBuilder::new()
                        .schema_type(SchemaType::Integer)
                        .example(Some(3.into())),
                )
                .required("number_of_days")
        };
        let single_day = |tag: &str| {
            ObjectBuilder::new()
                .property("kind", kind_tag(tag))
                .required("kind")
                .property("date", date())
                .required("date")
        };
        let medical = |builder: ObjectBuilder| {
            builder
                .property(
                    "permit_approval",
                    ObjectBuilder::new().schema_type(SchemaType::Boolean),
                )
                .required("permit_approval")
                .property(
                    "medical_report",
                    ObjectBuilder::new()
                        .schema_type(SchemaType::String)
                        .nullable(true),
                )
        };

        (
            "RequestDetail",
            OneOfBuilder::new()
                .item(range("ordinary_leave"))
                .item(range("casual_leave"))
                .item(medical(range("sick_leave")))
                .item(medical(single_day("home_visit")))
                .item(
                    single_day("mission")
                        .property("day_part", Ref::from_schema_name("DayPart"))
                        .required("day_part"),
                )
                .item(
                    single_day("permit")
                        .property("window", Ref::from_schema_name("PermitWindow"))
                        .required("window"),
                )
                .into(),
        )
    }
}

pub const MAX_DESCRIPTION_CHARS: usize = 500;

/// A stored request as the remote store reports it. `id` and `requested_at`
/// are server-assigned; `employee_id` and `requested_at` never change after
/// creation, and `comment` is set exactly once, on rejection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RequestRecord {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 1000)]
    pub employee_id: u64,
    #[schema(example = "John Doe")]
    pub employee_name: String,
    #[schema(example = "pending")]
    pub status: RequestStatus,
    #[schema(example = "2026-01-01T00:00:00Z", format = "date-time", value_type = String)]
    pub requested_at: DateTime<Utc>,
    #[schema(example = "family trip")]
    pub description: String,
    /// Reviewer comment, present iff the request was rejected.
    #[schema(example = "insufficient notice", nullable = true)]
    pub comment: Option<String>,
    #[serde(flatten)]
    pub detail: RequestDetail,
}

impl RequestRecord {
    pub fn kind(&self) -> RequestKind {
        self.detail.kind()
    }
}

/// Fields a submitter controls at creation time. Validated locally before
/// any store call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct NewRequest {
    #[schema(example = 1000)]
    pub employee_id: u64,
    #[schema(example = "John Doe")]
    pub employee_name: String,
    #[schema(example = "family trip")]
    pub description: String,
    #[serde(flatten)]
    pub detail: RequestDetail,
}

impl NewRequest {
    pub fn validate(&self) -> Result<(), EngineError> {
        validate_description(&self.description)?;
        if self.employee_name.trim().is_empty() {
            return Err(EngineError::Validation("employee_name is required".into()));
        }
        self.detail.check()
    }
}

/// Replacement fields for an edit. The kind of a request never changes on
/// edit, so the patch carries a full detail of the same kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RequestPatch {
    #[schema(example = "family trip, extended")]
    pub description: String,
    #[serde(flatten)]
    pub detail: RequestDetail,
}

impl RequestPatch {
    pub fn validate(&self) -> Result<(), EngineError> {
        validate_description(&self.description)?;
        self.detail.check()
    }
}

fn validate_description(description: &str) -> Result<(), EngineError> {
    if description.trim().is_empty() {
        return Err(EngineError::Validation("description is required".into()));
    }
    if description.chars().count() > MAX_DESCRIPTION_CHARS {
        return Err(EngineError::Validation(format!(
            "description exceeds {} characters",
            MAX_DESCRIPTION_CHARS
        )));
    }
    Ok(())
}

/// Paginated list envelope. `page` is 1-based; a page past the end is not an
/// error, it comes back empty with the totals unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RequestPage {
    pub data: Vec<RequestRecord>,
    #[schema(example = 1)]
    pub page: u64,
    #[schema(example = 10)]
    pub per_page: u64,
    #[schema(example = 15)]
    pub total_records: i64,
    #[schema(example = 2)]
    pub total_pages: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn draft(detail: RequestDetail) -> NewRequest {
        NewRequest {
            employee_id: 1000,
            employee_name: "John Doe".into(),
            description: "trip".into(),
            detail,
        }
    }

    #[test]
    fn range_implies_inclusive_day_count() {
        let range = DateRange::between(day("2024-05-01"), day("2024-05-03")).unwrap();
        assert_eq!(range.number_of_days, 3);
    }

    #[test]
    fn inverted_range_is_rejected() {
        let err = DateRange::between(day("2024-05-03"), day("2024-05-01")).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn mismatched_day_count_is_rejected() {
        let detail = RequestDetail::OrdinaryLeave {
            range: DateRange {
                start_date: day("2024-05-01"),
                end_date: day("2024-05-03"),
                number_of_days: 5,
            },
        };
        assert!(draft(detail).validate().is_err());
    }

    #[test]
    fn blank_description_is_rejected() {
        let mut req = draft(RequestDetail::Permit {
            date: day("2024-05-01"),
            window: PermitWindow::Morning,
        });
        req.description = "   ".into();
        assert!(matches!(
            req.validate().unwrap_err(),
            EngineError::Validation(_)
        ));
    }

    #[test]
    fn oversized_description_is_rejected() {
        let mut req = draft(RequestDetail::Mission {
            date: day("2024-05-01"),
            day_part: DayPart::FullDay,
        });
        req.description = "x".repeat(MAX_DESCRIPTION_CHARS + 1);
        assert!(req.validate().is_err());
    }

    #[test]
    fn detail_schema_covers_all_six_kinds() {
        let (name, schema) = RequestDetail::schema();
        assert_eq!(name, "RequestDetail");

        let value = serde_json::to_value(schema).unwrap();
        let variants = value["oneOf"].as_array().unwrap();
        assert_eq!(variants.len(), 6);

        let tags: Vec<&str> = variants
            .iter()
            .map(|v| v["properties"]["kind"]["enum"][0].as_str().unwrap())
            .collect();
        for kind in [
            "ordinary_leave",
            "casual_leave",
            "sick_leave",
            "home_visit",
            "mission",
            "permit",
        ] {
            assert!(tags.contains(&kind), "schema misses variant {kind}");
        }
    }

    #[test]
    fn kind_strings_round_trip() {
        for kind in [
            RequestKind::OrdinaryLeave,
            RequestKind::CasualLeave,
            RequestKind::SickLeave,
            RequestKind::HomeVisit,
            RequestKind::Mission,
            RequestKind::Permit,
        ] {
            let parsed: RequestKind = kind.to_string().parse().unwrap();
            assert_eq!(parsed, kind);
        }
        assert_eq!(RequestKind::HomeVisit.to_string(), "home_visit");
        assert_eq!(
            RequestStatus::AssignedManually.to_string(),
            "assigned_manually"
        );
    }
}
