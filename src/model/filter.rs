use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::{IntoParams, ToSchema};

use crate::model::request::{RequestKind, RequestStatus};

/// Which field class a search query matches against.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SearchKey {
    EmployeeName,
    Id,
}

/// Canonical filter tuple for one list view. Doubles as the cache key, so
/// equality is field-exact: an unset field is not the same signature as an
/// empty or zero one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct FilterSignature {
    /// Request kind this view lists
    #[param(example = "mission")]
    pub kind: RequestKind,
    /// Restrict to one employee's own requests
    #[param(example = 1000)]
    pub employee_id: Option<u64>,
    /// Pagination page number (1-based)
    #[param(example = 1)]
    #[serde(default = "first_page")]
    pub page: u64,
    /// Items per page; defaults per kind when unset
    #[param(example = 10)]
    pub page_size: Option<u64>,
    #[param(example = "2026-01-01")]
    pub start_date: Option<NaiveDate>,
    #[param(example = "2026-01-31")]
    pub end_date: Option<NaiveDate>,
    /// Filter by exact status
    #[param(example = "pending")]
    pub status: Option<RequestStatus>,
    /// Field class the search query matches
    pub search_key: Option<SearchKey>,
    /// Case-insensitive search text; debouncing happens upstream
    pub search_query: Option<String>,
}

fn first_page() -> u64 {
    1
}

impl FilterSignature {
    pub fn for_kind(kind: RequestKind) -> Self {
        Self {
            kind,
            employee_id: None,
            page: 1,
            page_size: None,
            start_date: None,
            end_date: None,
            status: None,
            search_key: None,
            search_query: None,
        }
    }

    pub fn own_list(kind: RequestKind, employee_id: u64) -> Self {
        Self {
            employee_id: Some(employee_id),
            ..Self::for_kind(kind)
        }
    }

    pub fn page(mut self, page: u64) -> Self {
        self.page = page;
        self
    }

    pub fn page_size(mut self, page_size: u64) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Effective page size: explicit value if set, otherwise the per-kind
    /// default, capped at 100.
    pub fn effective_page_size(&self) -> u64 {
        self.page_size
            .unwrap_or_else(|| self.kind.default_page_size())
            .clamp(1, 100)
    }

    /// Effective 1-based page number.
    pub fn effective_page(&self) -> u64 {
        self.page.max(1)
    }
}
