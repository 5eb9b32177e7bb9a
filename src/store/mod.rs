pub mod memory;
pub mod mysql;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::engine::error::EngineError;
use crate::model::filter::FilterSignature;
use crate::model::request::{NewRequest, RequestPage, RequestPatch, RequestRecord, RequestStatus};

/// Carry-over fields when a home visit closes into a sick-leave request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionPayload {
    pub description: String,
    pub date: NaiveDate,
    pub permit_approval: bool,
    pub medical_report: Option<String>,
}

/// Failures reported by the remote store. Surfaced to the engine verbatim;
/// no retry happens at this layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{0}")]
    Validation(String),

    #[error("request {0} not found")]
    NotFound(u64),

    /// The record changed underneath the caller (stale source status).
    #[error("request {0} was modified concurrently")]
    Conflict(u64),

    /// Partial failure of the two-step conversion; the store rolled back.
    #[error("conversion rolled back: {0}")]
    Conversion(String),

    #[error("store unavailable: {0}")]
    Transient(String),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(msg) => EngineError::Validation(msg),
            StoreError::NotFound(id) => EngineError::NotFound(id),
            StoreError::Conflict(id) => EngineError::Conflict(id),
            StoreError::Conversion(msg) | StoreError::Transient(msg) => {
                EngineError::Transient(msg)
            }
        }
    }
}

/// One operation per remote-store capability. Mutations return the record
/// the store actually committed; the engine never fabricates state locally.
/// Mutators re-check the source status server-side, so a stale caller gets
/// `Conflict` instead of clobbering a concurrent transition.
pub trait RequestStore: Send + Sync + 'static {
    async fn create_request(&self, new: &NewRequest) -> Result<RequestRecord, StoreError>;

    /// Manager-side creation on behalf of a named employee; lands directly
    /// in `AssignedManually`.
    async fn assign_request(&self, new: &NewRequest) -> Result<RequestRecord, StoreError>;

    async fn accept_request(&self, id: u64) -> Result<RequestRecord, StoreError>;

    async fn reject_request(&self, id: u64, comment: &str) -> Result<RequestRecord, StoreError>;

    /// `from` is the source status the caller observed when it chose the
    /// target; the store applies the patch only if the row still carries it,
    /// so a stale edit cannot revert a concurrent transition.
    async fn update_request(
        &self,
        id: u64,
        patch: &RequestPatch,
        from: RequestStatus,
        to: RequestStatus,
    ) -> Result<RequestRecord, StoreError>;

    async fn delete_request(&self, id: u64) -> Result<(), StoreError>;

    /// Atomically closes home-visit `id` and creates the carried-over
    /// sick-leave request. Either both happen or neither does.
    async fn convert_request(
        &self,
        id: u64,
        payload: &ConversionPayload,
    ) -> Result<RequestRecord, StoreError>;

    async fn list_requests(&self, filter: &FilterSignature) -> Result<RequestPage, StoreError>;

    async fn get_request(&self, id: u64) -> Result<Option<RequestRecord>, StoreError>;
}
