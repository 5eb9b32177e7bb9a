use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::engine::lifecycle::Transition;
use crate::model::request::RequestKind;

/// Published after a transition is confirmed by the store and the caches are
/// invalidated. The surrounding application forwards these to whatever live
/// channel notifies reviewers; the engine itself delivers nothing.
#[derive(Debug, Clone, Serialize)]
pub struct TransitionEvent {
    pub transition: Transition,
    pub kind: RequestKind,
    pub request_id: u64,
    pub employee_id: u64,
    pub occurred_at: DateTime<Utc>,
}
