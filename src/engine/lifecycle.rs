use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use strum::Display;
use tokio::sync::broadcast;

use crate::engine::authz::{self, Principal};
use crate::engine::error::{AuthzAxis, EngineError};
use crate::engine::events::TransitionEvent;
use crate::model::filter::FilterSignature;
use crate::model::permission::Permission;
use crate::model::request::{
    NewRequest, RequestDetail, RequestKind, RequestPage, RequestPatch, RequestRecord,
    RequestStatus,
};
use crate::query::QueryLayer;
use crate::store::{ConversionPayload, RequestStore, StoreError};

/// Every state change a caller can ask for. Create and assign make a new
/// record; the rest act on an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Transition {
    Create,
    Assign,
    Accept,
    Reject,
    Update,
    Delete,
    ConvertToSick,
}

impl Transition {
    /// Source statuses the transition may start from. Empty for the
    /// creation-like transitions, which have no source record.
    pub fn allowed_from(self) -> &'static [RequestStatus] {
        use RequestStatus::*;
        match self {
            Transition::Create | Transition::Assign => &[],
            Transition::Accept | Transition::Reject => &[Pending],
            Transition::Update => &[Pending, Accepted],
            Transition::Delete => &[Accepted, Edited, AssignedManually],
            Transition::ConvertToSick => &[Pending, Accepted, Edited, AssignedManually],
        }
    }
}

/// The single authority for state changes. Holds the store seam, the query
/// caches, and the event channel; every operation takes the acting principal
/// explicitly. Check order is fixed: actor axes and local validation first
/// (no store traffic), then the current record, then the remote mutation,
/// then invalidation and the event. Nothing is flipped before the store
/// confirms.
pub struct Engine<S> {
    store: Arc<S>,
    query: QueryLayer<S>,
    events: broadcast::Sender<TransitionEvent>,
}

impl<S> Clone for Engine<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            query: self.query.clone(),
            events: self.events.clone(),
        }
    }
}

impl<S: RequestStore> Engine<S> {
    pub fn new(store: Arc<S>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            query: QueryLayer::new(store.clone()),
            store,
            events,
        }
    }

    pub fn query(&self) -> &QueryLayer<S> {
        &self.query
    }

    /// Live feed of confirmed transitions, for the notification channel.
    pub fn subscribe(&self) -> broadcast::Receiver<TransitionEvent> {
        self.events.subscribe()
    }

    /// Employee self-service submission. Starts in `Pending`.
    pub async fn create(
        &self,
        principal: &Principal,
        new: NewRequest,
    ) -> Result<RequestRecord, EngineError> {
        authz::check_actor(principal, Transition::Create)?;
        if principal.employee_id != Some(new.employee_id) {
            // Self-service path only submits for the principal's own profile.
            return Err(EngineError::Unauthorized {
                axis: AuthzAxis::Role,
                transition: Transition::Create,
            });
        }
        new.validate()?;

        let record = self.store.create_request(&new).await?;
        self.confirm(Transition::Create, &record).await?;
        Ok(record)
    }

    /// Manager records a request on a named employee's behalf. Skips
    /// `Pending` entirely and lands in `AssignedManually`.
    pub async fn assign(
        &self,
        principal: &Principal,
        new: NewRequest,
    ) -> Result<RequestRecord, EngineError> {
        authz::check_actor(principal, Transition::Assign)?;
        new.validate()?;

        let record = self.store.assign_request(&new).await?;
        self.confirm(Transition::Assign, &record).await?;
        Ok(record)
    }

    pub async fn accept(&self, principal: &Principal, id: u64) -> Result<RequestRecord, EngineError> {
        authz::check_actor(principal, Transition::Accept)?;
        let current = self.load(id).await?;
        check_source(Transition::Accept, &current)?;
        authz::check_target(principal, Transition::Accept, &current)?;

        let record = self.store.accept_request(id).await?;
        self.confirm(Transition::Accept, &record).await?;
        Ok(record)
    }

    /// Rejection requires a reviewer comment; a blank one fails locally
    /// without any store call.
    pub async fn reject(
        &self,
        principal: &Principal,
        id: u64,
        comment: &str,
    ) -> Result<RequestRecord, EngineError> {
        authz::check_actor(principal, Transition::Reject)?;
        let comment = comment.trim();
        if comment.is_empty() {
            return Err(EngineError::MissingComment);
        }
        let current = self.load(id).await?;
        check_source(Transition::Reject, &current)?;

        let record = self.store.reject_request(id, comment).await?;
        self.confirm(Transition::Reject, &record).await?;
        Ok(record)
    }

    /// Owner edit of a `Pending` request stays `Pending`; reviewer
    /// correction of an `Accepted` one lands in `Edited`. Both re-run full
    /// field validation. The kind never changes on edit.
    pub async fn update(
        &self,
        principal: &Principal,
        id: u64,
        patch: RequestPatch,
    ) -> Result<RequestRecord, EngineError> {
        authz::check_actor(principal, Transition::Update)?;
        patch.validate()?;
        let current = self.load(id).await?;
        if patch.detail.kind() != current.kind() {
            return Err(EngineError::Validation(
                "request kind cannot change on edit".into(),
            ));
        }
        check_source(Transition::Update, &current)?;

        let target = match current.status {
            RequestStatus::Pending => {
                authz::require_owner(principal, &current, Transition::Update)?;
                RequestStatus::Pending
            }
            RequestStatus::Accepted => {
                authz::require_reviewer(principal, Transition::Update)?;
                authz::require_permission(principal, Permission::EditRequests, Transition::Update)?;
                RequestStatus::Edited
            }
            from => {
                return Err(EngineError::InvalidTransition {
                    transition: Transition::Update,
                    from,
                });
            }
        };

        let record = self
            .store
            .update_request(id, &patch, current.status, target)
            .await?;
        self.confirm(Transition::Update, &record).await?;
        Ok(record)
    }

    /// Removes a manager-correctable record for good. Only terminal-but-
    /// reversible states qualify.
    pub async fn delete(&self, principal: &Principal, id: u64) -> Result<(), EngineError> {
        authz::check_actor(principal, Transition::Delete)?;
        let current = self.load(id).await?;
        check_source(Transition::Delete, &current)?;

        self.store.delete_request(id).await?;
        self.confirm(Transition::Delete, &current).await?;
        Ok(())
    }

    /// Cross-kind transition: closes a home visit and opens the carried-over
    /// sick-leave request in one store transaction. On partial failure the
    /// home visit is untouched and the caller sees `ConversionFailed`.
    pub async fn convert_to_sick(
        &self,
        principal: &Principal,
        id: u64,
    ) -> Result<RequestRecord, EngineError> {
        authz::check_actor(principal, Transition::ConvertToSick)?;
        let current = self.load(id).await?;
        authz::check_target(principal, Transition::ConvertToSick, &current)?;

        let RequestDetail::HomeVisit {
            date,
            permit_approval,
            medical_report,
        } = &current.detail
        else {
            return Err(EngineError::InvalidTransition {
                transition: Transition::ConvertToSick,
                from: current.status,
            });
        };
        check_source(Transition::ConvertToSick, &current)?;

        let payload = ConversionPayload {
            description: current.description.clone(),
            date: *date,
            permit_approval: *permit_approval,
            medical_report: medical_report.clone(),
        };

        let created = match self.store.convert_request(id, &payload).await {
            Ok(record) => record,
            Err(StoreError::Conversion(reason)) => {
                tracing::warn!(request_id = id, %reason, "conversion rolled back");
                return Err(EngineError::ConversionFailed(id));
            }
            Err(other) => return Err(other.into()),
        };

        // The closed home visit and the new sick leave both have dirty views.
        self.query
            .invalidate_after(
                Transition::ConvertToSick,
                RequestKind::HomeVisit,
                id,
                Some(current.employee_id),
            )
            .await?;
        self.confirm(Transition::ConvertToSick, &created).await?;
        Ok(created)
    }

    /// Cached list read, keyed by the canonical filter signature.
    pub async fn list(&self, filter: &FilterSignature) -> Result<RequestPage, EngineError> {
        self.query.list(filter).await
    }

    /// Cached detail read.
    pub async fn get(&self, id: u64) -> Result<RequestRecord, EngineError> {
        self.query.get(id).await
    }

    /// Fresh read for transition source checks. Deliberately bypasses the
    /// detail cache: the store is the only truth a transition may act on.
    async fn load(&self, id: u64) -> Result<RequestRecord, EngineError> {
        self.store
            .get_request(id)
            .await?
            .ok_or(EngineError::NotFound(id))
    }

    async fn confirm(
        &self,
        transition: Transition,
        record: &RequestRecord,
    ) -> Result<(), EngineError> {
        self.query
            .invalidate_after(
                transition,
                record.kind(),
                record.id,
                Some(record.employee_id),
            )
            .await?;

        let _ = self.events.send(TransitionEvent {
            transition,
            kind: record.kind(),
            request_id: record.id,
            employee_id: record.employee_id,
            occurred_at: Utc::now(),
        });

        tracing::info!(
            request_id = record.id,
            kind = %record.kind(),
            %transition,
            status = %record.status,
            "transition confirmed"
        );
        Ok(())
    }
}

fn check_source(transition: Transition, record: &RequestRecord) -> Result<(), EngineError> {
    if transition.allowed_from().contains(&record.status) {
        Ok(())
    } else {
        Err(EngineError::InvalidTransition {
            transition,
            from: record.status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_transitions_only_start_from_pending() {
        for transition in [Transition::Accept, Transition::Reject] {
            assert_eq!(transition.allowed_from(), &[RequestStatus::Pending]);
        }
    }

    #[test]
    fn delete_only_from_correctable_states() {
        let allowed = Transition::Delete.allowed_from();
        assert!(allowed.contains(&RequestStatus::Accepted));
        assert!(allowed.contains(&RequestStatus::Edited));
        assert!(allowed.contains(&RequestStatus::AssignedManually));
        assert!(!allowed.contains(&RequestStatus::Pending));
        assert!(!allowed.contains(&RequestStatus::Rejected));
    }

    #[test]
    fn nothing_transitions_out_of_rejected_or_ignored() {
        for transition in [
            Transition::Accept,
            Transition::Reject,
            Transition::Update,
            Transition::Delete,
            Transition::ConvertToSick,
        ] {
            assert!(!transition.allowed_from().contains(&RequestStatus::Rejected));
            assert!(!transition.allowed_from().contains(&RequestStatus::Ignored));
        }
    }
}
