use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{NaiveDate, Utc};

use crate::model::filter::{FilterSignature, SearchKey};
use crate::model::request::{
    DateRange, NewRequest, RequestDetail, RequestKind, RequestPage, RequestPatch, RequestRecord,
    RequestStatus,
};
use crate::store::{ConversionPayload, RequestStore, StoreError};

/// In-process store with the same filtering, ordering, and concurrency
/// semantics as the MySQL store. Backs the test suite and local demos.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<u64, RequestRecord>>,
    next_id: AtomicU64,
    fail_next_conversion: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            fail_next_conversion: AtomicBool::new(false),
        }
    }

    /// Failure injection: the next conversion rolls back after the
    /// home-visit closure, exercising the atomicity contract.
    pub fn fail_next_conversion(&self) {
        self.fail_next_conversion.store(true, Ordering::SeqCst);
    }

    /// Backdoor for seeding non-client-reachable states (e.g. `Ignored`,
    /// written by the server-side permit scheduler).
    pub fn force_status(&self, id: u64, status: RequestStatus) {
        let mut records = self.records.lock().unwrap();
        if let Some(record) = records.get_mut(&id) {
            record.status = status;
        }
    }

    fn insert_new(&self, new: &NewRequest, status: RequestStatus) -> RequestRecord {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let record = RequestRecord {
            id,
            employee_id: new.employee_id,
            employee_name: new.employee_name.clone(),
            status,
            requested_at: Utc::now(),
            description: new.description.clone(),
            comment: None,
            detail: new.detail.clone(),
        };
        self.records.lock().unwrap().insert(id, record.clone());
        record
    }
}

/// Primary date of a record, used for range filtering.
fn record_date(record: &RequestRecord) -> NaiveDate {
    match &record.detail {
        RequestDetail::OrdinaryLeave { range }
        | RequestDetail::CasualLeave { range }
        | RequestDetail::SickLeave { range, .. } => range.start_date,
        RequestDetail::HomeVisit { date, .. }
        | RequestDetail::Mission { date, .. }
        | RequestDetail::Permit { date, .. } => *date,
    }
}

fn matches(filter: &FilterSignature, record: &RequestRecord) -> bool {
    if record.kind() != filter.kind {
        return false;
    }
    if let Some(employee_id) = filter.employee_id {
        if record.employee_id != employee_id {
            return false;
        }
    }
    if let Some(status) = filter.status {
        if record.status != status {
            return false;
        }
    }
    if let Some(start) = filter.start_date {
        if record_date(record) < start {
            return false;
        }
    }
    if let Some(end) = filter.end_date {
        if record_date(record) > end {
            return false;
        }
    }
    if let Some(query) = filter.search_query.as_deref() {
        let query = query.to_lowercase();
        let hit = match filter.search_key.unwrap_or(SearchKey::EmployeeName) {
            SearchKey::EmployeeName => record.employee_name.to_lowercase().contains(&query),
            SearchKey::Id => record.id.to_string().contains(&query),
        };
        if !hit {
            return false;
        }
    }
    true
}

impl RequestStore for MemoryStore {
    async fn create_request(&self, new: &NewRequest) -> Result<RequestRecord, StoreError> {
        Ok(self.insert_new(new, RequestStatus::Pending))
    }

    async fn assign_request(&self, new: &NewRequest) -> Result<RequestRecord, StoreError> {
        Ok(self.insert_new(new, RequestStatus::AssignedManually))
    }

    async fn accept_request(&self, id: u64) -> Result<RequestRecord, StoreError> {
        let mut records = self.records.lock().unwrap();
        let record = records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if record.status != RequestStatus::Pending {
            return Err(StoreError::Conflict(id));
        }
        record.status = RequestStatus::Accepted;
        Ok(record.clone())
    }

    async fn reject_request(&self, id: u64, comment: &str) -> Result<RequestRecord, StoreError> {
        if comment.trim().is_empty() {
            return Err(StoreError::Validation("reject requires a comment".into()));
        }
        let mut records = self.records.lock().unwrap();
        let record = records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if record.status != RequestStatus::Pending {
            return Err(StoreError::Conflict(id));
        }
        record.status = RequestStatus::Rejected;
        record.comment = Some(comment.trim().to_string());
        Ok(record.clone())
    }

    async fn update_request(
        &self,
        id: u64,
        patch: &RequestPatch,
        from: RequestStatus,
        to: RequestStatus,
    ) -> Result<RequestRecord, StoreError> {
        let mut records = self.records.lock().unwrap();
        let record = records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if record.status != from {
            return Err(StoreError::Conflict(id));
        }
        record.description = patch.description.clone();
        record.detail = patch.detail.clone();
        record.status = to;
        Ok(record.clone())
    }

    async fn delete_request(&self, id: u64) -> Result<(), StoreError> {
        let mut records = self.records.lock().unwrap();
        let record = records.get(&id).ok_or(StoreError::NotFound(id))?;
        if !matches!(
            record.status,
            RequestStatus::Accepted | RequestStatus::Edited | RequestStatus::AssignedManually
        ) {
            return Err(StoreError::Conflict(id));
        }
        records.remove(&id);
        Ok(())
    }

    async fn convert_request(
        &self,
        id: u64,
        payload: &ConversionPayload,
    ) -> Result<RequestRecord, StoreError> {
        // One lock span covers the whole two-step operation, so a failure
        // leaves the home visit exactly as it was.
        let mut records = self.records.lock().unwrap();
        let original = records.get(&id).ok_or(StoreError::NotFound(id))?;
        if !matches!(original.detail, RequestDetail::HomeVisit { .. }) {
            return Err(StoreError::Validation(format!(
                "request {} is not a home visit",
                id
            )));
        }

        if self.fail_next_conversion.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Conversion(
                "sick-leave creation failed; home visit restored".into(),
            ));
        }

        let employee_id = original.employee_id;
        let employee_name = original.employee_name.clone();
        records.remove(&id);

        let new_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let record = RequestRecord {
            id: new_id,
            employee_id,
            employee_name,
            status: RequestStatus::Pending,
            requested_at: Utc::now(),
            description: payload.description.clone(),
            comment: None,
            detail: RequestDetail::SickLeave {
                range: DateRange::single(payload.date),
                permit_approval: payload.permit_approval,
                medical_report: payload.medical_report.clone(),
            },
        };
        records.insert(new_id, record.clone());
        Ok(record)
    }

    async fn list_requests(&self, filter: &FilterSignature) -> Result<RequestPage, StoreError> {
        let records = self.records.lock().unwrap();
        let mut hits: Vec<RequestRecord> = records
            .values()
            .filter(|r| matches(filter, r))
            .cloned()
            .collect();
        // requested_at descending, id as the tiebreaker; the caller never
        // re-sorts on its side.
        hits.sort_by(|a, b| {
            b.requested_at
                .cmp(&a.requested_at)
                .then(b.id.cmp(&a.id))
        });

        let per_page = filter.effective_page_size();
        let page = filter.effective_page();
        let total_records = hits.len() as i64;
        let total_pages = (total_records as u64).div_ceil(per_page);

        let offset = ((page - 1) * per_page) as usize;
        let data = hits
            .into_iter()
            .skip(offset)
            .take(per_page as usize)
            .collect();

        Ok(RequestPage {
            data,
            page,
            per_page,
            total_records,
            total_pages,
        })
    }

    async fn get_request(&self, id: u64) -> Result<Option<RequestRecord>, StoreError> {
        Ok(self.records.lock().unwrap().get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::request::PermitWindow;

    fn permit(employee_id: u64, name: &str, date: &str) -> NewRequest {
        NewRequest {
            employee_id,
            employee_name: name.into(),
            description: "errand".into(),
            detail: RequestDetail::Permit {
                date: date.parse().unwrap(),
                window: PermitWindow::Morning,
            },
        }
    }

    #[tokio::test]
    async fn past_the_end_page_is_empty_with_totals_intact() {
        let store = MemoryStore::new();
        for i in 0..7 {
            store
                .create_request(&permit(1000 + i, "A", "2026-01-05"))
                .await
                .unwrap();
        }

        let filter = FilterSignature::for_kind(RequestKind::Permit).page(9);
        let page = store.list_requests(&filter).await.unwrap();
        assert!(page.data.is_empty());
        assert_eq!(page.total_records, 7);
        assert_eq!(page.total_pages, 2); // per-kind default of 5
    }

    #[tokio::test]
    async fn search_is_case_insensitive() {
        let store = MemoryStore::new();
        store
            .create_request(&permit(1, "John Doe", "2026-01-05"))
            .await
            .unwrap();
        store
            .create_request(&permit(2, "Jane Roe", "2026-01-05"))
            .await
            .unwrap();

        let filter = FilterSignature {
            search_key: Some(SearchKey::EmployeeName),
            search_query: Some("JOHN".into()),
            ..FilterSignature::for_kind(RequestKind::Permit)
        };
        let page = store.list_requests(&filter).await.unwrap();
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].employee_name, "John Doe");
    }

    #[tokio::test]
    async fn stale_edit_cannot_revert_a_concurrent_accept() {
        let store = MemoryStore::new();
        let record = store
            .create_request(&permit(1, "John Doe", "2026-01-05"))
            .await
            .unwrap();
        // Reviewer wins the race while the owner's edit is in flight.
        store.accept_request(record.id).await.unwrap();

        let patch = RequestPatch {
            description: "late edit".into(),
            detail: record.detail.clone(),
        };
        let err = store
            .update_request(record.id, &patch, RequestStatus::Pending, RequestStatus::Pending)
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::Conflict(record.id));

        let current = store.get_request(record.id).await.unwrap().unwrap();
        assert_eq!(current.status, RequestStatus::Accepted);
        assert_eq!(current.description, "errand");
    }

    #[tokio::test]
    async fn accept_of_non_pending_is_a_conflict_at_store_level() {
        let store = MemoryStore::new();
        let record = store
            .create_request(&permit(1, "John Doe", "2026-01-05"))
            .await
            .unwrap();
        store.accept_request(record.id).await.unwrap();
        assert_eq!(
            store.accept_request(record.id).await.unwrap_err(),
            StoreError::Conflict(record.id)
        );
    }
}
