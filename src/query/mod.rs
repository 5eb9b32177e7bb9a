pub mod invalidation;

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

use crate::engine::error::EngineError;
use crate::engine::lifecycle::Transition;
use crate::model::filter::FilterSignature;
use crate::model::request::{RequestKind, RequestPage, RequestRecord};
use crate::store::RequestStore;
use invalidation::{InvalidationScope, scopes_for};

const CACHE_TTL_SECS: u64 = 300;

/// Read side of the core: fetch-through caches for list pages (keyed by the
/// canonical filter signature) and detail records (keyed by id). Ordering and
/// pagination come from the store untouched; re-sorting locally would desync
/// from server-side pagination.
pub struct QueryLayer<S> {
    store: Arc<S>,
    lists: Cache<FilterSignature, RequestPage>,
    details: Cache<u64, RequestRecord>,
}

impl<S> Clone for QueryLayer<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            lists: self.lists.clone(),
            details: self.details.clone(),
        }
    }
}

impl<S: RequestStore> QueryLayer<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            lists: Cache::builder()
                .max_capacity(10_000)
                .time_to_live(Duration::from_secs(CACHE_TTL_SECS))
                .support_invalidation_closures()
                .build(),
            details: Cache::builder()
                .max_capacity(100_000)
                .time_to_live(Duration::from_secs(CACHE_TTL_SECS))
                .build(),
        }
    }

    pub async fn list(&self, filter: &FilterSignature) -> Result<RequestPage, EngineError> {
        if let Some(hit) = self.lists.get(filter).await {
            return Ok(hit);
        }
        let page = self.store.list_requests(filter).await?;
        self.lists.insert(filter.clone(), page.clone()).await;
        Ok(page)
    }

    pub async fn get(&self, id: u64) -> Result<RequestRecord, EngineError> {
        if let Some(hit) = self.details.get(&id).await {
            return Ok(hit);
        }
        match self.store.get_request(id).await? {
            Some(record) => {
                self.details.insert(id, record.clone()).await;
                Ok(record)
            }
            None => Err(EngineError::NotFound(id)),
        }
    }

    /// Walks the invalidation table for one confirmed transition. Called by
    /// the engine strictly after the store reports success.
    pub async fn invalidate_after(
        &self,
        transition: Transition,
        kind: RequestKind,
        request_id: u64,
        employee_id: Option<u64>,
    ) -> Result<(), EngineError> {
        for scope in scopes_for(transition) {
            match scope {
                InvalidationScope::Detail => {
                    self.details.invalidate(&request_id).await;
                }
                InvalidationScope::KindLists => {
                    self.lists
                        .invalidate_entries_if(move |sig, _| sig.kind == kind)
                        .map_err(|e| EngineError::Transient(e.to_string()))?;
                }
                InvalidationScope::OwnList => {
                    if let Some(employee_id) = employee_id {
                        self.lists
                            .invalidate_entries_if(move |sig, _| {
                                sig.kind == kind && sig.employee_id == Some(employee_id)
                            })
                            .map_err(|e| EngineError::Transient(e.to_string()))?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Primes page 1 of every kind's reviewer list. Spawned at boot; a cold
    /// cache is not an error, so failures only log.
    pub async fn warmup(&self) -> anyhow::Result<()> {
        let kinds = [
            RequestKind::OrdinaryLeave,
            RequestKind::CasualLeave,
            RequestKind::SickLeave,
            RequestKind::HomeVisit,
            RequestKind::Mission,
            RequestKind::Permit,
        ];

        let fetches = kinds
            .iter()
            .map(|kind| self.list_owned(FilterSignature::for_kind(*kind)));
        let results = futures::future::join_all(fetches).await;
        let primed = results.iter().filter(|r| r.is_ok()).count();

        log::info!(
            "request list cache warmup complete: {} of {} kinds primed",
            primed,
            kinds.len()
        );
        Ok(())
    }

    async fn list_owned(&self, filter: FilterSignature) -> Result<RequestPage, EngineError> {
        self.list(&filter).await
    }
}
