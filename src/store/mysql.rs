use chrono::{DateTime, NaiveDate, Utc};
use sqlx::MySqlPool;

use crate::model::filter::{FilterSignature, SearchKey};
use crate::model::request::{
    DateRange, NewRequest, RequestDetail, RequestKind, RequestPage, RequestPatch, RequestRecord,
    RequestStatus,
};
use crate::store::{ConversionPayload, RequestStore, StoreError};

/// Production store over the `requests` table (see schema.sql). Mutations
/// carry the expected source status in the WHERE clause, so a concurrent
/// transition shows up as zero affected rows instead of a lost update.
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, id: u64) -> Result<Option<RequestRecord>, StoreError> {
        let row = sqlx::query_as::<_, RequestRow>(&format!("{} WHERE id = ?", SELECT_SQL))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.map(RequestRecord::try_from).transpose()
    }

    async fn fetch_required(&self, id: u64) -> Result<RequestRecord, StoreError> {
        self.fetch(id).await?.ok_or(StoreError::NotFound(id))
    }

    async fn insert(&self, new: &NewRequest, status: RequestStatus) -> Result<RequestRecord, StoreError> {
        let cols = DetailColumns::from(&new.detail);
        let result = sqlx::query(
            r#"
            INSERT INTO requests
                (kind, employee_id, employee_name, status, description,
                 request_date, start_date, end_date, number_of_days,
                 day_part, permit_window, permit_approval, medical_report)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(new.detail.kind().to_string())
        .bind(new.employee_id)
        .bind(&new.employee_name)
        .bind(status.to_string())
        .bind(&new.description)
        .bind(cols.request_date)
        .bind(cols.start_date)
        .bind(cols.end_date)
        .bind(cols.number_of_days)
        .bind(cols.day_part)
        .bind(cols.permit_window)
        .bind(cols.permit_approval)
        .bind(cols.medical_report)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, employee_id = new.employee_id, "insert request failed");
            db_err(e)
        })?;

        self.fetch_required(result.last_insert_id()).await
    }

    /// Distinguishes a stale source status from a missing row after a
    /// status-conditional mutation touched nothing.
    async fn conflict_or_missing(&self, id: u64) -> StoreError {
        match self.fetch(id).await {
            Ok(Some(_)) => StoreError::Conflict(id),
            Ok(None) => StoreError::NotFound(id),
            Err(e) => e,
        }
    }
}

impl RequestStore for MySqlStore {
    async fn create_request(&self, new: &NewRequest) -> Result<RequestRecord, StoreError> {
        self.insert(new, RequestStatus::Pending).await
    }

    async fn assign_request(&self, new: &NewRequest) -> Result<RequestRecord, StoreError> {
        self.insert(new, RequestStatus::AssignedManually).await
    }

    async fn accept_request(&self, id: u64) -> Result<RequestRecord, StoreError> {
        let result = sqlx::query("UPDATE requests SET status = ? WHERE id = ? AND status = ?")
            .bind(RequestStatus::Accepted.to_string())
            .bind(id)
            .bind(RequestStatus::Pending.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(self.conflict_or_missing(id).await);
        }
        self.fetch_required(id).await
    }

    async fn reject_request(&self, id: u64, comment: &str) -> Result<RequestRecord, StoreError> {
        if comment.trim().is_empty() {
            return Err(StoreError::Validation("reject requires a comment".into()));
        }
        let result =
            sqlx::query("UPDATE requests SET status = ?, comment = ? WHERE id = ? AND status = ?")
                .bind(RequestStatus::Rejected.to_string())
                .bind(comment.trim())
                .bind(id)
                .bind(RequestStatus::Pending.to_string())
                .execute(&self.pool)
                .await
                .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(self.conflict_or_missing(id).await);
        }
        self.fetch_required(id).await
    }

    async fn update_request(
        &self,
        id: u64,
        patch: &RequestPatch,
        from: RequestStatus,
        to: RequestStatus,
    ) -> Result<RequestRecord, StoreError> {
        let cols = DetailColumns::from(&patch.detail);
        let result = sqlx::query(
            r#"
            UPDATE requests
            SET description = ?, status = ?,
                request_date = ?, start_date = ?, end_date = ?, number_of_days = ?,
                day_part = ?, permit_window = ?, permit_approval = ?, medical_report = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(&patch.description)
        .bind(to.to_string())
        .bind(cols.request_date)
        .bind(cols.start_date)
        .bind(cols.end_date)
        .bind(cols.number_of_days)
        .bind(cols.day_part)
        .bind(cols.permit_window)
        .bind(cols.permit_approval)
        .bind(cols.medical_report)
        .bind(id)
        .bind(from.to_string())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(self.conflict_or_missing(id).await);
        }
        self.fetch_required(id).await
    }

    async fn delete_request(&self, id: u64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM requests WHERE id = ? AND status IN (?, ?, ?)")
            .bind(id)
            .bind(RequestStatus::Accepted.to_string())
            .bind(RequestStatus::Edited.to_string())
            .bind(RequestStatus::AssignedManually.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(self.conflict_or_missing(id).await);
        }
        Ok(())
    }

    async fn convert_request(
        &self,
        id: u64,
        payload: &ConversionPayload,
    ) -> Result<RequestRecord, StoreError> {
        // Close + create inside one transaction; any failure rolls the
        // home visit back untouched.
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let original = sqlx::query_as::<_, RequestRow>(&format!(
            "{} WHERE id = ? AND kind = ? FOR UPDATE",
            SELECT_SQL
        ))
        .bind(id)
        .bind(RequestKind::HomeVisit.to_string())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| StoreError::Conversion(e.to_string()))?
        .ok_or(StoreError::NotFound(id))?;

        sqlx::query("DELETE FROM requests WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Conversion(e.to_string()))?;

        let result = sqlx::query(
            r#"
            INSERT INTO requests
                (kind, employee_id, employee_name, status, description,
                 start_date, end_date, number_of_days, permit_approval, medical_report)
            VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?, ?)
            "#,
        )
        .bind(RequestKind::SickLeave.to_string())
        .bind(original.employee_id)
        .bind(&original.employee_name)
        .bind(RequestStatus::Pending.to_string())
        .bind(&payload.description)
        .bind(payload.date)
        .bind(payload.date)
        .bind(payload.permit_approval)
        .bind(&payload.medical_report)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Conversion(e.to_string()))?;

        let new_id = result.last_insert_id();
        tx.commit()
            .await
            .map_err(|e| StoreError::Conversion(e.to_string()))?;

        self.fetch_required(new_id).await
    }

    async fn list_requests(&self, filter: &FilterSignature) -> Result<RequestPage, StoreError> {
        let per_page = filter.effective_page_size();
        let page = filter.effective_page();
        let offset = (page - 1) * per_page;

        // -------------------------
        // WHERE clause
        // -------------------------
        let mut where_sql = String::from(" WHERE kind = ?");
        let mut args: Vec<FilterValue> = vec![FilterValue::Str(filter.kind.to_string())];

        if let Some(employee_id) = filter.employee_id {
            where_sql.push_str(" AND employee_id = ?");
            args.push(FilterValue::U64(employee_id));
        }
        if let Some(status) = filter.status {
            where_sql.push_str(" AND status = ?");
            args.push(FilterValue::Str(status.to_string()));
        }
        if let Some(start) = filter.start_date {
            where_sql.push_str(" AND COALESCE(request_date, start_date) >= ?");
            args.push(FilterValue::Date(start));
        }
        if let Some(end) = filter.end_date {
            where_sql.push_str(" AND COALESCE(request_date, start_date) <= ?");
            args.push(FilterValue::Date(end));
        }
        if let Some(query) = filter.search_query.as_deref() {
            let pattern = format!("%{}%", query.to_lowercase());
            match filter.search_key.unwrap_or(SearchKey::EmployeeName) {
                SearchKey::EmployeeName => {
                    where_sql.push_str(" AND LOWER(employee_name) LIKE ?");
                }
                SearchKey::Id => {
                    where_sql.push_str(" AND CAST(id AS CHAR) LIKE ?");
                }
            }
            args.push(FilterValue::Str(pattern));
        }

        // -------------------------
        // COUNT query
        // -------------------------
        let count_sql = format!("SELECT COUNT(*) FROM requests{}", where_sql);
        let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
        for arg in &args {
            count_q = match arg {
                FilterValue::U64(v) => count_q.bind(*v),
                FilterValue::Str(s) => count_q.bind(s.clone()),
                FilterValue::Date(d) => count_q.bind(*d),
            };
        }
        let total_records = count_q.fetch_one(&self.pool).await.map_err(db_err)?;

        // -------------------------
        // DATA query
        // -------------------------
        let data_sql = format!(
            "{}{} ORDER BY requested_at DESC, id DESC LIMIT ? OFFSET ?",
            SELECT_SQL, where_sql
        );
        let mut data_q = sqlx::query_as::<_, RequestRow>(&data_sql);
        for arg in args {
            data_q = match arg {
                FilterValue::U64(v) => data_q.bind(v),
                FilterValue::Str(s) => data_q.bind(s),
                FilterValue::Date(d) => data_q.bind(d),
            };
        }
        let rows = data_q
            .bind(per_page)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        let data = rows
            .into_iter()
            .map(RequestRecord::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RequestPage {
            data,
            page,
            per_page,
            total_records,
            total_pages: (total_records as u64).div_ceil(per_page),
        })
    }

    async fn get_request(&self, id: u64) -> Result<Option<RequestRecord>, StoreError> {
        self.fetch(id).await
    }
}

const SELECT_SQL: &str = r#"
    SELECT id, kind, employee_id, employee_name, status, description, comment,
           requested_at, request_date, start_date, end_date, number_of_days,
           day_part, permit_window, permit_approval, medical_report
    FROM requests
"#;

// Helper enum for typed SQLx binding
enum FilterValue {
    U64(u64),
    Str(String),
    Date(NaiveDate),
}

fn db_err(e: sqlx::Error) -> StoreError {
    StoreError::Transient(e.to_string())
}

/// Flat row shape; the kind column decides which of the nullable columns are
/// meaningful.
#[derive(sqlx::FromRow)]
struct RequestRow {
    id: u64,
    kind: String,
    employee_id: u64,
    employee_name: String,
    status: String,
    description: String,
    comment: Option<String>,
    requested_at: DateTime<Utc>,
    request_date: Option<NaiveDate>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    number_of_days: Option<u32>,
    day_part: Option<String>,
    permit_window: Option<String>,
    permit_approval: Option<bool>,
    medical_report: Option<String>,
}

impl TryFrom<RequestRow> for RequestRecord {
    type Error = StoreError;

    fn try_from(row: RequestRow) -> Result<Self, StoreError> {
        let corrupt = || StoreError::Transient(format!("malformed row for request {}", row.id));

        let kind: RequestKind = row.kind.parse().map_err(|_| corrupt())?;
        let status: RequestStatus = row.status.parse().map_err(|_| corrupt())?;

        let range = || -> Result<DateRange, StoreError> {
            Ok(DateRange {
                start_date: row.start_date.ok_or_else(corrupt)?,
                end_date: row.end_date.ok_or_else(corrupt)?,
                number_of_days: row.number_of_days.ok_or_else(corrupt)?,
            })
        };

        let detail = match kind {
            RequestKind::OrdinaryLeave => RequestDetail::OrdinaryLeave { range: range()? },
            RequestKind::CasualLeave => RequestDetail::CasualLeave { range: range()? },
            RequestKind::SickLeave => RequestDetail::SickLeave {
                range: range()?,
                permit_approval: row.permit_approval.unwrap_or(false),
                medical_report: row.medical_report.clone(),
            },
            RequestKind::HomeVisit => RequestDetail::HomeVisit {
                date: row.request_date.ok_or_else(corrupt)?,
                permit_approval: row.permit_approval.unwrap_or(false),
                medical_report: row.medical_report.clone(),
            },
            RequestKind::Mission => RequestDetail::Mission {
                date: row.request_date.ok_or_else(corrupt)?,
                day_part: row
                    .day_part
                    .as_deref()
                    .unwrap_or_default()
                    .parse()
                    .map_err(|_| corrupt())?,
            },
            RequestKind::Permit => RequestDetail::Permit {
                date: row.request_date.ok_or_else(corrupt)?,
                window: row
                    .permit_window
                    .as_deref()
                    .unwrap_or_default()
                    .parse()
                    .map_err(|_| corrupt())?,
            },
        };

        Ok(RequestRecord {
            id: row.id,
            employee_id: row.employee_id,
            employee_name: row.employee_name,
            status,
            requested_at: row.requested_at,
            description: row.description,
            comment: row.comment,
            detail,
        })
    }
}

/// Nullable column set for one detail payload.
#[derive(Default)]
struct DetailColumns {
    request_date: Option<NaiveDate>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    number_of_days: Option<u32>,
    day_part: Option<String>,
    permit_window: Option<String>,
    permit_approval: Option<bool>,
    medical_report: Option<String>,
}

impl From<&RequestDetail> for DetailColumns {
    fn from(detail: &RequestDetail) -> Self {
        let mut cols = Self::default();
        match detail {
            RequestDetail::OrdinaryLeave { range } | RequestDetail::CasualLeave { range } => {
                cols.start_date = Some(range.start_date);
                cols.end_date = Some(range.end_date);
                cols.number_of_days = Some(range.number_of_days);
            }
            RequestDetail::SickLeave {
                range,
                permit_approval,
                medical_report,
            } => {
                cols.start_date = Some(range.start_date);
                cols.end_date = Some(range.end_date);
                cols.number_of_days = Some(range.number_of_days);
                cols.permit_approval = Some(*permit_approval);
                cols.medical_report = medical_report.clone();
            }
            RequestDetail::HomeVisit {
                date,
                permit_approval,
                medical_report,
            } => {
                cols.request_date = Some(*date);
                cols.permit_approval = Some(*permit_approval);
                cols.medical_report = medical_report.clone();
            }
            RequestDetail::Mission { date, day_part } => {
                cols.request_date = Some(*date);
                cols.day_part = Some(day_part.to_string());
            }
            RequestDetail::Permit { date, window } => {
                cols.request_date = Some(*date);
                cols.permit_window = Some(window.to_string());
            }
        }
        cols
    }
}
