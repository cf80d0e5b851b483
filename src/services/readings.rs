use crate::{
    db::{self, DbPool},
    entities::{
        meter::{self, Entity as Meter, MeterKind},
        reading::{self, Entity as Reading},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    middleware_helpers::retry::{with_retry, ConflictRetryPolicy, RetryConfig},
    models::BillingMonth,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use utoipa::ToSchema;

use super::require_finite;

/// One meter's bill for a month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct InvoiceLine {
    pub meter_id: i32,
    pub tenant: String,
    pub nickname: String,
    #[schema(value_type = String, example = "2024-02")]
    pub month: BillingMonth,
    /// Most recent earlier month with a reading, if any
    #[schema(value_type = Option<String>, example = "2024-01")]
    pub previous_month: Option<BillingMonth>,
    pub last_value: f64,
    pub current_value: f64,
    /// `current_value - last_value`; negative after a meter rollback
    pub diff: f64,
}

/// A single value in a batch of monthly readings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ReadingEntry {
    pub meter_id: i32,
    pub value: f64,
}

/// Meters of one kind and the values recorded for them in a month
#[derive(Debug, Clone, Serialize)]
pub struct MonthReadings {
    pub month: BillingMonth,
    pub kind: MeterKind,
    pub meters: Vec<meter::Model>,
    /// meter id -> value, only for meters with a reading that month
    pub readings: BTreeMap<i32, f64>,
}

/// Builds invoice lines from a snapshot of meters and their readings.
///
/// A meter without a reading in `month` yields no line. The previous value
/// is the reading with the greatest month strictly before `month`, or 0.
pub fn invoice_lines(
    meters: &[meter::Model],
    readings: &[reading::Model],
    month: BillingMonth,
) -> Vec<InvoiceLine> {
    meters
        .iter()
        .filter_map(|meter| {
            let mut current: Option<f64> = None;
            let mut last: Option<(BillingMonth, f64)> = None;

            for row in readings.iter().filter(|r| r.meter_id == meter.id) {
                let Ok(row_month) = row.month.parse::<BillingMonth>() else {
                    continue;
                };
                if row_month == month {
                    current = Some(row.value);
                } else if row_month < month && last.map_or(true, |(m, _)| row_month > m) {
                    last = Some((row_month, row.value));
                }
            }

            let current_value = current?;
            let last_value = last.map_or(0.0, |(_, value)| value);
            Some(InvoiceLine {
                meter_id: meter.id,
                tenant: meter.tenant.clone(),
                nickname: meter.nickname.clone(),
                month,
                previous_month: last.map(|(m, _)| m),
                last_value,
                current_value,
                diff: current_value - last_value,
            })
        })
        .collect()
}

/// Overwrites the (meter, month) reading or creates it. With `kind` set,
/// a meter of another kind is rejected.
async fn upsert_in<C: ConnectionTrait>(
    db: &C,
    meter_id: i32,
    kind: Option<MeterKind>,
    month: &str,
    value: f64,
) -> Result<reading::Model, ServiceError> {
    let meter = Meter::find_by_id(meter_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("meter {} does not exist", meter_id)))?;
    if let Some(kind) = kind.filter(|k| *k != meter.kind) {
        return Err(ServiceError::ValidationError(format!(
            "meter {} measures {}, not {}",
            meter_id, meter.kind, kind
        )));
    }

    let existing = Reading::find()
        .filter(reading::Column::MeterId.eq(meter_id))
        .filter(reading::Column::Month.eq(month))
        .one(db)
        .await?;

    let saved = match existing {
        Some(row) => {
            let mut active: reading::ActiveModel = row.into();
            active.value = Set(value);
            active.update(db).await?
        }
        None => {
            reading::ActiveModel {
                meter_id: Set(meter_id),
                month: Set(month.to_string()),
                value: Set(value),
                recorded_at: Set(Utc::now()),
                ..Default::default()
            }
            .insert(db)
            .await?
        }
    };

    Ok(saved)
}

/// Monthly readings and the invoices derived from them
pub struct ReadingService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    retry: RetryConfig,
}

impl ReadingService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, max_attempts: u32) -> Self {
        Self {
            db_pool,
            event_sender,
            retry: RetryConfig::with_max_attempts(max_attempts),
        }
    }

    /// Records `value` for the meter's month, replacing any earlier value.
    /// A lost race on the first insert is retried as an update.
    #[instrument(skip(self, month), fields(month = %month))]
    pub async fn upsert_reading(
        &self,
        meter_id: i32,
        month: BillingMonth,
        value: f64,
    ) -> Result<reading::Model, ServiceError> {
        let value = require_finite("value", value)?;
        let key = month.key();

        let saved = with_retry(&self.retry, ConflictRetryPolicy, || {
            let key = key.clone();
            async move {
                db::transaction(self.db_pool.as_ref(), "billing.upsert_reading", move |txn| {
                    Box::pin(async move { upsert_in(txn, meter_id, None, &key, value).await })
                })
                .await
            }
        })
        .await?;

        info!(meter_id, reading_id = saved.id, value, "Reading recorded");
        self.publish_reading(&saved);
        Ok(saved)
    }

    /// Applies a batch of readings for one month, all or nothing. Every
    /// meter in the batch must be of `kind`.
    #[instrument(skip(self, month, entries), fields(month = %month, count = entries.len()))]
    pub async fn record_readings(
        &self,
        kind: MeterKind,
        month: BillingMonth,
        entries: Vec<ReadingEntry>,
    ) -> Result<Vec<reading::Model>, ServiceError> {
        for entry in &entries {
            require_finite("value", entry.value)?;
        }
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let key = month.key();
        let saved = with_retry(&self.retry, ConflictRetryPolicy, || {
            let key = key.clone();
            let entries = entries.clone();
            async move {
                db::transaction(self.db_pool.as_ref(), "billing.record_readings", move |txn| {
                    Box::pin(async move {
                        let mut saved = Vec::with_capacity(entries.len());
                        for entry in entries {
                            let row =
                                upsert_in(txn, entry.meter_id, Some(kind), &key, entry.value)
                                    .await?;
                            saved.push(row);
                        }
                        Ok(saved)
                    })
                })
                .await
            }
        })
        .await?;

        info!(count = saved.len(), "Readings recorded");
        for row in &saved {
            self.publish_reading(row);
        }
        Ok(saved)
    }

    /// The reading map for every meter of `kind` in `month`
    pub async fn month_readings(
        &self,
        kind: MeterKind,
        month: BillingMonth,
    ) -> Result<MonthReadings, ServiceError> {
        let db = self.db_pool.as_ref();
        let meters = self.meters_of_kind(kind).await?;
        let ids: Vec<i32> = meters.iter().map(|m| m.id).collect();

        let readings = Reading::find()
            .filter(reading::Column::MeterId.is_in(ids))
            .filter(reading::Column::Month.eq(month.key()))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(|r| (r.meter_id, r.value))
            .collect();

        Ok(MonthReadings {
            month,
            kind,
            meters,
            readings,
        })
    }

    /// Invoice line for one meter, `None` when it has no reading that month
    pub async fn compute_invoice(
        &self,
        meter_id: i32,
        month: BillingMonth,
    ) -> Result<Option<InvoiceLine>, ServiceError> {
        let db = self.db_pool.as_ref();
        let meter = Meter::find_by_id(meter_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("meter {} does not exist", meter_id)))?;

        let current = Reading::find()
            .filter(reading::Column::MeterId.eq(meter_id))
            .filter(reading::Column::Month.eq(month.key()))
            .one(db)
            .await
            .map_err(ServiceError::db_error)?;
        let Some(current) = current else {
            debug!(meter_id, month = %month, "No reading for month");
            return Ok(None);
        };

        let previous = Reading::find()
            .filter(reading::Column::MeterId.eq(meter_id))
            .filter(reading::Column::Month.lt(month.key()))
            .order_by_desc(reading::Column::Month)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?;

        let snapshot: Vec<reading::Model> = std::iter::once(current).chain(previous).collect();
        Ok(invoice_lines(&[meter], &snapshot, month).into_iter().next())
    }

    /// Invoice lines for every meter of `kind` that has a reading in `month`
    pub async fn list_invoices(
        &self,
        kind: MeterKind,
        month: BillingMonth,
    ) -> Result<Vec<InvoiceLine>, ServiceError> {
        let meters = self.meters_of_kind(kind).await?;
        let ids: Vec<i32> = meters.iter().map(|m| m.id).collect();

        let readings = Reading::find()
            .filter(reading::Column::MeterId.is_in(ids))
            .filter(reading::Column::Month.lte(month.key()))
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        Ok(invoice_lines(&meters, &readings, month))
    }

    async fn meters_of_kind(&self, kind: MeterKind) -> Result<Vec<meter::Model>, ServiceError> {
        Meter::find()
            .filter(meter::Column::Kind.eq(kind))
            .order_by_asc(meter::Column::Id)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    fn publish_reading(&self, row: &reading::Model) {
        self.event_sender.publish(Event::ReadingRecorded {
            meter_id: row.meter_id,
            month: row.month.clone(),
            value: row.value,
        });
    }
}
