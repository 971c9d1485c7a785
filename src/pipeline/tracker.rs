use super::RecurringScheduler;
use crate::audit::RequestLog;
use crate::client::{ClientError, IndexFieldType, IngestionClient, RecordOutcome};
use crate::config::ConfigError;
use crate::domain::Record;
use crate::encode::{Encoder, Format};
use parking_lot::Mutex as StateMutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Field appended to a failed record before it is dead-lettered.
const ERROR_MESSAGE_FIELD: &str = "ERROR_MESSAGE";

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("expected exactly one identity field in the index schema, found {0}")]
    IdentityFieldUnresolved(usize),
    #[error("client error: {0}")]
    Client(#[from] ClientError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

struct TrackedUpdate {
    update_id: String,
    records: HashMap<String, Record>,
}

struct Inner {
    client: Arc<IngestionClient>,
    audit: Arc<RequestLog>,
    identity_field: String,
    scheduler: RecurringScheduler,
    updates: StateMutex<Vec<Arc<TrackedUpdate>>>,
    tick_gate: tokio::sync::Mutex<()>,
}

/// Watches dispatched updates until the remote side reports a terminal
/// status, then routes per-record failures to the dead-letter sink.
///
/// Tracking is disabled entirely when no interval is configured, or when the
/// dead-letter log is off (tracking failures nobody can see is pointless);
/// a disabled tracker accepts `add` calls as no-ops.
pub struct StatusTracker {
    inner: Option<Arc<Inner>>,
    started: AtomicBool,
}

impl StatusTracker {
    /// Resolves the record-identity field from the remote schema and builds
    /// the tracker. Fatal when the schema does not declare exactly one
    /// identity-typed field.
    pub async fn new(
        client: Arc<IngestionClient>,
        interval: Option<Duration>,
        audit: Arc<RequestLog>,
    ) -> Result<Self, TrackerError> {
        let interval = interval.filter(|d| !d.is_zero());
        let interval = match interval {
            Some(d) if !audit.deadletter_enabled() => {
                warn!(
                    interval_ms = d.as_millis() as u64,
                    "tracking cadence is set while the deadletter log is disabled, turning off status tracking"
                );
                None
            }
            other => other,
        };

        let Some(interval) = interval else {
            return Ok(Self {
                inner: None,
                started: AtomicBool::new(false),
            });
        };

        let scheduler = RecurringScheduler::new(interval)?;
        let identity_field = Self::find_identity_field(&client).await?;
        debug!(identity_field, "status tracker resolved the identity field");

        Ok(Self {
            inner: Some(Arc::new(Inner {
                client,
                audit,
                identity_field,
                scheduler,
                updates: StateMutex::new(Vec::new()),
                tick_gate: tokio::sync::Mutex::new(()),
            })),
            started: AtomicBool::new(false),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    pub fn tracked_count(&self) -> usize {
        self.inner.as_ref().map_or(0, |inner| inner.updates.lock().len())
    }

    /// Registers an accepted update for status tracking. No-op when tracking
    /// is disabled.
    pub fn add(&self, update_id: &str, records: &[Record]) {
        let Some(inner) = &self.inner else { return };

        let mut by_identity = HashMap::with_capacity(records.len());
        for record in records {
            match record.get(&inner.identity_field) {
                Some(value) => {
                    by_identity.insert(identity_text(value), record.clone());
                }
                None => warn!(
                    update_id,
                    identity_field = inner.identity_field,
                    "record without an identity value cannot be tracked"
                ),
            }
        }

        inner.updates.lock().push(Arc::new(TrackedUpdate {
            update_id: update_id.to_string(),
            records: by_identity,
        }));
    }

    /// Starts the polling cadence. Idempotent: later calls return `None`.
    pub fn start(&self, cancellation: CancellationToken) -> Option<JoinHandle<()>> {
        let inner = self.inner.as_ref()?.clone();
        if self.started.swap(true, Ordering::SeqCst) {
            return None;
        }

        Some(tokio::spawn(async move {
            let scheduler_inner = inner.clone();
            inner
                .scheduler
                .run(
                    move || Inner::tick(scheduler_inner.clone()),
                    cancellation,
                )
                .await;
        }))
    }

    /// Runs a single poll sweep; no-op when tracking is disabled. The
    /// scheduled cadence calls this same sweep.
    pub async fn poll_once(&self) {
        if let Some(inner) = &self.inner {
            Inner::tick(inner.clone()).await;
        }
    }

    async fn find_identity_field(client: &IngestionClient) -> Result<String, TrackerError> {
        let schema = client.get_schema().await?;
        let mut identity_fields = schema
            .fields
            .iter()
            .filter(|f| f.field_type == IndexFieldType::Identity);

        match (identity_fields.next(), identity_fields.next()) {
            (Some(field), None) => Ok(field.name.clone()),
            (None, _) => Err(TrackerError::IdentityFieldUnresolved(0)),
            (Some(_), Some(_)) => {
                let total = schema
                    .fields
                    .iter()
                    .filter(|f| f.field_type == IndexFieldType::Identity)
                    .count();
                Err(TrackerError::IdentityFieldUnresolved(total))
            }
        }
    }
}

impl Inner {
    async fn tick(inner: Arc<Inner>) {
        // One sweep at a time; a tick that is still running blocks the next.
        let _gate = inner.tick_gate.lock().await;

        let snapshot: Vec<Arc<TrackedUpdate>> = inner.updates.lock().clone();
        let mut completed = HashSet::new();
        let mut failed_records = Vec::new();

        for update in &snapshot {
            // Poll failures leave the update pending for the next tick.
            let Ok(response) = inner.client.update_status(&update.update_id).await else {
                continue;
            };
            if !response.status.is_terminal() {
                continue;
            }

            completed.insert(update.update_id.clone());
            for record_status in &response.records {
                if record_status.status != RecordOutcome::Failed {
                    continue;
                }
                let Some(record) = update.records.get(&record_status.record_id) else {
                    warn!(
                        update_id = update.update_id,
                        record_id = record_status.record_id,
                        "remote reported a failed record the tracker never saw"
                    );
                    continue;
                };
                let mut annotated = record.clone();
                annotated.insert(
                    ERROR_MESSAGE_FIELD.to_string(),
                    serde_json::Value::String(
                        record_status.error_message.clone().unwrap_or_default(),
                    ),
                );
                failed_records.push(annotated);
            }
        }

        if !completed.is_empty() {
            inner
                .updates
                .lock()
                .retain(|u| !completed.contains(&u.update_id));
        }

        if !failed_records.is_empty() {
            warn!(
                count = failed_records.len(),
                "dead-lettering records that failed remote processing"
            );
            let body = Encoder::new(Format::JsonArray).encode_batch(&failed_records);
            inner.audit.log_failure(&body);
        }
    }
}

fn identity_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
