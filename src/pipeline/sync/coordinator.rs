//! Merge scheduling: debounce and re-entrancy.
//!
//! One merge at a time per coordinator. A request arriving while a merge is
//! in flight is not dropped — it flips a pending flag and exactly one
//! follow-up merge runs when the current one finishes. Inputs are
//! re-snapshotted at the start of every merge, so the last merge always
//! reflects every input available when it started; intermediate merges are
//! not guaranteed to be observed.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use uuid::Uuid;

use super::merge::merge_form_data;
use super::store::FormStore;
use super::types::{FormDataState, SyncError};

/// Coordinator tunables. Defaults, not invariants.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Minimum interval between full recomputations.
    pub debounce_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { debounce_ms: 500 }
    }
}

#[derive(Default)]
struct MergeGate {
    last_started: Option<Instant>,
    in_flight: bool,
    pending: bool,
}

pub struct SyncCoordinator {
    store: Arc<dyn FormStore>,
    config: SyncConfig,
    gate: Mutex<MergeGate>,
}

impl SyncCoordinator {
    pub fn new(store: Arc<dyn FormStore>, config: SyncConfig) -> Self {
        Self {
            store,
            config,
            gate: Mutex::new(MergeGate::default()),
        }
    }

    /// Request a recomputation of the farm's form.
    ///
    /// Returns the merged state, or `None` when the request was coalesced
    /// into a merge already in flight (the in-flight merge's follow-up will
    /// cover this request's inputs).
    pub async fn request_merge(
        &self,
        farm_id: &Uuid,
    ) -> Result<Option<FormDataState>, SyncError> {
        {
            let mut gate = self.gate.lock().await;
            if gate.in_flight {
                gate.pending = true;
                tracing::debug!(farm_id = %farm_id, "Merge in flight, follow-up scheduled");
                return Ok(None);
            }
            gate.in_flight = true;
        }

        let result = self.merge_cycle(farm_id).await;

        if result.is_err() {
            // Never leave the gate latched after a store failure
            let mut gate = self.gate.lock().await;
            gate.in_flight = false;
            gate.pending = false;
        }

        result.map(Some)
    }

    async fn merge_cycle(&self, farm_id: &Uuid) -> Result<FormDataState, SyncError> {
        loop {
            // Debounce against the previous merge start
            let wait = {
                let gate = self.gate.lock().await;
                gate.last_started
                    .map(|started| {
                        Duration::from_millis(self.config.debounce_ms)
                            .saturating_sub(started.elapsed())
                    })
                    .unwrap_or(Duration::ZERO)
            };
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }

            {
                let mut gate = self.gate.lock().await;
                gate.last_started = Some(Instant::now());
                // Requests up to this point are covered by the snapshot below
                gate.pending = false;
            }

            let inputs = self.store.load_inputs(farm_id)?;
            let form = merge_form_data(&inputs);
            self.store.persist(farm_id, &form)?;

            tracing::debug!(
                farm_id = %farm_id,
                extractions = inputs.extractions.len(),
                edits = inputs.edits.len(),
                fields = form.field_names().len(),
                "Form merge complete"
            );

            let mut gate = self.gate.lock().await;
            if gate.pending {
                // A request arrived mid-merge: run the follow-up now
                continue;
            }
            gate.in_flight = false;
            return Ok(form);
        }
    }
}
