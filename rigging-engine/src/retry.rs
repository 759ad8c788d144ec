use std::collections::BTreeMap;
use std::time::Duration;

use tokio::time::{Instant, sleep_until};
use tracing::{debug, warn};

use rigging_common::value::ConfigValue;

use crate::fields::FieldRegistry;

const MAX_RETRIES: u32 = 5;
const BASE_DELAY: Duration = Duration::from_millis(100);
const MAX_DELAY: Duration = Duration::from_secs(2);

struct RetryEntry {
    value: ConfigValue,
    attempts: u32,
    next_due: Instant,
}

/// Best-effort application of pending field values. A value scheduled
/// for a field that is not live yet (or whose widget cannot take it
/// yet, e.g. a select waiting for dynamic options) is retried with
/// exponential backoff and eventually abandoned. Failures never reach
/// the caller.
#[derive(Default)]
pub struct RetryQueue {
    pending: BTreeMap<String, RetryEntry>,
}

fn backoff(attempts: u32) -> Duration {
    BASE_DELAY
        .saturating_mul(2u32.saturating_pow(attempts))
        .min(MAX_DELAY)
}

impl RetryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts immediate application; on failure the pair is queued
    /// for retry.
    pub fn schedule(
        &mut self,
        registry: &mut FieldRegistry,
        field_id: impl Into<String>,
        value: ConfigValue,
    ) {
        let field_id = field_id.into();
        if registry.set_value(&field_id, &value) {
            self.pending.remove(&field_id);
            return;
        }
        debug!(field_id, "Field not ready, queuing value for retry");
        self.pending.insert(
            field_id,
            RetryEntry {
                value,
                attempts: 0,
                next_due: Instant::now() + backoff(0),
            },
        );
    }

    /// Retries every entry whose deadline has passed. Returns the
    /// number of entries still pending afterwards.
    pub fn run_due(&mut self, registry: &mut FieldRegistry) -> usize {
        let now = Instant::now();
        let due: Vec<String> = self
            .pending
            .iter()
            .filter(|(_, e)| e.next_due <= now)
            .map(|(id, _)| id.clone())
            .collect();

        for field_id in due {
            let Some(entry) = self.pending.get_mut(&field_id) else {
                continue;
            };
            // A field deleted mid-retry fails its set like any other
            // miss and ages out of the queue the same way.
            if registry.set_value(&field_id, &entry.value) {
                self.pending.remove(&field_id);
                continue;
            }
            entry.attempts += 1;
            if entry.attempts >= MAX_RETRIES {
                warn!(
                    field_id,
                    attempts = entry.attempts,
                    "Giving up on pending field value"
                );
                self.pending.remove(&field_id);
            } else {
                entry.next_due = now + backoff(entry.attempts);
            }
        }

        self.pending.len()
    }

    /// Earliest pending deadline, if anything is queued.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|e| e.next_due).min()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Awaits each deadline in turn until the queue is empty. Runs on
    /// the caller's task; no background work is spawned.
    pub async fn drain(&mut self, registry: &mut FieldRegistry) {
        while let Some(deadline) = self.next_deadline() {
            sleep_until(deadline).await;
            self.run_due(registry);
        }
    }
}
