//! Rewrite counters

use crate::provider::RewriteOutcome;
use crate::storage::CounterRecord;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Lock-free request counters
#[derive(Debug, Default)]
pub struct Counters {
    processed: AtomicU64,
    cleaned: AtomicU64,
    redirected: AtomicU64,
    blocked: AtomicU64,
    whitelisted: AtomicU64,
    dirty: AtomicBool,
}

impl Counters {
    pub fn restore(record: CounterRecord) -> Self {
        Self {
            processed: AtomicU64::new(record.processed),
            cleaned: AtomicU64::new(record.cleaned),
            redirected: AtomicU64::new(record.redirected),
            blocked: AtomicU64::new(record.blocked),
            whitelisted: AtomicU64::new(record.whitelisted),
            dirty: AtomicBool::new(false),
        }
    }

    /// Counts one request handled by a provider
    pub fn record(&self, outcome: &RewriteOutcome) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        if outcome.whitelisted {
            self.whitelisted.fetch_add(1, Ordering::Relaxed);
        } else if outcome.cancel {
            self.blocked.fetch_add(1, Ordering::Relaxed);
        } else if outcome.redirect {
            self.redirected.fetch_add(1, Ordering::Relaxed);
        } else if outcome.changed {
            self.cleaned.fetch_add(1, Ordering::Relaxed);
        }
        self.dirty.store(true, Ordering::Release);
    }

    pub fn snapshot(&self) -> CounterRecord {
        CounterRecord {
            processed: self.processed.load(Ordering::Relaxed),
            cleaned: self.cleaned.load(Ordering::Relaxed),
            redirected: self.redirected.load(Ordering::Relaxed),
            blocked: self.blocked.load(Ordering::Relaxed),
            whitelisted: self.whitelisted.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.processed,
            &self.cleaned,
            &self.redirected,
            &self.blocked,
            &self.whitelisted,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        self.dirty.store(true, Ordering::Release);
    }

    /// Returns a snapshot if a counter changed since the last call
    pub fn take_dirty(&self) -> Option<CounterRecord> {
        self.dirty
            .swap(false, Ordering::AcqRel)
            .then(|| self.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_classifies_outcomes() {
        let counters = Counters::default();
        counters.record(&RewriteOutcome {
            changed: true,
            ..Default::default()
        });
        counters.record(&RewriteOutcome {
            changed: true,
            redirect: true,
            ..Default::default()
        });
        counters.record(&RewriteOutcome {
            cancel: true,
            ..Default::default()
        });
        counters.record(&RewriteOutcome {
            whitelisted: true,
            ..Default::default()
        });
        counters.record(&RewriteOutcome::default());

        assert_eq!(
            counters.snapshot(),
            CounterRecord {
                processed: 5,
                cleaned: 1,
                redirected: 1,
                blocked: 1,
                whitelisted: 1,
            }
        );
    }

    #[test]
    fn test_dirty_flag() {
        let counters = Counters::restore(CounterRecord {
            processed: 7,
            ..Default::default()
        });
        assert!(counters.take_dirty().is_none());

        counters.record(&RewriteOutcome::default());
        assert_eq!(counters.take_dirty().map(|c| c.processed), Some(8));
        assert!(counters.take_dirty().is_none());

        counters.reset();
        assert_eq!(counters.take_dirty(), Some(CounterRecord::default()));
    }
}
