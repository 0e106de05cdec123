//! Operation counters and rotation timing.
//!
//! Built once at startup and passed explicitly into the components that need
//! it; there is no global registry. All updates go through atomics, so the
//! struct is safe to share across workers without locking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// The operations the service counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Create,
    Read,
    Update,
    Delete,
    Rotate,
}

impl OperationKind {
    pub const ALL: [OperationKind; 5] = [
        OperationKind::Create,
        OperationKind::Read,
        OperationKind::Update,
        OperationKind::Delete,
        OperationKind::Rotate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Create => "create",
            OperationKind::Read => "read",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
            OperationKind::Rotate => "rotate",
        }
    }

    fn index(self) -> usize {
        match self {
            OperationKind::Create => 0,
            OperationKind::Read => 1,
            OperationKind::Update => 2,
            OperationKind::Delete => 3,
            OperationKind::Rotate => 4,
        }
    }
}

/// Upper bounds (inclusive, milliseconds) of the rotation duration buckets.
/// One implicit overflow bucket follows the last bound.
const BUCKET_BOUNDS_MS: [u64; 11] = [1, 2, 5, 10, 25, 50, 100, 250, 500, 1000, 5000];

/// Monotonic operation counters plus a duration histogram over the full
/// decrypt→compute→encrypt→persist span of a rotation.
pub struct OperationMetrics {
    counters: [AtomicU64; 5],
    buckets: [AtomicU64; BUCKET_BOUNDS_MS.len() + 1],
    rotation_count: AtomicU64,
    rotation_total_micros: AtomicU64,
}

impl OperationMetrics {
    pub fn new() -> Self {
        Self {
            counters: std::array::from_fn(|_| AtomicU64::new(0)),
            buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            rotation_count: AtomicU64::new(0),
            rotation_total_micros: AtomicU64::new(0),
        }
    }

    /// Counts one completed operation.
    pub fn increment(&self, op: OperationKind) {
        self.counters[op.index()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self, op: OperationKind) -> u64 {
        self.counters[op.index()].load(Ordering::Relaxed)
    }

    /// Records the duration of one completed rotation.
    pub fn observe_rotation(&self, elapsed: Duration) {
        let millis = elapsed.as_millis() as u64;
        let bucket = BUCKET_BOUNDS_MS
            .iter()
            .position(|&bound| millis <= bound)
            .unwrap_or(BUCKET_BOUNDS_MS.len());
        self.buckets[bucket].fetch_add(1, Ordering::Relaxed);
        self.rotation_count.fetch_add(1, Ordering::Relaxed);
        self.rotation_total_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters, for logging and inspection.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            operations: OperationKind::ALL.map(|op| (op, self.count(op))),
            rotation_count: self.rotation_count.load(Ordering::Relaxed),
            rotation_total: Duration::from_micros(
                self.rotation_total_micros.load(Ordering::Relaxed),
            ),
            rotation_buckets: (0..self.buckets.len())
                .map(|i| RotationBucket {
                    le_millis: BUCKET_BOUNDS_MS.get(i).copied(),
                    count: self.buckets[i].load(Ordering::Relaxed),
                })
                .collect(),
        }
    }
}

impl Default for OperationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub operations: [(OperationKind, u64); 5],
    pub rotation_count: u64,
    pub rotation_total: Duration,
    pub rotation_buckets: Vec<RotationBucket>,
}

/// One histogram bucket; `le_millis` is `None` for the overflow bucket.
#[derive(Debug, Clone, Copy)]
pub struct RotationBucket {
    pub le_millis: Option<u64>,
    pub count: u64,
}
