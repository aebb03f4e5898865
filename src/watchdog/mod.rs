//! Watchdog reconciler: periodic drift detection and repair.

mod reconciler;

pub use reconciler::{CheckRecord, CycleReport, reconcile_once};
