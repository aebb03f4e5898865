//! Boot orchestration: the staged sequence, its markers, the dead-man's
//! switch and the one-shot boot-timeout supervisor.

pub mod heartbeat;
pub mod monitor;
pub mod orchestrator;
pub mod timeout;

pub use monitor::supervise_boot;
pub use orchestrator::{BootMode, BootSummary, detect_boot_mode, run_boot};
pub use timeout::boot_timeout_pass;
