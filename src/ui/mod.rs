//! UI module for consistent CLI output
//!
//! Status lines and progress go to stderr so payloads written to stdout
//! stay byte-exact. Falls back to plain tagged lines in CI and
//! non-interactive environments.
//!
//! # Example
//!
//! ```rust,ignore
//! use hoard::ui::{self, UiContext, TransferProgress};
//!
//! let ctx = UiContext::detect();
//! let progress = TransferProgress::new(&ctx, "e3b0c442");
//! progress.inc(4096);
//! progress.finish();
//!
//! ui::step_ok_detail(&ctx, "Fetched", "4.0 KiB");
//! ```

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{key_value_status, step_info, step_ok_detail, step_warn_hint};
pub use progress::{format_bytes, TransferProgress};
