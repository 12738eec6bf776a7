//! Terminal output helpers
//!
//! Plain `[OK]`/`[FAIL]` lines in CI and non-interactive environments,
//! glyphs and an indicatif progress bar in a terminal.

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{
    key_value, remark, section, step_error_detail, step_ok, step_ok_detail, step_warn_hint,
};
pub use progress::{format_bytes, FetchProgress};
