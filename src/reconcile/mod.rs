//! Incremental sync: tolerant row comparison and trailing-window diffing.

pub mod comparator;
pub mod window;

pub use comparator::{compare, differing_fields, RowStatus};
pub use window::{backfill, plan_window_start, trailing_slice, validate_window, WindowReconciler};
