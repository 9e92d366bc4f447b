//! Small shared helpers for the relay crates.
//!
//! `clock` reads the wall clock for token expiry and status snapshots;
//! `text_utils` normalizes operator-supplied values.

pub mod clock;
pub mod text_utils;

pub use clock::{unix_now_millis, unix_now_secs, TokenExpiry};
pub use text_utils::{non_empty_trimmed, split_comma_list};
