//! Single-host SSH session orchestration: credential selection, bounded
//! connect with host verification, failure classification into a stable
//! exit-code taxonomy, and an interactive shell multiplexer.

pub mod probe;
