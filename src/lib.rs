//! This crate has no library code of its own. It exists to wire
//! `stagecraft-shared` and `stagecraft-core` together for the end-to-end
//! integration tests under `tests/`, hosting cross-crate scenarios rather
//! than duplicating logic that belongs in its workspace members.
