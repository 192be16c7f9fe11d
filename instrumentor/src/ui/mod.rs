//! Terminal rendering for command results.

pub mod table;
