//! Plumbing shared by the Instrumentor command-line programs.

pub mod config;
