//! KEIBA: race scoring, bet combination and stake planner
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod scoring;
pub mod ranking;
pub mod betting;
pub mod session;
pub mod data;
pub mod dashboard;
