//! Shared storage integration tests.
//!
//! Tests the store traits against every backend. Each backend test file
//! builds its stores and runs these through the `run_*_tests!` macros.

pub mod check_store_tests;
pub mod ledger_store_tests;
pub mod sequence_tests;
pub mod transfer_audit_tests;
pub mod workflow_store_tests;
