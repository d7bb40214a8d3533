//! Profitshare - profit-sharing vesting and check-run engine
//!
//! Keeps the append-only profit ledger, computes vested balances from
//! vesting schedules, and drives year-end check runs from balance
//! calculation through check numbering, printing, payment file transfer
//! and confirmation.

pub mod config;
pub mod domain;
pub mod interfaces;
pub mod services;
pub mod storage;
pub mod utils;
