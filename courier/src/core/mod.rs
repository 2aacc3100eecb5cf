//! Deterministic, pure logic shared by the courier.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod builder;
pub mod classifier;
pub mod eosio;
pub mod error;
pub mod keys;
pub mod planner;
pub mod registry;
pub mod state;
pub mod types;
