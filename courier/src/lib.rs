//! Unattended NFT transfer agent for EOSIO chains.
//!
//! The agent scans an account's inventory, splits it into categories,
//! allocates assets to recipients in priority order, and broadcasts one
//! signed transfer per recipient. Failures are classified into continue or
//! stop decisions so the loop can run without supervision.
//!
//! - **[`core`]**: Pure logic (category registry, planning, wire format,
//!   keys, failure classification). No I/O.
//! - **[`io`]**: Config loading and the HTTP adapters for the asset index
//!   and the chain node, behind traits so tests can script them.
//!
//! [`cycle`] runs one scan cycle; [`looping`] repeats cycles on schedule.

pub mod core;
pub mod cycle;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod looping;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
