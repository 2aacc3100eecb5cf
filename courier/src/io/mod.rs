//! I/O adapters: configuration, HTTP, inventory scanning, and chain RPC.

pub mod chain;
pub mod config;
pub mod http;
pub mod scanner;
pub mod submitter;
