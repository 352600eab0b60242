//! Paperfolio Library
//!
//! Core components of the paper-trading portfolio service: the ledger
//! domain, the portfolio application service, market-data access, and
//! SQLite persistence.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod persistence;
