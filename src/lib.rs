//! dsr-query - natural-language questions over the Daily Situation Report
//! table, with read-only SQL enforcement.
//!
//! This library exposes the core modules to the `dsrq` binary and to the
//! integration tests.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod generator;
pub mod logging;
pub mod pipeline;
pub mod safety;
