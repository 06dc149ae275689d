//! Plancheck workspace-level test utilities.
//!
//! This crate exists solely to support workspace-level integration tests,
//! particularly the BDD/cucumber tests in `tests/cucumber.rs`.
//!
//! The actual plancheck functionality is in the workspace member crates:
//! - `plancheck-types`: Scenario, predicate, and report contracts
//! - `plancheck-domain`: Plan parser and comparator (I/O-free)
//! - `plancheck-adapters`: Postgres session runner
//! - `plancheck-config`: Scenario file loading and validation
//! - `plancheck-app`: Application use cases
//! - `plancheck-cli`: CLI interface
