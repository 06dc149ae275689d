//! Domain logic for plancheck.
//!
//! This crate is intentionally I/O-free: it reads plan text and applies policy.

mod judge;
mod parse;

pub use judge::{Judgement, judge};
pub use parse::{KNOWN_OPERATORS, parse_plan};
