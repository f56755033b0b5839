#![deny(clippy::all)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

//! Shared utilities used by the harness library and its CLI.

pub mod common;
pub use common::*;
