//! Jira mirror - incremental Jira Cloud to SQLite sync
//!
//! This crate provides the core functionality for the `jmirror` CLI tool.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`remote`] - Jira REST client and pagination
//! - [`projection`] - Nested JSON records to flat typed rows
//! - [`storage`] - SQLite mirror store and run log
//! - [`sync`] - Key-set diffing and step orchestration
//! - [`notify`] - End-of-run notifications
//! - [`config`] - Configuration management
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod notify;
pub mod projection;
pub mod remote;
pub mod storage;
pub mod sync;

pub use error::{Error, Result};
