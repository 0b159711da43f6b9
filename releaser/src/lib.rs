//! Slipway release pipeline library.
//!
//! This crate provides the core functionality for validating, versioning,
//! building, bundling and publishing tagged packages. It is used by the
//! `slipway` CLI binary and can be consumed programmatically for testing or
//! custom release workflows.
//!
//! # Modules
//!
//! - [`bundle`] - Bundle naming, metadata and archive packaging
//! - [`checks`] - Lint and test command execution and reporting
//! - [`cli`] - Command-line argument definitions
//! - [`config`] - Project configuration from `slipway.toml`
//! - [`dist`] - Build artifact discovery
//! - [`error`] - Pipeline error types
//! - [`git`] - Commit hash and tag queries against the project repository
//! - [`output`] - Progress lines, summaries and the dry-run plan
//! - [`publish`] - Package index uploads
//! - [`release`] - The release pipeline itself
//! - [`runner`] - External command execution with timeouts
//! - [`store`] - The local bundle archive store and release history

pub mod bundle;
pub mod checks;
pub mod cli;
pub mod config;
pub mod dist;
pub mod error;
pub mod git;
pub mod output;
pub mod publish;
pub mod release;
pub mod runner;
pub mod store;
