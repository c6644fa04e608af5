//! Native dependency installer library.
//!
//! This crate reads a declarative manifest of third-party native library
//! dependencies and fulfils each one from a prebuilt package cache, a
//! binary-package registry, or a from-source CMake build. It is used by the
//! `install-deps` CLI binary and can be consumed programmatically for testing
//! or custom installation workflows.
//!
//! # Modules
//!
//! - [`archive`] - Archive download, digests, extraction, and packaging
//! - [`build`] - Multi-variant CMake builds from source
//! - [`cache`] - Hash-verified fetches from package caches
//! - [`cli`] - Command-line argument definitions
//! - [`configure`] - CMake configuration of the current project
//! - [`error`] - Semantic error types
//! - [`git`] - Source checkouts pinned to a commit
//! - [`list`] - Listing of downloadable and buildable dependencies
//! - [`logging`] - `tracing` subscriber on stderr
//! - [`manifest`] - Manifest model, parser, and validation
//! - [`output`] - Progress and result output
//! - [`pipeline`] - Fulfillment planning and execution
//! - [`platform`] - Host platform identification
//! - [`process`] - External command execution
//! - [`registry`] - Registry-resolved binary packages
//! - [`stager`] - Target directory preparation, locking, and file copies
//! - [`toolchain`] - CMake generators and the Visual Studio environment

pub mod archive;
pub mod build;
pub mod cache;
pub mod cli;
pub mod configure;
pub mod error;
pub mod git;
pub mod list;
pub mod logging;
pub mod manifest;
pub mod output;
pub mod pipeline;
pub mod platform;
pub mod process;
pub mod registry;
pub mod stager;
#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
pub mod toolchain;
