//! PRISM CLI library - command implementations and utilities.
//!
//! This crate provides the core functionality for the `prism` CLI. The
//! binary is a thin wrapper around this library.

pub mod commands;
