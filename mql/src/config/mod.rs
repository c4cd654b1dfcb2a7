//! Configuration module for the compiler.
//!
//! This module contains the options that steer a single compilation.

pub mod options;

pub use options::{CompileOptions, DEFAULT_MAX_DEPTH, DEFAULT_MAX_QUERY_LENGTH};
