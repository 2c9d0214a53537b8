//! Classified bundler errors.
//!
//! Every stage aborts the pipeline with one of these; nothing is recovered
//! locally. The CLI prints the error on a single line and exits nonzero.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BundleError {
    /// The loader could not produce a package graph: unreadable directory,
    /// unparsable source, or an unresolvable import.
    #[error("load failed: {0}")]
    LoadFailed(String),

    /// The target directory holds no executable (`package main`) package.
    #[error("no entry package: {0} does not contain package main")]
    NoEntryPackage(String),

    /// A loaded package failed identifier resolution.
    #[error("type check failed: {0}")]
    TypeCheckFailed(String),

    /// SSA construction rejected the program.
    #[error("ssa build failed: {0}")]
    SsaBuildFailed(String),

    /// Two distinct declarations mapped to the same output identifier.
    #[error("rename collision: {first} and {second} both emit as {output}")]
    RenameCollision {
        first: String,
        second: String,
        output: String,
    },

    /// Serialization failed or the output file could not be written.
    #[error("emit failed: {0}")]
    EmitFailed(String),
}
