//! The bundling pipeline.
//!
//! Strictly linear: load, analyze reachability, rewrite, emit. Each stage
//! consumes the previous stage's output; a failure in any stage aborts with
//! its classified error.

use std::path::Path;

use log::info;

use crate::emit;
use crate::error::BundleError;
use crate::loader;
use crate::reachability;
use crate::rewrite;

/// Bundle the executable package in `dir` into a single source file,
/// returned as text.
pub fn bundle_dir(dir: &Path) -> Result<String, BundleError> {
    let program = loader::load(dir)?;
    info!(
        "loaded {} packages, entry {}",
        program.packages.len(),
        program.entry_package().import_path
    );

    let reach = reachability::analyze(&program)?;
    let renames = rewrite::build_rename_map(&program, &reach)?;
    let output = rewrite::rewrite(&program, &reach, &renames)?;
    emit::emit(&program, &output)
}
