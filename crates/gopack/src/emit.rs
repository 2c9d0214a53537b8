//! Output assembly: stage 4 of the pipeline.
//!
//! Produces the single bundled source file: generated-code header, package
//! clause, the entry package's standard-library imports alphabetized, each
//! dependency package's surviving code behind a banner in topological
//! order, one synthetic `func init` concatenating every initializer body,
//! and finally the entry package's own declarations. The whole buffer is
//! built before anything touches the filesystem, so a failure never leaves
//! a partial output file.

use std::fs;
use std::path::Path;

use log::debug;

use crate::error::BundleError;
use crate::loader::Program;
use crate::rewrite::RewriteOutput;
use crate::stdlib::is_std_import;
use crate::syntax::printer;

const HEADER: &str = "// Code generated by gopack; DO NOT EDIT.\n";

/// Assemble the bundled source text.
pub fn emit(program: &Program, output: &RewriteOutput) -> Result<String, BundleError> {
    let mut out = String::with_capacity(16 * 1024);
    out.push_str(HEADER);
    out.push_str("package main\n\n");

    let imports = entry_std_imports(program);
    if !imports.is_empty() {
        out.push_str("import (\n");
        for (alias, path) in &imports {
            match alias {
                Some(alias) => out.push_str(&format!("\t{alias} \"{path}\"\n")),
                None => out.push_str(&format!("\t\"{path}\"\n")),
            }
        }
        out.push_str(")\n\n");
    }

    for (pkg, decls) in &output.dep_code {
        if decls.is_empty() {
            continue;
        }
        let package = program.package(*pkg);
        out.push_str(&format!("// ---- {} ----\n", package.import_path));
        for decl in decls {
            out.push_str(&printer::decl_to_string(decl));
            out.push_str("\n\n");
        }
    }

    out.push_str("func init() {\n");
    for body in &output.init_bodies {
        out.push_str(&printer::stmts_to_string(&body.stmts, 1));
    }
    out.push_str("}\n\n");

    for decl in &output.entry_code {
        out.push_str(&printer::decl_to_string(decl));
        out.push_str("\n\n");
    }

    while out.ends_with("\n\n") {
        out.pop();
    }
    debug!("emit: produced {} bytes", out.len());
    Ok(out)
}

/// The entry package's standard-library imports, deduplicated and sorted
/// by path. Aliases are preserved so rewritten references keep resolving.
fn entry_std_imports(program: &Program) -> Vec<(Option<String>, String)> {
    let mut imports: Vec<(Option<String>, String)> = Vec::new();
    for file in &program.entry_package().files {
        for import in &file.imports {
            if !is_std_import(&import.path) {
                continue;
            }
            let alias = import.alias.as_ref().map(|a| a.name.clone());
            if !imports.iter().any(|(_, p)| *p == import.path) {
                imports.push((alias, import.path.clone()));
            }
        }
    }
    imports.sort_by(|a, b| a.1.cmp(&b.1));
    imports
}

/// Write the finished buffer to disk.
pub fn write_output(path: &Path, content: &str) -> Result<(), BundleError> {
    fs::write(path, content)
        .map_err(|e| BundleError::EmitFailed(format!("{}: {e}", path.display())))
}
