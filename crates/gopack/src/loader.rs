//! Package loading: stage 1 of the pipeline.
//!
//! Given the entry directory, discovers the enclosing module, parses the
//! entry package and its transitive first-party imports, verifies the entry
//! is executable, resolves identifiers, and orders the packages so every
//! package precedes its importers.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use log::debug;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::FxHashMap;

use crate::error::BundleError;
use crate::resolver::{self, DeclArena, Resolution};
use crate::stdlib::is_std_import;
use crate::syntax::ast::File;
use crate::syntax::parser::{parse_file, IdGen};

/// Unique identifier of a loaded package; indexes `Program::packages`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PkgId(pub u32);

/// One loaded first-party package, immutable after loading.
#[derive(Debug)]
pub struct Package {
    pub id: PkgId,
    /// Module-qualified import path; unique across the graph.
    pub import_path: String,
    /// Last path segment, the qualifier used in source code. Not unique.
    pub short_name: String,
    /// Package clause name (`main` for the entry package).
    pub name: String,
    pub dir: PathBuf,
    pub files: Vec<File>,
}

/// The loaded program: every first-party package with resolution tables.
#[derive(Debug)]
pub struct Program {
    /// All packages in load order, indexed by `PkgId`.
    pub packages: Vec<Package>,
    /// Dependency-topological order, dependencies first, entry last.
    pub topo: Vec<PkgId>,
    pub entry: PkgId,
    pub decls: DeclArena,
    pub info: Resolution,
}

impl Program {
    pub fn package(&self, id: PkgId) -> &Package {
        &self.packages[id.0 as usize]
    }

    pub fn entry_package(&self) -> &Package {
        self.package(self.entry)
    }

    /// Dependency packages in topological order, entry excluded.
    pub fn dependencies(&self) -> impl Iterator<Item = &Package> {
        self.topo
            .iter()
            .filter(|id| **id != self.entry)
            .map(|id| self.package(*id))
    }
}

/// Load the executable package rooted at `dir` and its transitive
/// first-party dependencies.
pub fn load(dir: &Path) -> Result<Program, BundleError> {
    let dir = dir
        .canonicalize()
        .map_err(|e| BundleError::LoadFailed(format!("{}: {e}", dir.display())))?;
    let module = find_module(&dir)?;
    let mut ids = IdGen::default();

    let mut packages: Vec<Package> = Vec::new();
    let mut by_path: IndexMap<String, PkgId> = IndexMap::new();

    let entry_path = match &module {
        Some(module) => module.import_path_for(&dir),
        None => dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| ".".to_string()),
    };

    // Depth-first load from the entry directory; discovery order does not
    // matter, topo_order re-sorts the result.
    let mut queue: Vec<(String, PathBuf)> = vec![(entry_path.clone(), dir.clone())];
    while let Some((import_path, pkg_dir)) = queue.pop() {
        if by_path.contains_key(&import_path) {
            continue;
        }
        let id = PkgId(packages.len() as u32);
        let package = load_package(id, &import_path, &pkg_dir, &mut ids)?;
        debug!(
            "loaded package {} ({} files) from {}",
            package.import_path,
            package.files.len(),
            pkg_dir.display()
        );
        for file in &package.files {
            for import in &file.imports {
                if is_std_import(&import.path) {
                    continue;
                }
                let module = module.as_ref().ok_or_else(|| {
                    BundleError::LoadFailed(format!(
                        "cannot resolve import {:?} outside a module",
                        import.path
                    ))
                })?;
                let dep_dir = module.dir_for(&import.path).ok_or_else(|| {
                    BundleError::LoadFailed(format!(
                        "import {:?} is outside module {}",
                        import.path, module.path
                    ))
                })?;
                queue.push((import.path.clone(), dep_dir));
            }
        }
        by_path.insert(import_path, id);
        packages.push(package);
    }

    let entry = by_path[&entry_path];
    if packages[entry.0 as usize].name != "main" {
        return Err(BundleError::NoEntryPackage(dir.display().to_string()));
    }

    let topo = topo_order(&packages, &by_path)?;
    let (decls, info) = resolver::resolve(&packages, &topo, &by_path)?;

    Ok(Program {
        packages,
        topo,
        entry,
        decls,
        info,
    })
}

fn load_package(
    id: PkgId,
    import_path: &str,
    dir: &Path,
    ids: &mut IdGen,
) -> Result<Package, BundleError> {
    let mut file_names: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| BundleError::LoadFailed(format!("{}: {e}", dir.display())))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension().is_some_and(|ext| ext == "go")
                && !path
                    .file_name()
                    .is_some_and(|n| n.to_string_lossy().ends_with("_test.go"))
        })
        .collect();
    file_names.sort();

    if file_names.is_empty() {
        return Err(BundleError::LoadFailed(format!(
            "no Go source files in {}",
            dir.display()
        )));
    }

    let mut files = Vec::with_capacity(file_names.len());
    for path in &file_names {
        let src = fs::read_to_string(path)
            .map_err(|e| BundleError::LoadFailed(format!("{}: {e}", path.display())))?;
        let file = parse_file(&src, &path.to_string_lossy(), ids)
            .map_err(|e| BundleError::LoadFailed(e.to_string()))?;
        files.push(file);
    }

    let name = files[0].package.name.clone();
    for file in &files[1..] {
        if file.package.name != name {
            return Err(BundleError::LoadFailed(format!(
                "{}: package name {} conflicts with {}",
                file.name, file.package.name, name
            )));
        }
    }

    let short_name = import_path
        .rsplit('/')
        .next()
        .unwrap_or(import_path)
        .to_string();

    Ok(Package {
        id,
        import_path: import_path.to_string(),
        short_name,
        name,
        dir: dir.to_path_buf(),
        files,
    })
}

/// Topologically order packages with dependencies before dependents.
fn topo_order(
    packages: &[Package],
    by_path: &IndexMap<String, PkgId>,
) -> Result<Vec<PkgId>, BundleError> {
    let mut graph: DiGraph<PkgId, ()> = DiGraph::new();
    let mut nodes: FxHashMap<PkgId, NodeIndex> = FxHashMap::default();
    for package in packages {
        nodes.insert(package.id, graph.add_node(package.id));
    }
    for package in packages {
        for file in &package.files {
            for import in &file.imports {
                if let Some(&dep) = by_path.get(&import.path) {
                    // Edge from dependency to dependent so the sort yields
                    // leaves first.
                    let from = nodes[&dep];
                    let to = nodes[&package.id];
                    if !graph.contains_edge(from, to) {
                        graph.add_edge(from, to, ());
                    }
                }
            }
        }
    }
    toposort(&graph, None)
        .map(|order| order.into_iter().map(|n| graph[n]).collect())
        .map_err(|_| BundleError::LoadFailed("import cycle among first-party packages".into()))
}

/// The enclosing Go module, located by walking up to the nearest `go.mod`.
struct Module {
    path: String,
    root: PathBuf,
}

impl Module {
    /// Import path of a directory inside the module.
    fn import_path_for(&self, dir: &Path) -> String {
        match dir.strip_prefix(&self.root) {
            Ok(rel) if rel.as_os_str().is_empty() => self.path.clone(),
            Ok(rel) => format!("{}/{}", self.path, rel.to_string_lossy().replace('\\', "/")),
            Err(_) => self.path.clone(),
        }
    }

    /// Directory of a module-qualified import path, if it lies inside this
    /// module.
    fn dir_for(&self, import_path: &str) -> Option<PathBuf> {
        if import_path == self.path {
            return Some(self.root.clone());
        }
        let rest = import_path.strip_prefix(&self.path)?.strip_prefix('/')?;
        Some(self.root.join(rest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_maps_directories_to_import_paths() {
        let module = Module {
            path: "example.com/prog".to_string(),
            root: PathBuf::from("/work/prog"),
        };
        assert_eq!(
            module.import_path_for(Path::new("/work/prog")),
            "example.com/prog"
        );
        assert_eq!(
            module.import_path_for(Path::new("/work/prog/lib/inner")),
            "example.com/prog/lib/inner"
        );
    }

    #[test]
    fn module_maps_import_paths_to_directories() {
        let module = Module {
            path: "example.com/prog".to_string(),
            root: PathBuf::from("/work/prog"),
        };
        assert_eq!(
            module.dir_for("example.com/prog/lib"),
            Some(PathBuf::from("/work/prog/lib"))
        );
        assert_eq!(
            module.dir_for("example.com/prog"),
            Some(PathBuf::from("/work/prog"))
        );
        assert_eq!(module.dir_for("example.com/other/lib"), None);
    }
}

fn find_module(start: &Path) -> Result<Option<Module>, BundleError> {
    for dir in start.ancestors() {
        let candidate = dir.join("go.mod");
        if candidate.is_file() {
            let text = fs::read_to_string(&candidate)
                .map_err(|e| BundleError::LoadFailed(format!("{}: {e}", candidate.display())))?;
            let path = text
                .lines()
                .find_map(|line| line.trim().strip_prefix("module "))
                .map(|rest| rest.trim().trim_matches('"').to_string())
                .ok_or_else(|| {
                    BundleError::LoadFailed(format!(
                        "{}: missing module directive",
                        candidate.display()
                    ))
                })?;
            return Ok(Some(Module {
                path,
                root: dir.to_path_buf(),
            }));
        }
    }
    Ok(None)
}
