//! Reachability analysis: stage 2 of the pipeline.
//!
//! Determines the set of top-level declarations that must survive into the
//! output. The sequence: lower to SSA-lite, run RTA from the entry points,
//! index nodes to functions, collect root declarations referenced inside
//! reachable functions, build the textual reference graph over declaration
//! bodies, propagate, and close method sets over reachable types. The
//! reachability set is closed under all three edge kinds, so propagation
//! and method-set closure run to a joint fixpoint.

use std::collections::VecDeque;

use indexmap::IndexSet;
use log::debug;
use rustc_hash::FxHashMap;

use crate::error::BundleError;
use crate::loader::Program;
use crate::resolver::{DeclId, DeclKind};
use crate::rta;
use crate::ssa::{self, FuncId};
use crate::syntax::ast::{walk_decl, walk_file, Decl, Spec, WalkEvent};

/// The analysis result: declarations that must appear in the output.
#[derive(Debug)]
pub struct Reachability {
    pub decls: IndexSet<DeclId>,
    pub reachable_fns: IndexSet<FuncId>,
}

impl Reachability {
    pub fn contains(&self, id: DeclId) -> bool {
        self.decls.contains(&id)
    }
}

/// Compute the reachability set for a loaded program.
pub fn analyze(program: &Program) -> Result<Reachability, BundleError> {
    let ssa = ssa::build(program)?;

    // Entry points: the entry package's main and its initializers only;
    // dependency initializers are reached through the synthetic init chain.
    let main_decl = program
        .decls
        .lookup(program.entry, "main")
        .filter(|id| program.decls.get(*id).kind == DeclKind::Func)
        .ok_or_else(|| {
            BundleError::TypeCheckFailed(
                "func main is undeclared in the main package".to_string(),
            )
        })?;
    let mut roots = vec![ssa.by_decl[&main_decl]];
    if let Some(&init) = ssa.pkg_init.get(&program.entry) {
        roots.push(init);
    }

    let rta = rta::analyze(&ssa, &program.decls, &roots);

    let root_decls = collect_root_decls(program, &ssa, &rta);
    let graph = build_decl_graph(program);

    // Seeds: textual roots first, then every declaration whose SSA function
    // RTA proved reachable (covers functions nothing references textually,
    // such as initializers).
    let mut seeds: Vec<DeclId> = root_decls.into_iter().collect();
    for &fid in &rta.reachable {
        if let Some(decl) = ssa.func(fid).decl {
            seeds.push(decl);
        }
    }

    let decls = propagate(program, &graph, seeds);
    debug!(
        "reachability: {} of {} declarations survive",
        decls.len(),
        program.decls.len()
    );

    Ok(Reachability {
        decls,
        reachable_fns: rta.reachable,
    })
}

/// Walk every file keeping a node-ancestry-derived function stack; an
/// identifier use lexically inside a reachable function roots its referent.
fn collect_root_decls(
    program: &Program,
    ssa: &ssa::SsaProgram,
    rta: &rta::RtaResult,
) -> IndexSet<DeclId> {
    let mut roots = IndexSet::new();
    for &pkg in &program.topo {
        let package = program.package(pkg);
        for file in &package.files {
            let mut fn_stack: Vec<Option<FuncId>> = Vec::new();
            walk_file(file, &mut |event| match event {
                WalkEvent::EnterFunc(node) => {
                    fn_stack.push(ssa.by_node.get(&node).copied());
                }
                WalkEvent::ExitFunc(_) => {
                    fn_stack.pop();
                }
                WalkEvent::Ident(ident) => {
                    let inside_reachable = fn_stack
                        .last()
                        .copied()
                        .flatten()
                        .is_some_and(|fid| rta.is_reachable(fid));
                    if inside_reachable {
                        if let Some(&decl) = program.info.uses.get(&ident.id) {
                            roots.insert(decl);
                        }
                    }
                }
            });
        }
    }
    roots
}

/// Edges from each top-level declaration to every declaration its defining
/// subtree references.
fn build_decl_graph(program: &Program) -> FxHashMap<DeclId, Vec<DeclId>> {
    let mut graph: FxHashMap<DeclId, Vec<DeclId>> = FxHashMap::default();

    for &pkg in &program.topo {
        let package = program.package(pkg);
        for file in &package.files {
            for decl in &file.decls {
                let parents = decl_parents(program, decl);
                if parents.is_empty() {
                    continue;
                }
                let mut referents = Vec::new();
                walk_decl(decl, &mut |event| {
                    if let WalkEvent::Ident(ident) = event {
                        if let Some(&target) = program.info.uses.get(&ident.id) {
                            referents.push(target);
                        }
                    }
                });
                for parent in parents {
                    graph.entry(parent).or_default().extend(&referents);
                }
            }
        }
    }

    graph
}

/// The declaration identities a top-level AST declaration defines. Grouped
/// value specs yield one parent per name; every name shares the group's
/// references, mirroring how a shared initializer expression binds them.
fn decl_parents(program: &Program, decl: &Decl) -> Vec<DeclId> {
    let mut parents = Vec::new();
    match decl {
        Decl::Func(func) => {
            if let Some(&id) = program.info.defs.get(&func.name.id) {
                parents.push(id);
            }
        }
        Decl::Gen(gen) => {
            for spec in &gen.specs {
                match spec {
                    Spec::Type(ts) => {
                        if let Some(&id) = program.info.defs.get(&ts.name.id) {
                            parents.push(id);
                        }
                    }
                    Spec::Value(vs) => {
                        for name in &vs.names {
                            if let Some(&id) = program.info.defs.get(&name.id) {
                                parents.push(id);
                            }
                        }
                    }
                }
            }
        }
    }
    parents
}

/// Breadth-first closure over the declaration graph, alternated with
/// method-set closure until neither grows the set.
fn propagate(
    program: &Program,
    graph: &FxHashMap<DeclId, Vec<DeclId>>,
    seeds: Vec<DeclId>,
) -> IndexSet<DeclId> {
    let mut set: IndexSet<DeclId> = IndexSet::new();
    let mut queue: VecDeque<DeclId> = seeds.into();

    loop {
        while let Some(current) = queue.pop_front() {
            if !set.insert(current) {
                continue;
            }
            if let Some(referents) = graph.get(&current) {
                for &next in referents {
                    if !set.contains(&next) {
                        queue.push_back(next);
                    }
                }
            }
        }

        // Method-set closure: dispatch through an interface value leaves no
        // textual reference to the callee, so every method of a reachable
        // type (value and pointer receiver alike) is retained.
        let mut grew = false;
        let snapshot: Vec<DeclId> = set.iter().copied().collect();
        for id in snapshot {
            if program.decls.get(id).kind != DeclKind::Type {
                continue;
            }
            for &method in &program.decls.get(id).methods {
                if !set.contains(&method) {
                    queue.push_back(method);
                    grew = true;
                }
            }
        }
        if !grew {
            break;
        }
    }

    set
}
