//! Rapid type analysis: stage 2b.
//!
//! Worklist construction of the reachable-function set. The analysis tracks
//! the set of named types whose values can be constructed in reachable code
//! and resolves each dynamic method call against the method sets of those
//! live types. A type that becomes live later re-resolves every dynamic
//! call name seen so far, so the result is independent of processing order.

use std::collections::VecDeque;

use indexmap::IndexSet;
use log::{debug, trace};

use crate::resolver::{DeclArena, DeclId};
use crate::ssa::{CallSite, FuncId, SsaProgram};

/// Result of the analysis: a conservative over-approximation of the
/// functions that may execute from the roots.
#[derive(Debug)]
pub struct RtaResult {
    pub reachable: IndexSet<FuncId>,
    pub live_types: IndexSet<DeclId>,
}

impl RtaResult {
    pub fn is_reachable(&self, id: FuncId) -> bool {
        self.reachable.contains(&id)
    }
}

/// Run the analysis from the given root functions.
pub fn analyze(ssa: &SsaProgram, arena: &DeclArena, roots: &[FuncId]) -> RtaResult {
    let mut reachable: IndexSet<FuncId> = IndexSet::new();
    let mut live_types: IndexSet<DeclId> = IndexSet::new();
    let mut dynamic_names: IndexSet<String> = IndexSet::new();
    let mut queue: VecDeque<FuncId> = roots.iter().copied().collect();

    while let Some(fid) = queue.pop_front() {
        if !reachable.insert(fid) {
            continue;
        }
        let func = ssa.func(fid);
        trace!("rta: reach {}", func.name);

        for child in &func.children {
            queue.push_back(*child);
        }

        for ty in &func.instantiated {
            if live_types.insert(*ty) {
                // A newly live type satisfies every dynamic call name seen
                // so far with its matching methods.
                for &method in &arena.get(*ty).methods {
                    if dynamic_names.contains(&arena.get(method).name) {
                        if let Some(&target) = ssa.by_decl.get(&method) {
                            queue.push_back(target);
                        }
                    }
                }
            }
        }

        for call in &func.calls {
            match call {
                CallSite::Static(decl) => {
                    if let Some(&target) = ssa.by_decl.get(decl) {
                        queue.push_back(target);
                    }
                }
                CallSite::PkgInit(pkg) => {
                    if let Some(&target) = ssa.pkg_init.get(pkg) {
                        queue.push_back(target);
                    }
                }
                CallSite::Dynamic(name) => {
                    if dynamic_names.insert(name.clone()) {
                        for &ty in &live_types {
                            for &method in &arena.get(ty).methods {
                                if arena.get(method).name == *name {
                                    if let Some(&target) = ssa.by_decl.get(&method) {
                                        queue.push_back(target);
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    debug!(
        "rta: {} reachable functions, {} live types",
        reachable.len(),
        live_types.len()
    );
    RtaResult {
        reachable,
        live_types,
    }
}
