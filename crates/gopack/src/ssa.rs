//! SSA-lite function construction: stage 2a.
//!
//! Lowers every first-party package to a set of functions summarized at the
//! granularity the call-graph analysis needs: static call edges, dynamic
//! method-call names, the named types whose values the function can create,
//! and nested function literals. One function exists per top-level function,
//! method, `func init`, and function literal, plus one synthetic initializer
//! per package that reproduces Go's initialization order: it references the
//! package-level variable initializer expressions, calls the package's
//! `func init` bodies in source order, and calls the synthetic initializer
//! of every imported first-party package.
//!
//! Generic functions are materialized once per instantiation; every
//! instantiation shares the generic body's summary and additionally makes
//! its type arguments live.

use indexmap::IndexSet;
use log::{debug, trace};
use rustc_hash::FxHashMap;

use crate::error::BundleError;
use crate::loader::{PkgId, Program};
use crate::resolver::{DeclId, DeclKind};
use crate::syntax::ast::*;

/// Identity of one SSA function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FuncId(pub u32);

/// One outgoing edge of a function summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallSite {
    /// Call or reference to a named function, method, or `init` body.
    Static(DeclId),
    /// Method call whose receiver type is not syntactically apparent;
    /// resolved against the live type set during RTA.
    Dynamic(String),
    /// Call into another package's synthetic initializer.
    PkgInit(PkgId),
}

#[derive(Debug)]
pub struct Function {
    pub id: FuncId,
    pub pkg: PkgId,
    /// Display name for logs, e.g. `lib.LibFunc` or `main.main$1`.
    pub name: String,
    /// The declaration this function lowers, absent for function literals
    /// and synthetic initializers.
    pub decl: Option<DeclId>,
    /// The `FuncDecl`/`FuncLit` node, for the node-to-function index.
    pub syntax: Option<NodeId>,
    pub calls: Vec<CallSite>,
    /// Named type declarations whose values this function can construct.
    pub instantiated: Vec<DeclId>,
    /// Function literals nested in the body.
    pub children: Vec<FuncId>,
}

/// The lowered program.
#[derive(Debug)]
pub struct SsaProgram {
    pub funcs: Vec<Function>,
    /// Function/method/init declaration to its function.
    pub by_decl: FxHashMap<DeclId, FuncId>,
    /// `FuncDecl`/`FuncLit` node to its function: the node-to-function
    /// index consumed by the reachability walk.
    pub by_node: FxHashMap<NodeId, FuncId>,
    /// Synthetic initializer of each package.
    pub pkg_init: FxHashMap<PkgId, FuncId>,
    /// Materialized generic instantiations, keyed by the generic
    /// declaration and the spelled type arguments.
    pub instantiations: FxHashMap<(DeclId, String), FuncId>,
}

impl SsaProgram {
    pub fn func(&self, id: FuncId) -> &Function {
        &self.funcs[id.0 as usize]
    }
}

/// Lower all first-party packages.
pub fn build(program: &Program) -> Result<SsaProgram, BundleError> {
    let mut builder = Builder {
        program,
        ssa: SsaProgram {
            funcs: Vec::new(),
            by_decl: FxHashMap::default(),
            by_node: FxHashMap::default(),
            pkg_init: FxHashMap::default(),
            instantiations: FxHashMap::default(),
        },
    };
    for &pkg in &program.topo {
        builder.package(pkg)?;
    }
    debug!("ssa: lowered {} functions", builder.ssa.funcs.len());
    Ok(builder.ssa)
}

struct Builder<'a> {
    program: &'a Program,
    ssa: SsaProgram,
}

impl<'a> Builder<'a> {
    fn new_func(
        &mut self,
        pkg: PkgId,
        name: String,
        decl: Option<DeclId>,
        syntax: Option<NodeId>,
    ) -> FuncId {
        let id = FuncId(self.ssa.funcs.len() as u32);
        self.ssa.funcs.push(Function {
            id,
            pkg,
            name,
            decl,
            syntax,
            calls: Vec::new(),
            instantiated: Vec::new(),
            children: Vec::new(),
        });
        if let Some(decl) = decl {
            self.ssa.by_decl.insert(decl, id);
        }
        if let Some(node) = syntax {
            self.ssa.by_node.insert(node, id);
        }
        id
    }

    fn package(&mut self, pkg: PkgId) -> Result<(), BundleError> {
        let package = self.program.package(pkg);
        let pkg_name = package.short_name.clone();

        // Synthetic package initializer, created first so `func init`
        // bodies and variable initializers can attach to it.
        let init_id = self.new_func(pkg, format!("{pkg_name}.init"), None, None);
        self.ssa.pkg_init.insert(pkg, init_id);

        // Initializers of imported first-party packages run first.
        let mut imported: IndexSet<PkgId> = IndexSet::new();
        for file in &package.files {
            for import in &file.imports {
                for candidate in &self.program.packages {
                    if candidate.import_path == import.path {
                        imported.insert(candidate.id);
                    }
                }
            }
        }
        for dep in imported {
            self.ssa.funcs[init_id.0 as usize]
                .calls
                .push(CallSite::PkgInit(dep));
        }

        let mut init_count = 0u32;
        for file in &package.files {
            for decl in &file.decls {
                match decl {
                    Decl::Func(func) => {
                        let decl_id = self.program.info.defs.get(&func.name.id).copied();
                        let display = match &func.recv {
                            Some(_) => format!("{pkg_name}.{}", func.name.name),
                            None if func.name.name == "init" => {
                                init_count += 1;
                                format!("{pkg_name}.init#{init_count}")
                            }
                            None => format!("{pkg_name}.{}", func.name.name),
                        };
                        let fid = self.new_func(pkg, display, decl_id, Some(func.id));
                        if let Some(body) = &func.body {
                            self.summarize_block(fid, body);
                        } else {
                            return Err(BundleError::SsaBuildFailed(format!(
                                "{}: function {} has no body",
                                file.name, func.name.name
                            )));
                        }
                        if !func.type_params.is_empty() {
                            trace!("ssa: {} is generic", self.ssa.func(fid).name);
                        }
                        // `func init` bodies run from the synthetic
                        // initializer in source order.
                        if func.recv.is_none() && func.name.name == "init" {
                            if let Some(decl_id) = decl_id {
                                self.ssa.funcs[init_id.0 as usize]
                                    .calls
                                    .push(CallSite::Static(decl_id));
                            }
                        }
                    }
                    Decl::Gen(gen) => {
                        if gen.tok == DeclTok::Type {
                            continue;
                        }
                        // Package-level variable and constant initializer
                        // expressions execute as part of the synthetic
                        // initializer.
                        for spec in &gen.specs {
                            if let Spec::Value(vs) = spec {
                                for value in &vs.values {
                                    self.summarize_expr(init_id, value);
                                }
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn push_call(&mut self, fid: FuncId, call: CallSite) {
        let calls = &mut self.ssa.funcs[fid.0 as usize].calls;
        if !calls.contains(&call) {
            calls.push(call);
        }
    }

    fn push_instantiated(&mut self, fid: FuncId, ty: DeclId) {
        let instantiated = &mut self.ssa.funcs[fid.0 as usize].instantiated;
        if !instantiated.contains(&ty) {
            instantiated.push(ty);
        }
    }

    /// Record the effect of one resolved identifier use inside `fid`.
    fn reference(&mut self, fid: FuncId, decl: DeclId) {
        match self.program.decls.get(decl).kind {
            // A referenced function may be called here or escape as a
            // value; either way it is a call edge.
            DeclKind::Func | DeclKind::Method => self.push_call(fid, CallSite::Static(decl)),
            // Any referenced named type may have values constructed here
            // (literal, conversion, new/make, declared variable); all enter
            // the live type set.
            DeclKind::Type => self.push_instantiated(fid, decl),
            DeclKind::Var | DeclKind::Const | DeclKind::Init => {}
        }
    }

    /// Materialize a generic instantiation as its own function sharing the
    /// generic body's summary.
    fn materialize(&mut self, generic: DeclId, args: &[Expr], fid: FuncId) {
        let mut spelled = Vec::with_capacity(args.len());
        for arg in args {
            spelled.push(spell_type(arg));
        }
        let key = (generic, spelled.join(","));
        if let Some(&inst) = self.ssa.instantiations.get(&key) {
            self.ssa.funcs[fid.0 as usize].children.push(inst);
            return;
        }
        let base = self.program.decls.get(generic);
        let name = format!("{}[{}]", base.name, key.1);
        let inst = self.new_func(self.ssa.func(fid).pkg, name, None, None);
        // The instantiation behaves as the generic body plus liveness of
        // its type arguments; model it as a static edge to the generic
        // declaration, reached from the instantiation site.
        self.push_call(inst, CallSite::Static(generic));
        self.ssa.funcs[fid.0 as usize].children.push(inst);
        self.ssa.instantiations.insert(key, inst);
    }

    fn summarize_block(&mut self, fid: FuncId, block: &Block) {
        for stmt in &block.stmts {
            self.summarize_stmt(fid, stmt);
        }
    }

    fn summarize_stmt(&mut self, fid: FuncId, stmt: &Stmt) {
        match stmt {
            Stmt::Decl(gen) => {
                for spec in &gen.specs {
                    match spec {
                        Spec::Type(ts) => self.summarize_expr(fid, &ts.ty),
                        Spec::Value(vs) => {
                            if let Some(ty) = &vs.ty {
                                self.summarize_expr(fid, ty);
                            }
                            for value in &vs.values {
                                self.summarize_expr(fid, value);
                            }
                        }
                    }
                }
            }
            Stmt::Expr(e) | Stmt::Go(e) | Stmt::Defer(e) => self.summarize_expr(fid, e),
            Stmt::Assign { lhs, rhs, .. } => {
                for e in lhs.iter().chain(rhs) {
                    self.summarize_expr(fid, e);
                }
            }
            Stmt::IncDec { x, .. } => self.summarize_expr(fid, x),
            Stmt::Return(exprs) => {
                for e in exprs {
                    self.summarize_expr(fid, e);
                }
            }
            Stmt::If(stmt) => {
                if let Some(init) = &stmt.init {
                    self.summarize_stmt(fid, init);
                }
                self.summarize_expr(fid, &stmt.cond);
                self.summarize_block(fid, &stmt.then);
                if let Some(els) = &stmt.els {
                    self.summarize_stmt(fid, els);
                }
            }
            Stmt::For(stmt) => {
                match &stmt.header {
                    ForHeader::Classic { init, cond, post } => {
                        if let Some(init) = init {
                            self.summarize_stmt(fid, init);
                        }
                        if let Some(cond) = cond {
                            self.summarize_expr(fid, cond);
                        }
                        if let Some(post) = post {
                            self.summarize_stmt(fid, post);
                        }
                    }
                    ForHeader::Range { key, value, x, .. } => {
                        for e in [key, value].into_iter().flatten() {
                            self.summarize_expr(fid, e);
                        }
                        self.summarize_expr(fid, x);
                    }
                }
                self.summarize_block(fid, &stmt.body);
            }
            Stmt::Switch(stmt) => {
                if let Some(init) = &stmt.init {
                    self.summarize_stmt(fid, init);
                }
                if let Some(tag) = &stmt.tag {
                    self.summarize_expr(fid, tag);
                }
                for case in &stmt.cases {
                    for e in &case.exprs {
                        self.summarize_expr(fid, e);
                    }
                    for s in &case.body {
                        self.summarize_stmt(fid, s);
                    }
                }
            }
            Stmt::Block(block) => self.summarize_block(fid, block),
            Stmt::Labeled { stmt, .. } => self.summarize_stmt(fid, stmt),
            Stmt::Branch { .. } | Stmt::Empty => {}
        }
    }

    fn summarize_expr(&mut self, fid: FuncId, expr: &Expr) {
        match expr {
            Expr::Ident(ident) => {
                if let Some(&decl) = self.program.info.uses.get(&ident.id) {
                    self.reference(fid, decl);
                }
            }
            Expr::Lit { .. } => {}
            Expr::Composite { ty, elts } => {
                if let Some(ty) = ty {
                    self.summarize_expr(fid, ty);
                }
                for elt in elts {
                    self.summarize_expr(fid, elt);
                }
            }
            Expr::FuncLit(lit) => {
                let parent_name = self.ssa.func(fid).name.clone();
                let pkg = self.ssa.func(fid).pkg;
                let index = self.ssa.funcs[fid.0 as usize].children.len() + 1;
                let child =
                    self.new_func(pkg, format!("{parent_name}${index}"), None, Some(lit.id));
                self.ssa.funcs[fid.0 as usize].children.push(child);
                self.summarize_block(child, &lit.body);
            }
            Expr::Paren(inner) | Expr::Star(inner) => self.summarize_expr(fid, inner),
            Expr::Selector { x, sel } => {
                if let Some(&decl) = self.program.info.uses.get(&sel.id) {
                    // Qualified reference into another first-party package.
                    self.reference(fid, decl);
                    self.summarize_qualifier(fid, x);
                    return;
                }
                // Field access or method value on some receiver; the
                // callee, if any, is resolved dynamically.
                self.summarize_expr(fid, x);
                self.push_call(fid, CallSite::Dynamic(sel.name.clone()));
            }
            Expr::Index { x, indices } => {
                self.summarize_expr(fid, x);
                for index in indices {
                    self.summarize_expr(fid, index);
                }
                // A generic function or type instantiation materializes a
                // fresh function keyed by its type arguments.
                if let Some(generic) = self.resolved_decl(x) {
                    let info = self.program.decls.get(generic);
                    if matches!(info.kind, DeclKind::Func | DeclKind::Type)
                        && indices.iter().all(is_type_argument)
                    {
                        self.materialize(generic, indices, fid);
                    }
                }
            }
            Expr::Slice { x, low, high, max } => {
                self.summarize_expr(fid, x);
                for e in [low, high, max].into_iter().flatten() {
                    self.summarize_expr(fid, e);
                }
            }
            Expr::TypeAssert { x, ty } => {
                self.summarize_expr(fid, x);
                self.summarize_expr(fid, ty);
            }
            Expr::Call {
                fun,
                args,
                ..
            } => {
                self.summarize_expr(fid, fun);
                for arg in args {
                    self.summarize_expr(fid, arg);
                }
            }
            Expr::Unary { x, .. } => self.summarize_expr(fid, x),
            Expr::Binary { x, y, .. } => {
                self.summarize_expr(fid, x);
                self.summarize_expr(fid, y);
            }
            Expr::KeyValue { key, value } => {
                self.summarize_expr(fid, key);
                self.summarize_expr(fid, value);
            }
            Expr::ArrayType { len, elt } => {
                if let Some(len) = len {
                    self.summarize_expr(fid, len);
                }
                self.summarize_expr(fid, elt);
            }
            Expr::Ellipsis { elt } => {
                if let Some(elt) = elt {
                    self.summarize_expr(fid, elt);
                }
            }
            Expr::MapType { key, value } => {
                self.summarize_expr(fid, key);
                self.summarize_expr(fid, value);
            }
            Expr::StructType { fields } => {
                for field in fields {
                    self.summarize_expr(fid, &field.ty);
                }
            }
            Expr::InterfaceType { elems } => {
                for elem in elems {
                    match elem {
                        InterfaceElem::Method {
                            params, results, ..
                        } => {
                            for field in params.iter().chain(results) {
                                self.summarize_expr(fid, &field.ty);
                            }
                        }
                        InterfaceElem::Embedded(e) => self.summarize_expr(fid, e),
                    }
                }
            }
            Expr::FuncType { params, results } => {
                for field in params.iter().chain(results) {
                    self.summarize_expr(fid, &field.ty);
                }
            }
        }
    }

    /// Note the qualifier side of a qualified reference so nothing is
    /// missed; the qualifier identifier itself resolves to no declaration.
    fn summarize_qualifier(&mut self, fid: FuncId, x: &Expr) {
        if !matches!(x, Expr::Ident(_)) {
            self.summarize_expr(fid, x);
        }
    }

    /// The declaration a callee expression statically resolves to, if any.
    fn resolved_decl(&self, expr: &Expr) -> Option<DeclId> {
        match expr {
            Expr::Ident(ident) => self.program.info.uses.get(&ident.id).copied(),
            Expr::Selector { sel, .. } => self.program.info.uses.get(&sel.id).copied(),
            Expr::Paren(inner) => self.resolved_decl(inner),
            _ => None,
        }
    }
}

/// Whether an index expression is plausibly a type argument.
fn is_type_argument(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::Ident(_)
            | Expr::Selector { .. }
            | Expr::Star(_)
            | Expr::ArrayType { .. }
            | Expr::MapType { .. }
            | Expr::FuncType { .. }
            | Expr::InterfaceType { .. }
            | Expr::StructType { .. }
            | Expr::Index { .. }
    )
}

/// Deterministic spelling of a type argument for instantiation keys.
fn spell_type(expr: &Expr) -> String {
    match expr {
        Expr::Ident(ident) => ident.name.clone(),
        Expr::Selector { x, sel } => format!("{}.{}", spell_type(x), sel.name),
        Expr::Star(inner) => format!("*{}", spell_type(inner)),
        Expr::Paren(inner) => spell_type(inner),
        Expr::ArrayType { len: None, elt } => format!("[]{}", spell_type(elt)),
        Expr::ArrayType { len: Some(_), elt } => format!("[N]{}", spell_type(elt)),
        Expr::MapType { key, value } => {
            format!("map[{}]{}", spell_type(key), spell_type(value))
        }
        Expr::Index { x, indices } => {
            let args: Vec<String> = indices.iter().map(spell_type).collect();
            format!("{}[{}]", spell_type(x), args.join(","))
        }
        _ => "_".to_string(),
    }
}
