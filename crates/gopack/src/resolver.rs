//! Identifier resolution: the type-info tables the later stages consume.
//!
//! Two passes per package. The first collects every top-level declaration
//! into the `DeclArena`; the second resolves every identifier occurrence
//! against the lexical scope stack (locals, file imports, package scope,
//! universe) and records three tables keyed by node identity:
//!
//! - `uses`: identifier use -> declaration it refers to
//! - `defs`: defining identifier -> declaration it introduces
//! - `qualifiers`: selector qualifier -> the package it names
//!
//! Two identifiers referring to the same definition resolve to the same
//! `DeclId`, which is what the reachability set and rename map key on.

use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::BundleError;
use crate::loader::{Package, PkgId};
use crate::syntax::ast::*;

/// Identity of one top-level declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Func,
    Method,
    Type,
    Var,
    Const,
    /// A `func init` body; never referenceable by name.
    Init,
}

#[derive(Debug)]
pub struct DeclInfo {
    pub kind: DeclKind,
    pub pkg: PkgId,
    pub name: String,
    pub span: Span,
    /// For methods, the receiver type's declaration.
    pub recv: Option<DeclId>,
    /// For types, every method declared on the type (value and pointer
    /// receivers alike).
    pub methods: Vec<DeclId>,
}

/// Arena of all top-level declarations across the loaded program.
#[derive(Debug, Default)]
pub struct DeclArena {
    decls: Vec<DeclInfo>,
    scope: FxHashMap<(PkgId, String), DeclId>,
}

impl DeclArena {
    pub fn get(&self, id: DeclId) -> &DeclInfo {
        &self.decls[id.0 as usize]
    }

    /// Look up a package-scope declaration by name. Methods and `init`
    /// functions are not in package scope.
    pub fn lookup(&self, pkg: PkgId, name: &str) -> Option<DeclId> {
        self.scope.get(&(pkg, name.to_string())).copied()
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DeclId, &DeclInfo)> {
        self.decls
            .iter()
            .enumerate()
            .map(|(i, info)| (DeclId(i as u32), info))
    }

    fn push(&mut self, info: DeclInfo) -> DeclId {
        let id = DeclId(self.decls.len() as u32);
        self.decls.push(info);
        id
    }

    fn declare(
        &mut self,
        info: DeclInfo,
        file: &str,
    ) -> Result<DeclId, BundleError> {
        let key = (info.pkg, info.name.clone());
        let line = info.span.line;
        let name = info.name.clone();
        let id = self.push(info);
        if self.scope.insert(key, id).is_some() {
            return Err(BundleError::TypeCheckFailed(format!(
                "{file}:{line}: {name} redeclared in this package"
            )));
        }
        Ok(id)
    }
}

/// What a selector qualifier names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Qualifier {
    FirstParty(PkgId),
    Std(String),
}

/// Identifier-resolution tables for the whole program.
#[derive(Debug, Default)]
pub struct Resolution {
    pub uses: FxHashMap<NodeId, DeclId>,
    pub defs: FxHashMap<NodeId, DeclId>,
    pub qualifiers: FxHashMap<NodeId, Qualifier>,
}

/// Go's predeclared identifiers; sorted for binary search.
const UNIVERSE: &[&str] = &[
    "any", "append", "bool", "byte", "cap", "clear", "close", "comparable",
    "complex", "complex128", "complex64", "copy", "delete", "error", "false",
    "float32", "float64", "imag", "int", "int16", "int32", "int64", "int8",
    "iota", "len", "make", "max", "min", "new", "nil", "panic", "print",
    "println", "real", "recover", "rune", "string", "true", "uint", "uint16",
    "uint32", "uint64", "uint8", "uintptr",
];

fn is_universe(name: &str) -> bool {
    UNIVERSE.binary_search(&name).is_ok()
}

/// Resolve all packages, producing the decl arena and resolution tables.
pub fn resolve(
    packages: &[Package],
    topo: &[PkgId],
    by_path: &IndexMap<String, PkgId>,
) -> Result<(DeclArena, Resolution), BundleError> {
    let mut arena = DeclArena::default();
    let mut info = Resolution::default();

    // Pass A: collect package-scope declarations, methods after their
    // receiver types.
    for &id in topo {
        let package = &packages[id.0 as usize];
        collect_package(&mut arena, &mut info, package)?;
    }

    // Pass B: resolve identifier occurrences.
    for &id in topo {
        let package = &packages[id.0 as usize];
        for file in &package.files {
            let imports = file_imports(file, by_path)?;
            let mut walker = Walker {
                arena: &arena,
                info: &mut info,
                pkg: package.id,
                file: &file.name,
                imports,
                scopes: Vec::new(),
            };
            walker.file(file)?;
        }
    }

    Ok((arena, info))
}

fn collect_package(
    arena: &mut DeclArena,
    info: &mut Resolution,
    package: &Package,
) -> Result<(), BundleError> {
    // Functions, types, and values first so methods can link receivers.
    for file in &package.files {
        for decl in &file.decls {
            match decl {
                Decl::Func(func) if func.recv.is_none() => {
                    if func.name.is_blank() {
                        continue;
                    }
                    if func.name.name == "init" {
                        let id = arena.push(DeclInfo {
                            kind: DeclKind::Init,
                            pkg: package.id,
                            name: "init".to_string(),
                            span: func.name.span,
                            recv: None,
                            methods: Vec::new(),
                        });
                        info.defs.insert(func.name.id, id);
                        continue;
                    }
                    let id = arena.declare(
                        DeclInfo {
                            kind: DeclKind::Func,
                            pkg: package.id,
                            name: func.name.name.clone(),
                            span: func.name.span,
                            recv: None,
                            methods: Vec::new(),
                        },
                        &file.name,
                    )?;
                    info.defs.insert(func.name.id, id);
                }
                Decl::Func(_) => {}
                Decl::Gen(gen) => {
                    for spec in &gen.specs {
                        match spec {
                            Spec::Type(ts) => {
                                let id = arena.declare(
                                    DeclInfo {
                                        kind: DeclKind::Type,
                                        pkg: package.id,
                                        name: ts.name.name.clone(),
                                        span: ts.name.span,
                                        recv: None,
                                        methods: Vec::new(),
                                    },
                                    &file.name,
                                )?;
                                info.defs.insert(ts.name.id, id);
                            }
                            Spec::Value(vs) => {
                                let kind = match gen.tok {
                                    DeclTok::Const => DeclKind::Const,
                                    _ => DeclKind::Var,
                                };
                                for name in &vs.names {
                                    if name.is_blank() {
                                        continue;
                                    }
                                    let id = arena.declare(
                                        DeclInfo {
                                            kind,
                                            pkg: package.id,
                                            name: name.name.clone(),
                                            span: name.span,
                                            recv: None,
                                            methods: Vec::new(),
                                        },
                                        &file.name,
                                    )?;
                                    info.defs.insert(name.id, id);
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    // Methods, linked to their receiver type declarations.
    for file in &package.files {
        for decl in &file.decls {
            let Decl::Func(func) = decl else { continue };
            if func.recv.is_none() {
                continue;
            }
            let recv_name = func.recv_type_name().ok_or_else(|| {
                BundleError::TypeCheckFailed(format!(
                    "{}:{}: cannot determine receiver type of {}",
                    file.name, func.name.span.line, func.name.name
                ))
            })?;
            let recv_id = arena.lookup(package.id, &recv_name.name).ok_or_else(|| {
                BundleError::TypeCheckFailed(format!(
                    "{}:{}: undefined receiver type {}",
                    file.name, recv_name.span.line, recv_name.name
                ))
            })?;
            let id = arena.push(DeclInfo {
                kind: DeclKind::Method,
                pkg: package.id,
                name: func.name.name.clone(),
                span: func.name.span,
                recv: Some(recv_id),
                methods: Vec::new(),
            });
            arena.decls[recv_id.0 as usize].methods.push(id);
            info.defs.insert(func.name.id, id);
        }
    }

    Ok(())
}

fn file_imports(
    file: &File,
    by_path: &IndexMap<String, PkgId>,
) -> Result<FxHashMap<String, Qualifier>, BundleError> {
    let mut imports = FxHashMap::default();
    for import in &file.imports {
        if import.alias.as_ref().is_some_and(|a| a.is_blank()) {
            continue;
        }
        let target = if crate::stdlib::is_std_import(&import.path) {
            Qualifier::Std(import.path.clone())
        } else {
            let id = by_path.get(&import.path).ok_or_else(|| {
                BundleError::LoadFailed(format!(
                    "{}: unresolved import {:?}",
                    file.name, import.path
                ))
            })?;
            Qualifier::FirstParty(*id)
        };
        imports.insert(import.local_name().to_string(), target);
    }
    Ok(imports)
}

struct Walker<'a> {
    arena: &'a DeclArena,
    info: &'a mut Resolution,
    pkg: PkgId,
    file: &'a str,
    imports: FxHashMap<String, Qualifier>,
    scopes: Vec<FxHashSet<String>>,
}

impl<'a> Walker<'a> {
    fn push_scope(&mut self) {
        self.scopes.push(FxHashSet::default());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn bind(&mut self, name: &str) {
        if name != "_" {
            if let Some(scope) = self.scopes.last_mut() {
                scope.insert(name.to_string());
            }
        }
    }

    fn is_local(&self, name: &str) -> bool {
        self.scopes.iter().rev().any(|s| s.contains(name))
    }

    fn undefined(&self, ident: &Ident) -> BundleError {
        BundleError::TypeCheckFailed(format!(
            "{}:{}: undefined: {}",
            self.file, ident.span.line, ident.name
        ))
    }

    fn use_ident(&mut self, ident: &Ident) -> Result<(), BundleError> {
        if ident.is_blank() || self.is_local(&ident.name) {
            return Ok(());
        }
        // File scope (imports) sits inside package scope.
        if self.imports.contains_key(&ident.name) {
            return Ok(());
        }
        if let Some(id) = self.arena.lookup(self.pkg, &ident.name) {
            self.info.uses.insert(ident.id, id);
            return Ok(());
        }
        if is_universe(&ident.name) {
            return Ok(());
        }
        Err(self.undefined(ident))
    }

    fn file(&mut self, file: &File) -> Result<(), BundleError> {
        for decl in &file.decls {
            match decl {
                Decl::Func(func) => self.func_decl(func)?,
                Decl::Gen(gen) => self.gen_decl_specs(gen, false)?,
            }
        }
        Ok(())
    }

    fn func_decl(&mut self, func: &FuncDecl) -> Result<(), BundleError> {
        self.push_scope();
        // Receiver type parameters (`func (s *Seeker[T]) ...`) are declared
        // by the receiver clause.
        if let Some(recv) = &func.recv {
            self.bind_receiver_type_params(&recv.ty);
            self.resolve_receiver_base(&recv.ty)?;
            for name in &recv.names {
                self.bind(&name.name);
            }
        }
        for param in &func.type_params {
            for name in &param.names {
                self.bind(&name.name);
            }
            self.expr(&param.ty)?;
        }
        for field in func.params.iter().chain(&func.results) {
            self.expr(&field.ty)?;
            for name in &field.names {
                self.bind(&name.name);
            }
        }
        if let Some(body) = &func.body {
            self.stmts(&body.stmts)?;
        }
        self.pop_scope();
        Ok(())
    }

    fn bind_receiver_type_params(&mut self, ty: &Expr) {
        match ty {
            Expr::Star(inner) | Expr::Paren(inner) => self.bind_receiver_type_params(inner),
            Expr::Index { indices, .. } => {
                for index in indices {
                    if let Expr::Ident(ident) = index {
                        self.bind(&ident.name);
                    }
                }
            }
            _ => {}
        }
    }

    fn resolve_receiver_base(&mut self, ty: &Expr) -> Result<(), BundleError> {
        match ty {
            Expr::Star(inner) | Expr::Paren(inner) => self.resolve_receiver_base(inner),
            Expr::Index { x, .. } => self.resolve_receiver_base(x),
            Expr::Ident(ident) => self.use_ident(ident),
            _ => Ok(()),
        }
    }

    fn gen_decl_specs(&mut self, gen: &GenDecl, local: bool) -> Result<(), BundleError> {
        for spec in &gen.specs {
            match spec {
                Spec::Type(ts) => {
                    if local {
                        self.bind(&ts.name.name);
                    }
                    self.push_scope();
                    for param in &ts.type_params {
                        for name in &param.names {
                            self.bind(&name.name);
                        }
                        self.expr(&param.ty)?;
                    }
                    self.expr(&ts.ty)?;
                    self.pop_scope();
                }
                Spec::Value(vs) => {
                    if let Some(ty) = &vs.ty {
                        self.expr(ty)?;
                    }
                    for value in &vs.values {
                        self.expr(value)?;
                    }
                    if local {
                        for name in &vs.names {
                            self.bind(&name.name);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn stmts(&mut self, stmts: &[Stmt]) -> Result<(), BundleError> {
        for stmt in stmts {
            self.stmt(stmt)?;
        }
        Ok(())
    }

    fn stmt(&mut self, stmt: &Stmt) -> Result<(), BundleError> {
        match stmt {
            Stmt::Decl(gen) => self.gen_decl_specs(gen, true),
            Stmt::Expr(e) | Stmt::Go(e) | Stmt::Defer(e) => self.expr(e),
            Stmt::Assign { lhs, op, rhs } => {
                for e in rhs {
                    self.expr(e)?;
                }
                if *op == AssignOp::Define {
                    for e in lhs {
                        match e {
                            Expr::Ident(ident) => self.bind(&ident.name),
                            other => self.expr(other)?,
                        }
                    }
                } else {
                    for e in lhs {
                        self.expr(e)?;
                    }
                }
                Ok(())
            }
            Stmt::IncDec { x, .. } => self.expr(x),
            Stmt::Return(exprs) => {
                for e in exprs {
                    self.expr(e)?;
                }
                Ok(())
            }
            Stmt::If(stmt) => {
                self.push_scope();
                if let Some(init) = &stmt.init {
                    self.stmt(init)?;
                }
                self.expr(&stmt.cond)?;
                self.block(&stmt.then)?;
                if let Some(els) = &stmt.els {
                    self.stmt(els)?;
                }
                self.pop_scope();
                Ok(())
            }
            Stmt::For(stmt) => {
                self.push_scope();
                match &stmt.header {
                    ForHeader::Classic { init, cond, post } => {
                        if let Some(init) = init {
                            self.stmt(init)?;
                        }
                        if let Some(cond) = cond {
                            self.expr(cond)?;
                        }
                        if let Some(post) = post {
                            self.stmt(post)?;
                        }
                    }
                    ForHeader::Range {
                        key,
                        value,
                        define,
                        x,
                    } => {
                        self.expr(x)?;
                        for target in [key, value].into_iter().flatten() {
                            match target {
                                Expr::Ident(ident) if *define => self.bind(&ident.name),
                                other => self.expr(other)?,
                            }
                        }
                    }
                }
                self.block(&stmt.body)?;
                self.pop_scope();
                Ok(())
            }
            Stmt::Switch(stmt) => {
                self.push_scope();
                if let Some(init) = &stmt.init {
                    self.stmt(init)?;
                }
                if let Some(tag) = &stmt.tag {
                    self.expr(tag)?;
                }
                for case in &stmt.cases {
                    for e in &case.exprs {
                        self.expr(e)?;
                    }
                    self.push_scope();
                    self.stmts(&case.body)?;
                    self.pop_scope();
                }
                self.pop_scope();
                Ok(())
            }
            Stmt::Block(block) => self.block(block),
            Stmt::Labeled { stmt, .. } => self.stmt(stmt),
            Stmt::Branch { .. } | Stmt::Empty => Ok(()),
        }
    }

    fn block(&mut self, block: &Block) -> Result<(), BundleError> {
        self.push_scope();
        self.stmts(&block.stmts)?;
        self.pop_scope();
        Ok(())
    }

    fn expr(&mut self, expr: &Expr) -> Result<(), BundleError> {
        match expr {
            Expr::Ident(ident) => self.use_ident(ident),
            Expr::Lit { .. } => Ok(()),
            Expr::Composite { ty, elts } => {
                if let Some(ty) = ty {
                    self.expr(ty)?;
                }
                // Keys of struct-shaped literals are field names, not
                // variable references; only map and array literals index by
                // expression.
                let keyed_by_expr = matches!(
                    ty.as_deref(),
                    Some(Expr::MapType { .. }) | Some(Expr::ArrayType { .. })
                );
                for elt in elts {
                    match elt {
                        Expr::KeyValue { key, value } => {
                            match (&**key, keyed_by_expr) {
                                (Expr::Ident(_), false) => {}
                                _ => self.expr(key)?,
                            }
                            self.expr(value)?;
                        }
                        other => self.expr(other)?,
                    }
                }
                Ok(())
            }
            Expr::FuncLit(lit) => {
                self.push_scope();
                for field in lit.params.iter().chain(&lit.results) {
                    self.expr(&field.ty)?;
                    for name in &field.names {
                        self.bind(&name.name);
                    }
                }
                self.stmts(&lit.body.stmts)?;
                self.pop_scope();
                Ok(())
            }
            Expr::Paren(inner) | Expr::Star(inner) => self.expr(inner),
            Expr::Selector { x, sel } => {
                if let Expr::Ident(qualifier) = &**x {
                    if !self.is_local(&qualifier.name) {
                        if let Some(target) = self.imports.get(&qualifier.name).cloned() {
                            self.info.qualifiers.insert(qualifier.id, target.clone());
                            if let Qualifier::FirstParty(dep) = target {
                                let id =
                                    self.arena.lookup(dep, &sel.name).ok_or_else(|| {
                                        BundleError::TypeCheckFailed(format!(
                                            "{}:{}: undefined: {}.{}",
                                            self.file,
                                            sel.span.line,
                                            qualifier.name,
                                            sel.name
                                        ))
                                    })?;
                                self.info.uses.insert(sel.id, id);
                            }
                            return Ok(());
                        }
                    }
                }
                // Field or method selection; the base resolves, the
                // selector is left to the method-set machinery.
                self.expr(x)
            }
            Expr::Index { x, indices } => {
                self.expr(x)?;
                for index in indices {
                    self.expr(index)?;
                }
                Ok(())
            }
            Expr::Slice { x, low, high, max } => {
                self.expr(x)?;
                for e in [low, high, max].into_iter().flatten() {
                    self.expr(e)?;
                }
                Ok(())
            }
            Expr::TypeAssert { x, ty } => {
                self.expr(x)?;
                self.expr(ty)
            }
            Expr::Call { fun, args, .. } => {
                self.expr(fun)?;
                for arg in args {
                    self.expr(arg)?;
                }
                Ok(())
            }
            Expr::Unary { x, .. } => self.expr(x),
            Expr::Binary { x, y, .. } => {
                self.expr(x)?;
                self.expr(y)
            }
            Expr::KeyValue { key, value } => {
                self.expr(key)?;
                self.expr(value)
            }
            Expr::ArrayType { len, elt } => {
                if let Some(len) = len {
                    self.expr(len)?;
                }
                self.expr(elt)
            }
            Expr::Ellipsis { elt } => match elt {
                Some(elt) => self.expr(elt),
                None => Ok(()),
            },
            Expr::MapType { key, value } => {
                self.expr(key)?;
                self.expr(value)
            }
            Expr::StructType { fields } => {
                for field in fields {
                    self.expr(&field.ty)?;
                }
                Ok(())
            }
            Expr::InterfaceType { elems } => {
                for elem in elems {
                    match elem {
                        InterfaceElem::Method {
                            params, results, ..
                        } => {
                            for field in params.iter().chain(results) {
                                self.expr(&field.ty)?;
                            }
                        }
                        InterfaceElem::Embedded(e) => self.expr(e)?,
                    }
                }
                Ok(())
            }
            Expr::FuncType { params, results } => {
                for field in params.iter().chain(results) {
                    self.expr(&field.ty)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn universe_is_sorted_for_binary_search() {
        let mut sorted = UNIVERSE.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, UNIVERSE);
    }

    #[test]
    fn recognizes_predeclared_identifiers() {
        for name in ["len", "iota", "nil", "true", "int", "any", "println"] {
            assert!(is_universe(name), "{name} should be predeclared");
        }
        assert!(!is_universe("fmt"));
        assert!(!is_universe("Calculator"));
    }
}
