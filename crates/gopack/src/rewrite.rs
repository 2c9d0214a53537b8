//! Global renaming and pruning: stage 3 of the pipeline.
//!
//! Flattens every dependency package's namespace into the entry package's:
//! a dependency declaration `N` from package `p` becomes `p_N`, entry
//! declarations keep their names, and methods are never renamed (they live
//! in their receiver type's namespace). Qualified references whose left side
//! names a first-party package collapse to the bare mangled identifier;
//! standard-library qualifications are untouched. Declarations outside the
//! reachability set are dropped, including individual names inside grouped
//! `var`/`const` declarations.

use indexmap::IndexMap;
use log::debug;
use rustc_hash::FxHashMap;

use crate::error::BundleError;
use crate::loader::{PkgId, Program};
use crate::reachability::Reachability;
use crate::resolver::{DeclId, DeclKind, Qualifier};
use crate::syntax::ast::*;

/// Output of the rewriting stage, ready for emission.
#[derive(Debug)]
pub struct RewriteOutput {
    /// Surviving, renamed declarations of each dependency package, in
    /// dependency-topological order.
    pub dep_code: Vec<(PkgId, Vec<Decl>)>,
    /// Surviving entry-package declarations, imports and `init` excluded.
    pub entry_code: Vec<Decl>,
    /// Bodies of every `func init` across all packages, rewritten, in
    /// topological then source order.
    pub init_bodies: Vec<Block>,
}

/// Mapping from declaration to its output identifier.
#[derive(Debug)]
pub struct RenameMap {
    names: FxHashMap<DeclId, String>,
    prefixes: FxHashMap<PkgId, Option<String>>,
}

impl RenameMap {
    /// The output identifier for a declaration.
    pub fn output_name(&self, id: DeclId) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    /// The mangling prefix of a package (`None` for the entry package).
    pub fn prefix(&self, pkg: PkgId) -> Option<&str> {
        self.prefixes.get(&pkg).and_then(|p| p.as_deref())
    }
}

/// Build the rename map over exactly the reachability set and verify it is
/// injective.
pub fn build_rename_map(
    program: &Program,
    reach: &Reachability,
) -> Result<RenameMap, BundleError> {
    let prefixes = package_prefixes(program);

    let mut names: FxHashMap<DeclId, String> = FxHashMap::default();
    for (id, info) in program.decls.iter() {
        if !reach.contains(id) {
            continue;
        }
        names.insert(id, mangled_name(&prefixes, info.pkg, info.kind, &info.name));
    }

    // Injectivity over package-scope identifiers; methods live in their
    // receiver namespaces and may share names, initializers are merged
    // rather than emitted.
    let mut seen: IndexMap<String, DeclId> = IndexMap::new();
    for (id, info) in program.decls.iter() {
        if !reach.contains(id) {
            continue;
        }
        if matches!(info.kind, DeclKind::Method | DeclKind::Init) {
            continue;
        }
        let output = names[&id].clone();
        if let Some(&prev) = seen.get(&output) {
            let prev_info = program.decls.get(prev);
            return Err(BundleError::RenameCollision {
                first: format!(
                    "{}.{}",
                    program.package(prev_info.pkg).import_path,
                    prev_info.name
                ),
                second: format!("{}.{}", program.package(info.pkg).import_path, info.name),
                output,
            });
        }
        seen.insert(output, id);
    }

    Ok(RenameMap { names, prefixes })
}

/// Mangling prefixes per package: the entry package gets none, dependency
/// packages get their short name, and packages whose short name is shared
/// get a content-hash disambiguator appended, applied uniformly to every
/// package involved in the clash.
fn package_prefixes(program: &Program) -> FxHashMap<PkgId, Option<String>> {
    let mut count_by_short: FxHashMap<&str, u32> = FxHashMap::default();
    for package in &program.packages {
        if package.id != program.entry {
            *count_by_short.entry(package.short_name.as_str()).or_insert(0) += 1;
        }
    }

    let mut prefixes = FxHashMap::default();
    for package in &program.packages {
        if package.id == program.entry {
            prefixes.insert(package.id, None);
            continue;
        }
        let prefix = if count_by_short[package.short_name.as_str()] > 1 {
            let hex = blake3::hash(package.import_path.as_bytes()).to_hex();
            let short_hash = &hex[..6];
            debug!(
                "disambiguating package {} as {}_{}",
                package.import_path, package.short_name, short_hash
            );
            format!("{}_{}", package.short_name, short_hash)
        } else {
            package.short_name.clone()
        };
        prefixes.insert(package.id, Some(prefix));
    }
    prefixes
}

fn mangled_name(
    prefixes: &FxHashMap<PkgId, Option<String>>,
    pkg: PkgId,
    kind: DeclKind,
    name: &str,
) -> String {
    match (&prefixes[&pkg], kind) {
        // Methods keep their names; only their receiver types mangle.
        (_, DeclKind::Method | DeclKind::Init) => name.to_string(),
        (None, _) => name.to_string(),
        (Some(prefix), _) => format!("{prefix}_{name}"),
    }
}

/// Run the rewriting stage.
pub fn rewrite(
    program: &Program,
    reach: &Reachability,
    renames: &RenameMap,
) -> Result<RewriteOutput, BundleError> {
    let rewriter = Rewriter {
        program,
        reach,
        renames,
        embedded: embedded_field_renames(program, reach, renames),
    };

    let mut dep_code = Vec::new();
    let mut entry_code = Vec::new();
    let mut init_bodies = Vec::new();

    for &pkg in &program.topo {
        let package = program.package(pkg);
        let mut kept: Vec<Decl> = Vec::new();
        for file in &package.files {
            for decl in &file.decls {
                match decl {
                    Decl::Func(func) if is_init(func) => {
                        let mut body = func.body.clone().unwrap_or(Block { stmts: Vec::new() });
                        for stmt in &mut body.stmts {
                            rewriter.stmt(stmt);
                        }
                        init_bodies.push(body);
                    }
                    _ => {
                        if let Some(rewritten) = rewriter.rewrite_decl(decl) {
                            kept.push(rewritten);
                        }
                    }
                }
            }
        }
        if pkg == program.entry {
            entry_code = kept;
        } else {
            dep_code.push((pkg, kept));
        }
    }

    Ok(RewriteOutput {
        dep_code,
        entry_code,
        init_bodies,
    })
}

fn is_init(func: &FuncDecl) -> bool {
    func.recv.is_none() && func.name.name == "init"
}

/// Embedded-field selections spell the embedded type's name; collect the
/// renames so `x.LibStruct.V` follows its type to `x.lib_LibStruct.V`.
fn embedded_field_renames(
    program: &Program,
    reach: &Reachability,
    renames: &RenameMap,
) -> FxHashMap<String, String> {
    let mut map = FxHashMap::default();
    for &pkg in &program.topo {
        let package = program.package(pkg);
        for file in &package.files {
            for decl in &file.decls {
                let Decl::Gen(gen) = decl else { continue };
                for spec in &gen.specs {
                    let Spec::Type(ts) = spec else { continue };
                    let Some(&owner) = program.info.defs.get(&ts.name.id) else {
                        continue;
                    };
                    if !reach.contains(owner) {
                        continue;
                    }
                    let Expr::StructType { fields } = &ts.ty else { continue };
                    for field in fields {
                        if !field.names.is_empty() {
                            continue;
                        }
                        let Some(ident) = embedded_type_ident(&field.ty) else {
                            continue;
                        };
                        let Some(&target) = program.info.uses.get(&ident.id) else {
                            continue;
                        };
                        if let Some(new_name) = renames.output_name(target) {
                            if new_name != ident.name {
                                map.insert(ident.name.clone(), new_name.to_string());
                            }
                        }
                    }
                }
            }
        }
    }
    map
}

/// The identifier naming an embedded field's type, through pointers,
/// qualifiers, and instantiations.
fn embedded_type_ident(ty: &Expr) -> Option<&Ident> {
    match ty {
        Expr::Ident(ident) => Some(ident),
        Expr::Star(inner) | Expr::Paren(inner) => embedded_type_ident(inner),
        Expr::Selector { sel, .. } => Some(sel),
        Expr::Index { x, .. } => embedded_type_ident(x),
        _ => None,
    }
}

struct Rewriter<'a> {
    program: &'a Program,
    reach: &'a Reachability,
    renames: &'a RenameMap,
    embedded: FxHashMap<String, String>,
}

impl<'a> Rewriter<'a> {
    /// Rewrite one top-level declaration; `None` when fully pruned.
    fn rewrite_decl(&self, decl: &Decl) -> Option<Decl> {
        match decl {
            Decl::Func(func) => {
                let id = self.program.info.defs.get(&func.name.id)?;
                if !self.reach.contains(*id) {
                    return None;
                }
                let mut func = func.clone();
                if let Some(new_name) = self.renames.output_name(*id) {
                    func.name.name = new_name.to_string();
                }
                if let Some(recv) = &mut func.recv {
                    self.expr(&mut recv.ty);
                }
                for field in func
                    .type_params
                    .iter_mut()
                    .chain(&mut func.params)
                    .chain(&mut func.results)
                {
                    self.expr(&mut field.ty);
                }
                if let Some(body) = &mut func.body {
                    self.block(body);
                }
                Some(Decl::Func(func))
            }
            Decl::Gen(gen) => self.rewrite_gen(gen).map(Decl::Gen),
        }
    }

    fn rewrite_gen(&self, gen: &GenDecl) -> Option<GenDecl> {
        // A group that derives values from iota is position-sensitive:
        // dropping a name would shift every later constant, so the group
        // survives whole if any of its names does.
        if gen.tok == DeclTok::Const && group_uses_iota(gen) {
            let any_alive = gen.specs.iter().any(|spec| {
                let Spec::Value(vs) = spec else { return false };
                vs.names.iter().any(|name| self.name_survives(name))
            });
            if !any_alive {
                return None;
            }
            let mut gen = gen.clone();
            for spec in &mut gen.specs {
                self.rewrite_spec_in_place(spec);
            }
            return Some(gen);
        }

        let mut specs = Vec::new();
        for spec in &gen.specs {
            match spec {
                Spec::Type(ts) => {
                    let Some(&id) = self.program.info.defs.get(&ts.name.id) else {
                        continue;
                    };
                    if !self.reach.contains(id) {
                        continue;
                    }
                    let mut ts = ts.clone();
                    if let Some(new_name) = self.renames.output_name(id) {
                        ts.name.name = new_name.to_string();
                    }
                    for param in &mut ts.type_params {
                        self.expr(&mut param.ty);
                    }
                    self.expr(&mut ts.ty);
                    specs.push(Spec::Type(ts));
                }
                Spec::Value(vs) => {
                    if let Some(vs) = self.rewrite_value_spec(vs) {
                        specs.push(Spec::Value(vs));
                    }
                }
            }
        }
        if specs.is_empty() {
            return None;
        }
        Some(GenDecl {
            tok: gen.tok,
            grouped: gen.grouped && specs.len() > 1,
            specs,
        })
    }

    fn name_survives(&self, name: &Ident) -> bool {
        if name.is_blank() {
            // Blank names carry their initializer's side effects.
            return true;
        }
        self.program
            .info
            .defs
            .get(&name.id)
            .is_some_and(|id| self.reach.contains(*id))
    }

    /// Prune a grouped value spec down to its surviving names. Values are
    /// filtered positionally when each name has its own initializer; a
    /// multi-assignment from one expression is kept whole if any of its
    /// names survives.
    fn rewrite_value_spec(&self, vs: &ValueSpec) -> Option<ValueSpec> {
        let prunable = vs.values.is_empty() || vs.values.len() == vs.names.len();
        let survivors: Vec<bool> = vs.names.iter().map(|n| self.name_survives(n)).collect();
        if !survivors.iter().any(|s| *s) {
            return None;
        }

        let mut out = ValueSpec {
            names: Vec::new(),
            ty: vs.ty.clone(),
            values: Vec::new(),
        };
        if prunable {
            for (i, name) in vs.names.iter().enumerate() {
                if !survivors[i] {
                    continue;
                }
                out.names.push(name.clone());
                if !vs.values.is_empty() {
                    out.values.push(vs.values[i].clone());
                }
            }
        } else {
            out.names = vs.names.clone();
            out.values = vs.values.clone();
        }

        for name in &mut out.names {
            self.rename_def(name);
        }
        if let Some(ty) = &mut out.ty {
            self.expr(ty);
        }
        for value in &mut out.values {
            self.expr(value);
        }
        Some(out)
    }

    /// Rewrite a spec without pruning, for position-sensitive groups.
    fn rewrite_spec_in_place(&self, spec: &mut Spec) {
        match spec {
            Spec::Type(ts) => {
                self.rename_def(&mut ts.name);
                for param in &mut ts.type_params {
                    self.expr(&mut param.ty);
                }
                self.expr(&mut ts.ty);
            }
            Spec::Value(vs) => {
                for name in &mut vs.names {
                    self.rename_def(name);
                }
                if let Some(ty) = &mut vs.ty {
                    self.expr(ty);
                }
                for value in &mut vs.values {
                    self.expr(value);
                }
            }
        }
    }

    /// Apply the rename map to a defining identifier. Names kept only for
    /// position (pruned-around iota constants) mangle by the same rule even
    /// though they are outside the map's domain.
    fn rename_def(&self, name: &mut Ident) {
        if name.is_blank() {
            return;
        }
        let Some(&id) = self.program.info.defs.get(&name.id) else {
            return;
        };
        if let Some(new_name) = self.renames.output_name(id) {
            name.name = new_name.to_string();
            return;
        }
        let info = self.program.decls.get(id);
        if let Some(prefix) = self.renames.prefix(info.pkg) {
            name.name = format!("{prefix}_{}", info.name);
        }
    }

    fn rename_use(&self, ident: &mut Ident) {
        let Some(&id) = self.program.info.uses.get(&ident.id) else {
            return;
        };
        if let Some(new_name) = self.renames.output_name(id) {
            if new_name != ident.name {
                ident.name = new_name.to_string();
            }
            return;
        }
        let info = self.program.decls.get(id);
        if let Some(prefix) = self.renames.prefix(info.pkg) {
            ident.name = format!("{prefix}_{}", info.name);
        }
    }

    fn block(&self, block: &mut Block) {
        for stmt in &mut block.stmts {
            self.stmt(stmt);
        }
    }

    fn stmt(&self, stmt: &mut Stmt) {
        match stmt {
            Stmt::Decl(gen) => {
                for spec in &mut gen.specs {
                    match spec {
                        Spec::Type(ts) => {
                            for param in &mut ts.type_params {
                                self.expr(&mut param.ty);
                            }
                            self.expr(&mut ts.ty);
                        }
                        Spec::Value(vs) => {
                            if let Some(ty) = &mut vs.ty {
                                self.expr(ty);
                            }
                            for value in &mut vs.values {
                                self.expr(value);
                            }
                        }
                    }
                }
            }
            Stmt::Expr(e) | Stmt::Go(e) | Stmt::Defer(e) => self.expr(e),
            Stmt::Assign { lhs, rhs, .. } => {
                for e in lhs.iter_mut().chain(rhs) {
                    self.expr(e);
                }
            }
            Stmt::IncDec { x, .. } => self.expr(x),
            Stmt::Return(exprs) => {
                for e in exprs {
                    self.expr(e);
                }
            }
            Stmt::If(s) => {
                if let Some(init) = &mut s.init {
                    self.stmt(init);
                }
                self.expr(&mut s.cond);
                self.block(&mut s.then);
                if let Some(els) = &mut s.els {
                    self.stmt(els);
                }
            }
            Stmt::For(s) => {
                match &mut s.header {
                    ForHeader::Classic { init, cond, post } => {
                        if let Some(init) = init {
                            self.stmt(init);
                        }
                        if let Some(cond) = cond {
                            self.expr(cond);
                        }
                        if let Some(post) = post {
                            self.stmt(post);
                        }
                    }
                    ForHeader::Range { key, value, x, .. } => {
                        for e in [key, value].into_iter().flatten() {
                            self.expr(e);
                        }
                        self.expr(x);
                    }
                }
                self.block(&mut s.body);
            }
            Stmt::Switch(s) => {
                if let Some(init) = &mut s.init {
                    self.stmt(init);
                }
                if let Some(tag) = &mut s.tag {
                    self.expr(tag);
                }
                for case in &mut s.cases {
                    for e in &mut case.exprs {
                        self.expr(e);
                    }
                    for stmt in &mut case.body {
                        self.stmt(stmt);
                    }
                }
            }
            Stmt::Block(block) => self.block(block),
            Stmt::Labeled { stmt, .. } => self.stmt(stmt),
            Stmt::Branch { .. } | Stmt::Empty => {}
        }
    }

    fn expr(&self, expr: &mut Expr) {
        // A qualified reference into a first-party package collapses to the
        // bare mangled identifier.
        if let Expr::Selector { x, sel } = expr {
            if let Expr::Ident(qualifier) = &**x {
                match self.program.info.qualifiers.get(&qualifier.id) {
                    Some(Qualifier::FirstParty(_)) => {
                        let mut flat = Ident {
                            id: sel.id,
                            name: sel.name.clone(),
                            span: sel.span,
                        };
                        self.rename_use(&mut flat);
                        *expr = Expr::Ident(flat);
                        return;
                    }
                    Some(Qualifier::Std(_)) => return,
                    None => {}
                }
            }
        }

        match expr {
            Expr::Ident(ident) => self.rename_use(ident),
            Expr::Lit { .. } => {}
            Expr::Composite { ty, elts } => {
                if let Some(ty) = ty {
                    self.expr(ty);
                }
                let keyed_by_expr = matches!(
                    ty.as_deref(),
                    Some(Expr::MapType { .. }) | Some(Expr::ArrayType { .. })
                );
                for elt in elts {
                    match elt {
                        Expr::KeyValue { key, value } => {
                            match (&mut **key, keyed_by_expr) {
                                (Expr::Ident(_), false) => {}
                                (other, _) => self.expr(other),
                            }
                            self.expr(value);
                        }
                        other => self.expr(other),
                    }
                }
            }
            Expr::FuncLit(lit) => {
                for field in lit.params.iter_mut().chain(&mut lit.results) {
                    self.expr(&mut field.ty);
                }
                self.block(&mut lit.body);
            }
            Expr::Paren(inner) | Expr::Star(inner) => self.expr(inner),
            Expr::Selector { x, sel } => {
                self.expr(x);
                // Embedded-field selection follows the embedded type's
                // rename.
                if let Some(new_name) = self.embedded.get(&sel.name) {
                    sel.name = new_name.clone();
                }
            }
            Expr::Index { x, indices } => {
                self.expr(x);
                for index in indices {
                    self.expr(index);
                }
            }
            Expr::Slice { x, low, high, max } => {
                self.expr(x);
                for e in [low, high, max].into_iter().flatten() {
                    self.expr(e);
                }
            }
            Expr::TypeAssert { x, ty } => {
                self.expr(x);
                self.expr(ty);
            }
            Expr::Call { fun, args, .. } => {
                self.expr(fun);
                for arg in args {
                    self.expr(arg);
                }
            }
            Expr::Unary { x, .. } => self.expr(x),
            Expr::Binary { x, y, .. } => {
                self.expr(x);
                self.expr(y);
            }
            Expr::KeyValue { key, value } => {
                self.expr(key);
                self.expr(value);
            }
            Expr::ArrayType { len, elt } => {
                if let Some(len) = len {
                    self.expr(len);
                }
                self.expr(elt);
            }
            Expr::Ellipsis { elt } => {
                if let Some(elt) = elt {
                    self.expr(elt);
                }
            }
            Expr::MapType { key, value } => {
                self.expr(key);
                self.expr(value);
            }
            Expr::StructType { fields } => {
                for field in fields {
                    self.expr(&mut field.ty);
                }
            }
            Expr::InterfaceType { elems } => {
                for elem in elems {
                    match elem {
                        InterfaceElem::Method {
                            params, results, ..
                        } => {
                            for field in params.iter_mut().chain(results) {
                                self.expr(&mut field.ty);
                            }
                        }
                        InterfaceElem::Embedded(e) => self.expr(e),
                    }
                }
            }
            Expr::FuncType { params, results } => {
                for field in params.iter_mut().chain(results) {
                    self.expr(&mut field.ty);
                }
            }
        }
    }
}

/// Whether any value in the group references `iota`.
fn group_uses_iota(gen: &GenDecl) -> bool {
    let mut found = false;
    for spec in &gen.specs {
        if let Spec::Value(vs) = spec {
            for value in &vs.values {
                walk_expr(value, &mut |event| {
                    if let WalkEvent::Ident(ident) = event {
                        if ident.name == "iota" {
                            found = true;
                        }
                    }
                });
            }
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parser::{parse_file, IdGen};

    fn first_gen(src: &str) -> GenDecl {
        let mut ids = IdGen::default();
        let file = parse_file(src, "test.go", &mut ids).expect("parse should succeed");
        match file.decls.into_iter().next() {
            Some(Decl::Gen(gen)) => gen,
            _ => panic!("expected a grouped declaration"),
        }
    }

    #[test]
    fn detects_iota_groups() {
        let gen = first_gen("package p\n\nconst (\n\tA = iota\n\tB\n\tC\n)\n");
        assert!(group_uses_iota(&gen));
    }

    #[test]
    fn plain_constant_groups_are_not_position_sensitive() {
        let gen = first_gen("package p\n\nconst (\n\tA = 1\n\tB = 2\n)\n");
        assert!(!group_uses_iota(&gen));
    }

    #[test]
    fn iota_below_shift_still_counts() {
        let gen = first_gen("package p\n\nconst (\n\tKB = 1 << (10 * (iota + 1))\n\tMB\n)\n");
        assert!(group_uses_iota(&gen));
    }
}
