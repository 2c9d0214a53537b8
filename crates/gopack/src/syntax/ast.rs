//! AST for the Go front end.
//!
//! Identifiers and function nodes carry a `NodeId` assigned by the parser.
//! The resolver keys its identifier-resolution tables on those ids, and the
//! reachability analyzer keys its node-to-function index on the ids of
//! `FuncDecl` and `FuncLit` nodes.

/// Identity of an AST node across the whole loaded program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// Source position of an identifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct Span {
    pub line: u32,
    pub offset: u32,
}

#[derive(Debug, Clone)]
pub struct Ident {
    pub id: NodeId,
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn is_exported(&self) -> bool {
        self.name.chars().next().is_some_and(|c| c.is_uppercase())
    }

    pub fn is_blank(&self) -> bool {
        self.name == "_"
    }
}

/// One parsed source file.
#[derive(Debug, Clone)]
pub struct File {
    /// File name, for diagnostics.
    pub name: String,
    pub package: Ident,
    pub imports: Vec<ImportSpec>,
    pub decls: Vec<Decl>,
}

#[derive(Debug, Clone)]
pub struct ImportSpec {
    pub alias: Option<Ident>,
    /// Import path without quotes.
    pub path: String,
    pub line: u32,
}

impl ImportSpec {
    /// The name the import is referenced by in source: the alias if present,
    /// otherwise the last path segment.
    pub fn local_name(&self) -> &str {
        match &self.alias {
            Some(alias) => &alias.name,
            None => self.path.rsplit('/').next().unwrap_or(&self.path),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Decl {
    Func(FuncDecl),
    Gen(GenDecl),
}

#[derive(Debug, Clone)]
pub struct FuncDecl {
    pub id: NodeId,
    /// Method receiver; `None` for plain functions.
    pub recv: Option<Field>,
    pub name: Ident,
    pub type_params: Vec<Field>,
    pub params: Vec<Field>,
    pub results: Vec<Field>,
    pub body: Option<Block>,
}

impl FuncDecl {
    /// The receiver's base type identifier, looking through a pointer.
    pub fn recv_type_name(&self) -> Option<&Ident> {
        receiver_base_ident(&self.recv.as_ref()?.ty)
    }
}

/// Strip pointer and generic instantiation syntax off a receiver type.
pub fn receiver_base_ident(ty: &Expr) -> Option<&Ident> {
    match ty {
        Expr::Ident(ident) => Some(ident),
        Expr::Star(inner) | Expr::Paren(inner) => receiver_base_ident(inner),
        Expr::Index { x, .. } => receiver_base_ident(x),
        _ => None,
    }
}

/// Keyword of a generic declaration group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclTok {
    Type,
    Var,
    Const,
}

#[derive(Debug, Clone)]
pub struct GenDecl {
    pub tok: DeclTok,
    /// Whether the declaration was written with parentheses.
    pub grouped: bool,
    pub specs: Vec<Spec>,
}

#[derive(Debug, Clone)]
pub enum Spec {
    Type(TypeSpec),
    Value(ValueSpec),
}

#[derive(Debug, Clone)]
pub struct TypeSpec {
    pub name: Ident,
    pub type_params: Vec<Field>,
    /// `true` for alias declarations (`type A = B`).
    pub alias: bool,
    pub ty: Expr,
}

#[derive(Debug, Clone)]
pub struct ValueSpec {
    pub names: Vec<Ident>,
    pub ty: Option<Expr>,
    pub values: Vec<Expr>,
}

/// Parameter, result, struct field, or type-parameter entry.
/// Embedded fields have no names.
#[derive(Debug, Clone)]
pub struct Field {
    pub names: Vec<Ident>,
    pub ty: Expr,
}

#[derive(Debug, Clone)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    /// `var`/`const`/`type` inside a function body.
    Decl(GenDecl),
    Expr(Expr),
    Assign {
        lhs: Vec<Expr>,
        op: AssignOp,
        rhs: Vec<Expr>,
    },
    IncDec {
        x: Expr,
        dec: bool,
    },
    Return(Vec<Expr>),
    If(IfStmt),
    For(ForStmt),
    Switch(SwitchStmt),
    Branch {
        kind: BranchKind,
        label: Option<Ident>,
    },
    Block(Block),
    Go(Expr),
    Defer(Expr),
    Labeled {
        label: Ident,
        stmt: Box<Stmt>,
    },
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    /// `:=`
    Define,
    /// `=`
    Assign,
    Add,
    Sub,
    Mul,
    Quo,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    AndNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchKind {
    Break,
    Continue,
    Fallthrough,
    Goto,
}

#[derive(Debug, Clone)]
pub struct IfStmt {
    pub init: Option<Box<Stmt>>,
    pub cond: Expr,
    pub then: Block,
    /// Either a `Block` or another `If`.
    pub els: Option<Box<Stmt>>,
}

#[derive(Debug, Clone)]
pub struct ForStmt {
    pub header: ForHeader,
    pub body: Block,
}

#[derive(Debug, Clone)]
pub enum ForHeader {
    Classic {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        post: Option<Box<Stmt>>,
    },
    Range {
        key: Option<Expr>,
        value: Option<Expr>,
        define: bool,
        x: Expr,
    },
}

#[derive(Debug, Clone)]
pub struct SwitchStmt {
    pub init: Option<Box<Stmt>>,
    pub tag: Option<Expr>,
    pub cases: Vec<CaseClause>,
}

#[derive(Debug, Clone)]
pub struct CaseClause {
    /// Empty for `default`.
    pub exprs: Vec<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LitKind {
    Int,
    Float,
    Imag,
    Char,
    Str,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Ident(Ident),
    Lit {
        kind: LitKind,
        /// Literal text as written, quotes included.
        text: String,
    },
    Composite {
        /// Absent for nested literals whose type is implied.
        ty: Option<Box<Expr>>,
        elts: Vec<Expr>,
    },
    FuncLit(FuncLit),
    Paren(Box<Expr>),
    Selector {
        x: Box<Expr>,
        sel: Ident,
    },
    /// Indexing or generic instantiation; more than one index means
    /// instantiation.
    Index {
        x: Box<Expr>,
        indices: Vec<Expr>,
    },
    Slice {
        x: Box<Expr>,
        low: Option<Box<Expr>>,
        high: Option<Box<Expr>>,
        max: Option<Box<Expr>>,
    },
    TypeAssert {
        x: Box<Expr>,
        ty: Box<Expr>,
    },
    Call {
        fun: Box<Expr>,
        args: Vec<Expr>,
        ellipsis: bool,
    },
    Star(Box<Expr>),
    Unary {
        op: UnaryOp,
        x: Box<Expr>,
    },
    Binary {
        x: Box<Expr>,
        op: BinaryOp,
        y: Box<Expr>,
    },
    KeyValue {
        key: Box<Expr>,
        value: Box<Expr>,
    },
    ArrayType {
        /// `None` for slice types.
        len: Option<Box<Expr>>,
        elt: Box<Expr>,
    },
    Ellipsis {
        elt: Option<Box<Expr>>,
    },
    MapType {
        key: Box<Expr>,
        value: Box<Expr>,
    },
    StructType {
        fields: Vec<Field>,
    },
    InterfaceType {
        elems: Vec<InterfaceElem>,
    },
    FuncType {
        params: Vec<Field>,
        results: Vec<Field>,
    },
}

#[derive(Debug, Clone)]
pub struct FuncLit {
    pub id: NodeId,
    pub params: Vec<Field>,
    pub results: Vec<Field>,
    pub body: Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
    Not,
    Xor,
    Amp,
    Recv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Quo,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    AndNot,
    LAnd,
    LOr,
    Eql,
    Neq,
    Lss,
    Leq,
    Gtr,
    Geq,
}

#[derive(Debug, Clone)]
pub enum InterfaceElem {
    Method {
        name: Ident,
        params: Vec<Field>,
        results: Vec<Field>,
    },
    /// Embedded interface or constraint term (unions appear as `Binary` with
    /// `Or`).
    Embedded(Expr),
}

/// Events produced by the structural walk. Function boundaries are reported
/// so callers can maintain an enclosing-function stack.
pub enum WalkEvent<'a> {
    EnterFunc(NodeId),
    ExitFunc(NodeId),
    Ident(&'a Ident),
}

pub fn walk_file(file: &File, f: &mut dyn FnMut(WalkEvent)) {
    for decl in &file.decls {
        walk_decl(decl, f);
    }
}

pub fn walk_decl(decl: &Decl, f: &mut dyn FnMut(WalkEvent)) {
    match decl {
        Decl::Func(func) => walk_func_decl(func, f),
        Decl::Gen(gen) => walk_gen_decl(gen, f),
    }
}

pub fn walk_func_decl(func: &FuncDecl, f: &mut dyn FnMut(WalkEvent)) {
    f(WalkEvent::EnterFunc(func.id));
    if let Some(recv) = &func.recv {
        walk_field(recv, f);
    }
    for field in func
        .type_params
        .iter()
        .chain(&func.params)
        .chain(&func.results)
    {
        walk_field(field, f);
    }
    if let Some(body) = &func.body {
        walk_block(body, f);
    }
    f(WalkEvent::ExitFunc(func.id));
}

pub fn walk_gen_decl(gen: &GenDecl, f: &mut dyn FnMut(WalkEvent)) {
    for spec in &gen.specs {
        walk_spec(spec, f);
    }
}

pub fn walk_spec(spec: &Spec, f: &mut dyn FnMut(WalkEvent)) {
    match spec {
        Spec::Type(ts) => {
            for field in &ts.type_params {
                walk_field(field, f);
            }
            walk_expr(&ts.ty, f);
        }
        Spec::Value(vs) => {
            if let Some(ty) = &vs.ty {
                walk_expr(ty, f);
            }
            for value in &vs.values {
                walk_expr(value, f);
            }
        }
    }
}

fn walk_field(field: &Field, f: &mut dyn FnMut(WalkEvent)) {
    walk_expr(&field.ty, f);
}

fn walk_block(block: &Block, f: &mut dyn FnMut(WalkEvent)) {
    for stmt in &block.stmts {
        walk_stmt(stmt, f);
    }
}

fn walk_stmt(stmt: &Stmt, f: &mut dyn FnMut(WalkEvent)) {
    match stmt {
        Stmt::Decl(gen) => walk_gen_decl(gen, f),
        Stmt::Expr(e) | Stmt::Go(e) | Stmt::Defer(e) => walk_expr(e, f),
        Stmt::Assign { lhs, rhs, .. } => {
            for e in lhs.iter().chain(rhs) {
                walk_expr(e, f);
            }
        }
        Stmt::IncDec { x, .. } => walk_expr(x, f),
        Stmt::Return(exprs) => {
            for e in exprs {
                walk_expr(e, f);
            }
        }
        Stmt::If(stmt) => {
            if let Some(init) = &stmt.init {
                walk_stmt(init, f);
            }
            walk_expr(&stmt.cond, f);
            walk_block(&stmt.then, f);
            if let Some(els) = &stmt.els {
                walk_stmt(els, f);
            }
        }
        Stmt::For(stmt) => {
            match &stmt.header {
                ForHeader::Classic { init, cond, post } => {
                    if let Some(init) = init {
                        walk_stmt(init, f);
                    }
                    if let Some(cond) = cond {
                        walk_expr(cond, f);
                    }
                    if let Some(post) = post {
                        walk_stmt(post, f);
                    }
                }
                ForHeader::Range { key, value, x, .. } => {
                    if let Some(key) = key {
                        walk_expr(key, f);
                    }
                    if let Some(value) = value {
                        walk_expr(value, f);
                    }
                    walk_expr(x, f);
                }
            }
            walk_block(&stmt.body, f);
        }
        Stmt::Switch(stmt) => {
            if let Some(init) = &stmt.init {
                walk_stmt(init, f);
            }
            if let Some(tag) = &stmt.tag {
                walk_expr(tag, f);
            }
            for case in &stmt.cases {
                for e in &case.exprs {
                    walk_expr(e, f);
                }
                for s in &case.body {
                    walk_stmt(s, f);
                }
            }
        }
        Stmt::Labeled { stmt, .. } => walk_stmt(stmt, f),
        Stmt::Block(block) => walk_block(block, f),
        Stmt::Branch { .. } | Stmt::Empty => {}
    }
}

pub fn walk_expr(expr: &Expr, f: &mut dyn FnMut(WalkEvent)) {
    match expr {
        Expr::Ident(ident) => f(WalkEvent::Ident(ident)),
        Expr::Lit { .. } => {}
        Expr::Composite { ty, elts } => {
            if let Some(ty) = ty {
                walk_expr(ty, f);
            }
            for e in elts {
                walk_expr(e, f);
            }
        }
        Expr::FuncLit(lit) => {
            f(WalkEvent::EnterFunc(lit.id));
            for field in lit.params.iter().chain(&lit.results) {
                walk_field(field, f);
            }
            walk_block(&lit.body, f);
            f(WalkEvent::ExitFunc(lit.id));
        }
        Expr::Paren(e) | Expr::Star(e) => walk_expr(e, f),
        Expr::Selector { x, sel } => {
            walk_expr(x, f);
            f(WalkEvent::Ident(sel));
        }
        Expr::Index { x, indices } => {
            walk_expr(x, f);
            for e in indices {
                walk_expr(e, f);
            }
        }
        Expr::Slice { x, low, high, max } => {
            walk_expr(x, f);
            for e in [low, high, max].into_iter().flatten() {
                walk_expr(e, f);
            }
        }
        Expr::TypeAssert { x, ty } => {
            walk_expr(x, f);
            walk_expr(ty, f);
        }
        Expr::Call { fun, args, .. } => {
            walk_expr(fun, f);
            for e in args {
                walk_expr(e, f);
            }
        }
        Expr::Unary { x, .. } => walk_expr(x, f),
        Expr::Binary { x, y, .. } => {
            walk_expr(x, f);
            walk_expr(y, f);
        }
        Expr::KeyValue { key, value } => {
            walk_expr(key, f);
            walk_expr(value, f);
        }
        Expr::ArrayType { len, elt } => {
            if let Some(len) = len {
                walk_expr(len, f);
            }
            walk_expr(elt, f);
        }
        Expr::Ellipsis { elt } => {
            if let Some(elt) = elt {
                walk_expr(elt, f);
            }
        }
        Expr::MapType { key, value } => {
            walk_expr(key, f);
            walk_expr(value, f);
        }
        Expr::StructType { fields } => {
            for field in fields {
                walk_field(field, f);
            }
        }
        Expr::InterfaceType { elems } => {
            for elem in elems {
                match elem {
                    InterfaceElem::Method {
                        params, results, ..
                    } => {
                        for field in params.iter().chain(results) {
                            walk_field(field, f);
                        }
                    }
                    InterfaceElem::Embedded(e) => walk_expr(e, f),
                }
            }
        }
        Expr::FuncType { params, results } => {
            for field in params.iter().chain(results) {
                walk_field(field, f);
            }
        }
    }
}
