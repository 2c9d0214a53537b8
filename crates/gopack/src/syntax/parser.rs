//! Recursive-descent parser for the Go front end.
//!
//! Covers the declaration and statement forms a contest program uses:
//! functions, methods, generics, grouped `var`/`const`/`type` declarations,
//! composite literals, interfaces, and closures. Channel `select` and type
//! switches are out of scope and rejected with a parse error.

use super::ast::*;
use super::scanner::Scanner;
use super::token::{Tok, Token};

/// A parse failure, pointing at the offending file and line.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub file: String,
    pub line: u32,
    pub message: String,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.file, self.line, self.message)
    }
}

impl std::error::Error for ParseError {}

/// Allocator for node identities, shared across every file of one load so
/// ids are unique program-wide.
#[derive(Debug, Default)]
pub struct IdGen {
    next: u32,
}

impl IdGen {
    pub fn next_id(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }
}

/// Parse one source file.
pub fn parse_file(src: &str, file_name: &str, ids: &mut IdGen) -> Result<File, ParseError> {
    let tokens = Scanner::new(src).scan_all().map_err(|e| ParseError {
        file: file_name.to_string(),
        line: e.line,
        message: e.message,
    })?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        file: file_name.to_string(),
        ids,
        no_lit: 0,
    };
    parser.file()
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    file: String,
    ids: &'a mut IdGen,
    /// Nonzero while parsing an `if`/`for`/`switch` header, where a bare
    /// `{` opens the body rather than a composite literal.
    no_lit: u32,
}

impl<'a> Parser<'a> {
    fn cur(&self) -> &Tok {
        &self.tokens[self.pos].tok
    }

    fn peek(&self) -> &Tok {
        let next = (self.pos + 1).min(self.tokens.len() - 1);
        &self.tokens[next].tok
    }

    fn line(&self) -> u32 {
        self.tokens[self.pos].line
    }

    fn offset(&self) -> u32 {
        self.tokens[self.pos].offset
    }

    fn bump(&mut self) -> Tok {
        let tok = self.tokens[self.pos].tok.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn at(&self, tok: &Tok) -> bool {
        self.cur() == tok
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.at(tok) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: &Tok) -> Result<(), ParseError> {
        if self.eat(tok) {
            Ok(())
        } else {
            Err(self.error(format!(
                "expected {}, found {}",
                tok.describe(),
                self.cur().describe()
            )))
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            file: self.file.clone(),
            line: self.line(),
            message: message.into(),
        }
    }

    fn skip_semis(&mut self) {
        while self.at(&Tok::Semi) {
            self.bump();
        }
    }

    fn ident(&mut self) -> Result<Ident, ParseError> {
        let span = Span {
            line: self.line(),
            offset: self.offset(),
        };
        match self.bump() {
            Tok::Ident(name) => Ok(Ident {
                id: self.ids.next_id(),
                name,
                span,
            }),
            other => Err(ParseError {
                file: self.file.clone(),
                line: span.line,
                message: format!("expected identifier, found {}", other.describe()),
            }),
        }
    }

    // ---- file structure ----

    fn file(&mut self) -> Result<File, ParseError> {
        self.skip_semis();
        self.expect(&Tok::Package)?;
        let package = self.ident()?;
        self.expect(&Tok::Semi)?;
        self.skip_semis();

        let mut imports = Vec::new();
        while self.at(&Tok::Import) {
            self.bump();
            if self.eat(&Tok::LParen) {
                self.skip_semis();
                while !self.eat(&Tok::RParen) {
                    imports.push(self.import_spec()?);
                    self.skip_semis();
                }
            } else {
                imports.push(self.import_spec()?);
            }
            self.skip_semis();
        }

        let mut decls = Vec::new();
        while !self.at(&Tok::Eof) {
            decls.push(self.top_level_decl()?);
            self.skip_semis();
        }

        Ok(File {
            name: self.file.clone(),
            package,
            imports,
            decls,
        })
    }

    fn import_spec(&mut self) -> Result<ImportSpec, ParseError> {
        let line = self.line();
        let alias = match self.cur() {
            Tok::Ident(_) => Some(self.ident()?),
            Tok::Period => {
                return Err(self.error("dot imports are not supported"));
            }
            _ => None,
        };
        let path = match self.bump() {
            Tok::Str(text) => unquote(&text),
            other => {
                return Err(ParseError {
                    file: self.file.clone(),
                    line,
                    message: format!("expected import path string, found {}", other.describe()),
                });
            }
        };
        Ok(ImportSpec { alias, path, line })
    }

    fn top_level_decl(&mut self) -> Result<Decl, ParseError> {
        match self.cur() {
            Tok::Func => Ok(Decl::Func(self.func_decl()?)),
            Tok::Type | Tok::Var | Tok::Const => Ok(Decl::Gen(self.gen_decl()?)),
            Tok::Import => Err(self.error("imports must precede other declarations")),
            other => Err(self.error(format!(
                "expected declaration, found {}",
                other.describe()
            ))),
        }
    }

    fn func_decl(&mut self) -> Result<FuncDecl, ParseError> {
        self.expect(&Tok::Func)?;
        let id = self.ids.next_id();

        let recv = if self.at(&Tok::LParen) {
            self.bump();
            let field = self.field(true)?;
            self.expect(&Tok::RParen)?;
            Some(field)
        } else {
            None
        };

        let name = self.ident()?;

        let type_params = if recv.is_none() && self.at(&Tok::LBrack) {
            self.type_param_list()?
        } else {
            Vec::new()
        };

        let (params, results) = self.signature()?;
        let body = if self.at(&Tok::LBrace) {
            Some(self.block()?)
        } else {
            None
        };

        Ok(FuncDecl {
            id,
            recv,
            name,
            type_params,
            params,
            results,
            body,
        })
    }

    fn type_param_list(&mut self) -> Result<Vec<Field>, ParseError> {
        self.expect(&Tok::LBrack)?;
        let mut params = Vec::new();
        while !self.at(&Tok::RBrack) {
            params.push(self.field(false)?);
            if !self.eat(&Tok::Comma) {
                break;
            }
        }
        self.expect(&Tok::RBrack)?;
        Ok(params)
    }

    fn signature(&mut self) -> Result<(Vec<Field>, Vec<Field>), ParseError> {
        let params = self.param_list()?;
        let results = if self.at(&Tok::LParen) {
            self.param_list()?
        } else if self.starts_type() {
            vec![Field {
                names: Vec::new(),
                ty: self.type_expr()?,
            }]
        } else {
            Vec::new()
        };
        Ok((params, results))
    }

    fn param_list(&mut self) -> Result<Vec<Field>, ParseError> {
        self.expect(&Tok::LParen)?;
        let mut fields = Vec::new();
        while !self.at(&Tok::RParen) {
            fields.push(self.field(true)?);
            if !self.eat(&Tok::Comma) {
                break;
            }
        }
        self.expect(&Tok::RParen)?;
        Ok(fields)
    }

    /// Parse a parameter-style field: `a, b int`, `int`, `x ...int`.
    /// With `allow_unnamed` the names are optional.
    fn field(&mut self, allow_unnamed: bool) -> Result<Field, ParseError> {
        if matches!(self.cur(), Tok::Ident(_)) && self.param_is_named() {
            let mut names = vec![self.ident()?];
            while self.at(&Tok::Comma) && matches!(self.peek(), Tok::Ident(_)) {
                self.bump();
                names.push(self.ident()?);
            }
            let ty = if self.eat(&Tok::Ellipsis) {
                Expr::Ellipsis {
                    elt: Some(Box::new(self.type_expr()?)),
                }
            } else {
                self.type_expr()?
            };
            return Ok(Field { names, ty });
        }
        if !allow_unnamed {
            return Err(self.error("expected parameter name"));
        }
        let ty = if self.eat(&Tok::Ellipsis) {
            Expr::Ellipsis {
                elt: Some(Box::new(self.type_expr()?)),
            }
        } else {
            self.type_expr()?
        };
        Ok(Field {
            names: Vec::new(),
            ty,
        })
    }

    /// Decide whether the identifier at the cursor begins a named parameter
    /// group (`a, b int`) rather than a bare type (`int`, `fmt.Stringer`,
    /// `Seeker[int]`). Looks across `ident ,` runs to the deciding token;
    /// for `ident [` the bracket is balanced first, since `x []int` is named
    /// while `Seeker[int]` is a type.
    fn param_is_named(&self) -> bool {
        let mut i = self.pos;
        loop {
            let next = self.tokens.get(i + 1).map(|t| &t.tok);
            match (&self.tokens[i].tok, next) {
                (Tok::Ident(_), Some(Tok::Comma)) => {
                    if matches!(self.tokens.get(i + 2).map(|t| &t.tok), Some(Tok::Ident(_))) {
                        i += 2;
                    } else {
                        return false;
                    }
                }
                (Tok::Ident(_), Some(next)) => {
                    return match next {
                        Tok::Ident(_)
                        | Tok::Mul
                        | Tok::Map
                        | Tok::Func
                        | Tok::Struct
                        | Tok::Interface
                        | Tok::Ellipsis => true,
                        Tok::LBrack => self.bracket_then_type(i + 1),
                        _ => false,
                    };
                }
                _ => return false,
            }
        }
    }

    /// Whether the token after the bracket balanced from `open` starts a
    /// type.
    fn bracket_then_type(&self, open: usize) -> bool {
        let mut depth = 0usize;
        let mut i = open;
        while let Some(token) = self.tokens.get(i) {
            match token.tok {
                Tok::LBrack => depth += 1,
                Tok::RBrack => {
                    depth -= 1;
                    if depth == 0 {
                        return self.tokens.get(i + 1).is_some_and(|t| {
                            matches!(
                                t.tok,
                                Tok::Ident(_)
                                    | Tok::LBrack
                                    | Tok::Mul
                                    | Tok::Map
                                    | Tok::Func
                                    | Tok::Struct
                                    | Tok::Interface
                                    | Tok::LParen
                            )
                        });
                    }
                }
                Tok::Eof => return false,
                _ => {}
            }
            i += 1;
        }
        false
    }

    fn gen_decl(&mut self) -> Result<GenDecl, ParseError> {
        let tok = match self.bump() {
            Tok::Type => DeclTok::Type,
            Tok::Var => DeclTok::Var,
            Tok::Const => DeclTok::Const,
            other => {
                return Err(self.error(format!(
                    "expected declaration keyword, found {}",
                    other.describe()
                )));
            }
        };
        let mut specs = Vec::new();
        let grouped = self.eat(&Tok::LParen);
        if grouped {
            self.skip_semis();
            while !self.eat(&Tok::RParen) {
                specs.push(self.spec(tok)?);
                self.skip_semis();
            }
        } else {
            specs.push(self.spec(tok)?);
        }
        Ok(GenDecl {
            tok,
            grouped,
            specs,
        })
    }

    fn spec(&mut self, tok: DeclTok) -> Result<Spec, ParseError> {
        match tok {
            DeclTok::Type => {
                let name = self.ident()?;
                let type_params = if self.at(&Tok::LBrack) && self.is_type_param_start() {
                    self.type_param_list()?
                } else {
                    Vec::new()
                };
                let alias = self.eat(&Tok::Assign);
                let ty = self.type_expr()?;
                Ok(Spec::Type(TypeSpec {
                    name,
                    type_params,
                    alias,
                    ty,
                }))
            }
            DeclTok::Var | DeclTok::Const => {
                let mut names = vec![self.ident()?];
                while self.eat(&Tok::Comma) {
                    names.push(self.ident()?);
                }
                let ty = if self.starts_type() && !self.at(&Tok::Assign) {
                    Some(self.type_expr()?)
                } else {
                    None
                };
                let values = if self.eat(&Tok::Assign) {
                    self.expr_list()?
                } else {
                    Vec::new()
                };
                Ok(Spec::Value(ValueSpec { names, ty, values }))
            }
        }
    }

    /// Distinguish `type A[T any] ...` type parameters from `type A [N]int`
    /// array types: a lone identifier immediately closed by `]` is an array
    /// length, anything longer is a parameter list.
    fn is_type_param_start(&self) -> bool {
        match self.peek() {
            Tok::Ident(_) => {
                let after = (self.pos + 2).min(self.tokens.len() - 1);
                !matches!(self.tokens[after].tok, Tok::RBrack)
            }
            _ => false,
        }
    }

    // ---- types ----

    fn starts_type(&self) -> bool {
        matches!(
            self.cur(),
            Tok::Ident(_)
                | Tok::LBrack
                | Tok::Mul
                | Tok::Map
                | Tok::Func
                | Tok::Struct
                | Tok::Interface
                | Tok::LParen
                | Tok::Arrow
                | Tok::Chan
        )
    }

    fn type_expr(&mut self) -> Result<Expr, ParseError> {
        match self.cur().clone() {
            Tok::Ident(_) => {
                let mut ty = Expr::Ident(self.ident()?);
                if self.at(&Tok::Period) {
                    self.bump();
                    let sel = self.ident()?;
                    ty = Expr::Selector {
                        x: Box::new(ty),
                        sel,
                    };
                }
                if self.at(&Tok::LBrack) && !matches!(self.peek(), Tok::RBrack) {
                    // Generic type instantiation: Name[T1, T2].
                    self.bump();
                    let mut indices = vec![self.type_expr()?];
                    while self.eat(&Tok::Comma) {
                        indices.push(self.type_expr()?);
                    }
                    self.expect(&Tok::RBrack)?;
                    ty = Expr::Index {
                        x: Box::new(ty),
                        indices,
                    };
                }
                Ok(ty)
            }
            Tok::LBrack => {
                self.bump();
                let len = if self.eat(&Tok::RBrack) {
                    None
                } else {
                    let len = if self.eat(&Tok::Ellipsis) {
                        Expr::Ellipsis { elt: None }
                    } else {
                        self.expr()?
                    };
                    self.expect(&Tok::RBrack)?;
                    Some(Box::new(len))
                };
                let elt = self.type_expr()?;
                Ok(Expr::ArrayType {
                    len,
                    elt: Box::new(elt),
                })
            }
            Tok::Mul => {
                self.bump();
                Ok(Expr::Star(Box::new(self.type_expr()?)))
            }
            Tok::Map => {
                self.bump();
                self.expect(&Tok::LBrack)?;
                let key = self.type_expr()?;
                self.expect(&Tok::RBrack)?;
                let value = self.type_expr()?;
                Ok(Expr::MapType {
                    key: Box::new(key),
                    value: Box::new(value),
                })
            }
            Tok::Struct => {
                self.bump();
                self.expect(&Tok::LBrace)?;
                self.skip_semis();
                let mut fields = Vec::new();
                while !self.eat(&Tok::RBrace) {
                    fields.push(self.struct_field()?);
                    self.skip_semis();
                }
                Ok(Expr::StructType { fields })
            }
            Tok::Interface => {
                self.bump();
                self.expect(&Tok::LBrace)?;
                self.skip_semis();
                let mut elems = Vec::new();
                while !self.eat(&Tok::RBrace) {
                    elems.push(self.interface_elem()?);
                    self.skip_semis();
                }
                Ok(Expr::InterfaceType { elems })
            }
            Tok::Func => {
                self.bump();
                let (params, results) = self.signature()?;
                Ok(Expr::FuncType { params, results })
            }
            Tok::LParen => {
                self.bump();
                let ty = self.type_expr()?;
                self.expect(&Tok::RParen)?;
                Ok(Expr::Paren(Box::new(ty)))
            }
            Tok::Chan | Tok::Arrow => Err(self.error("channel types are not supported")),
            other => Err(self.error(format!("expected type, found {}", other.describe()))),
        }
    }

    fn struct_field(&mut self) -> Result<Field, ParseError> {
        // Embedded field: a (possibly qualified, possibly pointered) type
        // name followed directly by the end of the field.
        if self.at(&Tok::Mul) {
            self.bump();
            let ty = self.type_expr()?;
            self.field_tag()?;
            return Ok(Field {
                names: Vec::new(),
                ty: Expr::Star(Box::new(ty)),
            });
        }
        let mut names = vec![self.ident()?];
        if matches!(self.cur(), Tok::Semi | Tok::RBrace | Tok::Period | Tok::Str(_)) {
            // Embedded: `lib.LibStruct` or bare `LibStruct`.
            let mut ty = Expr::Ident(names.pop().expect("one name was just parsed"));
            if self.eat(&Tok::Period) {
                let sel = self.ident()?;
                ty = Expr::Selector {
                    x: Box::new(ty),
                    sel,
                };
            }
            self.field_tag()?;
            return Ok(Field {
                names: Vec::new(),
                ty,
            });
        }
        while self.eat(&Tok::Comma) {
            names.push(self.ident()?);
        }
        let ty = self.type_expr()?;
        self.field_tag()?;
        Ok(Field { names, ty })
    }

    fn field_tag(&mut self) -> Result<(), ParseError> {
        if matches!(self.cur(), Tok::Str(_)) {
            self.bump();
        }
        Ok(())
    }

    fn interface_elem(&mut self) -> Result<InterfaceElem, ParseError> {
        if matches!(self.cur(), Tok::Ident(_)) && matches!(self.peek(), Tok::LParen) {
            let name = self.ident()?;
            let (params, results) = self.signature()?;
            return Ok(InterfaceElem::Method {
                name,
                params,
                results,
            });
        }
        // Embedded interface or constraint term, possibly a union.
        let mut term = self.type_expr()?;
        while self.eat(&Tok::Or) {
            let rhs = self.type_expr()?;
            term = Expr::Binary {
                x: Box::new(term),
                op: BinaryOp::Or,
                y: Box::new(rhs),
            };
        }
        Ok(InterfaceElem::Embedded(term))
    }

    // ---- statements ----

    fn block(&mut self) -> Result<Block, ParseError> {
        self.expect(&Tok::LBrace)?;
        let saved = self.no_lit;
        self.no_lit = 0;
        let mut stmts = Vec::new();
        self.skip_semis();
        while !self.at(&Tok::RBrace) && !self.at(&Tok::Eof) {
            stmts.push(self.stmt()?);
            self.skip_semis();
        }
        self.expect(&Tok::RBrace)?;
        self.no_lit = saved;
        Ok(Block { stmts })
    }

    fn stmt(&mut self) -> Result<Stmt, ParseError> {
        match self.cur() {
            Tok::Var | Tok::Const | Tok::Type => Ok(Stmt::Decl(self.gen_decl()?)),
            Tok::Return => {
                self.bump();
                let exprs = if matches!(self.cur(), Tok::Semi | Tok::RBrace) {
                    Vec::new()
                } else {
                    self.expr_list()?
                };
                Ok(Stmt::Return(exprs))
            }
            Tok::If => self.if_stmt(),
            Tok::For => self.for_stmt(),
            Tok::Switch => self.switch_stmt(),
            Tok::Go => {
                self.bump();
                Ok(Stmt::Go(self.expr()?))
            }
            Tok::Defer => {
                self.bump();
                Ok(Stmt::Defer(self.expr()?))
            }
            Tok::Break | Tok::Continue | Tok::Fallthrough | Tok::Goto => {
                let kind = match self.bump() {
                    Tok::Break => BranchKind::Break,
                    Tok::Continue => BranchKind::Continue,
                    Tok::Fallthrough => BranchKind::Fallthrough,
                    _ => BranchKind::Goto,
                };
                let label = if matches!(self.cur(), Tok::Ident(_)) {
                    Some(self.ident()?)
                } else {
                    None
                };
                Ok(Stmt::Branch { kind, label })
            }
            Tok::LBrace => Ok(Stmt::Block(self.block()?)),
            Tok::Semi => Ok(Stmt::Empty),
            Tok::Select => Err(self.error("select statements are not supported")),
            Tok::Ident(_) if matches!(self.peek(), Tok::Colon) => {
                let label = self.ident()?;
                self.bump(); // ':'
                self.skip_semis();
                let stmt = self.stmt()?;
                Ok(Stmt::Labeled {
                    label,
                    stmt: Box::new(stmt),
                })
            }
            _ => self.simple_stmt(),
        }
    }

    /// Expression statement, assignment, short variable declaration, or
    /// increment/decrement.
    fn simple_stmt(&mut self) -> Result<Stmt, ParseError> {
        let lhs = self.expr_list()?;
        match self.cur().clone() {
            Tok::Define => {
                self.bump();
                let rhs = self.expr_list()?;
                Ok(Stmt::Assign {
                    lhs,
                    op: AssignOp::Define,
                    rhs,
                })
            }
            Tok::Assign => {
                self.bump();
                let rhs = self.expr_list()?;
                Ok(Stmt::Assign {
                    lhs,
                    op: AssignOp::Assign,
                    rhs,
                })
            }
            tok @ (Tok::AddAssign
            | Tok::SubAssign
            | Tok::MulAssign
            | Tok::QuoAssign
            | Tok::RemAssign
            | Tok::AndAssign
            | Tok::OrAssign
            | Tok::XorAssign
            | Tok::ShlAssign
            | Tok::ShrAssign
            | Tok::AndNotAssign) => {
                self.bump();
                let op = match tok {
                    Tok::AddAssign => AssignOp::Add,
                    Tok::SubAssign => AssignOp::Sub,
                    Tok::MulAssign => AssignOp::Mul,
                    Tok::QuoAssign => AssignOp::Quo,
                    Tok::RemAssign => AssignOp::Rem,
                    Tok::AndAssign => AssignOp::And,
                    Tok::OrAssign => AssignOp::Or,
                    Tok::XorAssign => AssignOp::Xor,
                    Tok::ShlAssign => AssignOp::Shl,
                    Tok::ShrAssign => AssignOp::Shr,
                    _ => AssignOp::AndNot,
                };
                let rhs = self.expr_list()?;
                Ok(Stmt::Assign { lhs, op, rhs })
            }
            Tok::Inc | Tok::Dec => {
                let dec = self.bump() == Tok::Dec;
                let x = into_single(lhs).map_err(|()| self.error("unexpected expression list"))?;
                Ok(Stmt::IncDec { x, dec })
            }
            _ => {
                let x = into_single(lhs)
                    .map_err(|()| self.error("expected statement, found expression list"))?;
                Ok(Stmt::Expr(x))
            }
        }
    }

    fn if_stmt(&mut self) -> Result<Stmt, ParseError> {
        self.expect(&Tok::If)?;
        self.no_lit += 1;
        let mut init = None;
        let mut cond_stmt = self.simple_stmt()?;
        if self.eat(&Tok::Semi) {
            init = Some(Box::new(cond_stmt));
            cond_stmt = self.simple_stmt()?;
        }
        self.no_lit -= 1;
        let cond = match cond_stmt {
            Stmt::Expr(e) => e,
            _ => return Err(self.error("expected condition expression in if statement")),
        };
        let then = self.block()?;
        let els = if self.eat(&Tok::Else) {
            if self.at(&Tok::If) {
                Some(Box::new(self.if_stmt()?))
            } else {
                Some(Box::new(Stmt::Block(self.block()?)))
            }
        } else {
            None
        };
        Ok(Stmt::If(IfStmt {
            init,
            cond,
            then,
            els,
        }))
    }

    fn for_stmt(&mut self) -> Result<Stmt, ParseError> {
        self.expect(&Tok::For)?;
        self.no_lit += 1;

        // Infinite loop: `for {`.
        if self.at(&Tok::LBrace) {
            self.no_lit -= 1;
            let body = self.block()?;
            return Ok(Stmt::For(ForStmt {
                header: ForHeader::Classic {
                    init: None,
                    cond: None,
                    post: None,
                },
                body,
            }));
        }

        // `for range x` has no iteration variables.
        if self.at(&Tok::Range) {
            self.bump();
            let x = self.expr()?;
            self.no_lit -= 1;
            let body = self.block()?;
            return Ok(Stmt::For(ForStmt {
                header: ForHeader::Range {
                    key: None,
                    value: None,
                    define: false,
                    x,
                },
                body,
            }));
        }

        // Detect a range clause behind iteration variables.
        let checkpoint = self.pos;
        if let Some(range_stmt) = self.try_range_clause()? {
            self.no_lit -= 1;
            let body = self.block()?;
            return Ok(Stmt::For(ForStmt {
                header: range_stmt,
                body,
            }));
        }
        self.pos = checkpoint;

        // `for cond {` or `for init; cond; post {`.
        let mut init = None;
        let mut cond = None;
        let mut post = None;
        if !self.at(&Tok::Semi) {
            let first = self.simple_stmt()?;
            if self.at(&Tok::LBrace) {
                match first {
                    Stmt::Expr(e) => cond = Some(e),
                    _ => return Err(self.error("expected loop condition")),
                }
                self.no_lit -= 1;
                let body = self.block()?;
                return Ok(Stmt::For(ForStmt {
                    header: ForHeader::Classic {
                        init: None,
                        cond,
                        post: None,
                    },
                    body,
                }));
            }
            init = Some(Box::new(first));
        }
        self.expect(&Tok::Semi)?;
        if !self.at(&Tok::Semi) {
            cond = Some(self.expr()?);
        }
        self.expect(&Tok::Semi)?;
        if !self.at(&Tok::LBrace) {
            post = Some(Box::new(self.simple_stmt()?));
        }
        self.no_lit -= 1;
        let body = self.block()?;
        Ok(Stmt::For(ForStmt {
            header: ForHeader::Classic { init, cond, post },
            body,
        }))
    }

    /// Attempt `k, v := range x` / `k = range x`; restores nothing on its
    /// own, the caller keeps a checkpoint.
    fn try_range_clause(&mut self) -> Result<Option<ForHeader>, ParseError> {
        let lhs = match self.expr_list() {
            Ok(lhs) => lhs,
            Err(_) => return Ok(None),
        };
        let define = match self.cur() {
            Tok::Define => true,
            Tok::Assign => false,
            _ => return Ok(None),
        };
        if !matches!(self.peek(), Tok::Range) {
            return Ok(None);
        }
        self.bump(); // := or =
        self.bump(); // range
        let x = self.expr()?;
        let mut iter = lhs.into_iter();
        let key = iter.next();
        let value = iter.next();
        Ok(Some(ForHeader::Range {
            key,
            value,
            define,
            x,
        }))
    }

    fn switch_stmt(&mut self) -> Result<Stmt, ParseError> {
        self.expect(&Tok::Switch)?;
        self.no_lit += 1;
        let mut init = None;
        let mut tag = None;
        if !self.at(&Tok::LBrace) {
            let first = self.simple_stmt()?;
            if self.eat(&Tok::Semi) {
                init = Some(Box::new(first));
                if !self.at(&Tok::LBrace) {
                    match self.simple_stmt()? {
                        Stmt::Expr(e) => tag = Some(e),
                        _ => return Err(self.error("expected switch tag expression")),
                    }
                }
            } else {
                match first {
                    Stmt::Expr(e) => tag = Some(e),
                    _ => return Err(self.error("expected switch tag expression")),
                }
            }
        }
        self.no_lit -= 1;
        self.expect(&Tok::LBrace)?;
        self.skip_semis();
        let mut cases = Vec::new();
        while !self.eat(&Tok::RBrace) {
            let exprs = if self.eat(&Tok::Case) {
                self.expr_list()?
            } else {
                self.expect(&Tok::Default)?;
                Vec::new()
            };
            self.expect(&Tok::Colon)?;
            self.skip_semis();
            let mut body = Vec::new();
            while !matches!(self.cur(), Tok::Case | Tok::Default | Tok::RBrace) {
                body.push(self.stmt()?);
                self.skip_semis();
            }
            cases.push(CaseClause { exprs, body });
        }
        Ok(Stmt::Switch(SwitchStmt { init, tag, cases }))
    }

    // ---- expressions ----

    fn expr_list(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut exprs = vec![self.expr()?];
        while self.eat(&Tok::Comma) {
            exprs.push(self.expr()?);
        }
        Ok(exprs)
    }

    fn expr(&mut self) -> Result<Expr, ParseError> {
        self.binary_expr(0)
    }

    fn binary_expr(&mut self, min_prec: u8) -> Result<Expr, ParseError> {
        let mut x = self.unary_expr()?;
        loop {
            let prec = self.cur().precedence();
            if prec == 0 || prec <= min_prec {
                return Ok(x);
            }
            let op = match self.bump() {
                Tok::Add => BinaryOp::Add,
                Tok::Sub => BinaryOp::Sub,
                Tok::Mul => BinaryOp::Mul,
                Tok::Quo => BinaryOp::Quo,
                Tok::Rem => BinaryOp::Rem,
                Tok::And => BinaryOp::And,
                Tok::Or => BinaryOp::Or,
                Tok::Xor => BinaryOp::Xor,
                Tok::Shl => BinaryOp::Shl,
                Tok::Shr => BinaryOp::Shr,
                Tok::AndNot => BinaryOp::AndNot,
                Tok::LAnd => BinaryOp::LAnd,
                Tok::LOr => BinaryOp::LOr,
                Tok::Eql => BinaryOp::Eql,
                Tok::Neq => BinaryOp::Neq,
                Tok::Lss => BinaryOp::Lss,
                Tok::Leq => BinaryOp::Leq,
                Tok::Gtr => BinaryOp::Gtr,
                Tok::Geq => BinaryOp::Geq,
                other => {
                    return Err(self.error(format!("unexpected operator {}", other.describe())));
                }
            };
            let y = self.binary_expr(prec)?;
            x = Expr::Binary {
                x: Box::new(x),
                op,
                y: Box::new(y),
            };
        }
    }

    fn unary_expr(&mut self) -> Result<Expr, ParseError> {
        let op = match self.cur() {
            Tok::Add => Some(UnaryOp::Plus),
            Tok::Sub => Some(UnaryOp::Minus),
            Tok::Not => Some(UnaryOp::Not),
            Tok::Xor => Some(UnaryOp::Xor),
            Tok::And => Some(UnaryOp::Amp),
            Tok::Arrow => Some(UnaryOp::Recv),
            Tok::Mul => {
                self.bump();
                let x = self.unary_expr()?;
                return Ok(Expr::Star(Box::new(x)));
            }
            _ => None,
        };
        if let Some(op) = op {
            self.bump();
            let x = self.unary_expr()?;
            return Ok(Expr::Unary {
                op,
                x: Box::new(x),
            });
        }
        self.primary_expr()
    }

    fn primary_expr(&mut self) -> Result<Expr, ParseError> {
        let mut x = self.operand()?;
        loop {
            match self.cur().clone() {
                Tok::Period => {
                    self.bump();
                    if self.eat(&Tok::LParen) {
                        if self.at(&Tok::Type) {
                            return Err(self.error("type switches are not supported"));
                        }
                        let ty = self.type_expr()?;
                        self.expect(&Tok::RParen)?;
                        x = Expr::TypeAssert {
                            x: Box::new(x),
                            ty: Box::new(ty),
                        };
                    } else {
                        let sel = self.ident()?;
                        x = Expr::Selector {
                            x: Box::new(x),
                            sel,
                        };
                    }
                }
                Tok::LBrack => {
                    self.bump();
                    x = self.index_or_slice(x)?;
                }
                Tok::LParen => {
                    self.bump();
                    let saved = self.no_lit;
                    self.no_lit = 0;
                    let mut args = Vec::new();
                    let mut ellipsis = false;
                    while !self.at(&Tok::RParen) {
                        args.push(self.expr()?);
                        if self.eat(&Tok::Ellipsis) {
                            ellipsis = true;
                        }
                        if !self.eat(&Tok::Comma) {
                            break;
                        }
                    }
                    self.no_lit = saved;
                    self.expect(&Tok::RParen)?;
                    x = Expr::Call {
                        fun: Box::new(x),
                        args,
                        ellipsis,
                    };
                }
                Tok::LBrace if self.no_lit == 0 && is_literal_type(&x) => {
                    x = self.composite_body(Some(Box::new(x)))?;
                }
                _ => return Ok(x),
            }
        }
    }

    fn index_or_slice(&mut self, x: Expr) -> Result<Expr, ParseError> {
        let saved = self.no_lit;
        self.no_lit = 0;
        let result = self.index_or_slice_inner(x);
        self.no_lit = saved;
        result
    }

    fn index_or_slice_inner(&mut self, x: Expr) -> Result<Expr, ParseError> {
        // x[:...] slices.
        if self.eat(&Tok::Colon) {
            let mut high = None;
            let mut max = None;
            if !self.at(&Tok::RBrack) {
                high = Some(Box::new(self.expr()?));
                if self.eat(&Tok::Colon) {
                    max = Some(Box::new(self.expr()?));
                }
            }
            self.expect(&Tok::RBrack)?;
            return Ok(Expr::Slice {
                x: Box::new(x),
                low: None,
                high,
                max,
            });
        }
        let first = self.expr()?;
        if self.eat(&Tok::Colon) {
            let mut high = None;
            let mut max = None;
            if !self.at(&Tok::RBrack) {
                high = Some(Box::new(self.expr()?));
                if self.eat(&Tok::Colon) {
                    max = Some(Box::new(self.expr()?));
                }
            }
            self.expect(&Tok::RBrack)?;
            return Ok(Expr::Slice {
                x: Box::new(x),
                low: Some(Box::new(first)),
                high,
                max,
            });
        }
        let mut indices = vec![first];
        while self.eat(&Tok::Comma) {
            indices.push(self.expr()?);
        }
        self.expect(&Tok::RBrack)?;
        Ok(Expr::Index {
            x: Box::new(x),
            indices,
        })
    }

    fn operand(&mut self) -> Result<Expr, ParseError> {
        match self.cur().clone() {
            Tok::Ident(_) => Ok(Expr::Ident(self.ident()?)),
            Tok::Int(text) => {
                self.bump();
                Ok(Expr::Lit {
                    kind: LitKind::Int,
                    text,
                })
            }
            Tok::Float(text) => {
                self.bump();
                Ok(Expr::Lit {
                    kind: LitKind::Float,
                    text,
                })
            }
            Tok::Imag(text) => {
                self.bump();
                Ok(Expr::Lit {
                    kind: LitKind::Imag,
                    text,
                })
            }
            Tok::Char(text) => {
                self.bump();
                Ok(Expr::Lit {
                    kind: LitKind::Char,
                    text,
                })
            }
            Tok::Str(text) => {
                self.bump();
                Ok(Expr::Lit {
                    kind: LitKind::Str,
                    text,
                })
            }
            Tok::LParen => {
                self.bump();
                let saved = self.no_lit;
                self.no_lit = 0;
                let inner = self.expr()?;
                self.no_lit = saved;
                self.expect(&Tok::RParen)?;
                Ok(Expr::Paren(Box::new(inner)))
            }
            Tok::Func => {
                self.bump();
                let (params, results) = self.signature()?;
                if self.at(&Tok::LBrace) {
                    let id = self.ids.next_id();
                    let body = self.block()?;
                    Ok(Expr::FuncLit(FuncLit {
                        id,
                        params,
                        results,
                        body,
                    }))
                } else {
                    Ok(Expr::FuncType { params, results })
                }
            }
            Tok::LBrack | Tok::Map | Tok::Struct | Tok::Interface => {
                let ty = self.type_expr()?;
                // A literal type starting with its own token is unambiguous
                // even in an if/for/switch header; only the bare-TypeName
                // form needs the no_lit gate.
                if self.at(&Tok::LBrace) {
                    self.composite_body(Some(Box::new(ty)))
                } else {
                    Ok(ty)
                }
            }
            Tok::LBrace => {
                // Untyped composite literal (only valid nested; the parser
                // is lenient here and resolution never consults it).
                self.composite_body(None)
            }
            other => Err(self.error(format!(
                "expected expression, found {}",
                other.describe()
            ))),
        }
    }

    fn composite_body(&mut self, ty: Option<Box<Expr>>) -> Result<Expr, ParseError> {
        self.expect(&Tok::LBrace)?;
        let saved = self.no_lit;
        self.no_lit = 0;
        self.skip_semis();
        let mut elts = Vec::new();
        while !self.at(&Tok::RBrace) {
            let elt = self.composite_elt()?;
            if self.eat(&Tok::Colon) {
                let value = self.composite_elt()?;
                elts.push(Expr::KeyValue {
                    key: Box::new(elt),
                    value: Box::new(value),
                });
            } else {
                elts.push(elt);
            }
            if !self.eat(&Tok::Comma) {
                self.skip_semis();
                break;
            }
            self.skip_semis();
        }
        self.expect(&Tok::RBrace)?;
        self.no_lit = saved;
        Ok(Expr::Composite { ty, elts })
    }

    fn composite_elt(&mut self) -> Result<Expr, ParseError> {
        if self.at(&Tok::LBrace) {
            self.composite_body(None)
        } else {
            self.expr()
        }
    }
}

fn into_single(mut exprs: Vec<Expr>) -> Result<Expr, ()> {
    if exprs.len() == 1 {
        Ok(exprs.pop().expect("length checked"))
    } else {
        Err(())
    }
}

/// Whether an expression can be the type of a composite literal.
fn is_literal_type(expr: &Expr) -> bool {
    match expr {
        Expr::Ident(_) | Expr::ArrayType { .. } | Expr::MapType { .. } | Expr::StructType { .. } => {
            true
        }
        Expr::Selector { x, .. } => matches!(**x, Expr::Ident(_)),
        Expr::Index { x, .. } => is_literal_type(x),
        _ => false,
    }
}

fn unquote(text: &str) -> String {
    text.trim_matches(|c| c == '"' || c == '`').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> File {
        let mut ids = IdGen::default();
        parse_file(src, "test.go", &mut ids).expect("parse should succeed")
    }

    #[test]
    fn parses_hello_world() {
        let file = parse(
            "package main\n\nimport \"fmt\"\n\nfunc main() {\n\tfmt.Println(\"Hello world\")\n}\n",
        );
        assert_eq!(file.package.name, "main");
        assert_eq!(file.imports.len(), 1);
        assert_eq!(file.imports[0].path, "fmt");
        assert_eq!(file.decls.len(), 1);
    }

    #[test]
    fn parses_method_with_pointer_receiver() {
        let file = parse(
            "package math\n\ntype Calculator struct {\n\tResult int\n}\n\nfunc (c *Calculator) Add(x int) {\n\tc.Result += x\n}\n",
        );
        let Decl::Func(func) = &file.decls[1] else {
            panic!("expected func decl");
        };
        assert!(func.recv.is_some());
        assert_eq!(
            func.recv_type_name().map(|i| i.name.as_str()),
            Some("Calculator")
        );
    }

    #[test]
    fn parses_grouped_const_with_iota() {
        let file = parse("package lib\n\nconst (\n\tHOGE1 = iota\n\tHOGE2\n)\n");
        let Decl::Gen(gen) = &file.decls[0] else {
            panic!("expected gen decl");
        };
        assert_eq!(gen.tok, DeclTok::Const);
        assert!(gen.grouped);
        assert_eq!(gen.specs.len(), 2);
        let Spec::Value(second) = &gen.specs[1] else {
            panic!("expected value spec");
        };
        assert!(second.values.is_empty());
    }

    #[test]
    fn parses_generic_type_and_constructor() {
        let file = parse(
            "package lib\n\ntype Seeker[T any] struct {\n\tval T\n}\n\nfunc NewSeeker[T any](v T) *Seeker[T] {\n\treturn &Seeker[T]{val: v}\n}\n\nfunc (s *Seeker[T]) Seek() {\n}\n",
        );
        let Decl::Gen(gen) = &file.decls[0] else {
            panic!("expected type decl");
        };
        let Spec::Type(ts) = &gen.specs[0] else {
            panic!("expected type spec");
        };
        assert_eq!(ts.type_params.len(), 1);
        let Decl::Func(method) = &file.decls[2] else {
            panic!("expected method");
        };
        assert_eq!(
            method.recv_type_name().map(|i| i.name.as_str()),
            Some("Seeker")
        );
    }

    #[test]
    fn parses_if_with_init_and_composite_in_parens() {
        parse(
            "package main\n\nfunc f() {\n\tif v := g(); v > 0 {\n\t\t_ = v\n\t}\n\tfor i := 0; i < 10; i++ {\n\t\tbreak\n\t}\n}\nfunc g() int { return 1 }\n",
        );
    }

    #[test]
    fn parses_range_and_map_literal() {
        parse(
            "package main\n\nfunc f() {\n\tm := map[string]int{\"a\": 1}\n\tfor k, v := range m {\n\t\t_, _ = k, v\n\t}\n}\n",
        );
    }

    #[test]
    fn parses_slice_literal_in_range_header() {
        let file = parse(
            "package main\n\nfunc f() {\n\tfor _, v := range []int{1, 2, 3} {\n\t\t_ = v\n\t}\n\tif len(map[string]int{\"a\": 1}) > 0 {\n\t\t_ = 0\n\t}\n}\n",
        );
        let Decl::Func(func) = &file.decls[0] else {
            panic!("expected func decl");
        };
        let body = func.body.as_ref().expect("f has a body");
        let Stmt::For(for_stmt) = &body.stmts[0] else {
            panic!("expected for statement, got {:?}", body.stmts[0]);
        };
        let ForHeader::Range { x, .. } = &for_stmt.header else {
            panic!("expected range header");
        };
        assert!(
            matches!(x, Expr::Composite { .. }),
            "range operand should be the whole literal"
        );
        assert_eq!(for_stmt.body.stmts.len(), 1);
    }

    #[test]
    fn parses_embedded_struct_field() {
        let file = parse(
            "package main\n\ntype Embedded struct {\n\tlib.LibStruct\n\tName string\n}\n",
        );
        let Decl::Gen(gen) = &file.decls[0] else {
            panic!("expected type decl");
        };
        let Spec::Type(ts) = &gen.specs[0] else {
            panic!("expected type spec");
        };
        let Expr::StructType { fields } = &ts.ty else {
            panic!("expected struct type");
        };
        assert!(fields[0].names.is_empty(), "embedded field has no names");
        assert_eq!(fields[1].names[0].name, "Name");
    }

    #[test]
    fn parses_func_literal() {
        let file = parse("package main\n\nvar f = func(x int) int {\n\treturn x * 2\n}\n");
        let Decl::Gen(gen) = &file.decls[0] else {
            panic!("expected var decl");
        };
        let Spec::Value(vs) = &gen.specs[0] else {
            panic!("expected value spec");
        };
        assert!(matches!(vs.values[0], Expr::FuncLit(_)));
    }

    #[test]
    fn distinguishes_unnamed_results_from_grouped_names() {
        let file = parse(
            "package main\n\nfunc f() (int, error) {\n\treturn 0, nil\n}\n\nfunc g(a, b int) int {\n\treturn a + b\n}\n",
        );
        let Decl::Func(f) = &file.decls[0] else {
            panic!("expected func");
        };
        assert_eq!(f.results.len(), 2);
        assert!(f.results.iter().all(|r| r.names.is_empty()));
        let Decl::Func(g) = &file.decls[1] else {
            panic!("expected func");
        };
        assert_eq!(g.params.len(), 1);
        assert_eq!(g.params[0].names.len(), 2);
    }

    #[test]
    fn rejects_select() {
        let mut ids = IdGen::default();
        let err = parse_file(
            "package main\n\nfunc f() {\n\tselect {}\n}\n",
            "test.go",
            &mut ids,
        )
        .expect_err("select should be rejected");
        assert!(err.message.contains("select"));
    }
}
