//! Source printer for the Go front end.
//!
//! Renders declarations back to compilable Go text with tab indentation.
//! Output is plain but syntactically valid; the deliverable is expected to
//! go through gofmt/goimports afterwards, so no alignment is attempted.

use super::ast::*;

/// Render one top-level declaration.
pub fn decl_to_string(decl: &Decl) -> String {
    let mut p = Printer::default();
    p.decl(decl);
    p.out
}

/// Render the statements of a block at the given indent level, one per
/// line, without surrounding braces. Used for splicing initializer bodies
/// into the synthetic `init`.
pub fn stmts_to_string(stmts: &[Stmt], indent: usize) -> String {
    let mut p = Printer {
        out: String::new(),
        indent,
    };
    for stmt in stmts {
        p.line_start();
        p.stmt(stmt);
        p.out.push('\n');
    }
    p.out
}

#[derive(Default)]
struct Printer {
    out: String,
    indent: usize,
}

impl Printer {
    fn push(&mut self, text: &str) {
        self.out.push_str(text);
    }

    fn line_start(&mut self) {
        for _ in 0..self.indent {
            self.out.push('\t');
        }
    }

    fn decl(&mut self, decl: &Decl) {
        match decl {
            Decl::Func(func) => self.func_decl(func),
            Decl::Gen(gen) => self.gen_decl(gen),
        }
    }

    fn func_decl(&mut self, func: &FuncDecl) {
        self.push("func ");
        if let Some(recv) = &func.recv {
            self.push("(");
            self.field(recv);
            self.push(") ");
        }
        self.push(&func.name.name);
        if !func.type_params.is_empty() {
            self.push("[");
            self.field_list(&func.type_params);
            self.push("]");
        }
        self.push("(");
        self.field_list(&func.params);
        self.push(")");
        self.results(&func.results);
        match &func.body {
            Some(body) => {
                self.push(" ");
                self.block(body);
            }
            None => {}
        }
    }

    fn results(&mut self, results: &[Field]) {
        if results.is_empty() {
            return;
        }
        self.push(" ");
        if results.len() == 1 && results[0].names.is_empty() {
            self.expr(&results[0].ty);
        } else {
            self.push("(");
            self.field_list(results);
            self.push(")");
        }
    }

    fn field_list(&mut self, fields: &[Field]) {
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.field(field);
        }
    }

    fn field(&mut self, field: &Field) {
        for (i, name) in field.names.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.push(&name.name);
        }
        if !field.names.is_empty() {
            self.push(" ");
        }
        self.expr(&field.ty);
    }

    fn gen_decl(&mut self, gen: &GenDecl) {
        let keyword = match gen.tok {
            DeclTok::Type => "type",
            DeclTok::Var => "var",
            DeclTok::Const => "const",
        };
        if gen.grouped {
            self.push(keyword);
            self.push(" (\n");
            self.indent += 1;
            for spec in &gen.specs {
                self.line_start();
                self.spec(spec);
                self.out.push('\n');
            }
            self.indent -= 1;
            self.line_start();
            self.push(")");
        } else {
            self.push(keyword);
            self.push(" ");
            if let Some(spec) = gen.specs.first() {
                self.spec(spec);
            }
        }
    }

    fn spec(&mut self, spec: &Spec) {
        match spec {
            Spec::Type(ts) => {
                self.push(&ts.name.name);
                if !ts.type_params.is_empty() {
                    self.push("[");
                    self.field_list(&ts.type_params);
                    self.push("]");
                }
                if ts.alias {
                    self.push(" = ");
                } else {
                    self.push(" ");
                }
                self.expr(&ts.ty);
            }
            Spec::Value(vs) => {
                for (i, name) in vs.names.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.push(&name.name);
                }
                if let Some(ty) = &vs.ty {
                    self.push(" ");
                    self.expr(ty);
                }
                if !vs.values.is_empty() {
                    self.push(" = ");
                    for (i, value) in vs.values.iter().enumerate() {
                        if i > 0 {
                            self.push(", ");
                        }
                        self.expr(value);
                    }
                }
            }
        }
    }

    fn block(&mut self, block: &Block) {
        self.push("{\n");
        self.indent += 1;
        for stmt in &block.stmts {
            self.line_start();
            self.stmt(stmt);
            self.out.push('\n');
        }
        self.indent -= 1;
        self.line_start();
        self.push("}");
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Decl(gen) => self.gen_decl(gen),
            Stmt::Expr(e) => self.expr(e),
            Stmt::Assign { lhs, op, rhs } => {
                for (i, e) in lhs.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.expr(e);
                }
                let op_text = match op {
                    AssignOp::Define => " := ",
                    AssignOp::Assign => " = ",
                    AssignOp::Add => " += ",
                    AssignOp::Sub => " -= ",
                    AssignOp::Mul => " *= ",
                    AssignOp::Quo => " /= ",
                    AssignOp::Rem => " %= ",
                    AssignOp::And => " &= ",
                    AssignOp::Or => " |= ",
                    AssignOp::Xor => " ^= ",
                    AssignOp::Shl => " <<= ",
                    AssignOp::Shr => " >>= ",
                    AssignOp::AndNot => " &^= ",
                };
                self.push(op_text);
                for (i, e) in rhs.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.expr(e);
                }
            }
            Stmt::IncDec { x, dec } => {
                self.expr(x);
                self.push(if *dec { "--" } else { "++" });
            }
            Stmt::Return(exprs) => {
                self.push("return");
                for (i, e) in exprs.iter().enumerate() {
                    self.push(if i == 0 { " " } else { ", " });
                    self.expr(e);
                }
            }
            Stmt::If(stmt) => self.if_stmt(stmt),
            Stmt::For(stmt) => self.for_stmt(stmt),
            Stmt::Switch(stmt) => self.switch_stmt(stmt),
            Stmt::Branch { kind, label } => {
                self.push(match kind {
                    BranchKind::Break => "break",
                    BranchKind::Continue => "continue",
                    BranchKind::Fallthrough => "fallthrough",
                    BranchKind::Goto => "goto",
                });
                if let Some(label) = label {
                    self.push(" ");
                    self.push(&label.name);
                }
            }
            Stmt::Block(block) => self.block(block),
            Stmt::Go(e) => {
                self.push("go ");
                self.expr(e);
            }
            Stmt::Defer(e) => {
                self.push("defer ");
                self.expr(e);
            }
            Stmt::Labeled { label, stmt } => {
                self.push(&label.name);
                self.push(":\n");
                self.line_start();
                self.stmt(stmt);
            }
            Stmt::Empty => {}
        }
    }

    fn if_stmt(&mut self, stmt: &IfStmt) {
        self.push("if ");
        if let Some(init) = &stmt.init {
            self.stmt(init);
            self.push("; ");
        }
        self.expr(&stmt.cond);
        self.push(" ");
        self.block(&stmt.then);
        if let Some(els) = &stmt.els {
            self.push(" else ");
            self.stmt(els);
        }
    }

    fn for_stmt(&mut self, stmt: &ForStmt) {
        self.push("for ");
        match &stmt.header {
            ForHeader::Classic { init, cond, post } => {
                if init.is_some() || post.is_some() {
                    if let Some(init) = init {
                        self.stmt(init);
                    }
                    self.push("; ");
                    if let Some(cond) = cond {
                        self.expr(cond);
                    }
                    self.push("; ");
                    if let Some(post) = post {
                        self.stmt(post);
                    }
                    self.push(" ");
                } else if let Some(cond) = cond {
                    self.expr(cond);
                    self.push(" ");
                }
            }
            ForHeader::Range {
                key,
                value,
                define,
                x,
            } => {
                if let Some(key) = key {
                    self.expr(key);
                    if let Some(value) = value {
                        self.push(", ");
                        self.expr(value);
                    }
                    self.push(if *define { " := " } else { " = " });
                }
                self.push("range ");
                self.expr(x);
                self.push(" ");
            }
        }
        self.block(&stmt.body);
    }

    fn switch_stmt(&mut self, stmt: &SwitchStmt) {
        self.push("switch ");
        if let Some(init) = &stmt.init {
            self.stmt(init);
            self.push("; ");
        }
        if let Some(tag) = &stmt.tag {
            self.expr(tag);
            self.push(" ");
        }
        self.push("{\n");
        for case in &stmt.cases {
            self.line_start();
            if case.exprs.is_empty() {
                self.push("default:");
            } else {
                self.push("case ");
                for (i, e) in case.exprs.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.expr(e);
                }
                self.push(":");
            }
            self.out.push('\n');
            self.indent += 1;
            for s in &case.body {
                self.line_start();
                self.stmt(s);
                self.out.push('\n');
            }
            self.indent -= 1;
        }
        self.line_start();
        self.push("}");
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Ident(ident) => self.push(&ident.name),
            Expr::Lit { text, .. } => self.push(text),
            Expr::Composite { ty, elts } => {
                if let Some(ty) = ty {
                    self.expr(ty);
                }
                self.push("{");
                for (i, elt) in elts.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.expr(elt);
                }
                self.push("}");
            }
            Expr::FuncLit(lit) => {
                self.push("func(");
                self.field_list(&lit.params);
                self.push(")");
                self.results(&lit.results);
                self.push(" ");
                self.block(&lit.body);
            }
            Expr::Paren(inner) => {
                self.push("(");
                self.expr(inner);
                self.push(")");
            }
            Expr::Selector { x, sel } => {
                self.expr(x);
                self.push(".");
                self.push(&sel.name);
            }
            Expr::Index { x, indices } => {
                self.expr(x);
                self.push("[");
                for (i, index) in indices.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.expr(index);
                }
                self.push("]");
            }
            Expr::Slice { x, low, high, max } => {
                self.expr(x);
                self.push("[");
                if let Some(low) = low {
                    self.expr(low);
                }
                self.push(":");
                if let Some(high) = high {
                    self.expr(high);
                }
                if let Some(max) = max {
                    self.push(":");
                    self.expr(max);
                }
                self.push("]");
            }
            Expr::TypeAssert { x, ty } => {
                self.expr(x);
                self.push(".(");
                self.expr(ty);
                self.push(")");
            }
            Expr::Call {
                fun,
                args,
                ellipsis,
            } => {
                self.expr(fun);
                self.push("(");
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.expr(arg);
                }
                if *ellipsis {
                    self.push("...");
                }
                self.push(")");
            }
            Expr::Star(inner) => {
                self.push("*");
                self.expr(inner);
            }
            Expr::Unary { op, x } => {
                self.push(match op {
                    UnaryOp::Plus => "+",
                    UnaryOp::Minus => "-",
                    UnaryOp::Not => "!",
                    UnaryOp::Xor => "^",
                    UnaryOp::Amp => "&",
                    UnaryOp::Recv => "<-",
                });
                self.expr(x);
            }
            Expr::Binary { x, op, y } => {
                self.expr(x);
                self.push(match op {
                    BinaryOp::Add => " + ",
                    BinaryOp::Sub => " - ",
                    BinaryOp::Mul => " * ",
                    BinaryOp::Quo => " / ",
                    BinaryOp::Rem => " % ",
                    BinaryOp::And => " & ",
                    BinaryOp::Or => " | ",
                    BinaryOp::Xor => " ^ ",
                    BinaryOp::Shl => " << ",
                    BinaryOp::Shr => " >> ",
                    BinaryOp::AndNot => " &^ ",
                    BinaryOp::LAnd => " && ",
                    BinaryOp::LOr => " || ",
                    BinaryOp::Eql => " == ",
                    BinaryOp::Neq => " != ",
                    BinaryOp::Lss => " < ",
                    BinaryOp::Leq => " <= ",
                    BinaryOp::Gtr => " > ",
                    BinaryOp::Geq => " >= ",
                });
                self.expr(y);
            }
            Expr::KeyValue { key, value } => {
                self.expr(key);
                self.push(": ");
                self.expr(value);
            }
            Expr::ArrayType { len, elt } => {
                self.push("[");
                if let Some(len) = len {
                    self.expr(len);
                }
                self.push("]");
                self.expr(elt);
            }
            Expr::Ellipsis { elt } => {
                self.push("...");
                if let Some(elt) = elt {
                    self.expr(elt);
                }
            }
            Expr::MapType { key, value } => {
                self.push("map[");
                self.expr(key);
                self.push("]");
                self.expr(value);
            }
            Expr::StructType { fields } => {
                if fields.is_empty() {
                    self.push("struct{}");
                    return;
                }
                self.push("struct {\n");
                self.indent += 1;
                for field in fields {
                    self.line_start();
                    self.field(field);
                    self.out.push('\n');
                }
                self.indent -= 1;
                self.line_start();
                self.push("}");
            }
            Expr::InterfaceType { elems } => {
                if elems.is_empty() {
                    self.push("interface{}");
                    return;
                }
                self.push("interface {\n");
                self.indent += 1;
                for elem in elems {
                    self.line_start();
                    match elem {
                        InterfaceElem::Method {
                            name,
                            params,
                            results,
                        } => {
                            self.push(&name.name);
                            self.push("(");
                            self.field_list(params);
                            self.push(")");
                            self.results(results);
                        }
                        InterfaceElem::Embedded(e) => self.expr(e),
                    }
                    self.out.push('\n');
                }
                self.indent -= 1;
                self.line_start();
                self.push("}");
            }
            Expr::FuncType { params, results } => {
                self.push("func(");
                self.field_list(params);
                self.push(")");
                self.results(results);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parser::{parse_file, IdGen};

    fn roundtrip(src: &str) -> String {
        let mut ids = IdGen::default();
        let file = parse_file(src, "test.go", &mut ids).expect("parse should succeed");
        file.decls
            .iter()
            .map(decl_to_string)
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    #[test]
    fn prints_function_with_body() {
        let out = roundtrip("package main\n\nfunc main() {\n\tfmt.Println(\"hi\")\n}\n");
        assert_eq!(out, "func main() {\n\tfmt.Println(\"hi\")\n}");
    }

    #[test]
    fn prints_method_receiver_and_compound_assign() {
        let out = roundtrip(
            "package m\n\nfunc (c *Calculator) Add(x int) {\n\tc.Result += x\n}\n",
        );
        assert!(out.starts_with("func (c *Calculator) Add(x int) {"));
        assert!(out.contains("c.Result += x"));
    }

    #[test]
    fn prints_grouped_const() {
        let out = roundtrip("package m\n\nconst (\n\tA = iota\n\tB\n)\n");
        assert_eq!(out, "const (\n\tA = iota\n\tB\n)");
    }

    #[test]
    fn prints_struct_type_and_embedded_field() {
        let out = roundtrip("package m\n\ntype E struct {\n\tlib.LibStruct\n\tV int\n}\n");
        assert!(out.contains("lib.LibStruct\n"));
        assert!(out.contains("\tV int\n"));
    }

    #[test]
    fn prints_generic_signature() {
        let out = roundtrip(
            "package m\n\nfunc NewSeeker[T any](v T) *Seeker[T] {\n\treturn &Seeker[T]{val: v}\n}\n",
        );
        assert!(out.contains("func NewSeeker[T any](v T) *Seeker[T] {"));
        assert!(out.contains("return &Seeker[T]{val: v}"));
    }

    #[test]
    fn prints_control_flow() {
        let out = roundtrip(
            "package m\n\nfunc f(n int) int {\n\ts := 0\n\tfor i := 0; i < n; i++ {\n\t\tif i%2 == 0 {\n\t\t\ts += i\n\t\t} else {\n\t\t\ts--\n\t\t}\n\t}\n\treturn s\n}\n",
        );
        assert!(out.contains("for i := 0; i < n; i++ {"));
        assert!(out.contains("} else {"));
    }

    #[test]
    fn prints_range_and_switch() {
        let out = roundtrip(
            "package m\n\nfunc f(m map[string]int) {\n\tfor k, v := range m {\n\t\tswitch v {\n\t\tcase 0:\n\t\t\t_ = k\n\t\tdefault:\n\t\t\tbreak\n\t\t}\n\t}\n}\n",
        );
        assert!(out.contains("for k, v := range m {"));
        assert!(out.contains("case 0:"));
        assert!(out.contains("default:"));
    }
}
