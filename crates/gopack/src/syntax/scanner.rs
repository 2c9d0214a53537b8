//! Lexer for the Go front end.
//!
//! Implements Go's automatic semicolon insertion: a newline terminates the
//! statement when the last token on the line can end one, including the case
//! of a general comment that spans lines.

use super::token::{Tok, Token};

/// A scan failure with its source line.
#[derive(Debug, Clone)]
pub struct ScanError {
    pub line: u32,
    pub message: String,
}

pub struct Scanner<'a> {
    src: &'a [u8],
    pos: usize,
    line: u32,
    /// Last meaningful token, consulted for semicolon insertion.
    last: Option<Tok>,
}

impl<'a> Scanner<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src: src.as_bytes(),
            pos: 0,
            line: 1,
            last: None,
        }
    }

    /// Scan the entire source into a token stream ending with `Eof`.
    pub fn scan_all(mut self) -> Result<Vec<Token>, ScanError> {
        let mut tokens = Vec::with_capacity(self.src.len() / 4);
        loop {
            let token = self.next_token()?;
            let done = token.tok == Tok::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        Ok(tokens)
    }

    fn err(&self, message: impl Into<String>) -> ScanError {
        ScanError {
            line: self.line,
            message: message.into(),
        }
    }

    fn peek(&self) -> u8 {
        *self.src.get(self.pos).unwrap_or(&0)
    }

    fn peek_at(&self, ahead: usize) -> u8 {
        *self.src.get(self.pos + ahead).unwrap_or(&0)
    }

    fn bump(&mut self) -> u8 {
        let ch = self.peek();
        self.pos += 1;
        if ch == b'\n' {
            self.line += 1;
        }
        ch
    }

    fn emit(&mut self, tok: Tok, line: u32, offset: usize) -> Token {
        self.last = Some(tok.clone());
        Token {
            tok,
            line,
            offset: offset as u32,
        }
    }

    /// Whether a newline at the current point inserts a semicolon.
    fn wants_semi(&self) -> bool {
        self.last.as_ref().is_some_and(Tok::ends_statement)
    }

    fn next_token(&mut self) -> Result<Token, ScanError> {
        loop {
            let ch = self.peek();
            match ch {
                b' ' | b'\t' | b'\r' => {
                    self.bump();
                }
                b'\n' => {
                    if self.wants_semi() {
                        let line = self.line;
                        let offset = self.pos;
                        self.bump();
                        return Ok(self.emit(Tok::Semi, line, offset));
                    }
                    self.bump();
                }
                b'/' if self.peek_at(1) == b'/' => {
                    while self.peek() != b'\n' && self.peek() != 0 {
                        self.bump();
                    }
                }
                b'/' if self.peek_at(1) == b'*' => {
                    let start_line = self.line;
                    self.bump();
                    self.bump();
                    loop {
                        if self.peek() == 0 {
                            return Err(self.err("unterminated comment"));
                        }
                        if self.peek() == b'*' && self.peek_at(1) == b'/' {
                            self.bump();
                            self.bump();
                            break;
                        }
                        self.bump();
                    }
                    // A multi-line comment counts as a newline.
                    if self.line > start_line && self.wants_semi() {
                        return Ok(self.emit(Tok::Semi, start_line, self.pos));
                    }
                }
                _ => break,
            }
        }

        let line = self.line;
        let offset = self.pos;
        let ch = self.peek();

        if ch == 0 {
            if self.wants_semi() {
                return Ok(self.emit(Tok::Semi, line, offset));
            }
            return Ok(self.emit(Tok::Eof, line, offset));
        }

        if ch.is_ascii_alphabetic() || ch == b'_' || ch >= 0x80 {
            return Ok(self.scan_ident(line, offset));
        }
        if ch.is_ascii_digit() || (ch == b'.' && self.peek_at(1).is_ascii_digit()) {
            return self.scan_number(line, offset);
        }
        match ch {
            b'"' | b'`' => self.scan_string(line, offset),
            b'\'' => self.scan_rune(line, offset),
            _ => self.scan_operator(line, offset),
        }
    }

    fn scan_ident(&mut self, line: u32, offset: usize) -> Token {
        loop {
            let c = self.peek();
            if !(c.is_ascii_alphanumeric() || c == b'_' || c >= 0x80) {
                break;
            }
            self.bump();
        }
        let text = std::str::from_utf8(&self.src[offset..self.pos])
            .unwrap_or_default()
            .to_string();
        let tok = Tok::keyword(&text).unwrap_or(Tok::Ident(text));
        self.emit(tok, line, offset)
    }

    fn scan_number(&mut self, line: u32, offset: usize) -> Result<Token, ScanError> {
        let mut is_float = false;
        if self.peek() == b'0' && matches!(self.peek_at(1), b'x' | b'X' | b'b' | b'B' | b'o' | b'O')
        {
            self.bump();
            self.bump();
            while self.peek().is_ascii_alphanumeric() || self.peek() == b'_' {
                self.bump();
            }
        } else {
            while self.peek().is_ascii_digit() || self.peek() == b'_' {
                self.bump();
            }
            if self.peek() == b'.' && self.peek_at(1) != b'.' {
                is_float = true;
                self.bump();
                while self.peek().is_ascii_digit() || self.peek() == b'_' {
                    self.bump();
                }
            }
            if matches!(self.peek(), b'e' | b'E') {
                is_float = true;
                self.bump();
                if matches!(self.peek(), b'+' | b'-') {
                    self.bump();
                }
                if !self.peek().is_ascii_digit() {
                    return Err(self.err("malformed floating-point exponent"));
                }
                while self.peek().is_ascii_digit() {
                    self.bump();
                }
            }
        }
        let text = std::str::from_utf8(&self.src[offset..self.pos])
            .unwrap_or_default()
            .to_string();
        if self.peek() == b'i' {
            self.bump();
            let text = format!("{text}i");
            return Ok(self.emit(Tok::Imag(text), line, offset));
        }
        let tok = if is_float {
            Tok::Float(text)
        } else {
            Tok::Int(text)
        };
        Ok(self.emit(tok, line, offset))
    }

    fn scan_string(&mut self, line: u32, offset: usize) -> Result<Token, ScanError> {
        let quote = self.bump();
        if quote == b'`' {
            loop {
                match self.peek() {
                    0 => return Err(self.err("unterminated raw string literal")),
                    b'`' => {
                        self.bump();
                        break;
                    }
                    _ => {
                        self.bump();
                    }
                }
            }
        } else {
            loop {
                match self.peek() {
                    0 | b'\n' => return Err(self.err("unterminated string literal")),
                    b'\\' => {
                        self.bump();
                        self.bump();
                    }
                    b'"' => {
                        self.bump();
                        break;
                    }
                    _ => {
                        self.bump();
                    }
                }
            }
        }
        let text = std::str::from_utf8(&self.src[offset..self.pos])
            .unwrap_or_default()
            .to_string();
        Ok(self.emit(Tok::Str(text), line, offset))
    }

    fn scan_rune(&mut self, line: u32, offset: usize) -> Result<Token, ScanError> {
        self.bump();
        loop {
            match self.peek() {
                0 | b'\n' => return Err(self.err("unterminated rune literal")),
                b'\\' => {
                    self.bump();
                    self.bump();
                }
                b'\'' => {
                    self.bump();
                    break;
                }
                _ => {
                    self.bump();
                }
            }
        }
        let text = std::str::from_utf8(&self.src[offset..self.pos])
            .unwrap_or_default()
            .to_string();
        Ok(self.emit(Tok::Char(text), line, offset))
    }

    fn scan_operator(&mut self, line: u32, offset: usize) -> Result<Token, ScanError> {
        let ch = self.bump();
        let tok = match ch {
            b'+' => match self.peek() {
                b'+' => {
                    self.bump();
                    Tok::Inc
                }
                b'=' => {
                    self.bump();
                    Tok::AddAssign
                }
                _ => Tok::Add,
            },
            b'-' => match self.peek() {
                b'-' => {
                    self.bump();
                    Tok::Dec
                }
                b'=' => {
                    self.bump();
                    Tok::SubAssign
                }
                _ => Tok::Sub,
            },
            b'*' => {
                if self.peek() == b'=' {
                    self.bump();
                    Tok::MulAssign
                } else {
                    Tok::Mul
                }
            }
            b'/' => {
                if self.peek() == b'=' {
                    self.bump();
                    Tok::QuoAssign
                } else {
                    Tok::Quo
                }
            }
            b'%' => {
                if self.peek() == b'=' {
                    self.bump();
                    Tok::RemAssign
                } else {
                    Tok::Rem
                }
            }
            b'&' => match self.peek() {
                b'&' => {
                    self.bump();
                    Tok::LAnd
                }
                b'=' => {
                    self.bump();
                    Tok::AndAssign
                }
                b'^' => {
                    self.bump();
                    if self.peek() == b'=' {
                        self.bump();
                        Tok::AndNotAssign
                    } else {
                        Tok::AndNot
                    }
                }
                _ => Tok::And,
            },
            b'|' => match self.peek() {
                b'|' => {
                    self.bump();
                    Tok::LOr
                }
                b'=' => {
                    self.bump();
                    Tok::OrAssign
                }
                _ => Tok::Or,
            },
            b'^' => {
                if self.peek() == b'=' {
                    self.bump();
                    Tok::XorAssign
                } else {
                    Tok::Xor
                }
            }
            b'<' => match self.peek() {
                b'<' => {
                    self.bump();
                    if self.peek() == b'=' {
                        self.bump();
                        Tok::ShlAssign
                    } else {
                        Tok::Shl
                    }
                }
                b'=' => {
                    self.bump();
                    Tok::Leq
                }
                b'-' => {
                    self.bump();
                    Tok::Arrow
                }
                _ => Tok::Lss,
            },
            b'>' => match self.peek() {
                b'>' => {
                    self.bump();
                    if self.peek() == b'=' {
                        self.bump();
                        Tok::ShrAssign
                    } else {
                        Tok::Shr
                    }
                }
                b'=' => {
                    self.bump();
                    Tok::Geq
                }
                _ => Tok::Gtr,
            },
            b'=' => {
                if self.peek() == b'=' {
                    self.bump();
                    Tok::Eql
                } else {
                    Tok::Assign
                }
            }
            b'!' => {
                if self.peek() == b'=' {
                    self.bump();
                    Tok::Neq
                } else {
                    Tok::Not
                }
            }
            b':' => {
                if self.peek() == b'=' {
                    self.bump();
                    Tok::Define
                } else {
                    Tok::Colon
                }
            }
            b'.' => {
                if self.peek() == b'.' && self.peek_at(1) == b'.' {
                    self.bump();
                    self.bump();
                    Tok::Ellipsis
                } else {
                    Tok::Period
                }
            }
            b'(' => Tok::LParen,
            b')' => Tok::RParen,
            b'[' => Tok::LBrack,
            b']' => Tok::RBrack,
            b'{' => Tok::LBrace,
            b'}' => Tok::RBrace,
            b',' => Tok::Comma,
            b';' => Tok::Semi,
            other => {
                return Err(self.err(format!("unexpected character {:?}", other as char)));
            }
        };
        Ok(self.emit(tok, line, offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Tok> {
        Scanner::new(src)
            .scan_all()
            .expect("scan should succeed")
            .into_iter()
            .map(|t| t.tok)
            .collect()
    }

    #[test]
    fn scans_package_clause() {
        let toks = kinds("package main\n");
        assert_eq!(
            toks,
            vec![
                Tok::Package,
                Tok::Ident("main".to_string()),
                Tok::Semi,
                Tok::Eof
            ]
        );
    }

    #[test]
    fn inserts_semicolon_after_call() {
        let toks = kinds("f()\ng()");
        assert!(toks.contains(&Tok::Semi));
        let semis = toks.iter().filter(|t| **t == Tok::Semi).count();
        assert_eq!(semis, 2, "newline after ')' and EOF after ')' both insert");
    }

    #[test]
    fn no_semicolon_after_operator() {
        let toks = kinds("a +\nb");
        let semis = toks.iter().filter(|t| **t == Tok::Semi).count();
        assert_eq!(semis, 1, "only the EOF-adjacent insertion");
    }

    #[test]
    fn scans_compound_operators() {
        let toks = kinds("a &^= b << 2");
        assert!(toks.contains(&Tok::AndNotAssign));
        assert!(toks.contains(&Tok::Shl));
    }

    #[test]
    fn scans_string_and_rune_literals() {
        let toks = kinds(r#"x := "hi\n" + 'c'"#);
        assert!(toks.iter().any(|t| matches!(t, Tok::Str(s) if s == "\"hi\\n\"")));
        assert!(toks.iter().any(|t| matches!(t, Tok::Char(_))));
    }

    #[test]
    fn raw_string_spans_lines() {
        let toks = kinds("s := `a\nb`\n");
        assert!(toks.iter().any(|t| matches!(t, Tok::Str(s) if s.contains('\n'))));
    }
}
