//! The lexer: source text to tokens.
//!
//! Terminals: bare words (unquoted strings), quoted strings with escapes,
//! signed numbers (sign handled by the parser as prefix negation), the
//! `true`/`false`/`null`/`undefined` keywords, operator glyphs, dots and
//! the bracket family. `#` starts a comment running to end of line.
//!
//! Multi-character operators are runs of single-character glyphs merged
//! here (`>` `=` becomes `>=`). An opening paren remembers whether it was
//! glued to the previous token; the parser uses that to tell a postfix call
//! `f(x)` from a grouped expression `f (x)`.

use crate::{
    exception_private::{RunError, RunResult},
    expressions::Operator,
    intern::{Interns, StringId},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Tok {
    Word(StringId),
    Str(StringId),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
    Undefined,
    LBrace,
    RBrace,
    LParen {
        /// True when the paren directly follows a word, closing paren or
        /// closing bracket with no whitespace between - a postfix call.
        adjacent: bool,
    },
    RParen,
    LBracket,
    RBracket,
    Semi,
    Newline,
    /// A bare `=` (assignment); `==` lexes as an operator.
    Assign,
    Dot,
    Op(Operator),
    Eof,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct TokLoc {
    pub tok: Tok,
    pub line: u32,
}

pub(crate) fn lex(source: &str, interns: &mut Interns) -> RunResult<Vec<TokLoc>> {
    Lexer { source, chars: source.char_indices().peekable(), line: 1, out: Vec::new(), prev_end: usize::MAX }.run(interns)
}

struct Lexer<'s> {
    source: &'s str,
    chars: std::iter::Peekable<std::str::CharIndices<'s>>,
    line: u32,
    out: Vec<TokLoc>,
    /// Byte offset just past the previous token, for call adjacency.
    prev_end: usize,
}

impl Lexer<'_> {
    fn run(mut self, interns: &mut Interns) -> RunResult<Vec<TokLoc>> {
        while let Some(&(start, c)) = self.chars.peek() {
            match c {
                '\n' => {
                    self.chars.next();
                    self.push(Tok::Newline, start + 1);
                    self.line += 1;
                }
                c if c.is_whitespace() => {
                    self.chars.next();
                }
                '#' => {
                    while let Some(&(_, c)) = self.chars.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.chars.next();
                    }
                }
                '"' | '\'' => {
                    let text = self.lex_string(c)?;
                    let end = self.pos();
                    self.push(Tok::Str(interns.intern(&text)), end);
                }
                c if c.is_ascii_digit() => {
                    let tok = self.lex_number(start)?;
                    let end = self.pos();
                    self.push(tok, end);
                }
                c if c.is_alphanumeric() || c == '_' => {
                    let tok = self.lex_word(start, interns);
                    let end = self.pos();
                    self.push(tok, end);
                }
                '{' | '}' | '(' | ')' | '[' | ']' | ';' | '.' => {
                    self.chars.next();
                    let tok = match c {
                        '{' => Tok::LBrace,
                        '}' => Tok::RBrace,
                        '(' => Tok::LParen { adjacent: self.prev_end == start && self.prev_is_callable() },
                        ')' => Tok::RParen,
                        '[' => Tok::LBracket,
                        ']' => Tok::RBracket,
                        ';' => Tok::Semi,
                        _ => Tok::Dot,
                    };
                    self.push(tok, start + 1);
                }
                '=' | '!' | '<' | '>' | '+' | '-' | '*' | '/' | '%' | '$' | '&' => {
                    self.chars.next();
                    let doubled = matches!(self.chars.peek(), Some(&(_, '='))) && matches!(c, '=' | '!' | '<' | '>');
                    if doubled {
                        self.chars.next();
                    }
                    let tok = match (c, doubled) {
                        ('=', true) => Tok::Op(Operator::Eq),
                        ('=', false) => Tok::Assign,
                        ('!', true) => Tok::Op(Operator::Ne),
                        ('!', false) => Tok::Op(Operator::Not),
                        ('<', true) => Tok::Op(Operator::Le),
                        ('<', false) => Tok::Op(Operator::Lt),
                        ('>', true) => Tok::Op(Operator::Ge),
                        ('>', false) => Tok::Op(Operator::Gt),
                        ('+', _) => Tok::Op(Operator::Add),
                        ('-', _) => Tok::Op(Operator::Sub),
                        ('*', _) => Tok::Op(Operator::Mul),
                        ('/', _) => Tok::Op(Operator::Div),
                        ('%', _) => Tok::Op(Operator::Mod),
                        ('$', _) => Tok::Op(Operator::Get),
                        ('&', _) => Tok::Op(Operator::Ref),
                        _ => unreachable!("operator chars are matched above"),
                    };
                    let end = self.pos();
                    self.push(tok, end);
                }
                other => {
                    return Err(RunError::parse(format!("line {}: unexpected character {other:?}", self.line)));
                }
            }
        }
        self.push(Tok::Eof, self.source.len());
        Ok(self.out)
    }

    fn pos(&mut self) -> usize {
        self.chars.peek().map_or(self.source.len(), |&(i, _)| i)
    }

    fn push(&mut self, tok: Tok, end: usize) {
        self.out.push(TokLoc { tok, line: self.line });
        self.prev_end = end;
    }

    fn prev_is_callable(&self) -> bool {
        matches!(
            self.out.last().map(|t| t.tok),
            Some(Tok::Word(_) | Tok::Str(_) | Tok::RParen | Tok::RBracket)
        )
    }

    fn lex_word(&mut self, start: usize, interns: &mut Interns) -> Tok {
        let mut end = start;
        while let Some(&(i, c)) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.chars.next();
                end = i + c.len_utf8();
            } else {
                break;
            }
        }
        match &self.source[start..end] {
            "true" => Tok::Bool(true),
            "false" => Tok::Bool(false),
            "null" => Tok::Null,
            "undefined" => Tok::Undefined,
            word => Tok::Word(interns.intern(word)),
        }
    }

    fn lex_number(&mut self, start: usize) -> RunResult<Tok> {
        let mut end = start;
        let mut is_float = false;
        while let Some(&(i, c)) = self.chars.peek() {
            if c.is_ascii_digit() {
                self.chars.next();
                end = i + 1;
            } else {
                break;
            }
        }
        // A fraction only when the dot is followed by a digit, so paths
        // like `a.0` never swallow the dot of `x.0`-style number heads.
        if let Some(&(i, '.')) = self.chars.peek() {
            let after = self.source[i + 1..].chars().next();
            if after.is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                self.chars.next();
                end = i + 1;
                while let Some(&(j, c)) = self.chars.peek() {
                    if c.is_ascii_digit() {
                        self.chars.next();
                        end = j + 1;
                    } else {
                        break;
                    }
                }
            }
        }
        if let Some(&(i, c)) = self.chars.peek()
            && matches!(c, 'e' | 'E')
        {
            let mut probe = self.source[i + 1..].chars();
            let mut exp_len = 1;
            match probe.next() {
                Some('+' | '-') => {
                    exp_len += 1;
                    if !probe.next().is_some_and(|c| c.is_ascii_digit()) {
                        exp_len = 0;
                    }
                }
                Some(c) if c.is_ascii_digit() => {}
                _ => exp_len = 0,
            }
            if exp_len > 0 {
                is_float = true;
                for _ in 0..exp_len {
                    self.chars.next();
                }
                while let Some(&(j, c)) = self.chars.peek() {
                    if c.is_ascii_digit() {
                        self.chars.next();
                        end = j + 1;
                    } else {
                        break;
                    }
                }
            }
        }
        let text = &self.source[start..end];
        if is_float {
            text.parse::<f64>()
                .map(Tok::Float)
                .map_err(|_| RunError::parse(format!("line {}: invalid number {text:?}", self.line)))
        } else {
            text.parse::<i64>()
                .map(Tok::Int)
                .map_err(|_| RunError::parse(format!("line {}: integer out of range: {text}", self.line)))
        }
    }

    fn lex_string(&mut self, quote: char) -> RunResult<String> {
        let start_line = self.line;
        self.chars.next();
        let mut text = String::new();
        loop {
            let Some((_, c)) = self.chars.next() else {
                return Err(RunError::parse(format!("line {start_line}: unterminated string")));
            };
            match c {
                c if c == quote => return Ok(text),
                '\\' => {
                    let Some((_, esc)) = self.chars.next() else {
                        return Err(RunError::parse(format!("line {start_line}: unterminated string")));
                    };
                    match esc {
                        'n' => text.push('\n'),
                        't' => text.push('\t'),
                        'r' => text.push('\r'),
                        'f' => text.push('\u{000c}'),
                        'b' => text.push('\u{0008}'),
                        '\\' => text.push('\\'),
                        '\'' => text.push('\''),
                        '"' => text.push('"'),
                        'u' => {
                            let mut code = 0u32;
                            for _ in 0..4 {
                                let Some((_, h)) = self.chars.next() else {
                                    return Err(RunError::parse(format!("line {start_line}: truncated \\u escape")));
                                };
                                let digit = h
                                    .to_digit(16)
                                    .ok_or_else(|| RunError::parse(format!("line {start_line}: invalid \\u escape")))?;
                                code = code * 16 + digit;
                            }
                            let ch = char::from_u32(code)
                                .ok_or_else(|| RunError::parse(format!("line {start_line}: invalid \\u escape")))?;
                            text.push(ch);
                        }
                        other => {
                            return Err(RunError::parse(format!("line {start_line}: unknown escape \\{other}")));
                        }
                    }
                }
                '\n' => {
                    self.line += 1;
                    text.push('\n');
                }
                other => text.push(other),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Tok> {
        let mut interns = Interns::new();
        lex(source, &mut interns).unwrap().into_iter().map(|t| t.tok).collect()
    }

    #[test]
    fn merges_operator_glyphs() {
        let toks = kinds("a >= 1");
        assert!(matches!(toks[1], Tok::Op(Operator::Ge)));
    }

    #[test]
    fn assignment_is_not_equality() {
        let toks = kinds("x=1 == 2");
        assert!(matches!(toks[1], Tok::Assign));
        assert!(matches!(toks[3], Tok::Op(Operator::Eq)));
    }

    #[test]
    fn adjacency_marks_postfix_calls() {
        let toks = kinds("f() f ()");
        assert!(matches!(toks[1], Tok::LParen { adjacent: true }));
        assert!(matches!(toks[4], Tok::LParen { adjacent: false }));
    }

    #[test]
    fn numbers_and_paths_share_dots() {
        let toks = kinds("1.5 a.b 2e2");
        assert!(matches!(toks[0], Tok::Float(f) if f == 1.5));
        assert!(matches!(toks[1], Tok::Word(_)));
        assert!(matches!(toks[2], Tok::Dot));
        assert!(matches!(toks[4], Tok::Float(f) if f == 200.0));
    }

    #[test]
    fn string_escapes() {
        let mut interns = Interns::new();
        let toks = lex(r#""a\nbA""#, &mut interns).unwrap();
        match toks[0].tok {
            Tok::Str(id) => assert_eq!(interns.get_str(id), "a\nbA"),
            ref other => panic!("unexpected token {other:?}"),
        }
    }
}
