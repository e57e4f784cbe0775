//! The parser: tokens to statement trees.
//!
//! Statements are whitespace-separated argument lists; `;` and (outside
//! parens) newlines separate statements. A `k=v` with the key as the first
//! element of a statement is a binding statement and captures the rest of
//! the line as its right-hand side; anywhere else the right-hand side is a
//! single expression.
//!
//! Braces holding only assignments are a dict literal; any other braces are
//! a statement-list literal (a lazy block value). Parens glued to the
//! preceding atom are a postfix call; free-standing parens around a single
//! expression are grouping, and around a statement (or several separated by
//! `;`) they form an execution block. Operator precedence, lowest first:
//! comparisons, additive, multiplicative, prefix, postfix.

use smallvec::{SmallVec, smallvec};

use crate::{
    exception_private::{RunError, RunResult},
    expressions::{ArgsExpr, BlockTable, Expr, Operator, Statement},
    intern::{Interns, StaticStrings, StringId},
    lexer::{Tok, TokLoc, lex},
    types::path::PathSeg,
    value::Value,
};

/// Where a statement list ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum End {
    Eof,
    Brace,
    Paren,
}

/// Parses a module body (a top-level statement list).
pub(crate) fn parse_module(
    source: &str,
    interns: &mut Interns,
    blocks: &mut BlockTable,
) -> RunResult<Vec<Statement>> {
    let toks = lex(source, interns)?;
    let mut parser = Parser { toks, pos: 0, interns, blocks };
    let statements = parser.parse_statements(End::Eof, true)?;
    Ok(statements)
}

struct Parser<'a> {
    toks: Vec<TokLoc>,
    pos: usize,
    interns: &'a mut Interns,
    blocks: &'a mut BlockTable,
}

impl Parser<'_> {
    fn peek(&self) -> Tok {
        self.toks[self.pos].tok
    }

    fn bump(&mut self) -> Tok {
        let tok = self.toks[self.pos].tok;
        if self.pos + 1 < self.toks.len() {
            self.pos += 1;
        }
        tok
    }

    fn line(&self) -> u32 {
        self.toks[self.pos].line
    }

    fn err(&self, message: impl std::fmt::Display) -> RunError {
        RunError::parse(format!("line {}: {message}", self.line()))
    }

    fn parse_statements(&mut self, end: End, newlines_separate: bool) -> RunResult<Vec<Statement>> {
        let mut statements = Vec::new();
        loop {
            match self.peek() {
                Tok::Newline | Tok::Semi => {
                    self.bump();
                }
                Tok::Eof => {
                    if end == End::Eof {
                        return Ok(statements);
                    }
                    return Err(self.err("unexpected end of input"));
                }
                Tok::RBrace if end == End::Brace => return Ok(statements),
                Tok::RParen if end == End::Paren => return Ok(statements),
                Tok::RBrace | Tok::RParen | Tok::RBracket => {
                    return Err(self.err("unexpected closing bracket"));
                }
                _ => statements.push(self.parse_statement(newlines_separate)?),
            }
        }
    }

    fn parse_statement(&mut self, newlines_separate: bool) -> RunResult<Statement> {
        let line = self.line();
        let mut args = ArgsExpr::default();
        let mut first = true;
        loop {
            match self.peek() {
                Tok::Semi | Tok::Eof | Tok::RBrace | Tok::RParen | Tok::RBracket => break,
                Tok::Newline => {
                    if newlines_separate {
                        break;
                    }
                    self.bump();
                }
                _ => {
                    let expr = self.parse_expr()?;
                    if self.peek() == Tok::Assign {
                        self.bump();
                        if first {
                            // Binding statement: the rest of the line is the
                            // right-hand side.
                            self.parse_binding_rhs(newlines_separate, expr, &mut args)?;
                            break;
                        }
                        let value = self.parse_expr()?;
                        args.keyed.push((expr, value));
                    } else {
                        args.positional.push(expr);
                    }
                    first = false;
                    if self.statement_ends_after_block() {
                        break;
                    }
                }
            }
        }
        Ok(Statement { args, line })
    }

    /// A closing brace ends the statement: block and dict literals read as
    /// the final argument of their statement. The one continuation is
    /// `catch`, which follows a try body.
    fn statement_ends_after_block(&self) -> bool {
        if self.pos == 0 || self.toks[self.pos - 1].tok != Tok::RBrace {
            return false;
        }
        !matches!(self.peek(), Tok::Word(id) if id == StringId::from(StaticStrings::Catch))
    }

    /// Parses the right-hand side of a binding statement. A single
    /// expression is the bound value; several elements form an implicit
    /// call (`a = Animal "Rex"`); a run of further assignments is a
    /// multi-assignment (`a=1 b=2`).
    fn parse_binding_rhs(&mut self, newlines_separate: bool, key: Expr, args: &mut ArgsExpr) -> RunResult<()> {
        let mut rhs = ArgsExpr::default();
        loop {
            match self.peek() {
                Tok::Semi | Tok::Eof | Tok::RBrace | Tok::RParen | Tok::RBracket => break,
                Tok::Newline => {
                    if newlines_separate {
                        break;
                    }
                    self.bump();
                }
                _ => {
                    let expr = self.parse_expr()?;
                    if self.peek() == Tok::Assign {
                        self.bump();
                        let value = self.parse_expr()?;
                        rhs.keyed.push((expr, value));
                    } else {
                        rhs.positional.push(expr);
                    }
                    if self.statement_ends_after_block() {
                        break;
                    }
                }
            }
        }
        match (rhs.positional.len(), rhs.keyed.len()) {
            (0, 0) => Err(self.err("missing value after '='")),
            (1, 0) => {
                let value = rhs.positional.pop().expect("length checked above");
                args.keyed.push((key, value));
                Ok(())
            }
            (1, _) => {
                // `a=1 b=2 ...`: a multi-assignment statement.
                let value = rhs.positional.pop().expect("length checked above");
                args.keyed.push((key, value));
                args.keyed.append(&mut rhs.keyed);
                Ok(())
            }
            _ => {
                args.keyed.push((key, Expr::CallArgs(rhs)));
                Ok(())
            }
        }
    }

    fn parse_expr(&mut self) -> RunResult<Expr> {
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> RunResult<Expr> {
        let mut left = self.parse_additive()?;
        loop {
            let Tok::Op(op) = self.peek() else { break };
            if !matches!(
                op,
                Operator::Eq | Operator::Ne | Operator::Gt | Operator::Ge | Operator::Lt | Operator::Le
            ) {
                break;
            }
            self.bump();
            let right = self.parse_additive()?;
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> RunResult<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let Tok::Op(op) = self.peek() else { break };
            if !matches!(op, Operator::Add | Operator::Sub) {
                break;
            }
            self.bump();
            let right = self.parse_multiplicative()?;
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> RunResult<Expr> {
        let mut left = self.parse_prefix()?;
        loop {
            let Tok::Op(op) = self.peek() else { break };
            if !matches!(op, Operator::Mul | Operator::Div | Operator::Mod) {
                break;
            }
            self.bump();
            let right = self.parse_prefix()?;
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_prefix(&mut self) -> RunResult<Expr> {
        let op = match self.peek() {
            Tok::Op(Operator::Not) => Operator::Not,
            Tok::Op(Operator::Sub) => Operator::Neg,
            Tok::Op(Operator::Get) => Operator::Get,
            Tok::Op(Operator::Ref) => Operator::Ref,
            _ => return self.parse_postfix(),
        };
        self.bump();
        let operand = self.parse_prefix()?;
        // Fold negation into numeric literals so `-4` is a literal.
        if op == Operator::Neg {
            match operand {
                Expr::Literal(Value::Int(i)) => {
                    return i
                        .checked_neg()
                        .map(|n| Expr::Literal(Value::Int(n)))
                        .ok_or_else(|| self.err("integer out of range"));
                }
                Expr::Literal(Value::Float(f)) => return Ok(Expr::Literal(Value::Float(-f))),
                _ => {}
            }
        }
        Ok(Expr::Unary { op, operand: Box::new(operand) })
    }

    fn parse_postfix(&mut self) -> RunResult<Expr> {
        let mut atom = self.parse_atom()?;
        while matches!(self.peek(), Tok::LParen { adjacent: true }) {
            self.bump();
            let args = self.parse_call_args()?;
            atom = Expr::Call { callee: Box::new(atom), args };
        }
        Ok(atom)
    }

    fn parse_call_args(&mut self) -> RunResult<ArgsExpr> {
        let mut args = ArgsExpr::default();
        loop {
            match self.peek() {
                Tok::RParen => {
                    self.bump();
                    return Ok(args);
                }
                Tok::Newline => {
                    self.bump();
                }
                Tok::Semi => return Err(self.err("unexpected ';' in call arguments")),
                Tok::Eof => return Err(self.err("unexpected end of input in call arguments")),
                _ => {
                    let expr = self.parse_expr()?;
                    if self.peek() == Tok::Assign {
                        self.bump();
                        let value = self.parse_expr()?;
                        args.keyed.push((expr, value));
                    } else {
                        args.positional.push(expr);
                    }
                }
            }
        }
    }

    fn parse_atom(&mut self) -> RunResult<Expr> {
        match self.bump() {
            Tok::Int(i) => Ok(Expr::Literal(Value::Int(i))),
            Tok::Float(f) => Ok(Expr::Literal(Value::Float(f))),
            Tok::Str(id) => Ok(Expr::Literal(Value::InternString(id))),
            Tok::Bool(b) => Ok(Expr::Literal(Value::Bool(b))),
            Tok::Null => Ok(Expr::Literal(Value::Null)),
            Tok::Undefined => Ok(Expr::Literal(Value::Undefined)),
            Tok::Word(id) => {
                let mut segments: SmallVec<[PathSeg; 4]> = smallvec![PathSeg::Key(Value::InternString(id))];
                self.parse_path_tail(&mut segments)?;
                if segments.len() == 1 {
                    Ok(Expr::Literal(Value::InternString(id)))
                } else {
                    Ok(Expr::Path(segments))
                }
            }
            Tok::Dot => {
                let mut count = 1u32;
                while self.peek() == Tok::Dot {
                    self.bump();
                    count += 1;
                }
                let mut segments: SmallVec<[PathSeg; 4]> = smallvec![PathSeg::Dots(count)];
                segments.push(self.parse_path_segment()?);
                self.parse_path_tail(&mut segments)?;
                Ok(Expr::Path(segments))
            }
            Tok::LBrace => self.parse_brace_atom(),
            Tok::LParen { .. } => self.parse_paren_atom(),
            Tok::LBracket => self.parse_array_atom(),
            other => Err(self.err(format!("unexpected token {other:?}"))),
        }
    }

    fn parse_path_tail(&mut self, segments: &mut SmallVec<[PathSeg; 4]>) -> RunResult<()> {
        while self.peek() == Tok::Dot {
            self.bump();
            segments.push(self.parse_path_segment()?);
        }
        Ok(())
    }

    fn parse_path_segment(&mut self) -> RunResult<PathSeg> {
        match self.bump() {
            Tok::Word(id) | Tok::Str(id) => Ok(PathSeg::Key(Value::InternString(id))),
            Tok::Int(i) => Ok(PathSeg::Key(Value::Int(i))),
            other => Err(self.err(format!("expected a path segment after '.', found {other:?}"))),
        }
    }

    /// `{ ... }`: a dict literal when every statement is assignments-only,
    /// otherwise a statement-list literal.
    fn parse_brace_atom(&mut self) -> RunResult<Expr> {
        let statements = self.parse_statements(End::Brace, true)?;
        if self.peek() != Tok::RBrace {
            return Err(self.err("expected '}'"));
        }
        self.bump();
        let is_dict = !statements.is_empty()
            && statements.iter().all(|s| s.args.positional.is_empty() && !s.args.keyed.is_empty());
        if is_dict {
            let mut pairs = Vec::new();
            for statement in statements {
                pairs.extend(statement.args.keyed);
            }
            Ok(Expr::Dict(pairs))
        } else {
            let id = self.blocks.alloc(statements);
            Ok(Expr::Literal(Value::Block(id)))
        }
    }

    /// `( ... )`: grouping around a single expression, an execution block
    /// otherwise.
    fn parse_paren_atom(&mut self) -> RunResult<Expr> {
        let mut statements = self.parse_statements(End::Paren, false)?;
        if self.peek() != Tok::RParen {
            return Err(self.err("expected ')'"));
        }
        self.bump();
        if statements.len() == 1 {
            let only = &mut statements[0];
            if only.args.keyed.is_empty() && only.args.positional.len() == 1 {
                return Ok(only.args.positional.pop().expect("length checked above"));
            }
        }
        let id = self.blocks.alloc(statements);
        Ok(Expr::ExecBlock(id))
    }

    fn parse_array_atom(&mut self) -> RunResult<Expr> {
        let mut elements = Vec::new();
        loop {
            match self.peek() {
                Tok::RBracket => {
                    self.bump();
                    return Ok(Expr::Array(elements));
                }
                Tok::Newline => {
                    self.bump();
                }
                Tok::Semi => return Err(self.err("unexpected ';' in array literal")),
                Tok::Eof => return Err(self.err("unexpected end of input in array literal")),
                _ => {
                    let expr = self.parse_expr()?;
                    if self.peek() == Tok::Assign {
                        return Err(self.err("unexpected '=' in array literal"));
                    }
                    elements.push(expr);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> (Vec<Statement>, BlockTable, Interns) {
        let mut interns = Interns::new();
        let mut blocks = BlockTable::default();
        let statements = parse_module(source, &mut interns, &mut blocks).unwrap();
        (statements, blocks, interns)
    }

    #[test]
    fn statements_split_on_semicolons_and_newlines() {
        let (statements, _, _) = parse("echo a; echo b\necho c");
        assert_eq!(statements.len(), 3);
    }

    #[test]
    fn binding_statement_captures_rest_of_line() {
        let (statements, _, _) = parse("a = Animal \"Rex\"");
        let statement = &statements[0];
        assert!(statement.args.positional.is_empty());
        assert_eq!(statement.args.keyed.len(), 1);
        assert!(matches!(statement.args.keyed[0].1, Expr::CallArgs(_)));
    }

    #[test]
    fn inline_assignment_takes_one_expression() {
        let (statements, _, _) = parse("set x=1 y=2");
        let statement = &statements[0];
        assert_eq!(statement.args.positional.len(), 1);
        assert_eq!(statement.args.keyed.len(), 2);
    }

    #[test]
    fn braces_of_assignments_are_dicts() {
        let (statements, _, _) = parse("set d={a=1 b={c=3}}");
        let (_, value) = &statements[0].args.keyed[0];
        let Expr::Dict(pairs) = value else { panic!("expected a dict literal") };
        assert_eq!(pairs.len(), 2);
        assert!(matches!(pairs[1].1, Expr::Dict(_)));
    }

    #[test]
    fn braces_with_statements_are_blocks() {
        let (statements, _, _) = parse("fun f { echo hi }");
        assert!(matches!(statements[0].args.positional[2], Expr::Literal(Value::Block(_))));
    }

    #[test]
    fn adjacent_parens_are_calls_spaced_parens_are_grouping() {
        let (statements, _, _) = parse("echo f1()\nif ($n <= 1) { return 1 }");
        assert!(matches!(statements[0].args.positional[1], Expr::Call { .. }));
        assert!(matches!(statements[1].args.positional[1], Expr::Binary { .. }));
    }

    #[test]
    fn operator_precedence_nests_multiplication_tighter() {
        let (statements, _, _) = parse("x = (1 + 2 * 3)");
        let (_, value) = &statements[0].args.keyed[0];
        let Expr::Binary { op: Operator::Add, right, .. } = value else {
            panic!("expected addition at the top");
        };
        assert!(matches!(**right, Expr::Binary { op: Operator::Mul, .. }));
    }

    #[test]
    fn paths_parse_into_segments() {
        let (statements, _, _) = parse("echo $d.b.c");
        let Expr::Unary { operand, .. } = &statements[0].args.positional[1] else {
            panic!("expected $ prefix");
        };
        let Expr::Path(segments) = &**operand else { panic!("expected a path") };
        assert_eq!(segments.len(), 3);
    }

    #[test]
    fn negative_literals_fold() {
        let (statements, _, _) = parse("echo (0.3 * -4)");
        let Expr::Binary { right, .. } = &statements[0].args.positional[1] else {
            panic!("expected multiplication");
        };
        assert!(matches!(**right, Expr::Literal(Value::Int(-4))));
    }
}
