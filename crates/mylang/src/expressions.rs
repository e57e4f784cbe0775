//! Parse-tree node types.
//!
//! The parser produces statements whose arguments are unevaluated [`Expr`]
//! trees. Literals are converted to runtime values at parse time (the only
//! place parse-time data crosses into runtime semantics); everything else
//! is an incomplete expression that the evaluator resolves per statement,
//! copy-on-write: execution never mutates these nodes.
//!
//! Statement lists are stored once in a [`BlockTable`] and referenced by
//! [`BlockId`]; a block handle is itself a first-class (lazy) value, which
//! is how `if`, `loop`, `fun` and friends receive their bodies.

use std::rc::Rc;

use smallvec::SmallVec;

use crate::{types::path::PathSeg, value::Value};

/// Handle to a statement list in the session's block table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct BlockId(u32);

impl BlockId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A parsed statement list.
#[derive(Debug)]
pub(crate) struct BlockData {
    pub statements: Vec<Statement>,
}

/// Storage for every statement list parsed in a session (all modules and
/// REPL lines share one table, so block handles are globally valid).
#[derive(Debug, Default)]
pub(crate) struct BlockTable {
    blocks: Vec<Rc<BlockData>>,
}

impl BlockTable {
    pub fn alloc(&mut self, statements: Vec<Statement>) -> BlockId {
        let id = BlockId(u32::try_from(self.blocks.len()).expect("block table overflow"));
        self.blocks.push(Rc::new(BlockData { statements }));
        id
    }

    pub fn get(&self, id: BlockId) -> Rc<BlockData> {
        Rc::clone(&self.blocks[id.index()])
    }
}

/// One statement: a call expression in argument form.
#[derive(Debug, Clone)]
pub(crate) struct Statement {
    pub args: ArgsExpr,
    /// 1-based source line, for diagnostics.
    pub line: u32,
}

/// Unevaluated arguments: whitespace-separated positional elements plus
/// inline `k=v` assignments, in source order.
#[derive(Debug, Clone, Default)]
pub(crate) struct ArgsExpr {
    pub positional: Vec<Expr>,
    pub keyed: Vec<(Expr, Expr)>,
}

/// An expression node.
#[derive(Debug, Clone)]
pub(crate) enum Expr {
    /// A literal value: scalars, strings, and lazy block handles.
    Literal(Value),
    /// A multi-segment selector, e.g. `a.b.c`. Evaluates to a path value;
    /// resolution happens in `get`/`set`.
    Path(SmallVec<[PathSeg; 4]>),
    /// `{k=v ...}` - built fresh on every evaluation.
    Dict(Vec<(Expr, Expr)>),
    /// `[e1 e2 ...]`
    Array(Vec<Expr>),
    Unary {
        op: Operator,
        operand: Box<Expr>,
    },
    Binary {
        op: Operator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Postfix call, e.g. `f(a b)` or `a.speak()`. The callee is resolved
    /// like a statement head (ref passthrough or `get`).
    Call {
        callee: Box<Expr>,
        args: ArgsExpr,
    },
    /// A statement-shaped implicit call: the multi-element right-hand side
    /// of a binding statement, e.g. `a = Animal "Rex"`.
    CallArgs(ArgsExpr),
    /// `( ... )` containing statements: evaluated eagerly in a fresh child
    /// frame; the block's value is the statement list's value.
    ExecBlock(BlockId),
}

impl Expr {
    /// True for nodes that produce their own value when the statement's
    /// arguments are evaluated; a statement consisting of exactly one such
    /// element yields that value directly instead of dispatching `call`.
    pub fn is_self_evaluating(&self) -> bool {
        matches!(
            self,
            Self::Dict(_) | Self::Array(_) | Self::Unary { .. } | Self::Binary { .. } | Self::Call { .. } | Self::CallArgs(_) | Self::ExecBlock(_)
        )
    }
}

/// Named operators, dispatched by `op` and by operation nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Operator {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Not,
    /// Prefix negation; spelled `-` but distinct from binary `Sub`.
    Neg,
    /// `$x` - sugar for `get x`.
    Get,
    /// `&x` - sugar for `ref x`.
    Ref,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Add => "+",
            Self::Sub | Self::Neg => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Not => "!",
            Self::Get => "$",
            Self::Ref => "&",
        }
    }

    /// Parses an operator name as accepted by the `op` builtin.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "==" => Self::Eq,
            "!=" => Self::Ne,
            ">" => Self::Gt,
            ">=" => Self::Ge,
            "<" => Self::Lt,
            "<=" => Self::Le,
            "+" => Self::Add,
            "-" => Self::Sub,
            "*" => Self::Mul,
            "/" => Self::Div,
            "%" => Self::Mod,
            "!" => Self::Not,
            "$" => Self::Get,
            "&" => Self::Ref,
            _ => return None,
        })
    }
}
