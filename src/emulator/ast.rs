//! Syntax tree produced by the emulator's parser.

use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOperator {
    Minus,
    Not,
    Length,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    FloorDivide,
    Modulo,
    Power,
    Concat,
    Equal,
    NotEqual,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
    And,
    Or,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Nil,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Str(Rc<str>),
    Table(Vec<TableField>),
    Function(Rc<FunctionBody>),
    Name(String),
    /// Covers both `t.name` and `t[key]`; the former is stored with a string key.
    Index {
        target: Box<Expr>,
        key: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    MethodCall {
        receiver: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },
    /// A parenthesized expression, which truncates multiple results to one.
    Paren(Box<Expr>),
    Unary {
        operator: UnaryOperator,
        operand: Box<Expr>,
    },
    Binary {
        operator: BinaryOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

impl Expr {
    pub fn is_call(&self) -> bool {
        matches!(self, Expr::Call { .. } | Expr::MethodCall { .. })
    }

    pub fn is_assignable(&self) -> bool {
        matches!(self, Expr::Name(_) | Expr::Index { .. })
    }
}

#[derive(Debug, Clone)]
pub enum TableField {
    Positional(Expr),
    Named(String, Expr),
    Keyed(Expr, Expr),
}

#[derive(Debug)]
pub struct FunctionBody {
    pub params: Vec<String>,
    pub body: Block,
}

#[derive(Debug, Default)]
pub struct Block {
    pub statements: Vec<Statement>,
    pub ret: Option<Vec<Expr>>,
}

#[derive(Debug)]
pub enum Statement {
    Local {
        names: Vec<String>,
        values: Vec<Expr>,
    },
    Assign {
        targets: Vec<Expr>,
        values: Vec<Expr>,
    },
    Call(Expr),
    If {
        branches: Vec<(Expr, Block)>,
        otherwise: Option<Block>,
    },
    While {
        condition: Expr,
        body: Block,
    },
    NumericFor {
        variable: String,
        start: Expr,
        limit: Expr,
        step: Option<Expr>,
        body: Block,
    },
    /// `function a.b.c(...)` or `function a.b:c(...)`. Method bodies already carry `self`.
    Function {
        path: Vec<String>,
        method: Option<String>,
        body: Rc<FunctionBody>,
    },
}
