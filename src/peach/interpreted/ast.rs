use std::rc::Rc;

use either::{Either, Left, Right};

use crate::peach::common::error::ErrorInfo;
use crate::peach::common::lexer::Token;

#[derive(Debug, PartialEq, Clone)]
pub struct Program {
    pub statements: Vec<Statement>,
}

impl Program {
    pub fn new(statements: Vec<Statement>) -> Self { Program { statements } }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Block {
    pub statements: Vec<Statement>,
    pub error_info: ErrorInfo,
}

/// `let NAME [: TYPE] [= VALUE]`, also used for the members of object literals.
#[derive(Debug, PartialEq, Clone)]
pub struct Declaration {
    pub name: String,
    pub type_expr: Option<Expression>,
    pub value: Option<Expression>,
    pub error_info: ErrorInfo,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Argument {
    pub name: String,
    pub type_expr: Option<Expression>,
    pub error_info: ErrorInfo,
}

impl Argument {
    pub fn untyped<S: Into<String>>(name: S, error_info: ErrorInfo) -> Self {
        Argument { name: name.into(), type_expr: None, error_info }
    }
}

#[derive(Debug, PartialEq, Clone, Default)]
pub struct ArgumentList {
    pub arguments: Vec<Argument>,
    /// The trailing `*name` argument, collecting any surplus values into an array.
    pub splat: Option<Argument>,
}

impl ArgumentList {
    pub fn accepts(&self, count: usize) -> bool {
        if self.splat.is_some() {
            count >= self.arguments.len()
        } else {
            count == self.arguments.len()
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct FunctionExpression {
    pub arguments: ArgumentList,
    pub body: Block,
    pub error_info: ErrorInfo,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Import {
    pub path: String,
    pub file: Rc<str>,
    pub statements: Vec<Statement>,
    pub error_info: ErrorInfo,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Statement {
    Expression(Expression),
    Declare(Declaration),
    Block(Block),
    IfElse { branches: Vec<(Expression, Block)>, else_block: Option<Block>, error_info: ErrorInfo },
    While(Expression, Block, ErrorInfo),
    // The body is kept as the one-argument callback handed to `iterate`.
    For { name: String, iterable: Expression, body: Rc<FunctionExpression>, error_info: ErrorInfo },
    Return(Expression, ErrorInfo),
    Import(Import),
    Macro { name: String, function: Rc<FunctionExpression>, error_info: ErrorInfo },
    Empty(ErrorInfo),
}

#[derive(Debug, PartialEq, Clone)]
pub enum Expression {
    Atomic(Atom, ErrorInfo),
    Variable(String, ErrorInfo),
    Unary(UnaryOperator, Box<Expression>, ErrorInfo),
    Binary(BinaryOperator, Box<Expression>, Box<Expression>, ErrorInfo),
    Assign(Box<Expression>, Box<Expression>, ErrorInfo),
    Call(Box<Expression>, Vec<Expression>, ErrorInfo),
    Member(Box<Expression>, String, ErrorInfo),
    Index(Box<Expression>, Box<Expression>, ErrorInfo),
    Function(Rc<FunctionExpression>),
    Array(Vec<Expression>, ErrorInfo),
    Object(Vec<Declaration>, ErrorInfo),
    Splat(Box<Expression>, ErrorInfo),
    Mixin(Vec<Token>, ErrorInfo),
}

impl Expression {
    pub fn error_info(&self) -> ErrorInfo {
        match self {
            Expression::Atomic(_, i)
            | Expression::Variable(_, i)
            | Expression::Unary(_, _, i)
            | Expression::Binary(_, _, _, i)
            | Expression::Assign(_, _, i)
            | Expression::Call(_, _, i)
            | Expression::Member(_, _, i)
            | Expression::Index(_, _, i)
            | Expression::Array(_, i)
            | Expression::Object(_, i)
            | Expression::Splat(_, i)
            | Expression::Mixin(_, i) => *i,
            Expression::Function(f) => f.error_info,
        }
    }

    pub fn variable<S: Into<String>>(name: S, error_info: ErrorInfo) -> Self {
        Expression::Variable(name.into(), error_info)
    }
    pub fn int(i: i64, error_info: ErrorInfo) -> Self { Expression::Atomic(Atom::Int(i), error_info) }
    pub fn string<S: Into<String>>(str: S, error_info: ErrorInfo) -> Self {
        Expression::Atomic(Atom::Str(str.into()), error_info)
    }
    pub fn member<S: Into<String>>(expr: Expression, name: S, error_info: ErrorInfo) -> Self {
        Expression::Member(Box::new(expr), name.into(), error_info)
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum Atom {
    Int(i64),
    Float(f64),
    Str(String),
    True,
    False,
    Null,
}

#[derive(Debug, PartialEq, Clone, Copy, Eq)]
pub enum UnaryOperator {
    Minus,
    Plus,
    Bang,
}

impl UnaryOperator {
    pub fn symbol(&self) -> &str {
        match self {
            UnaryOperator::Minus => "-",
            UnaryOperator::Plus => "+",
            UnaryOperator::Bang => "!",
        }
    }

    pub fn method(&self) -> &'static str {
        match self {
            UnaryOperator::Minus => "neg",
            UnaryOperator::Plus => "pos",
            UnaryOperator::Bang => "not",
        }
    }
}

#[derive(Debug, PartialEq, Clone, Copy, Eq)]
pub enum BinaryOperator {
    Plus,
    Minus,
    Mult,
    Div,
    Mod,

    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    EqualEqual,
    BangEqual,

    And,
    Or,

    BitOr,
    BitAnd,
    Identity,
}

impl BinaryOperator {
    pub fn symbol(&self) -> &str {
        match self {
            BinaryOperator::Plus => "+",
            BinaryOperator::Minus => "-",
            BinaryOperator::Mult => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Mod => "%",
            BinaryOperator::Less => "<",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::Greater => ">",
            BinaryOperator::GreaterEqual => ">=",
            BinaryOperator::EqualEqual => "==",
            BinaryOperator::BangEqual => "!=",
            BinaryOperator::And => "&&",
            BinaryOperator::Or => "||",
            BinaryOperator::BitOr => "|",
            BinaryOperator::BitAnd => "&",
            BinaryOperator::Identity => "<=>",
        }
    }

    /// The method the left operand is sent. `Right` means the result is then negated with `not`;
    /// `None` means the operator is evaluated natively.
    pub fn method(&self) -> Option<Either<&'static str, &'static str>> {
        let result = match self {
            BinaryOperator::Plus => Left("add"),
            BinaryOperator::Minus => Left("sub"),
            BinaryOperator::Mult => Left("mul"),
            BinaryOperator::Div => Left("div"),
            BinaryOperator::Mod => Left("mod"),
            BinaryOperator::Less => Left("lt"),
            BinaryOperator::LessEqual => Left("lte"),
            BinaryOperator::Greater => Left("gt"),
            BinaryOperator::GreaterEqual => Left("gte"),
            BinaryOperator::EqualEqual => Left("compare"),
            BinaryOperator::BangEqual => Right("compare"),
            BinaryOperator::And => Left("and"),
            BinaryOperator::Or => Left("or"),
            BinaryOperator::BitOr | BinaryOperator::BitAnd | BinaryOperator::Identity => return None,
        };
        Some(result)
    }
}
