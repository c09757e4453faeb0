//! Expression AST for the predicates and select items the compilers emit.
//!
//! Exhaustive matching in `to_tokens_for_dialect` keeps every variant
//! rendered for every dialect.

use chrono::NaiveDate;

use super::dialect::Dialect;
use super::token::{Token, TokenStream};

// =============================================================================
// Expression AST
// =============================================================================

/// A SQL expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column reference: optional_table.column
    Column {
        table: Option<String>,
        column: String,
    },

    Literal(Literal),

    /// Binary operation: left op right
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },

    /// IS NULL / IS NOT NULL
    IsNull { expr: Box<Expr>, negated: bool },

    /// Function call: name(args...)
    Function { name: String, args: Vec<Expr> },

    /// `function OVER (PARTITION BY ... ORDER BY ...)`
    WindowFunction {
        function: Box<Expr>,
        partition_by: Vec<Expr>,
        order_by: Vec<WindowOrderBy>,
    },

    /// Parenthesized expression
    Paren(Box<Expr>),

    /// Wildcard `*`
    Star,
}

/// Literal values.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
    Date(NaiveDate),
    Null,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,
    And,
    Or,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

/// ORDER BY item inside a window specification.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowOrderBy {
    pub expr: Expr,
    pub dir: SortDir,
}

impl WindowOrderBy {
    pub fn desc(expr: Expr) -> Self {
        Self {
            expr,
            dir: SortDir::Desc,
        }
    }
}

impl Expr {
    /// Convert this expression to a token stream for a specific dialect.
    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        match self {
            Expr::Column { table, column } => {
                if let Some(t) = table {
                    ts.push(Token::Ident(t.clone()));
                    ts.push(Token::Dot);
                }
                ts.push(Token::Ident(column.clone()));
            }

            Expr::Literal(lit) => {
                ts.push(match lit {
                    Literal::Int(n) => Token::LitInt(*n),
                    Literal::Float(f) => Token::LitFloat(*f),
                    Literal::String(s) => Token::LitString(s.clone()),
                    Literal::Bool(b) => Token::LitBool(*b),
                    Literal::Date(d) => Token::LitDate(d.format("%Y-%m-%d").to_string()),
                    Literal::Null => Token::LitNull,
                });
            }

            Expr::BinaryOp { left, op, right } => {
                ts.append(&left.to_tokens_for_dialect(dialect));
                ts.space();
                ts.push(binary_op_to_token(*op));
                ts.space();
                ts.append(&right.to_tokens_for_dialect(dialect));
            }

            Expr::IsNull { expr, negated } => {
                ts.append(&expr.to_tokens_for_dialect(dialect));
                ts.space();
                ts.push(if *negated {
                    Token::IsNotNull
                } else {
                    Token::IsNull
                });
            }

            Expr::Function { name, args } => {
                ts.push(Token::FunctionName(name.clone()));
                ts.lparen();
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        ts.comma().space();
                    }
                    ts.append(&arg.to_tokens_for_dialect(dialect));
                }
                ts.rparen();
            }

            Expr::WindowFunction {
                function,
                partition_by,
                order_by,
            } => {
                ts.append(&function.to_tokens_for_dialect(dialect));
                ts.space().push(Token::Over).space().lparen();

                if !partition_by.is_empty() {
                    ts.push(Token::PartitionBy).space();
                    for (i, expr) in partition_by.iter().enumerate() {
                        if i > 0 {
                            ts.comma().space();
                        }
                        ts.append(&expr.to_tokens_for_dialect(dialect));
                    }
                }

                if !order_by.is_empty() {
                    if !partition_by.is_empty() {
                        ts.space();
                    }
                    ts.push(Token::OrderBy).space();
                    for (i, ob) in order_by.iter().enumerate() {
                        if i > 0 {
                            ts.comma().space();
                        }
                        ts.append(&ob.expr.to_tokens_for_dialect(dialect));
                        ts.space().push(match ob.dir {
                            SortDir::Asc => Token::Asc,
                            SortDir::Desc => Token::Desc,
                        });
                    }
                }

                ts.rparen();
            }

            Expr::Paren(inner) => {
                ts.lparen();
                ts.append(&inner.to_tokens_for_dialect(dialect));
                ts.rparen();
            }

            Expr::Star => {
                ts.push(Token::Star);
            }
        }

        ts
    }

    /// Render this expression as a SQL fragment.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens_for_dialect(dialect).serialize(dialect)
    }
}

fn binary_op_to_token(op: BinaryOperator) -> Token {
    match op {
        BinaryOperator::Eq => Token::Eq,
        BinaryOperator::Ne => Token::Ne,
        BinaryOperator::Lt => Token::Lt,
        BinaryOperator::Gt => Token::Gt,
        BinaryOperator::Lte => Token::Lte,
        BinaryOperator::Gte => Token::Gte,
        BinaryOperator::And => Token::And,
        BinaryOperator::Or => Token::Or,
    }
}

// =============================================================================
// Expression Constructors
// =============================================================================

/// Create a column reference.
pub fn col(name: &str) -> Expr {
    Expr::Column {
        table: None,
        column: name.into(),
    }
}

/// Create a qualified column reference (table.column).
pub fn table_col(table: &str, column: &str) -> Expr {
    Expr::Column {
        table: Some(table.into()),
        column: column.into(),
    }
}

pub fn lit_int(n: i64) -> Expr {
    Expr::Literal(Literal::Int(n))
}

pub fn lit_str(s: &str) -> Expr {
    Expr::Literal(Literal::String(s.into()))
}

pub fn lit_bool(b: bool) -> Expr {
    Expr::Literal(Literal::Bool(b))
}

pub fn lit_date(d: NaiveDate) -> Expr {
    Expr::Literal(Literal::Date(d))
}

/// Wrap in parentheses.
pub fn paren(expr: Expr) -> Expr {
    Expr::Paren(Box::new(expr))
}

/// Generic function call.
pub fn func(name: &str, args: Vec<Expr>) -> Expr {
    Expr::Function {
        name: name.into(),
        args,
    }
}

/// COUNT(*)
pub fn count_star() -> Expr {
    func("COUNT", vec![Expr::Star])
}

/// `ROW_NUMBER() OVER (PARTITION BY ... ORDER BY ...)`
pub fn row_number_over(partition_by: Vec<Expr>, order_by: Vec<WindowOrderBy>) -> Expr {
    Expr::WindowFunction {
        function: Box::new(func("ROW_NUMBER", vec![])),
        partition_by,
        order_by,
    }
}

// =============================================================================
// Expression Builder Trait
// =============================================================================

/// Extension trait for building expressions fluently.
pub trait ExprExt: Sized {
    fn into_expr(self) -> Expr;

    fn binary(self, op: BinaryOperator, other: impl Into<Expr>) -> Expr {
        Expr::BinaryOp {
            left: Box::new(self.into_expr()),
            op,
            right: Box::new(other.into()),
        }
    }

    fn eq(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Eq, other)
    }

    fn ne(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Ne, other)
    }

    fn gt(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Gt, other)
    }

    fn gte(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Gte, other)
    }

    fn lt(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Lt, other)
    }

    fn lte(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Lte, other)
    }

    fn and(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::And, other)
    }

    fn or(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Or, other)
    }

    #[allow(clippy::wrong_self_convention)]
    fn is_null(self) -> Expr {
        Expr::IsNull {
            expr: Box::new(self.into_expr()),
            negated: false,
        }
    }

    #[allow(clippy::wrong_self_convention)]
    fn is_not_null(self) -> Expr {
        Expr::IsNull {
            expr: Box::new(self.into_expr()),
            negated: true,
        }
    }

    /// Alias this expression (for SELECT list).
    fn alias(self, name: &str) -> super::query::SelectExpr {
        super::query::SelectExpr {
            expr: self.into_expr(),
            alias: Some(name.into()),
        }
    }
}

impl ExprExt for Expr {
    fn into_expr(self) -> Expr {
        self
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<i64> for Expr {
    fn from(n: i64) -> Self {
        lit_int(n)
    }
}

impl From<i32> for Expr {
    fn from(n: i32) -> Self {
        lit_int(n as i64)
    }
}

impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        lit_str(s)
    }
}

impl From<bool> for Expr {
    fn from(b: bool) -> Self {
        lit_bool(b)
    }
}

impl From<NaiveDate> for Expr {
    fn from(d: NaiveDate) -> Self {
        lit_date(d)
    }
}

// =============================================================================
// Tests
// =============================================================================
