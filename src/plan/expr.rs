//! Expression types for the plan predicate/aggregate tree

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::query::Granularity;
use crate::semantic_model::Aggregation;

/// A column reference
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Column {
    /// Cube name the column belongs to (empty for output aliases)
    pub table: String,
    /// Column name
    pub name: String,
}

impl Column {
    pub fn new(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            name: name.into(),
        }
    }

    /// Create an unqualified column reference (no table prefix)
    pub fn unqualified(name: impl Into<String>) -> Self {
        Self {
            table: String::new(),
            name: name.into(),
        }
    }

    /// Fully qualified name: table.column
    pub fn qualified_name(&self) -> String {
        if self.table.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.table, self.name)
        }
    }
}

/// Literal values
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Timestamp(DateTime<Utc>),
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BinaryOperator {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl BinaryOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOperator::Eq => "=",
            BinaryOperator::NotEq => "!=",
            BinaryOperator::Lt => "<",
            BinaryOperator::LtEq => "<=",
            BinaryOperator::Gt => ">",
            BinaryOperator::GtEq => ">=",
        }
    }
}

/// Substring match flavours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchKind {
    Contains,
    StartsWith,
    EndsWith,
}

/// Predicate and scalar expressions.
///
/// The tree is dialect-free: an execution engine maps each variant onto its
/// own syntax.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Expr {
    /// Column reference
    Column(Column),
    /// Literal value
    Literal(Literal),
    /// Binary comparison (e.g., a = b, a > 5)
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },
    /// expr [NOT] IN (values)
    InList {
        expr: Box<Expr>,
        values: Vec<Literal>,
        negated: bool,
    },
    /// Substring match on a string expression
    StringMatch {
        expr: Box<Expr>,
        kind: MatchKind,
        pattern: String,
        negated: bool,
    },
    /// low <= expr <= high
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
    },
    IsNull(Box<Expr>),
    IsNotNull(Box<Expr>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    /// Truncate a timestamp to the start of its granularity bucket
    DateTrunc {
        granularity: Granularity,
        expr: Box<Expr>,
    },
    /// Aggregate function call; `arg` is None for count of all rows
    Aggregate {
        func: Aggregation,
        arg: Option<Box<Expr>>,
    },
    /// CASE WHEN expression
    Case {
        /// List of (condition, result) pairs
        when_then: Vec<(Expr, Expr)>,
        /// Optional ELSE result
        else_result: Option<Box<Expr>>,
    },
}

impl Expr {
    pub fn column(table: impl Into<String>, name: impl Into<String>) -> Self {
        Expr::Column(Column::new(table, name))
    }

    pub fn literal(value: Literal) -> Self {
        Expr::Literal(value)
    }

    pub fn binary(left: Expr, op: BinaryOperator, right: Expr) -> Self {
        Expr::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn eq(left: Expr, right: Expr) -> Self {
        Self::binary(left, BinaryOperator::Eq, right)
    }

    pub fn negate(self) -> Self {
        Expr::Not(Box::new(self))
    }

    /// Conjunction of `exprs`, flattening nested ANDs.
    ///
    /// Returns None for an empty input and the expression itself for one.
    pub fn and_all(exprs: impl IntoIterator<Item = Expr>) -> Option<Expr> {
        let mut flat = Vec::new();
        for expr in exprs {
            match expr {
                Expr::And(children) => flat.extend(children),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => None,
            1 => flat.pop(),
            _ => Some(Expr::And(flat)),
        }
    }

    /// Disjunction of `exprs`, flattening nested ORs
    pub fn or_all(exprs: impl IntoIterator<Item = Expr>) -> Option<Expr> {
        let mut flat = Vec::new();
        for expr in exprs {
            match expr {
                Expr::Or(children) => flat.extend(children),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => None,
            1 => flat.pop(),
            _ => Some(Expr::Or(flat)),
        }
    }

    /// Every column referenced anywhere in this expression
    pub fn columns(&self) -> Vec<&Column> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a Column>) {
        match self {
            Expr::Column(c) => out.push(c),
            Expr::Literal(_) => {}
            Expr::BinaryOp { left, right, .. } => {
                left.collect_columns(out);
                right.collect_columns(out);
            }
            Expr::InList { expr, .. }
            | Expr::StringMatch { expr, .. }
            | Expr::IsNull(expr)
            | Expr::IsNotNull(expr)
            | Expr::Not(expr)
            | Expr::DateTrunc { expr, .. } => expr.collect_columns(out),
            Expr::Between { expr, low, high } => {
                expr.collect_columns(out);
                low.collect_columns(out);
                high.collect_columns(out);
            }
            Expr::And(children) | Expr::Or(children) => {
                for child in children {
                    child.collect_columns(out);
                }
            }
            Expr::Aggregate { arg, .. } => {
                if let Some(arg) = arg {
                    arg.collect_columns(out);
                }
            }
            Expr::Case { when_then, else_result } => {
                for (when, then) in when_then {
                    when.collect_columns(out);
                    then.collect_columns(out);
                }
                if let Some(e) = else_result {
                    e.collect_columns(out);
                }
            }
        }
    }

    /// Whether any column of `table` appears in this expression
    pub fn references_table(&self, table: &str) -> bool {
        self.columns().iter().any(|c| c.table == table)
    }
}

/// An aggregate in the select list: func(expr) AS alias
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateExpr {
    pub func: Aggregation,
    /// None means all rows (count)
    pub expr: Option<Expr>,
    pub alias: String,
}
