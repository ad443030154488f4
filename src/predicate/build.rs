//! Filter clause -> predicate conversion

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::error::FilterError;
use crate::daterange::{DateRangeResolver, ResolvedDateRange};
use crate::plan::{BinaryOperator, Expr, Literal, MatchKind};
use crate::query::{DateRangeExpr, FilterOperator, MemberFilter};
use crate::semantic_model::{Member, ValueKind};

/// Builds predicates for single member filters.
///
/// Date values (`inDateRange`, `beforeDate`, comparisons on time members) are
/// resolved through the same resolver and `now` as the query's time
/// dimensions.
#[derive(Debug, Clone, Copy)]
pub struct PredicateBuilder<'a> {
    resolver: &'a DateRangeResolver,
    now: DateTime<Utc>,
}

impl<'a> PredicateBuilder<'a> {
    pub fn new(resolver: &'a DateRangeResolver, now: DateTime<Utc>) -> Self {
        Self { resolver, now }
    }

    /// Validate `filter` against `member` and build its predicate
    pub fn build(&self, filter: &MemberFilter, member: &Member<'_>) -> Result<Expr, FilterError> {
        check_arity(filter)?;
        check_type(filter, member.value_kind())?;

        let target = member.expr();
        let kind = member.value_kind();
        let values = filter.values();

        let predicate = match filter.operator {
            FilterOperator::Equals | FilterOperator::NotEquals => {
                let negated = filter.operator == FilterOperator::NotEquals;
                let mut literals = values
                    .iter()
                    .map(|v| self.literal(filter, kind, v))
                    .collect::<Result<Vec<_>, _>>()?;
                if literals.len() == 1 {
                    let op = if negated { BinaryOperator::NotEq } else { BinaryOperator::Eq };
                    let value = literals.remove(0);
                    Expr::binary(target, op, Expr::Literal(value))
                } else {
                    Expr::InList {
                        expr: Box::new(target),
                        values: literals,
                        negated,
                    }
                }
            }
            FilterOperator::Contains => self.string_match(filter, target, MatchKind::Contains, false)?,
            FilterOperator::NotContains => self.string_match(filter, target, MatchKind::Contains, true)?,
            FilterOperator::StartsWith => self.string_match(filter, target, MatchKind::StartsWith, false)?,
            FilterOperator::EndsWith => self.string_match(filter, target, MatchKind::EndsWith, false)?,
            FilterOperator::Gt => self.compare(filter, kind, target, BinaryOperator::Gt)?,
            FilterOperator::Gte => self.compare(filter, kind, target, BinaryOperator::GtEq)?,
            FilterOperator::Lt => self.compare(filter, kind, target, BinaryOperator::Lt)?,
            FilterOperator::Lte => self.compare(filter, kind, target, BinaryOperator::LtEq)?,
            FilterOperator::InDateRange => between(target, self.date_range(filter)?),
            FilterOperator::NotInDateRange => between(target, self.date_range(filter)?).negate(),
            FilterOperator::BeforeDate => {
                let instant = self.instant(filter, &values[0])?;
                Expr::binary(target, BinaryOperator::Lt, timestamp(instant))
            }
            FilterOperator::AfterDate => {
                let instant = self.instant(filter, &values[0])?;
                Expr::binary(target, BinaryOperator::Gt, timestamp(instant))
            }
            FilterOperator::Set => Expr::IsNotNull(Box::new(target)),
            FilterOperator::NotSet => Expr::IsNull(Box::new(target)),
        };

        tracing::trace!(member = %filter.member, operator = %filter.operator, "Built filter predicate");
        Ok(predicate)
    }

    /// One match per value; several values are ORed, or ANDed when negated
    fn string_match(
        &self,
        filter: &MemberFilter,
        target: Expr,
        kind: MatchKind,
        negated: bool,
    ) -> Result<Expr, FilterError> {
        let matches = filter
            .values()
            .iter()
            .map(|v| {
                let pattern = value_str(filter, v)?;
                Ok(Expr::StringMatch {
                    expr: Box::new(target.clone()),
                    kind,
                    pattern: pattern.to_string(),
                    negated,
                })
            })
            .collect::<Result<Vec<_>, FilterError>>()?;

        let combined = if negated {
            Expr::and_all(matches)
        } else {
            Expr::or_all(matches)
        };
        // arity has already been checked, so there is at least one match
        combined.ok_or_else(|| FilterError::MissingValues {
            member: filter.member.clone(),
            operator: filter.operator,
        })
    }

    fn compare(
        &self,
        filter: &MemberFilter,
        kind: ValueKind,
        target: Expr,
        op: BinaryOperator,
    ) -> Result<Expr, FilterError> {
        let value = self.literal(filter, kind, &filter.values()[0])?;
        Ok(Expr::binary(target, op, Expr::Literal(value)))
    }

    /// `[start, end]` pair or a single expression such as `last 7 days`
    fn date_range(&self, filter: &MemberFilter) -> Result<ResolvedDateRange, FilterError> {
        let parts = filter
            .values()
            .iter()
            .map(|v| value_str(filter, v).map(str::to_string))
            .collect::<Result<Vec<_>, _>>()?;
        let expr = match parts.len() {
            1 => DateRangeExpr::Expression(parts.into_iter().next().unwrap_or_default()),
            _ => DateRangeExpr::Interval(parts),
        };
        self.resolver
            .resolve(&expr, self.now)
            .map_err(|source| FilterError::DateRange {
                member: filter.member.clone(),
                source,
            })
    }

    fn instant(&self, filter: &MemberFilter, value: &Value) -> Result<DateTime<Utc>, FilterError> {
        let text = value_str(filter, value)?;
        self.resolver
            .resolve_instant(text)
            .map_err(|source| FilterError::DateRange {
                member: filter.member.clone(),
                source,
            })
    }

    /// Convert a JSON value to a literal of the member's kind
    fn literal(
        &self,
        filter: &MemberFilter,
        kind: ValueKind,
        value: &Value,
    ) -> Result<Literal, FilterError> {
        let invalid = |reason: &str| FilterError::InvalidValue {
            member: filter.member.clone(),
            value: value.to_string(),
            reason: reason.to_string(),
        };

        match (kind, value) {
            (_, Value::Null) => Err(invalid("null is not a filter value, use set/notSet")),
            (_, Value::Array(_) | Value::Object(_)) => Err(invalid("expected a scalar")),
            (ValueKind::String, Value::String(s)) => Ok(Literal::String(s.clone())),
            (ValueKind::String, other) => Ok(Literal::String(other.to_string())),
            (ValueKind::Number, Value::Number(n)) => number_literal(n).ok_or_else(|| invalid("not a finite number")),
            (ValueKind::Number, Value::String(s)) => parse_number(s).ok_or_else(|| invalid("not a number")),
            (ValueKind::Number, Value::Bool(_)) => Err(invalid("expected a number")),
            (ValueKind::Boolean, Value::Bool(b)) => Ok(Literal::Bool(*b)),
            (ValueKind::Boolean, Value::String(s)) => match s.to_lowercase().as_str() {
                "true" => Ok(Literal::Bool(true)),
                "false" => Ok(Literal::Bool(false)),
                _ => Err(invalid("expected true or false")),
            },
            (ValueKind::Boolean, Value::Number(_)) => Err(invalid("expected true or false")),
            (ValueKind::Time, Value::String(s)) => self
                .resolver
                .resolve_instant(s)
                .map(Literal::Timestamp)
                .map_err(|source| FilterError::DateRange {
                    member: filter.member.clone(),
                    source,
                }),
            (ValueKind::Time, _) => Err(invalid("expected a date or timestamp string")),
        }
    }
}

fn check_arity(filter: &MemberFilter) -> Result<(), FilterError> {
    let got = filter.values().len();
    let member = || filter.member.clone();

    if !filter.operator.takes_values() {
        if got > 0 {
            return Err(FilterError::UnexpectedValues {
                member: member(),
                operator: filter.operator,
            });
        }
        return Ok(());
    }
    if got == 0 {
        return Err(FilterError::MissingValues {
            member: member(),
            operator: filter.operator,
        });
    }

    let expected = match filter.operator {
        FilterOperator::Gt
        | FilterOperator::Gte
        | FilterOperator::Lt
        | FilterOperator::Lte
        | FilterOperator::BeforeDate
        | FilterOperator::AfterDate => (got == 1).then_some(()).ok_or("exactly 1"),
        FilterOperator::InDateRange | FilterOperator::NotInDateRange => {
            (got <= 2).then_some(()).ok_or("1 or 2")
        }
        _ => Ok(()),
    };
    expected.map_err(|expected| FilterError::Arity {
        member: member(),
        operator: filter.operator,
        expected,
        got,
    })
}

fn check_type(filter: &MemberFilter, kind: ValueKind) -> Result<(), FilterError> {
    let compatible = match filter.operator {
        FilterOperator::Equals
        | FilterOperator::NotEquals
        | FilterOperator::Set
        | FilterOperator::NotSet => true,
        FilterOperator::Contains
        | FilterOperator::NotContains
        | FilterOperator::StartsWith
        | FilterOperator::EndsWith => kind == ValueKind::String,
        FilterOperator::Gt | FilterOperator::Gte | FilterOperator::Lt | FilterOperator::Lte => {
            kind.is_ordered()
        }
        FilterOperator::InDateRange
        | FilterOperator::NotInDateRange
        | FilterOperator::BeforeDate
        | FilterOperator::AfterDate => kind == ValueKind::Time,
    };
    if compatible {
        Ok(())
    } else {
        Err(FilterError::IncompatibleType {
            member: filter.member.clone(),
            operator: filter.operator,
            kind,
        })
    }
}

fn value_str<'v>(filter: &MemberFilter, value: &'v Value) -> Result<&'v str, FilterError> {
    value.as_str().ok_or_else(|| FilterError::InvalidValue {
        member: filter.member.clone(),
        value: value.to_string(),
        reason: "expected a string".to_string(),
    })
}

fn number_literal(n: &serde_json::Number) -> Option<Literal> {
    match n.as_i64() {
        Some(i) => Some(Literal::Int(i)),
        None => n.as_f64().map(Literal::Float),
    }
}

fn parse_number(s: &str) -> Option<Literal> {
    let s = s.trim();
    if let Ok(i) = s.parse::<i64>() {
        return Some(Literal::Int(i));
    }
    s.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(Literal::Float)
}

fn timestamp(instant: DateTime<Utc>) -> Expr {
    Expr::Literal(Literal::Timestamp(instant))
}

/// Inclusive range predicate on `target`
pub fn between(target: Expr, range: ResolvedDateRange) -> Expr {
    Expr::Between {
        expr: Box::new(target),
        low: Box::new(timestamp(range.start)),
        high: Box::new(timestamp(range.end)),
    }
}
