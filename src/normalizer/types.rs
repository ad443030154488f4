//! Canonical, fully-resolved query

use crate::daterange::ResolvedDateRange;
use crate::plan::{Expr, SortKey};
use crate::query::Granularity;
use crate::semantic_model::Member;

/// A time dimension after its `dateRange` has been resolved
#[derive(Debug, Clone, Copy)]
pub struct NormalizedTimeDimension<'a> {
    pub member: Member<'a>,
    pub granularity: Option<Granularity>,
    pub date_range: Option<ResolvedDateRange>,
}

impl<'a> NormalizedTimeDimension<'a> {
    /// Output column name, only for time dimensions that group results
    pub fn alias(&self) -> Option<String> {
        self.granularity
            .map(|g| format!("{}.{}", self.member.path(), g))
    }
}

/// Which part of the plan a filter predicate belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clause {
    /// Row filter on dimensions
    Where,
    /// Group filter on measures
    Having,
}

impl Clause {
    pub fn of(member: &Member<'_>) -> Self {
        if member.is_measure() {
            Clause::Having
        } else {
            Clause::Where
        }
    }
}

/// The canonical form of a query request.
///
/// Every member reference is resolved, every `dateRange` is an absolute
/// interval and every filter is a built predicate. It borrows from the
/// registry it was normalized against.
#[derive(Debug, Clone)]
pub struct NormalizedQuery<'a> {
    pub measures: Vec<Member<'a>>,
    pub dimensions: Vec<Member<'a>>,
    pub time_dimensions: Vec<NormalizedTimeDimension<'a>>,
    /// Dimension predicates, ANDed into WHERE
    pub where_filters: Vec<Expr>,
    /// Measure predicates, ANDed into HAVING
    pub having_filters: Vec<Expr>,
    /// Members referenced only by filters still need their cubes joined
    pub filter_members: Vec<Member<'a>>,
    /// Explicit ordering over output columns, empty when none was requested
    pub order: Vec<SortKey>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl<'a> NormalizedQuery<'a> {
    /// Every member the plan has to reach, in query order
    pub fn members(&self) -> impl Iterator<Item = &Member<'a>> {
        self.measures
            .iter()
            .chain(self.dimensions.iter())
            .chain(self.time_dimensions.iter().map(|td| &td.member))
            .chain(self.filter_members.iter())
    }

    /// Output column names: dimensions, grouped time dimensions, measures
    pub fn output_aliases(&self) -> Vec<String> {
        self.dimensions
            .iter()
            .map(|d| d.path())
            .chain(self.time_dimensions.iter().filter_map(|td| td.alias()))
            .chain(self.measures.iter().map(|m| m.path()))
            .collect()
    }
}
