//! Cube, measure, dimension and join definitions

use serde::{Deserialize, Serialize};

use super::tenant::TenantFilter;
use super::types::{Aggregation, ValueKind};

/// A measure definition with aggregation
#[derive(Debug, Clone, Deserialize)]
pub struct Measure {
    pub name: String,
    pub title: Option<String>,
    /// Aggregation function (count, countDistinct, sum, avg, min, max)
    #[serde(rename = "type")]
    pub aggregation: Aggregation,
    /// Source column; may be omitted for `count`
    pub sql: Option<String>,
}

impl Measure {
    pub fn new(name: impl Into<String>, aggregation: Aggregation) -> Self {
        Self {
            name: name.into(),
            title: None,
            aggregation,
            sql: None,
        }
    }

    pub fn with_sql(mut self, column: impl Into<String>) -> Self {
        self.sql = Some(column.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Display title, defaulting to the name
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.name)
    }

    /// Measures always aggregate to numbers
    pub fn value_kind(&self) -> ValueKind {
        ValueKind::Number
    }
}

/// A dimension (groupable/filterable attribute)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dimension {
    pub name: String,
    pub title: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: ValueKind,
    /// Source column. Defaults to the dimension name.
    pub sql: Option<String>,
    #[serde(default)]
    pub primary_key: bool,
}

impl Dimension {
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            title: None,
            kind,
            sql: None,
            primary_key: false,
        }
    }

    pub fn with_sql(mut self, column: impl Into<String>) -> Self {
        self.sql = Some(column.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Get the column name, defaulting to the dimension name if not specified
    pub fn column_name(&self) -> &str {
        self.sql.as_deref().unwrap_or(&self.name)
    }

    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.name)
    }

    pub fn is_time(&self) -> bool {
        self.kind == ValueKind::Time
    }
}

/// Cardinality of a declared join
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    ManyToOne,
    OneToMany,
    OneToOne,
}

impl Relationship {
    /// The same relationship seen from the other side
    pub fn reversed(self) -> Self {
        match self {
            Relationship::ManyToOne => Relationship::OneToMany,
            Relationship::OneToMany => Relationship::ManyToOne,
            Relationship::OneToOne => Relationship::OneToOne,
        }
    }
}

/// Join specification from the declaring cube to another cube
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Join {
    /// Target cube name
    pub cube: String,
    pub relationship: Relationship,
    /// Column on the declaring cube
    pub left_key: String,
    /// Column on the target cube
    pub right_key: String,
}

impl Join {
    pub fn new(
        cube: impl Into<String>,
        relationship: Relationship,
        left_key: impl Into<String>,
        right_key: impl Into<String>,
    ) -> Self {
        Self {
            cube: cube.into(),
            relationship,
            left_key: left_key.into(),
            right_key: right_key.into(),
        }
    }
}

/// Marks a cube as an event stream usable as a funnel's primary cube
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventStream {
    /// Dimension identifying the entity (e.g. userId)
    pub binding_key: String,
    /// Time dimension ordering the events
    pub time_dimension: String,
}

/// A named, queryable entity composed of measures and dimensions
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cube {
    pub name: String,
    pub title: Option<String>,
    /// Physical relation (schema.table)
    pub table: String,
    #[serde(default)]
    pub measures: Vec<Measure>,
    #[serde(default)]
    pub dimensions: Vec<Dimension>,
    #[serde(default)]
    pub joins: Vec<Join>,
    /// Row-level tenant isolation
    pub tenant_filter: Option<TenantFilter>,
    pub event_stream: Option<EventStream>,
}

impl Cube {
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: None,
            table: table.into(),
            measures: Vec::new(),
            dimensions: Vec::new(),
            joins: Vec::new(),
            tenant_filter: None,
            event_stream: None,
        }
    }

    pub fn measure(mut self, measure: Measure) -> Self {
        self.measures.push(measure);
        self
    }

    pub fn dimension(mut self, dimension: Dimension) -> Self {
        self.dimensions.push(dimension);
        self
    }

    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    pub fn tenant_filter(mut self, filter: TenantFilter) -> Self {
        self.tenant_filter = Some(filter);
        self
    }

    pub fn event_stream(
        mut self,
        binding_key: impl Into<String>,
        time_dimension: impl Into<String>,
    ) -> Self {
        self.event_stream = Some(EventStream {
            binding_key: binding_key.into(),
            time_dimension: time_dimension.into(),
        });
        self
    }

    /// Get a measure by name
    pub fn get_measure(&self, name: &str) -> Option<&Measure> {
        self.measures.iter().find(|m| m.name == name)
    }

    /// Get a dimension by name
    pub fn get_dimension(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.name == name)
    }

    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.name)
    }

    /// All member names, measures first
    pub fn member_names(&self) -> Vec<&str> {
        self.measures
            .iter()
            .map(|m| m.name.as_str())
            .chain(self.dimensions.iter().map(|d| d.name.as_str()))
            .collect()
    }
}
