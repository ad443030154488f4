//! Funnel descriptor

use serde::{Deserialize, Serialize};

use super::filter::MemberFilter;
use super::request::DateRangeExpr;

/// Request envelope: `{ "funnel": { ... } }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunnelRequest {
    pub funnel: FunnelSpec,
}

/// An ordered sequence of event-matching steps over a binding key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelSpec {
    /// Member identifying the entity that moves through the funnel (e.g. a user id)
    pub binding_key: String,
    /// Time member used to order events
    pub time_dimension: String,
    pub steps: Vec<FunnelStepSpec>,
    #[serde(default)]
    pub include_time_metrics: bool,
    /// ISO-8601 duration bounding the whole funnel, measured from step 0
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_time_window: Option<String>,
    /// Optional bound on the events considered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRangeExpr>,
}

/// One funnel step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelStepSpec {
    pub name: String,
    pub filter: MemberFilter,
    /// ISO-8601 duration: max gap from the previous step's matched event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_to_convert: Option<String>,
}
