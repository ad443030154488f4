//! Funnel compilation: descriptor -> definition + event-selection plan

use chrono::{DateTime, Duration, Utc};

use super::duration::parse_duration;
use super::error::FunnelError;
use crate::daterange::DateRangeResolver;
use crate::plan::{
    Expr, FunnelPlan, Literal, SortDirection, SortKey, TableRef, BINDING_KEY_COLUMN,
    EVENT_TIME_COLUMN,
};
use crate::planner::plan_joins;
use crate::predicate::{between, PredicateBuilder};
use crate::query::FunnelSpec;
use crate::semantic_model::{Cube, Member, Registry};

/// One validated funnel step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunnelStep {
    pub name: String,
    /// Max gap from the previous step's matched event
    pub time_to_convert: Option<Duration>,
}

/// A validated funnel, ready to sequence events
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunnelDefinition {
    /// `Cube.member` path of the entity key
    pub binding_key: String,
    /// `Cube.member` path of the event time
    pub time_dimension: String,
    pub steps: Vec<FunnelStep>,
    pub include_time_metrics: bool,
    /// Max gap between step 0 and any later event
    pub global_time_window: Option<Duration>,
}

impl FunnelDefinition {
    /// Build a definition without a registry, for sequencing rows fetched
    /// elsewhere. Step 0 may not declare a `time_to_convert`.
    pub fn new(
        binding_key: impl Into<String>,
        time_dimension: impl Into<String>,
        steps: Vec<FunnelStep>,
    ) -> Result<Self, FunnelError> {
        validate_steps(&steps)?;
        Ok(Self {
            binding_key: binding_key.into(),
            time_dimension: time_dimension.into(),
            steps,
            include_time_metrics: false,
            global_time_window: None,
        })
    }

    pub fn with_time_metrics(mut self, include: bool) -> Self {
        self.include_time_metrics = include;
        self
    }

    pub fn with_global_time_window(mut self, window: Duration) -> Self {
        self.global_time_window = Some(window);
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl FunnelStep {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            time_to_convert: None,
        }
    }

    pub fn with_time_to_convert(mut self, limit: Duration) -> Self {
        self.time_to_convert = Some(limit);
        self
    }
}

fn validate_steps(steps: &[FunnelStep]) -> Result<(), FunnelError> {
    let first = steps.first().ok_or(FunnelError::NoSteps)?;
    if first.time_to_convert.is_some() {
        return Err(FunnelError::StepOrder(first.name.clone()));
    }
    Ok(())
}

/// A compiled funnel: the definition the engine sequences with, and the
/// plan that selects its candidate events
#[derive(Debug, Clone)]
pub struct CompiledFunnel {
    pub definition: FunnelDefinition,
    pub plan: FunnelPlan,
}

/// Compile a funnel descriptor against the registry.
///
/// The binding key's cube is the primary cube and must declare event-stream
/// metadata whose binding key and time dimension match the descriptor. The
/// returned plan is unsecured.
pub fn compile_funnel(
    spec: &FunnelSpec,
    registry: &Registry,
    resolver: &DateRangeResolver,
    now: DateTime<Utc>,
) -> Result<CompiledFunnel, FunnelError> {
    // 1. Steps and durations
    let steps = spec
        .steps
        .iter()
        .map(|s| {
            Ok(FunnelStep {
                name: s.name.clone(),
                time_to_convert: s.time_to_convert.as_deref().map(parse_duration).transpose()?,
            })
        })
        .collect::<Result<Vec<_>, FunnelError>>()?;
    validate_steps(&steps)?;
    let global_time_window = spec
        .global_time_window
        .as_deref()
        .map(parse_duration)
        .transpose()?;

    // 2. Primary cube must be an event stream
    let binding = lookup(registry, &spec.binding_key)?;
    let time = lookup(registry, &spec.time_dimension)?;
    let cube = binding.cube;
    check_event_stream(cube, &binding, &time)?;

    // 3. One predicate per step
    let builder = PredicateBuilder::new(resolver, now);
    let mut step_predicates = Vec::with_capacity(spec.steps.len());
    let mut step_cubes: Vec<&str> = Vec::new();
    for step in &spec.steps {
        let member = lookup(registry, &step.filter.member)?;
        if member.is_measure() {
            return Err(FunnelError::MeasureStep {
                step: step.name.clone(),
                member: step.filter.member.clone(),
            });
        }
        let predicate = builder
            .build(&step.filter, &member)
            .map_err(|source| FunnelError::Filter {
                step: step.name.clone(),
                source,
            })?;
        step_predicates.push(predicate);
        step_cubes.push(&member.cube.name);
    }

    // 4. Optional bound on the events considered
    let time_bound = match &spec.date_range {
        Some(range) if !range.is_empty() => Some(between(
            time.expr(),
            resolver.resolve(range, now).map_err(FunnelError::DateRange)?,
        )),
        _ => None,
    };

    let joins = plan_joins(registry, &cube.name, step_cubes)?;

    // First matching step wins for an event that satisfies several
    let step_index = Expr::Case {
        when_then: step_predicates
            .iter()
            .enumerate()
            .map(|(i, p)| (p.clone(), Expr::Literal(Literal::Int(i as i64))))
            .collect(),
        else_result: None,
    };
    let filter = Expr::and_all(
        Expr::or_all(step_predicates.iter().cloned())
            .into_iter()
            .chain(time_bound),
    );

    let plan = FunnelPlan {
        from: TableRef {
            cube: cube.name.clone(),
            table: cube.table.clone(),
        },
        joins,
        binding_key: binding.expr(),
        event_time: time.expr(),
        step_index,
        step_predicates,
        filter,
        order_by: vec![
            SortKey {
                column: BINDING_KEY_COLUMN.to_string(),
                direction: SortDirection::Ascending,
            },
            SortKey {
                column: EVENT_TIME_COLUMN.to_string(),
                direction: SortDirection::Ascending,
            },
        ],
        tenant_predicates: Vec::new(),
    };

    tracing::debug!(
        cube = %cube.name,
        steps = steps.len(),
        joins = plan.joins.len(),
        "Compiled funnel"
    );

    Ok(CompiledFunnel {
        definition: FunnelDefinition {
            binding_key: spec.binding_key.clone(),
            time_dimension: spec.time_dimension.clone(),
            steps,
            include_time_metrics: spec.include_time_metrics,
            global_time_window,
        },
        plan,
    })
}

fn lookup<'a>(registry: &'a Registry, path: &str) -> Result<Member<'a>, FunnelError> {
    registry
        .member(path)
        .ok_or_else(|| FunnelError::UnknownMember(path.to_string()))
}

fn check_event_stream(cube: &Cube, binding: &Member<'_>, time: &Member<'_>) -> Result<(), FunnelError> {
    let not_supported = |reason: String| FunnelError::NotSupported {
        cube: cube.name.clone(),
        reason,
    };
    let stream = cube
        .event_stream
        .as_ref()
        .ok_or_else(|| not_supported("no event stream metadata declared".to_string()))?;

    if binding.is_measure() || binding.name() != stream.binding_key {
        return Err(not_supported(format!(
            "binding key must be {}.{}",
            cube.name, stream.binding_key
        )));
    }
    if time.cube.name != cube.name || time.name() != stream.time_dimension {
        return Err(not_supported(format!(
            "time dimension must be {}.{}",
            cube.name, stream.time_dimension
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{DateRangeExpr, FilterOperator, FunnelStepSpec, MemberFilter};
    use crate::semantic_model::{Aggregation, Dimension, Join, Measure, Relationship, ValueKind};
    use chrono::TimeZone;

    fn registry() -> Registry {
        Registry::builder()
            .cube(
                Cube::new("events", "analytics.events")
                    .measure(Measure::new("count", Aggregation::Count))
                    .dimension(Dimension::new("userId", ValueKind::String).with_sql("user_id"))
                    .dimension(Dimension::new("name", ValueKind::String).with_sql("event_name"))
                    .dimension(Dimension::new("timestamp", ValueKind::Time).with_sql("ts"))
                    .join(Join::new("users", Relationship::ManyToOne, "user_id", "id"))
                    .event_stream("userId", "timestamp"),
            )
            .cube(
                Cube::new("users", "public.users")
                    .dimension(Dimension::new("id", ValueKind::String).primary_key())
                    .dimension(Dimension::new("plan", ValueKind::String))
                    .dimension(Dimension::new("signedUpAt", ValueKind::Time).with_sql("signed_up_at")),
            )
            .build()
            .unwrap()
    }

    fn step(name: &str, event: &str) -> FunnelStepSpec {
        FunnelStepSpec {
            name: name.into(),
            filter: MemberFilter::new("events.name", FilterOperator::Equals).with_values([event]),
            time_to_convert: None,
        }
    }

    fn spec(steps: Vec<FunnelStepSpec>) -> FunnelSpec {
        FunnelSpec {
            binding_key: "events.userId".into(),
            time_dimension: "events.timestamp".into(),
            steps,
            include_time_metrics: false,
            global_time_window: None,
            date_range: None,
        }
    }

    fn compile(spec: &FunnelSpec) -> Result<CompiledFunnel, FunnelError> {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        compile_funnel(spec, &registry(), &DateRangeResolver::default(), now)
    }

    #[test]
    fn test_compiles_plan_and_definition() {
        let mut purchase = step("Purchase", "purchase");
        purchase.time_to_convert = Some("P7D".into());
        let mut spec = spec(vec![step("SignUp", "signup"), purchase]);
        spec.date_range = Some(DateRangeExpr::from("last 30 days"));

        let compiled = compile(&spec).unwrap();
        assert_eq!(compiled.definition.steps[1].time_to_convert, Some(Duration::days(7)));
        assert_eq!(compiled.plan.from.cube, "events");
        assert_eq!(compiled.plan.step_predicates.len(), 2);
        assert_eq!(compiled.plan.binding_key, Expr::column("events", "user_id"));
        assert!(compiled.plan.joins.is_empty());
        match compiled.plan.filter.unwrap() {
            Expr::And(parts) => {
                assert!(matches!(parts[0], Expr::Or(ref steps) if steps.len() == 2));
                assert!(matches!(parts[1], Expr::Between { .. }));
            }
            other => panic!("expected AND, got {:?}", other),
        }
    }

    #[test]
    fn test_step_on_joined_cube_adds_join() {
        let spec = spec(vec![
            step("SignUp", "signup"),
            FunnelStepSpec {
                name: "Paid".into(),
                filter: MemberFilter::new("users.plan", FilterOperator::Equals).with_values(["pro"]),
                time_to_convert: None,
            },
        ]);
        let compiled = compile(&spec).unwrap();
        assert_eq!(compiled.plan.joins.len(), 1);
        assert_eq!(compiled.plan.joins[0].cube, "users");
    }

    #[test]
    fn test_first_step_time_to_convert_is_rejected() {
        let mut first = step("SignUp", "signup");
        first.time_to_convert = Some("P1D".into());
        assert_eq!(
            compile(&spec(vec![first])).unwrap_err(),
            FunnelError::StepOrder("SignUp".into())
        );
    }

    #[test]
    fn test_non_event_cube_is_rejected() {
        let mut spec = spec(vec![step("SignUp", "signup")]);
        spec.binding_key = "users.id".into();
        spec.time_dimension = "users.signedUpAt".into();
        assert!(matches!(compile(&spec), Err(FunnelError::NotSupported { .. })));
    }

    #[test]
    fn test_empty_steps_and_bad_durations() {
        assert_eq!(compile(&spec(Vec::new())).unwrap_err(), FunnelError::NoSteps);

        let mut spec = spec(vec![step("SignUp", "signup")]);
        spec.global_time_window = Some("30 days".into());
        assert!(matches!(compile(&spec), Err(FunnelError::InvalidDuration { .. })));
    }

    #[test]
    fn test_measure_step_is_rejected() {
        let spec = spec(vec![FunnelStepSpec {
            name: "Busy".into(),
            filter: MemberFilter::new("events.count", FilterOperator::Gt).with_values([3]),
            time_to_convert: None,
        }]);
        assert!(matches!(compile(&spec), Err(FunnelError::MeasureStep { .. })));
    }
}
