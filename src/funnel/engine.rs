//! Per-entity funnel sequencing
//!
//! Each binding-key value moves through an explicit state machine driven by
//! its own events in time order. Entities are independent, so disjoint
//! partitions can be sequenced separately and their tallies merged.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;

use super::definition::FunnelDefinition;
use super::error::FunnelError;

/// One candidate event row: `(binding_key, event_time, step_index)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunnelEvent {
    pub key: String,
    pub time: DateTime<Utc>,
    /// Index of the first step whose filter the event matches
    pub step: usize,
}

impl FunnelEvent {
    pub fn new(key: impl Into<String>, time: DateTime<Utc>, step: usize) -> Self {
        Self {
            key: key.into(),
            time,
            step,
        }
    }
}

/// Where an entity stands in the funnel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    /// Waiting for an event matching step `i`
    Awaiting(usize),
    /// Matched every step
    Completed,
    /// A time window was exceeded; no further progress is possible
    Expired,
}

/// State plus the time each step was matched at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityProgress {
    pub state: StepState,
    /// `matched[i]` is the event time that satisfied step `i`
    pub matched: Vec<DateTime<Utc>>,
}

impl Default for EntityProgress {
    fn default() -> Self {
        Self {
            state: StepState::Awaiting(0),
            matched: Vec::new(),
        }
    }
}

impl EntityProgress {
    /// Gap between step `i - 1` and step `i`, for `i >= 1`
    pub fn gap(&self, i: usize) -> Option<Duration> {
        let prev = self.matched.get(i.checked_sub(1)?)?;
        self.matched.get(i).map(|t| *t - *prev)
    }
}

/// Apply one event to an entity.
///
/// Pure: the outcome depends only on the definition, the previous progress
/// and the event.
pub fn advance(
    definition: &FunnelDefinition,
    progress: EntityProgress,
    time: DateTime<Utc>,
    step: usize,
) -> EntityProgress {
    let StepState::Awaiting(next) = progress.state else {
        return progress;
    };

    if let (Some(window), Some(first)) = (definition.global_time_window, progress.matched.first()) {
        if time - *first > window {
            return EntityProgress {
                state: StepState::Expired,
                ..progress
            };
        }
    }

    // Repeats of passed steps and events for later steps do not move the entity
    if step != next {
        return progress;
    }
    if progress.matched.last().is_some_and(|last| time < *last) {
        return progress;
    }

    if let (Some(limit), Some(prev)) = (
        definition.steps.get(next).and_then(|s| s.time_to_convert),
        progress.matched.last(),
    ) {
        if time - *prev > limit {
            return EntityProgress {
                state: StepState::Expired,
                ..progress
            };
        }
    }

    let mut matched = progress.matched;
    matched.push(time);
    let state = if next + 1 >= definition.steps.len() {
        StepState::Completed
    } else {
        StepState::Awaiting(next + 1)
    };
    EntityProgress { state, matched }
}

/// Sequences events for many entities
#[derive(Debug)]
pub struct FunnelEngine<'d> {
    definition: &'d FunnelDefinition,
    entities: HashMap<String, (EntityProgress, DateTime<Utc>)>,
}

impl<'d> FunnelEngine<'d> {
    pub fn new(definition: &'d FunnelDefinition) -> Self {
        Self {
            definition,
            entities: HashMap::new(),
        }
    }

    /// Feed one event. Each entity's events must arrive in time order;
    /// different entities may interleave.
    pub fn process(&mut self, event: FunnelEvent) -> Result<(), FunnelError> {
        if event.step >= self.definition.steps.len() {
            return Err(FunnelError::StepOutOfRange {
                key: event.key,
                step: event.step,
                steps: self.definition.steps.len(),
            });
        }

        // A rejected row leaves the entity untouched
        if let Some((_, last_seen)) = self.entities.get(&event.key) {
            if event.time < *last_seen {
                return Err(FunnelError::OutOfOrder { key: event.key });
            }
        }

        let (progress, _) = self
            .entities
            .remove(&event.key)
            .unwrap_or_else(|| (EntityProgress::default(), event.time));
        let progress = advance(self.definition, progress, event.time, event.step);
        self.entities.insert(event.key, (progress, event.time));
        Ok(())
    }

    /// Feed every event in order
    pub fn process_all(
        &mut self,
        events: impl IntoIterator<Item = FunnelEvent>,
    ) -> Result<(), FunnelError> {
        events.into_iter().try_for_each(|e| self.process(e))
    }

    pub fn progress(&self, key: &str) -> Option<&EntityProgress> {
        self.entities.get(key).map(|(p, _)| p)
    }

    /// Fold every entity into a mergeable tally
    pub fn tally(&self) -> FunnelTally {
        let mut tally = FunnelTally::new(self.definition.steps.len());
        for (progress, _) in self.entities.values() {
            tally.record(progress, self.definition.include_time_metrics);
        }
        tally
    }

    pub fn finish(self) -> FunnelResult {
        let definition = self.definition;
        self.tally().finish(definition)
    }
}

/// Sequence `events` and aggregate the result in one call
pub fn run_funnel(
    definition: &FunnelDefinition,
    events: impl IntoIterator<Item = FunnelEvent>,
) -> Result<FunnelResult, FunnelError> {
    let mut engine = FunnelEngine::new(definition);
    engine.process_all(events)?;
    Ok(engine.finish())
}

/// Partial funnel counts over a set of entities
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunnelTally {
    /// `reached[i]`: entities that matched step `i`
    reached: Vec<u64>,
    /// `gaps[i]`: time from step `i - 1` to step `i`, per entity
    gaps: Vec<Vec<Duration>>,
}

impl FunnelTally {
    pub fn new(steps: usize) -> Self {
        Self {
            reached: vec![0; steps],
            gaps: vec![Vec::new(); steps],
        }
    }

    pub fn record(&mut self, progress: &EntityProgress, time_metrics: bool) {
        for (i, count) in self.reached.iter_mut().enumerate().take(progress.matched.len()) {
            *count += 1;
            if time_metrics {
                if let Some(gap) = progress.gap(i) {
                    self.gaps[i].push(gap);
                }
            }
        }
    }

    /// Combine tallies built from disjoint entity sets of the same funnel
    pub fn merge(&mut self, other: FunnelTally) {
        if other.reached.len() > self.reached.len() {
            self.reached.resize(other.reached.len(), 0);
            self.gaps.resize(other.gaps.len(), Vec::new());
        }
        for (i, count) in other.reached.into_iter().enumerate() {
            self.reached[i] += count;
        }
        for (i, gaps) in other.gaps.into_iter().enumerate() {
            self.gaps[i].extend(gaps);
        }
    }

    pub fn finish(self, definition: &FunnelDefinition) -> FunnelResult {
        let n = definition.steps.len();
        let reached = |i: usize| self.reached.get(i).copied().unwrap_or(0);

        let steps = definition
            .steps
            .iter()
            .enumerate()
            .map(|(i, step)| {
                let entered = reached(i);
                // finishing the last step is the conversion
                let converted = if i + 1 < n { reached(i + 1) } else { entered };
                let conversion_rate = if entered == 0 {
                    0.0
                } else {
                    converted as f64 / entered as f64
                };
                let time_to_convert = (definition.include_time_metrics && i > 0)
                    .then(|| self.gaps.get(i).and_then(|g| TimeToConvert::from_gaps(g)))
                    .flatten();
                FunnelStepResult {
                    name: step.name.clone(),
                    entered_count: entered,
                    converted_count: converted,
                    conversion_rate,
                    time_to_convert,
                }
            })
            .collect();

        FunnelResult { steps }
    }
}

/// Time-to-convert statistics for a step, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeToConvert {
    pub avg_time_to_convert: f64,
    pub median_time_to_convert: f64,
    pub p90_time_to_convert: f64,
}

impl TimeToConvert {
    fn from_gaps(gaps: &[Duration]) -> Option<Self> {
        if gaps.is_empty() {
            return None;
        }
        let mut seconds: Vec<f64> = gaps
            .iter()
            .map(|d| d.num_milliseconds() as f64 / 1000.0)
            .collect();
        seconds.sort_by(|a, b| a.total_cmp(b));

        let n = seconds.len();
        let avg = seconds.iter().sum::<f64>() / n as f64;
        let median = if n % 2 == 1 {
            seconds[n / 2]
        } else {
            (seconds[n / 2 - 1] + seconds[n / 2]) / 2.0
        };
        // nearest rank
        let rank = ((0.9 * n as f64).ceil() as usize).clamp(1, n);
        let p90 = seconds[rank - 1];

        Some(Self {
            avg_time_to_convert: avg,
            median_time_to_convert: median,
            p90_time_to_convert: p90,
        })
    }
}

/// Counts for one funnel step
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelStepResult {
    pub name: String,
    pub entered_count: u64,
    pub converted_count: u64,
    pub conversion_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_to_convert: Option<TimeToConvert>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunnelResult {
    pub steps: Vec<FunnelStepResult>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::funnel::FunnelStep;
    use chrono::TimeZone;

    fn day(d: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + Duration::days(d)
    }

    fn signup_purchase() -> FunnelDefinition {
        FunnelDefinition::new(
            "events.userId",
            "events.timestamp",
            vec![
                FunnelStep::new("SignUp"),
                FunnelStep::new("Purchase").with_time_to_convert(Duration::days(7)),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_advance_matches_in_order() {
        let def = signup_purchase();
        let p = advance(&def, EntityProgress::default(), day(0), 0);
        assert_eq!(p.state, StepState::Awaiting(1));
        let p = advance(&def, p, day(3), 1);
        assert_eq!(p.state, StepState::Completed);
        assert_eq!(p.gap(1), Some(Duration::days(3)));
    }

    #[test]
    fn test_advance_ignores_out_of_step_events() {
        let def = signup_purchase();
        // purchase before any signup does nothing
        let p = advance(&def, EntityProgress::default(), day(0), 1);
        assert_eq!(p, EntityProgress::default());

        // a second signup does not reset the first
        let p = advance(&def, EntityProgress::default(), day(0), 0);
        let p = advance(&def, p, day(1), 0);
        assert_eq!(p.matched, vec![day(0)]);
    }

    #[test]
    fn test_advance_expires_on_slow_conversion() {
        let def = signup_purchase();
        let p = advance(&def, EntityProgress::default(), day(0), 0);
        let p = advance(&def, p, day(10), 1);
        assert_eq!(p.state, StepState::Expired);
        assert_eq!(p.matched.len(), 1);
        // terminal states absorb everything
        let p = advance(&def, p, day(11), 1);
        assert_eq!(p.state, StepState::Expired);
    }

    #[test]
    fn test_global_window() {
        let def = FunnelDefinition::new(
            "e.k",
            "e.t",
            vec![FunnelStep::new("a"), FunnelStep::new("b"), FunnelStep::new("c")],
        )
        .unwrap()
        .with_global_time_window(Duration::days(5));
        let p = advance(&def, EntityProgress::default(), day(0), 0);
        let p = advance(&def, p, day(2), 1);
        let p = advance(&def, p, day(6), 2);
        assert_eq!(p.state, StepState::Expired);
        assert_eq!(p.matched.len(), 2);
    }

    #[test]
    fn test_signup_purchase_scenario() {
        let def = signup_purchase();
        let result = run_funnel(
            &def,
            vec![
                FunnelEvent::new("A", day(0), 0),
                FunnelEvent::new("A", day(3), 1),
                FunnelEvent::new("B", day(0), 0),
                FunnelEvent::new("B", day(10), 1),
                FunnelEvent::new("C", day(2), 1),
            ],
        )
        .unwrap();

        assert_eq!(result.steps[0].name, "SignUp");
        assert_eq!(result.steps[0].entered_count, 2);
        assert_eq!(result.steps[0].converted_count, 1);
        assert_eq!(result.steps[0].conversion_rate, 0.5);
        assert_eq!(result.steps[1].entered_count, 1);
        assert_eq!(result.steps[1].converted_count, 1);
        assert!(result.steps[1].time_to_convert.is_none());
    }

    #[test]
    fn test_time_metrics() {
        let def = FunnelDefinition::new(
            "e.k",
            "e.t",
            vec![FunnelStep::new("a"), FunnelStep::new("b")],
        )
        .unwrap()
        .with_time_metrics(true);
        let events = (1..=4).flat_map(|i| {
            let key = format!("u{i}");
            [
                FunnelEvent::new(key.clone(), day(0), 0),
                FunnelEvent::new(key, day(i), 1),
            ]
        });
        let result = run_funnel(&def, events).unwrap();

        assert!(result.steps[0].time_to_convert.is_none());
        let metrics = result.steps[1].time_to_convert.unwrap();
        assert_eq!(metrics.avg_time_to_convert, 2.5 * 86_400.0);
        assert_eq!(metrics.median_time_to_convert, 2.5 * 86_400.0);
        assert_eq!(metrics.p90_time_to_convert, 4.0 * 86_400.0);
    }

    #[test]
    fn test_entity_with_no_rows_contributes_nothing() {
        let def = signup_purchase();
        let result = run_funnel(&def, Vec::new()).unwrap();
        assert_eq!(result.steps[0].entered_count, 0);
        assert_eq!(result.steps[0].conversion_rate, 0.0);
    }

    #[test]
    fn test_merge_equals_single_pass() {
        let def = signup_purchase();
        let left = vec![FunnelEvent::new("A", day(0), 0), FunnelEvent::new("A", day(1), 1)];
        let right = vec![FunnelEvent::new("B", day(0), 0)];

        let mut a = FunnelEngine::new(&def);
        a.process_all(left.clone()).unwrap();
        let mut b = FunnelEngine::new(&def);
        b.process_all(right.clone()).unwrap();
        let mut merged = a.tally();
        merged.merge(b.tally());

        let single = run_funnel(&def, left.into_iter().chain(right)).unwrap();
        assert_eq!(merged.finish(&def), single);
    }

    #[test]
    fn test_rejects_bad_events() {
        let def = signup_purchase();
        let mut engine = FunnelEngine::new(&def);
        assert!(matches!(
            engine.process(FunnelEvent::new("A", day(0), 2)),
            Err(FunnelError::StepOutOfRange { step: 2, .. })
        ));
        engine.process(FunnelEvent::new("A", day(5), 0)).unwrap();
        assert!(matches!(
            engine.process(FunnelEvent::new("A", day(1), 1)),
            Err(FunnelError::OutOfOrder { .. })
        ));
    }

    #[test]
    fn test_out_of_order_row_keeps_progress() {
        let def = signup_purchase();
        let mut engine = FunnelEngine::new(&def);
        engine.process(FunnelEvent::new("A", day(5), 0)).unwrap();
        assert!(matches!(
            engine.process(FunnelEvent::new("A", day(1), 1)),
            Err(FunnelError::OutOfOrder { .. })
        ));

        let progress = engine.progress("A").unwrap();
        assert_eq!(progress.state, StepState::Awaiting(1));
        assert_eq!(progress.matched, vec![day(5)]);

        // later rows for the same entity still sequence
        engine.process(FunnelEvent::new("A", day(6), 1)).unwrap();
        let result = engine.finish();
        assert_eq!(result.steps[0].entered_count, 1);
        assert_eq!(result.steps[1].entered_count, 1);
    }
}
