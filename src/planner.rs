//! The narrow interface the benchmark and the savings analysis need from an engine.

use crate::journey::{ArrivalLabel, WalkingParetoLabel};
use crate::profiler::Profiler;
use crate::query::Query;

pub trait JourneyPlanner {
    type Profiler: Profiler;

    /// Answers one query. Any state left over from the previous query is reset first.
    fn run(&mut self, query: &Query);

    /// Number of journeys found by the last `run`. Zero means the target was unreachable.
    fn num_journeys(&self) -> usize;

    fn profiler(&self) -> &Self::Profiler;
}

/// A 3-criteria search restricted by slack around its own 2-criteria anchor set.
pub trait BoundedParetoPlanner {
    fn run_bounded(&mut self, query: &Query, arrival_slack: f64, trip_slack: f64);

    /// Full Pareto set of the last query, unordered.
    fn results(&self) -> &[WalkingParetoLabel];

    /// Anchor Pareto set of the last query, unordered.
    fn anchor_labels(&self) -> &[ArrivalLabel];
}
