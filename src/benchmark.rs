use std::fmt;

use log::debug;

use crate::planner::JourneyPlanner;
use crate::profiler::Profiler;
use crate::query::Query;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum BenchmarkError {
    #[error("Cannot average over zero queries.")]
    NoQueries,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BenchmarkSummary {
    pub num_queries: usize,
    pub total_journeys: usize,
    pub avg_journeys: f64,
}

impl fmt::Display for BenchmarkSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Avg. journeys: {:.2} ({} journeys over {} queries)", self.avg_journeys, self.total_journeys, self.num_queries)
    }
}

/// Runs every query sequentially through `planner`, then prints the planner's profiler statistics.
pub fn run_benchmark<P: JourneyPlanner>(planner: &mut P, queries: &[Query]) -> Result<BenchmarkSummary, BenchmarkError> {
    if queries.is_empty() {
        return Err(BenchmarkError::NoQueries);
    }

    let mut total_journeys = 0;
    for query in queries {
        planner.run(query);
        let num_journeys = planner.num_journeys();
        debug!("{query}: {num_journeys} journeys");
        total_journeys += num_journeys;
    }
    planner.profiler().print_statistics();

    Ok(BenchmarkSummary {
        num_queries: queries.len(),
        total_journeys,
        avg_journeys: total_journeys as f64 / queries.len() as f64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::test_network::*;
    use crate::raptor::Raptor;

    #[test]
    fn journeys_are_averaged_over_all_queries() {
        let network = walk_or_ride();
        let mut raptor = Raptor::new(&network);
        let queries = [
            Query { source: A, target: C, departure_time: EIGHT_AM },
            Query { source: A, target: D, departure_time: EIGHT_AM },
            Query { source: B, target: C, departure_time: EIGHT_AM },
            Query { source: A, target: A, departure_time: EIGHT_AM },
        ];
        let summary = run_benchmark(&mut raptor, &queries).unwrap();
        assert_eq!(summary, BenchmarkSummary { num_queries: 4, total_journeys: 3, avg_journeys: 0.75 });
        assert_eq!(raptor.profiler().statistics().num_queries, 4);
    }

    #[test]
    fn empty_query_sets_are_rejected() {
        let network = walk_or_ride();
        let mut raptor = Raptor::new(&network);
        assert_eq!(run_benchmark(&mut raptor, &[]), Err(BenchmarkError::NoQueries));
    }
}
