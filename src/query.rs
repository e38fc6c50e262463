use std::fmt;

use crate::network::{StopIndex, Timestamp};
use crate::utils;

/// Fixed so that separate runs, possibly of different engines, answer the same workload.
pub const DEFAULT_SEED: u64 = 42;
pub const SECONDS_PER_DAY: Timestamp = 24 * 60 * 60;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum QueryError {
    #[error("Cannot draw {0} queries from an empty set of stops.")]
    EmptyPopulation(usize),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Query {
    pub source: StopIndex,
    pub target: StopIndex,
    pub departure_time: Timestamp,
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} at {}", self.source, self.target, utils::get_time_str(self.departure_time))
    }
}

/// Draws `query_count` queries with uniformly random stops in `[0, population_size)` and
/// departure times within one day.
///
/// The same arguments always give the same queries. Source and target may coincide.
pub fn generate_random_queries(population_size: usize, query_count: usize, seed: u64) -> Result<Vec<Query>, QueryError> {
    if query_count == 0 {
        return Ok(Vec::new());
    }
    if population_size == 0 {
        return Err(QueryError::EmptyPopulation(query_count));
    }

    let mut rng = fastrand::Rng::with_seed(seed);
    let population = population_size as StopIndex;
    let queries = (0..query_count)
        .map(|_| {
            let source = rng.u32(0..population);
            let target = rng.u32(0..population);
            let departure_time = rng.u32(0..SECONDS_PER_DAY);
            Query { source, target, departure_time }
        })
        .collect();
    Ok(queries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_is_reproducible() {
        let first = generate_random_queries(100, 50, 42).unwrap();
        let second = generate_random_queries(100, 50, 42).unwrap();
        assert_eq!(first.len(), 50);
        assert_eq!(first, second);
        assert_ne!(first, generate_random_queries(100, 50, 43).unwrap());
    }

    #[test]
    fn queries_stay_in_range() {
        let queries = generate_random_queries(7, 1000, DEFAULT_SEED).unwrap();
        assert!(queries.iter().all(|query| query.source < 7 && query.target < 7));
        assert!(queries.iter().all(|query| query.departure_time < SECONDS_PER_DAY));
        // With so few stops, self pairs must show up.
        assert!(queries.iter().any(|query| query.source == query.target));
    }

    #[test]
    fn empty_population_is_rejected() {
        assert_eq!(generate_random_queries(0, 3, DEFAULT_SEED), Err(QueryError::EmptyPopulation(3)));
        assert_eq!(generate_random_queries(0, 0, DEFAULT_SEED), Ok(Vec::new()));
    }
}
