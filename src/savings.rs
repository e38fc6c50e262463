//! Walking savings of a bounded 3-criteria Pareto set compared to its 2-criteria anchor set.
//!
//! For every query, the least walking among all labels is compared to the least walking among
//! labels that also lie on the anchor frontier. The relative difference is the query's savings.
//! Savings are then counted per threshold, for every combination of arrival and trip slack.

use std::io::Write;

use log::{debug, info};

use crate::journey::{ArrivalLabel, WalkingParetoLabel};
use crate::network::WalkingDistance;
use crate::planner::BoundedParetoPlanner;
use crate::query::Query;
use crate::report::ReportWriter;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("The list of {0} must not be empty.")]
    EmptyGrid(&'static str),
    #[error("Thresholds must be strictly descending, but {previous} is followed by {next}.")]
    UnsortedThresholds { previous: f64, next: f64 },
    #[error("Threshold {0} is outside of [0, 1].")]
    ThresholdOutOfRange(f64),
    #[error("Slack {0} must be a finite value of at least 1.")]
    InvalidSlack(f64),
}

#[derive(thiserror::Error, Debug)]
pub enum SavingsError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Cannot compute savings ratios without any queries.")]
    NoQueries,
    #[error("Cannot convert a histogram without samples to ratios.")]
    NoSamples,
    #[error("Failed to write the savings report: {0}")]
    Io(#[from] std::io::Error),
}

/// The parameter grid of a savings analysis.
#[derive(Clone, Debug, PartialEq)]
pub struct SavingsConfig {
    /// Strictly descending, within `[0, 1]`.
    pub thresholds: Vec<f64>,
    /// One report row each.
    pub arrival_slacks: Vec<f64>,
    /// One group of report columns each.
    pub trip_slacks: Vec<f64>,
}

impl Default for SavingsConfig {
    fn default() -> Self {
        Self {
            thresholds: vec![0.75, 0.5, 0.25],
            arrival_slacks: vec![1., 1.1, 1.2, 1.3, 1.4, 1.5],
            trip_slacks: vec![1., 1.25, 1.5],
        }
    }
}

impl SavingsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.thresholds.is_empty() {
            return Err(ConfigError::EmptyGrid("thresholds"));
        }
        if self.arrival_slacks.is_empty() {
            return Err(ConfigError::EmptyGrid("arrival slacks"));
        }
        if self.trip_slacks.is_empty() {
            return Err(ConfigError::EmptyGrid("trip slacks"));
        }
        if let Some(&threshold) = self.thresholds.iter().find(|threshold| !(0. ..=1.).contains(*threshold)) {
            return Err(ConfigError::ThresholdOutOfRange(threshold));
        }
        if let Some(pair) = self.thresholds.windows(2).find(|pair| pair[1] >= pair[0]) {
            return Err(ConfigError::UnsortedThresholds { previous: pair[0], next: pair[1] });
        }
        if let Some(&slack) = self.arrival_slacks
            .iter()
            .chain(self.trip_slacks.iter())
            .find(|slack| !slack.is_finite() || **slack < 1.)
        {
            return Err(ConfigError::InvalidSlack(slack));
        }
        Ok(())
    }
}

/// Outcome of comparing one query's full Pareto set with its anchor set.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SavingsSample {
    /// No label lies on the anchor frontier, e.g. because the target is unreachable.
    Incomparable,
    /// The best anchor-compatible label does not walk at all, so nothing can be saved.
    AlreadyOptimal,
    /// Relative walking reduction, in `[0, 1]`.
    Ratio(f64),
}

impl SavingsSample {
    pub fn from_distances(best: WalkingDistance, best_anchor: Option<WalkingDistance>) -> Self {
        match best_anchor {
            None => SavingsSample::Incomparable,
            Some(0) => SavingsSample::AlreadyOptimal,
            Some(best_anchor) => {
                // The global minimum can never exceed a minimum over a subset.
                let best = best.min(best_anchor);
                SavingsSample::Ratio((best_anchor - best) as f64 / best_anchor as f64)
            }
        }
    }

    /// The value counted in the histogram. Both degenerate cases count as no savings.
    pub fn value(&self) -> f64 {
        match self {
            SavingsSample::Ratio(ratio) => *ratio,
            SavingsSample::Incomparable | SavingsSample::AlreadyOptimal => 0.,
        }
    }
}

pub fn compute_savings(full_labels: &[WalkingParetoLabel], anchor_labels: &[ArrivalLabel]) -> SavingsSample {
    let best_anchor = full_labels
        .iter()
        .filter(|label| label.is_anchor_label(anchor_labels))
        .map(|label| label.walking_distance)
        .min();
    let best = full_labels.iter().map(|label| label.walking_distance).min().unwrap_or(0);
    SavingsSample::from_distances(best, best_anchor)
}

/// Index of the first threshold the sample reaches, or `None` if it is below all of them.
///
/// Samples below the last threshold are not counted in any bucket.
pub fn classify(sample: f64, thresholds: &[f64]) -> Option<usize> {
    thresholds.iter().position(|&threshold| sample >= threshold)
}

#[derive(Clone, Debug, PartialEq)]
pub struct ThresholdHistogram<'t> {
    thresholds: &'t [f64],
    counts: Vec<usize>,
    num_samples: usize,
}

impl<'t> ThresholdHistogram<'t> {
    pub fn new(thresholds: &'t [f64]) -> Self {
        Self { thresholds, counts: vec![0; thresholds.len()], num_samples: 0 }
    }

    pub fn from_samples(thresholds: &'t [f64], samples: impl IntoIterator<Item = f64>) -> Self {
        let mut histogram = Self::new(thresholds);
        for sample in samples {
            histogram.add(sample);
        }
        histogram
    }

    /// Every sample counts towards the denominator, even when it lands in no bucket.
    pub fn add(&mut self, sample: f64) -> Option<usize> {
        self.num_samples += 1;
        let bucket = classify(sample, self.thresholds)?;
        self.counts[bucket] += 1;
        Some(bucket)
    }

    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    pub fn num_dropped(&self) -> usize {
        self.num_samples - self.counts.iter().sum::<usize>()
    }

    pub fn ratios(&self) -> Result<Vec<f64>, SavingsError> {
        if self.num_samples == 0 {
            return Err(SavingsError::NoSamples);
        }
        Ok(self.counts.iter().map(|&count| count as f64 / self.num_samples as f64).collect())
    }
}

/// Ratios of one report row: one group of `thresholds.len()` ratios per trip slack.
#[derive(Clone, Debug, PartialEq)]
pub struct SavingsRow {
    pub arrival_slack: f64,
    pub ratios: Vec<f64>,
}

pub struct SavingsAnalysis {
    config: SavingsConfig,
}

impl SavingsAnalysis {
    pub fn new(config: SavingsConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Fails with `NoQueries` for an empty query set, so callers can reject it before loading a network.
    pub fn require_queries(num_queries: usize) -> Result<(), SavingsError> {
        if num_queries == 0 {
            return Err(SavingsError::NoQueries);
        }
        Ok(())
    }

    /// Runs all queries for one slack configuration and bins their savings.
    pub fn evaluate<P: BoundedParetoPlanner>(
        &self,
        planner: &mut P,
        queries: &[Query],
        arrival_slack: f64,
        trip_slack: f64,
    ) -> ThresholdHistogram<'_> {
        let mut histogram = ThresholdHistogram::new(&self.config.thresholds);
        let mut num_incomparable = 0;
        for query in queries {
            planner.run_bounded(query, arrival_slack, trip_slack);
            let sample = compute_savings(planner.results(), planner.anchor_labels());
            if sample == SavingsSample::Incomparable {
                num_incomparable += 1;
            }
            histogram.add(sample.value());
        }
        debug!(
            "{num_incomparable} of {} queries had no anchor-compatible journey, {} fell below every threshold.",
            queries.len(),
            histogram.num_dropped()
        );
        histogram
    }

    /// Runs the whole grid, writing each group of ratios to `report` as soon as it is known.
    pub fn run<P: BoundedParetoPlanner, W: Write>(
        &self,
        planner: &mut P,
        queries: &[Query],
        report: &mut ReportWriter<W>,
    ) -> Result<Vec<SavingsRow>, SavingsError> {
        Self::require_queries(queries.len())?;

        report.write_header(&self.config.trip_slacks, &self.config.thresholds)?;
        let mut rows = Vec::with_capacity(self.config.arrival_slacks.len());
        for &arrival_slack in &self.config.arrival_slacks {
            report.begin_row(arrival_slack)?;
            let mut ratios = Vec::with_capacity(self.config.trip_slacks.len() * self.config.thresholds.len());
            for &trip_slack in &self.config.trip_slacks {
                info!("Arrival slack: {arrival_slack}, trip slack: {trip_slack}");
                let group = self.evaluate(planner, queries, arrival_slack, trip_slack).ratios()?;
                report.write_ratios(&group)?;
                ratios.extend(group);
            }
            report.end_row()?;
            rows.push(SavingsRow { arrival_slack, ratios });
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    const THRESHOLDS: [f64; 3] = [0.75, 0.5, 0.25];

    fn full(arrival_time: u32, number_of_trips: u8, walking_distance: WalkingDistance) -> WalkingParetoLabel {
        WalkingParetoLabel { arrival_time, number_of_trips, walking_distance }
    }

    fn anchor(arrival_time: u32, number_of_trips: u8) -> ArrivalLabel {
        ArrivalLabel { arrival_time, number_of_trips }
    }

    #[test]
    fn savings_compare_against_the_best_anchor_compatible_label() {
        let full_labels = [full(100, 1, 10), full(120, 1, 4), full(130, 2, 7)];
        let anchor_labels = [anchor(100, 1)];
        assert_eq!(compute_savings(&full_labels, &anchor_labels), SavingsSample::Ratio(0.6));
    }

    #[test]
    fn ties_pick_the_smallest_distance_among_several_anchor_labels() {
        let full_labels = [full(100, 2, 8), full(110, 1, 8), full(120, 1, 2)];
        let anchor_labels = [anchor(100, 2), anchor(110, 1)];
        assert_eq!(compute_savings(&full_labels, &anchor_labels), SavingsSample::Ratio(0.75));
    }

    #[test]
    fn missing_anchor_labels_are_incomparable() {
        let full_labels = [full(100, 1, 10), full(120, 1, 4)];
        let sample = compute_savings(&full_labels, &[]);
        assert_eq!(sample, SavingsSample::Incomparable);
        assert_eq!(sample.value(), 0.);
        assert_eq!(compute_savings(&[], &[]), SavingsSample::Incomparable);
        // Anchors that no full label sits on are just as incomparable.
        assert_eq!(compute_savings(&full_labels, &[anchor(90, 1)]), SavingsSample::Incomparable);
    }

    #[test]
    fn walking_free_anchor_labels_are_already_optimal() {
        let sample = compute_savings(&[full(100, 1, 0), full(90, 2, 30)], &[anchor(100, 1)]);
        assert_eq!(sample, SavingsSample::AlreadyOptimal);
        assert_eq!(sample.value(), 0.);
    }

    #[test]
    fn samples_stay_within_unit_interval() {
        fastrand::seed(7);
        for _ in 0..200 {
            let full_labels: Vec<_> = (0..fastrand::usize(0..6))
                .map(|_| full(fastrand::u32(0..10), fastrand::u8(0..3), fastrand::u32(0..50)))
                .collect();
            let anchor_labels: Vec<_> = (0..fastrand::usize(0..3))
                .map(|_| anchor(fastrand::u32(0..10), fastrand::u8(0..3)))
                .collect();
            let value = compute_savings(&full_labels, &anchor_labels).value();
            assert!((0. ..=1.).contains(&value), "{value}");
        }
    }

    #[test]
    fn samples_below_the_last_threshold_are_dropped() {
        assert_eq!(classify(0.9, &THRESHOLDS), Some(0));
        assert_eq!(classify(0.75, &THRESHOLDS), Some(0));
        assert_eq!(classify(0.6, &THRESHOLDS), Some(1));
        assert_eq!(classify(0.1, &THRESHOLDS), None);

        let histogram = ThresholdHistogram::from_samples(&THRESHOLDS, [0.9, 0.6, 0.1]);
        assert_eq!(histogram.counts(), &[1, 1, 0]);
        assert_eq!(histogram.counts().iter().sum::<usize>(), 2);
        assert_eq!(histogram.num_samples(), 3);
        assert_eq!(histogram.num_dropped(), 1);
    }

    #[test]
    fn sample_order_does_not_matter() {
        let ascending = ThresholdHistogram::from_samples(&THRESHOLDS, [0., 0.3, 0.5, 0.8, 1.]);
        let descending = ThresholdHistogram::from_samples(&THRESHOLDS, [1., 0.8, 0.5, 0.3, 0.]);
        assert_eq!(ascending.counts(), descending.counts());
        assert_eq!(ascending.counts(), &[2, 1, 1]);
    }

    #[test]
    fn literal_distance_pairs_reduce_to_expected_ratios() {
        let pairs = [(2, Some(10)), (0, Some(0)), (5, Some(5)), (3, Some(6)), (8, Some(8))];
        let samples: Vec<f64> = pairs
            .iter()
            .map(|&(best, best_anchor)| SavingsSample::from_distances(best, best_anchor).value())
            .collect();
        assert_eq!(samples, vec![0.8, 0., 0., 0.5, 0.]);

        let histogram = ThresholdHistogram::from_samples(&THRESHOLDS, samples);
        assert_eq!(histogram.counts(), &[1, 1, 0]);
        let ratios = histogram.ratios().unwrap();
        let expected = [0.2, 0.2, 0.0];
        for (ratio, expected) in ratios.iter().zip(expected) {
            assert!((ratio - expected).abs() < 1e-12, "{ratio} != {expected}");
        }
    }

    // Answers query `i` with the i-th fixed set of labels, whatever the slacks.
    struct FixedPlanner {
        answers: Vec<(Vec<WalkingParetoLabel>, Vec<ArrivalLabel>)>,
        current: usize,
        slacks_seen: Vec<(f64, f64)>,
    }

    impl BoundedParetoPlanner for FixedPlanner {
        fn run_bounded(&mut self, query: &Query, arrival_slack: f64, trip_slack: f64) {
            self.current = query.source as usize;
            self.slacks_seen.push((arrival_slack, trip_slack));
        }

        fn results(&self) -> &[WalkingParetoLabel] {
            &self.answers[self.current].0
        }

        fn anchor_labels(&self) -> &[ArrivalLabel] {
            &self.answers[self.current].1
        }
    }

    // (best, best anchor) walking distances of (2, 10), (0, 0), (5, 5), (3, 6) and (8, 8).
    fn fixed_planner() -> FixedPlanner {
        let answers = vec![
            (vec![full(100, 1, 10), full(120, 1, 2)], vec![anchor(100, 1)]),
            (vec![full(100, 1, 0)], vec![anchor(100, 1)]),
            (vec![full(100, 1, 5)], vec![anchor(100, 1)]),
            (vec![full(100, 1, 6), full(130, 2, 3)], vec![anchor(100, 1)]),
            (vec![full(90, 2, 8), full(100, 1, 8)], vec![anchor(90, 2), anchor(100, 1)]),
        ];
        FixedPlanner { answers, current: 0, slacks_seen: Vec::new() }
    }

    fn fixed_queries() -> Vec<Query> {
        (0..5).map(|source| Query { source, target: 9, departure_time: 0 }).collect()
    }

    #[test]
    fn single_configuration_is_reported_end_to_end() {
        let config = SavingsConfig { thresholds: THRESHOLDS.to_vec(), arrival_slacks: vec![1.2], trip_slacks: vec![1.25] };
        let analysis = SavingsAnalysis::new(config).unwrap();
        let mut planner = fixed_planner();
        let mut report = ReportWriter::new(Vec::new());

        let rows = analysis.run(&mut planner, &fixed_queries(), &mut report).unwrap();
        assert_eq!(rows, vec![SavingsRow { arrival_slack: 1.2, ratios: vec![0.2, 0.2, 0.] }]);
        assert_eq!(planner.slacks_seen, vec![(1.2, 1.25); 5]);

        let text = String::from_utf8(report.into_inner().unwrap()).unwrap();
        assert_eq!(
            text,
            "ArrivalSlack\tTripSlack25Savings75\tTripSlack25Savings50\tTripSlack25Savings25\n1.2\t0.2\t0.2\t0\n"
        );
    }

    #[test]
    fn report_has_one_row_per_arrival_slack() {
        let config = SavingsConfig {
            thresholds: THRESHOLDS.to_vec(),
            arrival_slacks: vec![1., 1.5],
            trip_slacks: vec![1., 1.25],
        };
        let analysis = SavingsAnalysis::new(config).unwrap();
        let mut planner = fixed_planner();
        let mut report = ReportWriter::new(Vec::new());

        let rows = analysis.run(&mut planner, &fixed_queries(), &mut report).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|row| row.ratios.len() == 2 * THRESHOLDS.len()));
        assert_eq!(planner.slacks_seen.len(), 2 * 2 * 5);

        let text = String::from_utf8(report.into_inner().unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 1 + 2);
        assert!(lines.iter().all(|line| line.split('\t').count() == 1 + 2 * THRESHOLDS.len()));
        assert!(lines[1].starts_with("1\t"));
        assert!(lines[2].starts_with("1.5\t"));
    }

    #[test]
    fn running_without_queries_fails_before_writing() {
        let analysis = SavingsAnalysis::new(SavingsConfig::default()).unwrap();
        let mut planner = fixed_planner();
        let mut report = ReportWriter::new(Vec::new());
        assert!(matches!(analysis.run(&mut planner, &[], &mut report), Err(SavingsError::NoQueries)));
        assert!(planner.slacks_seen.is_empty());
        assert!(report.into_inner().unwrap().is_empty());
    }

    #[test]
    fn query_count_is_checked_up_front() {
        assert!(matches!(SavingsAnalysis::require_queries(0), Err(SavingsError::NoQueries)));
        assert!(SavingsAnalysis::require_queries(1).is_ok());
    }

    // Counts bytes passed through and records that count at every flush.
    struct FlushRecorder {
        written: usize,
        flushes: Rc<RefCell<Vec<usize>>>,
    }

    impl Write for FlushRecorder {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.written += buf.len();
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushes.borrow_mut().push(self.written);
            Ok(())
        }
    }

    #[test]
    fn report_is_flushed_after_every_ratio_and_row() {
        let config = SavingsConfig { thresholds: THRESHOLDS.to_vec(), arrival_slacks: vec![1.2], trip_slacks: vec![1.25] };
        let analysis = SavingsAnalysis::new(config).unwrap();
        let mut planner = fixed_planner();
        let flushes = Rc::new(RefCell::new(Vec::new()));
        let mut report = ReportWriter::new(FlushRecorder { written: 0, flushes: Rc::clone(&flushes) });

        analysis.run(&mut planner, &fixed_queries(), &mut report).unwrap();

        let header = "ArrivalSlack\tTripSlack25Savings75\tTripSlack25Savings50\tTripSlack25Savings25\n";
        let expected: Vec<usize> = ["", "1.2\t0.2", "1.2\t0.2\t0.2", "1.2\t0.2\t0.2\t0", "1.2\t0.2\t0.2\t0\n"]
            .iter()
            .map(|row| header.len() + row.len())
            .collect();
        assert_eq!(*flushes.borrow(), expected);
    }

    #[test]
    fn empty_histograms_have_no_ratios() {
        assert!(matches!(ThresholdHistogram::new(&THRESHOLDS).ratios(), Err(SavingsError::NoSamples)));
    }

    #[test]
    fn invalid_grids_are_rejected() {
        assert_eq!(SavingsConfig::default().validate(), Ok(()));

        let config = |thresholds: Vec<f64>, slacks: Vec<f64>| SavingsConfig {
            thresholds,
            arrival_slacks: slacks.clone(),
            trip_slacks: slacks,
        };
        assert_eq!(config(vec![], vec![1.]).validate(), Err(ConfigError::EmptyGrid("thresholds")));
        assert_eq!(config(vec![0.5], vec![]).validate(), Err(ConfigError::EmptyGrid("arrival slacks")));
        assert_eq!(
            config(vec![0.25, 0.5], vec![1.]).validate(),
            Err(ConfigError::UnsortedThresholds { previous: 0.25, next: 0.5 })
        );
        assert_eq!(
            config(vec![0.5, 0.5], vec![1.]).validate(),
            Err(ConfigError::UnsortedThresholds { previous: 0.5, next: 0.5 })
        );
        assert_eq!(config(vec![1.5], vec![1.]).validate(), Err(ConfigError::ThresholdOutOfRange(1.5)));
        assert_eq!(config(vec![0.5], vec![0.9]).validate(), Err(ConfigError::InvalidSlack(0.9)));
        assert!(config(vec![0.5], vec![f64::NAN]).validate().is_err());
        assert!(SavingsAnalysis::new(config(vec![0.5], vec![f64::INFINITY])).is_err());
    }
}
