use std::time::{Duration, Instant};

/// Counters an engine reports while answering a query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Metric {
    Rounds,
    RoutesScanned,
    LabelsCreated,
    FootpathsRelaxed,
    ConnectionsScanned,
}

impl Metric {
    pub const COUNT: usize = 5;
    pub const ALL: [Metric; Metric::COUNT] = [
        Metric::Rounds,
        Metric::RoutesScanned,
        Metric::LabelsCreated,
        Metric::FootpathsRelaxed,
        Metric::ConnectionsScanned,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Metric::Rounds => "Rounds",
            Metric::RoutesScanned => "Routes scanned",
            Metric::LabelsCreated => "Labels created",
            Metric::FootpathsRelaxed => "Footpaths relaxed",
            Metric::ConnectionsScanned => "Connections scanned",
        }
    }
}

/// Stages of a query that are timed separately.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    InitialTransfers,
    CollectRoutes,
    ScanRoutes,
    IntermediateTransfers,
    ScanConnections,
}

impl Phase {
    pub const COUNT: usize = 5;
    pub const ALL: [Phase; Phase::COUNT] = [
        Phase::InitialTransfers,
        Phase::CollectRoutes,
        Phase::ScanRoutes,
        Phase::IntermediateTransfers,
        Phase::ScanConnections,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Phase::InitialTransfers => "Initial transfers",
            Phase::CollectRoutes => "Collect routes",
            Phase::ScanRoutes => "Scan routes",
            Phase::IntermediateTransfers => "Intermediate transfers",
            Phase::ScanConnections => "Scan connections",
        }
    }
}

pub trait Profiler {
    fn start_query(&mut self);
    fn done_query(&mut self);
    fn start_phase(&mut self);
    fn done_phase(&mut self, phase: Phase);
    fn count_many(&mut self, metric: Metric, amount: u64);
    fn print_statistics(&self);

    fn count(&mut self, metric: Metric) {
        self.count_many(metric, 1);
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoProfiler;

impl Profiler for NoProfiler {
    fn start_query(&mut self) {}
    fn done_query(&mut self) {}
    fn start_phase(&mut self) {}
    fn done_phase(&mut self, _phase: Phase) {}
    fn count_many(&mut self, _metric: Metric, _amount: u64) {}
    fn print_statistics(&self) {}
}

/// Per-query averages over everything an `AggregateProfiler` has seen.
#[derive(Clone, Debug, PartialEq)]
pub struct Statistics {
    pub num_queries: usize,
    pub avg_query_time: Duration,
    pub avg_phase_times: [Duration; Phase::COUNT],
    pub avg_counts: [f64; Metric::COUNT],
}

impl Statistics {
    pub fn avg(&self, metric: Metric) -> f64 {
        self.avg_counts[metric as usize]
    }

    pub fn avg_phase_time(&self, phase: Phase) -> Duration {
        self.avg_phase_times[phase as usize]
    }
}

/// Accumulates timings and counters across all queries of a run.
#[derive(Clone, Debug, Default)]
pub struct AggregateProfiler {
    num_queries: usize,
    total_time: Duration,
    phase_times: [Duration; Phase::COUNT],
    counters: [u64; Metric::COUNT],
    query_start: Option<Instant>,
    phase_start: Option<Instant>,
}

impl AggregateProfiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self, metric: Metric) -> u64 {
        self.counters[metric as usize]
    }

    pub fn statistics(&self) -> Statistics {
        let divisor = self.num_queries.max(1);
        let mut avg_counts = [0.; Metric::COUNT];
        for (avg, &total) in avg_counts.iter_mut().zip(self.counters.iter()) {
            *avg = total as f64 / divisor as f64;
        }
        Statistics {
            num_queries: self.num_queries,
            avg_query_time: self.total_time / divisor as u32,
            avg_phase_times: self.phase_times.map(|time| time / divisor as u32),
            avg_counts,
        }
    }
}

impl Profiler for AggregateProfiler {
    fn start_query(&mut self) {
        self.query_start = Some(Instant::now());
    }

    fn done_query(&mut self) {
        if let Some(start) = self.query_start.take() {
            self.total_time += start.elapsed();
            self.num_queries += 1;
        }
    }

    fn start_phase(&mut self) {
        self.phase_start = Some(Instant::now());
    }

    fn done_phase(&mut self, phase: Phase) {
        if let Some(start) = self.phase_start.take() {
            self.phase_times[phase as usize] += start.elapsed();
        }
    }

    fn count_many(&mut self, metric: Metric, amount: u64) {
        self.counters[metric as usize] += amount;
    }

    fn print_statistics(&self) {
        let statistics = self.statistics();
        println!("Queries: {}", statistics.num_queries);
        for metric in Metric::ALL {
            println!("{}: {:.2}", metric.name(), statistics.avg(metric));
        }
        for phase in Phase::ALL {
            println!("{}: {:?}", phase.name(), statistics.avg_phase_time(phase));
        }
        println!("Avg. query time: {:?}", statistics.avg_query_time);
    }
}
