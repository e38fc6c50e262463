pub mod network;

pub use network::{Network, NetworkBuilder, NetworkError};

pub mod journey;

pub use journey::{ArrivalLabel, WalkingParetoLabel};

pub mod profiler;

pub use profiler::{AggregateProfiler, Metric, NoProfiler, Phase, Profiler};

pub mod query;

pub use query::{generate_random_queries, Query};

pub mod planner;

pub use planner::{BoundedParetoPlanner, JourneyPlanner};

pub mod raptor;

pub use raptor::Raptor;

pub mod multicriteria;

pub use multicriteria::{BoundedMcRaptor, McRaptor};

pub mod csa;

pub use csa::Csa;

pub mod benchmark;

pub use benchmark::{run_benchmark, BenchmarkSummary};

pub mod savings;

pub use savings::{SavingsAnalysis, SavingsConfig, SavingsSample};

pub mod report;

pub use report::ReportWriter;

pub mod utils;
