pub mod optimise;
pub mod plot;
pub mod report;
pub mod results;
pub mod time_index;
pub mod topology;

pub use optimise::{MetaResults, SolveError, SolverKind, solve};
pub use results::{Metrics, Results, extract_metrics, node_view};
pub use topology::{EnergySystem, build_energy_system};
