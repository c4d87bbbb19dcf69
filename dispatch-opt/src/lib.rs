pub mod cli;
pub mod config;
pub mod general;
pub mod log;
pub mod system;

// Re-export the pipeline stages
pub use config::SystemConfig;
pub use general::input_data::load_input_data;
pub use system::optimise::solve;
pub use system::results::extract_metrics;
pub use system::topology::build_energy_system;
