use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::system::optimise::MetaResults;
use crate::system::results::{
    Metrics, PV_INVEST, Results, STORAGE_CONTENT, STORAGE_INVEST, node_view, scalar_name,
};
use crate::system::time_index::TimeIndex;
use crate::system::topology::{ELECTRICITY_BUS, EnergySystem};

pub const SEQUENCES_FILE: &str = "sequences.csv";
pub const SCALARS_FILE: &str = "scalars.csv";
pub const DEFAULT_GRAPH_FILE: &str = "energy_system.dot";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to write {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ReportError + '_ {
    move |source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn csv_error(path: &Path) -> impl FnOnce(csv::Error) -> ReportError + '_ {
    move |source| ReportError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

pub fn print_meta_results(meta: &MetaResults) {
    println!("=== META RESULTS ===");
    println!("Objective: {:.4}", meta.objective);
    println!("Status: {}", meta.status);
    println!("Solver: {}", meta.solver);
    println!("Variables: {}", meta.variables);
    println!("Constraints: {}", meta.constraints);
    println!("Solve time: {:.2?}", meta.duration);
}

fn metric_unit(name: &str) -> &'static str {
    match name {
        STORAGE_INVEST => " GWh",
        PV_INVEST => " MW",
        _ => "",
    }
}

pub fn print_metrics(metrics: &Metrics) {
    println!("=== RESULTS ===");
    for (name, value) in metrics.iter() {
        println!("{}: {:.4}{}", name, value, metric_unit(name));
    }
}

/// Writes the electricity bus flows and the storage content per step to `sequences.csv`
/// and the metrics to `scalars.csv`, both inside `output_dir`
pub fn write_results(
    results: &Results,
    metrics: &Metrics,
    time_index: &TimeIndex,
    output_dir: &Path,
) -> Result<(), ReportError> {
    fs::create_dir_all(output_dir).map_err(io_error(output_dir))?;

    let view = node_view(results, ELECTRICITY_BUS);
    let mut columns: Vec<(String, &[f64])> = view
        .flows()
        .map(|(key, values)| (scalar_name(key, "flow"), values))
        .collect();
    for ((from, to), result) in results.iter() {
        if to.is_none() {
            if let Some(content) = result.sequences.get(STORAGE_CONTENT) {
                columns.push((format!("{}.{}", from, STORAGE_CONTENT), content.as_slice()));
            }
        }
    }

    let sequences_path = output_dir.join(SEQUENCES_FILE);
    let mut writer = csv::Writer::from_path(&sequences_path).map_err(csv_error(&sequences_path))?;
    let header: Vec<&str> = std::iter::once("timestamp")
        .chain(columns.iter().map(|(name, _)| name.as_str()))
        .collect();
    writer
        .write_record(&header)
        .map_err(csv_error(&sequences_path))?;
    for (t, timestamp) in time_index.timestamps().enumerate() {
        let mut record = vec![timestamp.format("%Y-%m-%d %H:%M:%S").to_string()];
        record.extend(
            columns
                .iter()
                .map(|(_, values)| values.get(t).map(f64::to_string).unwrap_or_default()),
        );
        writer
            .write_record(&record)
            .map_err(csv_error(&sequences_path))?;
    }
    writer.flush().map_err(io_error(&sequences_path))?;

    let scalars_path = output_dir.join(SCALARS_FILE);
    let mut writer = csv::Writer::from_path(&scalars_path).map_err(csv_error(&scalars_path))?;
    writer
        .write_record(["metric", "value"])
        .map_err(csv_error(&scalars_path))?;
    for (name, value) in metrics.iter() {
        writer
            .write_record([name.to_string(), value.to_string()])
            .map_err(csv_error(&scalars_path))?;
    }
    writer.flush().map_err(io_error(&scalars_path))?;

    info!("Results written to {}", output_dir.display());
    Ok(())
}

/// Writes the Graphviz rendering of the topology to `file_path`
pub fn write_graph(system: &EnergySystem, file_path: &Path) -> Result<(), ReportError> {
    fs::write(file_path, system.to_dot()).map_err(io_error(file_path))?;
    info!("Energy system graph saved as {}", file_path.display());
    Ok(())
}
