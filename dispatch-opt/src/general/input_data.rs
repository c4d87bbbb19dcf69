use log::{debug, info};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default name of the hourly input series file, looked up in the working directory
pub const DEFAULT_INPUT_FILE: &str = "input_data.csv";

/// Errors raised while reading the hourly input series
#[derive(Debug, Error)]
pub enum InputError {
    #[error("Failed to open input file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("Failed to read record {record} of {path}: {source}")]
    Record {
        path: PathBuf,
        record: usize,
        #[source]
        source: csv::Error,
    },
}

/// One row of the input file. Columns other than `pv` and `demand_el` are ignored.
#[derive(Debug, Deserialize)]
struct InputRow {
    pv: f64,
    demand_el: f64,
}

/// Hourly series read from the input file, in file order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputData {
    /// Normalised PV output per unit of installed capacity
    pub pv: Vec<f64>,
    /// Electricity demand profile, scaled later by the demand's nominal value
    pub demand_el: Vec<f64>,
}

impl InputData {
    /// Number of rows read
    pub fn len(&self) -> usize {
        self.demand_el.len()
    }

    pub fn is_empty(&self) -> bool {
        self.demand_el.is_empty()
    }
}

/// Loads the `pv` and `demand_el` columns of a comma-separated file with a header row.
///
/// The number of rows is not checked against the simulated time index here; a short
/// or long file is reported when the profiles are attached to the energy system.
///
/// # Arguments
/// * `file_path` - Path to the CSV file
pub fn load_input_data(file_path: &Path) -> Result<InputData, InputError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b',')
        .trim(csv::Trim::All)
        .from_path(file_path)
        .map_err(|source| InputError::Open {
            path: file_path.to_path_buf(),
            source,
        })?;

    let mut data = InputData::default();
    for (index, result) in reader.deserialize::<InputRow>().enumerate() {
        let row = result.map_err(|source| InputError::Record {
            path: file_path.to_path_buf(),
            record: index + 1,
            source,
        })?;
        data.pv.push(row.pv);
        data.demand_el.push(row.demand_el);
    }

    debug!(
        "Demand profile sum {:.3}, PV profile sum {:.3}",
        data.demand_el.iter().sum::<f64>(),
        data.pv.iter().sum::<f64>()
    );
    info!("Loaded {} hourly rows from {}", data.len(), file_path.display());

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_input_data() {
        let file = write_temp_csv(
            "timestamp,pv,demand_el\n\
             2016-01-01 00:00,0.0,0.5\n\
             2016-01-01 01:00,0.1,0.4\n\
             2016-01-01 02:00,0.3,0.6\n",
        );

        let data = load_input_data(file.path()).unwrap();
        assert_eq!(data.pv, vec![0.0, 0.1, 0.3]);
        assert_eq!(data.demand_el, vec![0.5, 0.4, 0.6]);
        assert_eq!(data.len(), 3);
    }

    #[test]
    fn test_column_order_does_not_matter() {
        let file = write_temp_csv("demand_el,wind,pv\n1.5,9.0,0.25\n");

        let data = load_input_data(file.path()).unwrap();
        assert_eq!(data.pv, vec![0.25]);
        assert_eq!(data.demand_el, vec![1.5]);
    }

    #[test]
    fn test_missing_column_is_an_error() {
        let file = write_temp_csv("pv,demand\n0.1,0.5\n");

        let err = load_input_data(file.path()).unwrap_err();
        assert!(matches!(err, InputError::Record { record: 1, .. }), "{}", err);
        assert!(err.to_string().contains("demand_el"), "{}", err);
    }

    #[test]
    fn test_non_numeric_value_is_an_error() {
        let file = write_temp_csv("pv,demand_el\n0.1,0.5\n0.2,lots\n");

        let err = load_input_data(file.path()).unwrap_err();
        assert!(matches!(err, InputError::Record { record: 2, .. }), "{}", err);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_input_data(&dir.path().join(DEFAULT_INPUT_FILE)).unwrap_err();
        assert!(matches!(err, InputError::Open { .. }));
    }

    #[test]
    fn test_header_only_file_is_empty() {
        let file = write_temp_csv("pv,demand_el\n");
        let data = load_input_data(file.path()).unwrap();
        assert!(data.is_empty());
    }
}
