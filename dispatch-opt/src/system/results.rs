use indexmap::IndexMap;
use log::debug;
use thiserror::Error;

use crate::config::SystemConfig;
use crate::system::topology::{DEMAND, ELECTRICITY_BUS, GENSET, PV, STORAGE};

/// Name of the per-step flow sequence
pub const FLOW: &str = "flow";
/// Name of the invested capacity scalar
pub const INVEST: &str = "invest";
/// Name of the storage content sequence, stored under `(storage, None)`
pub const STORAGE_CONTENT: &str = "storage_content";
/// Name of the initial storage content scalar
pub const INIT_CONTENT: &str = "init_content";

/// Directed result key: `(from, Some(to))` for flows, `(node, None)` for a node's own state
pub type ResultKey = (String, Option<String>);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeResult {
    pub scalars: IndexMap<String, f64>,
    pub sequences: IndexMap<String, Vec<f64>>,
}

/// Solved values keyed by directed node pairs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Results {
    entries: IndexMap<ResultKey, NodeResult>,
}

fn key(from: &str, to: Option<&str>) -> ResultKey {
    (from.to_string(), to.map(str::to_string))
}

impl Results {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, from: &str, to: Option<&str>, result: NodeResult) {
        self.entries.insert(key(from, to), result);
    }

    pub fn get(&self, from: &str, to: Option<&str>) -> Option<&NodeResult> {
        self.entries.get(&key(from, to))
    }

    /// Per-step values of the flow from `from` to `to`
    pub fn flow(&self, from: &str, to: &str) -> Option<&[f64]> {
        self.get(from, Some(to))
            .and_then(|result| result.sequences.get(FLOW))
            .map(Vec::as_slice)
    }

    pub fn invest(&self, from: &str, to: Option<&str>) -> Option<f64> {
        self.get(from, to)
            .and_then(|result| result.scalars.get(INVEST))
            .copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ResultKey, &NodeResult)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &ResultKey> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether any entry starts or ends at `label`
    pub fn involves(&self, label: &str) -> bool {
        self.keys()
            .any(|(from, to)| from == label || to.as_deref() == Some(label))
    }
}

/// Scalars and sequences of every entry touching one node, keyed by `(entry key, name)`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeView {
    pub scalars: IndexMap<(ResultKey, String), f64>,
    pub sequences: IndexMap<(ResultKey, String), Vec<f64>>,
}

impl NodeView {
    /// Flow sequences only, in result order
    pub fn flows(&self) -> impl Iterator<Item = (&ResultKey, &[f64])> {
        self.sequences
            .iter()
            .filter(|((_, name), _)| name == FLOW)
            .map(|((key, _), values)| (key, values.as_slice()))
    }
}

/// Collects all results where `label` is the source or the target
pub fn node_view(results: &Results, label: &str) -> NodeView {
    let mut view = NodeView::default();
    for ((from, to), result) in results.iter() {
        if from != label && to.as_deref() != Some(label) {
            continue;
        }
        let entry = (from.clone(), to.clone());
        for (name, value) in &result.scalars {
            view.scalars.insert((entry.clone(), name.clone()), *value);
        }
        for (name, values) in &result.sequences {
            view.sequences
                .insert((entry.clone(), name.clone()), values.clone());
        }
    }
    view
}

#[derive(Debug, Error, PartialEq)]
pub enum ExtractError {
    #[error("Total demand is zero, so the renewable share is undefined")]
    ZeroDemand,
    #[error("No '{name}' result for ({from}, {to:?})")]
    MissingResult {
        from: String,
        to: Option<String>,
        name: String,
    },
}

fn missing(from: &str, to: Option<&str>, name: &str) -> ExtractError {
    ExtractError::MissingResult {
        from: from.to_string(),
        to: to.map(str::to_string),
        name: name.to_string(),
    }
}

/// Fraction of served demand not produced by the genset: `1 - genset / demand`
pub fn renewable_share(genset_total: f64, demand_total: f64) -> Result<f64, ExtractError> {
    if demand_total == 0.0 {
        return Err(ExtractError::ZeroDemand);
    }
    Ok(1.0 - genset_total / demand_total)
}

/// Flat, ordered mapping from metric name to value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metrics {
    values: IndexMap<String, f64>,
}

impl Metrics {
    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(name, value)| (name.as_str(), *value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Display name of a scalar in a node view, e.g. `genset->electricity.invest`
pub fn scalar_name((from, to): &ResultKey, name: &str) -> String {
    match to {
        Some(to) => format!("{}->{}.{}", from, to, name),
        None => format!("{}.{}", from, name),
    }
}

/// Installed storage capacity, reported in GWh
pub const STORAGE_INVEST: &str = "storage_invest";
/// Installed PV capacity, reported in MW
pub const PV_INVEST: &str = "pv_invest";
pub const RES_SHARE: &str = "res_share";

/// Summary metrics of a solved system.
///
/// Always contains the electricity bus scalars and `res_share`; `storage_invest` and
/// `pv_invest` only when the corresponding component is configured.
pub fn extract_metrics(results: &Results, config: &SystemConfig) -> Result<Metrics, ExtractError> {
    let mut metrics = Metrics::default();

    for ((entry, name), value) in node_view(results, ELECTRICITY_BUS).scalars {
        metrics.insert(scalar_name(&entry, &name), value);
    }

    if config.storage_enabled() {
        let invest = results
            .invest(STORAGE, None)
            .ok_or_else(|| missing(STORAGE, None, INVEST))?;
        metrics.insert(STORAGE_INVEST, invest / 1e6);
    }

    if config.pv_enabled() {
        let invest = results
            .invest(PV, Some(ELECTRICITY_BUS))
            .ok_or_else(|| missing(PV, Some(ELECTRICITY_BUS), INVEST))?;
        metrics.insert(PV_INVEST, invest / 1e3);
    }

    let genset_total: f64 = results
        .flow(GENSET, ELECTRICITY_BUS)
        .ok_or_else(|| missing(GENSET, Some(ELECTRICITY_BUS), FLOW))?
        .iter()
        .sum();
    let demand_total: f64 = results
        .flow(ELECTRICITY_BUS, DEMAND)
        .ok_or_else(|| missing(ELECTRICITY_BUS, Some(DEMAND), FLOW))?
        .iter()
        .sum();
    debug!(
        "Genset production {:.3}, served demand {:.3}",
        genset_total, demand_total
    );
    metrics.insert(RES_SHARE, renewable_share(genset_total, demand_total)?);

    Ok(metrics)
}
