use energy_system_model::StorageParams;
use log::{debug, info};
use petgraph::dot::Dot;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;
use thiserror::Error;

use crate::config::SystemConfig;
use crate::general::finance::{FinanceError, equivalent_periodical_costs};
use crate::general::input_data::InputData;
use crate::system::time_index::TimeIndex;

pub const ELECTRICITY_BUS: &str = "electricity";
pub const DIESEL_BUS: &str = "diesel";
pub const EXCESS: &str = "excess_el";
pub const DIESEL_SOURCE: &str = "rdiesel";
pub const GENSET: &str = "genset";
pub const DEMAND: &str = "demand_el";
pub const STORAGE: &str = "storage";
pub const PV: &str = "pv";

#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("Label '{0}' is already used in the energy system")]
    DuplicateLabel(String),
    #[error("Node '{node}' refers to unknown bus '{bus}'")]
    UnknownBus { node: String, bus: String },
    #[error(
        "Fixed profile of flow ({from}, {to}) has {found} values but the time index has {expected} steps"
    )]
    ProfileLength {
        from: String,
        to: String,
        expected: usize,
        found: usize,
    },
    #[error("Converter '{0}' needs a positive conversion factor")]
    ConversionFactor(String),
    #[error("Invalid capital cost: {0}")]
    Finance(#[from] FinanceError),
}

/// Capacity that can be extended by the optimiser at an annualised cost
#[derive(Debug, Clone, PartialEq)]
pub struct Investment {
    /// Equivalent periodical costs per unit of added capacity
    pub ep_costs: f64,
    /// Capacity already installed, the lower bound of the total capacity
    pub existing: f64,
}

impl Investment {
    pub fn new(ep_costs: f64, existing: f64) -> Self {
        Self { ep_costs, existing }
    }
}

/// Parameters of a flow between a node and a bus
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Flow {
    /// Relative profile the flow is fixed to, scaled by the nominal value or the
    /// total invested capacity
    pub fix: Option<Vec<f64>>,
    pub nominal_value: Option<f64>,
    /// Cost per unit of energy passing through the flow
    pub variable_costs: f64,
    pub investment: Option<Investment>,
}

impl Flow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fixed(mut self, profile: Vec<f64>) -> Self {
        self.fix = Some(profile);
        self
    }

    pub fn with_nominal_value(mut self, nominal_value: f64) -> Self {
        self.nominal_value = Some(nominal_value);
        self
    }

    pub fn with_variable_costs(mut self, variable_costs: f64) -> Self {
        self.variable_costs = variable_costs;
        self
    }

    pub fn with_investment(mut self, investment: Investment) -> Self {
        self.investment = Some(investment);
        self
    }
}

/// One side of a node: the bus it attaches to and the flow's parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Port {
    pub bus: String,
    pub flow: Flow,
}

impl Port {
    pub fn new(bus: &str, flow: Flow) -> Self {
        Self {
            bus: bus.to_string(),
            flow,
        }
    }
}

/// Storage attached to a single bus for both charging and discharging
#[derive(Debug, Clone, PartialEq)]
pub struct StorageNode {
    pub bus: String,
    pub params: StorageParams,
    pub investment: Investment,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Source {
        output: Port,
    },
    Sink {
        input: Port,
    },
    /// Single input, single output: output = conversion_factor * input
    Converter {
        input: Port,
        output: Port,
        conversion_factor: f64,
    },
    Storage(StorageNode),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub label: String,
    pub kind: NodeKind,
}

impl Node {
    pub fn source(label: &str, output: Port) -> Self {
        Self {
            label: label.to_string(),
            kind: NodeKind::Source { output },
        }
    }

    pub fn sink(label: &str, input: Port) -> Self {
        Self {
            label: label.to_string(),
            kind: NodeKind::Sink { input },
        }
    }

    pub fn converter(label: &str, input: Port, output: Port, conversion_factor: f64) -> Self {
        Self {
            label: label.to_string(),
            kind: NodeKind::Converter {
                input,
                output,
                conversion_factor,
            },
        }
    }

    pub fn storage(label: &str, bus: &str, params: StorageParams, ep_costs: f64) -> Self {
        let investment = Investment::new(ep_costs, params.existing_capacity);
        Self {
            label: label.to_string(),
            kind: NodeKind::Storage(StorageNode {
                bus: bus.to_string(),
                params,
                investment,
            }),
        }
    }

    /// Directed (from, to) edges of this node together with their flow parameters.
    ///
    /// Storage flows are implied by the storage parameters and carry no `Flow`.
    pub fn edges(&self) -> Vec<(String, String, Option<&Flow>)> {
        let label = self.label.clone();
        match &self.kind {
            NodeKind::Source { output } => vec![(label, output.bus.clone(), Some(&output.flow))],
            NodeKind::Sink { input } => vec![(input.bus.clone(), label, Some(&input.flow))],
            NodeKind::Converter { input, output, .. } => vec![
                (input.bus.clone(), label.clone(), Some(&input.flow)),
                (label, output.bus.clone(), Some(&output.flow)),
            ],
            NodeKind::Storage(storage) => vec![
                (storage.bus.clone(), label.clone(), None),
                (label, storage.bus.clone(), None),
            ],
        }
    }

    fn buses(&self) -> Vec<&str> {
        match &self.kind {
            NodeKind::Source { output } => vec![&output.bus],
            NodeKind::Sink { input } => vec![&input.bus],
            NodeKind::Converter { input, output, .. } => vec![&input.bus, &output.bus],
            NodeKind::Storage(storage) => vec![&storage.bus],
        }
    }
}

/// Buses and nodes over a fixed time index, validated as they are added
#[derive(Debug, Clone)]
pub struct EnergySystem {
    time_index: TimeIndex,
    buses: Vec<String>,
    nodes: Vec<Node>,
}

impl EnergySystem {
    pub fn new(time_index: TimeIndex) -> Self {
        Self {
            time_index,
            buses: Vec::new(),
            nodes: Vec::new(),
        }
    }

    pub fn time_index(&self) -> &TimeIndex {
        &self.time_index
    }

    pub fn buses(&self) -> &[String] {
        &self.buses
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, label: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.label == label)
    }

    fn is_label_used(&self, label: &str) -> bool {
        self.buses.iter().any(|bus| bus == label) || self.node(label).is_some()
    }

    pub fn add_bus(&mut self, label: &str) -> Result<(), TopologyError> {
        if self.is_label_used(label) {
            return Err(TopologyError::DuplicateLabel(label.to_string()));
        }
        self.buses.push(label.to_string());
        Ok(())
    }

    /// Adds a node after checking its label, buses and fixed profile lengths
    pub fn add_node(&mut self, node: Node) -> Result<(), TopologyError> {
        if self.is_label_used(&node.label) {
            return Err(TopologyError::DuplicateLabel(node.label));
        }
        for bus in node.buses() {
            if !self.buses.iter().any(|known| known == bus) {
                return Err(TopologyError::UnknownBus {
                    node: node.label.clone(),
                    bus: bus.to_string(),
                });
            }
        }
        if let NodeKind::Converter {
            conversion_factor, ..
        } = &node.kind
        {
            if *conversion_factor <= 0.0 {
                return Err(TopologyError::ConversionFactor(node.label));
            }
        }
        for (from, to, flow) in node.edges() {
            if let Some(profile) = flow.and_then(|flow| flow.fix.as_ref()) {
                if profile.len() != self.time_index.len() {
                    return Err(TopologyError::ProfileLength {
                        from,
                        to,
                        expected: self.time_index.len(),
                        found: profile.len(),
                    });
                }
            }
        }

        debug!("Adding node '{}' to the energy system", node.label);
        self.nodes.push(node);
        Ok(())
    }

    /// All directed (from, to) edges in insertion order
    pub fn edges(&self) -> Vec<(String, String)> {
        self.nodes
            .iter()
            .flat_map(|node| node.edges())
            .map(|(from, to, _)| (from, to))
            .collect()
    }

    /// Topology as a directed graph with buses and nodes as vertices
    pub fn to_graph(&self) -> DiGraph<String, String> {
        let mut graph = DiGraph::new();
        let mut indices: HashMap<&str, NodeIndex> = HashMap::new();
        for bus in &self.buses {
            indices.insert(bus, graph.add_node(bus.clone()));
        }
        for node in &self.nodes {
            indices.insert(&node.label, graph.add_node(node.label.clone()));
        }
        for (from, to) in self.edges() {
            if let (Some(&a), Some(&b)) = (indices.get(from.as_str()), indices.get(to.as_str())) {
                graph.add_edge(a, b, "flow".to_string());
            }
        }
        graph
    }

    /// Graphviz rendering of the topology
    pub fn to_dot(&self) -> String {
        format!("{}", Dot::new(&self.to_graph()))
    }
}

/// Assembles the fixed diesel/genset/demand system, plus storage and PV when configured.
///
/// # Arguments
/// * `config` - Component parameters; `storage` and `pv` switch the optional nodes on
/// * `data` - Hourly `pv` and `demand_el` profiles, one value per step of the time index
pub fn build_energy_system(
    config: &SystemConfig,
    data: &InputData,
) -> Result<EnergySystem, TopologyError> {
    let mut system = EnergySystem::new(config.time_index.clone());

    system.add_bus(ELECTRICITY_BUS)?;
    system.add_bus(DIESEL_BUS)?;

    system.add_node(Node::sink(
        EXCESS,
        Port::new(ELECTRICITY_BUS, Flow::new()),
    ))?;

    if let Some(pv) = &config.pv {
        let epc_pv = equivalent_periodical_costs(&pv.cost)?;
        system.add_node(Node::source(
            PV,
            Port::new(
                ELECTRICITY_BUS,
                Flow::new()
                    .fixed(data.pv.clone())
                    .with_investment(Investment::new(epc_pv, pv.existing_capacity)),
            ),
        ))?;
    }

    system.add_node(Node::source(
        DIESEL_SOURCE,
        Port::new(
            DIESEL_BUS,
            Flow::new().with_variable_costs(config.diesel.price),
        ),
    ))?;

    let epc_genset = equivalent_periodical_costs(&config.genset.cost)?;
    system.add_node(Node::converter(
        GENSET,
        Port::new(DIESEL_BUS, Flow::new()),
        Port::new(
            ELECTRICITY_BUS,
            Flow::new().with_investment(Investment::new(
                epc_genset,
                config.genset.existing_capacity,
            )),
        ),
        config.genset.efficiency,
    ))?;

    if let Some(storage) = &config.storage {
        let epc_storage = equivalent_periodical_costs(&storage.cost)?;
        system.add_node(Node::storage(
            STORAGE,
            ELECTRICITY_BUS,
            storage.clone(),
            epc_storage,
        ))?;
    }

    system.add_node(Node::sink(
        DEMAND,
        Port::new(
            ELECTRICITY_BUS,
            Flow::new()
                .fixed(data.demand_el.clone())
                .with_nominal_value(config.demand.nominal_value),
        ),
    ))?;

    info!(
        "Built energy system with {} buses and {} nodes over {} steps",
        system.buses().len(),
        system.nodes().len(),
        system.time_index().len()
    );

    Ok(system)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input_data(steps: usize) -> InputData {
        InputData {
            pv: vec![0.5; steps],
            demand_el: vec![0.1; steps],
        }
    }

    fn config(steps: usize) -> SystemConfig {
        let mut config = SystemConfig::default();
        config.time_index.periods = steps;
        config
    }

    #[test]
    fn test_default_system_has_storage_and_no_pv() {
        let system = build_energy_system(&config(24), &input_data(24)).unwrap();

        let labels: Vec<&str> = system.nodes().iter().map(|n| n.label.as_str()).collect();
        assert_eq!(
            labels,
            vec![EXCESS, DIESEL_SOURCE, GENSET, STORAGE, DEMAND]
        );
        assert_eq!(system.buses(), &[ELECTRICITY_BUS, DIESEL_BUS]);
        assert!(system.node(PV).is_none());
    }

    #[test]
    fn test_pv_enabled_adds_investable_source() {
        let mut config = config(24);
        config.pv = Some(Default::default());
        config.storage = None;
        let system = build_energy_system(&config, &input_data(24)).unwrap();

        let pv = system.node(PV).unwrap();
        match &pv.kind {
            NodeKind::Source { output } => {
                assert_eq!(output.bus, ELECTRICITY_BUS);
                let investment = output.flow.investment.as_ref().unwrap();
                assert!((investment.ep_costs - 80.242587).abs() < 1e-5);
                assert_eq!(output.flow.fix.as_ref().unwrap().len(), 24);
            }
            other => panic!("PV should be a source, got {:?}", other),
        }
        assert!(system.node(STORAGE).is_none());
    }

    #[test]
    fn test_demand_is_fixed_and_scaled() {
        let system = build_energy_system(&config(24), &input_data(24)).unwrap();
        match &system.node(DEMAND).unwrap().kind {
            NodeKind::Sink { input } => {
                assert_eq!(input.flow.nominal_value, Some(85.0));
                assert_eq!(input.flow.fix.as_deref(), Some(&[0.1; 24][..]));
            }
            other => panic!("demand should be a sink, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_lifetime_is_finance_error() {
        let mut config = config(24);
        config.genset.cost.lifetime = 0;
        let err = build_energy_system(&config, &input_data(24)).unwrap_err();
        assert!(
            matches!(err, TopologyError::Finance(FinanceError::ZeroLifetime)),
            "{}",
            err
        );
    }

    #[test]
    fn test_short_profile_is_length_mismatch() {
        let err = build_energy_system(&config(24), &input_data(23)).unwrap_err();
        match err {
            TopologyError::ProfileLength {
                from,
                to,
                expected,
                found,
            } => {
                assert_eq!((from.as_str(), to.as_str()), (ELECTRICITY_BUS, DEMAND));
                assert_eq!((expected, found), (24, 23));
            }
            other => panic!("unexpected error {}", other),
        }
    }

    #[test]
    fn test_duplicate_label_is_rejected() {
        let mut system = EnergySystem::new(TimeIndex::default());
        system.add_bus(ELECTRICITY_BUS).unwrap();
        assert!(matches!(
            system.add_bus(ELECTRICITY_BUS),
            Err(TopologyError::DuplicateLabel(_))
        ));
        assert!(matches!(
            system.add_node(Node::sink(
                ELECTRICITY_BUS,
                Port::new(ELECTRICITY_BUS, Flow::new())
            )),
            Err(TopologyError::DuplicateLabel(_))
        ));
    }

    #[test]
    fn test_unknown_bus_is_rejected() {
        let mut system = EnergySystem::new(TimeIndex::default());
        let err = system
            .add_node(Node::sink(EXCESS, Port::new(ELECTRICITY_BUS, Flow::new())))
            .unwrap_err();
        assert!(matches!(err, TopologyError::UnknownBus { .. }));
    }

    #[test]
    fn test_edges_and_dot_output() {
        let system = build_energy_system(&config(24), &input_data(24)).unwrap();
        let edges = system.edges();
        assert!(edges.contains(&(GENSET.to_string(), ELECTRICITY_BUS.to_string())));
        assert!(edges.contains(&(DIESEL_BUS.to_string(), GENSET.to_string())));
        assert!(edges.contains(&(ELECTRICITY_BUS.to_string(), STORAGE.to_string())));
        assert!(edges.contains(&(STORAGE.to_string(), ELECTRICITY_BUS.to_string())));
        assert_eq!(edges.len(), 7);

        let graph = system.to_graph();
        assert_eq!(graph.node_count(), 7);
        assert_eq!(graph.edge_count(), 7);

        let dot = system.to_dot();
        assert!(dot.starts_with("digraph"));
        assert!(dot.contains("genset"));
    }
}
