//! Linear program of an [`EnergySystem`] and its solution.
//!
//! Every flow without a fixed profile becomes one non-negative variable per step. Fixed
//! flows stay constants unless their capacity is invested in, in which case they scale
//! with the investment variable. The objective is the sum of variable costs over all
//! flows and steps plus the equivalent periodical costs of every investment.
use clap::ValueEnum;
use good_lp::{
    Constraint, Expression, ProblemVariables, ResolutionError, Solution, Solver, SolverModel,
    Variable, constraint, variable,
};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::system::results::{FLOW, INIT_CONTENT, INVEST, NodeResult, Results, STORAGE_CONTENT};
use crate::system::topology::{EnergySystem, Flow, Investment, NodeKind, StorageNode};

/// Linear programming backend used to solve the model
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SolverKind {
    /// Interior point solver written in Rust, always available
    #[default]
    Clarabel,
    /// HiGHS, requires the `highs` feature
    Highs,
    /// External `cbc` binary found on the `PATH`
    Cbc,
}

impl SolverKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Clarabel => "clarabel",
            Self::Highs => "highs",
            Self::Cbc => "cbc",
        }
    }
}

impl fmt::Display for SolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error)]
pub enum SolveError {
    #[error("The problem is infeasible")]
    Infeasible,
    #[error("The problem is unbounded")]
    Unbounded,
    #[error("Solver {solver} failed: {message}")]
    Backend { solver: SolverKind, message: String },
    #[error("Solver {0} is not available, rebuild with the `{0}` feature")]
    Unavailable(SolverKind),
}

/// Summary of a solver run
#[derive(Debug, Clone, PartialEq)]
pub struct MetaResults {
    pub objective: f64,
    pub status: String,
    pub solver: SolverKind,
    pub variables: usize,
    pub constraints: usize,
    pub duration: Duration,
}

/// Per-step value of a flow in the model
enum FlowValue {
    /// One decision variable per step
    Free(Vec<Variable>),
    /// Known in advance
    Fixed(Vec<f64>),
    /// `profile[t] * (existing + invest)`
    Scaled {
        profile: Vec<f64>,
        existing: f64,
        invest: Variable,
    },
}

impl FlowValue {
    fn expression(&self, t: usize) -> Expression {
        match self {
            Self::Free(vars) => Expression::from(vars[t]),
            Self::Fixed(values) => Expression::from_other_affine(values[t]),
            Self::Scaled {
                profile,
                existing,
                invest,
            } => *invest * profile[t] + profile[t] * existing,
        }
    }

    fn value(&self, t: usize, solution: &impl Solution) -> f64 {
        match self {
            Self::Free(vars) => solution.value(vars[t]),
            Self::Fixed(values) => values[t],
            Self::Scaled {
                profile,
                existing,
                invest,
            } => profile[t] * (existing + invested(solution, *invest)),
        }
    }
}

/// Solved value of an investment variable. Interior point backends may return tiny
/// negative values for a variable bounded at zero.
fn invested(solution: &impl Solution, invest: Variable) -> f64 {
    solution.value(invest).max(0.0)
}

struct FlowVars {
    from: String,
    to: String,
    variable_costs: f64,
    value: FlowValue,
    invest: Option<(Variable, Investment)>,
}

impl FlowVars {
    fn new(vars: &mut ProblemVariables, from: String, to: String, flow: &Flow, steps: usize) -> Self {
        let invest = flow
            .investment
            .clone()
            .map(|investment| (vars.add(variable().min(0.0)), investment));
        let value = match (&flow.fix, &invest) {
            (Some(profile), Some((invest, investment))) => FlowValue::Scaled {
                profile: profile.clone(),
                existing: investment.existing,
                invest: *invest,
            },
            (Some(profile), None) => {
                let scale = flow.nominal_value.unwrap_or(1.0);
                FlowValue::Fixed(profile.iter().map(|value| value * scale).collect())
            }
            (None, Some(_)) => FlowValue::Free(vars.add_vector(variable().min(0.0), steps)),
            (None, None) => match flow.nominal_value {
                Some(nominal_value) => {
                    FlowValue::Free(vars.add_vector(variable().min(0.0).max(nominal_value), steps))
                }
                None => FlowValue::Free(vars.add_vector(variable().min(0.0), steps)),
            },
        };
        Self {
            from,
            to,
            variable_costs: flow.variable_costs,
            value,
            invest,
        }
    }

    fn variable_count(&self) -> usize {
        let per_step = match &self.value {
            FlowValue::Free(vars) => vars.len(),
            _ => 0,
        };
        per_step + usize::from(self.invest.is_some())
    }

    fn values(&self, steps: usize, solution: &impl Solution) -> Vec<f64> {
        (0..steps).map(|t| self.value.value(t, solution)).collect()
    }
}

struct StorageVars<'a> {
    label: &'a str,
    node: &'a StorageNode,
    inflow: Vec<Variable>,
    outflow: Vec<Variable>,
    content: Vec<Variable>,
    initial: Variable,
    invest: Variable,
}

impl<'a> StorageVars<'a> {
    fn new(vars: &mut ProblemVariables, label: &'a str, node: &'a StorageNode, steps: usize) -> Self {
        Self {
            label,
            node,
            inflow: vars.add_vector(variable().min(0.0), steps),
            outflow: vars.add_vector(variable().min(0.0), steps),
            content: vars.add_vector(variable().min(0.0), steps),
            initial: vars.add(variable().min(0.0)),
            invest: vars.add(variable().min(0.0)),
        }
    }

    fn variable_count(&self) -> usize {
        self.inflow.len() + self.outflow.len() + self.content.len() + 2
    }

    /// Content recursion, capacity bounds, power limits, initial level and balance
    fn constraints(&self) -> Vec<Constraint> {
        let params = &self.node.params;
        let existing = self.node.investment.existing;
        let retention = 1.0 - params.loss_rate;
        let eta_in = params.efficiency_charge;
        let eta_out_inv = 1.0 / params.efficiency_discharge;
        let mut constraints = Vec::with_capacity(self.content.len() * 4 + 2);

        for t in 0..self.content.len() {
            let previous = if t == 0 {
                self.initial
            } else {
                self.content[t - 1]
            };
            constraints.push(constraint!(
                self.content[t] - previous * retention - self.inflow[t] * eta_in
                    + self.outflow[t] * eta_out_inv
                    == 0.0
            ));
            constraints.push(constraint!(self.content[t] - self.invest <= existing));
            constraints.push(constraint!(
                self.inflow[t] - params.crate_charge * self.invest
                    <= params.crate_charge * existing
            ));
            constraints.push(constraint!(
                self.outflow[t] - params.crate_discharge * self.invest
                    <= params.crate_discharge * existing
            ));
        }

        match params.initial_storage_level {
            Some(level) => constraints.push(constraint!(
                self.initial - self.invest * level == level * existing
            )),
            None => constraints.push(constraint!(self.initial - self.invest <= existing)),
        }

        if params.balanced {
            if let Some(last) = self.content.last() {
                constraints.push(constraint!(*last - self.initial == 0.0));
            }
        }

        constraints
    }

    /// Flow entries for charging and discharging, and the node's own entry
    fn results(&self, solution: &impl Solution) -> [(String, Option<String>, NodeResult); 3] {
        let params = &self.node.params;
        let bus = &self.node.bus;
        let invest = invested(solution, self.invest);
        let capacity = self.node.investment.existing + invest;
        let values =
            |vars: &[Variable]| -> Vec<f64> { vars.iter().map(|&var| solution.value(var)).collect() };

        let mut inflow = NodeResult::default();
        inflow.sequences.insert(FLOW.to_string(), values(&self.inflow));
        inflow
            .scalars
            .insert(INVEST.to_string(), params.crate_charge * capacity);

        let mut outflow = NodeResult::default();
        outflow.sequences.insert(FLOW.to_string(), values(&self.outflow));
        outflow
            .scalars
            .insert(INVEST.to_string(), params.crate_discharge * capacity);

        let mut node = NodeResult::default();
        node.scalars.insert(INVEST.to_string(), invest);
        node.scalars
            .insert(INIT_CONTENT.to_string(), solution.value(self.initial));
        node.sequences
            .insert(STORAGE_CONTENT.to_string(), values(&self.content));

        [
            (bus.clone(), Some(self.label.to_string()), inflow),
            (self.label.to_string(), Some(bus.clone()), outflow),
            (self.label.to_string(), None, node),
        ]
    }
}

/// Builds and solves the model of `system` with the backend selected by `kind`
pub fn solve(system: &EnergySystem, kind: SolverKind) -> Result<(Results, MetaResults), SolveError> {
    match kind {
        SolverKind::Clarabel => solve_with(system, good_lp::clarabel, kind),
        #[cfg(feature = "highs")]
        SolverKind::Highs => solve_with(system, good_lp::solvers::highs::highs, kind),
        SolverKind::Cbc => {
            use good_lp::solvers::lp_solvers::{CbcSolver, LpSolver};
            solve_with(system, LpSolver(CbcSolver::new()), kind)
        }
        #[allow(unreachable_patterns)]
        unavailable => Err(SolveError::Unavailable(unavailable)),
    }
}

/// Builds and solves the model of `system` with `solver`
pub fn solve_with<S>(
    system: &EnergySystem,
    solver: S,
    kind: SolverKind,
) -> Result<(Results, MetaResults), SolveError>
where
    S: Solver,
    S::Model: SolverModel<Error = ResolutionError>,
{
    let steps = system.time_index().len();
    let mut vars = ProblemVariables::new();
    let mut flows: Vec<FlowVars> = Vec::new();
    let mut storages: Vec<StorageVars> = Vec::new();
    // (input flow, output flow, conversion factor)
    let mut conversions: Vec<(usize, usize, f64)> = Vec::new();

    for node in system.nodes() {
        match &node.kind {
            NodeKind::Storage(storage) => {
                storages.push(StorageVars::new(&mut vars, &node.label, storage, steps));
            }
            NodeKind::Converter {
                conversion_factor, ..
            } => {
                for (from, to, flow) in node.edges() {
                    if let Some(flow) = flow {
                        flows.push(FlowVars::new(&mut vars, from, to, flow, steps));
                    }
                }
                conversions.push((flows.len() - 2, flows.len() - 1, *conversion_factor));
            }
            _ => {
                for (from, to, flow) in node.edges() {
                    if let Some(flow) = flow {
                        flows.push(FlowVars::new(&mut vars, from, to, flow, steps));
                    }
                }
            }
        }
    }

    let variable_count = flows.iter().map(FlowVars::variable_count).sum::<usize>()
        + storages.iter().map(StorageVars::variable_count).sum::<usize>();

    let mut objective = Expression::default();
    for flow in &flows {
        if flow.variable_costs != 0.0 {
            for t in 0..steps {
                objective += flow.value.expression(t) * flow.variable_costs;
            }
        }
        if let Some((invest, investment)) = &flow.invest {
            objective += *invest * investment.ep_costs;
        }
    }
    for storage in &storages {
        objective += storage.invest * storage.node.investment.ep_costs;
    }

    let mut constraints: Vec<Constraint> = Vec::new();

    // Capacity of free flows with an investment
    for flow in &flows {
        if let (FlowValue::Free(flow_vars), Some((invest, investment))) = (&flow.value, &flow.invest) {
            for &var in flow_vars {
                constraints.push(constraint!(var - *invest <= investment.existing));
            }
        }
    }

    for &(input, output, factor) in &conversions {
        for t in 0..steps {
            constraints.push(constraint!(
                flows[output].value.expression(t) - flows[input].value.expression(t) * factor
                    == 0.0
            ));
        }
    }

    for storage in &storages {
        constraints.extend(storage.constraints());
    }

    // Inflows equal outflows on every bus
    for bus in system.buses() {
        for t in 0..steps {
            let mut balance = Expression::default();
            for flow in &flows {
                if &flow.to == bus {
                    balance += flow.value.expression(t);
                } else if &flow.from == bus {
                    balance -= flow.value.expression(t);
                }
            }
            for storage in storages.iter().filter(|storage| &storage.node.bus == bus) {
                balance += storage.outflow[t];
                balance -= storage.inflow[t];
            }
            constraints.push(constraint!(balance == 0.0));
        }
    }

    let constraint_count = constraints.len();
    info!(
        "Built linear program with {} variables and {} constraints",
        variable_count, constraint_count
    );

    let mut model = vars.minimise(objective).using(solver);
    for constraint in constraints {
        model = model.with(constraint);
    }

    let start_time = Instant::now();
    let solution = model.solve().map_err(|err| match err {
        ResolutionError::Infeasible => SolveError::Infeasible,
        ResolutionError::Unbounded => SolveError::Unbounded,
        other => SolveError::Backend {
            solver: kind,
            message: other.to_string(),
        },
    })?;
    let duration = start_time.elapsed();
    info!("Solved with {} in {:.2?}", kind, duration);

    let mut results = Results::new();
    let mut objective_value = 0.0;

    for flow in &flows {
        let values = flow.values(steps, &solution);
        objective_value += flow.variable_costs * values.iter().sum::<f64>();

        let mut result = NodeResult::default();
        if let Some((invest, investment)) = &flow.invest {
            let amount = invested(&solution, *invest);
            objective_value += investment.ep_costs * amount;
            result.scalars.insert(INVEST.to_string(), amount);
        }
        result.sequences.insert(FLOW.to_string(), values);
        results.insert(&flow.from, Some(&flow.to), result);
    }

    for storage in &storages {
        objective_value += storage.node.investment.ep_costs * invested(&solution, storage.invest);
        for (from, to, result) in storage.results(&solution) {
            results.insert(&from, to.as_deref(), result);
        }
    }
    debug!("Objective value {:.4}", objective_value);

    let meta = MetaResults {
        objective: objective_value,
        status: "optimal".to_string(),
        solver: kind,
        variables: variable_count,
        constraints: constraint_count,
        duration,
    };
    Ok((results, meta))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SystemConfig;
    use crate::general::input_data::InputData;
    use crate::system::results::{extract_metrics, node_view, RES_SHARE};
    use crate::system::topology::{
        build_energy_system, DEMAND, DIESEL_BUS, DIESEL_SOURCE, ELECTRICITY_BUS, EXCESS, GENSET,
        PV, STORAGE,
    };

    const STEPS: usize = 24;

    fn config(storage: bool, pv: bool) -> SystemConfig {
        let mut config = SystemConfig::default();
        config.time_index.periods = STEPS;
        if !storage {
            config.storage = None;
        }
        if pv {
            config.pv = Some(Default::default());
        }
        config
    }

    /// Daily demand curve peaking at 0.11, i.e. 9.35 after scaling by 85
    fn input_data() -> InputData {
        let demand_el = (0..STEPS)
            .map(|t| 0.05 + 0.06 * (std::f64::consts::PI * t as f64 / STEPS as f64).sin())
            .collect();
        let pv = (0..STEPS)
            .map(|t| if (8..18).contains(&t) { 0.6 } else { 0.0 })
            .collect();
        InputData { pv, demand_el }
    }

    fn run(config: &SystemConfig, data: &InputData) -> (Results, MetaResults) {
        let system = build_energy_system(config, data).unwrap();
        solve(&system, SolverKind::Clarabel).unwrap()
    }

    fn assert_close(actual: f64, expected: f64, tolerance: f64) {
        assert!(
            (actual - expected).abs() <= tolerance * expected.abs().max(1.0),
            "expected {} but got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_diesel_only_objective_is_fuel_cost() {
        let config = config(false, false);
        let data = input_data();
        let (results, meta) = run(&config, &data);

        let demand_total: f64 = data.demand_el.iter().map(|d| d * 85.0).sum();
        assert_close(meta.objective, demand_total * 0.04 / 0.33, 1e-5);
        let invest = results.invest(GENSET, Some(ELECTRICITY_BUS)).unwrap();
        assert!(invest >= 0.0, "negative investment {}", invest);
        assert_close(invest, 0.0, 1e-5);
        assert_eq!(meta.status, "optimal");
        assert_eq!(meta.solver, SolverKind::Clarabel);
    }

    #[test]
    fn test_peak_above_existing_capacity_is_invested() {
        let config = config(false, false);
        let mut data = input_data();
        data.demand_el[12] = 0.2; // 17 after scaling, 7 above the existing genset
        let (results, meta) = run(&config, &data);

        let invest = results.invest(GENSET, Some(ELECTRICITY_BUS)).unwrap();
        assert_close(invest, 7.0, 1e-4);

        let demand_total: f64 = data.demand_el.iter().map(|d| d * 85.0).sum();
        let fuel_cost = demand_total * 0.04 / 0.33;
        assert!(meta.objective > fuel_cost);
    }

    #[test]
    fn test_electricity_bus_is_balanced() {
        let config = config(true, true);
        let (results, _) = run(&config, &input_data());
        let view = node_view(&results, ELECTRICITY_BUS);

        for t in 0..STEPS {
            let mut balance = 0.0;
            for ((from, _), values) in view.flows() {
                if from == ELECTRICITY_BUS {
                    balance -= values[t];
                } else {
                    balance += values[t];
                }
            }
            assert!(balance.abs() < 1e-5, "imbalance {} at step {}", balance, t);
        }
    }

    #[test]
    fn test_genset_follows_conversion_factor() {
        let (results, _) = run(&config(false, false), &input_data());
        let fuel = results.flow(DIESEL_BUS, GENSET).unwrap();
        let power = results.flow(GENSET, ELECTRICITY_BUS).unwrap();
        let rdiesel = results.flow(DIESEL_SOURCE, DIESEL_BUS).unwrap();
        for t in 0..STEPS {
            assert!((power[t] - 0.33 * fuel[t]).abs() < 1e-6);
            assert!((rdiesel[t] - fuel[t]).abs() < 1e-6);
        }
    }

    #[test]
    fn test_storage_content_follows_recursion() {
        let config = config(true, true);
        let (results, _) = run(&config, &input_data());
        let params = config.storage.as_ref().unwrap();

        let storage = results.get(STORAGE, None).unwrap();
        let content = &storage.sequences[STORAGE_CONTENT];
        let initial = storage.scalars[INIT_CONTENT];
        let inflow = results.flow(ELECTRICITY_BUS, STORAGE).unwrap();
        let outflow = results.flow(STORAGE, ELECTRICITY_BUS).unwrap();

        let mut previous = initial;
        for t in 0..STEPS {
            let expected = previous * (1.0 - params.loss_rate)
                + inflow[t] * params.efficiency_charge
                - outflow[t] / params.efficiency_discharge;
            assert!((content[t] - expected).abs() < 1e-5);
            previous = content[t];
        }
        assert!((content[STEPS - 1] - initial).abs() < 1e-5);

        let invest = storage.scalars[INVEST];
        assert!(invest >= 0.0, "negative investment {}", invest);
        let capacity = params.existing_capacity + invest;
        assert!(content.iter().all(|&c| c <= capacity + 1e-5));
        assert!(outflow.iter().all(|&out| out <= capacity / 6.0 + 1e-5));
    }

    #[test]
    fn test_fixed_initial_level_without_balance() {
        let mut config = config(true, false);
        let params = config.storage.as_mut().unwrap();
        params.initial_storage_level = Some(0.5);
        params.balanced = false;
        let params = params.clone();
        let data = input_data();
        let (results, meta) = run(&config, &data);

        let storage = results.get(STORAGE, None).unwrap();
        let invest = storage.scalars[INVEST];
        assert!(invest >= 0.0, "negative investment {}", invest);
        let initial = storage.scalars[INIT_CONTENT];
        assert_close(initial, 0.5 * (params.existing_capacity + invest), 1e-5);

        // Stored energy is free, so the battery is drawn down instead of refilled
        let content = &storage.sequences[STORAGE_CONTENT];
        assert!(
            content[STEPS - 1] < initial - 100.0,
            "final content {} vs initial {}",
            content[STEPS - 1],
            initial
        );
        let inflow = results.flow(ELECTRICITY_BUS, STORAGE).unwrap();
        let outflow = results.flow(STORAGE, ELECTRICITY_BUS).unwrap();
        let first = initial * (1.0 - params.loss_rate) + inflow[0] * params.efficiency_charge
            - outflow[0] / params.efficiency_discharge;
        assert!((content[0] - first).abs() < 1e-5);

        let demand_total: f64 = data.demand_el.iter().map(|d| d * 85.0).sum();
        assert!(meta.objective < demand_total * 0.04 / 0.33);
    }

    #[test]
    fn test_disabled_components_have_no_results() {
        let config = config(false, false);
        let (results, _) = run(&config, &input_data());

        assert!(!results.involves(STORAGE));
        assert!(!results.involves(PV));
        assert!(results.involves(EXCESS));
        assert_eq!(results.len(), 5);

        let metrics = extract_metrics(&results, &config).unwrap();
        assert!(metrics.get(RES_SHARE).unwrap().abs() < 1e-5);
    }

    #[test]
    fn test_served_demand_matches_profile() {
        let data = input_data();
        let (results, _) = run(&config(true, false), &data);
        let served = results.flow(ELECTRICITY_BUS, DEMAND).unwrap();
        for (served, demand) in served.iter().zip(&data.demand_el) {
            assert_eq!(*served, demand * 85.0);
        }
    }

    #[test]
    #[cfg(not(feature = "highs"))]
    fn test_unavailable_backend_is_reported() {
        let config = config(false, false);
        let system = build_energy_system(&config, &input_data()).unwrap();
        assert!(matches!(
            solve(&system, SolverKind::Highs),
            Err(SolveError::Unavailable(SolverKind::Highs))
        ));
    }

    #[test]
    fn test_solver_kind_names() {
        #[derive(Deserialize)]
        struct Selection {
            solver: SolverKind,
        }

        assert_eq!(SolverKind::default(), SolverKind::Clarabel);
        assert_eq!(SolverKind::Highs.to_string(), "highs");
        let selection: Selection = toml::from_str("solver = \"cbc\"").unwrap();
        assert_eq!(selection.solver, SolverKind::Cbc);
    }
}
