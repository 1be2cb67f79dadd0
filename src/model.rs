use crate::data::SolveStatus;
use good_lp::variable;
use good_lp::{
    Expression, ProblemVariables, ResolutionError, Solution, SolverModel, Variable, constraint,
    default_solver,
};
use log::{info, warn};
use std::time::{Duration, Instant};

/// Index of a variable within a [`MilpModel`].
pub type VarId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmp {
    Le,
    Ge,
    Eq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Minimize,
    Maximize,
}

/// One linear constraint `Σ coeff·var  (≤|≥|=)  rhs`.
#[derive(Debug, Clone)]
pub struct LinConstraint {
    pub terms: Vec<(VarId, f64)>,
    pub cmp: Cmp,
    pub rhs: f64,
}

/// A solver-agnostic 0/1 integer program: named binary variables, linear
/// constraints, and a linear objective. Backends translate this into their
/// own representation, so the model-building code never depends on a
/// specific solver's types.
#[derive(Debug, Clone, Default)]
pub struct MilpModel {
    var_names: Vec<String>,
    constraints: Vec<LinConstraint>,
    objective: Vec<(VarId, f64)>,
    sense: Option<Sense>,
}

impl MilpModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_binary(&mut self, name: String) -> VarId {
        self.var_names.push(name);
        self.var_names.len() - 1
    }

    pub fn add_constraint(&mut self, terms: Vec<(VarId, f64)>, cmp: Cmp, rhs: f64) {
        self.constraints.push(LinConstraint { terms, cmp, rhs });
    }

    pub fn set_objective(&mut self, terms: Vec<(VarId, f64)>, sense: Sense) {
        self.objective = terms;
        self.sense = Some(sense);
    }

    pub fn var_name(&self, id: VarId) -> &str {
        &self.var_names[id]
    }

    pub fn num_vars(&self) -> usize {
        self.var_names.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn constraints(&self) -> &[LinConstraint] {
        &self.constraints
    }

    pub fn objective(&self) -> &[(VarId, f64)] {
        &self.objective
    }
}

/// What a solve attempt produced. `values` is aligned with the model's
/// variable ids and empty unless the status carries a usable point.
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    pub status: SolveStatus,
    pub objective_value: Option<f64>,
    pub values: Vec<f64>,
    pub elapsed: Duration,
}

impl SolveOutcome {
    fn failed(status: SolveStatus, elapsed: Duration) -> Self {
        SolveOutcome {
            status,
            objective_value: None,
            values: Vec::new(),
            elapsed,
        }
    }
}

/// The external constraint-solving capability. Any MILP backend satisfying
/// this contract is interchangeable.
pub trait MilpSolver {
    /// Solves within the given wall-clock budget. On hitting the budget the
    /// backend must return its best incumbent rather than block.
    fn solve(&self, model: &MilpModel, time_limit: Duration) -> SolveOutcome;
}

/// HiGHS backend via `good_lp`.
pub struct HighsSolver;

impl MilpSolver for HighsSolver {
    fn solve(&self, model: &MilpModel, time_limit: Duration) -> SolveOutcome {
        let started = Instant::now();

        let mut problem = ProblemVariables::new();
        let vars: Vec<Variable> = (0..model.num_vars())
            .map(|id| problem.add(variable().binary().name(model.var_name(id))))
            .collect();

        let objective: Expression = model
            .objective()
            .iter()
            .map(|&(id, coeff)| coeff * vars[id])
            .sum();

        info!(
            "Handing model to HiGHS: {} binary variables, {} constraints, {:.0}s budget",
            model.num_vars(),
            model.num_constraints(),
            time_limit.as_secs_f64()
        );

        let unsolved = match model.sense {
            Some(Sense::Maximize) => problem.maximise(objective),
            _ => problem.minimise(objective),
        };
        let mut solver = unsolved
            .using(default_solver)
            .set_option("threads", 1) // limit to 1 thread for reproducibility
            .set_option("random_seed", 1234)
            .set_option("time_limit", time_limit.as_secs_f64())
            .set_option("log_to_console", "false");

        for c in model.constraints() {
            let lhs: Expression = c.terms.iter().map(|&(id, coeff)| coeff * vars[id]).sum();
            let built = match c.cmp {
                Cmp::Le => constraint!(lhs <= c.rhs),
                Cmp::Ge => constraint!(lhs >= c.rhs),
                Cmp::Eq => constraint!(lhs == c.rhs),
            };
            solver.add_constraint(built);
        }

        match solver.solve() {
            Ok(solution) => {
                let elapsed = started.elapsed();
                let values: Vec<f64> = vars.iter().map(|v| solution.value(*v)).collect();
                let objective_value = model
                    .objective()
                    .iter()
                    .map(|&(id, coeff)| coeff * values[id])
                    .sum::<f64>();
                // HiGHS returns its incumbent when the budget runs out; an
                // on-budget return is the proven optimum.
                let status = if elapsed >= time_limit {
                    SolveStatus::TimeLimit
                } else {
                    SolveStatus::Optimal
                };
                info!("Solve finished: {status} in {elapsed:.2?}");
                SolveOutcome {
                    status,
                    objective_value: Some(objective_value),
                    values,
                    elapsed,
                }
            }
            Err(ResolutionError::Infeasible) => {
                let elapsed = started.elapsed();
                info!("Solve finished: INFEASIBLE in {elapsed:.2?}");
                SolveOutcome::failed(SolveStatus::Infeasible, elapsed)
            }
            Err(e) => {
                let elapsed = started.elapsed();
                warn!("Solver error after {elapsed:.2?}: {e}");
                SolveOutcome::failed(SolveStatus::SolverError, elapsed)
            }
        }
    }
}
