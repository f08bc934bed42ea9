//! Hands an assembled model to the HiGHS solver.
use crate::formulation::{AssembledModel, Bounds, ComponentIndex};
use anyhow::{Result, bail};
use highs::{HighsModelStatus, RowProblem as Problem, Sense};
use log::{debug, info};
use std::env;
use std::ops::Bound;

/// A decision variable in the HiGHS problem
type Variable = highs::Col;

/// The values of a model's columns at an optimal solution
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    columns: Vec<f64>,
    objective_value: f64,
}

impl Solution {
    /// Create a [`Solution`] from column values, evaluating the model's objective
    pub fn new(model: &AssembledModel, columns: Vec<f64>) -> Self {
        let objective_value = model.objective().evaluate(&columns);
        Self {
            columns,
            objective_value,
        }
    }

    /// Values of the columns, in column order
    pub fn columns(&self) -> &[f64] {
        &self.columns
    }

    /// Value of the objective function
    pub fn objective_value(&self) -> f64 {
        self.objective_value
    }

    /// Value of a variable or expression of the model
    pub fn value(&self, model: &AssembledModel, name: &str, index: &ComponentIndex) -> Option<f64> {
        model.value(name, index, &self.columns)
    }
}

fn to_range(lower: Option<f64>, upper: Option<f64>) -> (Bound<f64>, Bound<f64>) {
    (
        lower.map_or(Bound::Unbounded, Bound::Included),
        upper.map_or(Bound::Unbounded, Bound::Included),
    )
}

/// Minimise the model's objective with HiGHS.
///
/// # Returns
///
/// The solution if an optimal one was found, otherwise an error naming the status returned by
/// the solver.
pub fn solve(model: &AssembledModel) -> Result<Solution> {
    let mut problem = Problem::default();
    let objective = model.objective();
    let variables: Vec<Variable> = model
        .iter_variables()
        .enumerate()
        .map(|(column, variable)| {
            let Bounds { lower, upper } = variable.bounds;
            problem.add_column(objective.coefficient(column), to_range(lower, upper))
        })
        .collect();

    for constraint in model.iter_constraints() {
        let (coefficients, lower, upper) = constraint.row();
        problem.add_row(
            to_range(lower, upper),
            coefficients
                .into_iter()
                .map(|(column, coeff)| (variables[column], coeff)),
        );
    }
    debug!(
        "Passing problem with {} columns and {} rows to HiGHS",
        problem.num_cols(),
        problem.num_rows()
    );

    let mut highs_model = problem.optimise(Sense::Minimise);
    enable_highs_logging(&mut highs_model);
    let solved = highs_model.solve();
    match solved.status() {
        HighsModelStatus::Optimal => {
            let solution = Solution::new(model, solved.get_solution().columns().to_vec());
            info!("Optimal objective value: {}", solution.objective_value());
            Ok(solution)
        }
        status => bail!("Could not solve: {status:?}"),
    }
}

/// Send the solver's own output to the console unless logging is switched off
fn enable_highs_logging(model: &mut highs::Model) {
    if let Ok(log_level) = env::var("GRIDPLAN_LOG_LEVEL")
        && log_level.eq_ignore_ascii_case("off")
    {
        model.set_option("output_flag", false);
        return;
    }

    model.set_option("log_to_console", true);
    model.set_option("output_flag", true);
}
