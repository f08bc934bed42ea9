//! Assembly of a [`Formulation`] into a model with numbered columns and resolved expressions.
use super::{
    Bounds, ComponentIndex, ComponentName, ComponentRef, Constraint, ConstraintSense,
    Formulation, LinearExpr, Symbol,
};
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// An affine function of the model's columns
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResolvedExpr {
    /// Coefficients keyed by column number
    pub coefficients: IndexMap<usize, f64>,
    /// The constant term
    pub constant: f64,
}

impl ResolvedExpr {
    fn add_term(&mut self, column: usize, coeff: f64) {
        *self.coefficients.entry(column).or_insert(0.0) += coeff;
    }

    fn add_scaled(&mut self, other: &ResolvedExpr, scale: f64) {
        for (&column, &coeff) in &other.coefficients {
            self.add_term(column, coeff * scale);
        }
        self.constant += other.constant * scale;
    }

    /// Get the coefficient of the given column (zero if it does not appear)
    pub fn coefficient(&self, column: usize) -> f64 {
        self.coefficients.get(&column).copied().unwrap_or(0.0)
    }

    /// Evaluate the expression for the given column values
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.constant
            + self
                .coefficients
                .iter()
                .map(|(&column, coeff)| coeff * values[column])
                .sum::<f64>()
    }
}

/// A decision variable occupying one column of the model
#[derive(Clone, Debug, PartialEq)]
pub struct AssembledVariable {
    /// Name and index of the variable
    pub reference: ComponentRef,
    /// Bounds of the variable
    pub bounds: Bounds,
}

/// A constraint whose expressions have been resolved
#[derive(Clone, Debug, PartialEq)]
pub struct AssembledConstraint {
    /// Name and index of the constraint
    pub reference: ComponentRef,
    /// Left-hand side
    pub lhs: ResolvedExpr,
    /// Relation between the two sides
    pub sense: ConstraintSense,
    /// Right-hand side
    pub rhs: ResolvedExpr,
}

impl AssembledConstraint {
    /// Convert to row form: column coefficients plus lower and upper bounds for the row
    pub fn row(&self) -> (Vec<(usize, f64)>, Option<f64>, Option<f64>) {
        let mut diff = self.lhs.clone();
        diff.add_scaled(&self.rhs, -1.0);
        let bound = -diff.constant;
        let coefficients = diff
            .coefficients
            .into_iter()
            .filter(|(_, coeff)| *coeff != 0.0)
            .collect();

        match self.sense {
            ConstraintSense::LessOrEqual => (coefficients, None, Some(bound)),
            ConstraintSense::Equal => (coefficients, Some(bound), Some(bound)),
            ConstraintSense::GreaterOrEqual => (coefficients, Some(bound), None),
        }
    }
}

/// A fully resolved model, ready to be handed to a solver
#[derive(Debug)]
pub struct AssembledModel {
    variables: Vec<AssembledVariable>,
    columns: HashMap<ComponentRef, usize>,
    expressions: IndexMap<ComponentRef, Rc<ResolvedExpr>>,
    constraints: Vec<AssembledConstraint>,
    constraint_rows: HashMap<ComponentRef, usize>,
    objective: ResolvedExpr,
}

impl AssembledModel {
    /// Iterate over the variables in column order
    pub fn iter_variables(&self) -> impl Iterator<Item = &AssembledVariable> {
        self.variables.iter()
    }

    /// Iterate over the constraints in row order
    pub fn iter_constraints(&self) -> impl Iterator<Item = &AssembledConstraint> {
        self.constraints.iter()
    }

    /// The number of columns (variables) in the model
    pub fn num_columns(&self) -> usize {
        self.variables.len()
    }

    /// The objective, which is to be minimised
    pub fn objective(&self) -> &ResolvedExpr {
        &self.objective
    }

    /// Get the column number of a variable
    pub fn column(&self, name: &str, index: &ComponentIndex) -> Option<usize> {
        self.columns
            .get(&ComponentRef::new(name, index.clone()))
            .copied()
    }

    /// Get a resolved expression
    pub fn expression(&self, name: &str, index: &ComponentIndex) -> Option<&ResolvedExpr> {
        self.expressions
            .get(&ComponentRef::new(name, index.clone()))
            .map(AsRef::as_ref)
    }

    /// Get a resolved constraint
    pub fn constraint(&self, name: &str, index: &ComponentIndex) -> Option<&AssembledConstraint> {
        let row = self
            .constraint_rows
            .get(&ComponentRef::new(name, index.clone()))?;
        Some(&self.constraints[*row])
    }

    /// Iterate over the indices of a family of expressions
    pub fn iter_expression_indices<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a ComponentIndex> {
        self.expressions
            .keys()
            .filter(move |reference| &*reference.name.0 == name)
            .map(|reference| &reference.index)
    }

    /// Evaluate a variable or expression for the given column values
    pub fn value(&self, name: &str, index: &ComponentIndex, values: &[f64]) -> Option<f64> {
        if let Some(column) = self.column(name, index) {
            return Some(values[column]);
        }

        self.expression(name, index)
            .map(|expr| expr.evaluate(values))
    }
}

/// Resolves references to named expressions, memoising the results
struct Resolver<'a> {
    columns: &'a HashMap<ComponentRef, usize>,
    definitions: &'a IndexMap<ComponentName, IndexMap<ComponentIndex, LinearExpr>>,
    resolved: HashMap<ComponentRef, Rc<ResolvedExpr>>,
    in_progress: HashSet<ComponentRef>,
}

impl Resolver<'_> {
    fn resolve(&mut self, expr: &LinearExpr) -> Result<ResolvedExpr> {
        let mut out = ResolvedExpr {
            coefficients: IndexMap::new(),
            constant: expr.constant(),
        };

        for (symbol, coeff) in expr.iter_terms() {
            match symbol {
                Symbol::Variable(reference) => {
                    let column = *self
                        .columns
                        .get(reference)
                        .with_context(|| format!("Undefined variable {reference}"))?;
                    out.add_term(column, coeff);
                }
                Symbol::Expression(reference) => {
                    let inner = self.resolve_reference(reference)?;
                    out.add_scaled(&inner, coeff);
                }
                Symbol::Component(reference) => {
                    if let Some(&column) = self.columns.get(reference) {
                        out.add_term(column, coeff);
                    } else {
                        let inner = self.resolve_reference(reference)?;
                        out.add_scaled(&inner, coeff);
                    }
                }
            }
        }

        Ok(out)
    }

    fn resolve_reference(&mut self, reference: &ComponentRef) -> Result<Rc<ResolvedExpr>> {
        if let Some(resolved) = self.resolved.get(reference) {
            return Ok(Rc::clone(resolved));
        }

        let definitions = self.definitions;
        let definition = definitions
            .get(&reference.name)
            .and_then(|family| family.get(&reference.index))
            .with_context(|| format!("Undefined expression {reference}"))?;
        ensure!(
            self.in_progress.insert(reference.clone()),
            "Circular reference in expression {reference}"
        );
        let resolved = Rc::new(self.resolve(definition)?);
        self.in_progress.remove(reference);
        self.resolved.insert(reference.clone(), Rc::clone(&resolved));

        Ok(resolved)
    }
}

impl Formulation {
    /// Resolve every reference in the formulation, numbering variables in the order they were
    /// added.
    ///
    /// This is the only point at which named expressions are substituted, so it is an error for
    /// anything to refer to a component which was never defined or to an expression which
    /// (indirectly) refers to itself.
    pub fn assemble(self) -> Result<AssembledModel> {
        let mut variables = Vec::new();
        let mut columns = HashMap::new();
        for (name, family) in &self.variables {
            for (index, bounds) in family {
                let reference = ComponentRef {
                    name: name.clone(),
                    index: index.clone(),
                };
                columns.insert(reference.clone(), variables.len());
                variables.push(AssembledVariable {
                    reference,
                    bounds: *bounds,
                });
            }
        }

        let mut resolver = Resolver {
            columns: &columns,
            definitions: &self.expressions,
            resolved: HashMap::new(),
            in_progress: HashSet::new(),
        };

        let mut expressions = IndexMap::new();
        for (name, family) in &self.expressions {
            for index in family.keys() {
                let reference = ComponentRef {
                    name: name.clone(),
                    index: index.clone(),
                };
                let resolved = resolver.resolve_reference(&reference)?;
                expressions.insert(reference, resolved);
            }
        }

        let mut constraints = Vec::new();
        let mut constraint_rows = HashMap::new();
        for (name, family) in &self.constraints {
            for (index, constraint) in family {
                let reference = ComponentRef {
                    name: name.clone(),
                    index: index.clone(),
                };
                let assembled = resolve_constraint(&mut resolver, reference.clone(), constraint)
                    .with_context(|| format!("Failed to resolve constraint {reference}"))?;
                constraint_rows.insert(reference, constraints.len());
                constraints.push(assembled);
            }
        }

        let objective = match &self.objective {
            Some(objective) => resolver
                .resolve(objective)
                .context("Failed to resolve objective")?,
            None => ResolvedExpr::default(),
        };

        Ok(AssembledModel {
            variables,
            columns,
            expressions,
            constraints,
            constraint_rows,
            objective,
        })
    }
}

fn resolve_constraint(
    resolver: &mut Resolver<'_>,
    reference: ComponentRef,
    constraint: &Constraint,
) -> Result<AssembledConstraint> {
    Ok(AssembledConstraint {
        reference,
        lhs: resolver.resolve(&constraint.lhs)?,
        sense: constraint.sense,
        rhs: resolver.resolve(&constraint.rhs)?,
    })
}
