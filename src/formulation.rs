//! The algebraic representation of an optimisation model.
//!
//! Model components (variables, expressions and constraints) are added to a [`Formulation`] by
//! name and index. Expressions may refer to other components by name before those components have
//! been defined: references are only resolved when the formulation is assembled into an
//! [`AssembledModel`], which is what gets handed to the solver.
use crate::id::define_id_type;
use crate::project::ProjectID;
use crate::zone::ZoneID;
use anyhow::{Result, ensure};
use derive_more::Display;
use indexmap::IndexMap;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

mod assemble;
pub use assemble::{AssembledConstraint, AssembledModel, AssembledVariable, ResolvedExpr};

define_id_type! {ComponentName}

/// The index of a single member of a family of model components
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
pub enum ComponentIndex {
    /// A component with no index
    #[display("")]
    Scalar,
    /// Indexed by period
    #[display("[{_0}]")]
    Period(u32),
    /// Indexed by project and period
    #[display("[{_0}, {_1}]")]
    ProjectPeriod(ProjectID, u32),
    /// Indexed by project and timepoint
    #[display("[{_0}, {_1}]")]
    ProjectTimepoint(ProjectID, u32),
    /// Indexed by zone and period
    #[display("[{_0}, {_1}]")]
    ZonePeriod(ZoneID, u32),
    /// Indexed by zone and timepoint
    #[display("[{_0}, {_1}]")]
    ZoneTimepoint(ZoneID, u32),
}

/// The time dimension of a [`ComponentIndex`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeIndex {
    /// The index has no time dimension
    None,
    /// The index refers to a period
    Period(u32),
    /// The index refers to a timepoint
    Timepoint(u32),
}

impl ComponentIndex {
    /// Get the time dimension of the index
    pub fn time(&self) -> TimeIndex {
        match self {
            Self::Scalar => TimeIndex::None,
            Self::Period(period)
            | Self::ProjectPeriod(_, period)
            | Self::ZonePeriod(_, period) => TimeIndex::Period(*period),
            Self::ProjectTimepoint(_, timepoint) | Self::ZoneTimepoint(_, timepoint) => {
                TimeIndex::Timepoint(*timepoint)
            }
        }
    }
}

/// A reference to a single, indexed model component
#[derive(Clone, Debug, PartialEq, Eq, Hash, Display)]
#[display("{name}{index}")]
pub struct ComponentRef {
    /// Name of the component family
    pub name: ComponentName,
    /// Index within the family
    pub index: ComponentIndex,
}

impl ComponentRef {
    /// Create a new [`ComponentRef`]
    pub fn new(name: &str, index: ComponentIndex) -> Self {
        Self {
            name: ComponentName::new(name),
            index,
        }
    }
}

/// A symbol appearing in a [`LinearExpr`]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Symbol {
    /// A decision variable
    Variable(ComponentRef),
    /// A named expression, which will be substituted during assembly
    Expression(ComponentRef),
    /// Either a variable or a named expression, whichever is defined under the name
    Component(ComponentRef),
}

/// A linear combination of symbols plus a constant
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LinearExpr {
    terms: IndexMap<Symbol, f64>,
    constant: f64,
}

impl LinearExpr {
    /// An expression consisting of a single decision variable
    pub fn variable(name: &str, index: ComponentIndex) -> Self {
        Self::from_symbol(Symbol::Variable(ComponentRef::new(name, index)))
    }

    /// An expression consisting of a single reference to a named expression
    pub fn expression(name: &str, index: ComponentIndex) -> Self {
        Self::from_symbol(Symbol::Expression(ComponentRef::new(name, index)))
    }

    /// An expression consisting of a single reference to a variable or named expression
    pub fn component(name: &str, index: ComponentIndex) -> Self {
        Self::from_symbol(Symbol::Component(ComponentRef::new(name, index)))
    }

    fn from_symbol(symbol: Symbol) -> Self {
        let mut expr = Self::default();
        expr.add_term(symbol, 1.0);
        expr
    }

    /// Add `coeff * symbol` to the expression
    pub fn add_term(&mut self, symbol: Symbol, coeff: f64) {
        *self.terms.entry(symbol).or_insert(0.0) += coeff;
    }

    /// Iterate over the symbols and their coefficients
    pub fn iter_terms(&self) -> impl Iterator<Item = (&Symbol, f64)> {
        self.terms.iter().map(|(symbol, coeff)| (symbol, *coeff))
    }

    /// The constant term
    pub fn constant(&self) -> f64 {
        self.constant
    }

    /// Whether the expression has no symbols
    pub fn is_constant(&self) -> bool {
        self.terms.is_empty()
    }
}

impl From<f64> for LinearExpr {
    fn from(value: f64) -> Self {
        Self {
            terms: IndexMap::new(),
            constant: value,
        }
    }
}

impl AddAssign for LinearExpr {
    fn add_assign(&mut self, rhs: Self) {
        for (symbol, coeff) in rhs.terms {
            self.add_term(symbol, coeff);
        }
        self.constant += rhs.constant;
    }
}

impl SubAssign for LinearExpr {
    fn sub_assign(&mut self, rhs: Self) {
        *self += -rhs;
    }
}

impl Add for LinearExpr {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self += rhs;
        self
    }
}

impl Add<f64> for LinearExpr {
    type Output = Self;

    fn add(mut self, rhs: f64) -> Self {
        self.constant += rhs;
        self
    }
}

impl Sub for LinearExpr {
    type Output = Self;

    fn sub(mut self, rhs: Self) -> Self {
        self -= rhs;
        self
    }
}

impl Sub<f64> for LinearExpr {
    type Output = Self;

    fn sub(mut self, rhs: f64) -> Self {
        self.constant -= rhs;
        self
    }
}

impl Mul<f64> for LinearExpr {
    type Output = Self;

    fn mul(mut self, rhs: f64) -> Self {
        for coeff in self.terms.values_mut() {
            *coeff *= rhs;
        }
        self.constant *= rhs;
        self
    }
}

impl Mul<LinearExpr> for f64 {
    type Output = LinearExpr;

    fn mul(self, rhs: LinearExpr) -> LinearExpr {
        rhs * self
    }
}

impl Neg for LinearExpr {
    type Output = Self;

    fn neg(self) -> Self {
        self * -1.0
    }
}

impl Sum for LinearExpr {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), |acc, expr| acc + expr)
    }
}

/// The relation between the two sides of a constraint
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum ConstraintSense {
    /// `lhs <= rhs`
    #[display("<=")]
    LessOrEqual,
    /// `lhs == rhs`
    #[display("==")]
    Equal,
    /// `lhs >= rhs`
    #[display(">=")]
    GreaterOrEqual,
}

/// A linear constraint
#[derive(Clone, Debug, PartialEq)]
pub struct Constraint {
    /// Left-hand side
    pub lhs: LinearExpr,
    /// Relation between the two sides
    pub sense: ConstraintSense,
    /// Right-hand side
    pub rhs: LinearExpr,
}

impl Constraint {
    /// Create a constraint of the form `lhs <= rhs`
    pub fn less_or_equal(lhs: impl Into<LinearExpr>, rhs: impl Into<LinearExpr>) -> Self {
        Self::new(lhs.into(), ConstraintSense::LessOrEqual, rhs.into())
    }

    /// Create a constraint of the form `lhs == rhs`
    pub fn equal(lhs: impl Into<LinearExpr>, rhs: impl Into<LinearExpr>) -> Self {
        Self::new(lhs.into(), ConstraintSense::Equal, rhs.into())
    }

    /// Create a constraint of the form `lhs >= rhs`
    pub fn greater_or_equal(lhs: impl Into<LinearExpr>, rhs: impl Into<LinearExpr>) -> Self {
        Self::new(lhs.into(), ConstraintSense::GreaterOrEqual, rhs.into())
    }

    fn new(lhs: LinearExpr, sense: ConstraintSense, rhs: LinearExpr) -> Self {
        Self { lhs, sense, rhs }
    }
}

/// Lower and upper bounds for a decision variable (`None` means unbounded)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    /// Lower bound
    pub lower: Option<f64>,
    /// Upper bound
    pub upper: Option<f64>,
}

impl Bounds {
    /// The variable must be greater than or equal to zero
    pub const NON_NEGATIVE: Self = Self {
        lower: Some(0.0),
        upper: None,
    };

    /// The variable may take any value
    pub const FREE: Self = Self {
        lower: None,
        upper: None,
    };

    /// The variable must lie between `lower` and `upper` inclusive
    pub fn between(lower: f64, upper: f64) -> Self {
        Self {
            lower: Some(lower),
            upper: Some(upper),
        }
    }

    /// The variable is fixed to the given value
    pub fn fixed(value: f64) -> Self {
        Self::between(value, value)
    }
}

/// The kind of a family of model components
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum ComponentKind {
    /// Decision variables
    #[display("variable")]
    Variable,
    /// Named expressions
    #[display("expression")]
    Expression,
    /// Constraints
    #[display("constraint")]
    Constraint,
}

type ComponentFamilies<T> = IndexMap<ComponentName, IndexMap<ComponentIndex, T>>;

/// An optimisation model under construction
#[derive(Default, Debug)]
pub struct Formulation {
    variables: ComponentFamilies<Bounds>,
    expressions: ComponentFamilies<LinearExpr>,
    constraints: ComponentFamilies<Constraint>,
    objective: Option<LinearExpr>,
}

impl Formulation {
    /// Add a decision variable, returning an expression referring to it
    pub fn add_variable(
        &mut self,
        name: &str,
        index: ComponentIndex,
        bounds: Bounds,
    ) -> Result<LinearExpr> {
        self.check_kind(name, ComponentKind::Variable)?;
        insert_component(
            &mut self.variables,
            ComponentKind::Variable,
            name,
            index.clone(),
            bounds,
        )?;

        Ok(LinearExpr::variable(name, index))
    }

    /// Add a named expression
    pub fn add_expression(
        &mut self,
        name: &str,
        index: ComponentIndex,
        expr: LinearExpr,
    ) -> Result<()> {
        self.check_kind(name, ComponentKind::Expression)?;
        insert_component(
            &mut self.expressions,
            ComponentKind::Expression,
            name,
            index,
            expr,
        )
    }

    /// Add a constraint
    pub fn add_constraint(
        &mut self,
        name: &str,
        index: ComponentIndex,
        constraint: Constraint,
    ) -> Result<()> {
        self.check_kind(name, ComponentKind::Constraint)?;
        insert_component(
            &mut self.constraints,
            ComponentKind::Constraint,
            name,
            index,
            constraint,
        )
    }

    /// Declare a family of variables or expressions without adding any members.
    ///
    /// A registered component must be defined even if it ends up with no members, e.g. a cost
    /// for projects of which there are none in this subproblem.
    pub fn declare(&mut self, name: &str, kind: ComponentKind) -> Result<()> {
        self.check_kind(name, kind)?;
        let name = ComponentName::new(name);
        match kind {
            ComponentKind::Variable => {
                self.variables.entry(name).or_default();
            }
            ComponentKind::Expression => {
                self.expressions.entry(name).or_default();
            }
            ComponentKind::Constraint => {
                self.constraints.entry(name).or_default();
            }
        }

        Ok(())
    }

    /// Set the objective, which is always minimised. It can only be set once.
    pub fn set_objective(&mut self, objective: LinearExpr) -> Result<()> {
        ensure!(self.objective.is_none(), "Objective has already been set");
        self.objective = Some(objective);

        Ok(())
    }

    /// Get the kind of the component family with the given name, if it is defined
    pub fn kind_of(&self, name: &str) -> Option<ComponentKind> {
        if self.variables.contains_key(name) {
            Some(ComponentKind::Variable)
        } else if self.expressions.contains_key(name) {
            Some(ComponentKind::Expression)
        } else if self.constraints.contains_key(name) {
            Some(ComponentKind::Constraint)
        } else {
            None
        }
    }

    /// Get the indices of a family of variables or expressions
    pub fn indices(&self, name: &str) -> Option<Vec<ComponentIndex>> {
        self.variables
            .get(name)
            .map(|family| family.keys().cloned().collect())
            .or_else(|| {
                self.expressions
                    .get(name)
                    .map(|family| family.keys().cloned().collect())
            })
    }

    /// Get a named expression
    pub fn expression(&self, name: &str, index: &ComponentIndex) -> Option<&LinearExpr> {
        self.expressions.get(name)?.get(index)
    }

    /// Get a constraint
    pub fn constraint(&self, name: &str, index: &ComponentIndex) -> Option<&Constraint> {
        self.constraints.get(name)?.get(index)
    }

    /// Get the number of members of each component family, in the order they were added
    pub fn summary(&self) -> Vec<(ComponentName, ComponentKind, usize)> {
        fn counts<T>(
            families: &ComponentFamilies<T>,
            kind: ComponentKind,
        ) -> impl Iterator<Item = (ComponentName, ComponentKind, usize)> + '_ {
            families
                .iter()
                .map(move |(name, family)| (name.clone(), kind, family.len()))
        }

        counts(&self.variables, ComponentKind::Variable)
            .chain(counts(&self.expressions, ComponentKind::Expression))
            .chain(counts(&self.constraints, ComponentKind::Constraint))
            .collect()
    }

    /// Check that a name is not already used by a different kind of component
    fn check_kind(&self, name: &str, kind: ComponentKind) -> Result<()> {
        if let Some(existing) = self.kind_of(name) {
            ensure!(
                existing == kind,
                "Cannot add {kind} {name}: name is already used for a {existing}"
            );
        }

        Ok(())
    }
}

/// Insert a member into a component family, checking for duplicates
fn insert_component<T>(
    families: &mut ComponentFamilies<T>,
    kind: ComponentKind,
    name: &str,
    index: ComponentIndex,
    value: T,
) -> Result<()> {
    let family = families.entry(ComponentName::new(name)).or_default();
    ensure!(
        !family.contains_key(&index),
        "Duplicate {kind} {name}{index}"
    );
    family.insert(index, value);

    Ok(())
}
