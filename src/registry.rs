//! The registry through which modules contribute terms to shared aggregate constraints.
//!
//! Building a model happens in two phases. In the registration phase, every module records the
//! names of the components it will contribute (e.g. "my power output counts towards load
//! balance") in a [`RegistryBuilder`]. The builder is then frozen into a read-only [`Registry`],
//! which is the only thing aggregate constraint builders accept. As freezing consumes the builder,
//! nothing can be registered once aggregation has started, and an aggregate constraint can never
//! be built from a partially populated registry.
use crate::formulation::{ComponentIndex, ComponentKind, ComponentName, Formulation, LinearExpr};
use crate::project::ProjectID;
use crate::system::reserves::ReserveKind;
use anyhow::{Result, bail, ensure};
use derive_more::Display;
use indexmap::{IndexMap, IndexSet};

/// Keys for system-wide registries
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
pub enum RegistryKey {
    /// Components adding to the supply side of the load balance
    #[display("load balance production")]
    LoadBalanceProduction,
    /// Components adding to the demand side of the load balance
    #[display("load balance consumption")]
    LoadBalanceConsumption,
    /// Components counting towards carbon cap zone emissions
    #[display("carbon cap emissions")]
    CarbonCapEmissions,
    /// Components counting towards local capacity requirements
    #[display("local capacity contributions")]
    LocalCapacityContributions,
    /// Components providing the given kind of reserve in a balancing area
    #[display("{_0} provision")]
    ReserveProvision(ReserveKind),
    /// Costs to be included in the objective
    #[display("objective costs")]
    ObjectiveCosts,
}

/// Keys for per-project registries
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
pub enum ProjectRegistryKey {
    /// Upward services which must fit between a project's output and its maximum
    #[display("headroom")]
    Headroom,
    /// Downward services which must fit between a project's output and its minimum
    #[display("footroom")]
    Footroom,
}

type Components = IndexMap<RegistryKey, IndexSet<ComponentName>>;
type ProjectComponents = IndexMap<(ProjectRegistryKey, ProjectID), IndexSet<ComponentName>>;

/// Collects registrations during the registration phase of a model build
#[derive(Default, Debug)]
pub struct RegistryBuilder {
    components: Components,
    project_components: ProjectComponents,
}

impl RegistryBuilder {
    /// Register a component under a system-wide key.
    ///
    /// The named component must be a variable or expression which is defined by the time the
    /// model is assembled.
    pub fn register(&mut self, key: RegistryKey, name: &str) -> Result<()> {
        let added = self
            .components
            .entry(key)
            .or_default()
            .insert(ComponentName::new(name));
        ensure!(added, "Component {name} is already registered under {key}");

        Ok(())
    }

    /// Register a component under a per-project key
    pub fn register_for_project(
        &mut self,
        key: ProjectRegistryKey,
        project_id: &ProjectID,
        name: &str,
    ) -> Result<()> {
        let added = self
            .project_components
            .entry((key, project_id.clone()))
            .or_default()
            .insert(ComponentName::new(name));
        ensure!(
            added,
            "Component {name} is already registered under {key} for project {project_id}"
        );

        Ok(())
    }

    /// End the registration phase
    pub fn freeze(self) -> Registry {
        Registry {
            components: self.components,
            project_components: self.project_components,
        }
    }
}

/// A read-only registry, available once every module has registered its components
#[derive(Debug)]
pub struct Registry {
    components: Components,
    project_components: ProjectComponents,
}

impl Registry {
    /// Iterate over the components registered under a key, in registration order
    pub fn components(&self, key: RegistryKey) -> impl Iterator<Item = &ComponentName> {
        self.components.get(&key).into_iter().flatten()
    }

    /// Iterate over the components registered under a key for a project
    pub fn project_components(
        &self,
        key: ProjectRegistryKey,
        project_id: &ProjectID,
    ) -> impl Iterator<Item = &ComponentName> {
        self.project_components
            .get(&(key, project_id.clone()))
            .into_iter()
            .flatten()
    }

    /// Iterate over projects with at least one component registered under a per-project key
    pub fn projects(&self, key: ProjectRegistryKey) -> impl Iterator<Item = &ProjectID> {
        self.project_components
            .keys()
            .filter(move |(k, _)| *k == key)
            .map(|(_, project_id)| project_id)
    }

    /// Sum of every component registered under `key`, at the given index.
    ///
    /// The references are resolved when the model is assembled.
    pub fn sum(&self, key: RegistryKey, index: &ComponentIndex) -> LinearExpr {
        self.components(key)
            .map(|name| LinearExpr::component(&name.0, index.clone()))
            .sum()
    }

    /// Sum of every component registered under `key` for a project, at the given index
    pub fn project_sum(
        &self,
        key: ProjectRegistryKey,
        project_id: &ProjectID,
        index: &ComponentIndex,
    ) -> LinearExpr {
        self.project_components(key, project_id)
            .map(|name| LinearExpr::component(&name.0, index.clone()))
            .sum()
    }

    /// Check that every registered component has been defined as a variable or expression
    pub fn check_defined(&self, formulation: &Formulation) -> Result<()> {
        let registered = self
            .components
            .iter()
            .flat_map(|(key, names)| names.iter().map(move |name| (key.to_string(), name)))
            .chain(
                self.project_components
                    .iter()
                    .flat_map(|((key, project_id), names)| {
                        names
                            .iter()
                            .map(move |name| (format!("{key} for project {project_id}"), name))
                    }),
            );

        for (key, name) in registered {
            match formulation.kind_of(&name.0) {
                Some(ComponentKind::Variable | ComponentKind::Expression) => {}
                Some(ComponentKind::Constraint) => bail!(
                    "Component {name} registered under {key} is a constraint, not a variable or \
                    expression"
                ),
                None => bail!("Component {name} registered under {key} is not defined"),
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use crate::formulation::{Bounds, Symbol};
    use crate::zone::ZoneID;

    fn zone_timepoint() -> ComponentIndex {
        ComponentIndex::ZoneTimepoint(ZoneID::new("Zone1"), 1)
    }

    #[test]
    fn test_register_duplicate() {
        let mut builder = RegistryBuilder::default();
        builder
            .register(RegistryKey::LoadBalanceProduction, "Unserved_Energy_MW")
            .unwrap();

        // The same name can be used under a different key
        builder
            .register(RegistryKey::LoadBalanceConsumption, "Unserved_Energy_MW")
            .unwrap();

        assert_error!(
            builder.register(RegistryKey::LoadBalanceProduction, "Unserved_Energy_MW"),
            "Component Unserved_Energy_MW is already registered under load balance production"
        );

        let project_id = ProjectID::new("Battery1");
        builder
            .register_for_project(ProjectRegistryKey::Headroom, &project_id, "Provide_X_MW")
            .unwrap();
        assert_error!(
            builder.register_for_project(ProjectRegistryKey::Headroom, &project_id, "Provide_X_MW"),
            "Component Provide_X_MW is already registered under headroom for project Battery1"
        );
    }

    #[test]
    fn test_sum() {
        let mut builder = RegistryBuilder::default();
        builder
            .register(RegistryKey::LoadBalanceProduction, "Power_Production_In_Zone_MW")
            .unwrap();
        builder
            .register(RegistryKey::LoadBalanceProduction, "Unserved_Energy_MW")
            .unwrap();
        let registry = builder.freeze();

        let sum = registry.sum(RegistryKey::LoadBalanceProduction, &zone_timepoint());
        let names: Vec<_> = sum
            .iter_terms()
            .map(|(symbol, coeff)| {
                assert_eq!(coeff, 1.0);
                match symbol {
                    Symbol::Component(reference) => reference.name.to_string(),
                    _ => panic!("Unexpected symbol"),
                }
            })
            .collect();
        assert_eq!(names, ["Power_Production_In_Zone_MW", "Unserved_Energy_MW"]);

        // Nothing registered
        assert!(
            registry
                .sum(RegistryKey::CarbonCapEmissions, &zone_timepoint())
                .is_constant()
        );
        assert!(
            registry
                .project_sum(
                    ProjectRegistryKey::Footroom,
                    &"Battery1".into(),
                    &zone_timepoint()
                )
                .is_constant()
        );
    }

    #[test]
    fn test_check_defined() {
        let mut builder = RegistryBuilder::default();
        builder
            .register(RegistryKey::LoadBalanceProduction, "Unserved_Energy_MW")
            .unwrap();
        builder
            .register(RegistryKey::ObjectiveCosts, "Unserved_Energy_Penalty_Cost")
            .unwrap();
        let registry = builder.freeze();

        let mut formulation = Formulation::default();
        formulation
            .add_variable("Unserved_Energy_MW", zone_timepoint(), Bounds::NON_NEGATIVE)
            .unwrap();
        assert_error!(
            registry.check_defined(&formulation),
            "Component Unserved_Energy_Penalty_Cost registered under objective costs is not \
            defined"
        );

        formulation
            .add_expression(
                "Unserved_Energy_Penalty_Cost",
                zone_timepoint(),
                LinearExpr::from(0.0),
            )
            .unwrap();
        assert!(registry.check_defined(&formulation).is_ok());
    }
}
