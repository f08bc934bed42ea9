//! Geographic zones. Load zones, carbon cap zones, local capacity zones and reserve balancing
//! areas all share the same ID type.
use crate::id::define_id_type;
use indexmap::IndexMap;

define_id_type! {ZoneID}

/// A map of [`LoadZone`]s, keyed by zone ID
pub type LoadZoneMap = IndexMap<ZoneID, LoadZone>;

/// A zone within which supply and demand must balance in every timepoint
#[derive(PartialEq, Debug, Clone)]
pub struct LoadZone {
    /// Unique identifier for the zone (e.g. "Zone1")
    pub id: ZoneID,
    /// Whether load may go unserved (at a penalty)
    pub allow_unserved_energy: bool,
    /// Penalty per MWh of unserved energy
    pub unserved_energy_penalty_per_mwh: f64,
    /// Whether production may exceed load (at a penalty)
    pub allow_overgeneration: bool,
    /// Penalty per MWh of overgeneration
    pub overgeneration_penalty_per_mwh: f64,
}

/// A map of [`PolicyZone`]s, keyed by zone ID
pub type PolicyZoneMap = IndexMap<ZoneID, PolicyZone>;

/// A zone in which a policy or reserve requirement applies (e.g. a carbon cap zone)
#[derive(PartialEq, Debug, Clone)]
pub struct PolicyZone {
    /// Unique identifier for the zone
    pub id: ZoneID,
    /// Whether the requirement may be violated (at a penalty)
    pub allow_violation: bool,
    /// Penalty per unit of violation
    pub violation_penalty: f64,
}
