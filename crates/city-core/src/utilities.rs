//! Utility networks and the service that maintains them.
//!
//! Each [`UtilityNetwork`] is a capacity ledger for one commodity. A
//! [`UtilityService`] owns exactly one network per [`UtilityType`] and a
//! maintenance budget.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Commodities distributed to buildings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum UtilityType {
    /// Power grid, loaded in kW.
    Electricity,
    /// Water mains, loaded in m³.
    Water,
    /// Gas distribution, loaded in m³.
    Gas,
    /// Broadband, loaded in Mbps.
    Internet,
}

impl UtilityType {
    pub const ALL: [UtilityType; 4] = [
        UtilityType::Electricity,
        UtilityType::Water,
        UtilityType::Gas,
        UtilityType::Internet,
    ];

    pub fn name(self) -> &'static str {
        match self {
            UtilityType::Electricity => "Electricity",
            UtilityType::Water => "Water",
            UtilityType::Gas => "Gas",
            UtilityType::Internet => "Internet",
        }
    }

    /// Per-resident demand: kW, m³, m³ and Mbps respectively.
    pub fn per_resident_consumption(self) -> f64 {
        match self {
            UtilityType::Electricity => 2.5,
            UtilityType::Water => 0.15,
            UtilityType::Gas => 1.2,
            UtilityType::Internet => 5.0,
        }
    }
}

/// Stable identifier for a residential building.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BuildingId(pub u32);

/// A residential building whose utility demand scales with its residents.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResidentialBuilding {
    /// Identity used by every network's connection table.
    pub id: BuildingId,
    /// Street address, informational only.
    pub address: String,
    residents: u32,
}

impl ResidentialBuilding {
    pub fn new(id: BuildingId, address: impl Into<String>, residents: u32) -> Self {
        Self {
            id,
            address: address.into(),
            residents,
        }
    }

    pub fn residents(&self) -> u32 {
        self.residents
    }

    /// Networks keep the load recorded at connection time, so changing the
    /// headcount does not alter already-connected loads.
    pub fn set_residents(&mut self, residents: u32) {
        self.residents = residents;
    }

    pub fn consumption(&self, utility: UtilityType) -> f64 {
        f64::from(self.residents) * utility.per_resident_consumption()
    }
}

/// Capacity-bounded distribution network for a single commodity.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UtilityNetwork {
    /// Utility carried by this network.
    pub utility_type: UtilityType,
    capacity: f64,
    current_load: f64,
    connections: BTreeMap<BuildingId, f64>,
    operational: bool,
}

impl UtilityNetwork {
    pub fn new(utility_type: UtilityType, capacity: f64) -> Self {
        Self {
            utility_type,
            capacity: if capacity.is_finite() { capacity.max(0.0) } else { 0.0 },
            current_load: 0.0,
            connections: BTreeMap::new(),
            operational: true,
        }
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn current_load(&self) -> f64 {
        self.current_load
    }

    pub fn remaining_capacity(&self) -> f64 {
        (self.capacity - self.current_load).max(0.0)
    }

    /// Load as a fraction of capacity.
    pub fn utilization(&self) -> f64 {
        if self.capacity <= 0.0 {
            0.0
        } else {
            self.current_load / self.capacity
        }
    }

    pub fn is_operational(&self) -> bool {
        self.operational
    }

    pub fn set_operational(&mut self, operational: bool) {
        self.operational = operational;
    }

    /// Changes capacity; refused when below the current load.
    pub fn set_capacity(&mut self, capacity: f64) -> bool {
        if !capacity.is_finite() || capacity < self.current_load {
            return false;
        }
        self.capacity = capacity;
        true
    }

    pub fn is_connected(&self, id: BuildingId) -> bool {
        self.connections.contains_key(&id)
    }

    pub fn connected_buildings(&self) -> impl Iterator<Item = BuildingId> + '_ {
        self.connections.keys().copied()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Connects `building`, adding its demand to the load.
    ///
    /// Returns `false` if the network is down, the building is already
    /// connected, or the new load would exceed capacity.
    pub fn connect_building(&mut self, building: &ResidentialBuilding) -> bool {
        if !self.operational || self.is_connected(building.id) {
            return false;
        }
        let demand = building.consumption(self.utility_type);
        if self.current_load + demand > self.capacity {
            debug!(
                utility = self.utility_type.name(),
                building = building.id.0,
                demand,
                remaining = self.remaining_capacity(),
                "connection exceeds capacity"
            );
            return false;
        }
        self.connections.insert(building.id, demand);
        self.current_load += demand;
        true
    }

    /// Disconnects `building`, releasing the load it was connected with.
    /// Returns `false` if it was not connected.
    pub fn disconnect_building(&mut self, building: &ResidentialBuilding) -> bool {
        self.disconnect(building.id)
    }

    pub fn disconnect(&mut self, id: BuildingId) -> bool {
        match self.connections.remove(&id) {
            Some(demand) => {
                self.current_load = (self.current_load - demand).max(0.0);
                if self.connections.is_empty() {
                    self.current_load = 0.0;
                }
                true
            }
            None => false,
        }
    }
}

/// Behaviour of [`UtilityService::connect_building_to_utilities`] when some
/// networks refuse the building.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionPolicy {
    /// Keep whatever connections succeeded; the building may end up on a
    /// subset of the networks.
    #[default]
    AsIs,
    /// Undo the connections made by the failed call.
    Atomic,
}

/// The four utility networks plus the budget that pays for their upkeep.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UtilityService {
    networks: BTreeMap<UtilityType, UtilityNetwork>,
    budget: Decimal,
    maintenance_cost: Decimal,
    policy: ConnectionPolicy,
}

impl UtilityService {
    /// Creates one network per utility type. Types missing from `capacities`
    /// get a zero-capacity network.
    pub fn new(
        capacities: &BTreeMap<UtilityType, f64>,
        budget: Decimal,
        maintenance_cost: Decimal,
        policy: ConnectionPolicy,
    ) -> Self {
        let networks = UtilityType::ALL
            .iter()
            .map(|&t| {
                let capacity = capacities.get(&t).copied().unwrap_or(0.0);
                (t, UtilityNetwork::new(t, capacity))
            })
            .collect();
        Self {
            networks,
            budget,
            maintenance_cost: maintenance_cost.max(Decimal::ZERO),
            policy,
        }
    }

    pub fn budget(&self) -> Decimal {
        self.budget
    }

    pub fn maintenance_cost(&self) -> Decimal {
        self.maintenance_cost
    }

    pub fn policy(&self) -> ConnectionPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: ConnectionPolicy) {
        self.policy = policy;
    }

    pub fn network(&self, utility: UtilityType) -> Option<&UtilityNetwork> {
        self.networks.get(&utility)
    }

    pub fn network_mut(&mut self, utility: UtilityType) -> Option<&mut UtilityNetwork> {
        self.networks.get_mut(&utility)
    }

    pub fn networks(&self) -> impl Iterator<Item = &UtilityNetwork> + '_ {
        self.networks.values()
    }

    /// Utilities the building is currently connected to.
    pub fn connected_utilities(&self, id: BuildingId) -> Vec<UtilityType> {
        self.networks
            .values()
            .filter(|n| n.is_connected(id))
            .map(|n| n.utility_type)
            .collect()
    }

    /// Tries every network and returns `true` only if all of them accepted
    /// the building.
    ///
    /// Under [`ConnectionPolicy::AsIs`] a `false` result can leave the
    /// building attached to some of the networks. This reproduces the
    /// historical behaviour and is likely a bug; use
    /// [`ConnectionPolicy::Atomic`] for all-or-nothing semantics.
    pub fn connect_building_to_utilities(&mut self, building: &ResidentialBuilding) -> bool {
        let mut joined = Vec::with_capacity(self.networks.len());
        let mut refused = Vec::new();
        for network in self.networks.values_mut() {
            if network.connect_building(building) {
                joined.push(network.utility_type);
            } else {
                refused.push(network.utility_type);
            }
        }
        if refused.is_empty() {
            return true;
        }
        match self.policy {
            ConnectionPolicy::AsIs => {
                if !joined.is_empty() {
                    warn!(
                        building = building.id.0,
                        ?joined,
                        ?refused,
                        "building left partially connected"
                    );
                }
            }
            ConnectionPolicy::Atomic => {
                for utility in &joined {
                    if let Some(network) = self.networks.get_mut(utility) {
                        network.disconnect(building.id);
                    }
                }
                debug!(building = building.id.0, ?refused, "connection rolled back");
            }
        }
        false
    }

    /// Detaches the building everywhere; returns how many networks released it.
    pub fn disconnect_building_from_utilities(&mut self, building: &ResidentialBuilding) -> usize {
        self.networks
            .values_mut()
            .filter_map(|n| n.disconnect(building.id).then_some(()))
            .count()
    }

    /// Adds money to the maintenance budget; negative amounts are refused.
    pub fn fund(&mut self, amount: Decimal) -> bool {
        if amount < Decimal::ZERO {
            return false;
        }
        self.budget += amount;
        true
    }

    /// Pays the fixed maintenance cost. Returns `false` and changes nothing
    /// when the budget cannot cover it.
    pub fn perform_maintenance(&mut self) -> bool {
        if self.budget < self.maintenance_cost {
            warn!(
                budget = %self.budget,
                cost = %self.maintenance_cost,
                "maintenance skipped, budget exhausted"
            );
            return false;
        }
        self.budget -= self.maintenance_cost;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn building(id: u32, residents: u32) -> ResidentialBuilding {
        ResidentialBuilding::new(BuildingId(id), format!("{id} Main St"), residents)
    }

    fn service(capacity: f64, policy: ConnectionPolicy) -> UtilityService {
        let caps = UtilityType::ALL.iter().map(|&t| (t, capacity)).collect();
        UtilityService::new(&caps, Decimal::new(1000, 0), Decimal::new(300, 0), policy)
    }

    #[test]
    fn consumption_follows_coefficients() {
        let b = building(1, 10);
        assert_eq!(b.consumption(UtilityType::Electricity), 25.0);
        assert_eq!(b.consumption(UtilityType::Internet), 50.0);
    }

    #[test]
    fn double_connect_is_rejected() {
        let mut net = UtilityNetwork::new(UtilityType::Electricity, 100.0);
        let b = building(1, 4);
        assert!(net.connect_building(&b));
        assert!(!net.connect_building(&b));
        assert_eq!(net.current_load(), 10.0);
        assert_eq!(net.connection_count(), 1);
    }

    #[test]
    fn connect_respects_capacity() {
        let mut net = UtilityNetwork::new(UtilityType::Water, 1.5);
        assert!(net.connect_building(&building(1, 10)));
        assert!(!net.connect_building(&building(2, 1)));
        assert!(!net.is_connected(BuildingId(2)));
    }

    #[test]
    fn disconnect_releases_recorded_load() {
        let mut net = UtilityNetwork::new(UtilityType::Electricity, 100.0);
        let mut b = building(7, 4);
        assert!(net.connect_building(&b));
        b.set_residents(40);
        assert!(net.disconnect_building(&b));
        assert_eq!(net.current_load(), 0.0);
        assert!(!net.disconnect_building(&b));
    }

    #[test]
    fn down_network_refuses_connections() {
        let mut net = UtilityNetwork::new(UtilityType::Gas, 100.0);
        net.set_operational(false);
        assert!(!net.connect_building(&building(1, 1)));
        net.set_operational(true);
        assert!(net.connect_building(&building(1, 1)));
        assert!(!net.set_capacity(0.5));
    }

    #[test]
    fn full_connection_succeeds() {
        let mut svc = service(1000.0, ConnectionPolicy::AsIs);
        let b = building(1, 10);
        assert!(svc.connect_building_to_utilities(&b));
        assert_eq!(svc.connected_utilities(b.id).len(), 4);
        assert_eq!(svc.disconnect_building_from_utilities(&b), 4);
        assert!(svc.connected_utilities(b.id).is_empty());
    }

    #[test]
    fn as_is_policy_leaves_partial_connection() {
        // 20 residents: electricity 50, water 3, gas 24, internet 100.
        let mut svc = service(60.0, ConnectionPolicy::AsIs);
        let b = building(3, 20);
        assert!(!svc.connect_building_to_utilities(&b));
        let joined = svc.connected_utilities(b.id);
        assert_eq!(
            joined,
            vec![UtilityType::Electricity, UtilityType::Water, UtilityType::Gas]
        );
        let internet = svc.network(UtilityType::Internet).unwrap();
        assert_eq!(internet.current_load(), 0.0);
    }

    #[test]
    fn atomic_policy_rolls_back() {
        let mut svc = service(60.0, ConnectionPolicy::Atomic);
        let b = building(3, 20);
        assert!(!svc.connect_building_to_utilities(&b));
        assert!(svc.connected_utilities(b.id).is_empty());
        for net in svc.networks() {
            assert_eq!(net.current_load(), 0.0);
        }
    }

    #[test]
    fn atomic_rollback_keeps_prior_connections() {
        let mut svc = service(60.0, ConnectionPolicy::Atomic);
        let b = building(4, 1);
        let water = svc.network_mut(UtilityType::Water).unwrap();
        assert!(water.connect_building(&b));
        // Water refuses the duplicate, so the others are rolled back but
        // the pre-existing water connection stays.
        assert!(!svc.connect_building_to_utilities(&b));
        assert_eq!(svc.connected_utilities(b.id), vec![UtilityType::Water]);
    }

    #[test]
    fn maintenance_is_budget_gated() {
        let mut svc = service(10.0, ConnectionPolicy::AsIs);
        assert!(svc.perform_maintenance());
        assert!(svc.perform_maintenance());
        assert!(svc.perform_maintenance());
        assert_eq!(svc.budget(), Decimal::new(100, 0));
        assert!(!svc.perform_maintenance());
        assert_eq!(svc.budget(), Decimal::new(100, 0));
        assert!(!svc.fund(Decimal::new(-5, 0)));
        assert!(svc.fund(Decimal::new(200, 0)));
        assert!(svc.perform_maintenance());
        assert_eq!(svc.budget(), Decimal::ZERO);
    }

    proptest! {
        #[test]
        fn load_never_exceeds_capacity(capacity in 0.0f64..500.0,
                                       ops in proptest::collection::vec((0u32..8, 0u32..40, any::<bool>()), 0..40)) {
            let mut net = UtilityNetwork::new(UtilityType::Electricity, capacity);
            for (id, residents, connect) in ops {
                let b = building(id, residents);
                if connect {
                    net.connect_building(&b);
                } else {
                    net.disconnect_building(&b);
                }
                prop_assert!(net.current_load() <= net.capacity() + 1e-9);
                prop_assert!(net.current_load() >= 0.0);
            }
        }
    }
}
