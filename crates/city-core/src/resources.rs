//! Resource chain: deposits are worked by extraction facilities, output is
//! kept in a capacity-bounded storage and priced by a static market table.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Extraction bonus contributed by each assigned worker (10% per head).
pub const WORKER_BONUS: f64 = 0.1;

/// Decimal places kept on extracted and stored quantities.
pub const QUANTITY_DP: i32 = 6;

/// Buckets holding less than this are treated as empty.
pub const QUANTITY_EPSILON: f64 = 1e-9;

/// Natural resources that can be extracted, stored and traded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    /// Timber from forests.
    Wood,
    /// Quarried building stone.
    Stone,
    /// Iron ore.
    Iron,
    /// Coal seams, the main fuel.
    Coal,
    /// Crude oil wells.
    Oil,
    /// Precious metal, low yield and high price.
    Gold,
}

impl ResourceType {
    pub const ALL: [ResourceType; 6] = [
        ResourceType::Wood,
        ResourceType::Stone,
        ResourceType::Iron,
        ResourceType::Coal,
        ResourceType::Oil,
        ResourceType::Gold,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ResourceType::Wood => "Wood",
            ResourceType::Stone => "Stone",
            ResourceType::Iron => "Iron",
            ResourceType::Coal => "Coal",
            ResourceType::Oil => "Oil",
            ResourceType::Gold => "Gold",
        }
    }
}

fn sanitize(value: f64) -> f64 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}

/// Rounds a quantity to [`QUANTITY_DP`] places so products like
/// `100 × 1.1` come out as exact stock amounts.
pub fn round_quantity(value: f64) -> f64 {
    let scale = 10f64.powi(QUANTITY_DP);
    let rounded = (value * scale).round() / scale;
    if rounded.is_finite() {
        rounded
    } else {
        value
    }
}

/// A depletable natural-resource stock.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResourceDeposit {
    /// Resource held by the deposit.
    pub resource_type: ResourceType,
    capacity: f64,
    current_amount: f64,
    extraction_rate: f64,
    active: bool,
    workers: u32,
}

impl ResourceDeposit {
    /// Creates a full, active deposit with no workers assigned.
    pub fn new(resource_type: ResourceType, capacity: f64, extraction_rate: f64) -> Self {
        let capacity = sanitize(capacity);
        Self {
            resource_type,
            capacity,
            current_amount: capacity,
            extraction_rate: sanitize(extraction_rate),
            active: true,
            workers: 0,
        }
    }

    /// Overrides the remaining stock, clamped to `[0, capacity]`.
    pub fn with_amount(mut self, amount: f64) -> Self {
        self.current_amount = sanitize(amount).min(self.capacity);
        self
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn current_amount(&self) -> f64 {
        self.current_amount
    }

    pub fn extraction_rate(&self) -> f64 {
        self.extraction_rate
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn workers(&self) -> u32 {
        self.workers
    }

    pub fn activate(&mut self) {
        self.active = true;
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }

    pub(crate) fn set_workers(&mut self, workers: u32) {
        self.workers = workers;
    }

    pub fn is_depleted(&self) -> bool {
        self.current_amount <= 0.0
    }

    /// Remaining stock as a fraction of capacity; 0 for an empty-capacity deposit.
    pub fn remaining_fraction(&self) -> f64 {
        if self.capacity <= 0.0 {
            0.0
        } else {
            (self.current_amount / self.capacity).clamp(0.0, 1.0)
        }
    }

    /// Amount the next call to [`extract_resource`](Self::extract_resource)
    /// would yield, without touching the stock.
    pub fn potential_extraction(&self) -> f64 {
        if !self.active || self.is_depleted() {
            return 0.0;
        }
        let bonus = 1.0 + f64::from(self.workers) * WORKER_BONUS;
        let rate = round_quantity(self.extraction_rate * bonus);
        rate.min(self.current_amount).max(0.0)
    }

    /// Extracts `rate × (1 + workers × 0.1)` clamped to the remaining stock.
    ///
    /// Returns the extracted amount, or 0 when inactive or depleted.
    pub fn extract_resource(&mut self) -> f64 {
        let amount = self.potential_extraction();
        if amount <= 0.0 {
            return 0.0;
        }
        self.current_amount = (self.current_amount - amount).max(0.0);
        if self.is_depleted() {
            debug!(resource = self.resource_type.name(), "deposit depleted");
        }
        amount
    }
}

/// A facility working a single deposit with a bounded workforce.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExtractionFacility {
    /// Display name.
    pub name: String,
    deposit: ResourceDeposit,
    efficiency: f64,
    max_workers: u32,
}

impl ExtractionFacility {
    /// Takes ownership of `deposit`. Efficiency is clamped to `[0, 1]` and any
    /// workers already on the deposit are trimmed to `max_workers`.
    pub fn new(
        name: impl Into<String>,
        mut deposit: ResourceDeposit,
        efficiency: f64,
        max_workers: u32,
    ) -> Self {
        deposit.set_workers(deposit.workers().min(max_workers));
        Self {
            name: name.into(),
            deposit,
            efficiency: sanitize(efficiency).min(1.0),
            max_workers,
        }
    }

    pub fn deposit(&self) -> &ResourceDeposit {
        &self.deposit
    }

    pub fn resource_type(&self) -> ResourceType {
        self.deposit.resource_type
    }

    pub fn efficiency(&self) -> f64 {
        self.efficiency
    }

    pub fn max_workers(&self) -> u32 {
        self.max_workers
    }

    pub fn workers(&self) -> u32 {
        self.deposit.workers()
    }

    /// Adds one worker; does nothing and returns `false` at the limit.
    pub fn hire_worker(&mut self) -> bool {
        let workers = self.deposit.workers();
        if workers >= self.max_workers {
            return false;
        }
        self.deposit.set_workers(workers + 1);
        true
    }

    /// Removes one worker; returns `false` when nobody is employed.
    pub fn fire_worker(&mut self) -> bool {
        let workers = self.deposit.workers();
        if workers == 0 {
            return false;
        }
        self.deposit.set_workers(workers - 1);
        true
    }

    pub fn set_active(&mut self, active: bool) {
        if active {
            self.deposit.activate();
        } else {
            self.deposit.deactivate();
        }
    }

    /// Output the next [`operate`](Self::operate) call would deliver.
    pub fn potential_yield(&self) -> f64 {
        round_quantity(self.deposit.potential_extraction() * self.efficiency)
    }

    /// Extracts from the deposit and returns the usable output after
    /// efficiency losses.
    pub fn operate(&mut self) -> f64 {
        round_quantity(self.deposit.extract_resource() * self.efficiency)
    }
}

/// Capacity-bounded warehouse shared by all resource types.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResourceStorage {
    capacity: f64,
    stored: BTreeMap<ResourceType, f64>,
}

impl ResourceStorage {
    pub fn new(capacity: f64) -> Self {
        Self {
            capacity: sanitize(capacity),
            stored: BTreeMap::new(),
        }
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn total_stored(&self) -> f64 {
        self.stored.values().sum()
    }

    pub fn available_space(&self) -> f64 {
        (self.capacity - self.total_stored()).max(0.0)
    }

    pub fn amount_of(&self, resource: ResourceType) -> f64 {
        self.stored.get(&resource).copied().unwrap_or(0.0)
    }

    /// Non-empty buckets in resource order.
    pub fn iter(&self) -> impl Iterator<Item = (ResourceType, f64)> + '_ {
        self.stored
            .iter()
            .filter(|(_, amount)| **amount > QUANTITY_EPSILON)
            .map(|(r, a)| (*r, *a))
    }

    fn projected(
        &self,
        resource: ResourceType,
        amount: f64,
    ) -> Option<BTreeMap<ResourceType, f64>> {
        if !amount.is_finite() || amount < 0.0 {
            return None;
        }
        // Sum the projected buckets so the check matches `total_stored` exactly.
        let mut projected = self.stored.clone();
        *projected.entry(resource).or_insert(0.0) += amount;
        (projected.values().sum::<f64>() <= self.capacity).then_some(projected)
    }

    /// Whether [`add_resource`](Self::add_resource) would accept `amount`.
    pub fn can_add(&self, resource: ResourceType, amount: f64) -> bool {
        amount == 0.0 || self.projected(resource, amount).is_some()
    }

    /// Whether [`remove_resource`](Self::remove_resource) would accept `amount`.
    pub fn can_remove(&self, resource: ResourceType, amount: f64) -> bool {
        amount.is_finite()
            && amount >= 0.0
            && amount <= self.amount_of(resource) + QUANTITY_EPSILON
    }

    /// Adds `amount` of `resource`. Returns `false` and leaves the storage
    /// untouched if the total would exceed capacity or the amount is not a
    /// finite non-negative number.
    pub fn add_resource(&mut self, resource: ResourceType, amount: f64) -> bool {
        if amount == 0.0 {
            return true;
        }
        match self.projected(resource, amount) {
            Some(projected) => {
                self.stored = projected;
                true
            }
            None => {
                debug!(
                    resource = resource.name(),
                    amount,
                    capacity = self.capacity,
                    "storage rejected deposit"
                );
                false
            }
        }
    }

    /// Removes `amount` of `resource`; `false` if not enough is stored.
    /// A bucket left with less than [`QUANTITY_EPSILON`] is dropped.
    pub fn remove_resource(&mut self, resource: ResourceType, amount: f64) -> bool {
        if !self.can_remove(resource, amount) {
            return false;
        }
        let held = self.amount_of(resource);
        let left = held - amount;
        if left <= QUANTITY_EPSILON {
            self.stored.remove(&resource);
        } else if let Some(bucket) = self.stored.get_mut(&resource) {
            *bucket = left;
        }
        true
    }
}

/// Static unit-price table for resources.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResourceMarket {
    prices: BTreeMap<ResourceType, Decimal>,
}

impl Default for ResourceMarket {
    fn default() -> Self {
        let prices = [
            (ResourceType::Wood, Decimal::new(10, 0)),
            (ResourceType::Stone, Decimal::new(15, 0)),
            (ResourceType::Iron, Decimal::new(40, 0)),
            (ResourceType::Coal, Decimal::new(25, 0)),
            (ResourceType::Oil, Decimal::new(60, 0)),
            (ResourceType::Gold, Decimal::new(500, 0)),
        ];
        Self {
            prices: prices.into_iter().collect(),
        }
    }
}

impl ResourceMarket {
    /// Builds a market from explicit prices; negative prices are dropped.
    pub fn new(prices: impl IntoIterator<Item = (ResourceType, Decimal)>) -> Self {
        Self {
            prices: prices
                .into_iter()
                .filter(|(_, p)| *p >= Decimal::ZERO)
                .collect(),
        }
    }

    pub fn price_of(&self, resource: ResourceType) -> Option<Decimal> {
        self.prices.get(&resource).copied()
    }

    /// Replaces a unit price; negative prices are refused.
    pub fn set_price(&mut self, resource: ResourceType, price: Decimal) -> bool {
        if price < Decimal::ZERO {
            return false;
        }
        self.prices.insert(resource, price);
        true
    }

    /// Value of `amount` units at the listed price, rounded to cents.
    /// `None` when unpriced, for invalid amounts, or when the value does not
    /// fit in a `Decimal`.
    pub fn value_of(&self, resource: ResourceType, amount: f64) -> Option<Decimal> {
        if !amount.is_finite() || amount < 0.0 {
            return None;
        }
        let price = self.price_of(resource)?;
        let qty = Decimal::from_f64(amount)?;
        Some(price.checked_mul(qty)?.round_dp(2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn worker_bonus_scales_extraction() {
        let mut facility = ExtractionFacility::new(
            "Quarry",
            ResourceDeposit::new(ResourceType::Stone, 1000.0, 100.0),
            1.0,
            5,
        );
        assert!(facility.hire_worker());
        assert!(facility.hire_worker());
        let out = facility.operate();
        assert!(approx(out, 120.0), "got {out}");
        assert!(approx(facility.deposit().current_amount(), 880.0));
    }

    #[test]
    fn extraction_clamps_to_remaining_stock() {
        let mut d = ResourceDeposit::new(ResourceType::Coal, 1000.0, 100.0).with_amount(30.0);
        assert!(approx(d.extract_resource(), 30.0));
        assert!(d.is_depleted());
        assert_eq!(d.extract_resource(), 0.0);
    }

    #[test]
    fn inactive_deposit_yields_nothing() {
        let mut d = ResourceDeposit::new(ResourceType::Oil, 500.0, 50.0);
        d.deactivate();
        assert_eq!(d.extract_resource(), 0.0);
        assert!(approx(d.current_amount(), 500.0));
        d.activate();
        assert!(approx(d.extract_resource(), 50.0));
    }

    #[test]
    fn hiring_beyond_limit_is_a_no_op() {
        let mut f = ExtractionFacility::new(
            "Mine",
            ResourceDeposit::new(ResourceType::Iron, 10.0, 1.0),
            0.5,
            1,
        );
        assert!(f.hire_worker());
        assert!(!f.hire_worker());
        assert_eq!(f.workers(), 1);
        assert!(f.fire_worker());
        assert!(!f.fire_worker());
    }

    #[test]
    fn efficiency_reduces_output_but_not_depletion() {
        let mut f = ExtractionFacility::new(
            "Rig",
            ResourceDeposit::new(ResourceType::Oil, 1000.0, 100.0),
            0.8,
            0,
        );
        assert!(approx(f.potential_yield(), 80.0));
        assert!(approx(f.operate(), 80.0));
        assert!(approx(f.deposit().current_amount(), 900.0));
    }

    #[test]
    fn oversized_deposit_rejected() {
        let mut s = ResourceStorage::new(100_000.0);
        assert!(!s.add_resource(ResourceType::Wood, 100_001.0));
        assert_eq!(s.total_stored(), 0.0);
        assert_eq!(s.iter().count(), 0);
    }

    #[test]
    fn storage_fills_to_exact_capacity() {
        let mut s = ResourceStorage::new(100.0);
        assert!(s.add_resource(ResourceType::Wood, 60.0));
        assert!(s.add_resource(ResourceType::Stone, 40.0));
        assert!(!s.add_resource(ResourceType::Wood, 1.0));
        assert_eq!(s.available_space(), 0.0);
        assert!(s.remove_resource(ResourceType::Wood, 10.0));
        assert!(!s.remove_resource(ResourceType::Stone, 41.0));
        assert!(approx(s.amount_of(ResourceType::Wood), 50.0));
    }

    #[test]
    fn storage_rejects_invalid_amounts() {
        let mut s = ResourceStorage::new(100.0);
        assert!(!s.add_resource(ResourceType::Gold, -1.0));
        assert!(!s.add_resource(ResourceType::Gold, f64::NAN));
        assert!(s.add_resource(ResourceType::Gold, 0.0));
        assert_eq!(s.total_stored(), 0.0);
    }

    #[test]
    fn one_worker_output_exports_to_an_empty_bucket() {
        let mut facility = ExtractionFacility::new(
            "Pit",
            ResourceDeposit::new(ResourceType::Coal, 10_000.0, 100.0),
            1.0,
            5,
        );
        assert!(facility.hire_worker());
        let out = facility.operate();
        assert_eq!(out, 110.0);
        assert_eq!(facility.deposit().current_amount(), 9_890.0);

        let mut s = ResourceStorage::new(1000.0);
        assert!(s.add_resource(ResourceType::Coal, out));
        assert!(s.remove_resource(ResourceType::Coal, 110.0));
        assert_eq!(s.amount_of(ResourceType::Coal), 0.0);
        assert_eq!(s.iter().count(), 0);
        assert_eq!(s.total_stored(), 0.0);
    }

    #[test]
    fn residue_below_epsilon_is_dropped() {
        let mut s = ResourceStorage::new(1000.0);
        assert!(s.add_resource(ResourceType::Iron, 0.1 + 0.2));
        assert!(s.remove_resource(ResourceType::Iron, 0.3));
        assert_eq!(s.iter().count(), 0);
        assert!(!s.remove_resource(ResourceType::Iron, 0.1));
    }

    #[test]
    fn oversized_value_is_not_priced() {
        let market = ResourceMarket::default();
        assert_eq!(market.value_of(ResourceType::Gold, 1e27), None);
        assert_eq!(market.value_of(ResourceType::Gold, 1e40), None);
    }

    #[test]
    fn market_values_in_cents() {
        let market = ResourceMarket::default();
        assert_eq!(market.price_of(ResourceType::Gold), Some(Decimal::new(500, 0)));
        assert_eq!(
            market.value_of(ResourceType::Wood, 2.5),
            Some(Decimal::new(2500, 2))
        );
        let sparse = ResourceMarket::new([(ResourceType::Coal, Decimal::new(-1, 0))]);
        assert_eq!(sparse.price_of(ResourceType::Coal), None);
        assert_eq!(sparse.value_of(ResourceType::Coal, 1.0), None);
    }

    proptest! {
        #[test]
        fn extraction_never_overdraws(capacity in 0.0f64..1e6,
                                      fill in 0.0f64..1.0,
                                      rate in 0.0f64..1e4,
                                      workers in 0u32..50) {
            let mut d = ResourceDeposit::new(ResourceType::Iron, capacity, rate)
                .with_amount(capacity * fill);
            d.set_workers(workers);
            let before = d.current_amount();
            let out = d.extract_resource();
            prop_assert!(out >= 0.0);
            prop_assert!(d.current_amount() >= 0.0);
            prop_assert!(d.current_amount() <= before);
            prop_assert!(d.current_amount() <= d.capacity());
        }

        #[test]
        fn storage_never_exceeds_capacity(capacity in 0.0f64..1e5,
                                          adds in proptest::collection::vec((0usize..6, 0.0f64..5e4), 0..20)) {
            let mut s = ResourceStorage::new(capacity);
            for (idx, amount) in adds {
                let before = s.total_stored();
                let accepted = s.add_resource(ResourceType::ALL[idx], amount);
                if !accepted {
                    prop_assert_eq!(s.total_stored(), before);
                }
                prop_assert!(s.total_stored() <= s.capacity());
            }
        }
    }
}
