//! Foreign trade: selling stored resources abroad and buying them in at
//! market prices.

use crate::{Budget, FinancialTransaction, TransactionKind};
use chrono::NaiveDate;
use city_core::{ResourceMarket, ResourceStorage, ResourceType};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::info;

/// Reasons a trade was refused. A refused trade changes nothing.
#[derive(Debug, Error, PartialEq)]
pub enum TradeError {
    #[error("no market price for {0:?}")]
    Unpriced(ResourceType),
    #[error("trade amount must be finite and > 0")]
    InvalidAmount,
    #[error("trade value of {amount} {resource:?} is too large to book")]
    ValueOverflow { resource: ResourceType, amount: f64 },
    #[error("only {available} units of {resource:?} in storage")]
    InsufficientStock { resource: ResourceType, available: f64 },
    #[error("import costs {needed} but the budget holds {available}")]
    InsufficientFunds { needed: Decimal, available: Decimal },
    #[error("storage cannot hold the imported goods")]
    StorageFull,
}

fn quote(
    market: &ResourceMarket,
    resource: ResourceType,
    amount: f64,
) -> Result<Decimal, TradeError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(TradeError::InvalidAmount);
    }
    if market.price_of(resource).is_none() {
        return Err(TradeError::Unpriced(resource));
    }
    market
        .value_of(resource, amount)
        .ok_or(TradeError::ValueOverflow { resource, amount })
}

/// Sells `amount` of `resource` from storage and credits the proceeds.
///
/// Stock is checked before the ledger is touched and removed only once the
/// credit has been booked.
pub fn export_resource(
    storage: &mut ResourceStorage,
    market: &ResourceMarket,
    budget: &mut Budget,
    resource: ResourceType,
    amount: f64,
    date: NaiveDate,
) -> Result<FinancialTransaction, TradeError> {
    let value = quote(market, resource, amount)?;
    if !storage.can_remove(resource, amount) {
        return Err(TradeError::InsufficientStock {
            resource,
            available: storage.amount_of(resource),
        });
    }
    let description = format!("Exported {amount} {}", resource.name());
    let tx = budget
        .deposit(TransactionKind::Export, value, date, description)
        .ok_or(TradeError::ValueOverflow { resource, amount })?;
    let removed = storage.remove_resource(resource, amount);
    debug_assert!(removed);
    info!(resource = resource.name(), amount, value = %value, "export completed");
    Ok(tx)
}

/// Buys `amount` of `resource` into storage, paying from the budget.
///
/// Funds and free space are both checked before the debit is booked.
pub fn import_resource(
    storage: &mut ResourceStorage,
    market: &ResourceMarket,
    budget: &mut Budget,
    resource: ResourceType,
    amount: f64,
    date: NaiveDate,
) -> Result<FinancialTransaction, TradeError> {
    let cost = quote(market, resource, amount)?;
    if cost > budget.balance() {
        return Err(TradeError::InsufficientFunds {
            needed: cost,
            available: budget.balance(),
        });
    }
    if !storage.can_add(resource, amount) {
        return Err(TradeError::StorageFull);
    }
    let description = format!("Imported {amount} {}", resource.name());
    let tx = budget
        .withdraw(TransactionKind::Import, cost, date, description)
        .ok_or(TradeError::ValueOverflow { resource, amount })?;
    let added = storage.add_resource(resource, amount);
    debug_assert!(added);
    info!(resource = resource.name(), amount, cost = %cost, "import completed");
    Ok(tx)
}
