#![deny(warnings)]

//! Municipal finance: the budget ledger, tax collection, salary and
//! subsidy payments, and foreign trade against the resource market.
//!
//! Every mutation of a [`Budget`] yields the [`FinancialTransaction`] it
//! recorded, so callers can publish the change without observing the budget.
//! The ledger keeps only the [`HISTORY_LIMIT`] most recent transactions.

pub mod trade;

pub use trade::{export_resource, import_resource, TradeError};

use chrono::NaiveDate;
use city_core::{CitizenConfig, CompanyConfig, FinanceConfig};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Number of transactions retained in a budget's history.
pub const HISTORY_LIMIT: usize = 100;

/// Category of a ledger entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    /// Income and corporate taxes collected in one run.
    TaxCollection,
    /// Payroll for public-sector citizens.
    SalaryPayment,
    /// Grants to subsidised companies.
    SubsidyPayment,
    /// Proceeds of goods sold abroad.
    Export,
    /// Cost of goods bought in.
    Import,
    /// Any other credit, e.g. a grant.
    Deposit,
    /// Any other debit, e.g. utility funding.
    Withdrawal,
}

impl TransactionKind {
    /// Whether the kind adds money to the budget.
    pub fn is_income(self) -> bool {
        matches!(
            self,
            TransactionKind::TaxCollection | TransactionKind::Export | TransactionKind::Deposit
        )
    }
}

/// A single ledger entry. `amount` is always non-negative; direction is
/// given by `kind`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FinancialTransaction {
    /// Sequence number, unique per budget and starting at 1.
    pub id: u64,
    /// Simulation date of the entry.
    pub date: NaiveDate,
    pub kind: TransactionKind,
    pub amount: Decimal,
    /// Human-readable summary.
    pub description: String,
}

impl FinancialTransaction {
    /// Amount signed by direction: positive for income, negative for spending.
    pub fn signed_amount(&self) -> Decimal {
        if self.kind.is_income() {
            self.amount
        } else {
            -self.amount
        }
    }
}

/// Tax rates applied by [`Budget::collect_taxes`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaxPolicy {
    /// Fraction of each citizen's income taken as tax.
    pub income_rate: Decimal,
    /// Fraction of each company's revenue taken as tax.
    pub corporate_rate: Decimal,
}

impl From<&FinanceConfig> for TaxPolicy {
    fn from(cfg: &FinanceConfig) -> Self {
        Self {
            income_rate: cfg.income_tax_rate,
            corporate_rate: cfg.corporate_tax_rate,
        }
    }
}

/// A resident with personal funds.
///
/// Private-sector citizens are taxed on `monthly_income`. Public-sector
/// citizens are taxed on the salary the city actually paid them since the
/// last collection.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Citizen {
    pub name: String,
    /// Income from private employment, credited by [`Citizen::receive_income`].
    pub monthly_income: Decimal,
    wallet: Decimal,
    /// Employed by the municipality and paid by [`Budget::pay_salaries`].
    pub public_sector: bool,
    #[serde(default)]
    salary_since_tax: Decimal,
}

impl Citizen {
    pub fn new(name: impl Into<String>, monthly_income: Decimal, wallet: Decimal) -> Self {
        Self {
            name: name.into(),
            monthly_income,
            wallet: wallet.max(Decimal::ZERO),
            public_sector: false,
            salary_since_tax: Decimal::ZERO,
        }
    }

    pub fn wallet(&self) -> Decimal {
        self.wallet
    }

    /// Income the next tax collection applies the income rate to.
    pub fn taxable_income(&self) -> Decimal {
        if self.public_sector {
            self.salary_since_tax
        } else {
            self.monthly_income.max(Decimal::ZERO)
        }
    }

    /// Credits the monthly income from private employment. Saturates at
    /// `Decimal::MAX`.
    pub fn receive_income(&mut self) {
        self.wallet = self
            .wallet
            .saturating_add(self.monthly_income.max(Decimal::ZERO));
    }
}

impl From<&CitizenConfig> for Citizen {
    fn from(cfg: &CitizenConfig) -> Self {
        let mut citizen = Citizen::new(cfg.name.clone(), cfg.monthly_income, cfg.wallet);
        citizen.public_sector = cfg.public_sector;
        citizen
    }
}

/// A business paying corporate tax and possibly receiving subsidies.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Company {
    pub name: String,
    /// Revenue the corporate tax rate applies to.
    pub monthly_revenue: Decimal,
    /// Headcount, informational only.
    pub employees: u32,
    /// Receives [`Budget::pay_subsidies`] payments.
    pub subsidised: bool,
    subsidies_received: Decimal,
}

impl Company {
    pub fn new(name: impl Into<String>, monthly_revenue: Decimal) -> Self {
        Self {
            name: name.into(),
            monthly_revenue,
            employees: 0,
            subsidised: false,
            subsidies_received: Decimal::ZERO,
        }
    }

    pub fn subsidies_received(&self) -> Decimal {
        self.subsidies_received
    }
}

impl From<&CompanyConfig> for Company {
    fn from(cfg: &CompanyConfig) -> Self {
        let mut company = Company::new(cfg.name.clone(), cfg.monthly_revenue);
        company.employees = cfg.employees;
        company.subsidised = cfg.subsidised;
        company
    }
}

/// The city treasury: balance, running totals and bounded history.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Budget {
    balance: Decimal,
    total_income: Decimal,
    total_expenses: Decimal,
    next_id: u64,
    history: VecDeque<FinancialTransaction>,
}

impl Budget {
    pub fn new(opening_balance: Decimal) -> Self {
        Self {
            balance: opening_balance,
            total_income: Decimal::ZERO,
            total_expenses: Decimal::ZERO,
            next_id: 1,
            history: VecDeque::with_capacity(HISTORY_LIMIT),
        }
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn total_income(&self) -> Decimal {
        self.total_income
    }

    pub fn total_expenses(&self) -> Decimal {
        self.total_expenses
    }

    /// Retained transactions, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &FinancialTransaction> + '_ {
        self.history.iter()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Up to `n` most recent transactions, newest first.
    pub fn recent(&self, n: usize) -> Vec<&FinancialTransaction> {
        self.history.iter().rev().take(n).collect()
    }

    /// Applies the entry to the balance and totals. `None`, with nothing
    /// changed, if either would overflow.
    fn record(
        &mut self,
        kind: TransactionKind,
        amount: Decimal,
        date: NaiveDate,
        description: String,
    ) -> Option<FinancialTransaction> {
        if kind.is_income() {
            let balance = self.balance.checked_add(amount)?;
            let total = self.total_income.checked_add(amount)?;
            self.balance = balance;
            self.total_income = total;
        } else {
            let balance = self.balance.checked_sub(amount)?;
            let total = self.total_expenses.checked_add(amount)?;
            self.balance = balance;
            self.total_expenses = total;
        }
        let tx = FinancialTransaction {
            id: self.next_id,
            date,
            kind,
            amount,
            description,
        };
        self.next_id += 1;
        if self.history.len() == HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.history.push_back(tx.clone());
        debug!(id = tx.id, kind = ?tx.kind, amount = %tx.amount, "transaction recorded");
        Some(tx)
    }

    /// Credits money. Negative amounts, a spending `kind`, or a credit the
    /// balance cannot represent are refused.
    pub fn deposit(
        &mut self,
        kind: TransactionKind,
        amount: Decimal,
        date: NaiveDate,
        description: impl Into<String>,
    ) -> Option<FinancialTransaction> {
        if amount < Decimal::ZERO || !kind.is_income() {
            return None;
        }
        self.record(kind, amount, date, description.into())
    }

    /// Debits money if the balance covers it; otherwise returns `None` and
    /// changes nothing.
    pub fn withdraw(
        &mut self,
        kind: TransactionKind,
        amount: Decimal,
        date: NaiveDate,
        description: impl Into<String>,
    ) -> Option<FinancialTransaction> {
        if amount < Decimal::ZERO || kind.is_income() {
            return None;
        }
        if amount > self.balance {
            warn!(needed = %amount, balance = %self.balance, kind = ?kind, "insufficient funds");
            return None;
        }
        self.record(kind, amount, date, description.into())
    }

    /// Taxes every citizen's [`taxable_income`](Citizen::taxable_income)
    /// (capped at what their wallet holds) and every company's revenue.
    /// Returns `None` when nothing was collected or the sums overflow; in
    /// either case no wallet is touched.
    pub fn collect_taxes(
        &mut self,
        citizens: &mut [Citizen],
        companies: &[Company],
        policy: &TaxPolicy,
        date: NaiveDate,
    ) -> Option<FinancialTransaction> {
        let mut paid = Vec::with_capacity(citizens.len());
        let mut total = Decimal::ZERO;
        for citizen in citizens.iter() {
            let due = citizen
                .taxable_income()
                .checked_mul(policy.income_rate)?
                .round_dp(2)
                .max(Decimal::ZERO);
            let share = due.min(citizen.wallet);
            total = total.checked_add(share)?;
            paid.push(share);
        }
        for company in companies {
            let due = company
                .monthly_revenue
                .max(Decimal::ZERO)
                .checked_mul(policy.corporate_rate)?
                .round_dp(2)
                .max(Decimal::ZERO);
            total = total.checked_add(due)?;
        }
        if total <= Decimal::ZERO {
            return None;
        }
        let description = format!(
            "Taxes from {} citizens and {} companies",
            citizens.len(),
            companies.len()
        );
        let tx = self.record(TransactionKind::TaxCollection, total, date, description)?;
        for (citizen, share) in citizens.iter_mut().zip(paid) {
            citizen.wallet -= share;
            citizen.salary_since_tax = Decimal::ZERO;
        }
        Some(tx)
    }

    /// Pays `salary` to every public-sector citizen. Returns `None` without
    /// paying anyone if the balance cannot cover the payroll.
    pub fn pay_salaries(
        &mut self,
        citizens: &mut [Citizen],
        salary: Decimal,
        date: NaiveDate,
    ) -> Option<FinancialTransaction> {
        if salary <= Decimal::ZERO {
            return None;
        }
        let staff = citizens.iter().filter(|c| c.public_sector).count();
        if staff == 0 {
            return None;
        }
        let payroll = salary.checked_mul(Decimal::from(staff))?;
        let tx = self.withdraw(
            TransactionKind::SalaryPayment,
            payroll,
            date,
            format!("Salaries for {staff} public employees"),
        )?;
        for citizen in citizens.iter_mut().filter(|c| c.public_sector) {
            citizen.wallet = citizen.wallet.saturating_add(salary);
            citizen.salary_since_tax = citizen.salary_since_tax.saturating_add(salary);
        }
        Some(tx)
    }

    /// Pays `amount` to every subsidised company; same balance gate as
    /// [`pay_salaries`](Self::pay_salaries).
    pub fn pay_subsidies(
        &mut self,
        companies: &mut [Company],
        amount: Decimal,
        date: NaiveDate,
    ) -> Option<FinancialTransaction> {
        if amount <= Decimal::ZERO {
            return None;
        }
        let recipients = companies.iter().filter(|c| c.subsidised).count();
        if recipients == 0 {
            return None;
        }
        let total = amount.checked_mul(Decimal::from(recipients))?;
        let tx = self.withdraw(
            TransactionKind::SubsidyPayment,
            total,
            date,
            format!("Subsidies for {recipients} companies"),
        )?;
        for company in companies.iter_mut().filter(|c| c.subsidised) {
            company.subsidies_received = company.subsidies_received.saturating_add(amount);
        }
        Some(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2000, 1, 31).unwrap()
    }

    fn policy() -> TaxPolicy {
        TaxPolicy {
            income_rate: Decimal::new(10, 2),
            corporate_rate: Decimal::new(20, 2),
        }
    }

    #[test]
    fn taxes_are_aggregated() {
        let mut budget = Budget::new(Decimal::ZERO);
        let mut citizens = vec![
            Citizen::new("A", Decimal::new(3000, 0), Decimal::new(1000, 0)),
            Citizen::new("B", Decimal::new(2000, 0), Decimal::new(50, 0)),
        ];
        let companies = vec![Company::new("Co", Decimal::new(10_000, 0))];
        let tx = budget
            .collect_taxes(&mut citizens, &companies, &policy(), day())
            .unwrap();
        // 300 + min(200, 50) + 2000
        assert_eq!(tx.amount, Decimal::new(2350, 0));
        assert_eq!(tx.kind, TransactionKind::TaxCollection);
        assert_eq!(budget.balance(), Decimal::new(2350, 0));
        assert_eq!(citizens[0].wallet(), Decimal::new(700, 0));
        assert_eq!(citizens[1].wallet(), Decimal::ZERO);
    }

    #[test]
    fn nothing_to_tax_records_nothing() {
        let mut budget = Budget::new(Decimal::ZERO);
        assert!(budget
            .collect_taxes(&mut [], &[], &policy(), day())
            .is_none());
        assert_eq!(budget.history_len(), 0);
    }

    #[test]
    fn salaries_go_to_public_sector_only() {
        let mut budget = Budget::new(Decimal::new(10_000, 0));
        let mut worker = Citizen::new("Clerk", Decimal::ZERO, Decimal::ZERO);
        worker.public_sector = true;
        let mut citizens = vec![worker, Citizen::new("Baker", Decimal::ZERO, Decimal::ZERO)];
        let tx = budget
            .pay_salaries(&mut citizens, Decimal::new(2500, 0), day())
            .unwrap();
        assert_eq!(tx.signed_amount(), Decimal::new(-2500, 0));
        assert_eq!(citizens[0].wallet(), Decimal::new(2500, 0));
        assert_eq!(citizens[1].wallet(), Decimal::ZERO);
        assert_eq!(budget.balance(), Decimal::new(7500, 0));
        assert_eq!(budget.total_expenses(), Decimal::new(2500, 0));
    }

    #[test]
    fn unaffordable_payroll_is_a_no_op() {
        let mut budget = Budget::new(Decimal::new(100, 0));
        let mut worker = Citizen::new("Clerk", Decimal::ZERO, Decimal::ZERO);
        worker.public_sector = true;
        let mut citizens = vec![worker];
        assert!(budget
            .pay_salaries(&mut citizens, Decimal::new(2500, 0), day())
            .is_none());
        assert_eq!(citizens[0].wallet(), Decimal::ZERO);
        assert_eq!(budget.balance(), Decimal::new(100, 0));
        assert_eq!(budget.history_len(), 0);
    }

    #[test]
    fn public_sector_is_taxed_on_paid_salary() {
        let mut budget = Budget::new(Decimal::new(10_000, 0));
        let mut clerk = Citizen::new("Clerk", Decimal::new(3_000, 0), Decimal::new(1_000, 0));
        clerk.public_sector = true;
        let mut citizens = vec![clerk];
        assert_eq!(citizens[0].taxable_income(), Decimal::ZERO);

        budget
            .pay_salaries(&mut citizens, Decimal::new(2_400, 0), day())
            .unwrap();
        assert_eq!(citizens[0].taxable_income(), Decimal::new(2_400, 0));
        let tx = budget
            .collect_taxes(&mut citizens, &[], &policy(), day())
            .unwrap();
        assert_eq!(tx.amount, Decimal::new(240, 0));
        assert_eq!(citizens[0].wallet(), Decimal::new(3_160, 0));
        assert_eq!(citizens[0].taxable_income(), Decimal::ZERO);
    }

    #[test]
    fn overflowing_amounts_are_refused() {
        let mut budget = Budget::new(Decimal::MAX);
        assert!(budget
            .deposit(TransactionKind::Deposit, Decimal::ONE, day(), "x")
            .is_none());
        assert_eq!(budget.balance(), Decimal::MAX);
        assert_eq!(budget.history_len(), 0);

        let mut staff: Vec<Citizen> = (0..3)
            .map(|i| {
                let mut c = Citizen::new(format!("C{i}"), Decimal::ZERO, Decimal::ZERO);
                c.public_sector = true;
                c
            })
            .collect();
        assert!(budget.pay_salaries(&mut staff, Decimal::MAX, day()).is_none());
        assert!(staff.iter().all(|c| c.wallet() == Decimal::ZERO));

        let mut firms = vec![Company::new("Big", Decimal::MAX), Company::new("Bigger", Decimal::MAX)];
        firms.iter_mut().for_each(|c| c.subsidised = true);
        assert!(budget.pay_subsidies(&mut firms, Decimal::MAX, day()).is_none());
        let heavy = TaxPolicy {
            income_rate: Decimal::ONE,
            corporate_rate: Decimal::ONE,
        };
        let mut empty = Budget::new(Decimal::ZERO);
        assert!(empty.collect_taxes(&mut [], &firms, &heavy, day()).is_none());
        assert_eq!(empty.balance(), Decimal::ZERO);
    }

    #[test]
    fn subsidies_track_recipients() {
        let mut budget = Budget::new(Decimal::new(1000, 0));
        let mut helped = Company::new("Farm", Decimal::ZERO);
        helped.subsidised = true;
        let mut companies = vec![helped, Company::new("Bank", Decimal::ZERO)];
        budget
            .pay_subsidies(&mut companies, Decimal::new(400, 0), day())
            .unwrap();
        assert_eq!(companies[0].subsidies_received(), Decimal::new(400, 0));
        assert_eq!(companies[1].subsidies_received(), Decimal::ZERO);
        assert_eq!(budget.balance(), Decimal::new(600, 0));
    }

    #[test]
    fn deposit_and_withdraw_check_direction() {
        let mut budget = Budget::new(Decimal::ZERO);
        assert!(budget
            .deposit(TransactionKind::SalaryPayment, Decimal::ONE, day(), "x")
            .is_none());
        assert!(budget
            .withdraw(TransactionKind::Deposit, Decimal::ONE, day(), "x")
            .is_none());
        assert!(budget
            .deposit(TransactionKind::Deposit, Decimal::new(-1, 0), day(), "x")
            .is_none());
        let tx = budget
            .deposit(TransactionKind::Deposit, Decimal::new(50, 0), day(), "grant")
            .unwrap();
        assert_eq!(tx.id, 1);
        let tx = budget
            .withdraw(TransactionKind::Withdrawal, Decimal::new(20, 0), day(), "repair")
            .unwrap();
        assert_eq!(tx.id, 2);
        assert_eq!(budget.balance(), Decimal::new(30, 0));
        assert!(budget
            .withdraw(TransactionKind::Withdrawal, Decimal::new(31, 0), day(), "too much")
            .is_none());
    }

    #[test]
    fn history_keeps_latest_hundred() {
        let mut budget = Budget::new(Decimal::ZERO);
        for _ in 0..150 {
            budget.deposit(TransactionKind::Deposit, Decimal::ONE, day(), "tick");
        }
        assert_eq!(budget.history_len(), HISTORY_LIMIT);
        assert_eq!(budget.history().next().unwrap().id, 51);
        assert_eq!(budget.recent(1)[0].id, 150);
        assert_eq!(budget.balance(), Decimal::new(150, 0));
        assert_eq!(budget.total_income(), Decimal::new(150, 0));
    }

    proptest! {
        #[test]
        fn history_never_exceeds_limit(n in 0usize..400) {
            let mut budget = Budget::new(Decimal::ZERO);
            for i in 0..n {
                if i % 3 == 0 {
                    budget.withdraw(TransactionKind::Withdrawal, Decimal::ONE, day(), "w");
                } else {
                    budget.deposit(TransactionKind::Deposit, Decimal::ONE, day(), "d");
                }
            }
            prop_assert!(budget.history_len() <= HISTORY_LIMIT);
            let sum: Decimal = budget.history().map(|t| t.signed_amount()).sum();
            prop_assert!(sum <= budget.balance() || budget.history_len() == HISTORY_LIMIT);
        }

        #[test]
        fn taxes_never_overdraw_wallets(income in 0i64..100_000, wallet in 0i64..10_000) {
            let mut budget = Budget::new(Decimal::ZERO);
            let mut citizens = vec![Citizen::new("X", Decimal::new(income, 0), Decimal::new(wallet, 0))];
            budget.collect_taxes(&mut citizens, &[], &policy(), day());
            prop_assert!(citizens[0].wallet() >= Decimal::ZERO);
            prop_assert_eq!(budget.balance(), Decimal::new(wallet, 0) - citizens[0].wallet());
        }
    }
}
