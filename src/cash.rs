//! Month-level cash planning: how much of the month's sales has been
//! collected, what that implies the suppliers are owed, and where the
//! deposited money goes.

use crate::schema::MonthKey;
use crate::utils::sanitize_amount;
use log::{debug, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProductFamily {
    Cartridges,
    Commercial,
    Imported,
}

impl ProductFamily {
    pub const ALL: [ProductFamily; 3] = [
        ProductFamily::Cartridges,
        ProductFamily::Commercial,
        ProductFamily::Imported,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProductFamily::Cartridges => "cartridges",
            ProductFamily::Commercial => "commercial",
            ProductFamily::Imported => "imported",
        }
    }
}

impl fmt::Display for ProductFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One amount per product family.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct FamilyBreakdown {
    pub cartridges: f64,
    pub commercial: f64,
    pub imported: f64,
}

impl FamilyBreakdown {
    pub fn get(&self, family: ProductFamily) -> f64 {
        match family {
            ProductFamily::Cartridges => self.cartridges,
            ProductFamily::Commercial => self.commercial,
            ProductFamily::Imported => self.imported,
        }
    }

    pub fn total(&self) -> f64 {
        self.cartridges + self.commercial + self.imported
    }

    fn from_fn(mut f: impl FnMut(ProductFamily) -> f64) -> Self {
        Self {
            cartridges: f(ProductFamily::Cartridges),
            commercial: f(ProductFamily::Commercial),
            imported: f(ProductFamily::Imported),
        }
    }

    fn add(&mut self, other: &FamilyBreakdown) {
        self.cartridges += sanitize_amount(other.cartridges);
        self.commercial += sanitize_amount(other.commercial);
        self.imported += sanitize_amount(other.imported);
    }
}

/// Markup factor per product family (sale price / supplier cost).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FamilyFactors {
    #[schemars(description = "Markup factor for cartridges")]
    pub cartridges: f64,
    #[schemars(description = "Markup factor for commercial products")]
    pub commercial: f64,
    #[schemars(description = "Markup factor for imported products")]
    pub imported: f64,
}

impl Default for FamilyFactors {
    fn default() -> Self {
        Self {
            cartridges: 1.70,
            commercial: 1.82,
            imported: 1.53,
        }
    }
}

impl FamilyFactors {
    pub fn get(&self, family: ProductFamily) -> f64 {
        match family {
            ProductFamily::Cartridges => self.cartridges,
            ProductFamily::Commercial => self.commercial,
            ProductFamily::Imported => self.imported,
        }
    }

    /// Supplier cost of `sales` per family. A non-positive factor yields 0.
    pub fn cost_of(&self, sales: &FamilyBreakdown) -> FamilyBreakdown {
        FamilyBreakdown::from_fn(|family| {
            let factor = self.get(family);
            if factor > 0.0 {
                sales.get(family) / factor
            } else {
                0.0
            }
        })
    }
}

/// Daily sales invoice summary, split by family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyInvoice {
    pub date: String,
    pub total: f64,
    #[serde(flatten)]
    pub families: FamilyBreakdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DepositCategory {
    Cards,
    Cash,
    Advance,
    Other,
}

impl DepositCategory {
    /// Maps a free-text deposit concept (`TARJETAS`, `EFECTIVO`, `ANTICIPO`,
    /// any case, surrounding whitespace ignored) to its category.
    pub fn from_concept(concept: &str) -> Self {
        match concept.trim().to_uppercase().as_str() {
            "TARJETAS" => DepositCategory::Cards,
            "EFECTIVO" => DepositCategory::Cash,
            "ANTICIPO" => DepositCategory::Advance,
            _ => DepositCategory::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deposit {
    pub date: String,
    pub concept: String,
    pub amount: f64,
}

/// A dated amount: client bank payment, voucher or uncollected sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashMovement {
    pub date: String,
    pub amount: f64,
}

/// Daily cash cut carrying that day's operating-expense budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyCut {
    pub date: String,
    pub operating_budget: f64,
}

/// Raw finance records as fetched for a month. Rows dated outside the
/// summarized month are ignored.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FinanceRecords {
    #[serde(default)]
    pub invoices: Vec<DailyInvoice>,
    #[serde(default)]
    pub deposits: Vec<Deposit>,
    #[serde(default)]
    pub client_payments: Vec<CashMovement>,
    #[serde(default)]
    pub vouchers: Vec<CashMovement>,
    #[serde(default)]
    pub pending_payments: Vec<CashMovement>,
    #[serde(default)]
    pub daily_cuts: Vec<DailyCut>,
    /// Amount paid to suppliers this month, per supplier category.
    #[serde(default)]
    pub supplier_payments: BTreeMap<String, f64>,
    #[serde(default)]
    pub operating_expenses_paid: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct DepositTotals {
    pub cards: f64,
    pub cash: f64,
    pub advance: f64,
    pub other: f64,
}

impl DepositTotals {
    pub fn add(&mut self, category: DepositCategory, amount: f64) {
        let slot = match category {
            DepositCategory::Cards => &mut self.cards,
            DepositCategory::Cash => &mut self.cash,
            DepositCategory::Advance => &mut self.advance,
            DepositCategory::Other => &mut self.other,
        };
        *slot += sanitize_amount(amount);
    }

    pub fn total(&self) -> f64 {
        self.cards + self.cash + self.advance + self.other
    }
}

/// Month totals feeding [`compute_cash_planning`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MonthAggregates {
    pub invoiced: f64,
    pub family_sales: FamilyBreakdown,
    pub client_payments: f64,
    pub deposits: DepositTotals,
    pub vouchers: f64,
    pub uncollected: f64,
    pub supplier_paid: BTreeMap<String, f64>,
    pub operating_budget: f64,
    pub operating_expenses_paid: f64,
}

fn in_month(date: &str, month: MonthKey, what: &str) -> bool {
    match MonthKey::from_iso_date(date) {
        Ok(m) => m == month,
        Err(_) => {
            warn!("Skipping {} with unparseable date '{}'", what, date);
            false
        }
    }
}

fn sum_movements(rows: &[CashMovement], month: MonthKey, what: &str) -> f64 {
    rows.iter()
        .filter(|r| in_month(&r.date, month, what))
        .map(|r| sanitize_amount(r.amount))
        .sum()
}

/// Reduces raw finance records to the totals of `month`.
pub fn summarize_month(records: &FinanceRecords, month: MonthKey) -> MonthAggregates {
    let mut aggregates = MonthAggregates {
        client_payments: sum_movements(&records.client_payments, month, "client payment"),
        vouchers: sum_movements(&records.vouchers, month, "voucher"),
        uncollected: sum_movements(&records.pending_payments, month, "pending payment"),
        supplier_paid: records
            .supplier_payments
            .iter()
            .map(|(category, amount)| (category.clone(), sanitize_amount(*amount)))
            .collect(),
        operating_expenses_paid: sanitize_amount(records.operating_expenses_paid),
        ..Default::default()
    };

    for invoice in records
        .invoices
        .iter()
        .filter(|r| in_month(&r.date, month, "invoice"))
    {
        aggregates.invoiced += sanitize_amount(invoice.total);
        aggregates.family_sales.add(&invoice.families);
    }

    for deposit in records
        .deposits
        .iter()
        .filter(|r| in_month(&r.date, month, "deposit"))
    {
        aggregates
            .deposits
            .add(DepositCategory::from_concept(&deposit.concept), deposit.amount);
    }

    aggregates.operating_budget = records
        .daily_cuts
        .iter()
        .filter(|r| in_month(&r.date, month, "daily cut"))
        .map(|r| sanitize_amount(r.operating_budget))
        .sum();

    debug!(
        "Summarized {}: invoiced {:.2}, deposits {:.2}, vouchers {:.2}",
        month,
        aggregates.invoiced,
        aggregates.deposits.total(),
        aggregates.vouchers
    );

    aggregates
}

/// Operating-expense budget accumulated from daily cuts versus what was
/// actually spent.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OperatingHeadroom {
    pub available: f64,
    pub paid: f64,
    pub difference: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashPlanning {
    /// Share of invoiced sales already collected, 0..=1 for sane inputs.
    pub collection_ratio: f64,
    pub net_sales: FamilyBreakdown,
    pub requirement: FamilyBreakdown,
    pub total_requirement: f64,
    pub supplier_paid: f64,
    pub shortfall: f64,
    pub deposits: DepositTotals,
    pub deposits_total: f64,
    pub total_deposited: f64,
    pub post_voucher_liquidity: f64,
    pub headroom: OperatingHeadroom,
}

/// Collection-adjusted supplier requirement and liquidity for one month.
pub fn compute_cash_planning(aggregates: &MonthAggregates, factors: &FamilyFactors) -> CashPlanning {
    let collection_ratio = if aggregates.invoiced > 0.0 {
        (aggregates.invoiced - aggregates.uncollected) / aggregates.invoiced
    } else {
        0.0
    };

    let net_sales =
        FamilyBreakdown::from_fn(|family| aggregates.family_sales.get(family) * collection_ratio);
    let requirement = factors.cost_of(&net_sales);
    let total_requirement = requirement.total();

    let supplier_paid: f64 = aggregates.supplier_paid.values().sum();
    let deposits_total = aggregates.deposits.total();
    let total_deposited = deposits_total + aggregates.client_payments;

    CashPlanning {
        collection_ratio,
        net_sales,
        requirement,
        total_requirement,
        supplier_paid,
        shortfall: (total_requirement - supplier_paid).max(0.0),
        deposits: aggregates.deposits,
        deposits_total,
        total_deposited,
        post_voucher_liquidity: total_deposited - aggregates.vouchers,
        headroom: OperatingHeadroom {
            available: aggregates.operating_budget,
            paid: aggregates.operating_expenses_paid,
            difference: aggregates.operating_budget - aggregates.operating_expenses_paid,
        },
    }
}

/// Split of the month's deposited money between family purchases and
/// operating expenses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundsAllocation {
    pub deposited: f64,
    pub available_before_families: f64,
    pub requirement: FamilyBreakdown,
    pub family_shortfall: f64,
    pub available_for_operating: f64,
}

/// Allocates deposits after vouchers to the gross family requirement first;
/// what is left funds operating expenses. Uncollected sales are not netted.
pub fn allocate_funds(aggregates: &MonthAggregates, factors: &FamilyFactors) -> FundsAllocation {
    let requirement = factors.cost_of(&aggregates.family_sales);
    let deposited = aggregates.deposits.total() + aggregates.client_payments;
    let available_before_families = deposited - aggregates.vouchers;
    let balance = available_before_families - requirement.total();

    FundsAllocation {
        deposited,
        available_before_families,
        requirement,
        family_shortfall: (-balance).max(0.0),
        available_for_operating: balance.max(0.0),
    }
}
