use crate::error::Result;
use crate::schema::{series_values, MonthKey, MonthlySeries, Transaction, WindowSpec};
use crate::utils::{month_range, normalize_factor, sanitize_amount};
use chrono::NaiveDate;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Shown when a row carries no supplier name.
pub const UNNAMED_SUPPLIER: &str = "—";

/// Longest automatic window, twenty years of months.
pub const MAX_TRAILING_MONTHS: u32 = 240;

/// The concrete months a forecast is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedWindow {
    months: Vec<MonthKey>,
    end_exclusive: MonthKey,
}

impl ResolvedWindow {
    pub fn resolve(window: &WindowSpec, reference: MonthKey, trailing_months: u32) -> Self {
        match *window {
            WindowSpec::Automatic => Self::trailing(reference, trailing_months),
            WindowSpec::Manual { from, to } => Self::manual(from, to),
        }
    }

    /// The `count` months before `reference`; `reference` itself is excluded.
    /// `count` is capped at [`MAX_TRAILING_MONTHS`].
    pub fn trailing(reference: MonthKey, count: u32) -> Self {
        let count = count.min(MAX_TRAILING_MONTHS) as i32;
        let start = reference.add_months(-count);
        Self {
            months: month_range(start, reference.prev()),
            end_exclusive: reference,
        }
    }

    /// Inclusive range. Bounds given in the wrong order are swapped.
    pub fn manual(from: MonthKey, to: MonthKey) -> Self {
        let (start, end) = if from <= to { (from, to) } else { (to, from) };
        Self {
            months: month_range(start, end),
            end_exclusive: end.next(),
        }
    }

    pub fn months(&self) -> &[MonthKey] {
        &self.months
    }

    pub fn len(&self) -> usize {
        self.months.len()
    }

    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }

    pub fn contains(&self, month: &MonthKey) -> bool {
        self.months.binary_search(month).is_ok()
    }

    pub fn start(&self) -> MonthKey {
        self.months.first().copied().unwrap_or(self.end_exclusive)
    }

    pub fn end_exclusive(&self) -> MonthKey {
        self.end_exclusive
    }

    /// The month being forecast: right after the last window month.
    pub fn target_month(&self) -> MonthKey {
        self.end_exclusive
    }

    /// `[start, end)` as calendar dates, for range queries against the store.
    pub fn date_bounds(&self) -> Result<(NaiveDate, NaiveDate)> {
        Ok((self.start().first_day()?, self.end_exclusive.first_day()?))
    }

    pub fn zero_series(&self) -> MonthlySeries {
        self.months.iter().map(|m| (*m, 0.0)).collect()
    }

    pub fn caption(&self) -> String {
        match (self.months.first(), self.months.last()) {
            (Some(first), Some(last)) => {
                format!("{} → {} ({} months)", first, last, self.months.len())
            }
            _ => format!("empty window before {}", self.end_exclusive),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierHistory {
    pub supplier_name: String,
    /// Normalized markup factor taken from the supplier's first row.
    pub factor: f64,
    pub months: MonthlySeries,
}

impl SupplierHistory {
    pub fn values(&self) -> Vec<f64> {
        series_values(&self.months)
    }

    pub fn window_total(&self) -> f64 {
        self.months.values().sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierSales {
    pub supplier_name: String,
    pub amount: f64,
    pub factor: f64,
}

fn display_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        UNNAMED_SUPPLIER.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Groups rows into one zero-filled monthly series per supplier.
///
/// Only suppliers with at least one row inside the window appear. Rows with
/// an unreadable date or a month outside the window are ignored. Amounts are
/// summed with their sign so credit notes net out, then each month is floored
/// at zero.
pub fn build_historical_series(
    transactions: &[Transaction],
    window: &ResolvedWindow,
    default_factor: f64,
) -> BTreeMap<String, SupplierHistory> {
    let mut history: BTreeMap<String, SupplierHistory> = BTreeMap::new();
    let mut outside = 0usize;

    for row in transactions {
        let month = match MonthKey::from_iso_date(&row.date) {
            Ok(month) => month,
            Err(e) => {
                warn!("Skipping row for supplier {}: {}", row.supplier_id, e);
                continue;
            }
        };

        if !window.contains(&month) {
            outside += 1;
            continue;
        }

        let entry = history
            .entry(row.supplier_id.clone())
            .or_insert_with(|| SupplierHistory {
                supplier_name: display_name(&row.supplier_name),
                factor: normalize_factor(row.supplier_factor, default_factor),
                months: window.zero_series(),
            });

        *entry.months.entry(month).or_default() += sanitize_amount(row.amount);
    }

    for series in history.values_mut() {
        for value in series.months.values_mut() {
            *value = value.max(0.0);
        }
    }

    if outside > 0 {
        debug!(
            "Ignored {} rows outside the window {}",
            outside,
            window.caption()
        );
    }
    debug!(
        "Aggregated {} supplier series over {}",
        history.len(),
        window.caption()
    );

    history
}

/// Totals one month's rows per supplier; the current-month actuals of a plan.
pub fn aggregate_month_sales(
    transactions: &[Transaction],
    month: MonthKey,
    default_factor: f64,
) -> BTreeMap<String, SupplierSales> {
    let mut sales: BTreeMap<String, SupplierSales> = BTreeMap::new();

    for row in transactions {
        match MonthKey::from_iso_date(&row.date) {
            Ok(m) if m == month => {}
            Ok(_) => continue,
            Err(e) => {
                warn!("Skipping row for supplier {}: {}", row.supplier_id, e);
                continue;
            }
        }

        sales
            .entry(row.supplier_id.clone())
            .or_insert_with(|| SupplierSales {
                supplier_name: display_name(&row.supplier_name),
                amount: 0.0,
                factor: normalize_factor(row.supplier_factor, default_factor),
            })
            .amount += sanitize_amount(row.amount);
    }

    sales
}
