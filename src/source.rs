//! Boundary to the persistence layer, and the fetch-then-plan flow built on it.

use crate::aggregation::ResolvedWindow;
use crate::config::PlannerConfig;
use crate::error::Result;
use crate::planner::{plan_for_request, PlanOutcome};
use crate::schema::{PlanningRequest, Transaction};
use crate::utils::{normalize_factor, DEFAULT_FACTOR_PARAM};
use chrono::NaiveDate;
use futures::future::{self, BoxFuture, FutureExt};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Sales,
    Purchases,
}

/// Read access to stored transactions and scalar parameters.
///
/// Implementations report failures as [`PlannerError::DataSource`](crate::PlannerError::DataSource).
pub trait PlanningDataSource: Send + Sync {
    /// Rows of `kind` dated in `[start, end_exclusive)`.
    fn fetch_transactions(
        &self,
        kind: EntityKind,
        start: NaiveDate,
        end_exclusive: NaiveDate,
    ) -> BoxFuture<'_, Result<Vec<Transaction>>>;

    fn fetch_scalar_param<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<f64>>>;
}

/// A [`PlanningDataSource`] over rows held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    sales: Vec<Transaction>,
    purchases: Vec<Transaction>,
    params: HashMap<String, f64>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sales(mut self, rows: Vec<Transaction>) -> Self {
        self.sales.extend(rows);
        self
    }

    pub fn with_purchases(mut self, rows: Vec<Transaction>) -> Self {
        self.purchases.extend(rows);
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: f64) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    fn rows(&self, kind: EntityKind) -> &[Transaction] {
        match kind {
            EntityKind::Sales => &self.sales,
            EntityKind::Purchases => &self.purchases,
        }
    }
}

fn row_date(row: &Transaction) -> Option<NaiveDate> {
    let day = row.date.get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

impl PlanningDataSource for InMemorySource {
    fn fetch_transactions(
        &self,
        kind: EntityKind,
        start: NaiveDate,
        end_exclusive: NaiveDate,
    ) -> BoxFuture<'_, Result<Vec<Transaction>>> {
        let rows: Vec<Transaction> = self
            .rows(kind)
            .iter()
            .filter(|row| row_date(row).is_some_and(|d| d >= start && d < end_exclusive))
            .cloned()
            .collect();
        future::ready(Ok(rows)).boxed()
    }

    fn fetch_scalar_param<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<f64>>> {
        future::ready(Ok(self.params.get(key).copied())).boxed()
    }
}

/// Fetches the window's sales, the reference month's sales and the default
/// factor concurrently, then builds the plan.
pub async fn plan_from_source<S>(
    source: &S,
    request: &PlanningRequest,
    config: &PlannerConfig,
) -> Result<PlanOutcome>
where
    S: PlanningDataSource + ?Sized,
{
    let window = ResolvedWindow::resolve(
        &request.window,
        request.reference_month,
        config.trailing_months,
    );
    let (window_start, window_end) = window.date_bounds()?;
    let current_start = request.reference_month.first_day()?;
    let current_end = request.reference_month.next().first_day()?;

    info!(
        "Planning {} from {} with {} method",
        window.target_month(),
        window.caption(),
        request.method
    );

    let (history_rows, current_rows, factor_param) = futures::try_join!(
        source.fetch_transactions(EntityKind::Sales, window_start, window_end),
        source.fetch_transactions(EntityKind::Sales, current_start, current_end),
        source.fetch_scalar_param(DEFAULT_FACTOR_PARAM),
    )?;

    debug!(
        "Fetched {} window rows and {} current-month rows",
        history_rows.len(),
        current_rows.len()
    );

    let default_factor = normalize_factor(factor_param, config.normalized_default_factor());
    Ok(plan_for_request(
        request,
        &history_rows,
        &current_rows,
        default_factor,
        config,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlannerError;
    use crate::schema::{ForecastMethod, MonthKey, WindowSpec};
    use futures::executor::block_on;

    fn sale(date: &str, amount: f64, supplier: &str, factor: Option<f64>) -> Transaction {
        Transaction {
            date: date.to_string(),
            amount,
            supplier_id: supplier.to_string(),
            supplier_name: format!("Supplier {}", supplier),
            supplier_factor: factor,
        }
    }

    fn month(s: &str) -> MonthKey {
        s.parse().unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    struct FailingSource;

    impl PlanningDataSource for FailingSource {
        fn fetch_transactions(
            &self,
            _kind: EntityKind,
            _start: NaiveDate,
            _end_exclusive: NaiveDate,
        ) -> BoxFuture<'_, Result<Vec<Transaction>>> {
            future::ready(Err(PlannerError::DataSource("connection refused".to_string()))).boxed()
        }

        fn fetch_scalar_param<'a>(&'a self, _key: &'a str) -> BoxFuture<'a, Result<Option<f64>>> {
            future::ready(Ok(None)).boxed()
        }
    }

    #[test]
    fn test_in_memory_range_is_half_open() {
        let source = InMemorySource::new()
            .with_sales(vec![
                sale("2024-01-01", 1.0, "A", None),
                sale("2024-01-31", 2.0, "A", None),
                sale("2024-02-01", 3.0, "A", None),
                sale("garbage", 4.0, "A", None),
            ])
            .with_purchases(vec![sale("2024-01-15", 5.0, "A", None)]);

        let rows = block_on(source.fetch_transactions(
            EntityKind::Sales,
            date("2024-01-01"),
            date("2024-02-01"),
        ))
        .unwrap();
        let amounts: Vec<f64> = rows.iter().map(|r| r.amount).collect();
        assert_eq!(amounts, vec![1.0, 2.0]);

        let purchases = block_on(source.fetch_transactions(
            EntityKind::Purchases,
            date("2024-01-01"),
            date("2024-02-01"),
        ))
        .unwrap();
        assert_eq!(purchases.len(), 1);
    }

    #[test]
    fn test_plan_from_source_uses_stored_default_factor() {
        let source = InMemorySource::new()
            .with_sales(vec![
                sale("2024-04-10", 500.0, "A", None),
                sale("2024-05-10", 500.0, "A", None),
                sale("2024-06-05", 250.0, "A", None),
                sale("2024-06-07", 900.0, "B", Some(300.0)),
            ])
            .with_param(DEFAULT_FACTOR_PARAM, 250.0);

        let request = PlanningRequest::new(month("2024-06"))
            .with_window(WindowSpec::Manual {
                from: month("2024-04"),
                to: month("2024-05"),
            })
            .with_method(ForecastMethod::MovingAverage6);

        let outcome = block_on(plan_from_source(&source, &request, &PlannerConfig::default())).unwrap();

        assert_eq!(outcome.target_month, month("2024-06"));
        assert_eq!(outcome.default_factor, 2.5);

        let a = outcome.plan.line("A").unwrap();
        assert_eq!(a.factor, 2.5);
        assert_eq!(a.proposed_cost, 200.0);
        assert_eq!(a.restock_cost, 100.0);

        let b = outcome.plan.line("B").unwrap();
        assert_eq!(b.factor, 3.0);
        assert_eq!(b.restock_cost, 300.0);
        assert_eq!(b.mix_cost, 150.0);
    }

    #[test]
    fn test_plan_from_source_propagates_fetch_errors() {
        let request = PlanningRequest::new(month("2024-06"));
        let result = block_on(plan_from_source(&FailingSource, &request, &PlannerConfig::default()));
        assert!(matches!(result, Err(PlannerError::DataSource(_))));
    }

    #[test]
    fn test_plan_from_source_automatic_window() {
        let source = InMemorySource::new().with_sales(vec![
            sale("2023-12-15", 999.0, "A", Some(1.0)),
            sale("2024-01-15", 100.0, "A", Some(1.0)),
            sale("2024-03-15", 100.0, "A", Some(1.0)),
        ]);
        let config = PlannerConfig {
            trailing_months: 3,
            ..Default::default()
        };
        let request = PlanningRequest::new(month("2024-04")).with_method(ForecastMethod::MovingAverage6);

        let outcome = block_on(plan_from_source(&source, &request, &config)).unwrap();

        assert_eq!(outcome.window.len(), 3);
        assert_eq!(outcome.history["A"].values(), vec![100.0, 0.0, 100.0]);
        assert!((outcome.plan.totals.proposed - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(outcome.default_factor, 1.70);
    }

    #[test]
    fn test_plan_from_source_scales_default_factor_once() {
        let source = InMemorySource::new()
            .with_sales(vec![sale("2024-05-10", 3000.0, "A", None)])
            .with_param(DEFAULT_FACTOR_PARAM, 1500.0);
        let request = PlanningRequest::new(month("2024-06"))
            .with_window(WindowSpec::Manual {
                from: month("2024-05"),
                to: month("2024-05"),
            })
            .with_method(ForecastMethod::MovingAverage6);

        let outcome = block_on(plan_from_source(&source, &request, &PlannerConfig::default())).unwrap();
        assert_eq!(outcome.default_factor, 15.0);
        assert_eq!(outcome.plan.line("A").unwrap().proposed_cost, 200.0);

        let legacy_config = PlannerConfig {
            default_factor: 170.0,
            ..Default::default()
        };
        let unset = InMemorySource::new().with_sales(vec![sale("2024-05-10", 340.0, "A", None)]);
        let outcome = block_on(plan_from_source(&unset, &request, &legacy_config)).unwrap();
        assert!((outcome.default_factor - 1.70).abs() < 1e-12);
        assert!((outcome.plan.line("A").unwrap().proposed_cost - 200.0).abs() < 1e-9);
    }
}
