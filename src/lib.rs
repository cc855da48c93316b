//! # Purchase Planner
//!
//! Forecasting and purchase-planning engine for a distribution back office.
//! Turns per-transaction sales into per-supplier monthly series, projects the
//! next month, and converts the projection into suggested supplier orders.
//!
//! ## Core Concepts
//!
//! - **Window**: the months a forecast is built from; the month right after it
//!   is the **target month** being planned
//! - **Factor**: supplier markup, sale price / cost. Cost = sale ÷ factor
//! - **Proposed**: forecast sales converted to cost
//! - **Restock**: current-month sales converted to cost
//! - **Mix**: the average of proposed and restock
//!
//! ## Example
//!
//! ```rust,ignore
//! use purchase_planner::*;
//!
//! let planner = PurchasePlanner::new(PlannerConfig::default())?;
//! let request = planner
//!     .request("2024-07".parse()?)
//!     .with_method(ForecastMethod::Weighted);
//!
//! let outcome = planner.plan(&request, &window_rows, &current_rows);
//! for line in &outcome.plan.lines {
//!     println!("{}: {:.2}", line.supplier_name, line.mix_cost);
//! }
//! ```

pub mod aggregation;
pub mod cash;
pub mod config;
pub mod error;
pub mod forecast;
pub mod planner;
pub mod schema;
pub mod source;
pub mod utils;

pub use aggregation::{
    aggregate_month_sales, build_historical_series, ResolvedWindow, SupplierHistory,
    SupplierSales, MAX_TRAILING_MONTHS, UNNAMED_SUPPLIER,
};
pub use cash::{
    allocate_funds, compute_cash_planning, summarize_month, CashMovement, CashPlanning,
    DailyCut, DailyInvoice, Deposit, DepositCategory, DepositTotals, FamilyBreakdown,
    FamilyFactors, FinanceRecords, FundsAllocation, MonthAggregates, OperatingHeadroom,
    ProductFamily,
};
pub use config::{PlannerConfig, DEFAULT_TRAILING_MONTHS};
pub use error::{PlannerError, Result};
pub use forecast::{
    forecast, forecast_avg6m, forecast_exp, forecast_exp_with_alpha, forecast_next,
    forecast_trend, forecast_weighted, MOVING_AVERAGE_WINDOW, SMOOTHING_ALPHA,
};
pub use planner::{
    build_plan, build_projection, plan_for_request, working_month_kpis, PayableInvoice,
    PlanLine, PlanLineBasis, PlanOutcome, PlanResult, PlanSnapshot, PlanSnapshotLine,
    PlanTotals, ProjectionReport, ProjectionRow, WorkingMonthKpis,
};
pub use schema::*;
pub use source::{plan_from_source, EntityKind, InMemorySource, PlanningDataSource};
pub use utils::*;

use log::{debug, info};
use std::collections::BTreeMap;

/// Planning operations bound to one validated [`PlannerConfig`].
#[derive(Debug, Clone, Default)]
pub struct PurchasePlanner {
    config: PlannerConfig,
}

impl PurchasePlanner {
    pub fn new(config: PlannerConfig) -> Result<Self> {
        config.validate()?;
        debug!(
            "Planner configured: factor {}, {} trailing months, {} method",
            config.default_factor, config.trailing_months, config.default_method
        );
        Ok(Self { config })
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// The configured default factor in decimal form (170 reads as 1.70).
    pub fn default_factor(&self) -> f64 {
        self.config.normalized_default_factor()
    }

    /// A request for `reference_month` carrying the configured method and weights.
    pub fn request(&self, reference_month: MonthKey) -> PlanningRequest {
        PlanningRequest::new(reference_month)
            .with_method(self.config.default_method)
            .with_weights(self.config.default_weights)
    }

    pub fn resolve_window(&self, request: &PlanningRequest) -> ResolvedWindow {
        ResolvedWindow::resolve(
            &request.window,
            request.reference_month,
            self.config.trailing_months,
        )
    }

    pub fn forecast(
        &self,
        method: ForecastMethod,
        series: &[f64],
        horizon: usize,
        weights: &ForecastWeights,
    ) -> Vec<f64> {
        forecast(method, series, horizon, weights)
    }

    pub fn historical_series(
        &self,
        transactions: &[Transaction],
        window: &ResolvedWindow,
    ) -> BTreeMap<String, SupplierHistory> {
        build_historical_series(transactions, window, self.default_factor())
    }

    pub fn plan(
        &self,
        request: &PlanningRequest,
        window_rows: &[Transaction],
        current_rows: &[Transaction],
    ) -> PlanOutcome {
        plan_for_request(
            request,
            window_rows,
            current_rows,
            self.default_factor(),
            &self.config,
        )
    }

    pub fn project(
        &self,
        request: &PlanningRequest,
        window_rows: &[Transaction],
        horizon: usize,
    ) -> Result<ProjectionReport> {
        let window = self.resolve_window(request);
        let history = self.historical_series(window_rows, &window);
        info!(
            "Projecting {} suppliers {} months ahead from {}",
            history.len(),
            horizon,
            window.caption()
        );
        build_projection(&history, &window, request.method, &request.weights, horizon)
    }

    /// Freezes an outcome produced for `request`.
    pub fn snapshot(&self, request: &PlanningRequest, outcome: &PlanOutcome) -> Result<PlanSnapshot> {
        PlanSnapshot::from_plan(
            &outcome.plan,
            outcome.target_month,
            request.method,
            &request.weights,
        )
    }

    pub fn working_month_kpis(
        &self,
        current_rows: &[Transaction],
        payables: &[PayableInvoice],
        month: MonthKey,
    ) -> WorkingMonthKpis {
        let default_factor = self.default_factor();
        let current = aggregate_month_sales(current_rows, month, default_factor);
        working_month_kpis(&current, payables, month, default_factor)
    }

    pub fn cash_planning(&self, records: &FinanceRecords, month: MonthKey) -> CashPlanning {
        let aggregates = summarize_month(records, month);
        let planning = compute_cash_planning(&aggregates, &self.config.family_factors);
        info!(
            "Cash planning for {}: requirement {:.2}, shortfall {:.2}",
            month, planning.total_requirement, planning.shortfall
        );
        planning
    }

    pub fn allocate_funds(&self, records: &FinanceRecords, month: MonthKey) -> FundsAllocation {
        let aggregates = summarize_month(records, month);
        allocate_funds(&aggregates, &self.config.family_factors)
    }

    pub async fn plan_from_source<S>(&self, source: &S, request: &PlanningRequest) -> Result<PlanOutcome>
    where
        S: PlanningDataSource + ?Sized,
    {
        plan_from_source(source, request, &self.config).await
    }
}
