use crate::aggregation::{
    aggregate_month_sales, build_historical_series, ResolvedWindow, SupplierHistory, SupplierSales,
};
use crate::config::PlannerConfig;
use crate::error::{PlannerError, Result};
use crate::forecast::{forecast, forecast_next};
use crate::schema::{ForecastMethod, ForecastWeights, MonthKey, PlanningRequest, Transaction};
use crate::utils::{ensure_factor, round_to, sanitize_amount, DEFAULT_FACTOR};
use log::{debug, info};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PlanLineBasis {
    /// The supplier had sales inside the historical window.
    Forecast,
    /// Only current-month sales exist; the forecast component is zero.
    RestockOnly,
}

/// One suggested order for a supplier and target month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanLine {
    pub supplier_id: String,
    pub supplier_name: String,
    pub factor: f64,
    /// Forecast sales for the target month, floored at zero.
    pub forecast_next: f64,
    /// Forecast sales converted to supplier cost.
    pub proposed_cost: f64,
    /// Current-month sales converted to supplier cost.
    pub restock_cost: f64,
    pub mix_cost: f64,
    pub basis: PlanLineBasis,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PlanTotals {
    pub forecast: f64,
    pub proposed: f64,
    pub restock: f64,
    pub mix: f64,
}

impl PlanTotals {
    pub fn from_lines(lines: &[PlanLine]) -> Self {
        lines.iter().fold(Self::default(), |acc, line| Self {
            forecast: acc.forecast + line.forecast_next,
            proposed: acc.proposed + line.proposed_cost,
            restock: acc.restock + line.restock_cost,
            mix: acc.mix + line.mix_cost,
        })
    }

    fn rounded(&self) -> Self {
        Self {
            forecast: round_to(self.forecast, 2),
            proposed: round_to(self.proposed, 2),
            restock: round_to(self.restock, 2),
            mix: round_to(self.mix, 2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    pub lines: Vec<PlanLine>,
    pub totals: PlanTotals,
}

impl PlanResult {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn line(&self, supplier_id: &str) -> Option<&PlanLine> {
        self.lines.iter().find(|l| l.supplier_id == supplier_id)
    }
}

/// Builds the suggested purchase plan for the month after the window.
///
/// Suppliers with history come first, in id order. Suppliers that only sold
/// in the current month follow with a zero forecast and a mix of half their
/// restock cost: there is no forecast half to average with.
pub fn build_plan(
    history: &BTreeMap<String, SupplierHistory>,
    current: &BTreeMap<String, SupplierSales>,
    method: ForecastMethod,
    weights: &ForecastWeights,
    default_factor: f64,
) -> PlanResult {
    let mut lines = Vec::with_capacity(history.len() + current.len());

    for (supplier_id, supplier) in history {
        let series = supplier.values();
        let forecast_next = forecast_next(method, &series, weights).max(0.0);
        let factor = ensure_factor(supplier.factor, default_factor);

        let proposed_cost = forecast_next / factor;
        let current_amount = current
            .get(supplier_id)
            .map(|s| sanitize_amount(s.amount))
            .unwrap_or(0.0);
        let restock_cost = (current_amount / factor).max(0.0);

        lines.push(PlanLine {
            supplier_id: supplier_id.clone(),
            supplier_name: supplier.supplier_name.clone(),
            factor,
            forecast_next,
            proposed_cost,
            restock_cost,
            mix_cost: (proposed_cost + restock_cost) / 2.0,
            basis: PlanLineBasis::Forecast,
        });
    }

    for (supplier_id, sales) in current {
        if history.contains_key(supplier_id) {
            continue;
        }

        let factor = ensure_factor(sales.factor, default_factor);
        let restock_cost = (sanitize_amount(sales.amount) / factor).max(0.0);

        lines.push(PlanLine {
            supplier_id: supplier_id.clone(),
            supplier_name: sales.supplier_name.clone(),
            factor,
            forecast_next: 0.0,
            proposed_cost: 0.0,
            restock_cost,
            mix_cost: restock_cost / 2.0,
            basis: PlanLineBasis::RestockOnly,
        });
    }

    let totals = PlanTotals::from_lines(&lines);
    debug!(
        "Built plan with {} lines ({} from history) using {} method",
        lines.len(),
        history.len(),
        method
    );

    PlanResult { lines, totals }
}

/// Everything produced by one planning run.
#[derive(Debug, Clone)]
pub struct PlanOutcome {
    pub window: ResolvedWindow,
    pub target_month: MonthKey,
    pub default_factor: f64,
    pub history: BTreeMap<String, SupplierHistory>,
    pub current: BTreeMap<String, SupplierSales>,
    pub plan: PlanResult,
}

/// Plans `request` from rows already fetched for its window and reference
/// month. Rows outside either range are ignored. `default_factor` is in
/// decimal form and is not rescaled.
pub fn plan_for_request(
    request: &PlanningRequest,
    window_rows: &[Transaction],
    current_rows: &[Transaction],
    default_factor: f64,
    config: &PlannerConfig,
) -> PlanOutcome {
    let default_factor = ensure_factor(default_factor, DEFAULT_FACTOR);
    let window = ResolvedWindow::resolve(
        &request.window,
        request.reference_month,
        config.trailing_months,
    );
    let history = build_historical_series(window_rows, &window, default_factor);
    let current = aggregate_month_sales(current_rows, request.reference_month, default_factor);
    let plan = build_plan(
        &history,
        &current,
        request.method,
        &request.weights,
        default_factor,
    );

    info!(
        "Plan for {}: {} lines, proposed {:.2}",
        window.target_month(),
        plan.lines.len(),
        plan.totals.proposed
    );

    PlanOutcome {
        target_month: window.target_month(),
        window,
        default_factor,
        history,
        current,
        plan,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionRow {
    pub supplier_id: String,
    pub supplier_name: String,
    /// Window totals in month order.
    pub history: Vec<f64>,
    pub window_total: f64,
    pub forecast: Vec<f64>,
    pub next_month: f64,
    pub horizon_total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionReport {
    pub months: Vec<MonthKey>,
    pub horizon: usize,
    pub method: ForecastMethod,
    pub rows: Vec<ProjectionRow>,
    pub total_next_month: f64,
    pub total_horizon: f64,
}

/// Multi-month sales projection per supplier, without cost conversion.
pub fn build_projection(
    history: &BTreeMap<String, SupplierHistory>,
    window: &ResolvedWindow,
    method: ForecastMethod,
    weights: &ForecastWeights,
    horizon: usize,
) -> Result<ProjectionReport> {
    if horizon == 0 {
        return Err(PlannerError::InvalidHorizon(horizon));
    }

    let rows: Vec<ProjectionRow> = history
        .iter()
        .map(|(supplier_id, supplier)| {
            let values = supplier.values();
            let projected = forecast(method, &values, horizon, weights);
            ProjectionRow {
                supplier_id: supplier_id.clone(),
                supplier_name: supplier.supplier_name.clone(),
                window_total: values.iter().sum(),
                next_month: projected.first().copied().unwrap_or(0.0),
                horizon_total: projected.iter().sum(),
                history: values,
                forecast: projected,
            }
        })
        .collect();

    Ok(ProjectionReport {
        months: window.months().to_vec(),
        horizon,
        method,
        total_next_month: rows.iter().map(|r| r.next_month).sum(),
        total_horizon: rows.iter().map(|r| r.horizon_total).sum(),
        rows,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSnapshotLine {
    pub supplier_id: String,
    pub supplier_name: String,
    pub factor: f64,
    pub forecast_next: f64,
    pub proposed: f64,
    #[serde(rename = "final")]
    pub final_amount: f64,
}

/// A saved plan. Read-only once built; a stored plan is replaced or deleted
/// as a whole, never edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSnapshot {
    plan_month: MonthKey,
    method: ForecastMethod,
    weights: Option<ForecastWeights>,
    totals: PlanTotals,
    lines: Vec<PlanSnapshotLine>,
}

impl PlanSnapshot {
    /// Freezes `plan` for `plan_month`. Money is rounded to cents, factors to
    /// four places. Weights are recorded (normalized) only for the blend.
    pub fn from_plan(
        plan: &PlanResult,
        plan_month: MonthKey,
        method: ForecastMethod,
        weights: &ForecastWeights,
    ) -> Result<Self> {
        if plan.is_empty() {
            return Err(PlannerError::EmptyPlan);
        }

        let lines = plan
            .lines
            .iter()
            .map(|line| PlanSnapshotLine {
                supplier_id: line.supplier_id.clone(),
                supplier_name: line.supplier_name.clone(),
                factor: round_to(line.factor, 4),
                forecast_next: round_to(line.forecast_next, 2),
                proposed: round_to(line.proposed_cost, 2),
                final_amount: round_to(line.proposed_cost, 2),
            })
            .collect();

        info!(
            "Snapshot of plan for {} with {} lines",
            plan_month,
            plan.lines.len()
        );

        Ok(Self {
            plan_month,
            method,
            weights: (method == ForecastMethod::Weighted).then(|| weights.normalized()),
            totals: plan.totals.rounded(),
            lines,
        })
    }

    pub fn plan_month(&self) -> MonthKey {
        self.plan_month
    }

    pub fn method(&self) -> ForecastMethod {
        self.method
    }

    pub fn weights(&self) -> Option<&ForecastWeights> {
        self.weights.as_ref()
    }

    pub fn totals(&self) -> &PlanTotals {
        &self.totals
    }

    pub fn lines(&self) -> &[PlanSnapshotLine] {
        &self.lines
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// A supplier invoice scheduled for payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayableInvoice {
    pub amount: f64,
    /// Due date, `YYYY-MM-DD`.
    pub pay_date: String,
    pub paid: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WorkingMonthKpis {
    /// Current-month sales converted to supplier cost.
    pub payables_portfolio: f64,
    pub invoices_due: f64,
    pub invoices_due_paid: f64,
}

impl WorkingMonthKpis {
    pub fn invoices_due_pending(&self) -> f64 {
        self.invoices_due - self.invoices_due_paid
    }
}

pub fn working_month_kpis(
    current: &BTreeMap<String, SupplierSales>,
    payables: &[PayableInvoice],
    month: MonthKey,
    default_factor: f64,
) -> WorkingMonthKpis {
    let payables_portfolio = current
        .values()
        .map(|s| sanitize_amount(s.amount) / ensure_factor(s.factor, default_factor))
        .sum();

    let due: Vec<&PayableInvoice> = payables
        .iter()
        .filter(|p| MonthKey::from_iso_date(&p.pay_date).is_ok_and(|m| m == month))
        .collect();

    WorkingMonthKpis {
        payables_portfolio,
        invoices_due: due.iter().map(|p| sanitize_amount(p.amount)).sum(),
        invoices_due_paid: due
            .iter()
            .filter(|p| p.paid)
            .map(|p| sanitize_amount(p.amount))
            .sum(),
    }
}
