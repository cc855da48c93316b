use crate::error::{PlannerError, Result};
use crate::utils::normalize_weights;
use chrono::{Datelike, NaiveDate};
use schemars::gen::SchemaGenerator;
use schemars::schema::Schema;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A calendar month. Orders chronologically and prints as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(PlannerError::InvalidMonth(format!("{:04}-{:02}", year, month)));
        }
        Ok(Self { year, month })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Takes the `YYYY-MM` prefix of a stored `YYYY-MM-DD` date.
    ///
    /// The day part is never interpreted, so a row dated on the first or last
    /// day of a month cannot drift into a neighbouring month.
    pub fn from_iso_date(date: &str) -> Result<Self> {
        let prefix = date
            .trim()
            .get(..7)
            .ok_or_else(|| PlannerError::InvalidMonth(date.to_string()))?;
        prefix
            .parse()
            .map_err(|_| PlannerError::InvalidMonth(date.to_string()))
    }

    pub fn add_months(&self, n: i32) -> Self {
        let index = self.year * 12 + (self.month as i32 - 1) + n;
        Self {
            year: index.div_euclid(12),
            month: index.rem_euclid(12) as u32 + 1,
        }
    }

    pub fn next(&self) -> Self {
        self.add_months(1)
    }

    pub fn prev(&self) -> Self {
        self.add_months(-1)
    }

    /// Signed number of months from `self` to `other`.
    pub fn months_until(&self, other: &MonthKey) -> i32 {
        (other.year - self.year) * 12 + (other.month as i32 - self.month as i32)
    }

    pub fn first_day(&self) -> Result<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .ok_or_else(|| PlannerError::InvalidMonth(self.to_string()))
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || PlannerError::InvalidMonth(s.to_string());
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        Self::new(year, month).map_err(|_| invalid())
    }
}

impl TryFrom<String> for MonthKey {
    type Error = PlannerError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<MonthKey> for String {
    fn from(value: MonthKey) -> Self {
        value.to_string()
    }
}

impl JsonSchema for MonthKey {
    fn schema_name() -> String {
        "MonthKey".to_string()
    }

    fn json_schema(gen: &mut SchemaGenerator) -> Schema {
        let mut schema = String::json_schema(gen).into_object();
        schema.string().pattern = Some(r"^\d{4}-\d{2}$".to_string());
        schema.into()
    }
}

/// Zero-filled totals for every month of a window, in chronological order.
pub type MonthlySeries = BTreeMap<MonthKey, f64>;

pub fn series_values(series: &MonthlySeries) -> Vec<f64> {
    series.values().copied().collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Transaction {
    #[schemars(description = "Calendar date in YYYY-MM-DD form, without timezone conversion")]
    pub date: String,

    #[schemars(description = "Sale or purchase amount. Unparseable values must arrive as 0.")]
    pub amount: f64,

    pub supplier_id: String,

    pub supplier_name: String,

    #[serde(default)]
    #[schemars(
        description = "Supplier markup factor (sale / cost). Accepts 1.70 or the legacy 170 form. Null falls back to the default factor."
    )]
    pub supplier_factor: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
pub enum ForecastMethod {
    #[serde(rename = "avg6")]
    #[schemars(description = "Mean of the last six months, repeated across the horizon")]
    MovingAverage6,

    #[serde(rename = "trend")]
    #[schemars(description = "Least-squares straight line extrapolated over the horizon")]
    Trend,

    #[serde(rename = "exp")]
    #[schemars(description = "Simple exponential smoothing with alpha 0.5")]
    Exponential,

    #[default]
    #[serde(rename = "weighted")]
    #[schemars(description = "Normalized blend of the three base methods")]
    Weighted,
}

impl ForecastMethod {
    pub const ALL: [ForecastMethod; 4] = [
        ForecastMethod::MovingAverage6,
        ForecastMethod::Trend,
        ForecastMethod::Exponential,
        ForecastMethod::Weighted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ForecastMethod::MovingAverage6 => "avg6",
            ForecastMethod::Trend => "trend",
            ForecastMethod::Exponential => "exp",
            ForecastMethod::Weighted => "weighted",
        }
    }
}

impl fmt::Display for ForecastMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ForecastMethod {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| PlannerError::UnknownMethod(s.to_string()))
    }
}

/// Raw blend weights for (moving average, trend, exponential smoothing).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ForecastWeights {
    #[schemars(description = "Weight of the 6-month moving average")]
    pub avg6: f64,

    #[schemars(description = "Weight of the linear trend")]
    pub trend: f64,

    #[schemars(description = "Weight of exponential smoothing")]
    pub exp: f64,
}

impl Default for ForecastWeights {
    fn default() -> Self {
        Self {
            avg6: 0.2,
            trend: 0.3,
            exp: 0.5,
        }
    }
}

impl ForecastWeights {
    pub fn new(avg6: f64, trend: f64, exp: f64) -> Self {
        Self { avg6, trend, exp }
    }

    pub fn as_array(&self) -> [f64; 3] {
        [self.avg6, self.trend, self.exp]
    }

    /// Rescales to sum 1. All-zero input stays all-zero.
    pub fn normalized(&self) -> Self {
        let p = normalize_weights(&self.as_array());
        Self {
            avg6: p[0],
            trend: p[1],
            exp: p[2],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum WindowSpec {
    #[default]
    #[schemars(description = "The trailing months immediately before the reference month (reference excluded)")]
    Automatic,

    #[schemars(description = "Explicit inclusive month range. An inverted range is swapped.")]
    Manual { from: MonthKey, to: MonthKey },
}

/// Everything the presentation layer chose for one planning run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PlanningRequest {
    #[schemars(description = "Working month: supplies current-month actuals and anchors the automatic window")]
    pub reference_month: MonthKey,

    #[serde(default)]
    pub window: WindowSpec,

    #[serde(default)]
    pub method: ForecastMethod,

    #[serde(default)]
    #[schemars(description = "Blend weights, only read by the weighted method")]
    pub weights: ForecastWeights,
}

impl PlanningRequest {
    pub fn new(reference_month: MonthKey) -> Self {
        Self {
            reference_month,
            window: WindowSpec::default(),
            method: ForecastMethod::default(),
            weights: ForecastWeights::default(),
        }
    }

    pub fn with_window(mut self, window: WindowSpec) -> Self {
        self.window = window;
        self
    }

    pub fn with_method(mut self, method: ForecastMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_weights(mut self, weights: ForecastWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(PlanningRequest)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_key_parsing() {
        let key: MonthKey = "2024-03".parse().unwrap();
        assert_eq!(key.year(), 2024);
        assert_eq!(key.month(), 3);
        assert_eq!(key.to_string(), "2024-03");

        assert!("2024-13".parse::<MonthKey>().is_err());
        assert!("2024-3".parse::<MonthKey>().is_err());
        assert!("march".parse::<MonthKey>().is_err());
    }

    #[test]
    fn test_month_key_from_iso_date_ignores_day() {
        let first = MonthKey::from_iso_date("2024-03-01").unwrap();
        let last = MonthKey::from_iso_date("2024-03-31").unwrap();
        assert_eq!(first, last);
        assert_eq!(first.to_string(), "2024-03");

        assert!(MonthKey::from_iso_date("2024").is_err());
        assert!(MonthKey::from_iso_date("").is_err());
    }

    #[test]
    fn test_month_arithmetic_crosses_years() {
        let jan = MonthKey::new(2024, 1).unwrap();
        assert_eq!(jan.prev(), MonthKey::new(2023, 12).unwrap());
        assert_eq!(jan.add_months(-6), MonthKey::new(2023, 7).unwrap());
        assert_eq!(jan.add_months(14), MonthKey::new(2025, 3).unwrap());
        assert_eq!(jan.months_until(&MonthKey::new(2025, 3).unwrap()), 14);
        assert_eq!(
            jan.first_day().unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
        );
    }

    #[test]
    fn test_forecast_method_round_trip_names() {
        for method in ForecastMethod::ALL {
            assert_eq!(method.as_str().parse::<ForecastMethod>().unwrap(), method);
        }
        assert!("holt".parse::<ForecastMethod>().is_err());

        let json = serde_json::to_string(&ForecastMethod::MovingAverage6).unwrap();
        assert_eq!(json, "\"avg6\"");
    }

    #[test]
    fn test_request_deserializes_with_defaults() {
        let request: PlanningRequest =
            serde_json::from_str(r#"{ "reference_month": "2024-07" }"#).unwrap();
        assert_eq!(request.window, WindowSpec::Automatic);
        assert_eq!(request.method, ForecastMethod::Weighted);
        assert_eq!(request.weights, ForecastWeights::default());

        let manual: PlanningRequest = serde_json::from_str(
            r#"{
                "reference_month": "2024-07",
                "window": { "mode": "manual", "from": "2024-01", "to": "2024-03" },
                "method": "trend"
            }"#,
        )
        .unwrap();
        assert_eq!(manual.method, ForecastMethod::Trend);
        assert!(matches!(manual.window, WindowSpec::Manual { .. }));
    }

    #[test]
    fn test_schema_generation() {
        let schema_json = PlanningRequest::schema_as_json().unwrap();
        assert!(schema_json.contains("reference_month"));
        assert!(schema_json.contains("weights"));
    }
}
