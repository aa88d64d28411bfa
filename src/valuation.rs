// 💰 Valuation Engine - Estimate business value from self-reported financials
// Four formulas: EBITDA Multiple, Revenue Multiple, Asset Based, Discounted Cash Flow

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Share of asset book value recovered in a liquidation scenario
pub const ASSET_RECOVERY_RATE: f64 = 0.7;

/// Default EBITDA margin assumed when the seller reports revenue only
pub const DEFAULT_EBITDA_MARGIN: f64 = 0.25;

/// Margin used by the single-formula quick estimate
pub const QUICK_ESTIMATE_MARGIN: f64 = 0.30;

pub const CURRENCY: &str = "INR";

// ============================================================================
// FINANCIAL RECORD
// ============================================================================

/// Self-reported financials, as submitted in step 2 of the listing wizard
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialRecord {
    #[serde(default)]
    pub annual_revenue: Option<f64>,

    #[serde(default)]
    pub ebitda: Option<f64>,

    #[serde(default)]
    pub total_assets: Option<f64>,

    /// Fraction, e.g. 0.35 for a 35% margin
    #[serde(default)]
    pub profit_margin: Option<f64>,

    #[serde(default)]
    pub years_operation: Option<f64>,
}

impl FinancialRecord {
    pub fn new(annual_revenue: f64) -> Self {
        FinancialRecord {
            annual_revenue: Some(annual_revenue),
            ..Default::default()
        }
    }

    pub fn with_ebitda(mut self, ebitda: f64) -> Self {
        self.ebitda = Some(ebitda);
        self
    }

    pub fn with_assets(mut self, total_assets: f64) -> Self {
        self.total_assets = Some(total_assets);
        self
    }

    pub fn with_profit_margin(mut self, profit_margin: f64) -> Self {
        self.profit_margin = Some(profit_margin);
        self
    }

    pub fn with_years_operation(mut self, years: f64) -> Self {
        self.years_operation = Some(years);
        self
    }

    /// Validate a loosely-typed JSON payload before any computation runs.
    ///
    /// `annual_revenue` is required. Numeric strings ("1500000") are accepted,
    /// anything else non-numeric is reported as `InvalidInput` for that field.
    pub fn from_json(value: &Value) -> CoreResult<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| CoreError::invalid_input("financial_data", "expected an object"))?;

        let annual_revenue = numeric_field(obj, "annual_revenue")?
            .ok_or_else(|| CoreError::invalid_input("annual_revenue", "is required"))?;

        let record = FinancialRecord {
            annual_revenue: Some(annual_revenue),
            ebitda: numeric_field(obj, "ebitda")?,
            total_assets: numeric_field(obj, "total_assets")?,
            profit_margin: numeric_field(obj, "profit_margin")?,
            years_operation: numeric_field(obj, "years_operation")?,
        };

        record.validate()?;
        Ok(record)
    }

    /// Range checks shared by the JSON path and typed callers
    pub fn validate(&self) -> CoreResult<()> {
        let fields = [
            ("annual_revenue", self.annual_revenue, true),
            ("ebitda", self.ebitda, false),
            ("total_assets", self.total_assets, true),
            ("profit_margin", self.profit_margin, false),
            ("years_operation", self.years_operation, true),
        ];

        for (name, value, non_negative) in fields {
            if let Some(v) = value {
                if !v.is_finite() {
                    return Err(CoreError::invalid_input(name, "must be a finite number"));
                }
                if non_negative && v < 0.0 {
                    return Err(CoreError::invalid_input(name, "must not be negative"));
                }
            }
        }

        Ok(())
    }

    fn revenue(&self) -> f64 {
        self.annual_revenue.unwrap_or(0.0)
    }

    fn assets(&self) -> f64 {
        self.total_assets.unwrap_or(0.0)
    }
}

fn numeric_field(obj: &serde_json::Map<String, Value>, field: &str) -> CoreResult<Option<f64>> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| CoreError::invalid_input(field, "number out of range")),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| CoreError::invalid_input(field, format!("'{}' is not a number", s))),
        Some(_) => Err(CoreError::invalid_input(field, "expected a number")),
    }
}

// ============================================================================
// VALUATION METHOD
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValuationMethod {
    EbitdaMultiple,
    RevenueMultiple,
    AssetBased,
    Dcf,
}

impl ValuationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValuationMethod::EbitdaMultiple => "ebitda_multiple",
            ValuationMethod::RevenueMultiple => "revenue_multiple",
            ValuationMethod::AssetBased => "asset_based",
            ValuationMethod::Dcf => "dcf",
        }
    }

    /// Human-readable label for messages
    pub fn label(&self) -> &'static str {
        match self {
            ValuationMethod::EbitdaMultiple => "EBITDA Multiple",
            ValuationMethod::RevenueMultiple => "Revenue Multiple",
            ValuationMethod::AssetBased => "Asset Based",
            ValuationMethod::Dcf => "Discounted Cash Flow",
        }
    }
}

impl FromStr for ValuationMethod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ebitda_multiple" => Ok(ValuationMethod::EbitdaMultiple),
            "revenue_multiple" => Ok(ValuationMethod::RevenueMultiple),
            "asset_based" => Ok(ValuationMethod::AssetBased),
            "dcf" => Ok(ValuationMethod::Dcf),
            other => Err(CoreError::InvalidMethod(other.to_string())),
        }
    }
}

impl fmt::Display for ValuationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// VALUATION RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationResult {
    pub estimated_value: f64,
    pub method: ValuationMethod,
    pub method_details: BTreeMap<String, f64>,
    pub currency: String,
    pub confidence_score: f64,
}

impl ValuationResult {
    pub fn summary(&self) -> String {
        format!(
            "Your business is worth ~{} ({})",
            format_currency(self.estimated_value),
            self.method.label()
        )
    }
}

/// Unrounded output of a single formula
struct Estimate {
    value: f64,
    details: Vec<(&'static str, f64)>,
    confidence: f64,
}

// ============================================================================
// DCF ASSUMPTIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DcfAssumptions {
    pub growth_rate: f64,
    pub discount_rate: f64,
    pub terminal_growth: f64,
    pub projection_years: i32,
}

impl Default for DcfAssumptions {
    fn default() -> Self {
        DcfAssumptions {
            growth_rate: 0.05,
            discount_rate: 0.12,
            terminal_growth: 0.02,
            projection_years: 5,
        }
    }
}

// ============================================================================
// VALUATION ENGINE
// ============================================================================

#[derive(Debug, Clone)]
pub struct ValuationEngine {
    /// Margin applied to revenue when no EBITDA is reported (default: 0.25)
    pub default_ebitda_margin: f64,

    pub dcf: DcfAssumptions,
}

impl ValuationEngine {
    pub fn new() -> Self {
        ValuationEngine {
            default_ebitda_margin: DEFAULT_EBITDA_MARGIN,
            dcf: DcfAssumptions::default(),
        }
    }

    pub fn with_ebitda_margin(mut self, margin: f64) -> Self {
        self.default_ebitda_margin = margin;
        self
    }

    pub fn with_dcf(mut self, dcf: DcfAssumptions) -> Self {
        self.dcf = dcf;
        self
    }

    /// Compute a valuation by method name; `"auto"` picks the method from the data
    pub fn calculate_valuation(
        &self,
        data: &FinancialRecord,
        method: &str,
    ) -> CoreResult<ValuationResult> {
        let method = if method == "auto" {
            None
        } else {
            Some(method.parse::<ValuationMethod>()?)
        };
        self.calculate(data, method)
    }

    /// Typed entry point; `None` means auto-selection
    pub fn calculate(
        &self,
        data: &FinancialRecord,
        method: Option<ValuationMethod>,
    ) -> CoreResult<ValuationResult> {
        data.validate()?;

        let method = method.unwrap_or_else(|| Self::select_method(data));

        let estimate = match method {
            ValuationMethod::EbitdaMultiple => self.ebitda_multiple(data),
            ValuationMethod::RevenueMultiple => self.revenue_multiple(data),
            ValuationMethod::AssetBased => self.asset_based(data),
            ValuationMethod::Dcf => self.discounted_cash_flow(data)?,
        };

        tracing::debug!(
            method = method.as_str(),
            value = estimate.value,
            "valuation computed"
        );

        let finite = estimate.value.is_finite()
            && estimate.details.iter().all(|(_, v)| v.is_finite());
        if !finite {
            return Err(CoreError::invalid_input("financial_data", "result out of range"));
        }

        Ok(ValuationResult {
            estimated_value: round2(estimate.value),
            method,
            method_details: estimate
                .details
                .into_iter()
                .map(|(k, v)| (k.to_string(), round2(v)))
                .collect(),
            currency: CURRENCY.to_string(),
            confidence_score: estimate.confidence,
        })
    }

    /// Priority chain: first rule that matches wins
    pub fn select_method(data: &FinancialRecord) -> ValuationMethod {
        if data.ebitda.is_some() || data.annual_revenue.is_some() {
            ValuationMethod::EbitdaMultiple
        } else if data.assets() > 0.0 {
            ValuationMethod::AssetBased
        } else {
            ValuationMethod::RevenueMultiple
        }
    }

    fn ebitda_or_default(&self, data: &FinancialRecord) -> f64 {
        data.ebitda
            .unwrap_or_else(|| data.revenue() * self.default_ebitda_margin)
    }

    fn ebitda_multiple(&self, data: &FinancialRecord) -> Estimate {
        let ebitda = self.ebitda_or_default(data);

        let mut multiple = 3.0;
        if data.profit_margin.unwrap_or(0.0) > 0.3 {
            multiple += 0.5;
        }
        if data.years_operation.unwrap_or(0.0) > 10.0 {
            multiple += 0.5;
        }

        let asset_contribution = data.assets() * ASSET_RECOVERY_RATE;

        Estimate {
            value: ebitda * multiple + asset_contribution,
            details: vec![
                ("ebitda", ebitda),
                ("multiple_used", multiple),
                ("asset_contribution", asset_contribution),
            ],
            confidence: 0.85,
        }
    }

    fn revenue_multiple(&self, data: &FinancialRecord) -> Estimate {
        let revenue = data.revenue();

        let mut multiple = 1.2;
        if data.profit_margin.unwrap_or(0.0) > 0.2 {
            multiple += 0.3;
        }

        Estimate {
            value: revenue * multiple,
            details: vec![("revenue", revenue), ("multiple_used", multiple)],
            confidence: 0.75,
        }
    }

    fn asset_based(&self, data: &FinancialRecord) -> Estimate {
        let assets = data.assets();

        Estimate {
            value: assets * ASSET_RECOVERY_RATE,
            details: vec![
                ("total_assets", assets),
                ("recovery_rate", ASSET_RECOVERY_RATE),
            ],
            confidence: 0.9,
        }
    }

    fn discounted_cash_flow(&self, data: &FinancialRecord) -> CoreResult<Estimate> {
        let DcfAssumptions {
            growth_rate,
            discount_rate,
            terminal_growth,
            projection_years,
        } = self.dcf;

        // Gordon growth is undefined at or above the discount rate
        if terminal_growth >= discount_rate {
            return Err(CoreError::InvalidAssumptions {
                discount_rate,
                terminal_growth,
            });
        }

        let cash_flow = self.ebitda_or_default(data);

        let present_value: f64 = (1..=projection_years)
            .map(|year| {
                cash_flow * (1.0 + growth_rate).powi(year) / (1.0 + discount_rate).powi(year)
            })
            .sum();

        let terminal_cf = cash_flow * (1.0 + growth_rate).powi(projection_years + 1);
        let terminal_value = terminal_cf / (discount_rate - terminal_growth);
        let present_terminal_value = terminal_value / (1.0 + discount_rate).powi(projection_years);

        Ok(Estimate {
            value: present_value + present_terminal_value,
            details: vec![
                ("cash_flow", cash_flow),
                ("growth_rate", growth_rate),
                ("discount_rate", discount_rate),
                ("terminal_growth", terminal_growth),
                ("present_value", present_value),
                ("terminal_value", terminal_value),
                ("present_terminal_value", present_terminal_value),
            ],
            confidence: 0.7,
        })
    }
}

impl Default for ValuationEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// Legacy single-formula estimate: 3x EBITDA (30% margin default) + 70% of assets
pub fn quick_estimate(data: &FinancialRecord) -> f64 {
    let ebitda = data
        .ebitda
        .unwrap_or_else(|| data.revenue() * QUICK_ESTIMATE_MARGIN);
    round2(ebitda * 3.0 + data.assets() * ASSET_RECOVERY_RATE)
}

pub fn round2(value: f64) -> f64 {
    let scaled = value * 100.0;
    if !scaled.is_finite() {
        // Too large for cents to matter
        return value;
    }
    scaled.round() / 100.0
}

/// Whole rupees with thousands separators, e.g. ₹1,234,567
pub fn format_currency(amount: f64) -> String {
    let rounded = amount.round();
    let digits = format!("{:.0}", rounded.abs());

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if rounded < 0.0 {
        format!("-₹{}", grouped)
    } else {
        format!("₹{}", grouped)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_auto_prefers_ebitda_multiple() {
        let engine = ValuationEngine::new();
        let data = FinancialRecord::new(4_000_000.0);

        let result = engine.calculate_valuation(&data, "auto").unwrap();
        assert_eq!(result.method, ValuationMethod::EbitdaMultiple);
        // 25% default margin, 3x multiple, no assets
        assert_eq!(result.estimated_value, 3_000_000.0);
        assert_eq!(result.confidence_score, 0.85);
        assert_eq!(result.currency, "INR");
    }

    #[test]
    fn test_auto_falls_back_to_assets_then_revenue() {
        let assets_only = FinancialRecord {
            total_assets: Some(500_000.0),
            ..Default::default()
        };
        assert_eq!(
            ValuationEngine::select_method(&assets_only),
            ValuationMethod::AssetBased
        );

        let empty = FinancialRecord::default();
        assert_eq!(
            ValuationEngine::select_method(&empty),
            ValuationMethod::RevenueMultiple
        );
    }

    #[test]
    fn test_ebitda_multiple_adjustments_are_additive() {
        let engine = ValuationEngine::new();
        let base = FinancialRecord::new(10_000_000.0).with_ebitda(1_000_000.0);

        let plain = engine.calculate(&base, Some(ValuationMethod::EbitdaMultiple)).unwrap();
        let margin = engine
            .calculate(&base.clone().with_profit_margin(0.35), Some(ValuationMethod::EbitdaMultiple))
            .unwrap();
        let both = engine
            .calculate(
                &base.clone().with_profit_margin(0.35).with_years_operation(12.0),
                Some(ValuationMethod::EbitdaMultiple),
            )
            .unwrap();

        assert_eq!(plain.method_details["multiple_used"], 3.0);
        assert_eq!(margin.method_details["multiple_used"], 3.5);
        assert_eq!(both.method_details["multiple_used"], 4.0);
        assert!(plain.estimated_value < margin.estimated_value);
        assert!(margin.estimated_value < both.estimated_value);
    }

    #[test]
    fn test_ebitda_multiple_thresholds_are_strict() {
        let engine = ValuationEngine::new();
        let data = FinancialRecord::new(1_000_000.0)
            .with_ebitda(100_000.0)
            .with_profit_margin(0.3)
            .with_years_operation(10.0);

        let result = engine.calculate_valuation(&data, "ebitda_multiple").unwrap();
        assert_eq!(result.method_details["multiple_used"], 3.0);
    }

    #[test]
    fn test_ebitda_multiple_adds_asset_contribution() {
        let engine = ValuationEngine::new();
        let data = FinancialRecord::new(0.0)
            .with_ebitda(200_000.0)
            .with_assets(1_000_000.0);

        let result = engine.calculate_valuation(&data, "ebitda_multiple").unwrap();
        assert_eq!(result.method_details["asset_contribution"], 700_000.0);
        assert_eq!(result.estimated_value, 1_300_000.0);
    }

    #[test]
    fn test_revenue_multiple() {
        let engine = ValuationEngine::new();
        let data = FinancialRecord::new(1_000_000.0);
        let result = engine.calculate_valuation(&data, "revenue_multiple").unwrap();
        assert_eq!(result.estimated_value, 1_200_000.0);
        assert_eq!(result.confidence_score, 0.75);

        let high_margin = data.with_profit_margin(0.25);
        let result = engine.calculate_valuation(&high_margin, "revenue_multiple").unwrap();
        assert_eq!(result.method_details["multiple_used"], 1.5);
        assert_eq!(result.estimated_value, 1_500_000.0);
    }

    #[test]
    fn test_asset_based_is_seventy_percent() {
        let engine = ValuationEngine::new();
        for assets in [0.0, 1.0, 250_000.0, 1_000_000.0, 73_456_789.0] {
            let data = FinancialRecord {
                total_assets: Some(assets),
                ..Default::default()
            };
            let result = engine.calculate_valuation(&data, "asset_based").unwrap();
            assert_eq!(result.estimated_value, round2(0.7 * assets));
            assert_eq!(result.confidence_score, 0.9);
        }
    }

    #[test]
    fn test_dcf_matches_closed_form() {
        let engine = ValuationEngine::new();
        let data = FinancialRecord::new(0.0).with_ebitda(1_000_000.0);

        let result = engine.calculate_valuation(&data, "dcf").unwrap();

        let growth: f64 = 1.0 + 0.05;
        let discount: f64 = 1.0 + 0.12;
        let mut expected = 0.0;
        for year in 1..=5 {
            expected += 1_000_000.0 * growth.powi(year) / discount.powi(year);
        }
        expected += 1_000_000.0 * growth.powi(6) / (0.12 - 0.02) / discount.powi(5);

        assert!((result.estimated_value - expected).abs() < 0.01);
        assert!(result.estimated_value > 10_000_000.0);
        assert_eq!(result.confidence_score, 0.7);
        assert_eq!(result.method_details["discount_rate"], 0.12);
    }

    #[test]
    fn test_dcf_rejects_terminal_growth_at_discount_rate() {
        let engine = ValuationEngine::new().with_dcf(DcfAssumptions {
            terminal_growth: 0.12,
            ..DcfAssumptions::default()
        });
        let data = FinancialRecord::new(1_000_000.0);

        let err = engine.calculate_valuation(&data, "dcf").unwrap_err();
        assert!(matches!(err, CoreError::InvalidAssumptions { .. }));
    }

    #[test]
    fn test_unknown_method() {
        let engine = ValuationEngine::new();
        let data = FinancialRecord::new(1_000_000.0);
        let err = engine.calculate_valuation(&data, "comparables").unwrap_err();
        assert_eq!(err, CoreError::InvalidMethod("comparables".to_string()));
    }

    #[test]
    fn test_valuation_is_idempotent() {
        let engine = ValuationEngine::new();
        let data = FinancialRecord::new(7_345_678.91)
            .with_assets(1_234_567.89)
            .with_profit_margin(0.31)
            .with_years_operation(15.0);

        for method in ["auto", "ebitda_multiple", "revenue_multiple", "asset_based", "dcf"] {
            let a = engine.calculate_valuation(&data, method).unwrap();
            let b = engine.calculate_valuation(&data, method).unwrap();
            assert_eq!(a.estimated_value.to_bits(), b.estimated_value.to_bits());
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_huge_revenue_stays_finite() {
        let engine = ValuationEngine::new();
        let data = FinancialRecord::new(1e307);

        let result = engine.calculate_valuation(&data, "auto").unwrap();
        assert!(result.estimated_value.is_finite());
        assert!(result.method_details.values().all(|v| v.is_finite()));

        let json = serde_json::to_value(&result).unwrap();
        assert!(json["estimated_value"].is_number());
        assert!(json["method_details"]["ebitda"].is_number());
    }

    #[test]
    fn test_overflowing_result_is_rejected() {
        let engine = ValuationEngine::new();
        let data = FinancialRecord::new(f64::MAX).with_ebitda(f64::MAX);

        let err = engine.calculate_valuation(&data, "ebitda_multiple").unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");

        let err = engine.calculate_valuation(&data, "dcf").unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");
    }

    #[test]
    fn test_round2_leaves_huge_values_alone() {
        assert_eq!(round2(1.005e307), 1.005e307);
        assert_eq!(round2(2.346), 2.35);
    }

    #[test]
    fn test_from_json_accepts_numeric_strings() {
        let record = FinancialRecord::from_json(&json!({
            "annual_revenue": "1500000",
            "ebitda": 300000,
            "total_assets": null
        }))
        .unwrap();

        assert_eq!(record.annual_revenue, Some(1_500_000.0));
        assert_eq!(record.ebitda, Some(300_000.0));
        assert_eq!(record.total_assets, None);
    }

    #[test]
    fn test_from_json_rejects_bad_input() {
        let missing = FinancialRecord::from_json(&json!({ "ebitda": 10 })).unwrap_err();
        assert_eq!(missing, CoreError::invalid_input("annual_revenue", "is required"));

        let text = FinancialRecord::from_json(&json!({
            "annual_revenue": 100,
            "ebitda": "lots"
        }))
        .unwrap_err();
        assert!(matches!(text, CoreError::InvalidInput { ref field, .. } if field == "ebitda"));

        let negative = FinancialRecord::from_json(&json!({ "annual_revenue": -5 })).unwrap_err();
        assert!(matches!(negative, CoreError::InvalidInput { .. }));

        let not_object = FinancialRecord::from_json(&json!([1, 2])).unwrap_err();
        assert!(matches!(not_object, CoreError::InvalidInput { .. }));
    }

    #[test]
    fn test_quick_estimate() {
        let data = FinancialRecord::new(1_000_000.0).with_assets(100_000.0);
        // 30% margin -> 300k EBITDA, x3 = 900k, + 70k assets
        assert_eq!(quick_estimate(&data), 970_000.0);
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(0.0), "₹0");
        assert_eq!(format_currency(999.4), "₹999");
        assert_eq!(format_currency(1_234_567.0), "₹1,234,567");
        assert_eq!(format_currency(-12_500.0), "-₹12,500");
    }
}
