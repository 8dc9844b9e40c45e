//! Demand forecasting from sales history.
//!
//! Forecasts use the average daily demand over the span between a SKU's first
//! and last recorded sale. At least [`MIN_DATA_POINTS`] sales are required.

use super::error::MIN_DATA_POINTS;
use super::records::{SalesRecord, StockItem};
use super::{parse_date, ErpTables, FixtureSet, ServiceError};
use crate::util::round2;
use chrono::Datelike;
use serde::Serialize;

/// Horizon used for stockout risk.
const RISK_PERIOD_DAYS: i64 = 30;
/// Safety stock added to reorder recommendations, in days of demand.
const SAFETY_STOCK_DAYS: f64 = 14.0;
/// Reported when there is no demand at all.
const NO_STOCKOUT_DAYS: i64 = 999;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    fn from_data_points(points: usize) -> Self {
        if points >= 6 {
            Self::High
        } else if points >= 4 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Forecast {
    pub sku: String,
    pub forecast_period_days: i64,
    pub predicted_demand: i64,
    pub average_daily_demand: f64,
    pub confidence: Confidence,
    pub data_points: usize,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct MonthlyAverage {
    pub month: u32,
    pub avg_qty: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SeasonalPattern {
    pub sku: String,
    pub monthly_averages: Vec<MonthlyAverage>,
    pub peak_month: u32,
    pub low_month: u32,
    pub seasonal_factor: f64,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Critical,
    High,
    Medium,
    Low,
}

impl RiskLevel {
    fn from_days(days_until_stockout: i64) -> Self {
        if days_until_stockout <= 7 {
            Self::Critical
        } else if days_until_stockout <= 14 {
            Self::High
        } else if days_until_stockout <= 30 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StockoutRisk {
    pub sku: String,
    pub product_name: String,
    pub current_stock: i64,
    pub predicted_demand_30_days: i64,
    pub days_until_stockout: i64,
    pub risk_level: RiskLevel,
    pub recommended_reorder_qty: i64,
}

fn sales_for<'a>(data: &'a FixtureSet, sku: &str) -> Vec<&'a SalesRecord> {
    data.sales_history.iter().filter(|s| s.sku == sku).collect()
}

/// SKUs with sales, in order of first appearance.
fn skus_with_sales(data: &FixtureSet) -> Vec<String> {
    let mut skus: Vec<String> = Vec::new();
    for sale in &data.sales_history {
        if !skus.contains(&sale.sku) {
            skus.push(sale.sku.clone());
        }
    }
    skus
}

fn forecast_from(data: &FixtureSet, sku: &str, period_days: i64) -> Result<Forecast, ServiceError> {
    let sales = sales_for(data, sku);
    if sales.len() < MIN_DATA_POINTS {
        return Err(ServiceError::InsufficientHistory {
            sku: sku.to_string(),
            found: sales.len(),
        });
    }

    let dates: Vec<_> = sales.iter().filter_map(|s| parse_date(&s.sale_date)).collect();
    let day_span = match (dates.iter().min(), dates.iter().max()) {
        (Some(first), Some(last)) => (*last - *first).num_days().max(1),
        _ => 1,
    };
    let total_qty: i64 = sales.iter().map(|s| s.qty_sold).sum();
    let avg_daily = total_qty as f64 / day_span as f64;

    Ok(Forecast {
        sku: sku.to_string(),
        forecast_period_days: period_days,
        predicted_demand: (avg_daily * period_days as f64).round() as i64,
        average_daily_demand: round2(avg_daily),
        confidence: Confidence::from_data_points(sales.len()),
        data_points: sales.len(),
    })
}

fn stockout_risk_from(data: &FixtureSet, sku: &str) -> Option<StockoutRisk> {
    let forecast = forecast_from(data, sku, RISK_PERIOD_DAYS).ok()?;
    let items: Vec<&StockItem> = data.stock.iter().filter(|s| s.sku == sku).collect();
    let first = items.first()?;

    let current_stock: i64 = items.iter().map(|s| s.available()).sum();
    let avg = forecast.average_daily_demand;
    let days_until_stockout = if avg > 0.0 {
        (current_stock as f64 / avg).floor() as i64
    } else {
        NO_STOCKOUT_DAYS
    };
    let safety_stock = (avg * SAFETY_STOCK_DAYS).round() as i64;

    Some(StockoutRisk {
        sku: sku.to_string(),
        product_name: first.product_name.clone(),
        current_stock,
        predicted_demand_30_days: forecast.predicted_demand,
        days_until_stockout,
        risk_level: RiskLevel::from_days(days_until_stockout),
        recommended_reorder_qty: (forecast.predicted_demand - current_stock + safety_stock).max(0),
    })
}

impl ErpTables {
    pub fn get_forecast(&self, sku: &str, period_days: i64) -> Result<Forecast, ServiceError> {
        forecast_from(&self.data.read(), sku, period_days)
    }

    /// Forecasts for every SKU with enough history, highest demand first.
    pub fn get_all_forecasts(&self, period_days: i64) -> Vec<Forecast> {
        let data = self.data.read();
        let mut forecasts: Vec<Forecast> = skus_with_sales(&data)
            .iter()
            .filter_map(|sku| forecast_from(&data, sku, period_days).ok())
            .collect();
        forecasts.sort_by(|a, b| b.predicted_demand.cmp(&a.predicted_demand));
        forecasts
    }

    /// Average quantity per sale by calendar month.
    pub fn get_seasonal_pattern(&self, sku: &str) -> Result<SeasonalPattern, ServiceError> {
        let data = self.data.read();
        let sales = sales_for(&data, sku);
        if sales.len() < MIN_DATA_POINTS {
            return Err(ServiceError::InsufficientSeasonalHistory {
                sku: sku.to_string(),
            });
        }

        // month -> (total, count)
        let mut months = [(0i64, 0i64); 12];
        for sale in &sales {
            if let Some(date) = parse_date(&sale.sale_date) {
                let slot = &mut months[date.month0() as usize];
                slot.0 += sale.qty_sold;
                slot.1 += 1;
            }
        }

        let monthly_averages: Vec<MonthlyAverage> = months
            .iter()
            .zip(1u32..)
            .filter(|((_, count), _)| *count > 0)
            .map(|((total, count), month)| MonthlyAverage {
                month,
                avg_qty: (*total as f64 / *count as f64).round() as i64,
            })
            .collect();

        let Some(&first) = monthly_averages.first() else {
            return Err(ServiceError::InsufficientSeasonalHistory {
                sku: sku.to_string(),
            });
        };
        let (peak, low) = monthly_averages[1..].iter().fold((first, first), |(peak, low), m| {
            (
                if m.avg_qty > peak.avg_qty { *m } else { peak },
                if m.avg_qty < low.avg_qty { *m } else { low },
            )
        });
        let seasonal_factor = if low.avg_qty > 0 {
            round2(peak.avg_qty as f64 / low.avg_qty as f64)
        } else {
            0.0
        };

        Ok(SeasonalPattern {
            sku: sku.to_string(),
            monthly_averages,
            peak_month: peak.month,
            low_month: low.month,
            seasonal_factor,
        })
    }

    /// SKUs projected to run out within 30 days, soonest first.
    pub fn get_stockout_risks(&self) -> Vec<StockoutRisk> {
        let data = self.data.read();
        let mut risks: Vec<StockoutRisk> = skus_with_sales(&data)
            .iter()
            .filter_map(|sku| stockout_risk_from(&data, sku))
            .filter(|risk| risk.risk_level != RiskLevel::Low)
            .collect();
        risks.sort_by(|a, b| a.days_until_stockout.cmp(&b.days_until_stockout));
        risks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::erp::test_support::{sale, stock};

    fn tables(stock: Vec<StockItem>, sales: Vec<SalesRecord>) -> ErpTables {
        ErpTables::new(FixtureSet {
            stock,
            sales_history: sales,
            ..FixtureSet::default()
        })
    }

    #[test]
    fn forecast_uses_span_between_first_and_last_sale() {
        // 30 units over 10 days -> 3/day.
        let t = tables(
            vec![],
            vec![
                sale("X", 10, "2024-01-11"),
                sale("X", 10, "2024-01-01"),
                sale("X", 10, "2024-01-06"),
            ],
        );
        let f = t.get_forecast("X", 30).unwrap();
        assert_eq!(f.predicted_demand, 90);
        assert!((f.average_daily_demand - 3.0).abs() < f64::EPSILON);
        assert_eq!(f.confidence, Confidence::Low);
        assert_eq!(f.data_points, 3);
        assert_eq!(f.forecast_period_days, 30);
    }

    #[test]
    fn same_day_sales_use_a_one_day_span() {
        let t = tables(
            vec![],
            vec![
                sale("X", 1, "2024-01-01"),
                sale("X", 2, "2024-01-01"),
                sale("X", 3, "2024-01-01"),
            ],
        );
        let f = t.get_forecast("X", 7).unwrap();
        assert!((f.average_daily_demand - 6.0).abs() < f64::EPSILON);
        assert_eq!(f.predicted_demand, 42);
    }

    #[test]
    fn forecast_needs_three_sales() {
        let t = tables(vec![], vec![sale("X", 1, "2024-01-01"), sale("X", 1, "2024-01-02")]);
        let err = t.get_forecast("X", 30).unwrap_err();
        assert_eq!(
            err,
            ServiceError::InsufficientHistory {
                sku: "X".into(),
                found: 2
            }
        );
    }

    #[test]
    fn confidence_levels() {
        assert_eq!(Confidence::from_data_points(3), Confidence::Low);
        assert_eq!(Confidence::from_data_points(4), Confidence::Medium);
        assert_eq!(Confidence::from_data_points(5), Confidence::Medium);
        assert_eq!(Confidence::from_data_points(6), Confidence::High);
    }

    #[test]
    fn all_forecasts_skip_thin_history_and_sort_by_demand() {
        let t = tables(
            vec![],
            vec![
                sale("SLOW", 1, "2024-01-01"),
                sale("SLOW", 1, "2024-01-05"),
                sale("SLOW", 1, "2024-01-11"),
                sale("THIN", 100, "2024-01-01"),
                sale("FAST", 50, "2024-01-01"),
                sale("FAST", 50, "2024-01-05"),
                sale("FAST", 50, "2024-01-11"),
            ],
        );
        let skus: Vec<String> = t.get_all_forecasts(30).into_iter().map(|f| f.sku).collect();
        assert_eq!(skus, vec!["FAST", "SLOW"]);
    }

    #[test]
    fn seasonal_pattern_finds_peak_and_low() {
        let t = tables(
            vec![],
            vec![
                sale("X", 10, "2024-01-03"),
                sale("X", 20, "2024-01-20"),
                sale("X", 40, "2024-06-01"),
                sale("X", 5, "2024-11-11"),
            ],
        );
        let p = t.get_seasonal_pattern("X").unwrap();
        assert_eq!(
            p.monthly_averages,
            vec![
                MonthlyAverage { month: 1, avg_qty: 15 },
                MonthlyAverage { month: 6, avg_qty: 40 },
                MonthlyAverage { month: 11, avg_qty: 5 },
            ]
        );
        assert_eq!(p.peak_month, 6);
        assert_eq!(p.low_month, 11);
        assert!((p.seasonal_factor - 8.0).abs() < f64::EPSILON);
    }

    #[test]
    fn seasonal_factor_is_zero_when_low_month_is_zero() {
        let t = tables(
            vec![],
            vec![
                sale("X", 0, "2024-02-01"),
                sale("X", 9, "2024-03-01"),
                sale("X", 9, "2024-03-02"),
            ],
        );
        let p = t.get_seasonal_pattern("X").unwrap();
        assert_eq!(p.low_month, 2);
        assert!(p.seasonal_factor.abs() < f64::EPSILON);
    }

    #[test]
    fn seasonal_pattern_needs_history() {
        let t = tables(vec![], vec![sale("X", 1, "2024-01-01")]);
        assert!(matches!(
            t.get_seasonal_pattern("X"),
            Err(ServiceError::InsufficientSeasonalHistory { .. })
        ));
    }

    #[test]
    fn risk_levels() {
        assert_eq!(RiskLevel::from_days(0), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_days(7), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_days(8), RiskLevel::High);
        assert_eq!(RiskLevel::from_days(14), RiskLevel::High);
        assert_eq!(RiskLevel::from_days(30), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_days(31), RiskLevel::Low);
    }

    #[test]
    fn stockout_risks_rank_by_days_and_drop_low_risk() {
        // Each SKU sells 30 units over 10 days -> 3/day, 90 predicted in 30 days.
        let sales_for = |sku: &str| {
            vec![
                sale(sku, 10, "2024-01-01"),
                sale(sku, 10, "2024-01-06"),
                sale(sku, 10, "2024-01-11"),
            ]
        };
        let mut sales = sales_for("SOON");
        sales.extend(sales_for("LATER"));
        sales.extend(sales_for("SAFE"));
        sales.extend(sales_for("NOSTOCK"));

        let t = tables(
            vec![
                stock("LATER", "A", 40, 0),
                stock("SOON", "A", 12, 0),
                stock("SOON", "B", 10, 4),
                stock("SAFE", "A", 500, 0),
            ],
            sales,
        );

        let risks = t.get_stockout_risks();
        let skus: Vec<&str> = risks.iter().map(|r| r.sku.as_str()).collect();
        assert_eq!(skus, vec!["SOON", "LATER"]);

        let soon = &risks[0];
        assert_eq!(soon.current_stock, 18);
        assert_eq!(soon.days_until_stockout, 6);
        assert_eq!(soon.risk_level, RiskLevel::Critical);
        assert_eq!(soon.predicted_demand_30_days, 90);
        // 90 - 18 + 42 safety stock
        assert_eq!(soon.recommended_reorder_qty, 114);

        let later = &risks[1];
        assert_eq!(later.days_until_stockout, 13);
        assert_eq!(later.risk_level, RiskLevel::High);
    }

    #[test]
    fn zero_demand_never_stocks_out() {
        let t = tables(
            vec![stock("X", "A", 1, 0)],
            vec![
                sale("X", 0, "2024-01-01"),
                sale("X", 0, "2024-01-02"),
                sale("X", 0, "2024-01-03"),
            ],
        );
        assert!(t.get_stockout_risks().is_empty());
    }
}
