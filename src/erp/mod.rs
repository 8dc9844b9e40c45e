//! Mock inventory and order management over in-memory fixture tables.
//!
//! [`ErpTables`] owns every table behind one lock. Service operations are
//! grouped by area in [`inventory`], [`orders`] and [`forecast`]; each takes the
//! lock once, so a transfer or order creation is atomic per call.

pub mod error;
pub mod fixtures;
pub mod forecast;
pub mod inventory;
pub mod orders;
pub mod records;

pub use error::{ErrorKind, ServiceError};
pub use fixtures::{
    fixture_source, DirectoryFixtures, EmbeddedFixtures, FixtureSet, FixtureSource,
};
pub use forecast::{Confidence, Forecast, MonthlyAverage, RiskLevel, SeasonalPattern, StockoutRisk};
pub use inventory::{DeadStockItem, LocationShortfall, LowStockAlert, StockSummary, TransferReceipt};
pub use orders::{NewOrder, OrderDetail, OrderSummary};
pub use records::{Customer, Location, Order, OrderItem, Product, SalesRecord, StockItem};

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use parking_lot::RwLock;

/// Row counts per table, for status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct TableCounts {
    pub stock: usize,
    pub locations: usize,
    pub orders: usize,
    pub products: usize,
    pub customers: usize,
    pub sales_history: usize,
}

pub struct ErpTables {
    data: RwLock<FixtureSet>,
}

impl ErpTables {
    pub fn new(set: FixtureSet) -> Self {
        Self {
            data: RwLock::new(set),
        }
    }

    /// Load every table from `source`.
    pub fn load(source: &dyn FixtureSource) -> Result<Self> {
        let set = source.load()?;
        let tables = Self::new(set);
        let counts = tables.counts();
        tracing::info!(
            source = %source.describe(),
            stock = counts.stock,
            orders = counts.orders,
            products = counts.products,
            customers = counts.customers,
            sales = counts.sales_history,
            "Fixture tables loaded"
        );
        Ok(tables)
    }

    pub fn counts(&self) -> TableCounts {
        let data = self.data.read();
        TableCounts {
            stock: data.stock.len(),
            locations: data.locations.len(),
            orders: data.orders.len(),
            products: data.products.len(),
            customers: data.customers.len(),
            sales_history: data.sales_history.len(),
        }
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Parse the date part of a fixture date (`YYYY-MM-DD`, optionally followed
/// by a time).
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let date_part = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_date_accepts_plain_and_timestamped() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 9);
        assert_eq!(parse_date("2024-03-09"), expected);
        assert_eq!(parse_date("2024-03-09T10:00:00Z"), expected);
        assert_eq!(parse_date("yesterday"), None);
    }

    #[test]
    fn load_from_embedded_counts_rows() {
        let tables = ErpTables::load(&EmbeddedFixtures).unwrap();
        let counts = tables.counts();
        assert!(counts.stock > 0);
        assert!(counts.sales_history > 0);
    }

    #[test]
    fn timestamps_are_utc_with_millis() {
        let ts = now_timestamp();
        assert!(ts.ends_with('Z'));
        assert_eq!(ts.len(), "2024-01-01T00:00:00.000Z".len());
    }
}
