//! Fixture loading.
//!
//! Tables are populated once at startup from a [`FixtureSource`]. The crate
//! ships a default data set compiled into the binary; a directory with the
//! same five JSON files can replace it.

use super::records::{Customer, Location, Order, Product, SalesRecord, StockItem};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const INVENTORY_FILE: &str = "inventory.json";
pub const ORDERS_FILE: &str = "orders.json";
pub const PRODUCTS_FILE: &str = "products.json";
pub const CUSTOMERS_FILE: &str = "customers.json";
pub const SALES_HISTORY_FILE: &str = "salesHistory.json";

/// Every fixture table, fully loaded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FixtureSet {
    pub stock: Vec<StockItem>,
    pub locations: Vec<Location>,
    pub orders: Vec<Order>,
    pub statuses: Vec<String>,
    pub products: Vec<Product>,
    pub customers: Vec<Customer>,
    pub sales_history: Vec<SalesRecord>,
}

#[derive(Deserialize)]
struct InventoryDocument {
    stock: Vec<StockItem>,
    locations: Vec<Location>,
}

#[derive(Deserialize)]
struct OrdersDocument {
    orders: Vec<Order>,
    statuses: Vec<String>,
}

#[derive(Deserialize)]
struct ProductsDocument {
    products: Vec<Product>,
}

#[derive(Deserialize)]
struct CustomersDocument {
    customers: Vec<Customer>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SalesHistoryDocument {
    sales_history: Vec<SalesRecord>,
}

/// Raw JSON text of the five fixture documents.
pub struct FixtureDocuments<'a> {
    pub inventory: &'a str,
    pub orders: &'a str,
    pub products: &'a str,
    pub customers: &'a str,
    pub sales_history: &'a str,
}

impl FixtureSet {
    pub fn from_documents(docs: &FixtureDocuments<'_>) -> Result<Self> {
        let inventory: InventoryDocument =
            serde_json::from_str(docs.inventory).with_context(|| format!("Failed to parse {INVENTORY_FILE}"))?;
        let orders: OrdersDocument =
            serde_json::from_str(docs.orders).with_context(|| format!("Failed to parse {ORDERS_FILE}"))?;
        let products: ProductsDocument =
            serde_json::from_str(docs.products).with_context(|| format!("Failed to parse {PRODUCTS_FILE}"))?;
        let customers: CustomersDocument = serde_json::from_str(docs.customers)
            .with_context(|| format!("Failed to parse {CUSTOMERS_FILE}"))?;
        let sales: SalesHistoryDocument = serde_json::from_str(docs.sales_history)
            .with_context(|| format!("Failed to parse {SALES_HISTORY_FILE}"))?;

        Ok(Self {
            stock: inventory.stock,
            locations: inventory.locations,
            orders: orders.orders,
            statuses: orders.statuses,
            products: products.products,
            customers: customers.customers,
            sales_history: sales.sales_history,
        })
    }
}

/// Supplies the initial fixture tables.
pub trait FixtureSource: Send + Sync {
    fn load(&self) -> Result<FixtureSet>;

    /// Human-readable origin, for logs.
    fn describe(&self) -> String;
}

/// The data set compiled into the binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedFixtures;

impl FixtureSource for EmbeddedFixtures {
    fn load(&self) -> Result<FixtureSet> {
        FixtureSet::from_documents(&FixtureDocuments {
            inventory: include_str!("../../data/inventory.json"),
            orders: include_str!("../../data/orders.json"),
            products: include_str!("../../data/products.json"),
            customers: include_str!("../../data/customers.json"),
            sales_history: include_str!("../../data/salesHistory.json"),
        })
    }

    fn describe(&self) -> String {
        "embedded".to_string()
    }
}

/// Reads the five fixture files from a directory.
#[derive(Debug, Clone)]
pub struct DirectoryFixtures {
    dir: PathBuf,
}

impl DirectoryFixtures {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn read(&self, file: &str) -> Result<String> {
        let path = self.dir.join(file);
        std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read fixture file {}", path.display()))
    }
}

impl FixtureSource for DirectoryFixtures {
    fn load(&self) -> Result<FixtureSet> {
        let inventory = self.read(INVENTORY_FILE)?;
        let orders = self.read(ORDERS_FILE)?;
        let products = self.read(PRODUCTS_FILE)?;
        let customers = self.read(CUSTOMERS_FILE)?;
        let sales_history = self.read(SALES_HISTORY_FILE)?;
        FixtureSet::from_documents(&FixtureDocuments {
            inventory: &inventory,
            orders: &orders,
            products: &products,
            customers: &customers,
            sales_history: &sales_history,
        })
    }

    fn describe(&self) -> String {
        self.dir.display().to_string()
    }
}

/// Pick the fixture source for an optional configured directory.
pub fn fixture_source(data_dir: Option<&Path>) -> Box<dyn FixtureSource> {
    match data_dir {
        Some(dir) => Box::new(DirectoryFixtures::new(dir)),
        None => Box::new(EmbeddedFixtures),
    }
}
