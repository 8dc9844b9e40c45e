//! Fixture record types. Field names match the JSON fixtures and API payloads.

use serde::{Deserialize, Serialize};

/// Stock of one SKU at one location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockItem {
    pub sku: String,
    pub product_name: String,
    pub location: String,
    pub qty_on_hand: i64,
    pub qty_reserved: i64,
    pub reorder_point: i64,
    /// `YYYY-MM-DD`
    pub last_movement: String,
}

impl StockItem {
    /// On-hand quantity not held by open orders.
    pub fn available(&self) -> i64 {
        self.qty_on_hand - self.qty_reserved
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Location {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub sku: String,
    pub qty: i64,
    pub unit_price: f64,
    pub location: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: String,
    pub customer_id: String,
    pub status: String,
    pub created_at: String,
    pub shipped_at: Option<String>,
    pub items: Vec<OrderItem>,
    pub total: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub email: String,
    pub shipping_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub sku: String,
    pub name: String,
    pub unit_cost: f64,
    /// Any other catalog fields, passed through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SalesRecord {
    pub id: String,
    pub sku: String,
    pub qty_sold: i64,
    /// `YYYY-MM-DD`
    pub sale_date: String,
    pub location: String,
}
