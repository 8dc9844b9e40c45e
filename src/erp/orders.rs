//! Orders, customers and the product catalog.

use super::records::{Customer, Order, OrderItem, Product};
use super::{now_timestamp, ErpTables, ServiceError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// First order number; new ids count up from here.
const ORDER_ID_BASE: usize = 10_000;

/// Body of an order creation request.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct NewOrder {
    pub customer_id: String,
    #[serde(default)]
    pub items: Vec<OrderItem>,
}

/// An order merged with its customer's contact details.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub shipping_address: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OrderSummary {
    pub by_status: BTreeMap<String, usize>,
    pub total_orders: usize,
    pub total_value: f64,
}

impl ErpTables {
    /// Orders matching every given filter.
    pub fn get_orders(&self, status: Option<&str>, customer_id: Option<&str>) -> Vec<Order> {
        let data = self.data.read();
        data.orders
            .iter()
            .filter(|o| status.map_or(true, |s| o.status == s))
            .filter(|o| customer_id.map_or(true, |c| o.customer_id == c))
            .cloned()
            .collect()
    }

    pub fn get_order_detail(&self, order_id: &str) -> Result<OrderDetail, ServiceError> {
        let data = self.data.read();
        let order = data
            .orders
            .iter()
            .find(|o| o.id == order_id)
            .ok_or_else(|| ServiceError::OrderNotFound(order_id.to_string()))?;
        let customer = data.customers.iter().find(|c| c.id == order.customer_id);

        Ok(OrderDetail {
            order: order.clone(),
            customer_name: customer.map(|c| c.name.clone()),
            customer_email: customer.map(|c| c.email.clone()),
            shipping_address: customer.map(|c| c.shipping_address.clone()),
        })
    }

    /// Create a pending order for an existing customer.
    pub fn create_order(&self, request: NewOrder) -> Result<Order, ServiceError> {
        let mut data = self.data.write();
        if !data.customers.iter().any(|c| c.id == request.customer_id) {
            return Err(ServiceError::CustomerNotFound(request.customer_id));
        }

        let total = request
            .items
            .iter()
            .map(|item| item.qty as f64 * item.unit_price)
            .sum::<f64>();
        let order = Order {
            id: format!("ORD-{}", ORDER_ID_BASE + data.orders.len() + 1),
            customer_id: request.customer_id,
            status: "pending".to_string(),
            created_at: now_timestamp(),
            shipped_at: None,
            items: request.items,
            total,
        };
        data.orders.push(order.clone());

        tracing::info!(
            order_id = %order.id,
            customer_id = %order.customer_id,
            items = order.items.len(),
            total = order.total,
            "Order created"
        );
        Ok(order)
    }

    /// Move an order to `status`. Shipping stamps `shipped_at`.
    pub fn update_order_status(&self, order_id: &str, status: &str) -> Result<Order, ServiceError> {
        let mut data = self.data.write();
        if !data.statuses.iter().any(|s| s == status) {
            return Err(ServiceError::InvalidStatus {
                valid: data.statuses.clone(),
            });
        }

        let order = data
            .orders
            .iter_mut()
            .find(|o| o.id == order_id)
            .ok_or_else(|| ServiceError::OrderNotFound(order_id.to_string()))?;
        order.status = status.to_string();
        if status == "shipped" {
            order.shipped_at = Some(now_timestamp());
        }

        tracing::info!(order_id, status, "Order status updated");
        Ok(order.clone())
    }

    /// Order count per status (every known status included), plus totals.
    pub fn get_order_summary(&self) -> OrderSummary {
        let data = self.data.read();
        let mut by_status: BTreeMap<String, usize> =
            data.statuses.iter().map(|s| (s.clone(), 0)).collect();
        for order in &data.orders {
            *by_status.entry(order.status.clone()).or_default() += 1;
        }

        OrderSummary {
            by_status,
            total_orders: data.orders.len(),
            total_value: data.orders.iter().map(|o| o.total).sum(),
        }
    }

    pub fn get_customers(&self) -> Vec<Customer> {
        self.data.read().customers.clone()
    }

    pub fn get_products(&self) -> Vec<Product> {
        self.data.read().products.clone()
    }

    pub fn find_product(&self, sku: &str) -> Option<Product> {
        self.data.read().products.iter().find(|p| p.sku == sku).cloned()
    }
}
