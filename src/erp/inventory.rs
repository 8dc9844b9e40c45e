//! Stock queries, transfers and inventory reports.

use super::records::{Location, StockItem};
use super::{format_date, parse_date, today, ErpTables, ServiceError};
use crate::util::round2;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Annual carrying cost as a fraction of inventory value.
const CARRYING_COST_RATE: f64 = 0.25;

/// Aggregate stock of one SKU across locations.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StockSummary {
    pub sku: String,
    pub product_name: Option<String>,
    pub total_on_hand: i64,
    pub total_available: i64,
    pub by_location: Vec<StockItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transfer {
    pub sku: String,
    pub from: String,
    pub to: String,
    pub qty: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TransferReceipt {
    pub success: bool,
    pub transfer: Transfer,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LocationShortfall {
    pub location: String,
    pub available: i64,
    pub reorder_point: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LowStockAlert {
    pub sku: String,
    pub product_name: String,
    pub total_available: i64,
    pub reorder_point: i64,
    pub locations_below: Vec<LocationShortfall>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DeadStockItem {
    #[serde(flatten)]
    pub item: StockItem,
    pub days_since_movement: i64,
    pub estimated_carrying_cost: f64,
}

impl ErpTables {
    /// All stock records, or only those at `location`.
    pub fn get_stock(&self, location: Option<&str>) -> Vec<StockItem> {
        let data = self.data.read();
        match location {
            Some(location) => data
                .stock
                .iter()
                .filter(|s| s.location == location)
                .cloned()
                .collect(),
            None => data.stock.clone(),
        }
    }

    pub fn get_stock_by_sku(&self, sku: &str) -> StockSummary {
        let data = self.data.read();
        let by_location: Vec<StockItem> =
            data.stock.iter().filter(|s| s.sku == sku).cloned().collect();
        let total_on_hand = by_location.iter().map(|s| s.qty_on_hand).sum::<i64>();
        let total_reserved = by_location.iter().map(|s| s.qty_reserved).sum::<i64>();

        StockSummary {
            sku: sku.to_string(),
            product_name: by_location.first().map(|s| s.product_name.clone()),
            total_on_hand,
            total_available: total_on_hand - total_reserved,
            by_location,
        }
    }

    /// Move `qty` units of `sku` between locations.
    ///
    /// Only available stock (on hand minus reserved) can move. The destination
    /// record is created when missing, inheriting the source's product name and
    /// reorder point. Failed transfers leave every table untouched.
    pub fn transfer_stock(
        &self,
        sku: &str,
        from: &str,
        to: &str,
        qty: i64,
    ) -> Result<TransferReceipt, ServiceError> {
        if qty <= 0 {
            return Err(ServiceError::InvalidQuantity(qty));
        }

        let mut data = self.data.write();
        let source_idx = data
            .stock
            .iter()
            .position(|s| s.sku == sku && s.location == from)
            .ok_or_else(|| ServiceError::StockNotFound {
                sku: sku.to_string(),
                location: from.to_string(),
            })?;

        let available = data.stock[source_idx].available();
        if available < qty {
            return Err(ServiceError::InsufficientStock { available });
        }

        let moved_on = format_date(today());
        let source = &mut data.stock[source_idx];
        source.qty_on_hand -= qty;
        source.last_movement.clone_from(&moved_on);
        let product_name = source.product_name.clone();
        let reorder_point = source.reorder_point;

        match data
            .stock
            .iter()
            .position(|s| s.sku == sku && s.location == to)
        {
            Some(dest_idx) => {
                let dest = &mut data.stock[dest_idx];
                dest.qty_on_hand += qty;
                dest.last_movement = moved_on;
            }
            None => data.stock.push(StockItem {
                sku: sku.to_string(),
                product_name,
                location: to.to_string(),
                qty_on_hand: qty,
                qty_reserved: 0,
                reorder_point,
                last_movement: moved_on,
            }),
        }

        tracing::info!(sku, from, to, qty, "Stock transferred");
        Ok(TransferReceipt {
            success: true,
            transfer: Transfer {
                sku: sku.to_string(),
                from: from.to_string(),
                to: to.to_string(),
                qty,
            },
        })
    }

    pub fn get_locations(&self) -> Vec<Location> {
        self.data.read().locations.clone()
    }

    /// SKUs with at least one location whose available stock is below its
    /// reorder point, in order of first appearance.
    pub fn low_stock_alerts(&self) -> Vec<LowStockAlert> {
        let data = self.data.read();
        let mut alerts: Vec<LowStockAlert> = Vec::new();

        for item in &data.stock {
            let idx = match alerts.iter().position(|a| a.sku == item.sku) {
                Some(idx) => idx,
                None => {
                    alerts.push(LowStockAlert {
                        sku: item.sku.clone(),
                        product_name: item.product_name.clone(),
                        total_available: 0,
                        reorder_point: item.reorder_point,
                        locations_below: Vec::new(),
                    });
                    alerts.len() - 1
                }
            };

            let available = item.available();
            let alert = &mut alerts[idx];
            alert.total_available += available;
            if available < item.reorder_point {
                alert.locations_below.push(LocationShortfall {
                    location: item.location.clone(),
                    available,
                    reorder_point: item.reorder_point,
                });
            }
        }

        alerts.retain(|a| !a.locations_below.is_empty());
        alerts
    }

    /// Stock that has not moved for more than `days` days, oldest first.
    pub fn dead_stock(&self, days: i64) -> Vec<DeadStockItem> {
        self.dead_stock_at(days, today())
    }

    /// [`dead_stock`](Self::dead_stock) evaluated as of `today`.
    pub fn dead_stock_at(&self, days: i64, today: NaiveDate) -> Vec<DeadStockItem> {
        // No record can be older than the representable date range.
        let Some(cutoff) =
            chrono::TimeDelta::try_days(days).and_then(|span| today.checked_sub_signed(span))
        else {
            return Vec::new();
        };
        let data = self.data.read();

        let mut dead: Vec<DeadStockItem> = data
            .stock
            .iter()
            .filter(|item| item.qty_on_hand > 0)
            .filter_map(|item| {
                let Some(moved) = parse_date(&item.last_movement) else {
                    tracing::warn!(
                        sku = %item.sku,
                        location = %item.location,
                        last_movement = %item.last_movement,
                        "Skipping stock record with unparseable movement date"
                    );
                    return None;
                };
                if moved >= cutoff {
                    return None;
                }

                let days_since_movement = (today - moved).num_days();
                let unit_cost = data
                    .products
                    .iter()
                    .find(|p| p.sku == item.sku)
                    .map_or(0.0, |p| p.unit_cost);
                let carrying_cost = item.qty_on_hand as f64
                    * unit_cost
                    * CARRYING_COST_RATE
                    * (days_since_movement as f64 / 365.0);

                Some(DeadStockItem {
                    item: item.clone(),
                    days_since_movement,
                    estimated_carrying_cost: round2(carrying_cost),
                })
            })
            .collect();

        dead.sort_by(|a, b| b.days_since_movement.cmp(&a.days_since_movement));
        dead
    }
}
