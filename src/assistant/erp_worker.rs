//! ERP worker: turns a task into one inventory or order operation and runs it
//! against the fixture tables.
//!
//! The model picks the operation; execution is plain Rust over [`ErpTables`].
//! Output is `"{explanation}\n\nResult:\n{pretty json}"`, which
//! [`split_result`](super::split_result) takes apart again for the REST reply.

use super::strip_code_fence;
use crate::agent::{create_task_agent, AgentRuntime, AgentSettings};
use crate::erp::{ErpTables, NewOrder, ServiceError};
use crate::sessions::ConversationEntry;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub const ERP_WORKER_AGENT_NAME: &str = "ERPWorker";

pub const ERP_WORKER_PROMPT: &str = r#"You are an ERP specialist that handles inventory and order management tasks.

Pick exactly one operation for the task and extract its parameters.

Available operations:
- GET_STOCK: inventory levels (optional: sku, or location)
- GET_LOW_STOCK: items below their reorder point
- GET_DEAD_STOCK: items with no movement (optional: days, default 90)
- TRANSFER_STOCK: move stock (sku, from, to, qty)
- GET_LOCATIONS: warehouses and stores
- GET_ORDERS: list orders (optional: status, customer_id)
- GET_ORDER_DETAIL: one order with customer info (order_id)
- CREATE_ORDER: new order (customer_id, items: [{sku, qty, unit_price, location}])
- UPDATE_ORDER_STATUS: change order status (order_id, status)
- GET_ORDER_SUMMARY: order counts and value
- GET_CUSTOMERS: customer list
- GET_FORECAST: demand forecast (sku, optional: period in days, default 30)
- GET_FORECAST_RECOMMENDATIONS: stockout risks with reorder suggestions
- GET_SEASONAL_PATTERN: monthly demand pattern (sku)

Respond with a single JSON object:
- operation: one of the operations above
- parameters_json: a JSON-encoded string of the operation's parameters
- explanation: one sentence describing what you are doing

Examples:
{"operation": "GET_STOCK", "parameters_json": "{\"sku\": \"WID-001\"}", "explanation": "Looking up stock levels for WID-001"}
{"operation": "TRANSFER_STOCK", "parameters_json": "{\"sku\": \"GAD-100\", \"from\": \"WH-EAST\", \"to\": \"WH-WEST\", \"qty\": 10}", "explanation": "Transferring 10 units from East to West"}
{"operation": "GET_ORDERS", "parameters_json": "{\"status\": \"pending\"}", "explanation": "Fetching all pending orders"}"#;

const DEFAULT_DEAD_STOCK_DAYS: i64 = 90;
const DEFAULT_FORECAST_PERIOD_DAYS: i64 = 30;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Failed to parse operation: {0}")]
    Unparseable(String),

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("{operation} requires parameter '{name}'")]
    MissingParameter {
        operation: String,
        name: &'static str,
    },

    #[error("Invalid parameters for {operation}: {reason}")]
    InvalidParameters { operation: String, reason: String },

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("Failed to encode result: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One operation chosen by the worker agent.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ErpOperation {
    pub operation: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    /// Parameters as a JSON string; merged over `parameters` when parsed.
    #[serde(default)]
    pub parameters_json: Option<String>,
    #[serde(default)]
    pub explanation: String,
}

impl ErpOperation {
    /// Parse the worker agent's reply, tolerating a fenced code block.
    pub fn parse(output: &str) -> Result<Self, WorkerError> {
        let trimmed = output.trim();
        let unparseable = || WorkerError::Unparseable(trimmed.to_string());

        let mut op: Self =
            serde_json::from_str(strip_code_fence(trimmed)).map_err(|_| unparseable())?;
        if let Some(encoded) = op.parameters_json.take().filter(|s| !s.trim().is_empty()) {
            let extra: Map<String, Value> =
                serde_json::from_str(&encoded).map_err(|_| unparseable())?;
            op.parameters.extend(extra);
        }
        Ok(op)
    }

    fn str_param(&self, name: &str) -> Option<&str> {
        self.parameters
            .get(name)
            .and_then(Value::as_str)
            .filter(|v| !v.is_empty())
    }

    fn require_str(&self, name: &'static str) -> Result<&str, WorkerError> {
        self.str_param(name).ok_or_else(|| WorkerError::MissingParameter {
            operation: self.operation.clone(),
            name,
        })
    }

    /// Whole numbers, given as numbers or numeric strings.
    fn int_param(&self, name: &str) -> Option<i64> {
        match self.parameters.get(name)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn positive_days(&self, name: &str, default: i64) -> i64 {
        self.int_param(name).filter(|d| *d > 0).unwrap_or(default)
    }
}

fn encode<T: Serialize>(value: T) -> Result<Value, WorkerError> {
    Ok(serde_json::to_value(value)?)
}

/// Run `op` against the tables.
pub fn execute(erp: &ErpTables, op: &ErpOperation) -> Result<Value, WorkerError> {
    match op.operation.as_str() {
        "GET_STOCK" => match op.str_param("sku") {
            Some(sku) => encode(erp.get_stock_by_sku(sku)),
            None => encode(erp.get_stock(op.str_param("location"))),
        },
        "GET_LOW_STOCK" => encode(erp.low_stock_alerts()),
        "GET_DEAD_STOCK" => {
            encode(erp.dead_stock(op.positive_days("days", DEFAULT_DEAD_STOCK_DAYS)))
        }
        "TRANSFER_STOCK" => {
            let qty = op.int_param("qty").ok_or_else(|| WorkerError::MissingParameter {
                operation: op.operation.clone(),
                name: "qty",
            })?;
            encode(erp.transfer_stock(
                op.require_str("sku")?,
                op.require_str("from")?,
                op.require_str("to")?,
                qty,
            )?)
        }
        "GET_LOCATIONS" => encode(erp.get_locations()),
        "GET_ORDERS" => encode(erp.get_orders(op.str_param("status"), op.str_param("customer_id"))),
        "GET_ORDER_DETAIL" => encode(erp.get_order_detail(op.require_str("order_id")?)?),
        "CREATE_ORDER" => {
            op.require_str("customer_id")?;
            let request: NewOrder = serde_json::from_value(Value::Object(op.parameters.clone()))
                .map_err(|e| WorkerError::InvalidParameters {
                    operation: op.operation.clone(),
                    reason: e.to_string(),
                })?;
            encode(erp.create_order(request)?)
        }
        "UPDATE_ORDER_STATUS" => encode(
            erp.update_order_status(op.require_str("order_id")?, op.require_str("status")?)?,
        ),
        "GET_ORDER_SUMMARY" => encode(erp.get_order_summary()),
        "GET_CUSTOMERS" => encode(erp.get_customers()),
        "GET_FORECAST" => encode(erp.get_forecast(
            op.require_str("sku")?,
            op.positive_days("period", DEFAULT_FORECAST_PERIOD_DAYS),
        )?),
        "GET_FORECAST_RECOMMENDATIONS" => encode(erp.get_stockout_risks()),
        "GET_SEASONAL_PATTERN" => encode(erp.get_seasonal_pattern(op.require_str("sku")?)?),
        other => Err(WorkerError::UnknownOperation(other.to_string())),
    }
}

pub fn format_output(explanation: &str, result: &Value) -> Result<String, WorkerError> {
    Ok(format!(
        "{explanation}\n\nResult:\n{}",
        serde_json::to_string_pretty(result)?
    ))
}

/// Ask the worker agent for an operation, run it and format the outcome.
pub async fn run(
    runtime: &AgentRuntime,
    settings: &AgentSettings,
    erp: &ErpTables,
    task: &str,
    reason: &str,
) -> Result<String> {
    let agent = create_task_agent(ERP_WORKER_AGENT_NAME, ERP_WORKER_PROMPT, settings);
    let context = format!(
        "Task: {task}\n\nRouting note: {reason}\n\n\
         Determine the appropriate ERP operation and execute it."
    );
    let output = runtime.run(&agent, &[ConversationEntry::user(context)]).await?;

    let op = ErpOperation::parse(&output)?;
    tracing::info!(operation = %op.operation, explanation = %op.explanation, "ERP worker executing");
    let result = execute(erp, &op).map_err(|e| {
        tracing::warn!(operation = %op.operation, error = %e, "ERP operation failed");
        e
    })?;
    Ok(format_output(&op.explanation, &result)?)
}
