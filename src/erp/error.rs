use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Minimum number of sales records needed for a forecast.
pub const MIN_DATA_POINTS: usize = 3;

/// Domain failures reported by the data services.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("SKU {sku} not found in {location}")]
    StockNotFound { sku: String, location: String },

    #[error("Insufficient available stock. Available: {available}")]
    InsufficientStock { available: i64 },

    #[error("Transfer quantity must be positive, got {0}")]
    InvalidQuantity(i64),

    #[error("Customer {0} not found")]
    CustomerNotFound(String),

    #[error("Order {0} not found")]
    OrderNotFound(String),

    #[error("Invalid status. Must be one of: {}", valid.join(", "))]
    InvalidStatus { valid: Vec<String> },

    #[error("Insufficient sales history for {sku}. Need at least 3 data points, found {found}.")]
    InsufficientHistory { sku: String, found: usize },

    #[error("Insufficient sales history for seasonal analysis. Need at least 3 data points.")]
    InsufficientSeasonalHistory { sku: String },
}

/// Broad category of a [`ServiceError`], used to choose a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Invalid,
    Unprocessable,
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::StockNotFound { .. } | Self::CustomerNotFound(_) | Self::OrderNotFound(_) => {
                ErrorKind::NotFound
            }
            Self::InvalidQuantity(_) | Self::InvalidStatus { .. } => ErrorKind::Invalid,
            Self::InsufficientStock { .. }
            | Self::InsufficientHistory { .. }
            | Self::InsufficientSeasonalHistory { .. } => ErrorKind::Unprocessable,
        }
    }
}

/// Serialized as `{"error": "<message>"}`.
impl Serialize for ServiceError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry("error", &self.to_string())?;
        map.end()
    }
}
