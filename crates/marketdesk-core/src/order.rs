use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Quote, Symbol, UtcDateTime, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

impl Display for OrderSide {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderSide {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "buy" => Ok(Self::Buy),
            "sell" => Ok(Self::Sell),
            _ => Err(ValidationError::InvalidOrderSide {
                value: value.to_owned(),
            }),
        }
    }
}

/// Parse a share quantity typed by the user. Must be a whole number above zero.
pub fn parse_quantity(input: &str) -> Result<u32, ValidationError> {
    match input.trim().parse::<u32>() {
        Ok(quantity) if quantity > 0 => Ok(quantity),
        _ => Err(ValidationError::InvalidQuantity {
            value: input.to_owned(),
        }),
    }
}

/// Priced, never persisted order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulatedFill {
    pub order_id: Uuid,
    pub symbol: Symbol,
    pub side: OrderSide,
    pub quantity: u32,
    pub price: f64,
    pub total: f64,
    pub filled_at: UtcDateTime,
}

/// Fills `quantity` shares at the quote price.
pub fn simulate_fill(quote: &Quote, side: OrderSide, quantity: u32) -> Result<SimulatedFill, ValidationError> {
    if quantity == 0 {
        return Err(ValidationError::InvalidQuantity {
            value: quantity.to_string(),
        });
    }

    Ok(SimulatedFill {
        order_id: Uuid::new_v4(),
        symbol: quote.ticker.clone(),
        side,
        quantity,
        price: quote.price,
        total: quote.price * f64::from(quantity),
        filled_at: UtcDateTime::now(),
    })
}
