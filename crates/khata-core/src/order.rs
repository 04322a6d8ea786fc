//! Spoken/typed order grammar: `ITEM QTY [ITEM QTY]... PAID`.
//!
//! `maggi 2 biscuit 1 50` is two Maggi, one Biscuit, 50 paid. Quantities keep
//! only their digits and dots (`2kg` → `2`), so units may be spoken inline.

use crate::ledger::canonical_name;
use crate::money::Money;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::str::FromStr;
use thiserror::Error;

/// Shown to the user with every parse failure.
pub const ORDER_EXAMPLE: &str = "Maggi 2 Biscuit 1 50";

/// Unit price for items missing from the list.
pub const DEFAULT_UNIT_PRICE: i64 = 15;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum OrderError {
    #[error("nothing was entered")]
    EmptyInput,
    #[error("paid amount {0:?} is not a number")]
    InvalidPaid(String),
    #[error("paid amount cannot be negative")]
    NegativePaid,
    #[error("item {0:?} has no quantity")]
    MissingQuantity(String),
    #[error("quantity {quantity:?} for {item} is not a number")]
    InvalidQuantity { item: String, quantity: String },
    #[error("no items before the paid amount")]
    NoItems,
}

impl OrderError {
    /// Message for the user, with the corrective example.
    pub fn user_message(&self) -> String {
        format!("Item format galat hai ({self}). Example: {ORDER_EXAMPLE}")
    }
}

/// Item → unit price. Lookups use the canonical item name.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PriceList {
    prices: BTreeMap<String, Money>,
    #[serde(default = "default_unit_price")]
    default_price: Money,
}

fn default_unit_price() -> Money {
    Money::from(DEFAULT_UNIT_PRICE)
}

impl Default for PriceList {
    fn default() -> Self {
        let prices = [
            ("Maggi", 15),
            ("Biscuit", 10),
            ("Sugar", 50),
            ("Bread", 20),
            ("Rice", 40),
            ("Dal", 120),
            ("Oil", 180),
            ("Salt", 20),
            ("Tea", 200),
            ("Milk", 60),
            ("Egg", 6),
        ];
        Self::new(prices.into_iter().map(|(item, price)| (item.to_string(), Money::from(price))))
    }
}

impl PriceList {
    pub fn new(prices: impl IntoIterator<Item = (String, Money)>) -> Self {
        Self {
            prices: prices
                .into_iter()
                .map(|(item, price)| (canonical_name(&item), price))
                .collect(),
            default_price: default_unit_price(),
        }
    }

    /// Re-key entries loaded from a file so lookups are case-insensitive.
    pub fn normalized(self) -> Self {
        Self {
            prices: self
                .prices
                .into_iter()
                .map(|(item, price)| (canonical_name(&item), price))
                .collect(),
            default_price: self.default_price,
        }
    }

    pub fn price_of(&self, item: &str) -> Money {
        self.prices
            .get(&canonical_name(item))
            .copied()
            .unwrap_or(self.default_price)
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderLine {
    pub item: String,
    pub quantity: Decimal,
    pub unit_price: Money,
}

impl OrderLine {
    pub fn amount(&self) -> Money {
        self.unit_price * self.quantity
    }
}

/// A parsed order, ready to be recorded as one transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub lines: Vec<OrderLine>,
    pub paid: Money,
}

impl Order {
    pub fn total(&self) -> Money {
        self.lines.iter().map(OrderLine::amount).sum()
    }

    /// `"Maggi x2 = 30, Biscuit x1 = 10"`, the transaction description.
    pub fn summary(&self) -> String {
        self.lines
            .iter()
            .map(|l| format!("{} x{} = {}", l.item, l.quantity.normalize(), l.amount()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Keep digits and dots, then parse. `"2kg"` → 2, `"half"` → error.
fn parse_quantity(token: &str) -> Option<Decimal> {
    let kept: String = token.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();
    if kept.is_empty() {
        return None;
    }
    Decimal::from_str(&kept).ok()
}

/// Parse `text` against `prices`. Nothing is recorded on error.
pub fn parse_order(text: &str, prices: &PriceList) -> Result<Order, OrderError> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let Some((paid_token, item_tokens)) = tokens.split_last() else {
        return Err(OrderError::EmptyInput);
    };

    let paid = Money::from_str(paid_token).map_err(|_| OrderError::InvalidPaid(paid_token.to_string()))?;
    if paid.is_negative() {
        return Err(OrderError::NegativePaid);
    }

    let mut lines = Vec::with_capacity(item_tokens.len() / 2);
    for pair in item_tokens.chunks(2) {
        let item = canonical_name(pair[0]);
        let Some(quantity_token) = pair.get(1) else {
            return Err(OrderError::MissingQuantity(item));
        };
        let quantity = parse_quantity(quantity_token).ok_or_else(|| OrderError::InvalidQuantity {
            item: item.clone(),
            quantity: quantity_token.to_string(),
        })?;
        let unit_price = prices.price_of(&item);
        lines.push(OrderLine {
            item,
            quantity,
            unit_price,
        });
    }

    if lines.is_empty() {
        return Err(OrderError::NoItems);
    }
    Ok(Order { lines, paid })
}
