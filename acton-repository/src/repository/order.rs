//! Result ordering
//!
//! # Example
//!
//! ```rust
//! use acton_repository::repository::{orders_to_sort, Order, OrderDirection};
//! use bson::doc;
//!
//! let orders = [Order::desc("created_at"), Order::signed("name", 1)];
//! assert_eq!(orders[1].direction, OrderDirection::Ascending);
//! assert_eq!(
//!     orders_to_sort(&orders),
//!     Some(doc! { "created_at": -1, "name": 1 })
//! );
//! ```

use std::fmt;

use bson::Document;

/// Direction for ordering results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderDirection {
    /// Sort in ascending order (A-Z, 0-9)
    #[default]
    Ascending,
    /// Sort in descending order (Z-A, 9-0)
    Descending,
}

impl OrderDirection {
    /// Negative means descending, anything else ascending
    pub fn from_signed(value: i64) -> Self {
        if value < 0 {
            Self::Descending
        } else {
            Self::Ascending
        }
    }

    /// Sort specification value: `1` or `-1`
    pub fn sort_value(self) -> i32 {
        match self {
            Self::Ascending => 1,
            Self::Descending => -1,
        }
    }
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascending => write!(f, "asc"),
            Self::Descending => write!(f, "desc"),
        }
    }
}

/// A storage field to sort by and its direction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub field: String,
    pub direction: OrderDirection,
}

impl Order {
    pub fn new(field: impl Into<String>, direction: OrderDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self::new(field, OrderDirection::Ascending)
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self::new(field, OrderDirection::Descending)
    }

    /// Order from a signed direction indicator
    pub fn signed(field: impl Into<String>, value: i64) -> Self {
        Self::new(field, OrderDirection::from_signed(value))
    }
}

/// Sort document for `orders`, `None` when there are no orders
///
/// Earlier orders take precedence; later ones break ties.
pub fn orders_to_sort(orders: &[Order]) -> Option<Document> {
    if orders.is_empty() {
        return None;
    }
    let mut sort = Document::new();
    for order in orders {
        sort.insert(order.field.clone(), order.direction.sort_value());
    }
    Some(sort)
}
