use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Shop — a tenant storefront with its own catalog, customers and orders.
///
/// Read-only to the checkout pipeline; provisioning happens elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Shop {
    pub id: String,
    #[serde(rename = "owner_id")]
    pub owner_id: String,
    pub name: String,
    pub slug: String,
    pub description: String,
    #[serde(rename = "image_url")]
    pub image_url: String,
    /// Seller contact used for order-created notifications.
    #[serde(rename = "contact_email")]
    pub contact_email: String,
    /// Surcharge added to an order's total only when delivery is requested.
    #[serde(rename = "delivery_fee")]
    pub delivery_fee: Decimal,
    pub active: bool,
}

/// Product — a single catalog item owned by a shop.
///
/// `category` is a free-text grouping ("Lulav", "Etrog", "Hadas", "Arava").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Product {
    pub id: String,
    #[serde(rename = "shop_id")]
    pub shop_id: String,
    pub category: String,
    pub name: String,
    #[serde(rename = "name_he")]
    pub name_he: String,
    pub description: String,
    pub price: Decimal,
    #[serde(rename = "image_url")]
    pub image_url: String,
}

/// ProductSet — a pre-priced bundle of products sold as one catalog item.
///
/// `price` is independent of the sum of the constituent product prices.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProductSet {
    pub id: String,
    #[serde(rename = "shop_id")]
    pub shop_id: String,
    pub title: String,
    pub description: String,
    /// product id -> requested quantity
    pub contents: BTreeMap<String, u32>,
    pub price: Decimal,
    #[serde(rename = "image_url")]
    pub image_url: String,
}

/// Customer — unique per (shop_id, phone); phone is the natural key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Customer {
    pub id: String,
    #[serde(rename = "shop_id")]
    pub shop_id: String,
    #[serde(rename = "full_name")]
    pub full_name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
}

/// CustomerInfo — the checkout form input, ephemeral.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CustomerInfo {
    #[serde(rename = "full_name")]
    pub full_name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(rename = "delivery_required", default)]
    pub delivery_required: bool,
}

/// Cart — ephemeral client-held mapping of product id to requested quantity.
///
/// Zero quantities are removed rather than stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Cart {
    entries: BTreeMap<String, u32>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the quantity for a product; a quantity of zero removes the entry.
    pub fn set_quantity(&mut self, product_id: &str, quantity: u32) {
        if quantity == 0 {
            self.entries.remove(product_id);
        } else {
            self.entries.insert(product_id.to_string(), quantity);
        }
    }

    pub fn quantity(&self, product_id: &str) -> u32 {
        self.entries.get(product_id).copied().unwrap_or(0)
    }

    pub fn total_quantity(&self) -> u32 {
        self.entries.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_quantity() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &u32)> {
        self.entries.iter()
    }
}

impl From<BTreeMap<String, u32>> for Cart {
    fn from(entries: BTreeMap<String, u32>) -> Self {
        let mut cart = Cart::new();
        for (id, qty) in entries {
            cart.set_quantity(&id, qty);
        }
        cart
    }
}

/// LineItem — one entry in an order's serialized product mapping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineItem {
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl LineItem {
    pub fn with_quantity(quantity: u32) -> Self {
        Self {
            quantity,
            size: None,
            color: None,
        }
    }
}

/// Order fulfillment status. No transition table is enforced; admins may
/// move an order between any two states.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OrderStatus::Pending),
            "completed" => Some(OrderStatus::Completed),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

/// Payment status, an axis independent of [`OrderStatus`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Paid => "paid",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unpaid" => Some(PaymentStatus::Unpaid),
            "paid" => Some(PaymentStatus::Paid),
            _ => None,
        }
    }
}

/// Order — the persisted aggregate produced by the checkout pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Order {
    pub id: String,
    #[serde(rename = "shop_id")]
    pub shop_id: String,
    #[serde(rename = "customer_id")]
    pub customer_id: String,
    /// product id -> line item
    pub items: BTreeMap<String, LineItem>,
    /// Includes the shop's delivery fee iff `delivery_required`.
    #[serde(rename = "total_price")]
    pub total_price: Decimal,
    #[serde(rename = "created_at")]
    pub created_at: DateTime<Utc>,
    pub status: OrderStatus,
    #[serde(rename = "payment_status")]
    pub payment_status: PaymentStatus,
    #[serde(rename = "delivery_required")]
    pub delivery_required: bool,
    #[serde(default)]
    pub notes: Option<String>,
    /// Set this order was built from, when the shopper picked a pre-built set.
    #[serde(rename = "set_id", default)]
    pub set_id: Option<String>,
    /// Optimistic-concurrency token, bumped by the store on every rewrite.
    pub revision: u64,
}

/// OrderDraft — a composed order before the store assigns an id.
///
/// Id generation stays colocated with the append operation so that two
/// concurrent compositions cannot collide.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderDraft {
    #[serde(rename = "shop_id")]
    pub shop_id: String,
    #[serde(rename = "customer_id")]
    pub customer_id: String,
    pub items: BTreeMap<String, LineItem>,
    #[serde(rename = "total_price")]
    pub total_price: Decimal,
    #[serde(rename = "created_at")]
    pub created_at: DateTime<Utc>,
    pub status: OrderStatus,
    #[serde(rename = "payment_status")]
    pub payment_status: PaymentStatus,
    #[serde(rename = "delivery_required")]
    pub delivery_required: bool,
    pub notes: Option<String>,
    #[serde(rename = "set_id")]
    pub set_id: Option<String>,
}

/// Patch applied to an order by an admin action. Absent fields are left
/// unchanged; the two axes never constrain each other.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderPatch {
    #[serde(default)]
    pub status: Option<OrderStatus>,
    #[serde(rename = "payment_status", default)]
    pub payment_status: Option<PaymentStatus>,
}

impl OrderPatch {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.payment_status.is_none()
    }
}
