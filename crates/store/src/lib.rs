//! # Backing Store Layer
//!
//! This module provides the narrow row-level interface to the external
//! spreadsheet-like backing store ([`SheetsApi`]), one explicit row codec per
//! entity (see [`rows`]), and the repository traits the checkout pipeline
//! talks through: [`ShopDirectory`], [`CatalogRepository`],
//! [`CustomerRepository`], [`OrderRepository`].
//!
//! The store offers no transactions. Appends are at-least-once; updates are
//! read-modify-write guarded by a per-row revision token so that a stale
//! writer is rejected instead of silently winning.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use model::{Customer, CustomerInfo, Order, OrderDraft, OrderPatch, Product, ProductSet, Shop};
use thiserror::Error;

pub mod memory;
pub mod rows;

pub use memory::MemorySheets;

/// A flat row of scalar cells, as held by the backing store.
pub type Row = Vec<String>;

/// Worksheet names, one per entity.
pub mod worksheets {
    pub const SHOPS: &str = "shops";
    pub const PRODUCTS: &str = "products";
    pub const SETS: &str = "sets";
    pub const CUSTOMERS: &str = "customers";
    pub const ORDERS: &str = "orders";
}

/// # StoreError
///
/// Error types that can occur during backing-store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store could not be reached or returned an error.
    /// The caller must not assume partial success.
    #[error("Backing store unavailable: {0}")]
    Unavailable(String),
    /// No matching record.
    #[error("Not found")]
    NotFound,
    /// A guarded rewrite found a newer revision than the one read.
    #[error("Revision conflict: expected {expected}, found {found}")]
    Conflict { expected: u64, found: u64 },
    /// A stored row does not decode under the entity schema.
    #[error("Corrupt row in {worksheet}: {reason}")]
    Corrupt { worksheet: String, reason: String },
}

/// Row-level operations against the backing spreadsheet service.
///
/// The hosted client lives outside this crate; [`MemorySheets`] implements
/// the same contract for tests and local runs.
#[async_trait]
pub trait SheetsApi: Send + Sync {
    /// All rows of a worksheet, in storage order.
    async fn list_rows(&self, worksheet: &str) -> Result<Vec<Row>, StoreError>;

    /// Append one row. At-least-once: a retry after a timeout may duplicate.
    async fn append_row(&self, worksheet: &str, row: Row) -> Result<(), StoreError>;

    /// Rewrite the row at `index` in place.
    async fn rewrite_row(&self, worksheet: &str, index: usize, row: Row) -> Result<(), StoreError>;
}

/// Generates an opaque prefixed identifier from the current timestamp and a
/// random suffix, e.g. `ORD-1718000000000-9f3c`. Kept next to the append
/// paths so id generation never happens before a record is persisted.
pub fn new_id(prefix: &str) -> String {
    let millis = Utc::now().timestamp_millis();
    let salt: u16 = rand::random();
    format!("{prefix}-{millis}-{salt:04x}")
}

/// # ShopDirectory
///
/// Lookup of shops by slug, id, or owning admin. Shops are read-only to the
/// pipeline; it needs them for the delivery fee and the seller contact.
#[async_trait]
pub trait ShopDirectory: Send + Sync {
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Shop>, StoreError>;
    async fn get_by_id(&self, id: &str) -> Result<Option<Shop>, StoreError>;
    /// Resolves an authenticated admin to the single shop they own.
    async fn get_by_owner(&self, owner_id: &str) -> Result<Option<Shop>, StoreError>;
}

/// # CatalogRepository
///
/// Read access to a shop's products and pre-built sets.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn list_products_by_shop(&self, shop_id: &str) -> Result<Vec<Product>, StoreError>;
    async fn list_sets_by_shop(&self, shop_id: &str) -> Result<Vec<ProductSet>, StoreError>;
}

/// # CustomerRepository
///
/// Customers are created lazily on first order and de-duplicated by phone
/// within a shop. De-duplication is the resolver's job; this layer only
/// lists and appends.
#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn list_by_shop(&self, shop_id: &str) -> Result<Vec<Customer>, StoreError>;
    async fn append(&self, shop_id: &str, info: &CustomerInfo) -> Result<Customer, StoreError>;
}

/// # OrderRepository
///
/// Persistence for orders. `create` assigns the order id at append time;
/// `update` is a revision-guarded read-modify-write.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn list_by_shop(&self, shop_id: &str) -> Result<Vec<Order>, StoreError>;
    async fn get(&self, shop_id: &str, order_id: &str) -> Result<Order, StoreError>;
    async fn create(&self, shop_id: &str, draft: &OrderDraft) -> Result<Order, StoreError>;
    /// Merges `patch` over the stored record and rewrites it in place.
    ///
    /// Fails with [`StoreError::Conflict`] if the stored revision no longer
    /// matches `expected_revision`, and [`StoreError::NotFound`] if the order
    /// does not exist for the shop.
    async fn update(
        &self,
        shop_id: &str,
        order_id: &str,
        patch: OrderPatch,
        expected_revision: u64,
    ) -> Result<Order, StoreError>;
}

/// Sheet-backed implementation of [`ShopDirectory`].
pub struct SheetShopDirectory {
    sheets: Arc<dyn SheetsApi>,
}

impl SheetShopDirectory {
    pub fn new(sheets: Arc<dyn SheetsApi>) -> Self {
        Self { sheets }
    }

    async fn find<F>(&self, pred: F) -> Result<Option<Shop>, StoreError>
    where
        F: Fn(&Shop) -> bool,
    {
        let rows = self.sheets.list_rows(worksheets::SHOPS).await?;
        for row in &rows {
            let shop = rows::decode_shop(row)?;
            if pred(&shop) {
                return Ok(Some(shop));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl ShopDirectory for SheetShopDirectory {
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Shop>, StoreError> {
        self.find(|s| s.slug == slug).await
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Shop>, StoreError> {
        self.find(|s| s.id == id).await
    }

    async fn get_by_owner(&self, owner_id: &str) -> Result<Option<Shop>, StoreError> {
        self.find(|s| s.owner_id == owner_id).await
    }
}

/// Sheet-backed implementation of [`CatalogRepository`].
pub struct SheetCatalogRepository {
    sheets: Arc<dyn SheetsApi>,
}

impl SheetCatalogRepository {
    pub fn new(sheets: Arc<dyn SheetsApi>) -> Self {
        Self { sheets }
    }
}

#[async_trait]
impl CatalogRepository for SheetCatalogRepository {
    async fn list_products_by_shop(&self, shop_id: &str) -> Result<Vec<Product>, StoreError> {
        let rows = self.sheets.list_rows(worksheets::PRODUCTS).await?;
        let mut products = Vec::new();
        for row in &rows {
            let product = rows::decode_product(row)?;
            if product.shop_id == shop_id {
                products.push(product);
            }
        }
        Ok(products)
    }

    async fn list_sets_by_shop(&self, shop_id: &str) -> Result<Vec<ProductSet>, StoreError> {
        let rows = self.sheets.list_rows(worksheets::SETS).await?;
        let mut sets = Vec::new();
        for row in &rows {
            let set = rows::decode_set(row)?;
            if set.shop_id == shop_id {
                sets.push(set);
            }
        }
        Ok(sets)
    }
}

/// Sheet-backed implementation of [`CustomerRepository`].
pub struct SheetCustomerRepository {
    sheets: Arc<dyn SheetsApi>,
}

impl SheetCustomerRepository {
    pub fn new(sheets: Arc<dyn SheetsApi>) -> Self {
        Self { sheets }
    }
}

#[async_trait]
impl CustomerRepository for SheetCustomerRepository {
    async fn list_by_shop(&self, shop_id: &str) -> Result<Vec<Customer>, StoreError> {
        let rows = self.sheets.list_rows(worksheets::CUSTOMERS).await?;
        let mut customers = Vec::new();
        for row in &rows {
            let customer = rows::decode_customer(row)?;
            if customer.shop_id == shop_id {
                customers.push(customer);
            }
        }
        Ok(customers)
    }

    async fn append(&self, shop_id: &str, info: &CustomerInfo) -> Result<Customer, StoreError> {
        let customer = Customer {
            id: new_id("CUST"),
            shop_id: shop_id.to_string(),
            full_name: info.full_name.trim().to_string(),
            phone: info.phone.trim().to_string(),
            email: info.email.clone().unwrap_or_default(),
            address: info.address.clone().unwrap_or_default(),
        };
        self.sheets
            .append_row(worksheets::CUSTOMERS, rows::encode_customer(&customer))
            .await?;
        Ok(customer)
    }
}

/// Sheet-backed implementation of [`OrderRepository`].
pub struct SheetOrderRepository {
    sheets: Arc<dyn SheetsApi>,
}

impl SheetOrderRepository {
    pub fn new(sheets: Arc<dyn SheetsApi>) -> Self {
        Self { sheets }
    }

    /// Locates an order row, returning its storage index alongside the record.
    async fn locate(&self, shop_id: &str, order_id: &str) -> Result<(usize, Order), StoreError> {
        let rows = self.sheets.list_rows(worksheets::ORDERS).await?;
        for (index, row) in rows.iter().enumerate() {
            let order = rows::decode_order(row)?;
            if order.shop_id == shop_id && order.id == order_id {
                return Ok((index, order));
            }
        }
        Err(StoreError::NotFound)
    }
}

#[async_trait]
impl OrderRepository for SheetOrderRepository {
    async fn list_by_shop(&self, shop_id: &str) -> Result<Vec<Order>, StoreError> {
        let rows = self.sheets.list_rows(worksheets::ORDERS).await?;
        let mut orders = Vec::new();
        for row in &rows {
            let order = rows::decode_order(row)?;
            if order.shop_id == shop_id {
                orders.push(order);
            }
        }
        Ok(orders)
    }

    async fn get(&self, shop_id: &str, order_id: &str) -> Result<Order, StoreError> {
        let (_, order) = self.locate(shop_id, order_id).await?;
        Ok(order)
    }

    async fn create(&self, shop_id: &str, draft: &OrderDraft) -> Result<Order, StoreError> {
        let order = Order {
            id: new_id("ORD"),
            shop_id: shop_id.to_string(),
            customer_id: draft.customer_id.clone(),
            items: draft.items.clone(),
            total_price: draft.total_price,
            created_at: draft.created_at,
            status: draft.status,
            payment_status: draft.payment_status,
            delivery_required: draft.delivery_required,
            notes: draft.notes.clone(),
            set_id: draft.set_id.clone(),
            revision: 0,
        };
        self.sheets
            .append_row(worksheets::ORDERS, rows::encode_order(&order))
            .await?;
        Ok(order)
    }

    async fn update(
        &self,
        shop_id: &str,
        order_id: &str,
        patch: OrderPatch,
        expected_revision: u64,
    ) -> Result<Order, StoreError> {
        let (index, stored) = self.locate(shop_id, order_id).await?;
        if stored.revision != expected_revision {
            return Err(StoreError::Conflict {
                expected: expected_revision,
                found: stored.revision,
            });
        }

        let mut updated = stored;
        if let Some(status) = patch.status {
            updated.status = status;
        }
        if let Some(payment_status) = patch.payment_status {
            updated.payment_status = payment_status;
        }
        updated.revision += 1;

        self.sheets
            .rewrite_row(worksheets::ORDERS, index, rows::encode_order(&updated))
            .await?;
        Ok(updated)
    }
}
