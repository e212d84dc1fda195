//! Order placement pipeline.
//!
//! This module defines [`CheckoutService`], which turns a shopper's cart and
//! contact details into a persisted, priced order. Within one placement the
//! steps always run in the same sequence: validate the form, price the cart,
//! resolve the customer, compose the order, persist it, then fire the
//! best-effort seller notification.
//!
//! Persistence failures abort the whole placement; the customer upsert runs
//! before order composition so a failed placement never leaves an order
//! behind. Notification failures never abort anything (see the `notify`
//! crate).

use chrono::Utc;
use model::{
    Cart, Customer, CustomerInfo, LineItem, Order, OrderDraft, OrderPatch, OrderStatus,
    PaymentStatus, Product,
};
use notify::{ChatChannel, EmailChannel, NotificationDispatcher, StatusChange};
use rust_decimal::Decimal;
use store::{
    CatalogRepository, CustomerRepository, OrderRepository, ShopDirectory, StoreError,
};
use thiserror::Error;
use tracing::{instrument, warn};

pub mod pricing;
pub mod validate;

pub use pricing::compute_total;
pub use validate::{FieldError, FieldErrorKind, validate};

/// The main error type for all operations in [`CheckoutService`].
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The submitted form or cart failed field-level validation.
    /// No side effects have occurred.
    #[error("Validation failed on {} field(s)", .0.len())]
    Validation(Vec<FieldError>),
    /// The referenced shop, order, or customer does not exist.
    #[error("Not found")]
    NotFound,
    /// The backing store could not be reached; the operation must be retried
    /// by the user, nothing was partially committed.
    #[error("Backing store unavailable: {0}")]
    StoreUnavailable(String),
    /// A concurrent admin update won the race; re-read and retry.
    #[error("Concurrent update conflict")]
    Conflict,
}

impl From<StoreError> for CheckoutError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => CheckoutError::NotFound,
            StoreError::Conflict { .. } => CheckoutError::Conflict,
            StoreError::Unavailable(msg) => CheckoutError::StoreUnavailable(msg),
            corrupt @ StoreError::Corrupt { .. } => {
                CheckoutError::StoreUnavailable(corrupt.to_string())
            }
        }
    }
}

/// Builds the canonical order draft from the cart, the resolved customer,
/// and the pricing calculator's output.
///
/// Cart entries whose product has vanished from the catalog are dropped,
/// matching the pricing calculator's leniency, so the serialized line items
/// and the total always agree. The order id is assigned later, at append
/// time, by the order store.
pub fn compose_order(
    shop_id: &str,
    customer: &Customer,
    cart: &Cart,
    catalog: &[Product],
    info: &CustomerInfo,
    total_price: Decimal,
    set_id: Option<String>,
) -> OrderDraft {
    let mut items = std::collections::BTreeMap::new();
    for (product_id, quantity) in cart.iter() {
        if catalog.iter().any(|p| &p.id == product_id) {
            items.insert(product_id.clone(), LineItem::with_quantity(*quantity));
        }
    }

    OrderDraft {
        shop_id: shop_id.to_string(),
        customer_id: customer.id.clone(),
        items,
        total_price,
        created_at: Utc::now(),
        status: OrderStatus::Pending,
        payment_status: PaymentStatus::Unpaid,
        delivery_required: info.delivery_required,
        notes: info.notes.clone().filter(|n| !n.trim().is_empty()),
        set_id,
    }
}

/// Coordinates the order placement pipeline over the repository and
/// notification ports. All context (shop, admin) arrives as explicit
/// arguments; the service holds no ambient request state.
pub struct CheckoutService<S, Cat, Cust, Ord, E, Ch> {
    shops: S,
    catalog: Cat,
    customers: Cust,
    orders: Ord,
    dispatcher: NotificationDispatcher<E, Ch>,
}

impl<S, Cat, Cust, Ord, E, Ch> CheckoutService<S, Cat, Cust, Ord, E, Ch>
where
    S: ShopDirectory,
    Cat: CatalogRepository,
    Cust: CustomerRepository,
    Ord: OrderRepository,
    E: EmailChannel,
    Ch: ChatChannel,
{
    pub fn new(
        shops: S,
        catalog: Cat,
        customers: Cust,
        orders: Ord,
        dispatcher: NotificationDispatcher<E, Ch>,
    ) -> Self {
        Self {
            shops,
            catalog,
            customers,
            orders,
            dispatcher,
        }
    }

    /// Finds the shop's customer with this exact phone number, or appends a
    /// new record if none exists.
    ///
    /// A repeat order never updates the stored customer's other fields; the
    /// first-seen record wins. If the store is unavailable the error
    /// propagates and no customer is fabricated.
    pub async fn resolve_customer(
        &self,
        shop_id: &str,
        info: &CustomerInfo,
    ) -> Result<Customer, CheckoutError> {
        let phone = info.phone.trim();
        let existing = self.customers.list_by_shop(shop_id).await?;
        if let Some(customer) = existing.into_iter().find(|c| c.phone == phone) {
            return Ok(customer);
        }
        Ok(self.customers.append(shop_id, info).await?)
    }

    /// Runs the full placement pipeline and returns the persisted order.
    ///
    /// # Errors
    /// [`CheckoutError::Validation`] if the form or cart is invalid (nothing
    /// was persisted), [`CheckoutError::NotFound`] if the shop does not
    /// exist, [`CheckoutError::StoreUnavailable`] if persistence failed.
    #[instrument(skip(self, cart, info), fields(shop_id = %shop_id))]
    pub async fn place_order(
        &self,
        shop_id: &str,
        cart: &Cart,
        info: &CustomerInfo,
        set_id: Option<String>,
    ) -> Result<Order, CheckoutError> {
        validate(info, cart).map_err(CheckoutError::Validation)?;

        let shop = self
            .shops
            .get_by_id(shop_id)
            .await?
            .ok_or(CheckoutError::NotFound)?;
        let catalog = self.catalog.list_products_by_shop(shop_id).await?;
        let total = compute_total(cart, &catalog, info.delivery_required, shop.delivery_fee);

        let customer = self.resolve_customer(shop_id, info).await?;
        let draft = compose_order(shop_id, &customer, cart, &catalog, info, total, set_id);

        let order = self.orders.create(shop_id, &draft).await?;

        // Past this point the order is placed; notification is auxiliary.
        self.dispatcher.order_created(&order, &customer, &shop).await;

        Ok(order)
    }

    /// Applies an admin status/payment patch through the revision-guarded
    /// store update, then fires the customer status-change notification if
    /// either axis actually changed.
    #[instrument(skip(self), fields(shop_id = %shop_id, order_id = %order_id))]
    pub async fn update_order(
        &self,
        shop_id: &str,
        order_id: &str,
        patch: OrderPatch,
    ) -> Result<Order, CheckoutError> {
        let existing = self.orders.get(shop_id, order_id).await?;
        if patch.is_empty() {
            return Ok(existing);
        }

        let updated = self
            .orders
            .update(shop_id, order_id, patch, existing.revision)
            .await?;

        let change = StatusChange {
            status_changed: updated.status != existing.status,
            payment_changed: updated.payment_status != existing.payment_status,
        };
        if change.any() {
            match self.find_customer(shop_id, &updated.customer_id).await {
                Ok(Some(customer)) => {
                    self.dispatcher.status_changed(&updated, &customer, change).await;
                }
                Ok(None) => {
                    warn!(customer_id = %updated.customer_id, "Order customer missing, skipping notification");
                }
                Err(e) => {
                    warn!(error = %e, "Could not load customer for notification");
                }
            }
        }

        Ok(updated)
    }

    /// The stored order, for the confirmation view.
    pub async fn get_order(&self, shop_id: &str, order_id: &str) -> Result<Order, CheckoutError> {
        Ok(self.orders.get(shop_id, order_id).await?)
    }

    /// All of a shop's orders, for the admin dashboard.
    pub async fn list_orders(&self, shop_id: &str) -> Result<Vec<Order>, CheckoutError> {
        Ok(self.orders.list_by_shop(shop_id).await?)
    }

    async fn find_customer(
        &self,
        shop_id: &str,
        customer_id: &str,
    ) -> Result<Option<Customer>, CheckoutError> {
        let customers = self.customers.list_by_shop(shop_id).await?;
        Ok(customers.into_iter().find(|c| c.id == customer_id))
    }
}
