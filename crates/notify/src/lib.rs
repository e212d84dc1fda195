//! Best-effort notification dispatch for order events.
//!
//! The dispatcher sits outside the transactional boundary of the checkout
//! pipeline: an order that was persisted is a placed order whether or not
//! any notification went out. Channel failures are logged and counted,
//! never returned to the caller.
//!
//! Two channels exist: seller email on order creation (SMTP via `lettre`)
//! and a customer chat message on status changes (JSON webhook). The chat
//! channel is gated by a feature flag; when disabled, sends are no-ops that
//! report success.

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::header::ContentType,
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use model::{Customer, Order, Shop};
use prometheus::{IntCounterVec, Opts, Registry};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur inside a notification channel. These never cross
/// the dispatcher boundary.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),
    /// Failed to build the email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),
    /// Recipient or sender address did not parse.
    #[error("Invalid address: {0}")]
    InvalidAddress(#[from] lettre::address::AddressError),
    /// Webhook request failed.
    #[error("Webhook error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Outgoing email contract. Best-effort: the dispatcher owns failure handling.
#[async_trait]
pub trait EmailChannel: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), NotifyError>;
}

/// Outgoing chat-message contract, addressed by the customer's phone number.
#[async_trait]
pub trait ChatChannel: Send + Sync {
    async fn send(&self, to: &str, text: &str) -> Result<(), NotifyError>;
}

/// SMTP implementation of [`EmailChannel`].
pub struct SmtpEmailChannel {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpEmailChannel {
    /// Create a channel over a STARTTLS SMTP relay.
    ///
    /// # Errors
    /// Returns an error if the relay configuration is invalid.
    pub fn new(
        host: &str,
        port: u16,
        username: &str,
        password: &str,
        from_address: &str,
    ) -> Result<Self, NotifyError> {
        let credentials = Credentials::new(username.to_string(), password.to_string());
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?
            .port(port)
            .credentials(credentials)
            .build();
        Ok(Self {
            mailer,
            from_address: from_address.to_string(),
        })
    }
}

#[async_trait]
impl EmailChannel for SmtpEmailChannel {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        let message = Message::builder()
            .from(self.from_address.parse()?)
            .to(to.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())?;
        self.mailer.send(message).await?;
        Ok(())
    }
}

/// Webhook implementation of [`ChatChannel`].
///
/// Posts `{ "to": ..., "text": ... }` to the configured URL. When the
/// feature flag is off, sends succeed without any network call.
pub struct WebhookChatChannel {
    http: reqwest::Client,
    webhook_url: String,
    enabled: bool,
}

impl WebhookChatChannel {
    pub fn new(webhook_url: &str, enabled: bool) -> Self {
        Self {
            http: reqwest::Client::new(),
            webhook_url: webhook_url.to_string(),
            enabled,
        }
    }
}

#[async_trait]
impl ChatChannel for WebhookChatChannel {
    async fn send(&self, to: &str, text: &str) -> Result<(), NotifyError> {
        if !self.enabled {
            debug!(to, "Chat channel disabled, skipping send");
            return Ok(());
        }
        self.http
            .post(&self.webhook_url)
            .json(&serde_json::json!({ "to": to, "text": text }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Which order axes an admin update touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusChange {
    pub status_changed: bool,
    pub payment_changed: bool,
}

impl StatusChange {
    pub fn any(&self) -> bool {
        self.status_changed || self.payment_changed
    }
}

/// Counters exposing notification failures without conflating them with
/// pipeline failures.
#[derive(Clone)]
pub struct NotifyMetrics {
    failures: IntCounterVec,
}

impl NotifyMetrics {
    pub fn register(registry: &Registry) -> Self {
        let failures = IntCounterVec::new(
            Opts::new(
                "notification_failures_total",
                "Total number of failed notification sends",
            ),
            &["channel", "event"],
        )
        .expect("Failed to create notification_failures_total metric");
        registry
            .register(Box::new(failures.clone()))
            .expect("Failed to register notification_failures_total metric");
        Self { failures }
    }

    fn record_failure(&self, channel: &str, event: &str) {
        self.failures.with_label_values(&[channel, event]).inc();
    }

    pub fn failure_count(&self, channel: &str, event: &str) -> u64 {
        self.failures.with_label_values(&[channel, event]).get()
    }
}

/// Fires order notifications through the configured channels, swallowing
/// and recording every failure.
pub struct NotificationDispatcher<E, C> {
    email: E,
    chat: C,
    metrics: NotifyMetrics,
}

impl<E, C> NotificationDispatcher<E, C>
where
    E: EmailChannel,
    C: ChatChannel,
{
    pub fn new(email: E, chat: C, metrics: NotifyMetrics) -> Self {
        Self {
            email,
            chat,
            metrics,
        }
    }

    /// Notify the seller that a new order was placed. Awaited but
    /// failure-tolerant; the order is already persisted when this runs.
    pub async fn order_created(&self, order: &Order, customer: &Customer, shop: &Shop) {
        let subject = format!("New order {} at {}", order.id, shop.name);
        let body = order_created_body(order, customer);
        if let Err(e) = self.email.send(&shop.contact_email, &subject, &body).await {
            warn!(order_id = %order.id, error = %e, "Failed to send order-created email");
            self.metrics.record_failure("email", "order_created");
        }
    }

    /// Notify the customer that the status or payment status of their order
    /// changed. Uses the post-update record.
    pub async fn status_changed(&self, order: &Order, customer: &Customer, change: StatusChange) {
        if !change.any() {
            return;
        }
        let text = status_changed_text(order, change);
        if let Err(e) = self.chat.send(&customer.phone, &text).await {
            warn!(order_id = %order.id, error = %e, "Failed to send status-change message");
            self.metrics.record_failure("chat", "status_changed");
        }
    }
}

fn order_created_body(order: &Order, customer: &Customer) -> String {
    let mut lines = vec![
        format!("Order {} was placed by {}.", order.id, customer.full_name),
        format!("Phone: {}", customer.phone),
        format!("Total: {}", order.total_price),
    ];
    if order.delivery_required {
        lines.push(format!("Delivery to: {}", customer.address));
    } else {
        lines.push("Pickup order.".to_string());
    }
    if let Some(notes) = &order.notes {
        lines.push(format!("Notes: {notes}"));
    }
    lines.join("\n")
}

fn status_changed_text(order: &Order, change: StatusChange) -> String {
    let mut parts = Vec::new();
    if change.status_changed {
        parts.push(format!("status is now {}", order.status.as_str()));
    }
    if change.payment_changed {
        parts.push(format!("payment is now {}", order.payment_status.as_str()));
    }
    format!("Update for order {}: {}.", order.id, parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use model::{OrderStatus, PaymentStatus};
    use rust_decimal::Decimal;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RecordingEmail {
        sent: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl EmailChannel for RecordingEmail {
        async fn send(&self, _to: &str, _subject: &str, _body: &str) -> Result<(), NotifyError> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(NotifyError::InvalidAddress(
                    "".parse::<lettre::Address>().unwrap_err(),
                ))
            } else {
                Ok(())
            }
        }
    }

    struct RecordingChat {
        sent: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl ChatChannel for RecordingChat {
        async fn send(&self, _to: &str, _text: &str) -> Result<(), NotifyError> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(NotifyError::InvalidAddress(
                    "".parse::<lettre::Address>().unwrap_err(),
                ))
            } else {
                Ok(())
            }
        }
    }

    fn sample_order() -> Order {
        Order {
            id: "ORD-1-a".to_string(),
            shop_id: "SHOP-1".to_string(),
            customer_id: "CUST-1-b".to_string(),
            items: BTreeMap::new(),
            total_price: Decimal::from(30),
            created_at: Utc::now(),
            status: OrderStatus::Cancelled,
            payment_status: PaymentStatus::Unpaid,
            delivery_required: false,
            notes: None,
            set_id: None,
            revision: 1,
        }
    }

    fn sample_customer() -> Customer {
        Customer {
            id: "CUST-1-b".to_string(),
            shop_id: "SHOP-1".to_string(),
            full_name: "Dana Levi".to_string(),
            phone: "0521234567".to_string(),
            email: "dana@example.com".to_string(),
            address: String::new(),
        }
    }

    fn sample_shop() -> Shop {
        Shop {
            id: "SHOP-1".to_string(),
            owner_id: "USER-1".to_string(),
            name: "Minim Express".to_string(),
            slug: "minim-express".to_string(),
            description: String::new(),
            image_url: String::new(),
            contact_email: "seller@example.com".to_string(),
            delivery_fee: Decimal::from(20),
            active: true,
        }
    }

    #[tokio::test]
    async fn test_email_failure_is_swallowed_and_counted() {
        let metrics = NotifyMetrics::register(&Registry::new());
        let dispatcher = NotificationDispatcher::new(
            RecordingEmail { sent: AtomicUsize::new(0), fail: true },
            RecordingChat { sent: AtomicUsize::new(0), fail: false },
            metrics.clone(),
        );

        dispatcher
            .order_created(&sample_order(), &sample_customer(), &sample_shop())
            .await;
        assert_eq!(metrics.failure_count("email", "order_created"), 1);
    }

    #[tokio::test]
    async fn test_status_change_message_sent_once() {
        let metrics = NotifyMetrics::register(&Registry::new());
        let chat = RecordingChat { sent: AtomicUsize::new(0), fail: false };
        let dispatcher = NotificationDispatcher::new(
            RecordingEmail { sent: AtomicUsize::new(0), fail: false },
            chat,
            metrics.clone(),
        );

        let change = StatusChange { status_changed: true, payment_changed: false };
        dispatcher
            .status_changed(&sample_order(), &sample_customer(), change)
            .await;
        assert_eq!(dispatcher.chat.sent.load(Ordering::SeqCst), 1);
        assert_eq!(metrics.failure_count("chat", "status_changed"), 0);
    }

    #[tokio::test]
    async fn test_no_op_when_nothing_changed() {
        let metrics = NotifyMetrics::register(&Registry::new());
        let dispatcher = NotificationDispatcher::new(
            RecordingEmail { sent: AtomicUsize::new(0), fail: false },
            RecordingChat { sent: AtomicUsize::new(0), fail: true },
            metrics,
        );

        dispatcher
            .status_changed(&sample_order(), &sample_customer(), StatusChange::default())
            .await;
        assert_eq!(dispatcher.chat.sent.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_disabled_chat_reports_success() {
        let channel = WebhookChatChannel::new("http://localhost:1/unreachable", false);
        assert!(channel.send("0521234567", "hello").await.is_ok());
    }

    #[test]
    fn test_status_changed_text_covers_both_axes() {
        let order = sample_order();
        let text = status_changed_text(
            &order,
            StatusChange { status_changed: true, payment_changed: true },
        );
        assert!(text.contains("status is now cancelled"));
        assert!(text.contains("payment is now unpaid"));
    }
}
