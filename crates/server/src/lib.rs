//! Server crate provides HTTP server functionality.
//!
//! This module implements the HTTP transport for the storefront and the
//! admin back-office: shop catalog views, checkout submission, order
//! confirmation, and admin order management behind a bearer-token check.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{Path as AxumPath, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use checkout::{CheckoutError, CheckoutService, FieldError};
use model::{Cart, CustomerInfo, OrderPatch, Product, ProductSet, Shop};
use notify::{SmtpEmailChannel, WebhookChatChannel};
use prometheus::{CounterVec, HistogramOpts, HistogramVec, Opts, Registry};
use serde::{Deserialize, Serialize};
use store::{
    CatalogRepository, SheetCatalogRepository, SheetCustomerRepository, SheetOrderRepository,
    SheetShopDirectory, ShopDirectory,
};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

/// The concrete pipeline wiring used by the binary: sheet-backed
/// repositories, SMTP email, webhook chat.
pub type AppCheckout = CheckoutService<
    SheetShopDirectory,
    SheetCatalogRepository,
    SheetCustomerRepository,
    SheetOrderRepository,
    SmtpEmailChannel,
    WebhookChatChannel,
>;

/// Server represents the HTTP server for the storefront and admin surface.
pub struct Server {
    state: AppState,
    port: u16,
}

/// Metrics collects and exposes HTTP server metrics.
struct Metrics {
    registry: Registry,
    http_requests_total: CounterVec,
    http_request_duration_seconds: HistogramVec,
    errors_total: CounterVec,
}

impl Metrics {
    fn new(registry: Registry) -> Self {
        let http_requests_total = CounterVec::new(
            Opts::new("http_requests_total", "Total number of HTTP requests"),
            &["method", "endpoint", "status"],
        )
        .expect("Failed to create http_requests_total metric");

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request duration in seconds",
            ),
            &["method", "endpoint"],
        )
        .expect("Failed to create http_request_duration_seconds metric");

        let errors_total = CounterVec::new(
            Opts::new("errors_total", "Total number of errors"),
            &["source", "endpoint"],
        )
        .expect("Failed to create errors_total metric");

        registry
            .register(Box::new(http_requests_total.clone()))
            .expect("Failed to register http_requests_total metric");
        registry
            .register(Box::new(http_request_duration_seconds.clone()))
            .expect("Failed to register http_request_duration_seconds metric");
        registry
            .register(Box::new(errors_total.clone()))
            .expect("Failed to register errors_total metric");

        Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            errors_total,
        }
    }

    fn record_request(&self, method: &str, endpoint: &str, status: u16, duration: Duration) {
        self.http_requests_total
            .with_label_values(&[method, endpoint, &status.to_string()])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, endpoint])
            .observe(duration.as_secs_f64());
    }

    fn record_error(&self, source: &str, endpoint: &str) {
        self.errors_total
            .with_label_values(&[source, endpoint])
            .inc();
    }
}

/// Application state shared between request handlers.
#[derive(Clone)]
struct AppState {
    checkout: Arc<AppCheckout>,
    shops: Arc<SheetShopDirectory>,
    catalog: Arc<SheetCatalogRepository>,
    metrics: Arc<Metrics>,
    admin_token: String,
    admin_user: String,
}

/// Acting admin identity, resolved to the single shop it owns. Attached as
/// a request extension by the admin middleware; handlers trust it and pass
/// the shop id down explicitly.
#[derive(Clone)]
struct AdminContext {
    shop_id: String,
}

impl Server {
    /// Creates a new Server instance.
    ///
    /// # Arguments
    ///
    /// * `port` - The port on which the server will listen
    /// * `checkout` - The order placement pipeline
    /// * `shops`, `catalog` - Read repositories for the storefront views
    /// * `registry` - Prometheus registry shared with the dispatcher metrics
    /// * `admin_token`, `admin_user` - Bearer credentials for the admin surface
    pub fn new(
        port: u16,
        checkout: Arc<AppCheckout>,
        shops: Arc<SheetShopDirectory>,
        catalog: Arc<SheetCatalogRepository>,
        registry: Registry,
        admin_token: String,
        admin_user: String,
    ) -> Self {
        info!("Initializing HTTP server on port {}", port);

        Self {
            state: AppState {
                checkout,
                shops,
                catalog,
                metrics: Arc::new(Metrics::new(registry)),
                admin_token,
                admin_user,
            },
            port,
        }
    }

    /// Starts the server and blocks until it's shut down.
    pub async fn start(&self) -> Result<()> {
        let app = self.create_router();

        let listener = TcpListener::bind(format!("0.0.0.0:{}", self.port))
            .await
            .context("Failed to bind to port")?;

        info!("HTTP server listening on port {}", self.port);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("Server error")?;

        info!("HTTP server shut down gracefully");
        Ok(())
    }

    fn create_router(&self) -> Router {
        let metrics = self.state.metrics.clone();

        let admin = Router::new()
            .route("/admin/orders", get(Self::handle_admin_list_orders))
            .route("/admin/orders/{order_id}", patch(Self::handle_admin_patch_order))
            .route_layer(axum::middleware::from_fn_with_state(
                self.state.clone(),
                Self::admin_auth_middleware,
            ));

        Router::new()
            .route("/shops/{slug}", get(Self::handle_storefront))
            .route("/shops/{slug}/checkout", post(Self::handle_checkout))
            .route("/shops/{slug}/orders/{order_id}", get(Self::handle_confirmation))
            .merge(admin)
            .route("/health", get(Self::handle_health))
            .route("/metrics", get(Self::handle_metrics))
            .layer(axum::middleware::from_fn_with_state(
                metrics,
                Self::metrics_middleware,
            ))
            .with_state(self.state.clone())
    }

    /// Middleware for collecting metrics on HTTP requests.
    async fn metrics_middleware(
        State(metrics): State<Arc<Metrics>>,
        req: axum::extract::Request,
        next: axum::middleware::Next,
    ) -> Response {
        let method = req.method().to_string();
        let path = req.uri().path().to_string();
        let start = std::time::Instant::now();

        let response = next.run(req).await;

        let status = response.status().as_u16();
        metrics.record_request(&method, &path, status, start.elapsed());
        if status >= 400 {
            metrics.record_error("http", &path);
        }

        response
    }

    /// Middleware establishing the admin context: checks the bearer token
    /// and resolves the admin to the one shop it owns.
    async fn admin_auth_middleware(
        State(state): State<AppState>,
        mut req: axum::extract::Request,
        next: axum::middleware::Next,
    ) -> Response {
        let presented = req
            .headers()
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));

        match presented {
            Some(token) if token == state.admin_token => {}
            _ => {
                warn!("Admin request rejected: missing or invalid token");
                return (StatusCode::UNAUTHORIZED, "authentication required").into_response();
            }
        }

        let shop = match state.shops.get_by_owner(&state.admin_user).await {
            Ok(Some(shop)) => shop,
            Ok(None) => {
                warn!(admin = %state.admin_user, "Admin owns no shop");
                return (StatusCode::UNAUTHORIZED, "no shop for this admin").into_response();
            }
            Err(e) => {
                error!(error = %e, "Failed to resolve admin shop");
                return (StatusCode::SERVICE_UNAVAILABLE, "please retry").into_response();
            }
        };

        req.extensions_mut().insert(AdminContext { shop_id: shop.id });
        next.run(req).await
    }

    async fn handle_storefront(
        State(state): State<AppState>,
        AxumPath(slug): AxumPath<String>,
    ) -> Response {
        info!(%slug, "Storefront requested");

        let shop = match state.shops.get_by_slug(&slug).await {
            Ok(Some(shop)) if shop.active => shop,
            Ok(_) => return (StatusCode::NOT_FOUND, "shop not found").into_response(),
            Err(e) => {
                error!(error = %e, "Failed to load shop");
                return (StatusCode::SERVICE_UNAVAILABLE, "please retry").into_response();
            }
        };

        let products = match state.catalog.list_products_by_shop(&shop.id).await {
            Ok(products) => products,
            Err(e) => {
                error!(error = %e, "Failed to load products");
                return (StatusCode::SERVICE_UNAVAILABLE, "please retry").into_response();
            }
        };
        let sets = match state.catalog.list_sets_by_shop(&shop.id).await {
            Ok(sets) => sets,
            Err(e) => {
                error!(error = %e, "Failed to load sets");
                return (StatusCode::SERVICE_UNAVAILABLE, "please retry").into_response();
            }
        };

        Json(storefront_view(shop, products, sets)).into_response()
    }

    async fn handle_checkout(
        State(state): State<AppState>,
        AxumPath(slug): AxumPath<String>,
        Json(request): Json<CheckoutRequest>,
    ) -> Response {
        info!(%slug, "Checkout submitted");

        let shop = match state.shops.get_by_slug(&slug).await {
            Ok(Some(shop)) if shop.active => shop,
            Ok(_) => return (StatusCode::NOT_FOUND, "shop not found").into_response(),
            Err(e) => {
                error!(error = %e, "Failed to load shop");
                return (StatusCode::SERVICE_UNAVAILABLE, "please retry").into_response();
            }
        };

        let cart = Cart::from(request.cart);
        match state
            .checkout
            .place_order(&shop.id, &cart, &request.customer, request.set_id)
            .await
        {
            Ok(order) => Json(CheckoutResponse {
                redirect: format!("/shops/{slug}/orders/{}", order.id),
                order_id: order.id,
            })
            .into_response(),
            Err(err) => checkout_error_response(err),
        }
    }

    async fn handle_confirmation(
        State(state): State<AppState>,
        AxumPath((slug, order_id)): AxumPath<(String, String)>,
    ) -> Response {
        let shop = match state.shops.get_by_slug(&slug).await {
            Ok(Some(shop)) => shop,
            Ok(None) => return (StatusCode::NOT_FOUND, "shop not found").into_response(),
            Err(e) => {
                error!(error = %e, "Failed to load shop");
                return (StatusCode::SERVICE_UNAVAILABLE, "please retry").into_response();
            }
        };

        match state.checkout.get_order(&shop.id, &order_id).await {
            Ok(order) => Json(order).into_response(),
            Err(err) => checkout_error_response(err),
        }
    }

    async fn handle_admin_list_orders(
        State(state): State<AppState>,
        axum::Extension(admin): axum::Extension<AdminContext>,
    ) -> Response {
        match state.checkout.list_orders(&admin.shop_id).await {
            Ok(orders) => Json(orders).into_response(),
            Err(err) => checkout_error_response(err),
        }
    }

    async fn handle_admin_patch_order(
        State(state): State<AppState>,
        axum::Extension(admin): axum::Extension<AdminContext>,
        AxumPath(order_id): AxumPath<String>,
        Json(patch): Json<OrderPatch>,
    ) -> Response {
        info!(order_id = %order_id, "Admin order update");
        match state.checkout.update_order(&admin.shop_id, &order_id, patch).await {
            Ok(order) => Json(order).into_response(),
            Err(err) => checkout_error_response(err),
        }
    }

    async fn handle_health() -> &'static str {
        "OK"
    }

    async fn handle_metrics(State(state): State<AppState>) -> Response {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();

        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&state.metrics.registry.gather(), &mut buffer) {
            error!("Failed to encode metrics: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response();
        }

        match String::from_utf8(buffer) {
            Ok(metrics_text) => (StatusCode::OK, metrics_text).into_response(),
            Err(e) => {
                error!("Failed to convert metrics to UTF-8: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Invalid metrics data").into_response()
            }
        }
    }
}

/// Checkout submission payload: the client-held cart plus the form input.
#[derive(Debug, Deserialize)]
struct CheckoutRequest {
    cart: BTreeMap<String, u32>,
    customer: CustomerInfo,
    #[serde(default)]
    set_id: Option<String>,
}

/// Successful checkout: the new order id and the confirmation redirect.
#[derive(Debug, Serialize)]
struct CheckoutResponse {
    order_id: String,
    redirect: String,
}

#[derive(Debug, Serialize)]
struct FieldErrorView {
    field: &'static str,
    code: checkout::FieldErrorKind,
    message: &'static str,
}

#[derive(Debug, Serialize)]
struct ValidationErrorBody {
    errors: Vec<FieldErrorView>,
}

/// Maps pipeline errors onto HTTP responses. Store failures deliberately
/// hide internal detail behind a generic retry message.
fn checkout_error_response(err: CheckoutError) -> Response {
    match err {
        CheckoutError::Validation(errors) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ValidationErrorBody {
                errors: errors.iter().map(field_error_view).collect(),
            }),
        )
            .into_response(),
        CheckoutError::NotFound => (StatusCode::NOT_FOUND, "not found").into_response(),
        CheckoutError::Conflict => (
            StatusCode::CONFLICT,
            "the order was modified concurrently, please retry",
        )
            .into_response(),
        CheckoutError::StoreUnavailable(detail) => {
            error!(%detail, "Order operation failed against the backing store");
            (StatusCode::SERVICE_UNAVAILABLE, "order failed, please retry").into_response()
        }
    }
}

fn field_error_view(err: &FieldError) -> FieldErrorView {
    FieldErrorView {
        field: err.field,
        code: err.kind,
        message: err.message(),
    }
}

/// Storefront view model: shop header, products grouped by category, sets.
#[derive(Debug, Serialize)]
struct StorefrontView {
    shop: ShopView,
    categories: Vec<CategoryView>,
    sets: Vec<ProductSet>,
}

#[derive(Debug, Serialize)]
struct ShopView {
    name: String,
    slug: String,
    description: String,
    image_url: String,
    delivery_fee: rust_decimal::Decimal,
}

#[derive(Debug, Serialize)]
struct CategoryView {
    category: String,
    products: Vec<Product>,
}

fn storefront_view(shop: Shop, products: Vec<Product>, sets: Vec<ProductSet>) -> StorefrontView {
    StorefrontView {
        shop: ShopView {
            name: shop.name,
            slug: shop.slug,
            description: shop.description,
            image_url: shop.image_url,
            delivery_fee: shop.delivery_fee,
        },
        categories: group_by_category(products),
        sets,
    }
}

/// Groups catalog products by their free-text category, in category order.
fn group_by_category(products: Vec<Product>) -> Vec<CategoryView> {
    let mut grouped: BTreeMap<String, Vec<Product>> = BTreeMap::new();
    for product in products {
        grouped.entry(product.category.clone()).or_default().push(product);
    }
    grouped
        .into_iter()
        .map(|(category, products)| CategoryView { category, products })
        .collect()
}

/// Waits for a shutdown signal (Ctrl+C)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkout::CheckoutService;
    use notify::{NotificationDispatcher, NotifyMetrics};
    use rust_decimal::Decimal;
    use store::{MemorySheets, SheetsApi, rows, worksheets};

    async fn test_server() -> Server {
        let sheets: Arc<dyn SheetsApi> = Arc::new(MemorySheets::new());
        let shop = Shop {
            id: "SHOP-1".to_string(),
            owner_id: "USER-1".to_string(),
            name: "Minim Express".to_string(),
            slug: "minim-express".to_string(),
            description: String::new(),
            image_url: String::new(),
            contact_email: "seller@example.com".to_string(),
            delivery_fee: Decimal::from(20),
            active: true,
        };
        sheets
            .append_row(worksheets::SHOPS, rows::encode_shop(&shop))
            .await
            .unwrap();

        let registry = Registry::new();
        let dispatcher = NotificationDispatcher::new(
            SmtpEmailChannel::new("localhost", 587, "", "", "orders@localhost").unwrap(),
            WebhookChatChannel::new("", false),
            NotifyMetrics::register(&registry),
        );
        let service = CheckoutService::new(
            SheetShopDirectory::new(sheets.clone()),
            SheetCatalogRepository::new(sheets.clone()),
            SheetCustomerRepository::new(sheets.clone()),
            SheetOrderRepository::new(sheets.clone()),
            dispatcher,
        );

        Server::new(
            8080,
            Arc::new(service),
            Arc::new(SheetShopDirectory::new(sheets.clone())),
            Arc::new(SheetCatalogRepository::new(sheets.clone())),
            registry,
            "test-token".to_string(),
            "USER-1".to_string(),
        )
    }

    #[tokio::test]
    async fn test_server_creation() {
        let server = test_server().await;
        assert_eq!(server.port, 8080);
        assert_eq!(server.state.admin_token, "test-token");
        // Router construction must not panic.
        let _router = server.create_router();
    }

    #[tokio::test]
    async fn test_storefront_unknown_slug_is_not_found() {
        let server = test_server().await;
        let response =
            Server::handle_storefront(State(server.state.clone()), AxumPath("nope".to_string()))
                .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_confirmation_unknown_order_is_not_found() {
        let server = test_server().await;
        let response = Server::handle_confirmation(
            State(server.state.clone()),
            AxumPath(("minim-express".to_string(), "ORD-nope".to_string())),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_group_by_category_orders_and_buckets() {
        let mk = |id: &str, category: &str| Product {
            id: id.to_string(),
            shop_id: "SHOP-1".to_string(),
            category: category.to_string(),
            name: id.to_string(),
            name_he: String::new(),
            description: String::new(),
            price: Decimal::ZERO,
            image_url: String::new(),
        };
        let groups = group_by_category(vec![
            mk("PROD-1", "Lulav"),
            mk("PROD-2", "Etrog"),
            mk("PROD-3", "Lulav"),
        ]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].category, "Etrog");
        assert_eq!(groups[1].category, "Lulav");
        assert_eq!(groups[1].products.len(), 2);
    }
}
