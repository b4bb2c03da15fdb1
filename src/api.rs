//! HTTP surface for the storefront and the staff back office.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::checkout::{Checkout, CheckoutForm};
use crate::domain::aggregates::{Cart, ProductForm};
use crate::domain::value_objects::{Money, TransactionId};
use crate::fulfillment::{OrderDesk, OrderView, ProductDesk};
use crate::gateway::{GatewayError, RemoteDataGateway};
use crate::notify::EventPublisher;
use crate::pricing::{DeliveryPolicy, Totals};
use crate::session::CartStore;
use crate::{OrderAction, OrderId, Product, ProductId, StorefrontError};

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<dyn RemoteDataGateway>,
    pub cart: Arc<Mutex<CartStore>>,
    pub checkout: Arc<Checkout>,
    pub orders: Arc<OrderDesk>,
    pub products: Arc<ProductDesk>,
}

impl AppState {
    pub fn new(gateway: Arc<dyn RemoteDataGateway>, cart: CartStore, policy: DeliveryPolicy, events: Arc<dyn EventPublisher>) -> Self {
        Self {
            cart: Arc::new(Mutex::new(cart)),
            checkout: Arc::new(Checkout::new(gateway.clone(), policy, events.clone())),
            orders: Arc::new(OrderDesk::new(gateway.clone(), events.clone())),
            products: Arc::new(ProductDesk::new(gateway.clone(), events)),
            gateway,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "imazu-storefront"})) }))
        .route("/api/v1/products", get(list_products))
        .route("/api/v1/products/:id", get(get_product))
        .route("/api/v1/cart", get(get_cart).delete(clear_cart))
        .route("/api/v1/cart/items", post(add_to_cart))
        .route("/api/v1/cart/items/:product_id", put(update_cart_item).delete(remove_cart_item))
        .route("/api/v1/checkout", post(checkout))
        .route("/api/v1/admin/orders", get(list_orders))
        .route("/api/v1/admin/orders/:id", get(get_order))
        .route("/api/v1/admin/orders/:id/verify-payment", post(verify_payment))
        .route("/api/v1/admin/orders/:id/confirm", post(confirm_order))
        .route("/api/v1/admin/orders/:id/deliver", post(mark_delivered))
        .route("/api/v1/admin/orders/:id/cancel", post(cancel_order))
        .route("/api/v1/admin/products", get(list_all_products).post(create_product))
        .route("/api/v1/admin/products/:id", put(update_product).delete(deactivate_product))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fields: Vec<&'static str>,
}

impl IntoResponse for StorefrontError {
    fn into_response(self) -> Response {
        let (status, fields) = match &self {
            Self::Validation(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.fields()),
            Self::Product(e) | Self::Gateway(GatewayError::InvalidProduct(e)) => (StatusCode::UNPROCESSABLE_ENTITY, e.fields()),
            Self::Transition(_) | Self::Gateway(GatewayError::Rejected(_)) => (StatusCode::CONFLICT, vec![]),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, vec![]),
            Self::Gateway(_) => (StatusCode::BAD_GATEWAY, vec![]),
        };
        (status, Json(ErrorBody { error: self.to_string(), fields })).into_response()
    }
}

type ApiResult<T> = Result<T, StorefrontError>;

// Catalog

async fn list_products(State(s): State<AppState>) -> ApiResult<Json<Vec<Product>>> {
    Ok(Json(s.gateway.get_active_products().await?))
}

async fn get_product(State(s): State<AppState>, Path(id): Path<ProductId>) -> ApiResult<Json<Product>> {
    Ok(Json(s.gateway.get_product(id).await?))
}

// Cart

#[derive(Debug, Serialize)]
pub struct CartLine {
    pub product: Product,
    pub quantity: u32,
    pub line_total: Money,
}

#[derive(Debug, Serialize)]
pub struct CartView {
    pub items: Vec<CartLine>,
    pub item_count: u32,
    #[serde(flatten)]
    pub totals: Totals,
}

impl CartView {
    fn new(cart: &Cart, policy: &DeliveryPolicy) -> Self {
        Self {
            items: cart.entries().iter().map(|e| CartLine { product: e.product.clone(), quantity: e.quantity.value(), line_total: e.line_total() }).collect(),
            item_count: cart.item_count(),
            totals: policy.totals(cart),
        }
    }
}

fn cart_view(s: &AppState, store: &CartStore) -> Json<CartView> { Json(CartView::new(store.cart(), s.checkout.policy())) }

async fn get_cart(State(s): State<AppState>) -> Json<CartView> {
    let store = s.cart.lock().await;
    cart_view(&s, &store)
}

async fn clear_cart(State(s): State<AppState>) -> Json<CartView> {
    let mut store = s.cart.lock().await;
    store.clear_cart();
    cart_view(&s, &store)
}

#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub product_id: ProductId,
    #[serde(default = "one")]
    pub quantity: u32,
}

fn one() -> u32 { 1 }

async fn add_to_cart(State(s): State<AppState>, Json(r): Json<AddToCartRequest>) -> ApiResult<Json<CartView>> {
    let product = s.gateway.get_product(r.product_id).await?;
    if !product.active {
        return Err(StorefrontError::NotFound(format!("product {}", product.id)));
    }
    let mut store = s.cart.lock().await;
    store.add_item(product, r.quantity);
    Ok(cart_view(&s, &store))
}

#[derive(Debug, Deserialize)]
pub struct QuantityRequest {
    pub quantity: u32,
}

async fn update_cart_item(State(s): State<AppState>, Path(id): Path<ProductId>, Json(r): Json<QuantityRequest>) -> Json<CartView> {
    let mut store = s.cart.lock().await;
    store.update_quantity(id, r.quantity);
    cart_view(&s, &store)
}

async fn remove_cart_item(State(s): State<AppState>, Path(id): Path<ProductId>) -> Json<CartView> {
    let mut store = s.cart.lock().await;
    store.remove_item(id);
    cart_view(&s, &store)
}

// Checkout

async fn checkout(State(s): State<AppState>, Json(form): Json<CheckoutForm>) -> ApiResult<(StatusCode, Json<OrderView>)> {
    let order = s.checkout.place_order(&s.cart, &form).await?;
    Ok((StatusCode::CREATED, Json(order.into())))
}

// Admin: orders

async fn list_orders(State(s): State<AppState>) -> ApiResult<Json<Vec<OrderView>>> { Ok(Json(s.orders.orders().await?)) }

async fn get_order(State(s): State<AppState>, Path(id): Path<OrderId>) -> ApiResult<Json<OrderView>> { Ok(Json(s.orders.order(id).await?)) }

#[derive(Debug, Deserialize)]
pub struct VerifyPaymentRequest {
    pub transaction_id: TransactionId,
}

async fn verify_payment(State(s): State<AppState>, Path(id): Path<OrderId>, Json(r): Json<VerifyPaymentRequest>) -> ApiResult<Json<OrderView>> {
    Ok(Json(s.orders.perform(id, OrderAction::VerifyPayment { transaction_id: r.transaction_id }).await?))
}

async fn confirm_order(State(s): State<AppState>, Path(id): Path<OrderId>) -> ApiResult<Json<OrderView>> {
    Ok(Json(s.orders.perform(id, OrderAction::ConfirmOrder).await?))
}

async fn mark_delivered(State(s): State<AppState>, Path(id): Path<OrderId>) -> ApiResult<Json<OrderView>> {
    Ok(Json(s.orders.perform(id, OrderAction::MarkDelivered).await?))
}

async fn cancel_order(State(s): State<AppState>, Path(id): Path<OrderId>) -> ApiResult<Json<OrderView>> {
    Ok(Json(s.orders.perform(id, OrderAction::CancelOrder).await?))
}

// Admin: products

async fn list_all_products(State(s): State<AppState>) -> ApiResult<Json<Vec<Product>>> { Ok(Json(s.products.products().await?)) }

async fn create_product(State(s): State<AppState>, Json(form): Json<ProductForm>) -> ApiResult<(StatusCode, Json<Product>)> {
    let draft = form.into_new_product()?;
    Ok((StatusCode::CREATED, Json(s.products.create(draft).await?)))
}

async fn update_product(State(s): State<AppState>, Path(id): Path<ProductId>, Json(form): Json<ProductForm>) -> ApiResult<Json<Product>> {
    let update = form.into_update()?;
    Ok(Json(s.products.update(id, update).await?))
}

async fn deactivate_product(State(s): State<AppState>, Path(id): Path<ProductId>) -> ApiResult<StatusCode> {
    s.products.deactivate(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
