//! Postgres-backed gateway.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use std::collections::HashMap;

use super::{GatewayError, RemoteDataGateway};
use crate::domain::aggregates::order::OrderRequest;
use crate::domain::aggregates::{NewProduct, Order, OrderAction, OrderStatus, Product, ProductUpdate};
use crate::domain::value_objects::{Money, Quantity, TransactionId};
use crate::{CustomerInfo, LineItem, OrderId, PaymentMethod, ProductId};

const ORDER_COLUMNS: &str = "id, status, subtotal, delivery_fee, payment_method, transaction_id, customer_name, customer_phone, customer_address, created_by, created_at";

#[derive(Debug, Clone)]
pub struct PgGateway {
    db: PgPool,
    principal: String,
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRow { id: i64, name: String, description: String, price: i64, images: Vec<String>, active: bool }

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i64,
    status: String,
    subtotal: i64,
    delivery_fee: i64,
    payment_method: String,
    transaction_id: Option<String>,
    customer_name: String,
    customer_phone: String,
    customer_address: String,
    created_by: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct LineItemRow { order_id: i64, product_id: i64, quantity: i32, price: i64 }

impl PgGateway {
    pub fn new(db: PgPool, principal: impl Into<String>) -> Self { Self { db, principal: principal.into() } }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> { sqlx::migrate!("./migrations").run(&self.db).await }

    async fn transition(&self, id: OrderId, action: OrderAction) -> Result<(), GatewayError> {
        let mut tx = self.db.begin().await?;
        let mut order = load_order(&mut tx, id, true).await?;
        order.apply(&action)?;
        sqlx::query("UPDATE orders SET status = $2, transaction_id = $3 WHERE id = $1")
            .bind(to_db_id(id.0)?).bind(order.status().as_str()).bind(order.transaction_id().map(TransactionId::as_str))
            .execute(&mut *tx).await?;
        tx.commit().await?;
        tracing::debug!(order_id = %id, status = %order.status(), "order status stored");
        Ok(())
    }
}

async fn load_order(conn: &mut PgConnection, id: OrderId, for_update: bool) -> Result<Order, GatewayError> {
    let lock = if for_update { " FOR UPDATE" } else { "" };
    let row = sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1{lock}"))
        .bind(to_db_id(id.0)?).fetch_optional(&mut *conn).await?.ok_or(GatewayError::OrderNotFound(id))?;
    let items = sqlx::query_as::<_, LineItemRow>("SELECT order_id, product_id, quantity, price FROM order_line_items WHERE order_id = $1 ORDER BY position")
        .bind(row.id).fetch_all(&mut *conn).await?;
    row.into_order(items)
}

#[async_trait]
impl RemoteDataGateway for PgGateway {
    async fn create_order(&self, request: OrderRequest) -> Result<Order, GatewayError> {
        let mut tx = self.db.begin().await?;
        let (id, created_at): (i64, DateTime<Utc>) = sqlx::query_as(
            "INSERT INTO orders (status, subtotal, delivery_fee, total, payment_method, transaction_id, customer_name, customer_phone, customer_address, created_by, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW()) RETURNING id, created_at")
            .bind(OrderStatus::Pending.as_str())
            .bind(to_db_amount(request.subtotal)?).bind(to_db_amount(request.delivery_fee)?).bind(to_db_amount(request.total())?)
            .bind(request.payment_method.as_str())
            .bind(request.transaction_id.as_ref().filter(|_| request.payment_method.is_manual()).map(TransactionId::as_str))
            .bind(&request.customer.name).bind(&request.customer.phone).bind(&request.customer.address)
            .bind(&self.principal)
            .fetch_one(&mut *tx).await?;
        for (position, item) in request.line_items.iter().enumerate() {
            sqlx::query("INSERT INTO order_line_items (order_id, position, product_id, quantity, price) VALUES ($1, $2, $3, $4, $5)")
                .bind(id).bind(i32::try_from(position).map_err(|_| GatewayError::Corrupt("too many line items".into()))?)
                .bind(to_db_id(item.product_id.0)?).bind(item.quantity.value() as i32).bind(to_db_amount(item.price)?)
                .execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(Order::restore(OrderId(from_db_id(id)?), OrderStatus::Pending, request, self.principal.clone(), created_at))
    }

    async fn get_order(&self, id: OrderId) -> Result<Order, GatewayError> {
        let mut conn = self.db.acquire().await?;
        load_order(&mut conn, id, false).await
    }

    async fn get_all_orders(&self) -> Result<Vec<Order>, GatewayError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC"))
            .fetch_all(&self.db).await?;
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let mut items: HashMap<i64, Vec<LineItemRow>> = HashMap::new();
        for item in sqlx::query_as::<_, LineItemRow>("SELECT order_id, product_id, quantity, price FROM order_line_items WHERE order_id = ANY($1) ORDER BY order_id, position")
            .bind(&ids).fetch_all(&self.db).await?
        {
            items.entry(item.order_id).or_default().push(item);
        }
        rows.into_iter().map(|row| { let lines = items.remove(&row.id).unwrap_or_default(); row.into_order(lines) }).collect()
    }

    async fn get_active_products(&self) -> Result<Vec<Product>, GatewayError> {
        sqlx::query_as::<_, ProductRow>("SELECT id, name, description, price, images, active FROM products WHERE active ORDER BY id")
            .fetch_all(&self.db).await?.into_iter().map(ProductRow::into_product).collect()
    }

    async fn get_all_products(&self) -> Result<Vec<Product>, GatewayError> {
        sqlx::query_as::<_, ProductRow>("SELECT id, name, description, price, images, active FROM products ORDER BY id")
            .fetch_all(&self.db).await?.into_iter().map(ProductRow::into_product).collect()
    }

    async fn get_product(&self, id: ProductId) -> Result<Product, GatewayError> {
        sqlx::query_as::<_, ProductRow>("SELECT id, name, description, price, images, active FROM products WHERE id = $1")
            .bind(to_db_id(id.0)?).fetch_optional(&self.db).await?.ok_or(GatewayError::ProductNotFound(id))?.into_product()
    }

    async fn verify_payment(&self, id: OrderId, transaction_id: TransactionId) -> Result<(), GatewayError> {
        self.transition(id, OrderAction::VerifyPayment { transaction_id }).await
    }

    async fn confirm_order(&self, id: OrderId) -> Result<(), GatewayError> { self.transition(id, OrderAction::ConfirmOrder).await }

    async fn mark_order_delivered(&self, id: OrderId) -> Result<(), GatewayError> { self.transition(id, OrderAction::MarkDelivered).await }

    async fn cancel_order(&self, id: OrderId) -> Result<(), GatewayError> { self.transition(id, OrderAction::CancelOrder).await }

    async fn create_product(&self, product: NewProduct) -> Result<Product, GatewayError> {
        sqlx::query_as::<_, ProductRow>("INSERT INTO products (name, description, price, images, active) VALUES ($1, $2, $3, $4, TRUE) RETURNING id, name, description, price, images, active")
            .bind(&product.name).bind(&product.description).bind(to_db_amount(product.price)?).bind(&product.images)
            .fetch_one(&self.db).await?.into_product()
    }

    async fn update_product(&self, id: ProductId, update: ProductUpdate) -> Result<Product, GatewayError> {
        sqlx::query_as::<_, ProductRow>("UPDATE products SET name = $2, description = $3, price = $4, images = $5, active = $6, updated_at = NOW() WHERE id = $1 RETURNING id, name, description, price, images, active")
            .bind(to_db_id(id.0)?).bind(&update.name).bind(&update.description).bind(to_db_amount(update.price)?).bind(&update.images).bind(update.active)
            .fetch_optional(&self.db).await?.ok_or(GatewayError::ProductNotFound(id))?.into_product()
    }

    async fn deactivate_product(&self, id: ProductId) -> Result<(), GatewayError> {
        let done = sqlx::query("UPDATE products SET active = FALSE, updated_at = NOW() WHERE id = $1").bind(to_db_id(id.0)?).execute(&self.db).await?;
        if done.rows_affected() == 0 { return Err(GatewayError::ProductNotFound(id)); }
        Ok(())
    }
}

impl ProductRow {
    fn into_product(self) -> Result<Product, GatewayError> {
        Ok(Product { id: ProductId(from_db_id(self.id)?), name: self.name, description: self.description, price: from_db_amount(self.price)?, images: self.images, active: self.active })
    }
}

impl OrderRow {
    fn into_order(self, items: Vec<LineItemRow>) -> Result<Order, GatewayError> {
        let status: OrderStatus = self.status.parse().map_err(|e| GatewayError::Corrupt(format!("order {}: {e}", self.id)))?;
        let payment_method: PaymentMethod = self.payment_method.parse().map_err(|e| GatewayError::Corrupt(format!("order {}: {e}", self.id)))?;
        let line_items = items.into_iter().map(LineItemRow::into_line_item).collect::<Result<Vec<_>, _>>()?;
        let request = OrderRequest {
            customer: CustomerInfo { name: self.customer_name, phone: self.customer_phone, address: self.customer_address },
            line_items,
            subtotal: from_db_amount(self.subtotal)?,
            delivery_fee: from_db_amount(self.delivery_fee)?,
            payment_method,
            transaction_id: TransactionId::parse_optional(self.transaction_id.as_deref()),
        };
        Ok(Order::restore(OrderId(from_db_id(self.id)?), status, request, self.created_by, self.created_at))
    }
}

impl LineItemRow {
    fn into_line_item(self) -> Result<LineItem, GatewayError> {
        let quantity = u32::try_from(self.quantity).ok().and_then(Quantity::clamped)
            .ok_or_else(|| GatewayError::Corrupt(format!("order {}: quantity {}", self.order_id, self.quantity)))?;
        Ok(LineItem { product_id: ProductId(from_db_id(self.product_id)?), quantity, price: from_db_amount(self.price)? })
    }
}

fn to_db_id(id: u64) -> Result<i64, GatewayError> { i64::try_from(id).map_err(|_| GatewayError::Corrupt(format!("id {id} out of range"))) }
fn from_db_id(id: i64) -> Result<u64, GatewayError> { u64::try_from(id).map_err(|_| GatewayError::Corrupt(format!("negative id {id}"))) }
fn to_db_amount(m: Money) -> Result<i64, GatewayError> { i64::try_from(m.amount()).map_err(|_| GatewayError::Corrupt(format!("amount {m} out of range"))) }
fn from_db_amount(v: i64) -> Result<Money, GatewayError> { u64::try_from(v).map(Money::new).map_err(|_| GatewayError::Corrupt(format!("negative amount {v}"))) }

#[cfg(test)]
mod tests {
    use super::*;

    fn order_row(status: &str, method: &str, tx: Option<&str>) -> OrderRow {
        OrderRow {
            id: 11, status: status.into(), subtotal: 10000, delivery_fee: 200, payment_method: method.into(),
            transaction_id: tx.map(str::to_string), customer_name: "Hina".into(), customer_phone: "0300".into(),
            customer_address: "Quetta".into(), created_by: "storefront".into(), created_at: Utc::now(),
        }
    }

    #[test]
    fn test_order_row_converts() {
        let items = vec![LineItemRow { order_id: 11, product_id: 3, quantity: 2, price: 5000 }];
        let order = order_row("paymentVerified", "easyPaisa", Some("TX-5")).into_order(items).unwrap();
        assert_eq!(order.id(), OrderId(11));
        assert_eq!(order.status(), OrderStatus::PaymentVerified);
        assert_eq!(order.total(), Money::new(10200));
        assert_eq!(order.line_items()[0].line_total(), Money::new(10000));
        assert_eq!(order.transaction_id().map(TransactionId::as_str), Some("TX-5"));
    }

    #[test]
    fn test_unknown_status_is_corrupt() {
        let err = order_row("shipped", "cashOnDelivery", None).into_order(vec![]).unwrap_err();
        assert!(matches!(err, GatewayError::Corrupt(_)));
    }

    #[test]
    fn test_out_of_range_quantity_is_corrupt() {
        let row = LineItemRow { order_id: 1, product_id: 1, quantity: 0, price: 1 };
        assert!(matches!(row.into_line_item(), Err(GatewayError::Corrupt(_))));
    }

    #[test]
    fn test_negative_price_is_corrupt() {
        let row = ProductRow { id: 1, name: "Diver".into(), description: String::new(), price: -5, images: vec![], active: true };
        assert!(matches!(row.into_product(), Err(GatewayError::Corrupt(_))));
    }
}
