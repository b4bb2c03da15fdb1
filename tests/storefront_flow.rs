use std::sync::Arc;
use tokio::sync::Mutex;

use imazu_storefront::checkout::{Checkout, CheckoutForm};
use imazu_storefront::domain::aggregates::{NewProduct, ProductUpdate};
use imazu_storefront::fulfillment::{OrderDesk, ProductDesk};
use imazu_storefront::gateway::{CachedGateway, InMemoryGateway, RemoteDataGateway};
use imazu_storefront::notify::LogPublisher;
use imazu_storefront::persistence::JsonFileCartPersistence;
use imazu_storefront::pricing::DeliveryPolicy;
use imazu_storefront::session::CartStore;
use imazu_storefront::{Money, OrderAction, OrderStatus, PaymentMethod, ProductId, StorefrontError, TransactionId};

fn gateway() -> Arc<dyn RemoteDataGateway> {
    let inner = InMemoryGateway::with_catalog("storefront", [
        NewProduct::new("Navigator Chronograph", "Steel bracelet", Money::new(5000), &["navigator.png".to_string()]).unwrap(),
    ]);
    Arc::new(CachedGateway::new(inner))
}

fn form() -> CheckoutForm {
    CheckoutForm {
        name: "Ayesha Khan".into(),
        phone: "+92 331 3995870".into(),
        address: "House 4, Street 9, Lahore".into(),
        payment_method: PaymentMethod::JazzCash,
        transaction_id: Some("JC-20931".into()),
    }
}

#[tokio::test]
async fn checkout_then_fulfil() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = gateway();
    let events = Arc::new(LogPublisher);
    let checkout = Checkout::new(gateway.clone(), DeliveryPolicy::default(), events.clone());
    let desk = OrderDesk::new(gateway.clone(), events);

    let store = Mutex::new(CartStore::load(Box::new(JsonFileCartPersistence::new(dir.path().join("cart.json")))));
    let product = gateway.get_product(ProductId(1)).await.unwrap();
    store.lock().await.add_item(product, 2);

    let order = checkout.place_order(&store, &form()).await.unwrap();
    assert_eq!(order.status(), OrderStatus::Pending);
    assert_eq!(order.subtotal(), Money::new(10000));
    assert_eq!(order.delivery_fee(), Money::new(200));
    assert_eq!(order.total(), Money::new(10200));
    assert_eq!(order.transaction_id().map(TransactionId::as_str), Some("JC-20931"));
    assert!(order.summary().contains("Transaction Id: JC-20931"));
    assert_eq!(store.lock().await.item_count(), 0);

    // The cleared cart is what a restart sees.
    let reloaded = CartStore::load(Box::new(JsonFileCartPersistence::new(dir.path().join("cart.json"))));
    assert!(reloaded.cart().is_empty());

    // Staff sees the new order first and can only verify or cancel it.
    let listed = desk.orders().await.unwrap();
    assert_eq!(listed[0].order.id(), order.id());
    assert_eq!(listed[0].available_actions.len(), 2);

    let err = desk.perform(order.id(), OrderAction::MarkDelivered).await.unwrap_err();
    assert!(matches!(err, StorefrontError::Transition(_)));

    for action in [OrderAction::VerifyPayment { transaction_id: TransactionId::new("JC-20931").unwrap() }, OrderAction::ConfirmOrder, OrderAction::MarkDelivered] {
        desk.perform(order.id(), action).await.unwrap();
    }
    let delivered = desk.order(order.id()).await.unwrap();
    assert_eq!(delivered.order.status(), OrderStatus::Delivered);
    assert!(delivered.order.status().is_terminal());
}

#[tokio::test]
async fn orders_keep_historical_prices() {
    let gateway = gateway();
    let events = Arc::new(LogPublisher);
    let checkout = Checkout::new(gateway.clone(), DeliveryPolicy::default(), events.clone());
    let products = ProductDesk::new(gateway.clone(), events.clone());
    let desk = OrderDesk::new(gateway.clone(), events);

    let store = Mutex::new(CartStore::load(Box::new(imazu_storefront::persistence::MemoryCartPersistence::new())));
    store.lock().await.add_item(gateway.get_product(ProductId(1)).await.unwrap(), 1);
    let order = checkout.place_order(&store, &form()).await.unwrap();

    products.update(ProductId(1), ProductUpdate::new("Navigator Chronograph", "", Money::new(6500), &[], true).unwrap()).await.unwrap();
    assert_eq!(gateway.get_product(ProductId(1)).await.unwrap().price, Money::new(6500));

    let stored = desk.order(order.id()).await.unwrap();
    assert_eq!(stored.order.line_items()[0].price, Money::new(5000));
    assert_eq!(stored.order.total(), Money::new(5200));
}
