//! iMazu Storefront - watch retailer storefront and back office

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use imazu_storefront::api::{self, AppState};
use imazu_storefront::config::Config;
use imazu_storefront::gateway::{CachedGateway, InMemoryGateway, PgGateway, RemoteDataGateway};
use imazu_storefront::notify::{EventPublisher, LogPublisher, NatsPublisher};
use imazu_storefront::persistence::JsonFileCartPersistence;
use imazu_storefront::session::CartStore;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();
    let config = Config::from_env()?;

    let gateway: Arc<dyn RemoteDataGateway> = match &config.database_url {
        Some(url) => {
            let db = PgPoolOptions::new().max_connections(10).connect(url).await?;
            let pg = PgGateway::new(db, config.principal.clone());
            pg.migrate().await?;
            tracing::info!("using postgres gateway");
            Arc::new(CachedGateway::new(pg))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; orders and products are kept in memory");
            Arc::new(CachedGateway::new(InMemoryGateway::new(config.principal.clone())))
        }
    };

    let events: Arc<dyn EventPublisher> = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Arc::new(NatsPublisher::new(client, config.nats_subject_prefix.clone())),
            Err(e) => {
                tracing::warn!(error = %e, "could not connect to NATS; events will not be published");
                Arc::new(LogPublisher)
            }
        },
        None => Arc::new(LogPublisher),
    };

    let mut cart = CartStore::load(Box::new(JsonFileCartPersistence::new(config.cart_path.clone())));
    cart.rehydrate(gateway.as_ref()).await;
    tracing::info!(items = cart.item_count(), "cart restored");

    let state = AppState::new(gateway, cart, config.delivery_policy(), events);
    let app = api::router(state).layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive());

    tracing::info!("iMazu storefront listening on 0.0.0.0:{}", config.port);
    axum::serve(tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?, app).await?;
    Ok(())
}
