use std::time::Duration;

use actix_cors::Cors;
use actix_web::{
    dev::Server,
    http::{header, KeepAlive},
    middleware::{DefaultHeaders, Logger},
    web,
    App,
    HttpServer,
};
use checkout_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    OrderFlowApi,
    ReconciliationApi,
    SqliteDatabase,
};
use log::*;
use momo_gateway::{HostedCheckoutProvider, UssdPushProvider};

use crate::{
    config::{ServerConfig, WEBHOOK_SIGNATURE_HEADER},
    errors::ServerError,
    expiry_worker::start_expiry_worker,
    middleware::HmacMiddlewareFactory,
    payments::PaymentApi,
    poller::PollerSettings,
    routes::{health, webhook, CancelOrderRoute, CheckoutRoute, OrderByIdRoute, PaymentRoute},
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    // No hooks are wired by default; deployments add webhook or notification hooks here.
    let handlers = EventHandlers::new(128, EventHooks::default());
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let _expiry = if config.disable_expiry_worker {
        info!("🕰️ The expiry worker is disabled on this instance.");
        None
    } else {
        Some(start_expiry_worker(
            db.clone(),
            producers.clone(),
            config.expiry_check_interval_seconds,
            config.unpaid_order_timeout,
        ))
    };
    let srv = create_server_instance(config, db, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let ussd = UssdPushProvider::new(config.ussd.clone())
        .map_err(|e| ServerError::InitializeError(format!("Could not construct the USSD push client: {e}")))?;
    let hosted = HostedCheckoutProvider::new(config.hosted.clone())
        .map_err(|e| ServerError::InitializeError(format!("Could not construct the hosted checkout client: {e}")))?;
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        let orders_api = OrderFlowApi::new(db.clone(), producers.clone());
        let reconciliation_api = ReconciliationApi::new(db.clone(), producers.clone());
        let payments_api = PaymentApi::new(
            db.clone(),
            ussd.clone(),
            hosted.clone(),
            ReconciliationApi::new(db.clone(), producers.clone()),
        );
        let poller = PollerSettings { attempts: config.poll_attempts, interval_seconds: config.poll_interval_seconds };
        let cors = build_cors(&config.cors);
        let webhook_resource = web::resource("/webhook")
            .wrap(HmacMiddlewareFactory::new(WEBHOOK_SIGNATURE_HEADER, config.webhook_secret.clone()))
            .route(web::post().to(webhook::<SqliteDatabase>));
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("mkt::access_log"))
            .wrap(cors)
            .wrap(cors_fallback(&config.cors))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(reconciliation_api))
            .app_data(web::Data::new(payments_api))
            .app_data(web::Data::new(poller))
            .service(health)
            .service(CheckoutRoute::<SqliteDatabase, UssdPushProvider, HostedCheckoutProvider>::new())
            .service(PaymentRoute::<SqliteDatabase, UssdPushProvider, HostedCheckoutProvider>::new())
            .service(OrderByIdRoute::<SqliteDatabase>::new())
            .service(CancelOrderRoute::<SqliteDatabase>::new())
            .service(webhook_resource)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}

/// Builds the CORS layer from the configured allow-list. The canonical frontend origin is always allowed and a
/// wildcard is never emitted.
fn build_cors(config: &crate::config::CorsConfig) -> Cors {
    let cors_config = config.clone();
    debug!(
        "🌐️ CORS allows {} plus {} configured origin(s)",
        cors_config.canonical_origin,
        cors_config.allowed_origins.len()
    );
    Cors::default()
        .allowed_origin_fn(move |origin, _req_head| {
            origin.to_str().map(|o| cors_config.is_allowed(o)).unwrap_or(false)
        })
        .allowed_methods(vec!["GET", "POST"])
        .allowed_headers(vec!["Content-Type", "Accept", WEBHOOK_SIGNATURE_HEADER])
        // Mismatched origins are not rejected here; they pass through and the fallback layer sets the header.
        .block_on_origin_mismatch(false)
        .max_age(3600)
}

/// Wrapped outside the CORS layer. When an origin is not in the allow-list, the CORS layer omits
/// `Access-Control-Allow-Origin` and this layer fills in the canonical production origin instead, so the header is
/// always present and never a wildcard.
fn cors_fallback(config: &crate::config::CorsConfig) -> DefaultHeaders {
    DefaultHeaders::new().add((header::ACCESS_CONTROL_ALLOW_ORIGIN, config.canonical_origin.as_str()))
}

#[cfg(test)]
mod test {
    use actix_web::{http::header, test, web, App, HttpResponse};

    use super::{build_cors, cors_fallback};
    use crate::config::CorsConfig;

    fn cors_config() -> CorsConfig {
        CorsConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
            canonical_origin: "https://shop.example.co.tz".to_string(),
        }
    }

    #[actix_web::test]
    async fn allowed_origins_are_echoed_back() {
        let config = cors_config();
        let app = test::init_service(
            App::new()
                .wrap(build_cors(&config))
                .wrap(cors_fallback(&config))
                .route("/ping", web::get().to(|| async { HttpResponse::Ok().body("pong") })),
        )
        .await;
        let req = test::TestRequest::get()
            .uri("/ping")
            .insert_header((header::ORIGIN, "http://localhost:3000"))
            .to_request();
        let res = test::call_service(&app, req).await;
        let allow = res.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).expect("Header must be present");
        assert_eq!(allow, "http://localhost:3000");
    }

    #[actix_web::test]
    async fn disallowed_origins_fall_back_to_the_canonical_origin() {
        let config = cors_config();
        let app = test::init_service(
            App::new()
                .wrap(build_cors(&config))
                .wrap(cors_fallback(&config))
                .route("/ping", web::get().to(|| async { HttpResponse::Ok().body("pong") })),
        )
        .await;
        let req = test::TestRequest::get()
            .uri("/ping")
            .insert_header((header::ORIGIN, "https://evil.example.com"))
            .to_request();
        let res = test::call_service(&app, req).await;
        let allow = res.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).expect("Header must be present");
        assert_eq!(allow, "https://shop.example.co.tz");
    }
}
