pub mod auth;
pub mod clients;
pub mod db;
pub mod error;
pub mod handlers;
pub mod ical;
pub mod ledger;
pub mod models;
pub mod openapi;
pub mod prices;
pub mod settings;
pub mod staff;
pub mod validation;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post, put},
};
use handlers::{
    add_client, add_employee, add_price, book_session, change_password, create_session,
    delete_client, delete_employee, get_schedule, get_schedule_ical, healthz_live, healthz_ready,
    list_clients, list_employees, list_membership_types, list_prices, list_trainers,
    my_attendance, register_client, root, search_clients, search_employees, update_client,
    update_free_spots, update_price,
};
use sqlx::SqlitePool;
use tower_http::LatencyUnit;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{Level, info, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::clients::ClientRegistry;
use crate::ical::ICalExporter;
use crate::ledger::BookingLedger;
use crate::openapi::ApiDoc;
use crate::prices::PriceList;
use crate::settings::Settings;
use crate::staff::StaffRoster;

#[derive(Clone)]
pub struct AppState {
    pub(crate) settings: Settings,
    pub(crate) pool: SqlitePool,
    pub(crate) ledger: Arc<BookingLedger>,
    pub(crate) clients: Arc<ClientRegistry>,
    pub(crate) staff: Arc<StaffRoster>,
    pub(crate) prices: Arc<PriceList>,
    pub(crate) exporter: Arc<ICalExporter>,
}

impl AppState {
    pub fn new(settings: Settings, pool: SqlitePool) -> Self {
        let exporter = ICalExporter::new(
            settings.studio_name.clone(),
            settings.studio_location.clone(),
        );
        Self {
            ledger: Arc::new(BookingLedger::new(pool.clone())),
            clients: Arc::new(ClientRegistry::new(pool.clone())),
            staff: Arc::new(StaffRoster::new(pool.clone())),
            prices: Arc::new(PriceList::new(pool.clone())),
            exporter: Arc::new(exporter),
            settings,
            pool,
        }
    }
}

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env()?;

    let env_filter = if settings.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .without_time()
        .init();

    if settings.admin_password_hash.is_none() {
        warn!("APP_ADMIN_PASSWORD_HASH is not set; administrator endpoints will reject every request");
    }

    let pool = db::connect(&settings.database_url).await?;
    let state = AppState::new(settings, pool);

    let app = build_router(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], state.settings.port));
    info!("Starting Studio Booking API on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(
            DefaultOnResponse::new()
                .level(Level::INFO)
                .latency_unit(LatencyUnit::Millis),
        );

    let mut router = Router::new()
        .route("/", get(root))
        .route("/healthz/live", get(healthz_live))
        .route("/healthz/ready", get(healthz_ready))
        .route("/schedule", get(get_schedule).post(create_session))
        .route("/schedule.ical", get(get_schedule_ical))
        .route("/schedule/{id}/free-spots", put(update_free_spots))
        .route("/schedule/{id}/book", post(book_session))
        .route("/register", post(register_client))
        .route("/me/attendance", get(my_attendance))
        .route("/me/password", put(change_password))
        .route("/clients", get(list_clients).post(add_client))
        .route("/clients/search", get(search_clients))
        .route("/clients/{id}", put(update_client).delete(delete_client))
        .route("/employees", get(list_employees).post(add_employee))
        .route("/employees/search", get(search_employees))
        .route("/employees/{id}", delete(delete_employee))
        .route("/trainers", get(list_trainers))
        .route("/prices", get(list_prices).post(add_price))
        .route("/membership-types", get(list_membership_types))
        .route("/prices/{membership_type}", put(update_price))
        .with_state(state.clone());

    if state.settings.enable_swagger {
        let openapi = ApiDoc::openapi();
        let swagger = SwaggerUi::new("/docs").url("/openapi.json", openapi);
        router = router.merge(swagger);
    }

    router.layer(trace_layer)
}
