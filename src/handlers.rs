use axum::extract::{Path, Query, State};
use axum::{Json, http::StatusCode, response::IntoResponse};
use axum_extra::extract::TypedHeader;
use axum_extra::headers::{Authorization, authorization::Basic};
use chrono::{Datelike, Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::{IntoParams, ToSchema};

use crate::{
    AppState,
    auth::{verify_admin, verify_client},
    db::{self, StoreError},
    error::ApiError,
    models::{
        Attendance, ClassSession, Client, DayOfWeek, Employee, NewEmployee, NewSession,
        PriceEntry, SessionId, Trainer,
    },
    validation,
};

type BasicAuth = Option<TypedHeader<Authorization<Basic>>>;

fn credentials(auth: BasicAuth) -> Option<Authorization<Basic>> {
    auth.map(|TypedHeader(a)| a)
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ScheduleQuery {
    /// Day code (`Пн` … `Вс`) or English short name
    pub day: Option<String>,
    /// Monday of the exported week, defaults to the current week
    pub week: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct FreeSpotsUpdate {
    pub free_spots: u32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BookingResponse {
    pub session_id: SessionId,
    pub booked: bool,
    pub message: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub full_name: String,
    pub phone: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PasswordChange {
    pub new_password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ClientForm {
    pub full_name: String,
    pub phone: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NewPrice {
    pub membership_type: String,
    pub price: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PriceUpdate {
    pub price: i64,
}

fn parse_day(raw: Option<&str>) -> Result<Option<DayOfWeek>, ApiError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(day) => day.parse().map(Some).map_err(ApiError::BadRequest),
    }
}

/// The week's events run up to the following Monday, so that day must be
/// representable too.
fn week_monday(week: Option<NaiveDate>) -> Result<NaiveDate, ApiError> {
    match week {
        Some(date) if date.weekday().num_days_from_monday() != 0 => {
            Err(ApiError::BadRequest("week must be a Monday".into()))
        }
        Some(date) if date.checked_add_signed(Duration::days(7)).is_none() => {
            Err(ApiError::BadRequest("week is out of range".into()))
        }
        Some(date) => Ok(date),
        None => {
            let today = Local::now().date_naive();
            Ok(today - Duration::days(today.weekday().num_days_from_monday() as i64))
        }
    }
}

#[utoipa::path(get, path = "/", tag = "studio")]
pub async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "Studio Booking API",
        "endpoints": {
            "/schedule": "Weekly class schedule as JSON",
            "/schedule.ical": "Weekly class schedule as iCal file",
            "/schedule/{id}/book": "Book a spot (client login)",
            "/trainers": "Studio trainers",
            "/prices": "Membership price list",
            "/register": "Create a client account"
        }
    }))
}

#[utoipa::path(get, path = "/healthz/live", tag = "studio")]
pub async fn healthz_live() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

#[utoipa::path(
    get,
    path = "/healthz/ready",
    responses(
        (status = 200, description = "Database reachable"),
        (status = 503, description = "Database unavailable")
    ),
    tag = "studio"
)]
pub async fn healthz_ready(State(state): State<AppState>) -> impl IntoResponse {
    match db::ping(&state.pool).await {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({"status": "ok"}))),
        Err(err) => {
            warn!(error = %err, "readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({"status": "unavailable"})),
            )
        }
    }
}

#[utoipa::path(
    get,
    path = "/schedule",
    params(ScheduleQuery),
    responses(
        (status = 200, description = "Sessions, Monday first, then by start time", body = [ClassSession]),
        (status = 400, description = "Unknown day")
    ),
    tag = "schedule"
)]
pub async fn get_schedule(
    State(state): State<AppState>,
    Query(query): Query<ScheduleQuery>,
) -> Result<Json<Vec<ClassSession>>, ApiError> {
    let day = parse_day(query.day.as_deref())?;
    let sessions = state.ledger.list_sessions(day).await?;
    Ok(Json(sessions))
}

#[utoipa::path(
    get,
    path = "/schedule.ical",
    params(ScheduleQuery),
    responses(
        (status = 200, description = "iCal file", content_type = "text/calendar"),
        (status = 400, description = "Unknown day or week is not a Monday"),
        (status = 404, description = "No classes scheduled")
    ),
    tag = "schedule"
)]
pub async fn get_schedule_ical(
    State(state): State<AppState>,
    Query(query): Query<ScheduleQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let day = parse_day(query.day.as_deref())?;
    let monday = week_monday(query.week)?;

    let sessions = state.ledger.list_sessions(day).await?;
    if sessions.is_empty() {
        return Err(ApiError::NotFound("No classes scheduled".into()));
    }

    let body = state.exporter.generate(&sessions, monday);
    Ok((
        StatusCode::OK,
        [
            ("content-type", "text/calendar"),
            (
                "content-disposition",
                "attachment; filename=studio_schedule.ics",
            ),
        ],
        body,
    ))
}

#[utoipa::path(
    post,
    path = "/schedule",
    request_body = NewSession,
    responses(
        (status = 201, description = "Session created", body = ClassSession),
        (status = 400, description = "Invalid capacity"),
        (status = 401, description = "Administrator login required"),
        (status = 404, description = "Instructor not on staff")
    ),
    security(("basic_auth" = [])),
    tag = "schedule"
)]
pub async fn create_session(
    State(state): State<AppState>,
    auth: BasicAuth,
    Json(new): Json<NewSession>,
) -> Result<impl IntoResponse, ApiError> {
    verify_admin(&state.settings, credentials(auth))?;
    validation::validate_capacity(new.capacity)?;
    validation::validate_full_name(&new.instructor_name)?;

    let session = state.ledger.create_session(&new).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

#[utoipa::path(
    put,
    path = "/schedule/{id}/free-spots",
    params(("id" = i64, Path, description = "Session id")),
    request_body = FreeSpotsUpdate,
    responses(
        (status = 200, description = "Updated session", body = ClassSession),
        (status = 400, description = "Above the session's total capacity"),
        (status = 401, description = "Administrator login required"),
        (status = 404, description = "No such session")
    ),
    security(("basic_auth" = [])),
    tag = "schedule"
)]
pub async fn update_free_spots(
    State(state): State<AppState>,
    auth: BasicAuth,
    Path(session_id): Path<SessionId>,
    Json(update): Json<FreeSpotsUpdate>,
) -> Result<Json<ClassSession>, ApiError> {
    verify_admin(&state.settings, credentials(auth))?;
    state
        .ledger
        .set_capacity(session_id, update.free_spots)
        .await?;
    let session = state.ledger.get_session(session_id).await?;
    Ok(Json(session))
}

#[utoipa::path(
    post,
    path = "/schedule/{id}/book",
    params(("id" = i64, Path, description = "Session id")),
    responses(
        (status = 200, description = "Spot booked", body = BookingResponse),
        (status = 401, description = "Client login required"),
        (status = 404, description = "Booking unavailable"),
        (status = 409, description = "No free spots left")
    ),
    security(("basic_auth" = [])),
    tag = "schedule"
)]
pub async fn book_session(
    State(state): State<AppState>,
    auth: BasicAuth,
    Path(session_id): Path<SessionId>,
) -> Result<Json<BookingResponse>, ApiError> {
    let client = verify_client(&state, credentials(auth)).await?;

    let booked = match state.ledger.book_for_client(session_id, client.id).await {
        Ok(booked) => booked,
        Err(StoreError::NotFound(_)) => {
            return Err(ApiError::NotFound("Booking unavailable".into()));
        }
        Err(err) => return Err(err.into()),
    };

    if !booked {
        return Err(ApiError::Conflict("No free spots left for this class".into()));
    }
    Ok(Json(BookingResponse {
        session_id,
        booked,
        message: "You are booked for the class".into(),
    }))
}

#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = Client),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Phone number already registered")
    ),
    tag = "clients"
)]
pub async fn register_client(
    State(state): State<AppState>,
    Json(form): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validation::validate_full_name(&form.full_name)?;
    validation::validate_phone(&form.phone)?;
    validation::validate_password(&form.password)?;
    if form.password != form.confirm_password {
        return Err(ApiError::BadRequest("passwords do not match".into()));
    }

    let client = state
        .clients
        .register(form.full_name.trim(), &form.phone, &form.password)
        .await?;
    Ok((StatusCode::CREATED, Json(client)))
}

#[utoipa::path(
    get,
    path = "/me/attendance",
    responses(
        (status = 200, description = "Booked classes, newest first", body = [Attendance]),
        (status = 401, description = "Client login required")
    ),
    security(("basic_auth" = [])),
    tag = "clients"
)]
pub async fn my_attendance(
    State(state): State<AppState>,
    auth: BasicAuth,
) -> Result<Json<Vec<Attendance>>, ApiError> {
    let client = verify_client(&state, credentials(auth)).await?;
    let history = state.clients.attendance(client.id).await?;
    Ok(Json(history))
}

#[utoipa::path(
    put,
    path = "/me/password",
    request_body = PasswordChange,
    responses(
        (status = 204, description = "Password changed"),
        (status = 400, description = "Password too short or too long"),
        (status = 401, description = "Client login required")
    ),
    security(("basic_auth" = [])),
    tag = "clients"
)]
pub async fn change_password(
    State(state): State<AppState>,
    auth: BasicAuth,
    Json(change): Json<PasswordChange>,
) -> Result<StatusCode, ApiError> {
    let client = verify_client(&state, credentials(auth)).await?;
    validation::validate_password(&change.new_password)?;
    state
        .clients
        .change_password(client.id, &change.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/clients",
    responses(
        (status = 200, description = "All clients by name", body = [Client]),
        (status = 401, description = "Administrator login required")
    ),
    security(("basic_auth" = [])),
    tag = "clients"
)]
pub async fn list_clients(
    State(state): State<AppState>,
    auth: BasicAuth,
) -> Result<Json<Vec<Client>>, ApiError> {
    verify_admin(&state.settings, credentials(auth))?;
    Ok(Json(state.clients.list().await?))
}

#[utoipa::path(
    post,
    path = "/clients",
    request_body = ClientForm,
    responses(
        (status = 201, description = "Client added", body = Client),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Administrator login required"),
        (status = 409, description = "Phone number already registered")
    ),
    security(("basic_auth" = [])),
    tag = "clients"
)]
pub async fn add_client(
    State(state): State<AppState>,
    auth: BasicAuth,
    Json(form): Json<ClientForm>,
) -> Result<impl IntoResponse, ApiError> {
    verify_admin(&state.settings, credentials(auth))?;
    validation::validate_full_name(&form.full_name)?;
    validation::validate_phone(&form.phone)?;
    let client = state.clients.add(form.full_name.trim(), &form.phone).await?;
    Ok((StatusCode::CREATED, Json(client)))
}

#[utoipa::path(
    put,
    path = "/clients/{id}",
    params(("id" = i64, Path, description = "Client id")),
    request_body = ClientForm,
    responses(
        (status = 200, description = "Client updated", body = Client),
        (status = 401, description = "Administrator login required"),
        (status = 404, description = "No such client"),
        (status = 409, description = "Phone number already registered")
    ),
    security(("basic_auth" = [])),
    tag = "clients"
)]
pub async fn update_client(
    State(state): State<AppState>,
    auth: BasicAuth,
    Path(client_id): Path<i64>,
    Json(form): Json<ClientForm>,
) -> Result<Json<Client>, ApiError> {
    verify_admin(&state.settings, credentials(auth))?;
    validation::validate_full_name(&form.full_name)?;
    validation::validate_phone(&form.phone)?;
    let client = state
        .clients
        .update(client_id, form.full_name.trim(), &form.phone)
        .await?;
    Ok(Json(client))
}

#[utoipa::path(
    delete,
    path = "/clients/{id}",
    params(("id" = i64, Path, description = "Client id")),
    responses(
        (status = 204, description = "Client deleted"),
        (status = 401, description = "Administrator login required"),
        (status = 404, description = "No such client")
    ),
    security(("basic_auth" = [])),
    tag = "clients"
)]
pub async fn delete_client(
    State(state): State<AppState>,
    auth: BasicAuth,
    Path(client_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    verify_admin(&state.settings, credentials(auth))?;
    state.clients.delete(client_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/clients/search",
    params(SearchQuery),
    responses(
        (status = 200, description = "Clients whose name contains the query", body = [Client]),
        (status = 401, description = "Administrator login required")
    ),
    security(("basic_auth" = [])),
    tag = "clients"
)]
pub async fn search_clients(
    State(state): State<AppState>,
    auth: BasicAuth,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Client>>, ApiError> {
    verify_admin(&state.settings, credentials(auth))?;
    let found = state
        .clients
        .search(query.q.as_deref().unwrap_or_default())
        .await?;
    Ok(Json(found))
}

#[utoipa::path(
    get,
    path = "/employees",
    responses(
        (status = 200, description = "All employees by name", body = [Employee]),
        (status = 401, description = "Administrator login required")
    ),
    security(("basic_auth" = [])),
    tag = "staff"
)]
pub async fn list_employees(
    State(state): State<AppState>,
    auth: BasicAuth,
) -> Result<Json<Vec<Employee>>, ApiError> {
    verify_admin(&state.settings, credentials(auth))?;
    Ok(Json(state.staff.list().await?))
}

#[utoipa::path(
    post,
    path = "/employees",
    request_body = NewEmployee,
    responses(
        (status = 201, description = "Employee added", body = Employee),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Administrator login required"),
        (status = 409, description = "Phone number already registered")
    ),
    security(("basic_auth" = [])),
    tag = "staff"
)]
pub async fn add_employee(
    State(state): State<AppState>,
    auth: BasicAuth,
    Json(new): Json<NewEmployee>,
) -> Result<impl IntoResponse, ApiError> {
    verify_admin(&state.settings, credentials(auth))?;
    validation::validate_full_name(&new.full_name)?;
    validation::validate_phone(&new.phone)?;
    validation::validate_specialization(&new.specialization)?;
    validation::validate_passport(&new.passport)?;
    let employee = state.staff.add(&new).await?;
    Ok((StatusCode::CREATED, Json(employee)))
}

#[utoipa::path(
    delete,
    path = "/employees/{id}",
    params(("id" = i64, Path, description = "Employee id")),
    responses(
        (status = 204, description = "Employee deleted"),
        (status = 401, description = "Administrator login required"),
        (status = 404, description = "No such employee")
    ),
    security(("basic_auth" = [])),
    tag = "staff"
)]
pub async fn delete_employee(
    State(state): State<AppState>,
    auth: BasicAuth,
    Path(employee_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    verify_admin(&state.settings, credentials(auth))?;
    state.staff.delete(employee_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/employees/search",
    params(SearchQuery),
    responses(
        (status = 200, description = "Employees whose name contains the query", body = [Employee]),
        (status = 401, description = "Administrator login required")
    ),
    security(("basic_auth" = [])),
    tag = "staff"
)]
pub async fn search_employees(
    State(state): State<AppState>,
    auth: BasicAuth,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Employee>>, ApiError> {
    verify_admin(&state.settings, credentials(auth))?;
    let found = state
        .staff
        .search(query.q.as_deref().unwrap_or_default())
        .await?;
    Ok(Json(found))
}

#[utoipa::path(
    get,
    path = "/trainers",
    responses((status = 200, description = "Trainers by name", body = [Trainer])),
    tag = "staff"
)]
pub async fn list_trainers(State(state): State<AppState>) -> Result<Json<Vec<Trainer>>, ApiError> {
    Ok(Json(state.staff.trainers().await?))
}

#[utoipa::path(
    get,
    path = "/prices",
    responses((status = 200, description = "Price list", body = [PriceEntry])),
    tag = "prices"
)]
pub async fn list_prices(State(state): State<AppState>) -> Result<Json<Vec<PriceEntry>>, ApiError> {
    Ok(Json(state.prices.list().await?))
}

#[utoipa::path(
    get,
    path = "/membership-types",
    responses((status = 200, description = "Membership type names", body = [String])),
    tag = "prices"
)]
pub async fn list_membership_types(
    State(state): State<AppState>,
) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.prices.membership_types().await?))
}

#[utoipa::path(
    post,
    path = "/prices",
    request_body = NewPrice,
    responses(
        (status = 201, description = "Membership added", body = PriceEntry),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Administrator login required"),
        (status = 409, description = "Membership type exists")
    ),
    security(("basic_auth" = [])),
    tag = "prices"
)]
pub async fn add_price(
    State(state): State<AppState>,
    auth: BasicAuth,
    Json(new): Json<NewPrice>,
) -> Result<impl IntoResponse, ApiError> {
    verify_admin(&state.settings, credentials(auth))?;
    validation::validate_membership_type(&new.membership_type)?;
    let price = validation::validate_price(new.price)?;
    let entry = state
        .prices
        .add(new.membership_type.trim(), price)
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

#[utoipa::path(
    put,
    path = "/prices/{membership_type}",
    params(("membership_type" = String, Path, description = "Membership type name")),
    request_body = PriceUpdate,
    responses(
        (status = 200, description = "Price updated", body = PriceEntry),
        (status = 400, description = "Invalid price"),
        (status = 401, description = "Administrator login required"),
        (status = 404, description = "No such membership type")
    ),
    security(("basic_auth" = [])),
    tag = "prices"
)]
pub async fn update_price(
    State(state): State<AppState>,
    auth: BasicAuth,
    Path(membership_type): Path<String>,
    Json(update): Json<PriceUpdate>,
) -> Result<Json<PriceEntry>, ApiError> {
    verify_admin(&state.settings, credentials(auth))?;
    let price = validation::validate_price(update.price)?;
    let entry = state.prices.update_price(&membership_type, price).await?;
    Ok(Json(entry))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_day() {
        assert_eq!(parse_day(None).unwrap(), None);
        assert_eq!(parse_day(Some("")).unwrap(), None);
        assert_eq!(parse_day(Some("Пн")).unwrap(), Some(DayOfWeek::Monday));
        assert!(parse_day(Some("funday")).is_err());
    }

    #[test]
    fn test_week_monday() {
        let monday = NaiveDate::from_ymd_opt(2025, 11, 24).unwrap();
        assert_eq!(week_monday(Some(monday)).unwrap(), monday);
        assert!(week_monday(Some(monday + Duration::days(1))).is_err());
        let current = week_monday(None).unwrap();
        assert_eq!(current.weekday().num_days_from_monday(), 0);
    }

    #[test]
    fn test_week_monday_rejects_last_representable_week() {
        let last_monday = NaiveDate::MAX
            - Duration::days(NaiveDate::MAX.weekday().num_days_from_monday() as i64);
        assert!(matches!(
            week_monday(Some(last_monday)),
            Err(ApiError::BadRequest(_))
        ));
    }
}
