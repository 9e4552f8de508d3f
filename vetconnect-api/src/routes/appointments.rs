/// Client dashboard appointment endpoints
///
/// All routes require a session token. Clients see and change only their
/// own appointments; admins may act on any.
///
/// # Endpoints
///
/// - `GET /api/appointments?status=upcoming|past|cancelled`
/// - `POST /api/appointments`
/// - `PATCH /api/appointments/:id/cancel`
/// - `PATCH /api/appointments/:id/reschedule`

use crate::{
    app::AppState,
    chat::datetime::validate_slot,
    error::{ApiError, ApiResult},
    extract::ApiJson,
    middleware::request_log::ClientIp,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{Local, NaiveDate, NaiveTime};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;
use vetconnect_shared::{
    audit::{self, AuditAction, AuditEntry},
    auth::{authorization::require_owner_or_admin, middleware::AuthContext},
    models::appointment::{Appointment, AppointmentStatus, CreateAppointment, ScheduleStatus},
    validation::sanitize_text,
};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppointmentRequest {
    #[validate(length(min = 1, max = 100, message = "Pet name is required"))]
    pub pet_name: String,

    #[validate(length(min = 1, max = 100, message = "Species is required"))]
    pub species: String,

    #[validate(length(min = 1, max = 100, message = "Service is required"))]
    pub service: String,

    /// `YYYY-MM-DD`
    pub date: String,

    /// `HH:MM`, 24-hour
    pub time: String,

    #[validate(length(max = 1000, message = "Notes must be at most 1000 characters"))]
    pub notes: Option<String>,

    #[validate(length(max = 66, message = "Invalid transaction hash"))]
    pub transaction_hash: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RescheduleRequest {
    pub date: String,
    pub time: String,
}

fn parse_date(date: &str) -> ApiResult<NaiveDate> {
    NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest("Invalid date. Use YYYY-MM-DD.".to_string()))
}

fn parse_time(time: &str) -> ApiResult<NaiveTime> {
    let time = time.trim();
    NaiveTime::parse_from_str(time, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M:%S"))
        .map_err(|_| ApiError::BadRequest("Invalid time. Use HH:MM.".to_string()))
}

/// Parses and checks a requested slot against the clinic's local clock
fn parse_slot(date: &str, time: &str) -> ApiResult<(NaiveDate, NaiveTime)> {
    let date = parse_date(date)?;
    let time = parse_time(time)?;

    validate_slot(date.and_time(time), Local::now().naive_local())
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    Ok((date, time))
}

fn parse_schedule_status(status: Option<&str>) -> ApiResult<Option<ScheduleStatus>> {
    match status.map(str::trim).filter(|s| !s.is_empty() && *s != "all") {
        None => Ok(None),
        Some(s) => s.parse().map(Some).map_err(|_| {
            ApiError::BadRequest("Status must be one of: upcoming, past, cancelled".to_string())
        }),
    }
}

/// Loads an appointment the caller may act on
async fn load_owned(state: &AppState, auth: &AuthContext, id: Uuid) -> ApiResult<Appointment> {
    let appointment = Appointment::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Appointment not found".to_string()))?;

    require_owner_or_admin(auth, appointment.user_id)?;
    Ok(appointment)
}

/// The caller's appointments in calendar order
pub async fn list_appointments(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Appointment>>> {
    let status = parse_schedule_status(query.status.as_deref())?;
    let appointments = Appointment::list_for_user(&state.db, auth.user_id, status).await?;

    Ok(Json(appointments))
}

/// Book a pending appointment for the caller
///
/// # Endpoint
///
/// ```text
/// POST /api/appointments
///
/// {
///   "petName": "Coco",
///   "species": "Dog (Beagle)",
///   "service": "Check-up",
///   "date": "2026-03-20",
///   "time": "10:00"
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: bad date or time, slot in the past or outside clinic hours
/// - `422 Unprocessable Entity`: missing or oversized fields
pub async fn create_appointment(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<CreateAppointmentRequest>,
) -> ApiResult<(StatusCode, Json<Appointment>)> {
    let req = CreateAppointmentRequest {
        pet_name: sanitize_text(&req.pet_name),
        species: sanitize_text(&req.species),
        service: sanitize_text(&req.service),
        notes: req.notes.as_deref().map(sanitize_text).filter(|n| !n.is_empty()),
        ..req
    };
    req.validate()?;

    let (date, time) = parse_slot(&req.date, &req.time)?;

    let appointment = Appointment::create(
        &state.db,
        CreateAppointment {
            user_id: auth.user_id,
            pet_name: req.pet_name,
            species: req.species,
            service: req.service,
            appointment_date: date,
            appointment_time: time,
            notes: req.notes,
            transaction_hash: req.transaction_hash,
        },
    )
    .await?;

    audit::record(
        &state.db,
        AuditEntry::new(AuditAction::AppointmentCreated)
            .actor(&auth)
            .entity("appointment", Some(appointment.id))
            .detail(json!({
                "pet_name": appointment.pet_name,
                "service": appointment.service,
                "date": appointment.appointment_date,
                "time": appointment.appointment_time,
            }))
            .ip(ip),
    )
    .await;

    tracing::info!(
        appointment_id = %appointment.id,
        user_id = %auth.user_id,
        "Appointment booked"
    );

    Ok((StatusCode::CREATED, Json(appointment)))
}

/// Cancel an appointment
pub async fn cancel_appointment(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Appointment>> {
    let appointment = load_owned(&state, &auth, id).await?;

    if appointment.appointment_status.is_final() {
        return Err(ApiError::BadRequest(format!(
            "Appointment is already {}",
            appointment.appointment_status
        )));
    }

    Appointment::update_status(&state.db, id, AppointmentStatus::Cancelled).await?;

    audit::record(
        &state.db,
        AuditEntry::new(AuditAction::AppointmentCancelled)
            .actor(&auth)
            .entity("appointment", Some(id))
            .detail(json!({
                "pet_name": appointment.pet_name,
                "previous_status": appointment.appointment_status,
            }))
            .ip(ip),
    )
    .await;

    let updated = Appointment::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Appointment not found".to_string()))?;

    Ok(Json(updated))
}

/// Move an appointment to a new slot
pub async fn reschedule_appointment(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    ApiJson(req): ApiJson<RescheduleRequest>,
) -> ApiResult<Json<Appointment>> {
    let appointment = load_owned(&state, &auth, id).await?;

    if appointment.appointment_status.is_final() {
        return Err(ApiError::BadRequest(format!(
            "A {} appointment cannot be rescheduled",
            appointment.appointment_status
        )));
    }

    let (date, time) = parse_slot(&req.date, &req.time)?;

    let updated = Appointment::reschedule(&state.db, id, date, time)
        .await?
        .ok_or_else(|| ApiError::NotFound("Appointment not found".to_string()))?;

    audit::record(
        &state.db,
        AuditEntry::new(AuditAction::AppointmentUpdated)
            .actor(&auth)
            .entity("appointment", Some(id))
            .detail(json!({
                "previous_date": appointment.appointment_date,
                "previous_time": appointment.appointment_time,
                "new_date": date,
                "new_time": time,
            }))
            .ip(ip),
    )
    .await;

    Ok(Json(updated))
}
