/// Back-office endpoints
///
/// Mounted under `/api/admin` behind authentication and the admin role
/// check. Every filter is bound as a query parameter.
///
/// # Endpoints
///
/// - `GET /users`, `GET /users/:id`
/// - `PATCH /users/:id/status`, `PATCH /users/:id/role`
/// - `GET /appointments`, `PATCH /appointments/:id/status`
/// - `GET /audit-logs`
/// - `GET /stats`

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::ApiJson,
    middleware::request_log::ClientIp,
};
use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;
use vetconnect_shared::{
    audit::{self, AuditAction, AuditEntry},
    auth::middleware::AuthContext,
    models::{
        appointment::{
            AdminAppointment, Appointment, AppointmentFilter, AppointmentStatus, ScheduleStatus,
        },
        audit_log::{AuditLog, AuditLogFilter},
        user::{User, UserFilter, UserRole, UserSummary},
    },
};

pub const DEFAULT_AUDIT_PAGE_SIZE: i64 = 50;
pub const MAX_AUDIT_PAGE_SIZE: i64 = 200;
pub const MAX_AUDIT_PAGE: i64 = 1_000_000;

const MSG_USER_NOT_FOUND: &str = "User not found";
const MSG_APPOINTMENT_NOT_FOUND: &str = "Appointment not found";

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    /// `active`, `inactive` or `all`
    pub status: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserDetailResponse {
    pub user: User,
    pub appointments: Vec<Appointment>,
}

#[derive(Debug, Deserialize)]
pub struct RoleUpdateRequest {
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct AppointmentListQuery {
    pub status: Option<String>,
    pub appointment_status: Option<String>,
    pub search: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogQuery {
    pub action: Option<String>,
    pub user_id: Option<Uuid>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct AuditLogPage {
    pub data: Vec<AuditLog>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub pages: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub total_appointments: i64,
    pub active_users: i64,
    pub completed_today: i64,
    pub pending_appointments: i64,
    pub cancelled_today: i64,
}

/// Treats blank or `all` as no filter
fn filter_value(value: Option<&str>) -> Option<&str> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("all"))
}

fn parse_active_filter(status: Option<&str>) -> ApiResult<Option<bool>> {
    match filter_value(status) {
        None => Ok(None),
        Some("active") => Ok(Some(true)),
        Some("inactive") => Ok(Some(false)),
        Some(_) => Err(ApiError::BadRequest(
            "Status must be one of: active, inactive".to_string(),
        )),
    }
}

fn appointment_status_error() -> ApiError {
    let allowed: Vec<&str> = AppointmentStatus::ALL.iter().map(|s| s.as_str()).collect();
    ApiError::BadRequest(format!("Invalid status. Must be one of: {}", allowed.join(", ")))
}

fn parse_appointment_filter(query: &AppointmentListQuery) -> ApiResult<AppointmentFilter> {
    let status: Option<ScheduleStatus> = filter_value(query.status.as_deref())
        .map(str::parse)
        .transpose()
        .map_err(|_| {
            ApiError::BadRequest("Status must be one of: upcoming, past, cancelled".to_string())
        })?;

    let appointment_status: Option<AppointmentStatus> = filter_value(query.appointment_status.as_deref())
        .map(str::parse)
        .transpose()
        .map_err(|_| appointment_status_error())?;

    let date = filter_value(query.date.as_deref())
        .map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d"))
        .transpose()
        .map_err(|_| ApiError::BadRequest("Invalid date. Use YYYY-MM-DD.".to_string()))?;

    Ok(AppointmentFilter {
        status,
        appointment_status,
        search: filter_value(query.search.as_deref()).map(str::to_string),
        date,
    })
}

/// Clamps paging input to `1..=MAX_AUDIT_PAGE` and `1..=MAX_AUDIT_PAGE_SIZE`
fn page_params(page: Option<i64>, limit: Option<i64>) -> (i64, i64) {
    let page = page.unwrap_or(1).clamp(1, MAX_AUDIT_PAGE);
    let limit = limit
        .unwrap_or(DEFAULT_AUDIT_PAGE_SIZE)
        .clamp(1, MAX_AUDIT_PAGE_SIZE);
    (page, limit)
}

fn page_count(total: i64, limit: i64) -> i64 {
    (total + limit - 1) / limit
}

/// Users with appointment counts, newest first
pub async fn list_users(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<UserListQuery>,
) -> ApiResult<Json<Vec<UserSummary>>> {
    let filter = UserFilter {
        is_active: parse_active_filter(query.status.as_deref())?,
        search: filter_value(query.search.as_deref()).map(str::to_string),
    };

    let users = User::list_with_appointment_counts(&state.db, &filter).await?;

    audit::record(
        &state.db,
        AuditEntry::new(AuditAction::AdminViewedUsers)
            .actor(&auth)
            .detail(json!({
                "status": query.status,
                "search": filter.search,
                "results": users.len(),
            }))
            .ip(ip),
    )
    .await;

    Ok(Json(users))
}

/// One user with their appointment history
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<UserDetailResponse>> {
    let user = User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(MSG_USER_NOT_FOUND.to_string()))?;

    let appointments = Appointment::history_for_user(&state.db, id).await?;

    Ok(Json(UserDetailResponse { user, appointments }))
}

/// Activate or deactivate an account
///
/// # Endpoint
///
/// ```text
/// PATCH /api/admin/users/:id/status
///
/// { "is_active": false }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: `is_active` is not a boolean, or the target is the caller
/// - `404 Not Found`: no such user
pub async fn update_user_status(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    ApiJson(body): ApiJson<Value>,
) -> ApiResult<Json<Value>> {
    let is_active = body
        .get("is_active")
        .and_then(Value::as_bool)
        .ok_or_else(|| ApiError::BadRequest("is_active must be a boolean".to_string()))?;

    if id == auth.user_id {
        return Err(ApiError::BadRequest(
            "You cannot change your own account status".to_string(),
        ));
    }

    let user = User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(MSG_USER_NOT_FOUND.to_string()))?;

    User::set_active(&state.db, id, is_active).await?;

    let action = if is_active {
        AuditAction::UserReactivated
    } else {
        AuditAction::UserDeactivated
    };

    audit::record(
        &state.db,
        AuditEntry::new(action)
            .actor(&auth)
            .entity("user", Some(id))
            .detail(json!({
                "email": user.email,
                "previous_status": user.is_active,
                "new_status": is_active,
            }))
            .ip(ip),
    )
    .await;

    let verb = if is_active { "activated" } else { "deactivated" };
    Ok(Json(json!({
        "message": format!("User {verb} successfully"),
        "id": id,
        "is_active": is_active,
    })))
}

/// Change an account's role
pub async fn update_user_role(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    ApiJson(req): ApiJson<RoleUpdateRequest>,
) -> ApiResult<Json<Value>> {
    let role: UserRole = req
        .role
        .trim()
        .parse()
        .map_err(|_| ApiError::BadRequest("Role must be one of: user, admin".to_string()))?;

    if id == auth.user_id && role != UserRole::Admin {
        return Err(ApiError::BadRequest("You cannot remove your own admin role".to_string()));
    }

    let user = User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(MSG_USER_NOT_FOUND.to_string()))?;

    User::set_role(&state.db, id, role).await?;

    audit::record(
        &state.db,
        AuditEntry::new(AuditAction::UserRoleChanged)
            .actor(&auth)
            .entity("user", Some(id))
            .detail(json!({
                "email": user.email,
                "previous_role": user.role,
                "new_role": role,
            }))
            .ip(ip),
    )
    .await;

    Ok(Json(json!({
        "message": "Role updated successfully",
        "id": id,
        "role": role,
    })))
}

/// All appointments with their owners, in calendar order
pub async fn list_appointments(
    State(state): State<AppState>,
    Query(query): Query<AppointmentListQuery>,
) -> ApiResult<Json<Vec<AdminAppointment>>> {
    let filter = parse_appointment_filter(&query)?;
    let appointments = Appointment::list_admin(&state.db, &filter).await?;

    Ok(Json(appointments))
}

#[derive(Debug, Deserialize)]
pub struct AppointmentStatusRequest {
    pub appointment_status: Option<String>,
}

/// Move an appointment through the clinic workflow
pub async fn update_appointment_status(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    ApiJson(req): ApiJson<AppointmentStatusRequest>,
) -> ApiResult<Json<Value>> {
    let new_status: AppointmentStatus = req
        .appointment_status
        .as_deref()
        .map(str::trim)
        .and_then(|s| s.parse().ok())
        .ok_or_else(appointment_status_error)?;

    let appointment = Appointment::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(MSG_APPOINTMENT_NOT_FOUND.to_string()))?;

    let owner = User::find_by_id(&state.db, appointment.user_id).await?;

    Appointment::update_status(&state.db, id, new_status).await?;

    audit::record(
        &state.db,
        AuditEntry::new(AuditAction::AppointmentStatusChanged)
            .actor(&auth)
            .entity("appointment", Some(id))
            .detail(json!({
                "pet_name": appointment.pet_name,
                "owner": owner.map(|o| o.email),
                "previous_status": appointment.appointment_status,
                "new_status": new_status,
            }))
            .ip(ip),
    )
    .await;

    Ok(Json(json!({
        "message": "Appointment status updated",
        "id": id,
        "appointment_status": new_status,
    })))
}

/// One page of the audit trail, newest first
pub async fn list_audit_logs(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<AuditLogQuery>,
) -> ApiResult<Json<AuditLogPage>> {
    let (page, limit) = page_params(query.page, query.limit);
    let filter = AuditLogFilter {
        action: filter_value(query.action.as_deref()).map(str::to_uppercase),
        user_id: query.user_id,
    };

    let (data, total) = tokio::try_join!(
        AuditLog::list(&state.db, &filter, page, limit),
        AuditLog::count(&state.db, &filter),
    )?;

    audit::record(
        &state.db,
        AuditEntry::new(AuditAction::AdminViewedAuditLogs)
            .actor(&auth)
            .detail(json!({
                "action": filter.action,
                "user_id": filter.user_id,
                "page": page,
            }))
            .ip(ip),
    )
    .await;

    Ok(Json(AuditLogPage {
        data,
        total,
        page,
        limit,
        pages: page_count(total, limit),
    }))
}

/// Counters for the overview cards
pub async fn stats(State(state): State<AppState>) -> ApiResult<Json<StatsResponse>> {
    let (appointments, active_users) = tokio::try_join!(
        Appointment::stats(&state.db),
        User::count_active(&state.db),
    )?;

    Ok(Json(StatsResponse {
        total_appointments: appointments.total_appointments,
        active_users,
        completed_today: appointments.completed_today,
        pending_appointments: appointments.pending_appointments,
        cancelled_today: appointments.cancelled_today,
    }))
}
