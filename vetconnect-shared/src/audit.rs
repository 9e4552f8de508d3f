//! Audit trail
//!
//! Security-relevant actions (logins, logouts, verification, admin changes,
//! forbidden access) are written to `audit_logs`. Recording is best effort:
//! every entry is emitted as a `tracing` event first, then inserted, and an
//! insert failure is logged and swallowed so the request that triggered the
//! entry is never failed by its audit trail.
//!
//! # Example
//!
//! ```no_run
//! use vetconnect_shared::audit::{record, AuditAction, AuditEntry};
//! use serde_json::json;
//! use uuid::Uuid;
//!
//! # async fn example(pool: sqlx::PgPool, user_id: Uuid) {
//! record(
//!     &pool,
//!     AuditEntry::new(AuditAction::LoginSuccess)
//!         .entity("user", Some(user_id))
//!         .detail(json!({ "email": "owner@example.com" }))
//!         .ip("203.0.113.7"),
//! )
//! .await;
//! # }
//! ```

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::fmt;
use uuid::Uuid;

use crate::auth::middleware::AuthContext;
use crate::models::audit_log::{AuditLog, NewAuditLog};
use crate::models::user::UserRole;

/// Audited action, stored as its SCREAMING_SNAKE_CASE name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    // Auth
    LoginSuccess,
    LoginFail,
    Logout,
    Register,
    EmailVerified,
    ResendVerification,
    // Appointments
    AppointmentCreated,
    AppointmentUpdated,
    AppointmentCancelled,
    AppointmentStatusChanged,
    // Admin actions on users
    UserDeactivated,
    UserReactivated,
    UserRoleChanged,
    // Access
    ForbiddenAccess,
    // Admin reads
    AdminViewedUsers,
    AdminViewedAuditLogs,
}

impl AuditAction {
    pub const ALL: [AuditAction; 16] = [
        AuditAction::LoginSuccess,
        AuditAction::LoginFail,
        AuditAction::Logout,
        AuditAction::Register,
        AuditAction::EmailVerified,
        AuditAction::ResendVerification,
        AuditAction::AppointmentCreated,
        AuditAction::AppointmentUpdated,
        AuditAction::AppointmentCancelled,
        AuditAction::AppointmentStatusChanged,
        AuditAction::UserDeactivated,
        AuditAction::UserReactivated,
        AuditAction::UserRoleChanged,
        AuditAction::ForbiddenAccess,
        AuditAction::AdminViewedUsers,
        AuditAction::AdminViewedAuditLogs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::LoginSuccess => "LOGIN_SUCCESS",
            AuditAction::LoginFail => "LOGIN_FAIL",
            AuditAction::Logout => "LOGOUT",
            AuditAction::Register => "REGISTER",
            AuditAction::EmailVerified => "EMAIL_VERIFIED",
            AuditAction::ResendVerification => "RESEND_VERIFICATION",
            AuditAction::AppointmentCreated => "APPOINTMENT_CREATED",
            AuditAction::AppointmentUpdated => "APPOINTMENT_UPDATED",
            AuditAction::AppointmentCancelled => "APPOINTMENT_CANCELLED",
            AuditAction::AppointmentStatusChanged => "APPOINTMENT_STATUS_CHANGED",
            AuditAction::UserDeactivated => "USER_DEACTIVATED",
            AuditAction::UserReactivated => "USER_REACTIVATED",
            AuditAction::UserRoleChanged => "USER_ROLE_CHANGED",
            AuditAction::ForbiddenAccess => "FORBIDDEN_ACCESS",
            AuditAction::AdminViewedUsers => "ADMIN_VIEWED_USERS",
            AuditAction::AdminViewedAuditLogs => "ADMIN_VIEWED_AUDIT_LOGS",
        }
    }

    /// Parses a stored action name
    pub fn parse(s: &str) -> Option<Self> {
        AuditAction::ALL.into_iter().find(|action| action.as_str() == s)
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builder for one audit record
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub action: AuditAction,
    pub user_id: Option<Uuid>,
    pub user_role: Option<UserRole>,
    pub entity: Option<&'static str>,
    pub entity_id: Option<Uuid>,
    pub detail: Option<serde_json::Value>,
    pub ip: Option<String>,
}

impl AuditEntry {
    /// Anonymous entry for `action`
    pub fn new(action: AuditAction) -> Self {
        Self {
            action,
            user_id: None,
            user_role: None,
            entity: None,
            entity_id: None,
            detail: None,
            ip: None,
        }
    }

    /// Attributes the entry to an authenticated caller
    pub fn actor(mut self, auth: &AuthContext) -> Self {
        self.user_id = Some(auth.user_id);
        self.user_role = Some(auth.role);
        self
    }

    /// Attributes the entry to a user who is not (yet) authenticated
    pub fn user(mut self, user_id: Uuid, role: UserRole) -> Self {
        self.user_id = Some(user_id);
        self.user_role = Some(role);
        self
    }

    pub fn entity(mut self, entity: &'static str, entity_id: Option<Uuid>) -> Self {
        self.entity = Some(entity);
        self.entity_id = entity_id;
        self
    }

    pub fn detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = Some(detail);
        self
    }

    pub fn ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    /// `ACTION on entity#id` or just `ACTION`
    pub fn subject(&self) -> String {
        match (self.entity, self.entity_id) {
            (Some(entity), Some(id)) => format!("{} on {}#{}", self.action, entity, id),
            (Some(entity), None) => format!("{} on {}", self.action, entity),
            _ => self.action.to_string(),
        }
    }
}

/// Records an audit entry
///
/// Always emits an `info` event; the database insert is best effort.
pub async fn record(pool: &PgPool, entry: AuditEntry) {
    let detail = entry
        .detail
        .as_ref()
        .map(|d| d.to_string())
        .unwrap_or_default();

    tracing::info!(
        target: "audit",
        action = %entry.action,
        user = %entry.user_id.map(|id| id.to_string()).unwrap_or_else(|| "anon".into()),
        role = entry.user_role.map(|r| r.as_str()).unwrap_or("-"),
        ip = entry.ip.as_deref().unwrap_or("-"),
        detail = %detail,
        "{}",
        entry.subject()
    );

    let row = NewAuditLog {
        user_id: entry.user_id,
        user_role: entry.user_role.map(|r| r.as_str().to_string()),
        action: entry.action.as_str().to_string(),
        entity: entry.entity.map(str::to_string),
        entity_id: entry.entity_id,
        detail: entry.detail,
        ip_address: entry.ip,
    };

    if let Err(e) = AuditLog::insert(pool, row).await {
        tracing::error!(target: "audit", error = %e, "Failed to write audit entry to database");
    }
}
