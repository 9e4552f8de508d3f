/// Appointment model and database operations
///
/// An appointment carries two independent statuses:
///
/// - `appointment_status` is the clinic workflow (`pending → confirmed →
///   completed | cancelled`), driven by admins.
/// - `status` is the schedule bucket the client dashboard groups by
///   (`upcoming`, `past`, `cancelled`).
///
/// Moving the workflow to `cancelled` or `completed` also moves the schedule
/// bucket (see [`AppointmentStatus::schedule_override`]); every other
/// transition leaves it alone.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE appointments (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID NOT NULL REFERENCES users (id) ON DELETE CASCADE,
///     pet_name VARCHAR(100) NOT NULL,
///     species VARCHAR(100) NOT NULL,
///     service VARCHAR(50) NOT NULL,
///     assigned_vet VARCHAR(100) NOT NULL DEFAULT 'Pending assignment',
///     appointment_date DATE NOT NULL,
///     appointment_time TIME NOT NULL,
///     status schedule_status NOT NULL DEFAULT 'upcoming',
///     appointment_status appointment_status NOT NULL DEFAULT 'pending',
///     notes TEXT,
///     transaction_hash VARCHAR(66),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Clinic workflow status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "appointment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 4] = [
        AppointmentStatus::Pending,
        AppointmentStatus::Confirmed,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }

    /// Schedule bucket forced by this workflow status, if any
    pub fn schedule_override(&self) -> Option<ScheduleStatus> {
        match self {
            AppointmentStatus::Cancelled => Some(ScheduleStatus::Cancelled),
            AppointmentStatus::Completed => Some(ScheduleStatus::Past),
            AppointmentStatus::Pending | AppointmentStatus::Confirmed => None,
        }
    }

    /// Whether the appointment can no longer be moved
    pub fn is_final(&self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Cancelled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AppointmentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("Unknown appointment status: {}", s))
    }
}

/// Schedule bucket shown on the client dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "schedule_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ScheduleStatus {
    Upcoming,
    Past,
    Cancelled,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Upcoming => "upcoming",
            ScheduleStatus::Past => "past",
            ScheduleStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for ScheduleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upcoming" => Ok(ScheduleStatus::Upcoming),
            "past" => Ok(ScheduleStatus::Past),
            "cancelled" => Ok(ScheduleStatus::Cancelled),
            other => Err(format!("Unknown schedule status: {}", other)),
        }
    }
}

/// Default vet shown until the clinic assigns one
pub const UNASSIGNED_VET: &str = "Pending assignment";

/// Appointment row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Appointment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub pet_name: String,

    /// Free text such as `"Dog (Beagle)"`
    pub species: String,

    pub service: String,
    pub assigned_vet: String,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub status: ScheduleStatus,
    pub appointment_status: AppointmentStatus,
    pub notes: Option<String>,

    /// `0x`-prefixed SHA-256 receipt from the booking assistant
    pub transaction_hash: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for booking an appointment
#[derive(Debug, Clone)]
pub struct CreateAppointment {
    pub user_id: Uuid,
    pub pet_name: String,
    pub species: String,
    pub service: String,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub notes: Option<String>,
    pub transaction_hash: Option<String>,
}

/// Appointment joined with its owner, for the back office
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AdminAppointment {
    pub id: Uuid,
    pub pet_name: String,
    pub species: String,
    pub service: String,
    pub assigned_vet: String,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub status: ScheduleStatus,
    pub appointment_status: AppointmentStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub owner_id: Uuid,
    pub owner_username: String,
    pub owner_email: String,
}

/// Filters for [`Appointment::list_admin`]
#[derive(Debug, Clone, Default)]
pub struct AppointmentFilter {
    pub status: Option<ScheduleStatus>,
    pub appointment_status: Option<AppointmentStatus>,

    /// Case-insensitive substring of pet name, owner username or owner email
    pub search: Option<String>,

    pub date: Option<NaiveDate>,
}

/// Dashboard counters
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentStats {
    pub total_appointments: i64,
    pub pending_appointments: i64,
    pub completed_today: i64,
    pub cancelled_today: i64,
}

const APPOINTMENT_COLUMNS: &str = "id, user_id, pet_name, species, service, assigned_vet, \
     appointment_date, appointment_time, status, appointment_status, notes, transaction_hash, \
     created_at, updated_at";

impl Appointment {
    /// Books a pending, upcoming appointment
    pub async fn create(pool: &PgPool, data: CreateAppointment) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Appointment>(&format!(
            r#"
            INSERT INTO appointments
                (user_id, pet_name, species, service, appointment_date, appointment_time, notes, transaction_hash)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {APPOINTMENT_COLUMNS}
            "#
        ))
        .bind(data.user_id)
        .bind(data.pet_name)
        .bind(data.species)
        .bind(data.service)
        .bind(data.appointment_date)
        .bind(data.appointment_time)
        .bind(data.notes)
        .bind(data.transaction_hash)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Appointment>(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// A user's appointments in calendar order, optionally one bucket only
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: Uuid,
        status: Option<ScheduleStatus>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Appointment>(&format!(
            r#"
            SELECT {APPOINTMENT_COLUMNS} FROM appointments
            WHERE user_id = $1 AND ($2::schedule_status IS NULL OR status = $2)
            ORDER BY appointment_date ASC, appointment_time ASC
            "#
        ))
        .bind(user_id)
        .bind(status)
        .fetch_all(pool)
        .await
    }

    /// A user's full history, most recent first
    pub async fn history_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Appointment>(&format!(
            r#"
            SELECT {APPOINTMENT_COLUMNS} FROM appointments
            WHERE user_id = $1
            ORDER BY appointment_date DESC, appointment_time DESC
            "#
        ))
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// All appointments joined with their owners, in calendar order
    pub async fn list_admin(
        pool: &PgPool,
        filter: &AppointmentFilter,
    ) -> Result<Vec<AdminAppointment>, sqlx::Error> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"
            SELECT a.id, a.pet_name, a.species, a.service, a.assigned_vet,
                   a.appointment_date, a.appointment_time, a.status, a.appointment_status,
                   a.notes, a.created_at,
                   u.id AS owner_id, u.username AS owner_username, u.email AS owner_email
            FROM appointments a
            JOIN users u ON u.id = a.user_id
            WHERE 1=1
            "#,
        );

        if let Some(status) = filter.status {
            query.push(" AND a.status = ");
            query.push_bind(status);
        }

        if let Some(appointment_status) = filter.appointment_status {
            query.push(" AND a.appointment_status = ");
            query.push_bind(appointment_status);
        }

        if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let pattern = format!("%{}%", search.trim().to_lowercase());
            query.push(" AND (LOWER(a.pet_name) LIKE ");
            query.push_bind(pattern.clone());
            query.push(" OR LOWER(u.username) LIKE ");
            query.push_bind(pattern.clone());
            query.push(" OR LOWER(u.email) LIKE ");
            query.push_bind(pattern);
            query.push(")");
        }

        if let Some(date) = filter.date {
            query.push(" AND a.appointment_date = ");
            query.push_bind(date);
        }

        query.push(" ORDER BY a.appointment_date ASC, a.appointment_time ASC");

        query.build_query_as::<AdminAppointment>().fetch_all(pool).await
    }

    /// Sets the workflow status and, for terminal states, the schedule bucket
    pub async fn update_status(
        pool: &PgPool,
        id: Uuid,
        appointment_status: AppointmentStatus,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE appointments
            SET appointment_status = $2,
                status = COALESCE($3, status),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(appointment_status)
        .bind(appointment_status.schedule_override())
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Moves an appointment to a new slot and back into the upcoming bucket
    pub async fn reschedule(
        pool: &PgPool,
        id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Appointment>(&format!(
            r#"
            UPDATE appointments
            SET appointment_date = $2, appointment_time = $3,
                status = 'upcoming', updated_at = NOW()
            WHERE id = $1
            RETURNING {APPOINTMENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(date)
        .bind(time)
        .fetch_optional(pool)
        .await
    }

    /// Counters for the admin overview cards
    pub async fn stats(pool: &PgPool) -> Result<AppointmentStats, sqlx::Error> {
        sqlx::query_as::<_, AppointmentStats>(
            r#"
            SELECT
                COUNT(*) AS total_appointments,
                COUNT(*) FILTER (WHERE appointment_status = 'pending') AS pending_appointments,
                COUNT(*) FILTER (
                    WHERE appointment_status = 'completed' AND updated_at::date = CURRENT_DATE
                ) AS completed_today,
                COUNT(*) FILTER (
                    WHERE appointment_status = 'cancelled' AND updated_at::date = CURRENT_DATE
                ) AS cancelled_today
            FROM appointments
            "#,
        )
        .fetch_one(pool)
        .await
    }
}
