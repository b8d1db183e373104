use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Attendance {
    pub id: i64,
    pub agenda_id: i64,
    pub user_id: i64,
    pub scanned_at: NaiveDateTime,
}

/// Attendance joined with the attendee's profile, for agenda detail and export.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AttendanceEntry {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub nim: Option<String>,
    pub jabatan: Option<String>,
    pub scanned_at: NaiveDateTime,
}

/// One line of a member's own attendance history.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MyAttendance {
    pub id: i64,
    pub agenda_id: i64,
    pub agenda_title: String,
    pub scanned_at: NaiveDateTime,
}

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    #[serde(default)]
    pub qr_code: String,
}

#[derive(Debug, Deserialize)]
pub struct ManualAttendanceRequest {
    pub user_id: i64,
    pub agenda_id: i64,
}
