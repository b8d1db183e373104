use sqlx::PgPool;

use crate::errors::AppError;
use crate::models::attendance::{self, AttendanceEntry};
use super::queries::find_by_id;
use super::types::Agenda;

pub const CSV_HEADER: [&str; 5] = ["No", "NIM", "Nama", "Jabatan", "Waktu Scan"];
const SCAN_TIME_FORMAT: &str = "%d-%m-%Y %H:%M:%S";
const MISSING: &str = "-";

/// Quote a field only when it contains a delimiter, quote or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn csv_line(fields: &[&str]) -> String {
    let mut line = fields.iter().map(|f| csv_field(f)).collect::<Vec<_>>().join(",");
    line.push('\n');
    line
}

fn or_missing(value: Option<&str>) -> &str {
    value.map(str::trim).filter(|v| !v.is_empty()).unwrap_or(MISSING)
}

/// Render the attendance sheet: header plus one 1-indexed row per attendance,
/// in the order given.
pub fn render_attendance_csv(entries: &[AttendanceEntry]) -> String {
    let mut out = csv_line(&CSV_HEADER);
    for (i, entry) in entries.iter().enumerate() {
        let no = (i + 1).to_string();
        let scanned = entry.scanned_at.format(SCAN_TIME_FORMAT).to_string();
        out.push_str(&csv_line(&[
            no.as_str(),
            or_missing(entry.nim.as_deref()),
            entry.name.as_str(),
            or_missing(entry.jabatan.as_deref()),
            scanned.as_str(),
        ]));
    }
    out
}

/// Download filename for an agenda's attendance sheet.
pub fn export_filename(agenda: &Agenda) -> String {
    format!("absensi-{}.csv", agenda.id)
}

/// Load an agenda and render its attendance sheet.
pub async fn export_attendance_csv(pool: &PgPool, agenda_id: i64) -> Result<(Agenda, String), AppError> {
    let agenda = find_by_id(pool, agenda_id).await?.ok_or(AppError::NotFound("Agenda"))?;
    let entries = attendance::find_for_agenda(pool, agenda_id).await?;
    Ok((agenda, render_attendance_csv(&entries)))
}
