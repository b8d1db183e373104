use chrono::NaiveDateTime;

/// Accepted wall-clock formats for agenda times (`YYYY-MM-DDTHH:mm`, seconds optional).
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S"];

/// Validate a required text field with a max length (in characters).
pub fn validate_required(value: &str, field_name: &str, max_len: usize) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Some(format!("{field_name} is required"));
    }
    if trimmed.chars().count() > max_len {
        return Some(format!("{field_name} must be at most {max_len} characters"));
    }
    None
}

/// Validate an optional text field; absent or blank passes.
pub fn validate_optional(value: Option<&str>, field_name: &str, max_len: usize) -> Option<String> {
    let trimmed = value.unwrap_or("").trim();
    if trimmed.chars().count() > max_len {
        return Some(format!("{field_name} must be at most {max_len} characters"));
    }
    None
}

/// Parse an agenda time such as `2025-01-01T09:00`.
pub fn parse_datetime(value: &str, field_name: &str) -> Result<NaiveDateTime, String> {
    let trimmed = value.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .ok_or_else(|| format!("{field_name} must use the format YYYY-MM-DDTHH:mm"))
}
