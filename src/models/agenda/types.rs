use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::auth::validate::{parse_datetime, validate_required};
use crate::errors::AppError;
use crate::models::attendance::AttendanceEntry;

pub const TITLE_MAX_LEN: usize = 255;

/// Audience of an agenda: officers only, or everyone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgendaType {
    Pengurus,
    #[default]
    Semua,
}

impl AgendaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgendaType::Pengurus => "pengurus",
            AgendaType::Semua => "semua",
        }
    }
}

impl FromStr for AgendaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pengurus" => Ok(AgendaType::Pengurus),
            "semua" => Ok(AgendaType::Semua),
            _ => Err("type must be one of: pengurus, semua".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Agenda {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub qr_code: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub user_id: i64,
    #[serde(rename = "type")]
    pub agenda_type: AgendaType,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Agenda as shown in the list view.
#[derive(Debug, Clone, Serialize)]
pub struct AgendaListItem {
    #[serde(flatten)]
    pub agenda: Agenda,
    pub creator_name: String,
    pub attendance_count: i64,
}

/// Agenda with its attendance list, in scan order.
#[derive(Debug, Clone, Serialize)]
pub struct AgendaDetail {
    #[serde(flatten)]
    pub agenda: Agenda,
    pub creator_name: String,
    pub attendances: Vec<AttendanceEntry>,
}

/// Validated input for a new agenda.
#[derive(Debug, Clone)]
pub struct NewAgenda {
    pub title: String,
    pub description: Option<String>,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub agenda_type: AgendaType,
}

/// Validated partial update. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct AgendaPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
    pub agenda_type: Option<AgendaType>,
}

#[derive(Debug, Deserialize)]
pub struct AgendaCreateRequest {
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_time: String,
    #[serde(rename = "type")]
    pub agenda_type: Option<String>,
}

/// Body of `PUT /agendas/{id}`; every field is optional.
#[derive(Debug, Default, Deserialize)]
pub struct AgendaUpdateRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    #[serde(rename = "type")]
    pub agenda_type: Option<String>,
}

fn normalize_description(description: Option<&str>) -> Option<String> {
    description
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(String::from)
}

impl AgendaCreateRequest {
    pub fn validate(&self) -> Result<NewAgenda, AppError> {
        let mut errors = Vec::new();

        if let Some(e) = validate_required(&self.title, "Title", TITLE_MAX_LEN) {
            errors.push(e);
        }
        let start = parse_datetime(&self.start_time, "start_time").map_err(|e| errors.push(e)).ok();
        let end = parse_datetime(&self.end_time, "end_time").map_err(|e| errors.push(e)).ok();
        if let (Some(start), Some(end)) = (start, end) {
            if end <= start {
                errors.push("end_time must be after start_time".to_string());
            }
        }
        let agenda_type = match self.agenda_type.as_deref() {
            None => AgendaType::default(),
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                errors.push(e);
                AgendaType::default()
            }),
        };

        match (start, end) {
            (Some(start_time), Some(end_time)) if errors.is_empty() => Ok(NewAgenda {
                title: self.title.trim().to_string(),
                description: normalize_description(self.description.as_deref()),
                start_time,
                end_time,
                agenda_type,
            }),
            _ => Err(AppError::Validation(errors)),
        }
    }
}

impl AgendaUpdateRequest {
    /// Field-level checks only; the time ordering is checked against the
    /// stored agenda in [`AgendaPatch::apply`].
    pub fn validate(&self) -> Result<AgendaPatch, AppError> {
        let mut errors = Vec::new();
        let mut patch = AgendaPatch::default();

        if let Some(title) = &self.title {
            match validate_required(title, "Title", TITLE_MAX_LEN) {
                Some(e) => errors.push(e),
                None => patch.title = Some(title.trim().to_string()),
            }
        }
        if let Some(description) = &self.description {
            patch.description = Some(normalize_description(Some(description)));
        }
        if let Some(raw) = &self.start_time {
            match parse_datetime(raw, "start_time") {
                Ok(t) => patch.start_time = Some(t),
                Err(e) => errors.push(e),
            }
        }
        if let Some(raw) = &self.end_time {
            match parse_datetime(raw, "end_time") {
                Ok(t) => patch.end_time = Some(t),
                Err(e) => errors.push(e),
            }
        }
        if let Some(raw) = &self.agenda_type {
            match raw.parse() {
                Ok(t) => patch.agenda_type = Some(t),
                Err(e) => errors.push(e),
            }
        }

        if errors.is_empty() {
            Ok(patch)
        } else {
            Err(AppError::Validation(errors))
        }
    }
}

impl AgendaPatch {
    /// Merge onto the stored agenda. The merged times must stay ordered.
    pub fn apply(self, mut agenda: Agenda) -> Result<Agenda, AppError> {
        if let Some(title) = self.title {
            agenda.title = title;
        }
        if let Some(description) = self.description {
            agenda.description = description;
        }
        if let Some(start) = self.start_time {
            agenda.start_time = start;
        }
        if let Some(end) = self.end_time {
            agenda.end_time = end;
        }
        if let Some(agenda_type) = self.agenda_type {
            agenda.agenda_type = agenda_type;
        }
        if agenda.end_time <= agenda.start_time {
            return Err(AppError::invalid("end_time must be after start_time"));
        }
        Ok(agenda)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap().and_hms_opt(h, m, 0).unwrap()
    }

    fn stored() -> Agenda {
        Agenda {
            id: 1,
            title: "Rapat Pleno".into(),
            description: Some("Bahas proker".into()),
            qr_code: "AGENDA-abcd1234".into(),
            start_time: at(9, 0),
            end_time: at(11, 0),
            user_id: 3,
            agenda_type: AgendaType::Semua,
            created_at: at(8, 0),
            updated_at: at(8, 0),
        }
    }

    #[test]
    fn create_defaults_type_to_semua() {
        let req = AgendaCreateRequest {
            title: " Rapat ".into(),
            description: Some("  ".into()),
            start_time: "2025-01-01T09:00".into(),
            end_time: "2025-01-01T11:00".into(),
            agenda_type: None,
        };
        let new = req.validate().unwrap();
        assert_eq!(new.title, "Rapat");
        assert_eq!(new.agenda_type, AgendaType::Semua);
        assert!(new.description.is_none());
    }

    #[test]
    fn create_rejects_end_not_after_start() {
        let req = AgendaCreateRequest {
            title: "Rapat".into(),
            description: None,
            start_time: "2025-01-01T09:00".into(),
            end_time: "2025-01-01T09:00".into(),
            agenda_type: Some("pengurus".into()),
        };
        let err = req.validate().unwrap_err();
        assert_eq!(err.to_string(), "end_time must be after start_time");
    }

    #[test]
    fn create_collects_every_field_error() {
        let req = AgendaCreateRequest {
            title: String::new(),
            description: None,
            start_time: "tomorrow".into(),
            end_time: "2025-01-01T09:00".into(),
            agenda_type: Some("rahasia".into()),
        };
        match req.validate().unwrap_err() {
            AppError::Validation(errors) => assert_eq!(errors.len(), 3),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn patch_leaves_omitted_fields_untouched() {
        let patch = AgendaUpdateRequest {
            title: Some("Rapat Evaluasi".into()),
            ..Default::default()
        }
        .validate()
        .unwrap();
        let merged = patch.apply(stored()).unwrap();
        assert_eq!(merged.title, "Rapat Evaluasi");
        assert_eq!(merged.description.as_deref(), Some("Bahas proker"));
        assert_eq!(merged.start_time, at(9, 0));
        assert_eq!(merged.qr_code, "AGENDA-abcd1234");
    }

    #[test]
    fn patch_checks_merged_time_order() {
        let patch = AgendaUpdateRequest {
            start_time: Some("2025-01-01T12:00".into()),
            ..Default::default()
        }
        .validate()
        .unwrap();
        assert!(patch.apply(stored()).is_err());
    }

    #[test]
    fn empty_description_clears_it() {
        let patch = AgendaUpdateRequest {
            description: Some(String::new()),
            ..Default::default()
        }
        .validate()
        .unwrap();
        assert!(patch.apply(stored()).unwrap().description.is_none());
    }
}
