use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;

use crate::errors::AppError;

/// A registration may name at most this many divisions.
pub const MAX_DIVISIONS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl RegistrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::Pending => "pending",
            RegistrationStatus::Approved => "approved",
            RegistrationStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for RegistrationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pending" => Ok(RegistrationStatus::Pending),
            "approved" => Ok(RegistrationStatus::Approved),
            "rejected" => Ok(RegistrationStatus::Rejected),
            _ => Err("status must be one of: pending, approved, rejected".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub id: i64,
    pub user_id: i64,
    pub committee_form_id: i64,
    /// First selected division.
    pub committee_form_division_id: i64,
    pub division_ids: Vec<i64>,
    pub status: RegistrationStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct Registrant {
    pub id: i64,
    pub name: String,
    pub nim: Option<String>,
    pub jabatan: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SelectedDivision {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerDetail {
    pub id: i64,
    pub question_id: i64,
    pub question: String,
    pub answer: String,
}

/// Registration with user, divisions and answers resolved.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationDetail {
    #[serde(flatten)]
    pub registration: Registration,
    pub form_name: String,
    pub user: Registrant,
    pub divisions: Vec<SelectedDivision>,
    pub answers: Vec<AnswerDetail>,
}

/// An answer as submitted: a single string, or a list for multiple choice.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    One(String),
    Many(Vec<String>),
}

impl AnswerValue {
    /// Stored text; list answers are joined with `", "`.
    pub fn to_text(&self) -> String {
        match self {
            AnswerValue::One(s) => s.trim().to_string(),
            AnswerValue::Many(items) => items
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnswerInput {
    pub question_id: i64,
    pub answer: Option<AnswerValue>,
}

/// Body of `POST /committee-forms/register`. Accepts the newer
/// `division_ids` array or the older single `division_id`.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub form_id: i64,
    pub division_id: Option<i64>,
    pub division_ids: Option<Vec<i64>>,
    #[serde(default)]
    pub answers: Vec<AnswerInput>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    #[serde(default)]
    pub status: String,
}

/// Collapse the two request shapes into one ordered list of 1–2 distinct ids.
pub fn normalize_division_ids(
    division_id: Option<i64>,
    division_ids: Option<&[i64]>,
) -> Result<Vec<i64>, AppError> {
    let ids: Vec<i64> = match (division_ids, division_id) {
        (Some(list), _) if !list.is_empty() => list.to_vec(),
        (_, Some(single)) => vec![single],
        _ => Vec::new(),
    };

    if ids.len() > MAX_DIVISIONS {
        return Err(AppError::TooManyDivisions);
    }
    if ids.is_empty() {
        return Err(AppError::invalid("At least one division must be selected"));
    }
    let distinct: HashSet<i64> = ids.iter().copied().collect();
    if distinct.len() != ids.len() {
        return Err(AppError::invalid("The same division cannot be selected twice"));
    }
    Ok(ids)
}
