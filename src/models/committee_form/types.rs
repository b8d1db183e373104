use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;

use crate::auth::validate::validate_required;
use crate::errors::AppError;

pub const NAME_MAX_LEN: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormStatus {
    #[default]
    Active,
    Inactive,
}

impl FormStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormStatus::Active => "active",
            FormStatus::Inactive => "inactive",
        }
    }
}

impl FromStr for FormStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "active" => Ok(FormStatus::Active),
            "inactive" => Ok(FormStatus::Inactive),
            _ => Err("status must be one of: active, inactive".to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Text,
    Textarea,
    MultipleChoice,
    Radio,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Text => "text",
            QuestionType::Textarea => "textarea",
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::Radio => "radio",
        }
    }

    /// Choice questions carry a list of options.
    pub fn is_choice(&self) -> bool {
        matches!(self, QuestionType::MultipleChoice | QuestionType::Radio)
    }
}

impl FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "text" => Ok(QuestionType::Text),
            "textarea" => Ok(QuestionType::Textarea),
            "multiple_choice" => Ok(QuestionType::MultipleChoice),
            "radio" => Ok(QuestionType::Radio),
            other => Err(format!(
                "question type '{other}' must be one of: text, textarea, multiple_choice, radio"
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CommitteeForm {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub status: FormStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct Division {
    pub id: i64,
    pub committee_form_id: i64,
    pub name: String,
    pub quota: i32,
    pub order: i32,
}

/// Division with its registration bookkeeping.
#[derive(Debug, Clone, Serialize)]
pub struct DivisionSummary {
    #[serde(flatten)]
    pub division: Division,
    pub registrant_count: i64,
    pub approved_count: i64,
    pub remaining_quota: i64,
}

impl DivisionSummary {
    pub fn new(division: Division, registrant_count: i64, approved_count: i64) -> Self {
        let remaining_quota = (i64::from(division.quota) - approved_count).max(0);
        DivisionSummary { division, registrant_count, approved_count, remaining_quota }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Question {
    pub id: i64,
    pub committee_form_id: i64,
    pub question: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub options: Option<Vec<String>>,
    pub required: bool,
    pub order: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommitteeFormListItem {
    #[serde(flatten)]
    pub form: CommitteeForm,
    pub creator_name: String,
    pub division_count: i64,
    pub question_count: i64,
    pub registration_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommitteeFormDetail {
    #[serde(flatten)]
    pub form: CommitteeForm,
    pub divisions: Vec<DivisionSummary>,
    pub questions: Vec<Question>,
}

#[derive(Debug, Deserialize)]
pub struct DivisionInput {
    pub id: Option<i64>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub quota: i64,
}

#[derive(Debug, Deserialize)]
pub struct QuestionInput {
    pub id: Option<i64>,
    #[serde(default)]
    pub question: String,
    #[serde(rename = "type", default)]
    pub question_type: String,
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub required: bool,
}

/// Body of `POST /committee-forms` and `PUT /committee-forms/{id}`.
#[derive(Debug, Deserialize)]
pub struct CommitteeFormRequest {
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub divisions: Vec<DivisionInput>,
    #[serde(default)]
    pub questions: Vec<QuestionInput>,
}

/// Validated division; `id` set means "keep this existing division".
#[derive(Debug, Clone)]
pub struct NewDivision {
    pub id: Option<i64>,
    pub name: String,
    pub quota: i32,
}

#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub id: Option<i64>,
    pub question: String,
    pub question_type: QuestionType,
    pub options: Option<Vec<String>>,
    pub required: bool,
}

#[derive(Debug, Clone)]
pub struct FormInput {
    pub name: String,
    pub description: Option<String>,
    pub status: Option<FormStatus>,
    pub divisions: Vec<NewDivision>,
    pub questions: Vec<NewQuestion>,
}

/// Options are kept only for choice questions; blank entries are dropped and
/// an empty list is stored as null.
fn clean_options(question_type: QuestionType, options: Option<&[String]>) -> Option<Vec<String>> {
    if !question_type.is_choice() {
        return None;
    }
    let cleaned: Vec<String> = options?
        .iter()
        .map(|o| o.trim())
        .filter(|o| !o.is_empty())
        .map(String::from)
        .collect();
    (!cleaned.is_empty()).then_some(cleaned)
}

fn push_duplicate_ids(errors: &mut Vec<String>, ids: impl Iterator<Item = i64>, what: &str) {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            errors.push(format!("{what} {id} is listed more than once"));
        }
    }
}

impl CommitteeFormRequest {
    pub fn validate(&self) -> Result<FormInput, AppError> {
        let mut errors = Vec::new();

        if let Some(e) = validate_required(&self.name, "Name", NAME_MAX_LEN) {
            errors.push(e);
        }
        let status = match self.status.as_deref() {
            None => None,
            Some(raw) => raw.parse::<FormStatus>().map_err(|e| errors.push(e)).ok(),
        };

        if self.divisions.is_empty() {
            errors.push("At least one division is required".to_string());
        }
        let mut divisions = Vec::with_capacity(self.divisions.len());
        for (i, d) in self.divisions.iter().enumerate() {
            let label = format!("Division #{}", i + 1);
            if let Some(e) = validate_required(&d.name, &format!("{label} name"), NAME_MAX_LEN) {
                errors.push(e);
            }
            let quota = match i32::try_from(d.quota) {
                Ok(q) if q >= 0 => q,
                _ => {
                    errors.push(format!("{label} quota must be a non-negative number"));
                    0
                }
            };
            divisions.push(NewDivision { id: d.id, name: d.name.trim().to_string(), quota });
        }
        push_duplicate_ids(&mut errors, self.divisions.iter().filter_map(|d| d.id), "Division");

        if self.questions.is_empty() {
            errors.push("At least one question is required".to_string());
        }
        let mut questions = Vec::with_capacity(self.questions.len());
        for (i, q) in self.questions.iter().enumerate() {
            let label = format!("Question #{}", i + 1);
            if q.question.trim().is_empty() {
                errors.push(format!("{label} text is required"));
            }
            match q.question_type.parse::<QuestionType>() {
                Ok(question_type) => questions.push(NewQuestion {
                    id: q.id,
                    question: q.question.trim().to_string(),
                    question_type,
                    options: clean_options(question_type, q.options.as_deref()),
                    required: q.required,
                }),
                Err(e) => errors.push(format!("{label}: {e}")),
            }
        }
        push_duplicate_ids(&mut errors, self.questions.iter().filter_map(|q| q.id), "Question");

        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        Ok(FormInput {
            name: self.name.trim().to_string(),
            description: self
                .description
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(String::from),
            status,
            divisions,
            questions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn division(name: &str, quota: i64) -> DivisionInput {
        DivisionInput { id: None, name: name.into(), quota }
    }

    fn question(text: &str, kind: &str, options: Option<Vec<&str>>) -> QuestionInput {
        QuestionInput {
            id: None,
            question: text.into(),
            question_type: kind.into(),
            options: options.map(|o| o.into_iter().map(String::from).collect()),
            required: true,
        }
    }

    fn request(divisions: Vec<DivisionInput>, questions: Vec<QuestionInput>) -> CommitteeFormRequest {
        CommitteeFormRequest {
            name: "Open Recruitment Panitia Dies Natalis".into(),
            description: None,
            status: None,
            divisions,
            questions,
        }
    }

    #[test]
    fn valid_form_keeps_submitted_order() {
        let input = request(
            vec![division("Multimedia", 2), division("Jurnalistik", 3)],
            vec![
                question("Motivasi?", "textarea", None),
                question("Shift?", "radio", Some(vec!["Pagi", " ", "Malam"])),
            ],
        )
        .validate()
        .unwrap();
        assert_eq!(input.divisions[0].name, "Multimedia");
        assert_eq!(input.divisions[1].quota, 3);
        assert_eq!(input.questions[1].options.as_deref(), Some(&["Pagi".to_string(), "Malam".to_string()][..]));
        assert!(input.status.is_none());
    }

    #[test]
    fn choice_question_without_options_stores_null() {
        let input = request(
            vec![division("Acara", 0)],
            vec![question("Pilih", "multiple_choice", None)],
        )
        .validate()
        .unwrap();
        assert!(input.questions[0].options.is_none());
    }

    #[test]
    fn text_question_drops_options() {
        let input = request(
            vec![division("Acara", 1)],
            vec![question("Nama panggilan", "text", Some(vec!["a", "b"]))],
        )
        .validate()
        .unwrap();
        assert!(input.questions[0].options.is_none());
    }

    #[test]
    fn rejects_empty_sets_negative_quota_and_bad_type() {
        let err = request(vec![], vec![]).validate().unwrap_err();
        match err {
            AppError::Validation(errors) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected {other:?}"),
        }

        let err = request(vec![division("Acara", -1)], vec![question("Q", "checkbox", None)])
            .validate()
            .unwrap_err();
        match err {
            AppError::Validation(errors) => {
                assert!(errors.iter().any(|e| e.contains("quota")));
                assert!(errors.iter().any(|e| e.contains("checkbox")));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn duplicate_division_ids_are_rejected() {
        let mut divisions = vec![division("A", 1), division("B", 1)];
        divisions[0].id = Some(4);
        divisions[1].id = Some(4);
        assert!(request(divisions, vec![question("Q", "text", None)]).validate().is_err());
    }

    #[test]
    fn remaining_quota_never_negative() {
        let d = Division { id: 1, committee_form_id: 1, name: "Acara".into(), quota: 2, order: 0 };
        assert_eq!(DivisionSummary::new(d.clone(), 5, 1).remaining_quota, 1);
        assert_eq!(DivisionSummary::new(d, 5, 4).remaining_quota, 0);
    }
}
