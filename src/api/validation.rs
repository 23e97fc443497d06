use serde_json::{Map, Value};

use crate::api::errors::ApiError;
use crate::core::time::parse_rfc3339;

pub(crate) const MAX_STUDENT_ID_DIGITS: usize = 8;
pub(crate) const MAX_EXAM_ID_LEN: usize = 64;
pub(crate) const MAX_ANSWER_KEYS: usize = 500;
pub(crate) const MAX_ANSWER_KEY_LEN: usize = 128;

pub(crate) fn validate_student_id_number(value: Option<&str>) -> Result<&str, ApiError> {
    let value = value.map(str::trim).unwrap_or_default();
    if value.is_empty() {
        return Err(ApiError::BadRequest("studentIDNumber is required".to_string()));
    }

    let valid =
        value.len() <= MAX_STUDENT_ID_DIGITS && value.chars().all(|c| c.is_ascii_digit());
    if valid {
        Ok(value)
    } else {
        Err(ApiError::BadRequest(format!(
            "studentIDNumber must be 1 to {MAX_STUDENT_ID_DIGITS} digits"
        )))
    }
}

pub(crate) fn validate_exam_id(value: Option<&str>) -> Result<&str, ApiError> {
    let value = value.map(str::trim).unwrap_or_default();
    if value.is_empty() {
        return Err(ApiError::BadRequest("examID is required".to_string()));
    }

    let valid = value.len() <= MAX_EXAM_ID_LEN
        && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(value)
    } else {
        Err(ApiError::BadRequest("Invalid examID format".to_string()))
    }
}

pub(crate) fn validate_answers(answers: &Map<String, Value>) -> Result<(), ApiError> {
    if answers.len() > MAX_ANSWER_KEYS {
        return Err(ApiError::BadRequest(format!(
            "answers may contain at most {MAX_ANSWER_KEYS} entries"
        )));
    }

    match answers.keys().find(|key| key.is_empty() || key.len() > MAX_ANSWER_KEY_LEN) {
        Some(key) => Err(ApiError::BadRequest(format!("Invalid answer key '{key}'"))),
        None => Ok(()),
    }
}

pub(crate) fn validate_tab_switch_timestamps(timestamps: &[String]) -> Result<(), ApiError> {
    match timestamps.iter().find(|value| parse_rfc3339(value).is_none()) {
        Some(value) => Err(ApiError::BadRequest(format!(
            "tabSwitchTimestamps entry '{value}' is not an RFC 3339 timestamp"
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn student_id_number_accepts_up_to_eight_digits() {
        assert_eq!(validate_student_id_number(Some("12345678")).ok(), Some("12345678"));
        assert_eq!(validate_student_id_number(Some(" 42 ")).ok(), Some("42"));
        assert!(validate_student_id_number(Some("123456789")).is_err());
        assert!(validate_student_id_number(Some("12a45")).is_err());
        assert!(validate_student_id_number(Some("")).is_err());
        assert!(validate_student_id_number(None).is_err());
    }

    #[test]
    fn exam_id_rejects_paths_and_blank_values() {
        assert!(validate_exam_id(Some("dsalgo1-finals")).is_ok());
        assert!(validate_exam_id(Some("exam_2025")).is_ok());
        assert!(validate_exam_id(Some("../etc")).is_err());
        assert!(validate_exam_id(Some("   ")).is_err());
        assert!(validate_exam_id(Some(&"x".repeat(MAX_EXAM_ID_LEN + 1))).is_err());
    }

    #[test]
    fn answers_are_bounded() {
        let ok = json!({"q1": "a", "part1Submitted": true});
        assert!(validate_answers(ok.as_object().unwrap()).is_ok());

        let mut too_many = Map::new();
        for index in 0..=MAX_ANSWER_KEYS {
            too_many.insert(format!("q{index}"), json!("a"));
        }
        assert!(validate_answers(&too_many).is_err());

        let mut long_key = Map::new();
        long_key.insert("k".repeat(MAX_ANSWER_KEY_LEN + 1), json!("a"));
        assert!(validate_answers(&long_key).is_err());
    }

    #[test]
    fn timestamps_must_be_rfc3339() {
        let valid = vec!["2025-05-14T08:01:00Z".to_string(), "2025-05-14T16:01:00+08:00".into()];
        assert!(validate_tab_switch_timestamps(&valid).is_ok());
        assert!(validate_tab_switch_timestamps(&["5 minutes ago".to_string()]).is_err());
    }
}
