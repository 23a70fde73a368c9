use chrono::NaiveDate;

use crate::attendance;

pub struct ParamErr {
    pub message: String,
}

impl ParamErr {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, ParamErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| ParamErr::new(format!("missing {}", key)))
}

/// Absent, null, and empty-after-trim all mean "not provided".
pub fn get_optional_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

pub fn get_required_date(params: &serde_json::Value, key: &str) -> Result<NaiveDate, ParamErr> {
    let raw = get_required_str(params, key)?;
    attendance::parse_date(&raw)
        .ok_or_else(|| ParamErr::new(format!("{} must be YYYY-MM-DD", key)))
}
