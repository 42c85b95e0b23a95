use serde_json::Value;

pub enum NullableValue {
    Omitted,
    Null,
    String(String),
}

pub fn classify_nullable(optional_value: Option<&Value>) -> Result<NullableValue, String> {
    match optional_value {
        None => Ok(NullableValue::Omitted),
        Some(Value::Null) => Ok(NullableValue::Null),
        Some(Value::String(s)) => Ok(NullableValue::String(s.to_owned())),
        Some(other) => Err(format!("expected string or null, got {other}")),
    }
}

/// Returns the string value of `field`, rejecting non-string JSON values.
pub fn optional_string(body: &Value, field: &str) -> Result<Option<String>, String> {
    match body.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.to_owned())),
        Some(other) => Err(format!("{field} must be a string, got {other}")),
    }
}

/// One "`<field>` is required" message for every absent or blank field.
pub fn required_fields(fields: &[(&str, Option<&str>)]) -> Vec<String> {
    fields
        .iter()
        .filter(|(_, value)| value.map_or(true, |v| v.trim().is_empty()))
        .map(|(name, _)| format!("{name} is required"))
        .collect()
}

/// One "`<field>` must be at most N characters" message for every value
/// longer than its column allows. Lengths count characters, as `VARCHAR(n)`
/// does.
pub fn length_errors(fields: &[(&str, Option<&str>, usize)]) -> Vec<String> {
    fields
        .iter()
        .filter(|(_, value, max)| value.is_some_and(|v| v.chars().count() > *max))
        .map(|(name, _, max)| format!("{name} must be at most {max} characters"))
        .collect()
}
