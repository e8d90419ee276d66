use crate::error::CoreError;

const PHONE_MIN_LEN: usize = 7;
const PHONE_MAX_LEN: usize = 20;

pub fn validate_name(name: &str) -> Result<(), CoreError> {
    if name.trim().is_empty() {
        return Err(CoreError::MissingName);
    }
    Ok(())
}

/// Optional leading `+`, then 7 to 20 characters drawn from digits,
/// whitespace, hyphens and parentheses, with at least one digit.
pub fn is_valid_phone(phone: &str) -> bool {
    if phone.is_empty() {
        return true;
    }
    let body = phone.strip_prefix('+').unwrap_or(phone);
    let len = body.chars().count();
    if !(PHONE_MIN_LEN..=PHONE_MAX_LEN).contains(&len) {
        return false;
    }
    let allowed = body
        .chars()
        .all(|c| c.is_ascii_digit() || c.is_whitespace() || matches!(c, '-' | '(' | ')'));
    allowed && body.chars().any(|c| c.is_ascii_digit())
}

pub fn validate_phone(phone: &str) -> Result<(), CoreError> {
    if is_valid_phone(phone) {
        Ok(())
    } else {
        Err(CoreError::InvalidPhone(phone.to_string()))
    }
}
