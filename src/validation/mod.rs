use bigdecimal::BigDecimal;
use std::fmt;

pub const TITLE_MAX_LEN: usize = 200;
pub const DESCRIPTION_MAX_LEN: usize = 5000;
pub const MESSAGE_MAX_LEN: usize = 2000;
pub const ADDRESS_MAX_LEN: usize = 255;
pub const CODE_MAX_LEN: usize = 50;
pub const FILENAME_MAX_LEN: usize = 255;
pub const URL_MAX_LEN: usize = 2048;
pub const KEYWORD_MAX_LEN: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| ch.is_whitespace() || !ch.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Trims a free-text value, keeping line breaks but dropping other control
/// characters.
pub fn sanitize_text(value: &str) -> String {
    value
        .chars()
        .filter(|ch| *ch == '\n' || !ch.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Blank input means "not supplied".
pub fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(sanitize_string)
        .filter(|cleaned| !cleaned.is_empty())
}

/// Lower-cased code such as `first_lien` or `monthly`.
pub fn normalize_code(value: &str) -> String {
    sanitize_string(value).to_lowercase().replace([' ', '-'], "_")
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.chars().count() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

pub fn validate_text(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    validate_required(field, value)?;
    validate_max_len(field, value, max_len)
}

pub fn validate_positive_amount(field: &'static str, amount: &BigDecimal) -> ValidationResult {
    if amount <= &BigDecimal::from(0) {
        return Err(ValidationError::new(field, "must be greater than zero"));
    }

    Ok(())
}

pub fn validate_non_negative(field: &'static str, amount: &BigDecimal) -> ValidationResult {
    if amount < &BigDecimal::from(0) {
        return Err(ValidationError::new(field, "must not be negative"));
    }

    Ok(())
}

pub fn validate_percentage(field: &'static str, value: &BigDecimal) -> ValidationResult {
    if value < &BigDecimal::from(0) || value > &BigDecimal::from(100) {
        return Err(ValidationError::new(field, "must be between 0 and 100"));
    }

    Ok(())
}

/// Two-letter US state code, returned upper-cased.
pub fn validate_state_code(value: &str) -> Result<String, ValidationError> {
    let code = sanitize_string(value).to_uppercase();
    if code.len() != 2 || !code.chars().all(|ch| ch.is_ascii_uppercase()) {
        return Err(ValidationError::new(
            "propertyState",
            "must be a two-letter state code",
        ));
    }

    Ok(code)
}

/// Five-digit ZIP or ZIP+4.
pub fn validate_zip(value: &str) -> Result<String, ValidationError> {
    let zip = sanitize_string(value);
    let valid = match zip.split_once('-') {
        Some((head, tail)) => {
            head.len() == 5
                && tail.len() == 4
                && head.chars().chain(tail.chars()).all(|ch| ch.is_ascii_digit())
        }
        None => zip.len() == 5 && zip.chars().all(|ch| ch.is_ascii_digit()),
    };

    if !valid {
        return Err(ValidationError::new(
            "propertyZip",
            "must be a 5-digit ZIP or ZIP+4",
        ));
    }

    Ok(zip)
}

pub fn validate_url(field: &'static str, value: &str) -> ValidationResult {
    validate_text(field, value, URL_MAX_LEN)?;
    url::Url::parse(value).map_err(|_| ValidationError::new(field, "must be a valid URL"))?;
    Ok(())
}
