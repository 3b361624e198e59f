use serde_json::Value;

/// Masks sensitive fields in JSON payloads before they are logged.
pub fn sanitize_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sanitized = serde_json::Map::new();
            for (key, val) in map {
                let sanitized_val = if is_sensitive_field(key) {
                    mask_value(val)
                } else {
                    sanitize_json(val)
                };
                sanitized.insert(key.clone(), sanitized_val);
            }
            Value::Object(sanitized)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sanitize_json).collect()),
        _ => value.clone(),
    }
}

fn is_sensitive_field(key: &str) -> bool {
    matches!(
        key.to_lowercase().as_str(),
        "password" | "secret" | "token" | "api_key" | "authorization" | "session_secret"
            | "file_url" | "fileurl" | "property_address" | "propertyaddress"
    )
}

fn mask_value(value: &Value) -> Value {
    match value {
        Value::String(s) if s.chars().count() > 8 => {
            let chars: Vec<char> = s.chars().collect();
            let visible: String = chars[..4].iter().collect();
            let end: String = chars[chars.len() - 4..].iter().collect();
            Value::String(format!("{}****{}", visible, end))
        }
        _ => Value::String("****".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sanitize_token() {
        let input = json!({
            "token": "0123456789abcdef",
            "asking_price": "50000.00"
        });

        let sanitized = sanitize_json(&input);
        assert_eq!(sanitized["token"], "0123****cdef");
        assert_eq!(sanitized["asking_price"], "50000.00");
    }

    #[test]
    fn test_sanitize_nested_and_short_values() {
        let input = json!({
            "files": [{ "file_url": "https://files.example.com/deed.pdf", "filename": "deed.pdf" }],
            "secret": "short"
        });

        let sanitized = sanitize_json(&input);
        assert!(sanitized["files"][0]["file_url"].as_str().unwrap().contains("****"));
        assert_eq!(sanitized["files"][0]["filename"], "deed.pdf");
        assert_eq!(sanitized["secret"], "****");
    }

    #[test]
    fn test_multibyte_values_do_not_panic() {
        let sanitized = sanitize_json(&json!({ "password": "ééééééééééé" }));
        assert_eq!(sanitized["password"], "éééé****éééé");
    }
}
