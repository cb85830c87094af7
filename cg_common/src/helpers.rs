/// Reads an on/off flag as it appears in environment variables and form fields. Anything unrecognised is `None`.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Like [`parse_flag`], falling back to `default` when the value is absent or unrecognised.
pub fn parse_boolean_flag<S: AsRef<str>>(value: Option<S>, default: bool) -> bool {
    value.and_then(|v| parse_flag(v.as_ref())).unwrap_or(default)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn flags() {
        assert_eq!(parse_flag("1"), Some(true));
        assert_eq!(parse_flag(" Yes "), Some(true));
        assert_eq!(parse_flag("off"), Some(false));
        assert_eq!(parse_flag(""), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn flags_with_defaults() {
        assert!(parse_boolean_flag(Some("1"), false));
        assert!(!parse_boolean_flag(Some("off".to_string()), true));
        assert!(parse_boolean_flag(Some("maybe"), true));
        assert!(!parse_boolean_flag(None::<String>, false));
        assert!(parse_boolean_flag(None::<&str>, true));
    }
}
