use std::time::Duration;

/// Parse a boolean flag from a string value, or return the given default value otherwise.
pub fn parse_boolean_flag(value: Option<String>, default: bool) -> bool {
    let value = match value {
        Some(v) => v,
        None => return default,
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

/// Parse a whole number of `unit`s (e.g. `Duration::from_millis`) into a duration. Empty or negative values are
/// rejected.
pub fn parse_duration(value: &str, unit: fn(u64) -> Duration) -> Result<Duration, String> {
    value.trim().parse::<u64>().map(unit).map_err(|e| format!("'{value}' is not a valid duration. {e}"))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn boolean_flags() {
        assert!(parse_boolean_flag(Some("YES".into()), false));
        assert!(!parse_boolean_flag(Some(" off ".into()), true));
        assert!(parse_boolean_flag(Some("maybe".into()), true));
        assert!(!parse_boolean_flag(None, false));
    }

    #[test]
    fn durations() {
        assert_eq!(parse_duration("250", Duration::from_millis), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration(" 3 ", Duration::from_secs), Ok(Duration::from_secs(3)));
        assert!(parse_duration("-1", Duration::from_secs).is_err());
        assert!(parse_duration("", Duration::from_secs).is_err());
    }
}
