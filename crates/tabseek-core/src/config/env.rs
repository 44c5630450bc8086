use crate::error::{Result, TabSeekError};

#[must_use]
pub(super) fn read_non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Absent means `default_value`; anything else must parse and reach `min_value`.
pub(super) fn parse_u64_at_least(
    name: &str,
    raw: Option<&str>,
    default_value: u64,
    min_value: u64,
) -> Result<u64> {
    let Some(raw) = raw else {
        return Ok(default_value);
    };
    match raw.trim().parse::<u64>() {
        Ok(value) if value >= min_value => Ok(value),
        _ => Err(TabSeekError::Validation(format!(
            "invalid {name}: {raw} (expected an integer >= {min_value})"
        ))),
    }
}

pub(super) fn parse_usize_at_least(
    name: &str,
    raw: Option<&str>,
    default_value: usize,
    min_value: usize,
) -> Result<usize> {
    let value = parse_u64_at_least(name, raw, default_value as u64, min_value as u64)?;
    usize::try_from(value)
        .map_err(|_| TabSeekError::Validation(format!("invalid {name}: {value} is too large")))
}

#[must_use]
pub(super) fn parse_enabled_default_true(raw: Option<&str>) -> bool {
    !matches!(
        raw.map(|value| value.trim().to_ascii_lowercase())
            .as_deref(),
        Some("off" | "none" | "0" | "false")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_parsers_default_only_when_unset() {
        assert_eq!(parse_u64_at_least("T", Some(" 250 "), 2_000, 1).expect("parse"), 250);
        assert_eq!(parse_u64_at_least("T", None, 2_000, 1).expect("default"), 2_000);
        assert_eq!(parse_usize_at_least("Q", None, 256, 1).expect("default"), 256);
    }

    #[test]
    fn numeric_parsers_reject_garbage_and_values_below_minimum() {
        let err = parse_u64_at_least("TABSEEK_RPC_TIMEOUT_MS", Some("soon"), 2_000, 1)
            .expect_err("garbage");
        assert!(err.to_string().contains("TABSEEK_RPC_TIMEOUT_MS"));
        assert!(parse_u64_at_least("T", Some("0"), 2_000, 1).is_err());
        assert!(parse_usize_at_least("Q", Some("-4"), 256, 1).is_err());
    }

    #[test]
    fn enabled_flag_defaults_on() {
        assert!(parse_enabled_default_true(None));
        assert!(parse_enabled_default_true(Some("yes")));
        assert!(!parse_enabled_default_true(Some(" OFF ")));
        assert!(!parse_enabled_default_true(Some("0")));
    }
}
