use serde_json::json;

use super::config::AppConfig;
use super::row::*;

#[test]
fn test_config_defaults() {
    let config = AppConfig::default();
    assert_eq!(config.page_size, 10);
    assert_eq!(config.session_ttl_secs, 3600);
    assert_eq!(config.budget.plausible_max, 1_000_000_000.0);
    assert_eq!(config.budget.magnitude_factor, 10.0);
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_rejects_zero_page_size() {
    let config = AppConfig {
        page_size: 0,
        ..AppConfig::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_config_rejects_nonpositive_budget_ceiling() {
    let mut config = AppConfig::default();
    config.budget.plausible_max = 0.0;
    assert!(config.validate().is_err());
}

#[test]
fn test_row_lookup_is_case_insensitive() {
    let row: Row = json!({"PROJECTNAME": "Nkhoma Bridge", "BUDGET": 42.5})
        .as_object()
        .cloned()
        .expect("object");

    assert_eq!(get_str(&row, "projectname"), Some("Nkhoma Bridge"));
    assert_eq!(get_f64(&row, "budget"), Some(42.5));
    assert!(get_ci(&row, "district").is_none());
}

#[test]
fn test_value_coercion_handles_formatted_strings() {
    assert_eq!(value_as_f64(&json!(195_000_000.0)), Some(195_000_000.0));
    assert_eq!(
        value_as_f64(&json!("1,950,000,000.00")),
        Some(1_950_000_000.0)
    );
    assert_eq!(value_as_f64(&json!("n/a")), None);
    assert_eq!(value_as_f64(&json!(null)), None);
}
