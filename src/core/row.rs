use serde_json::Value;

/// A single result row: column name to scalar value, in column order.
pub type Row = serde_json::Map<String, Value>;

/// Look up a column regardless of the casing the query produced
/// (`PROJECTNAME`, `projectname`, ...).
pub fn get_ci<'a>(row: &'a Row, name: &str) -> Option<&'a Value> {
    row.iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value)
}

pub fn get_str<'a>(row: &'a Row, name: &str) -> Option<&'a str> {
    get_ci(row, name).and_then(Value::as_str)
}

pub fn get_f64(row: &Row, name: &str) -> Option<f64> {
    get_ci(row, name).and_then(value_as_f64)
}

/// Numeric coercion for scalar cells; tolerates numbers the driver or the
/// model rendered as formatted strings ("1,950,000,000.00").
pub fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.replace(',', "").trim().parse().ok(),
        _ => None,
    }
}
