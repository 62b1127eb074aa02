//! Robust numeric coercion and template rendering for catalog fields.
//!
//! Catalog columns may arrive as TEXT ("480", "297.00") or as numbers, and
//! any of them may be missing. Renderers never emit a raw null or a
//! type-error artefact; unusable fields render as [`PLACEHOLDER`].

use serde_json::Value;

/// Neutral placeholder shown wherever a source column is null or unparsable.
pub const PLACEHOLDER: &str = "dato no encontrado";

/// Maximum number of sessions listed in short views.
pub const SHORT_VIEW_SESSION_CAP: usize = 5;

/// Coerces a JSON value (string or number) to f64.
pub fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => f64_from_str(s),
        _ => None,
    }
}

/// Coerces a JSON value (string or number) to i64. Fractional strings are
/// truncated ("480.0" -> 480).
pub fn coerce_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => f64_from_str(s).map(|f| f as i64),
        _ => None,
    }
}

/// Parses a numeric string, tolerating surrounding whitespace and a currency
/// prefix ("$297.00" -> 297.0).
pub fn f64_from_str(s: &str) -> Option<f64> {
    let trimmed = s.trim().trim_start_matches('$').trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok()
}

/// Renders a duration in minutes as "Xh Ym" when >= 60, otherwise "Zm".
pub fn render_duration(minutes: Option<i64>) -> String {
    match minutes {
        Some(m) if m >= 60 => {
            let h = m / 60;
            let rem = m % 60;
            if rem == 0 {
                format!("{}h", h)
            } else {
                format!("{}h {}m", h, rem)
            }
        }
        Some(m) if m >= 0 => format!("{}m", m),
        _ => PLACEHOLDER.to_string(),
    }
}

/// Renders a price: integer USD when the fractional part is zero, otherwise
/// two decimals. Currency defaults to "USD" when missing.
pub fn render_price(price: Option<f64>, currency: Option<&str>) -> String {
    match price {
        Some(p) if p.is_finite() && p >= 0.0 => {
            let cur = currency.unwrap_or("USD");
            if p.fract() == 0.0 {
                format!("${:.0} {}", p, cur)
            } else {
                format!("${:.2} {}", p, cur)
            }
        }
        _ => PLACEHOLDER.to_string(),
    }
}

/// Renders an optional text field, substituting the placeholder for null or
/// blank columns.
pub fn render_text(field: Option<&str>) -> String {
    match field {
        Some(s) if !s.trim().is_empty() => s.trim().to_string(),
        _ => PLACEHOLDER.to_string(),
    }
}

/// Renders an optional count ("12 sesiones" style callers own the noun).
pub fn render_count(count: Option<i64>) -> String {
    match count {
        Some(c) if c >= 0 => c.to_string(),
        _ => PLACEHOLDER.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn coerces_strings_and_numbers() {
        assert_eq!(coerce_f64(&json!("297.00")), Some(297.0));
        assert_eq!(coerce_f64(&json!(297)), Some(297.0));
        assert_eq!(coerce_f64(&json!("$297.00")), Some(297.0));
        assert_eq!(coerce_f64(&json!("no price")), None);
        assert_eq!(coerce_f64(&json!(null)), None);
        assert_eq!(coerce_i64(&json!("480")), Some(480));
        assert_eq!(coerce_i64(&json!("480.0")), Some(480));
        assert_eq!(coerce_i64(&json!(480.9)), Some(480));
    }

    #[test]
    fn duration_renders_hours_and_minutes() {
        assert_eq!(render_duration(Some(480)), "8h");
        assert_eq!(render_duration(Some(90)), "1h 30m");
        assert_eq!(render_duration(Some(45)), "45m");
        assert_eq!(render_duration(None), PLACEHOLDER);
        assert_eq!(render_duration(Some(-5)), PLACEHOLDER);
    }

    #[test]
    fn price_renders_integer_or_two_decimals() {
        assert_eq!(render_price(Some(297.0), Some("USD")), "$297 USD");
        assert_eq!(render_price(Some(297.5), Some("USD")), "$297.50 USD");
        assert_eq!(render_price(Some(199.0), None), "$199 USD");
        assert_eq!(render_price(None, Some("USD")), PLACEHOLDER);
        assert_eq!(render_price(Some(f64::NAN), None), PLACEHOLDER);
    }

    #[test]
    fn null_columns_render_placeholder_never_artefacts() {
        assert_eq!(render_text(None), PLACEHOLDER);
        assert_eq!(render_text(Some("  ")), PLACEHOLDER);
        assert_eq!(render_text(Some(" Nivel intermedio ")), "Nivel intermedio");
        assert_eq!(render_count(None), PLACEHOLDER);
    }
}
