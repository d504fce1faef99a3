use crate::docx::units::AUTO_LINE_PTS;
use crate::model::{FormattingProperties, PropertyValue};

use super::report::Severity;

/// Compared case-insensitively; every other text field is exact.
const CASE_INSENSITIVE_FIELDS: &[&str] = &["FontFamily", "Alignment"];

const HIGH_FIELDS: &[&str] = &["FontFamily", "Color"];
const MEDIUM_FIELDS: &[&str] = &["FontSize", "IsBold", "IsItalic", "Alignment", "LineSpacing"];

const HIGH_PATTERN_FIELDS: &[&str] = &["FontFamily", "Color"];
const MEDIUM_PATTERN_FIELDS: &[&str] = &["FontSize", "IsBold", "IsItalic"];

/// Absorbs f32 rounding so a difference equal to the tolerance still passes.
const TOLERANCE_EPSILON: f32 = 1e-4;

fn values_equal(field: &str, expected: &PropertyValue, actual: &PropertyValue, tolerance: f32) -> bool {
    match (expected, actual) {
        (PropertyValue::Number(e), PropertyValue::Number(a)) => {
            (e - a).abs() <= tolerance + TOLERANCE_EPSILON
        }
        (PropertyValue::Text(e), PropertyValue::Text(a)) if CASE_INSENSITIVE_FIELDS.contains(&field) => {
            e.eq_ignore_ascii_case(a)
        }
        _ => expected == actual,
    }
}

/// `auto` line spacing is a multiplier; a missing rule means `auto`.
fn spacing_is_multiplier(props: &FormattingProperties) -> bool {
    !matches!(props.line_spacing_rule.as_deref(), Some("exact" | "atLeast"))
}

/// Multipliers are compared as points on a single-spaced 12pt line.
fn comparable(name: &str, value: PropertyValue, owner: &FormattingProperties) -> PropertyValue {
    match value {
        PropertyValue::Number(n) if name == "LineSpacing" && spacing_is_multiplier(owner) => {
            PropertyValue::Number(n * AUTO_LINE_PTS)
        }
        other => other,
    }
}

/// Field-by-field differences in declaration order. A field set only on the
/// actual side is reported as `Extra_<field>`.
pub fn diff_properties(
    expected: &FormattingProperties,
    actual: &FormattingProperties,
    tolerance: f32,
) -> Vec<String> {
    let mut fields = Vec::new();
    for &name in FormattingProperties::FIELD_NAMES {
        match (expected.get(name), actual.get(name)) {
            (Some(e), Some(a)) => {
                let e = comparable(name, e, expected);
                let a = comparable(name, a, actual);
                if !values_equal(name, &e, &a, tolerance) {
                    fields.push(name.to_string());
                }
            }
            (Some(_), None) => fields.push(name.to_string()),
            (None, Some(_)) => fields.push(format!("Extra_{name}")),
            (None, None) => {}
        }
    }
    fields
}

fn base_name(field: &str) -> &str {
    field.strip_prefix("Extra_").unwrap_or(field)
}

fn classify(fields: &[String], high: &[&str], medium: &[&str]) -> Severity {
    fields
        .iter()
        .map(|f| {
            let name = base_name(f);
            if high.contains(&name) {
                Severity::High
            } else if medium.contains(&name) {
                Severity::Medium
            } else {
                Severity::Low
            }
        })
        .max()
        .unwrap_or(Severity::Low)
}

/// Severity of a property diff: the worst field decides.
pub fn property_severity(fields: &[String]) -> Severity {
    classify(fields, HIGH_FIELDS, MEDIUM_FIELDS)
}

/// Severity of a direct-format pattern diff.
pub fn pattern_severity(fields: &[String]) -> Severity {
    classify(fields, HIGH_PATTERN_FIELDS, MEDIUM_PATTERN_FIELDS)
}
