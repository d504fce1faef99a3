use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::model::{
    DirectFormatPattern, FormattingContext, FormattingProperties, PropertyValue, StructuralRole,
    StyleRecord, StyleType,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum MismatchKind {
    /// Matched pair whose effective properties differ.
    PropertyMismatch,
    /// Template style with no counterpart in the document.
    MissingStyle,
    /// Document style with no template counterpart on a non-structural element.
    ExtraStyle,
    /// Document style with no template counterpart on an element that exists
    /// for structural reasons.
    UnexpectedFormatting,
    MissingDirectFormatting,
    DirectFormattingMismatch,
    ExtraDirectFormatting,
}

impl MismatchKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MismatchKind::PropertyMismatch => "PropertyMismatch",
            MismatchKind::MissingStyle => "MissingStyle",
            MismatchKind::ExtraStyle => "ExtraStyle",
            MismatchKind::UnexpectedFormatting => "UnexpectedFormatting",
            MismatchKind::MissingDirectFormatting => "MissingDirectFormatting",
            MismatchKind::DirectFormattingMismatch => "DirectFormattingMismatch",
            MismatchKind::ExtraDirectFormatting => "ExtraDirectFormatting",
        }
    }
}

impl fmt::Display for MismatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type PropertyMap = BTreeMap<String, PropertyValue>;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MismatchRecord {
    pub kind: MismatchKind,
    pub context_key: String,
    pub location: String,
    pub structural_role: StructuralRole,
    pub style_type: StyleType,
    pub style_name: String,
    pub expected: PropertyMap,
    pub actual: PropertyMap,
    pub mismatched_fields: Vec<String>,
    pub sample_text: String,
    pub severity: Severity,
    pub recommended_action: String,
}

pub(crate) fn property_map(props: &FormattingProperties) -> PropertyMap {
    props
        .values()
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

fn status_map(status: &str) -> PropertyMap {
    let mut map = PropertyMap::new();
    map.insert("Status".to_string(), PropertyValue::Text(status.to_string()));
    map
}

/// Location and sample text from whichever side has a populated context,
/// preferring the document.
fn pick_context<'a>(
    template: &'a FormattingContext,
    document: Option<&'a FormattingContext>,
) -> &'a FormattingContext {
    match document {
        Some(doc) if !doc.sample_text.trim().is_empty() || template.sample_text.trim().is_empty() => {
            doc
        }
        _ => template,
    }
}

fn describe_changes(fields: &[String], expected: &PropertyMap, actual: &PropertyMap) -> String {
    let mut parts = Vec::new();
    for field in fields {
        if let Some(name) = field.strip_prefix("Extra_") {
            if let Some(value) = actual.get(name) {
                parts.push(format!("remove {name} {value}"));
            }
            continue;
        }
        match (expected.get(field.as_str()), actual.get(field.as_str())) {
            (Some(e), Some(a)) => parts.push(format!("{field} {e} (found {a})")),
            (Some(e), None) => parts.push(format!("{field} {e} (not set)")),
            _ => {}
        }
    }
    parts.join(", ")
}

pub(crate) fn property_mismatch(
    template: &StyleRecord,
    document: &StyleRecord,
    expected: &FormattingProperties,
    actual: &FormattingProperties,
    fields: Vec<String>,
    severity: Severity,
) -> MismatchRecord {
    let ctx = pick_context(&template.context, Some(&document.context));
    let expected = property_map(expected);
    let actual = property_map(actual);
    let recommended_action = format!(
        "Reformat to match template style '{}': {}",
        template.name,
        describe_changes(&fields, &expected, &actual)
    );
    MismatchRecord {
        kind: MismatchKind::PropertyMismatch,
        context_key: ctx.context_key.clone(),
        location: ctx.location(),
        structural_role: ctx.structural_role,
        style_type: template.style_type,
        style_name: template.name.clone(),
        expected,
        actual,
        mismatched_fields: fields,
        sample_text: ctx.sample_text.clone(),
        severity,
        recommended_action,
    }
}

pub(crate) fn missing_style(template: &StyleRecord, expected: &FormattingProperties) -> MismatchRecord {
    let ctx = &template.context;
    MismatchRecord {
        kind: MismatchKind::MissingStyle,
        context_key: ctx.context_key.clone(),
        location: ctx.location(),
        structural_role: ctx.structural_role,
        style_type: template.style_type,
        style_name: template.name.clone(),
        expected: property_map(expected),
        actual: status_map("Missing"),
        mismatched_fields: vec!["EntireStyle".to_string()],
        sample_text: ctx.sample_text.clone(),
        severity: Severity::High,
        recommended_action: format!(
            "Add {} '{}' as defined in the template",
            template.style_type, template.name
        ),
    }
}

pub(crate) fn unmatched_document_style(
    document: &StyleRecord,
    actual: &FormattingProperties,
) -> MismatchRecord {
    let ctx = &document.context;
    let (kind, recommended_action) = if ctx.structural_role.is_structural() {
        (
            MismatchKind::UnexpectedFormatting,
            format!(
                "Formatting of this {} is not defined by the template; reapply the template style",
                ctx.structural_role
            ),
        )
    } else {
        (
            MismatchKind::ExtraStyle,
            format!(
                "{} '{}' does not exist in the template and should be removed",
                document.style_type, document.name
            ),
        )
    };
    MismatchRecord {
        kind,
        context_key: ctx.context_key.clone(),
        location: ctx.location(),
        structural_role: ctx.structural_role,
        style_type: document.style_type,
        style_name: document.name.clone(),
        expected: status_map("NotInTemplate"),
        actual: property_map(actual),
        mismatched_fields: vec!["EntireStyle".to_string()],
        sample_text: ctx.sample_text.clone(),
        severity: Severity::Medium,
        recommended_action,
    }
}

pub(crate) fn missing_pattern(template: &DirectFormatPattern) -> MismatchRecord {
    let ctx = &template.context;
    let expected = property_map(&template.overrides);
    let fields: Vec<String> = template
        .overrides
        .values()
        .into_iter()
        .map(|(name, _)| name.to_string())
        .collect();
    MismatchRecord {
        kind: MismatchKind::MissingDirectFormatting,
        context_key: template.pattern_context.clone(),
        location: ctx.location(),
        structural_role: ctx.structural_role,
        style_type: StyleType::DirectFormatting,
        style_name: template.pattern_name.clone(),
        expected,
        actual: status_map("Missing"),
        mismatched_fields: fields,
        sample_text: template.sample_text.clone(),
        severity: Severity::Medium,
        recommended_action: format!(
            "Apply direct formatting {} to '{}'",
            template.pattern_name,
            template.sample_text.trim()
        ),
    }
}

pub(crate) fn pattern_mismatch(
    template: &DirectFormatPattern,
    document: &DirectFormatPattern,
    fields: Vec<String>,
    severity: Severity,
) -> MismatchRecord {
    let ctx = pick_context(&template.context, Some(&document.context));
    let expected = property_map(&template.overrides);
    let actual = property_map(&document.overrides);
    let recommended_action = format!(
        "Adjust direct formatting: {}",
        describe_changes(&fields, &expected, &actual)
    );
    MismatchRecord {
        kind: MismatchKind::DirectFormattingMismatch,
        context_key: template.pattern_context.clone(),
        location: ctx.location(),
        structural_role: ctx.structural_role,
        style_type: StyleType::DirectFormatting,
        style_name: template.pattern_name.clone(),
        expected,
        actual,
        mismatched_fields: fields,
        sample_text: ctx.sample_text.clone(),
        severity,
        recommended_action,
    }
}

pub(crate) fn extra_pattern(document: &DirectFormatPattern) -> MismatchRecord {
    let ctx = &document.context;
    let actual = property_map(&document.overrides);
    let fields: Vec<String> = document
        .overrides
        .values()
        .into_iter()
        .map(|(name, _)| format!("Extra_{name}"))
        .collect();
    MismatchRecord {
        kind: MismatchKind::ExtraDirectFormatting,
        context_key: document.pattern_context.clone(),
        location: ctx.location(),
        structural_role: ctx.structural_role,
        style_type: StyleType::DirectFormatting,
        style_name: document.pattern_name.clone(),
        expected: status_map("NotInTemplate"),
        actual,
        mismatched_fields: fields,
        sample_text: document.sample_text.clone(),
        severity: Severity::High,
        recommended_action: format!(
            "Remove direct formatting {} from '{}'",
            document.pattern_name,
            document.sample_text.trim()
        ),
    }
}

/// Mismatch counts per severity and per kind.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub by_kind: BTreeMap<String, usize>,
}

impl Summary {
    pub fn is_clean(&self) -> bool {
        self.total == 0
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} mismatches ({} high, {} medium, {} low)",
            self.total, self.high, self.medium, self.low
        )?;
        for (kind, count) in &self.by_kind {
            write!(f, "\n  {kind:<26} {count:>5}")?;
        }
        Ok(())
    }
}

pub fn summarize(mismatches: &[MismatchRecord]) -> Summary {
    let mut summary = Summary {
        total: mismatches.len(),
        ..Default::default()
    };
    for m in mismatches {
        match m.severity {
            Severity::High => summary.high += 1,
            Severity::Medium => summary.medium += 1,
            Severity::Low => summary.low += 1,
        }
        *summary.by_kind.entry(m.kind.to_string()).or_insert(0) += 1;
    }
    summary
}
