//! Template-versus-document comparison: pairing style records, diffing their
//! effective properties and direct formatting, and ranking the differences.

mod diff;
mod matching;
mod report;

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use crate::cancel::CancelToken;
use crate::error::Error;
use crate::model::{StyleSet, StyleType};

pub use diff::{diff_properties, pattern_severity, property_severity};
pub use matching::MatchStrategy;
pub use report::{MismatchKind, MismatchRecord, PropertyMap, Severity, Summary, summarize};

/// Point tolerances for float comparisons.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tolerances {
    pub strict: f32,
    pub lenient: f32,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            strict: 0.1,
            lenient: 1.0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct CompareOptions {
    pub strict: bool,
    /// Records of these types are left out on both sides.
    pub ignored_style_types: HashSet<StyleType>,
    pub tolerances: Tolerances,
    /// How far apart two paragraph indices may be for a structural match.
    pub structural_paragraph_slack: usize,
    /// Drop mismatches whose sample text is empty or whitespace.
    pub drop_empty_sample_text: bool,
    pub cancel: CancelToken,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            strict: false,
            ignored_style_types: HashSet::new(),
            tolerances: Tolerances::default(),
            structural_paragraph_slack: 1,
            drop_empty_sample_text: true,
            cancel: CancelToken::new(),
        }
    }
}

impl CompareOptions {
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Default::default()
        }
    }

    pub fn tolerance(&self) -> f32 {
        if self.strict {
            self.tolerances.strict
        } else {
            self.tolerances.lenient
        }
    }

    fn includes(&self, style_type: StyleType) -> bool {
        !self.ignored_style_types.contains(&style_type)
    }
}

/// Compares a document's style set against a template's.
///
/// Output order: per-pair property mismatches and missing styles in template
/// order, then direct-format pattern differences, then document styles the
/// template does not have.
pub fn compare(
    template: &StyleSet,
    document: &StyleSet,
    options: &CompareOptions,
) -> Result<Vec<MismatchRecord>, Error> {
    let t0 = Instant::now();
    let tolerance = options.tolerance();
    let cancel = &options.cancel;
    cancel.check()?;

    let wanted = |set: &StyleSet| -> Vec<usize> {
        set.records
            .iter()
            .enumerate()
            .filter(|(_, r)| options.includes(r.style_type))
            .map(|(i, _)| i)
            .collect()
    };
    let template_ids = wanted(template);
    let document_ids = wanted(document);

    let matching = matching::match_styles(
        template,
        document,
        &template_ids,
        &document_ids,
        options.structural_paragraph_slack,
        cancel,
    )?;
    let t_match = t0.elapsed();

    let mut mismatches = Vec::new();
    let mut missing = matching.missing.iter().peekable();
    for &(ti, di, _) in &matching.pairs {
        // Keep template order: missing styles that precede this pair first.
        while let Some(&&mi) = missing.peek() {
            if mi > ti {
                break;
            }
            let t = &template.records[mi];
            mismatches.push(report::missing_style(t, &template.effective_properties(t)));
            missing.next();
        }

        cancel.check()?;
        let t = &template.records[ti];
        let d = &document.records[di];
        let expected = template.effective_properties(t);
        let actual = document.effective_properties(d);
        let fields = diff_properties(&expected, &actual, tolerance);
        if !fields.is_empty() {
            let severity = property_severity(&fields);
            mismatches.push(report::property_mismatch(t, d, &expected, &actual, fields, severity));
        }
    }
    for &mi in missing {
        let t = &template.records[mi];
        mismatches.push(report::missing_style(t, &template.effective_properties(t)));
    }

    if options.includes(StyleType::DirectFormatting) {
        diff_patterns(template, document, options, tolerance, &mut mismatches)?;
    }

    for &di in &matching.unmatched {
        let d = &document.records[di];
        mismatches.push(report::unmatched_document_style(d, &document.effective_properties(d)));
    }

    let before = mismatches.len();
    if options.drop_empty_sample_text {
        mismatches.retain(|m| !m.sample_text.trim().is_empty());
    }

    log::info!(
        "Compared {} against {}: {} pairs, {} missing, {} unmatched, {} mismatches ({} dropped as noise); match={:.1}ms, total={:.1}ms",
        document.document_id,
        template.document_id,
        matching.pairs.len(),
        matching.missing.len(),
        matching.unmatched.len(),
        mismatches.len(),
        before - mismatches.len(),
        t_match.as_secs_f64() * 1000.0,
        t0.elapsed().as_secs_f64() * 1000.0,
    );

    Ok(mismatches)
}

/// Pairs patterns by `pattern_context`, independent of record matching.
fn diff_patterns(
    template: &StyleSet,
    document: &StyleSet,
    options: &CompareOptions,
    tolerance: f32,
    out: &mut Vec<MismatchRecord>,
) -> Result<(), Error> {
    let owner_included = |set: &StyleSet, owner: Option<usize>| {
        owner
            .and_then(|i| set.records.get(i))
            .is_none_or(|r| options.includes(r.style_type))
    };

    let mut by_context: HashMap<&str, usize> = HashMap::new();
    for (i, p) in document.patterns.iter().enumerate() {
        if owner_included(document, p.owner) {
            by_context.entry(p.pattern_context.as_str()).or_insert(i);
        }
    }

    let mut seen = vec![false; document.patterns.len()];
    for tp in &template.patterns {
        if !owner_included(template, tp.owner) {
            continue;
        }
        options.cancel.check()?;
        match by_context.get(tp.pattern_context.as_str()) {
            None => out.push(report::missing_pattern(tp)),
            Some(&di) => {
                seen[di] = true;
                let dp = &document.patterns[di];
                let fields = diff_properties(&tp.overrides, &dp.overrides, tolerance);
                if !fields.is_empty() {
                    let severity = pattern_severity(&fields);
                    out.push(report::pattern_mismatch(tp, dp, fields, severity));
                }
            }
        }
    }

    for (i, dp) in document.patterns.iter().enumerate() {
        if !seen[i] && owner_included(document, dp.owner) {
            out.push(report::extra_pattern(dp));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        FormattingContext, FormattingProperties, StructuralRole, StyleRecord, StyleSignature,
    };

    fn record(id: usize, key: &str, name: &str, props: FormattingProperties) -> StyleRecord {
        let mut context = FormattingContext::new(StyleType::Paragraph, StructuralRole::Body);
        context.context_key = key.to_string();
        context.section_index = Some(0);
        context.paragraph_index = Some(id);
        context.sample_text = format!("text {id}");
        StyleRecord {
            id,
            owning_document_id: "doc".into(),
            style_type: StyleType::Paragraph,
            name: name.into(),
            based_on_style_id: None,
            signature: StyleSignature::compute(&props, StyleType::Paragraph),
            resolved_properties: props,
            context,
            direct_format_patterns: Vec::new(),
        }
    }

    fn set(records: Vec<StyleRecord>) -> StyleSet {
        StyleSet {
            document_id: "doc".into(),
            records,
            patterns: Vec::new(),
        }
    }

    fn size(pt: f32) -> FormattingProperties {
        FormattingProperties {
            font_size: Some(pt),
            ..Default::default()
        }
    }

    #[test]
    fn missing_styles_keep_template_order() {
        let template = set(vec![
            record(0, "Section:0:Paragraph:0", "A", size(10.0)),
            record(1, "Section:0:Paragraph:1", "B", size(20.0)),
        ]);
        let document = set(vec![record(0, "Section:0:Paragraph:1", "B", size(20.0))]);
        let mismatches = compare(&template, &document, &CompareOptions::default()).unwrap();
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].kind, MismatchKind::MissingStyle);
        assert_eq!(mismatches[0].style_name, "A");
    }

    #[test]
    fn strict_mode_tightens_tolerance() {
        let template = set(vec![record(0, "Section:0:Paragraph:0", "A", size(11.0))]);
        let document = set(vec![record(0, "Section:0:Paragraph:0", "A", size(11.5))]);
        assert!(compare(&template, &document, &CompareOptions::default())
            .unwrap()
            .is_empty());
        let strict = compare(&template, &document, &CompareOptions::strict()).unwrap();
        assert_eq!(strict.len(), 1);
        assert_eq!(strict[0].mismatched_fields, vec!["FontSize"]);
        assert_eq!(strict[0].severity, Severity::Medium);
    }

    #[test]
    fn ignored_types_are_skipped() {
        let template = set(vec![record(0, "Section:0:Paragraph:0", "A", size(10.0))]);
        let document = set(Vec::new());
        let options = CompareOptions {
            ignored_style_types: HashSet::from([StyleType::Paragraph]),
            ..Default::default()
        };
        assert!(compare(&template, &document, &options).unwrap().is_empty());
    }

    #[test]
    fn cancelled_comparison_fails() {
        let template = set(vec![record(0, "Section:0:Paragraph:0", "A", size(10.0))]);
        let options = CompareOptions::default();
        options.cancel.cancel();
        assert!(matches!(
            compare(&template, &template, &options),
            Err(Error::Cancelled)
        ));
    }
}
