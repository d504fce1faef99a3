//! Direct formatting: detection on runs and paragraphs, and binding the
//! resulting patterns to the records that own them.

use std::collections::HashMap;

use crate::model::{
    DirectFormatPattern, FormattingContext, FormattingProperties, StyleRecord, StyleType,
};

use super::{WML_NS, is_wml, wml};

/// `w:rPr` children that change how text looks. Proofing and metadata
/// (`noProof`, `lang`, `webHidden`, `rStyle`, complex-script twins) are not
/// direct formatting.
const VISUAL_RUN_PROPERTIES: &[&str] = &[
    "rFonts", "sz", "b", "i", "u", "strike", "dstrike", "caps", "smallCaps", "shadow",
    "outline", "emboss", "imprint", "vanish", "color", "highlight", "spacing", "w",
    "vertAlign", "shd", "bdr", "position", "effect",
];

/// `w:pPr` children that change how a paragraph looks. `pStyle`, `numPr`,
/// the paragraph mark's `rPr` and `sectPr` are structure, not formatting.
const VISUAL_PARAGRAPH_PROPERTIES: &[&str] = &[
    "jc", "spacing", "ind", "pBdr", "shd", "tabs", "keepNext", "keepLines", "widowControl",
    "pageBreakBefore", "contextualSpacing", "outlineLvl",
];

fn has_visual_child(props: roxmltree::Node, allowed: &[&str]) -> bool {
    props.children().any(|c| {
        c.tag_name().namespace() == Some(WML_NS) && allowed.contains(&c.tag_name().name())
    })
}

/// True when a `w:r` or `w:p` carries visual formatting of its own, beyond a
/// bare style reference.
pub fn has_direct_formatting(element: roxmltree::Node) -> bool {
    if is_wml(element, "r") {
        wml(element, "rPr").is_some_and(|rpr| has_visual_child(rpr, VISUAL_RUN_PROPERTIES))
    } else if is_wml(element, "p") {
        has_direct_paragraph_formatting(element)
    } else {
        false
    }
}

pub fn has_direct_paragraph_formatting(paragraph: roxmltree::Node) -> bool {
    wml(paragraph, "pPr").is_some_and(|ppr| has_visual_child(ppr, VISUAL_PARAGRAPH_PROPERTIES))
}

pub(crate) fn pattern_name(prefix: &str, overrides: &FormattingProperties) -> String {
    let fields: Vec<&str> = overrides.values().into_iter().map(|(n, _)| n).collect();
    format!("{prefix}({})", fields.join("+"))
}

/// A run whose overrides survived filtering against its base style.
pub(crate) struct RunOverride {
    pub(crate) run_index: usize,
    pub(crate) overrides: FormattingProperties,
    pub(crate) text: String,
}

/// Builds run-level patterns for one paragraph. Consecutive runs with the
/// same overrides become one pattern anchored at the first run.
pub(crate) fn run_patterns(
    paragraph: &FormattingContext,
    runs: Vec<RunOverride>,
) -> Vec<DirectFormatPattern> {
    let mut patterns: Vec<DirectFormatPattern> = Vec::new();
    let mut last_run: Option<usize> = None;
    for run in runs {
        let contiguous = last_run.is_some_and(|last| last + 1 == run.run_index);
        last_run = Some(run.run_index);
        if contiguous
            && let Some(prev) = patterns.last_mut()
            && prev.overrides == run.overrides
        {
            prev.occurrence_count += 1;
            prev.sample_text.push_str(&run.text);
            continue;
        }

        let key = format!("{}:Run:{}", paragraph.context_key, run.run_index);
        let mut context = paragraph.clone();
        context.element_type = StyleType::DirectFormatting;
        context.run_index = Some(run.run_index);
        context.context_key = key.clone();
        context.sample_text = run.text.clone();
        patterns.push(DirectFormatPattern {
            pattern_name: pattern_name("Run", &run.overrides),
            pattern_context: key,
            context,
            overrides: run.overrides,
            sample_text: run.text,
            occurrence_count: 1,
            owner: None,
        });
    }
    patterns
}

pub(crate) fn paragraph_pattern(
    paragraph: &FormattingContext,
    overrides: FormattingProperties,
) -> DirectFormatPattern {
    let mut context = paragraph.clone();
    context.element_type = StyleType::DirectFormatting;
    DirectFormatPattern {
        pattern_name: pattern_name("Paragraph", &overrides),
        pattern_context: paragraph.context_key.clone(),
        context,
        overrides,
        sample_text: paragraph.sample_text.clone(),
        occurrence_count: 1,
        owner: None,
    }
}

fn owns_paragraph_content(style_type: StyleType) -> bool {
    matches!(
        style_type,
        StyleType::Paragraph
            | StyleType::List
            | StyleType::DirectFormatting
            | StyleType::Header
            | StyleType::Footer
    )
}

fn owner_key(pattern: &DirectFormatPattern) -> &str {
    match pattern.pattern_context.rfind(":Run:") {
        Some(pos) if pattern.context.run_index.is_some() => &pattern.pattern_context[..pos],
        _ => &pattern.pattern_context,
    }
}

/// `prefix` is a whole-segment prefix of `key`.
fn is_key_prefix(prefix: &str, key: &str) -> bool {
    key.len() > prefix.len() && key.starts_with(prefix) && key.as_bytes()[prefix.len()] == b':'
}

fn find_owner(
    pattern: &DirectFormatPattern,
    records: &[StyleRecord],
    by_key: &HashMap<&str, usize>,
) -> Option<usize> {
    // Same structural position.
    if let Some(&i) = by_key.get(owner_key(pattern))
        && owns_paragraph_content(records[i].style_type)
    {
        return Some(i);
    }

    let ctx = &pattern.context;

    // Same paragraph index in the same scope.
    if ctx.table_index.is_none()
        && let Some(para) = ctx.paragraph_index
        && let Some(i) = records.iter().position(|r| {
            owns_paragraph_content(r.style_type)
                && r.context.table_index.is_none()
                && r.context.paragraph_index == Some(para)
                && r.context.header_footer_kind == ctx.header_footer_kind
                && r.context.section_index == ctx.section_index
        })
    {
        return Some(i);
    }

    // Nested contexts: the deepest record whose key encloses the pattern.
    if let Some(i) = records
        .iter()
        .enumerate()
        .filter(|(_, r)| {
            r.style_type != StyleType::Section
                && is_key_prefix(&r.context.context_key, &pattern.pattern_context)
        })
        .max_by_key(|(_, r)| r.context.context_key.len())
        .map(|(i, _)| i)
    {
        return Some(i);
    }

    // Sections own every paragraph in their index range.
    let in_range = |r: &StyleRecord| match (r.context.paragraph_range, ctx.paragraph_index) {
        (Some((start, end)), Some(p)) if !ctx.is_in_header_footer && ctx.table_index.is_none() => {
            (start..end).contains(&p)
        }
        _ => r.context.section_index == ctx.section_index,
    };
    records
        .iter()
        .position(|r| r.style_type == StyleType::Section && in_range(r))
}

/// Binds each pattern to its owning record by structural context.
///
/// Returns the kept patterns; each record's `direct_format_patterns` is
/// rewritten to index into that vector. Patterns without an owner are dropped.
pub fn associate(
    records: &mut [StyleRecord],
    patterns: Vec<DirectFormatPattern>,
) -> Vec<DirectFormatPattern> {
    let by_key: HashMap<&str, usize> = {
        let mut map = HashMap::new();
        for (i, r) in records.iter().enumerate() {
            map.entry(r.context.context_key.as_str()).or_insert(i);
        }
        map
    };

    let mut owners: Vec<Option<usize>> = Vec::with_capacity(patterns.len());
    for pattern in &patterns {
        let owner = find_owner(pattern, records, &by_key);
        if owner.is_none() {
            log::warn!(
                "Dropping direct formatting {} at {}: no owning style record",
                pattern.pattern_name,
                pattern.pattern_context
            );
        }
        owners.push(owner);
    }
    drop(by_key);

    for record in records.iter_mut() {
        record.direct_format_patterns.clear();
    }

    let mut kept = Vec::with_capacity(patterns.len());
    for (mut pattern, owner) in patterns.into_iter().zip(owners) {
        let Some(owner) = owner else {
            continue;
        };
        pattern.owner = Some(owner);
        records[owner].direct_format_patterns.push(kept.len());
        kept.push(pattern);
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{StructuralRole, StyleSignature};

    fn paragraph_ctx(key: &str, para: usize) -> FormattingContext {
        let mut ctx = FormattingContext::new(StyleType::Paragraph, StructuralRole::Body);
        ctx.section_index = Some(0);
        ctx.paragraph_index = Some(para);
        ctx.context_key = key.to_string();
        ctx
    }

    fn record(style_type: StyleType, ctx: FormattingContext) -> StyleRecord {
        StyleRecord {
            id: 0,
            owning_document_id: "doc".into(),
            style_type,
            name: "Normal".into(),
            based_on_style_id: None,
            resolved_properties: FormattingProperties::default(),
            signature: StyleSignature::compute(&FormattingProperties::default(), style_type),
            context: ctx,
            direct_format_patterns: Vec::new(),
        }
    }

    fn bold() -> FormattingProperties {
        FormattingProperties {
            bold: Some(true),
            ..Default::default()
        }
    }

    #[test]
    fn consecutive_identical_runs_merge() {
        let ctx = paragraph_ctx("Section:0:Paragraph:2", 2);
        let runs = vec![
            RunOverride { run_index: 0, overrides: bold(), text: "a".into() },
            RunOverride { run_index: 1, overrides: bold(), text: "b".into() },
            RunOverride { run_index: 3, overrides: bold(), text: "c".into() },
        ];
        let patterns = run_patterns(&ctx, runs);
        assert_eq!(patterns.len(), 2);
        assert_eq!(patterns[0].occurrence_count, 2);
        assert_eq!(patterns[0].sample_text, "ab");
        assert_eq!(patterns[0].pattern_context, "Section:0:Paragraph:2:Run:0");
        assert_eq!(patterns[0].pattern_name, "Run(IsBold)");
        assert_eq!(patterns[1].pattern_context, "Section:0:Paragraph:2:Run:3");
    }

    #[test]
    fn patterns_bind_by_context_and_unowned_are_dropped() {
        let mut records = vec![
            record(StyleType::Paragraph, paragraph_ctx("Section:0:Paragraph:0", 0)),
            record(StyleType::Paragraph, paragraph_ctx("Section:0:Paragraph:1", 1)),
        ];
        let mut orphan = paragraph_ctx("Section:3:Paragraph:9", 9);
        orphan.section_index = Some(3);

        let mut patterns = run_patterns(
            &paragraph_ctx("Section:0:Paragraph:1", 1),
            vec![RunOverride { run_index: 0, overrides: bold(), text: "x".into() }],
        );
        patterns.extend(run_patterns(
            &orphan,
            vec![RunOverride { run_index: 0, overrides: bold(), text: "y".into() }],
        ));

        let kept = associate(&mut records, patterns);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].owner, Some(1));
        assert_eq!(records[1].direct_format_patterns, vec![0]);
        assert!(records[0].direct_format_patterns.is_empty());
    }

    fn section(index: usize, range: (usize, usize)) -> StyleRecord {
        let mut ctx = FormattingContext::new(StyleType::Section, StructuralRole::Section);
        ctx.section_index = Some(index);
        ctx.paragraph_range = Some(range);
        ctx.context_key = format!("Section:{index}");
        record(StyleType::Section, ctx)
    }

    fn bold_run(ctx: &FormattingContext) -> Vec<DirectFormatPattern> {
        run_patterns(
            ctx,
            vec![RunOverride { run_index: 0, overrides: bold(), text: "w".into() }],
        )
    }

    #[test]
    fn unkeyed_patterns_bind_by_paragraph_index() {
        let mut records = vec![
            record(StyleType::Paragraph, paragraph_ctx("Section:0:Paragraph:3", 3)),
            record(StyleType::Paragraph, paragraph_ctx("Section:0:Paragraph:4", 4)),
        ];
        let wrapped = paragraph_ctx("Section:0:ContentControl:0:Paragraph:4", 4);

        let kept = associate(&mut records, bold_run(&wrapped));
        assert_eq!(kept[0].owner, Some(1));
        assert_eq!(records[1].direct_format_patterns, vec![0]);
    }

    #[test]
    fn body_patterns_fall_back_to_section_range() {
        let mut records = vec![section(0, (0, 3)), section(1, (3, 6))];
        let mut ctx = paragraph_ctx("Section:1:Paragraph:4", 4);
        ctx.section_index = Some(1);

        let kept = associate(&mut records, bold_run(&ctx));
        assert_eq!(kept[0].owner, Some(1));
        assert!(records[0].direct_format_patterns.is_empty());
    }

    #[test]
    fn header_patterns_fall_back_to_section_index() {
        let mut records = vec![section(0, (0, 3)), section(1, (3, 6))];
        let mut ctx = paragraph_ctx("Section:1:Header:default:Paragraph:0", 0);
        ctx.section_index = Some(1);
        ctx.is_in_header_footer = true;
        ctx.header_footer_kind = Some("default".into());

        let kept = associate(&mut records, bold_run(&ctx));
        assert_eq!(kept[0].owner, Some(1));
        assert_eq!(records[1].direct_format_patterns, vec![0]);
    }

    #[test]
    fn cell_patterns_fall_back_to_enclosing_cell() {
        let mut cell_ctx = FormattingContext::new(StyleType::TableCell, StructuralRole::TableCell);
        cell_ctx.section_index = Some(0);
        cell_ctx.table_index = Some(0);
        cell_ctx.context_key = "Section:0:Table:0:Row:0:Cell:1".into();
        let mut records = vec![record(StyleType::TableCell, cell_ctx)];

        let mut para = paragraph_ctx("Section:0:Table:0:Row:0:Cell:1:Paragraph:0", 0);
        para.table_index = Some(0);
        let patterns = run_patterns(
            &para,
            vec![RunOverride { run_index: 2, overrides: bold(), text: "z".into() }],
        );
        let kept = associate(&mut records, patterns);
        assert_eq!(kept[0].owner, Some(0));
    }

    #[test]
    fn key_prefix_respects_segments() {
        assert!(is_key_prefix("Section:0:Paragraph:1", "Section:0:Paragraph:1:Run:0"));
        assert!(!is_key_prefix("Section:0:Paragraph:1", "Section:0:Paragraph:12:Run:0"));
    }
}
