mod common;

use common::*;
use docxide_stylecheck::compare::MismatchKind;
use docxide_stylecheck::{
    CompareOptions, DirectFormatPattern, FormattingProperties, MismatchRecord, Severity,
    StructuralRole, StyleSet, StyleType, compare, summarize,
};

fn props(family: &str, size: f32, bold: bool) -> FormattingProperties {
    FormattingProperties {
        font_family: Some(family.into()),
        font_size: Some(size),
        bold: Some(bold),
        ..Default::default()
    }
}

fn paragraph(id: usize, key: &str, sample: &str, p: FormattingProperties) -> docxide_stylecheck::StyleRecord {
    record(id, StyleType::Paragraph, StructuralRole::Body, key, sample, p)
}

/// Attaches a run-level pattern to `owner`.
fn attach(set: &mut StyleSet, owner: usize, run: usize, overrides: FormattingProperties, sample: &str) {
    let record = &set.records[owner];
    let key = format!("{}:Run:{run}", record.context.context_key);
    let mut context = record.context.clone();
    context.element_type = StyleType::DirectFormatting;
    context.run_index = Some(run);
    context.context_key = key.clone();
    context.sample_text = sample.to_string();
    let names: Vec<&str> = overrides.values().into_iter().map(|(n, _)| n).collect();
    set.patterns.push(DirectFormatPattern {
        pattern_name: format!("Run({})", names.join("+")),
        pattern_context: key,
        context,
        overrides,
        sample_text: sample.to_string(),
        occurrence_count: 1,
        owner: Some(owner),
    });
    let index = set.patterns.len() - 1;
    set.records[owner].direct_format_patterns.push(index);
}

fn of_kind(mismatches: &[MismatchRecord], kind: MismatchKind) -> Vec<&MismatchRecord> {
    mismatches.iter().filter(|m| m.kind == kind).collect()
}

#[test]
fn differing_paragraph_reports_every_field() {
    let template = style_set(
        "template",
        vec![paragraph(0, "Section:0:Paragraph:0", "Quarterly results", props("Arial", 14.0, true))],
    );
    let document = style_set(
        "document",
        vec![paragraph(0, "Section:0:Paragraph:0", "Quarterly results", props("Calibri", 12.0, false))],
    );

    let mismatches = compare(&template, &document, &CompareOptions::default()).unwrap();
    assert_eq!(mismatches.len(), 1);
    let m = &mismatches[0];
    assert_eq!(m.kind, MismatchKind::PropertyMismatch);
    assert_eq!(m.mismatched_fields, vec!["FontFamily", "FontSize", "IsBold"]);
    assert_eq!(m.severity, Severity::High);
    assert_eq!(m.context_key, "Section:0:Paragraph:0");
    assert_eq!(m.location, "Section 1");
    assert_eq!(m.sample_text, "Quarterly results");
    assert!(m.recommended_action.contains("FontFamily Arial (found Calibri)"));
}

#[test]
fn missing_direct_formatting_is_medium() {
    let mut template = style_set(
        "template",
        vec![paragraph(0, "Section:0:Paragraph:5", "Warning: read this", props("Arial", 11.0, false))],
    );
    attach(
        &mut template,
        0,
        0,
        FormattingProperties {
            color: Some("FF0000".into()),
            ..Default::default()
        },
        "Warning:",
    );
    let document = style_set(
        "document",
        vec![paragraph(0, "Section:0:Paragraph:5", "Warning: read this", props("Arial", 11.0, false))],
    );

    let mismatches = compare(&template, &document, &CompareOptions::default()).unwrap();
    let missing = of_kind(&mismatches, MismatchKind::MissingDirectFormatting);
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].context_key, "Section:0:Paragraph:5:Run:0");
    assert_eq!(missing[0].severity, Severity::Medium);
    assert_eq!(missing[0].mismatched_fields, vec!["Color"]);

    // The pattern also shows up in the owner's effective properties.
    let property = of_kind(&mismatches, MismatchKind::PropertyMismatch);
    assert_eq!(property.len(), 1);
    assert_eq!(property[0].mismatched_fields, vec!["Color"]);
}

#[test]
fn pattern_fields_keep_declaration_order() {
    let overrides = FormattingProperties {
        font_size: Some(14.0),
        italic: Some(true),
        color: Some("FF0000".into()),
        ..Default::default()
    };
    let records = || {
        vec![
            paragraph(0, "Section:0:Paragraph:1", "first note", props("Arial", 11.0, false)),
            paragraph(1, "Section:0:Paragraph:2", "second note", props("Arial", 11.0, false)),
        ]
    };
    let mut template = style_set("template", records());
    attach(&mut template, 0, 0, overrides.clone(), "first");
    let mut document = style_set("document", records());
    attach(&mut document, 1, 0, overrides, "second");

    let mismatches = compare(&template, &document, &CompareOptions::default()).unwrap();
    let missing = of_kind(&mismatches, MismatchKind::MissingDirectFormatting);
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].mismatched_fields, vec!["FontSize", "IsItalic", "Color"]);
    let extra = of_kind(&mismatches, MismatchKind::ExtraDirectFormatting);
    assert_eq!(extra.len(), 1);
    assert_eq!(
        extra[0].mismatched_fields,
        vec!["Extra_FontSize", "Extra_IsItalic", "Extra_Color"]
    );
}

#[test]
fn differing_and_extra_patterns() {
    let base = props("Arial", 11.0, false);
    let mut template = style_set(
        "template",
        vec![paragraph(0, "Section:0:Paragraph:0", "red text", base.clone())],
    );
    attach(
        &mut template,
        0,
        0,
        FormattingProperties {
            color: Some("FF0000".into()),
            ..Default::default()
        },
        "red",
    );
    let mut document = style_set(
        "document",
        vec![paragraph(0, "Section:0:Paragraph:0", "red text", base)],
    );
    attach(
        &mut document,
        0,
        0,
        FormattingProperties {
            color: Some("0000FF".into()),
            ..Default::default()
        },
        "red",
    );
    attach(
        &mut document,
        0,
        1,
        FormattingProperties {
            italic: Some(true),
            ..Default::default()
        },
        "text",
    );

    let mismatches = compare(&template, &document, &CompareOptions::default()).unwrap();
    let changed = of_kind(&mismatches, MismatchKind::DirectFormattingMismatch);
    assert_eq!(changed.len(), 1);
    assert_eq!(changed[0].mismatched_fields, vec!["Color"]);
    assert_eq!(changed[0].severity, Severity::High);

    let extra = of_kind(&mismatches, MismatchKind::ExtraDirectFormatting);
    assert_eq!(extra.len(), 1);
    assert_eq!(extra[0].context_key, "Section:0:Paragraph:0:Run:1");
    assert_eq!(extra[0].mismatched_fields, vec!["Extra_IsItalic"]);
    assert_eq!(extra[0].severity, Severity::High);

    let options = CompareOptions {
        ignored_style_types: [StyleType::DirectFormatting].into_iter().collect(),
        ..Default::default()
    };
    let mismatches = compare(&template, &document, &options).unwrap();
    assert!(of_kind(&mismatches, MismatchKind::ExtraDirectFormatting).is_empty());
    assert!(of_kind(&mismatches, MismatchKind::DirectFormattingMismatch).is_empty());
}

#[test]
fn signature_match_survives_reordering() {
    let template = style_set(
        "template",
        vec![paragraph(0, "Section:0:Paragraph:0", "moved", props("Arial", 14.0, true))],
    );
    let document = style_set(
        "document",
        vec![paragraph(0, "Section:0:Paragraph:7", "moved", props("Arial", 14.0, true))],
    );
    let mismatches = compare(&template, &document, &CompareOptions::default()).unwrap();
    assert!(mismatches.is_empty());
}

#[test]
fn identical_signatures_pair_with_the_first_document_record() {
    let p = props("Arial", 11.0, false);
    let template = style_set(
        "template",
        vec![paragraph(0, "Section:0:Paragraph:0", "one", p.clone())],
    );
    let document = style_set(
        "document",
        vec![
            paragraph(0, "Section:2:Paragraph:10", "first", p.clone()),
            paragraph(1, "Section:2:Paragraph:11", "second", p),
        ],
    );
    let mismatches = compare(&template, &document, &CompareOptions::default()).unwrap();
    assert_eq!(mismatches.len(), 1);
    assert_eq!(mismatches[0].kind, MismatchKind::UnexpectedFormatting);
    assert_eq!(mismatches[0].context_key, "Section:2:Paragraph:11");
}

#[test]
fn structural_match_tolerates_shifted_paragraphs() {
    let mut t = paragraph(0, "Section:0:Paragraph:3", "Summary", props("Arial", 12.0, false));
    t.name = "Body Text".into();
    t.context.paragraph_index = Some(3);
    let mut d = paragraph(0, "Section:0:Paragraph:4", "Summary", props("Arial", 10.0, false));
    d.name = "Custom".into();
    d.context.paragraph_index = Some(4);

    let mismatches = compare(
        &style_set("template", vec![t]),
        &style_set("document", vec![d]),
        &CompareOptions::default(),
    )
    .unwrap();
    assert_eq!(mismatches.len(), 1);
    assert_eq!(mismatches[0].kind, MismatchKind::PropertyMismatch);
    assert_eq!(mismatches[0].mismatched_fields, vec!["FontSize"]);
    assert_eq!(mismatches[0].severity, Severity::Medium);
}

#[test]
fn content_free_mismatches_are_noise() {
    let template = style_set(
        "template",
        vec![
            paragraph(0, "Section:0:Paragraph:0", "", props("Arial", 14.0, true)),
            paragraph(1, "Section:0:Paragraph:1", "   ", props("Arial", 18.0, true)),
        ],
    );
    let document = style_set("document", Vec::new());

    let mismatches = compare(&template, &document, &CompareOptions::default()).unwrap();
    assert!(mismatches.is_empty());

    let keep_all = CompareOptions {
        drop_empty_sample_text: false,
        ..Default::default()
    };
    let mismatches = compare(&template, &document, &keep_all).unwrap();
    assert_eq!(mismatches.len(), 2);
    assert!(mismatches.iter().all(|m| m.kind == MismatchKind::MissingStyle));
    assert!(mismatches.iter().all(|m| m.severity == Severity::High));
    assert_eq!(mismatches[0].mismatched_fields, vec!["EntireStyle"]);
}

#[test]
fn unmatched_structural_roles_are_unexpected_formatting() {
    let template = style_set("template", Vec::new());
    let document = style_set(
        "document",
        vec![
            record(
                0,
                StyleType::TableCell,
                StructuralRole::TableCell,
                "Section:0:Table:0:Row:0:Cell:0",
                "Total",
                FormattingProperties {
                    cell_shading: Some("FFFF00".into()),
                    ..Default::default()
                },
            ),
            record(
                1,
                StyleType::Drawing,
                StructuralRole::Drawing,
                "Section:0:Paragraph:2:Drawing:0",
                "Logo",
                FormattingProperties {
                    image_width: Some(72.0),
                    ..Default::default()
                },
            ),
        ],
    );

    let mismatches = compare(&template, &document, &CompareOptions::default()).unwrap();
    assert_eq!(mismatches.len(), 2);
    assert_eq!(mismatches[0].kind, MismatchKind::UnexpectedFormatting);
    assert_eq!(mismatches[0].severity, Severity::Medium);
    assert_eq!(mismatches[0].structural_role, StructuralRole::TableCell);
    assert_eq!(mismatches[1].kind, MismatchKind::ExtraStyle);
    assert_eq!(mismatches[1].severity, Severity::Medium);
    assert_eq!(mismatches[1].structural_role, StructuralRole::Drawing);
}

#[test]
fn report_serializes_property_maps() {
    let template = style_set(
        "template",
        vec![paragraph(0, "Section:0:Paragraph:0", "Title", props("Arial", 14.0, true))],
    );
    let document = style_set(
        "document",
        vec![paragraph(0, "Section:0:Paragraph:0", "Title", props("Arial", 12.0, true))],
    );
    let mismatches = compare(&template, &document, &CompareOptions::default()).unwrap();
    let json = serde_json::to_value(&mismatches).unwrap();
    let m = &json[0];
    assert_eq!(m["kind"], "PropertyMismatch");
    assert_eq!(m["severity"], "Medium");
    assert_eq!(m["structural_role"], "Body");
    assert_eq!(m["expected"]["FontSize"], 14.0);
    assert_eq!(m["actual"]["FontSize"], 12.0);
    assert_eq!(m["expected"]["IsBold"], true);
    assert_eq!(m["mismatched_fields"], serde_json::json!(["FontSize"]));

    let summary = summarize(&mismatches);
    assert_eq!(summary.total, 1);
    assert_eq!(summary.medium, 1);
    assert_eq!(summary.by_kind.get("PropertyMismatch"), Some(&1));
    assert!(!summary.is_clean());
}

#[test]
fn style_sets_survive_a_json_snapshot() {
    let body = [
        para(Some("Heading1"), "", &[("", "Title")]),
        para(Some("Normal"), "", &[("<w:i/>", "aside")]),
        SECTION.to_string(),
    ]
    .concat();
    let bytes = DocxBuilder::new()
        .styles(&default_styles())
        .body(&body)
        .build();
    let styles = extract(&bytes, "template");
    let restored = StyleSet::from_json(&styles.to_json().unwrap()).unwrap();
    assert_eq!(restored, styles);
    assert!(
        compare(&restored, &styles, &CompareOptions::strict())
            .unwrap()
            .is_empty()
    );
}

fn two_paragraph_document(styles: &str) -> Vec<u8> {
    let body = [
        para(Some("Heading1"), "", &[("", "Overview")]),
        para(Some("Normal"), "", &[("", "Body copy")]),
        SECTION.to_string(),
    ]
    .concat();
    DocxBuilder::new().styles(styles).body(&body).build()
}

#[test]
fn document_compared_with_itself_is_clean() {
    let bytes = two_paragraph_document(&default_styles());
    let template = extract(&bytes, "template");
    let document = extract(&bytes, "document");
    let mismatches = compare(&template, &document, &CompareOptions::strict()).unwrap();
    assert!(mismatches.is_empty(), "{mismatches:#?}");
}

#[test]
fn changed_heading_font_is_reported() {
    let changed_styles = [
        r#"<w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/><w:rPr><w:rFonts w:ascii="Calibri" w:hAnsi="Calibri"/><w:sz w:val="22"/></w:rPr></w:style>"#.to_string(),
        paragraph_style(
            "Heading1",
            "heading 1",
            Some("Normal"),
            r#"<w:rFonts w:ascii="Times New Roman" w:hAnsi="Times New Roman"/><w:b/><w:sz w:val="32"/>"#,
        ),
        character_style("Strong", "Strong", "<w:b/>"),
    ]
    .concat();

    let template = extract(&two_paragraph_document(&default_styles()), "template");
    let document = extract(&two_paragraph_document(&changed_styles), "document");
    let mismatches = compare(&template, &document, &CompareOptions::default()).unwrap();

    let keys: Vec<&str> = mismatches.iter().map(|m| m.context_key.as_str()).collect();
    assert_eq!(keys, vec!["Section:0:Paragraph:0", "Style:Heading1"]);
    for m in &mismatches {
        assert_eq!(m.kind, MismatchKind::PropertyMismatch);
        assert_eq!(m.mismatched_fields, vec!["FontFamily"]);
        assert_eq!(m.severity, Severity::High);
    }
    assert_eq!(mismatches[0].sample_text, "Overview");
}

fn styles_with_line_spacing(line: u32) -> String {
    [
        format!(
            r#"<w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/><w:pPr><w:spacing w:line="{line}" w:lineRule="auto"/></w:pPr><w:rPr><w:rFonts w:ascii="Calibri" w:hAnsi="Calibri"/><w:sz w:val="22"/></w:rPr></w:style>"#
        ),
        paragraph_style(
            "Heading1",
            "heading 1",
            Some("Normal"),
            r#"<w:rFonts w:ascii="Arial" w:hAnsi="Arial"/><w:b/><w:sz w:val="32"/>"#,
        ),
    ]
    .concat()
}

#[test]
fn double_spacing_is_reported_in_lenient_mode() {
    let template = extract(&two_paragraph_document(&styles_with_line_spacing(240)), "template");
    let document = extract(&two_paragraph_document(&styles_with_line_spacing(480)), "document");
    let mismatches = compare(&template, &document, &CompareOptions::default()).unwrap();

    let keys: Vec<&str> = mismatches.iter().map(|m| m.context_key.as_str()).collect();
    assert!(keys.contains(&"Section:0:Paragraph:1"), "{keys:?}");
    assert!(keys.contains(&"Style:Normal"), "{keys:?}");
    for m in &mismatches {
        assert_eq!(m.kind, MismatchKind::PropertyMismatch);
        assert_eq!(m.mismatched_fields, vec!["LineSpacing"]);
        assert_eq!(m.severity, Severity::Medium);
    }
}
