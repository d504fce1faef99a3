#![allow(dead_code)]

use std::io::{Cursor, Write};

use docxide_stylecheck::docx::{self, ExtractOptions};
use docxide_stylecheck::{
    FormattingContext, FormattingProperties, StructuralRole, StyleRecord, StyleSet,
    StyleSignature, StyleType,
};
use zip::write::SimpleFileOptions;

pub const NAMESPACES: &str = concat!(
    r#"xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" "#,
    r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" "#,
    r#"xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing" "#,
    r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main""#
);

const HYPERLINK_REL: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink";
const HEADER_REL: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/header";
const FOOTER_REL: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/footer";

/// Builds a DOCX package in memory.
#[derive(Default)]
pub struct DocxBuilder {
    body: String,
    raw_document: Option<String>,
    omit_document: bool,
    styles: Option<String>,
    numbering: Option<String>,
    parts: Vec<(String, String)>,
    rels: Vec<(String, String, String, bool)>,
}

impl DocxBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Children of `w:body`, including any trailing `w:sectPr`.
    pub fn body(mut self, xml: &str) -> Self {
        self.body = xml.to_string();
        self
    }

    /// Replaces `word/document.xml` verbatim.
    pub fn raw_document(mut self, xml: &str) -> Self {
        self.raw_document = Some(xml.to_string());
        self
    }

    pub fn without_document(mut self) -> Self {
        self.omit_document = true;
        self
    }

    /// `w:style` elements (and optionally `w:docDefaults`).
    pub fn styles(mut self, xml: &str) -> Self {
        self.styles = Some(format!(r#"<w:styles {NAMESPACES}>{xml}</w:styles>"#));
        self
    }

    pub fn numbering(mut self, xml: &str) -> Self {
        self.numbering = Some(format!(r#"<w:numbering {NAMESPACES}>{xml}</w:numbering>"#));
        self
    }

    pub fn hyperlink(mut self, id: &str, url: &str) -> Self {
        self.rels
            .push((id.into(), HYPERLINK_REL.into(), url.into(), true));
        self
    }

    pub fn header(mut self, id: &str, file: &str, content: &str) -> Self {
        self.rels
            .push((id.into(), HEADER_REL.into(), file.into(), false));
        self.parts.push((
            format!("word/{file}"),
            format!(r#"<w:hdr {NAMESPACES}>{content}</w:hdr>"#),
        ));
        self
    }

    pub fn footer(mut self, id: &str, file: &str, content: &str) -> Self {
        self.rels
            .push((id.into(), FOOTER_REL.into(), file.into(), false));
        self.parts.push((
            format!("word/{file}"),
            format!(r#"<w:ftr {NAMESPACES}>{content}</w:ftr>"#),
        ));
        self
    }

    fn rels_xml(&self) -> String {
        let mut xml = String::from(
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        );
        for (id, kind, target, external) in &self.rels {
            let mode = if *external {
                r#" TargetMode="External""#
            } else {
                ""
            };
            xml.push_str(&format!(
                r#"<Relationship Id="{id}" Type="{kind}" Target="{target}"{mode}/>"#
            ));
        }
        xml.push_str("</Relationships>");
        xml
    }

    pub fn build(self) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let mut add = |name: &str, content: &str| {
            zip.start_file(name, SimpleFileOptions::default()).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        };

        add(
            "[Content_Types].xml",
            r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"/>"#,
        );
        if !self.omit_document {
            let document = self.raw_document.clone().unwrap_or_else(|| {
                format!(r#"<w:document {NAMESPACES}><w:body>{}</w:body></w:document>"#, self.body)
            });
            add("word/document.xml", &document);
        }
        if !self.rels.is_empty() {
            add("word/_rels/document.xml.rels", &self.rels_xml());
        }
        if let Some(styles) = &self.styles {
            add("word/styles.xml", styles);
        }
        if let Some(numbering) = &self.numbering {
            add("word/numbering.xml", numbering);
        }
        for (name, content) in &self.parts {
            add(name, content);
        }
        zip.finish().unwrap().into_inner()
    }
}

pub fn paragraph_style(id: &str, name: &str, based_on: Option<&str>, rpr: &str) -> String {
    let based_on = based_on
        .map(|b| format!(r#"<w:basedOn w:val="{b}"/>"#))
        .unwrap_or_default();
    format!(
        r#"<w:style w:type="paragraph" w:styleId="{id}"><w:name w:val="{name}"/>{based_on}<w:rPr>{rpr}</w:rPr></w:style>"#
    )
}

pub fn character_style(id: &str, name: &str, rpr: &str) -> String {
    format!(
        r#"<w:style w:type="character" w:styleId="{id}"><w:name w:val="{name}"/><w:rPr>{rpr}</w:rPr></w:style>"#
    )
}

/// Normal (Calibri 11), Heading1 (Arial 16 bold, based on Normal) and a
/// Strong character style.
pub fn default_styles() -> String {
    [
        r#"<w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/><w:rPr><w:rFonts w:ascii="Calibri" w:hAnsi="Calibri"/><w:sz w:val="22"/></w:rPr></w:style>"#.to_string(),
        paragraph_style(
            "Heading1",
            "heading 1",
            Some("Normal"),
            r#"<w:rFonts w:ascii="Arial" w:hAnsi="Arial"/><w:b/><w:sz w:val="32"/>"#,
        ),
        character_style("Strong", "Strong", "<w:b/>"),
    ]
    .concat()
}

/// A `w:p` with an optional style, optional extra `pPr` children and runs
/// given as (rPr children, text).
pub fn para(style: Option<&str>, ppr: &str, runs: &[(&str, &str)]) -> String {
    let style = style
        .map(|s| format!(r#"<w:pStyle w:val="{s}"/>"#))
        .unwrap_or_default();
    let ppr = if style.is_empty() && ppr.is_empty() {
        String::new()
    } else {
        format!("<w:pPr>{style}{ppr}</w:pPr>")
    };
    let runs: String = runs
        .iter()
        .map(|(rpr, text)| {
            let rpr = if rpr.is_empty() {
                String::new()
            } else {
                format!("<w:rPr>{rpr}</w:rPr>")
            };
            format!(r#"<w:r>{rpr}<w:t xml:space="preserve">{text}</w:t></w:r>"#)
        })
        .collect();
    format!("<w:p>{ppr}{runs}</w:p>")
}

pub fn table(style: Option<&str>, rows: &[&[String]]) -> String {
    let tbl_pr = style
        .map(|s| format!(r#"<w:tblPr><w:tblStyle w:val="{s}"/></w:tblPr>"#))
        .unwrap_or_default();
    let rows: String = rows
        .iter()
        .map(|cells| {
            let cells: String = cells.iter().map(|c| format!("<w:tc>{c}</w:tc>")).collect();
            format!("<w:tr>{cells}</w:tr>")
        })
        .collect();
    format!("<w:tbl>{tbl_pr}<w:tblGrid/>{rows}</w:tbl>")
}

pub const SECTION: &str = r#"<w:sectPr><w:pgSz w:w="12240" w:h="15840"/><w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440" w:header="720" w:footer="720" w:gutter="0"/></w:sectPr>"#;

pub fn extract(bytes: &[u8], id: &str) -> StyleSet {
    let _ = env_logger::try_init();
    let options = ExtractOptions {
        document_id: id.to_string(),
        ..Default::default()
    };
    docx::extract_bytes(bytes, &options).unwrap()
}

pub fn find<'a>(styles: &'a StyleSet, key: &str) -> &'a StyleRecord {
    styles
        .records
        .iter()
        .find(|r| r.context.context_key == key)
        .unwrap_or_else(|| {
            let keys: Vec<&str> = styles
                .records
                .iter()
                .map(|r| r.context.context_key.as_str())
                .collect();
            panic!("no record at {key}; have {keys:?}")
        })
}

/// A hand-built record for comparison tests.
pub fn record(
    id: usize,
    style_type: StyleType,
    role: StructuralRole,
    key: &str,
    sample: &str,
    props: FormattingProperties,
) -> StyleRecord {
    let mut context = FormattingContext::new(style_type, role);
    context.context_key = key.to_string();
    context.section_index = Some(0);
    context.sample_text = sample.to_string();
    StyleRecord {
        id,
        owning_document_id: "test".into(),
        style_type,
        name: "Normal".into(),
        based_on_style_id: None,
        signature: StyleSignature::compute(&props, style_type),
        resolved_properties: props,
        context,
        direct_format_patterns: Vec::new(),
    }
}

pub fn style_set(id: &str, records: Vec<StyleRecord>) -> StyleSet {
    StyleSet {
        document_id: id.to_string(),
        records,
        patterns: Vec::new(),
    }
}
