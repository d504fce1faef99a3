use std::collections::HashMap;
use std::time::Instant;

use crate::cancel::CancelToken;
use crate::error::Error;
use crate::model::{
    DirectFormatPattern, FormattingContext, FormattingProperties, StructuralRole, StyleRecord,
    StyleSet, StyleSignature, StyleType,
};

use super::direct::{
    RunOverride, associate, has_direct_formatting, has_direct_paragraph_formatting,
    paragraph_pattern, run_patterns,
};
use super::numbering::Numbering;
use super::props::{
    cell_properties, paragraph_properties, row_properties, run_properties, section_properties,
    table_properties,
};
use super::styles::StyleCatalog;
use super::theme::Theme;
use super::units::emu_to_pts;
use super::{Package, REL_NS, Relationship, WML_NS, WPD_NS, is_wml, wml, wml_attr};

const SAMPLE_TEXT_LIMIT: usize = 100;

pub struct ExtractOptions {
    /// Stamped on every record as its owning document.
    pub document_id: String,
    /// Emit one record per named style definition.
    pub include_style_definitions: bool,
    pub cancel: CancelToken,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            document_id: "document".to_string(),
            include_style_definitions: true,
            cancel: CancelToken::new(),
        }
    }
}

fn sample_text(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= SAMPLE_TEXT_LIMIT {
        return trimmed.to_string();
    }
    trimmed.chars().take(SAMPLE_TEXT_LIMIT).collect()
}

/// Records and patterns produced by one sub-pass.
#[derive(Default)]
struct Output {
    records: Vec<StyleRecord>,
    patterns: Vec<DirectFormatPattern>,
}

impl Output {
    fn append(&mut self, other: Output) {
        self.records.extend(other.records);
        self.patterns.extend(other.patterns);
    }
}

/// Structural position of the element being extracted.
#[derive(Clone, Default)]
struct Position {
    segments: Vec<String>,
    section: Option<usize>,
    table: Option<usize>,
    row: Option<usize>,
    cell: Option<usize>,
    paragraph: Option<usize>,
    run: Option<usize>,
    header_footer: Option<String>,
}

impl Position {
    fn section(index: usize) -> Position {
        Position {
            segments: vec![format!("Section:{index}")],
            section: Some(index),
            ..Default::default()
        }
    }

    fn push(&self, label: &str, index: impl std::fmt::Display) -> Position {
        let mut next = self.clone();
        next.segments.push(format!("{label}:{index}"));
        next
    }

    fn with_table(&self, index: usize) -> Position {
        let mut next = self.push("Table", index);
        next.table = Some(index);
        next.row = None;
        next.cell = None;
        next.paragraph = None;
        next
    }

    fn with_row(&self, index: usize) -> Position {
        let mut next = self.push("Row", index);
        next.row = Some(index);
        next
    }

    fn with_cell(&self, index: usize) -> Position {
        let mut next = self.push("Cell", index);
        next.cell = Some(index);
        next
    }

    fn with_paragraph(&self, index: usize) -> Position {
        let mut next = self.push("Paragraph", index);
        next.paragraph = Some(index);
        next
    }

    fn with_run(&self, index: usize) -> Position {
        let mut next = self.push("Run", index);
        next.run = Some(index);
        next
    }

    /// `kind` is already `Header:<type>` or `Footer:<type>`.
    fn with_header_footer(&self, kind: &str) -> Position {
        let mut next = self.clone();
        next.segments.push(kind.to_string());
        next.header_footer = Some(kind.to_string());
        next
    }

    fn key(&self) -> String {
        self.segments.join(":")
    }

    fn context(&self, element_type: StyleType, role: StructuralRole, text: &str) -> FormattingContext {
        FormattingContext {
            element_type,
            structural_role: role,
            section_index: self.section,
            table_index: self.table,
            row_index: self.row,
            cell_index: self.cell,
            paragraph_index: self.paragraph,
            run_index: self.run,
            paragraph_range: None,
            is_in_header_footer: self.header_footer.is_some(),
            header_footer_kind: self.header_footer.clone(),
            sample_text: sample_text(text),
            context_key: self.key(),
        }
    }
}

fn new_record(
    style_type: StyleType,
    name: String,
    based_on: Option<String>,
    resolved_properties: FormattingProperties,
    context: FormattingContext,
) -> StyleRecord {
    let signature = StyleSignature::compute(&resolved_properties, style_type);
    StyleRecord {
        id: 0,
        owning_document_id: String::new(),
        style_type,
        name,
        based_on_style_id: based_on,
        resolved_properties,
        signature,
        context,
        direct_format_patterns: Vec::new(),
    }
}

/// Header/footer part currently being walked.
#[derive(Clone, Copy)]
struct HeaderFooterScope {
    style_type: StyleType,
    role: StructuralRole,
}

struct Scope<'p> {
    rels: &'p HashMap<String, Relationship>,
    header_footer: Option<HeaderFooterScope>,
}

/// Plain text of a subtree: `w:t`, tabs and breaks, skipping field
/// instructions and deleted text.
fn node_text(node: roxmltree::Node) -> String {
    let mut text = String::new();
    for d in node.descendants() {
        if d.tag_name().namespace() != Some(WML_NS) {
            continue;
        }
        match d.tag_name().name() {
            "t" => {
                if let Some(t) = d.text() {
                    text.push_str(t);
                }
            }
            "tab" if is_wml(d.parent().unwrap_or(d), "r") => text.push('\t'),
            "br" | "cr" => text.push(' '),
            _ => {}
        }
    }
    text
}

/// Flatten SDT wrappers: descend into w:sdtContent and collect effective children.
fn collect_block_nodes<'a>(parent: roxmltree::Node<'a, 'a>) -> Vec<roxmltree::Node<'a, 'a>> {
    let mut nodes = Vec::new();
    for child in parent.children() {
        if is_wml(child, "sdt") {
            if let Some(content) = wml(child, "sdtContent") {
                nodes.extend(collect_block_nodes(content));
            }
        } else {
            nodes.push(child);
        }
    }
    nodes
}

struct InlineRun<'a> {
    node: roxmltree::Node<'a, 'a>,
    hyperlink: Option<usize>,
}

/// Runs and inline containers of one paragraph, in document order.
#[derive(Default)]
struct Inline<'a> {
    runs: Vec<InlineRun<'a>>,
    hyperlinks: Vec<roxmltree::Node<'a, 'a>>,
    simple_fields: Vec<roxmltree::Node<'a, 'a>>,
    controls: Vec<roxmltree::Node<'a, 'a>>,
}

fn collect_inline<'a>(parent: roxmltree::Node<'a, 'a>, out: &mut Inline<'a>, hyperlink: Option<usize>) {
    for child in parent.children() {
        if child.tag_name().namespace() != Some(WML_NS) {
            continue;
        }
        match child.tag_name().name() {
            "r" => out.runs.push(InlineRun {
                node: child,
                hyperlink,
            }),
            "hyperlink" => {
                let idx = out.hyperlinks.len();
                out.hyperlinks.push(child);
                collect_inline(child, out, Some(idx));
            }
            "fldSimple" => {
                out.simple_fields.push(child);
                collect_inline(child, out, hyperlink);
            }
            "sdt" => {
                out.controls.push(child);
                if let Some(content) = wml(child, "sdtContent") {
                    collect_inline(content, out, hyperlink);
                }
            }
            "ins" | "smartTag" | "customXml" | "moveTo" => collect_inline(child, out, hyperlink),
            _ => {}
        }
    }
}

/// Complex field being assembled across runs.
struct FieldBuild {
    /// Source offset of the `begin` run.
    anchor: usize,
    instruction: String,
    result: String,
    in_result: bool,
    depth: u32,
    props: FormattingProperties,
}

fn simple_field(instr: roxmltree::Node, resolved: &FormattingProperties, pos: &Position) -> StyleRecord {
    let instruction = instr.attribute((WML_NS, "instr")).unwrap_or("");
    let result = node_text(instr);
    let mut props = resolved.clone();
    props.apply_override(&field_properties(instruction));
    let label = if result.trim().is_empty() {
        format!("{{{}}}", field_code(instruction))
    } else {
        result
    };
    new_record(
        StyleType::Field,
        field_code(instruction),
        None,
        props,
        pos.context(StyleType::Field, StructuralRole::Field, &label),
    )
}

fn field_code(instruction: &str) -> String {
    instruction
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_ascii_uppercase()
}

fn field_properties(instruction: &str) -> FormattingProperties {
    FormattingProperties {
        field_code: Some(field_code(instruction)),
        field_instruction: Some(instruction.trim().to_string()),
        ..Default::default()
    }
}

fn control_properties(sdt: roxmltree::Node, theme: &Theme) -> FormattingProperties {
    let sdt_pr = wml(sdt, "sdtPr");
    let mut props = sdt_pr
        .and_then(|pr| wml(pr, "rPr"))
        .map(|rpr| run_properties(rpr, theme))
        .unwrap_or_default();
    props.control_tag = sdt_pr.and_then(|pr| wml_attr(pr, "tag")).map(str::to_string);
    props.control_alias = sdt_pr
        .and_then(|pr| wml_attr(pr, "alias"))
        .map(str::to_string);
    const KINDS: &[&str] = &[
        "richText", "text", "date", "dropDownList", "comboBox", "picture", "docPartObj",
        "docPartList", "group", "citation", "bibliography", "equation", "checkbox",
    ];
    let kind = sdt_pr.and_then(|pr| {
        pr.children()
            .filter(|c| c.is_element())
            .map(|c| c.tag_name().name())
            .find(|name| KINDS.contains(name))
    });
    props.control_type = Some(kind.unwrap_or("richText").to_string());
    props
}

fn drawing_properties(drawing: roxmltree::Node) -> Option<(FormattingProperties, String)> {
    let container = drawing.children().find(|n| {
        n.tag_name().namespace() == Some(WPD_NS)
            && matches!(n.tag_name().name(), "inline" | "anchor")
    })?;
    let wpd = |name: &str| {
        container
            .children()
            .find(|n| n.tag_name().namespace() == Some(WPD_NS) && n.tag_name().name() == name)
    };
    let is_inline = container.tag_name().name() == "inline";

    let mut props = FormattingProperties {
        is_inline: Some(is_inline),
        ..Default::default()
    };
    if let Some(extent) = wpd("extent") {
        props.image_width = extent
            .attribute("cx")
            .and_then(|v| v.parse::<f32>().ok())
            .map(emu_to_pts);
        props.image_height = extent
            .attribute("cy")
            .and_then(|v| v.parse::<f32>().ok())
            .map(emu_to_pts);
    }

    props.wrap_type = Some(if is_inline {
        "inline".to_string()
    } else {
        container
            .children()
            .filter(|n| n.tag_name().namespace() == Some(WPD_NS))
            .map(|n| n.tag_name().name())
            .find(|name| name.starts_with("wrap"))
            .map(|name| match name {
                "wrapNone" if container.attribute("behindDoc") == Some("1") => {
                    "behindText".to_string()
                }
                "wrapNone" => "inFrontOfText".to_string(),
                other => {
                    let rest = &other["wrap".len()..];
                    let mut chars = rest.chars();
                    match chars.next() {
                        Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
                        None => rest.to_string(),
                    }
                }
            })
            .unwrap_or_else(|| "none".to_string())
    });

    let position = |name: &str| -> Option<(String, Option<f32>)> {
        let node = wpd(name)?;
        let relative = node.attribute("relativeFrom").unwrap_or("column");
        let child = |n: &str| {
            node.children()
                .find(|c| c.tag_name().namespace() == Some(WPD_NS) && c.tag_name().name() == n)
        };
        if let Some(align) = child("align").and_then(|a| a.text()) {
            return Some((format!("{relative}:{}", align.trim()), None));
        }
        let offset = child("posOffset")
            .and_then(|o| o.text())
            .and_then(|t| t.trim().parse::<f32>().ok())
            .map(emu_to_pts);
        Some((relative.to_string(), offset))
    };
    if let Some((anchor, offset)) = position("positionH") {
        props.anchor_horizontal = Some(anchor);
        props.anchor_horizontal_offset = offset;
    }
    if let Some((anchor, offset)) = position("positionV") {
        props.anchor_vertical = Some(anchor);
        props.anchor_vertical_offset = offset;
    }

    let doc_pr = wpd("docPr");
    props.alt_text = doc_pr
        .and_then(|d| d.attribute("descr").or_else(|| d.attribute("title")))
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string);
    let label = props
        .alt_text
        .clone()
        .or_else(|| doc_pr.and_then(|d| d.attribute("name")).map(|n| format!("[{n}]")))
        .unwrap_or_else(|| "[Drawing]".to_string());

    Some((props, label))
}

fn is_heading_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.starts_with("heading")
}

struct Extractor<'c> {
    theme: &'c Theme,
    catalog: &'c StyleCatalog,
    numbering: &'c Numbering,
    cancel: &'c CancelToken,
}

/// Running counters of the body walk.
#[derive(Default)]
struct BodyState<'a> {
    section: usize,
    paragraph: usize,
    table: usize,
    control: usize,
    section_first_paragraph: usize,
    section_text: String,
    sections: Vec<(usize, roxmltree::Node<'a, 'a>)>,
}

impl<'c> Extractor<'c> {
    fn paragraph_role(
        &self,
        style_id: &str,
        has_style_ref: bool,
        resolved: &FormattingProperties,
        is_list: bool,
        in_cell: bool,
        scope: &Scope,
    ) -> StructuralRole {
        if let Some(hf) = scope.header_footer {
            return hf.role;
        }
        if in_cell {
            return StructuralRole::TableCellParagraph;
        }
        if is_list {
            return StructuralRole::ListItem;
        }
        let name = self.catalog.name_of(style_id);
        if is_heading_name(name) || is_heading_name(style_id) || resolved.outline_level.is_some_and(|l| l < 9) {
            return StructuralRole::Heading;
        }
        let lower = name.to_ascii_lowercase();
        if lower == "title" || lower == "subtitle" {
            return StructuralRole::Title;
        }
        if !has_style_ref
            || style_id == self.catalog.default_paragraph_style()
            || matches!(lower.as_str(), "normal" | "body text" | "body")
        {
            return StructuralRole::Body;
        }
        StructuralRole::Paragraph
    }

    /// One `w:p`, plus the runs, hyperlinks, fields, drawings and content
    /// controls inside it.
    fn paragraph(
        &self,
        node: roxmltree::Node,
        pos: &Position,
        scope: &Scope,
        table_base: Option<&FormattingProperties>,
    ) -> Output {
        let mut out = Output::default();
        let ppr = wml(node, "pPr");
        let style_ref = ppr.and_then(|ppr| wml_attr(ppr, "pStyle"));
        let style_id = style_ref.unwrap_or_else(|| self.catalog.default_paragraph_style());

        let explicit = ppr.map(paragraph_properties).unwrap_or_default();
        let list_ref = ppr
            .and_then(|ppr| wml(ppr, "numPr"))
            .and_then(|num_pr| {
                let num_id = wml_attr(num_pr, "numId")?;
                let level = wml_attr(num_pr, "ilvl")
                    .and_then(|v| v.parse::<u8>().ok())
                    .unwrap_or(0);
                Some((num_id.to_string(), level))
            })
            .or_else(|| self.catalog.list_reference(style_id));
        let list_props = list_ref
            .as_ref()
            .and_then(|(num_id, level)| self.numbering.list_properties(num_id, *level));

        let empty = FormattingProperties::default();
        let base = self
            .catalog
            .resolve_over(Some(style_id), table_base.unwrap_or(&empty));
        let mut resolved = base.clone();
        if let Some(list) = &list_props {
            resolved.apply_override(list);
            if let Some(left) = list.list_indent_left {
                resolved.indent_left = Some(left);
            }
            if let Some(hanging) = list.list_indent_hanging {
                resolved.indent_first_line = Some(-hanging);
            }
        }
        resolved.apply_override(&explicit);

        let mut inline = Inline::default();
        collect_inline(node, &mut inline, None);

        let mut text = String::new();
        let mut run_overrides: Vec<RunOverride> = Vec::new();
        // Keyed by the source offset of the element that opens each record.
        let mut child_records: Vec<(usize, StyleRecord)> = Vec::new();
        let mut drawing_count = 0usize;
        let mut field_count = 0usize;
        let mut field: Option<FieldBuild> = None;
        let mut hyperlink_runs: Vec<Option<(FormattingProperties, Option<String>)>> =
            vec![None; inline.hyperlinks.len()];
        let mut hyperlink_text: Vec<String> = vec![String::new(); inline.hyperlinks.len()];

        let mut simple_fields = inline.simple_fields.iter().copied().peekable();

        for (ri, run) in inline.runs.iter().enumerate() {
            let run_start = run.node.range().start;
            while let Some(instr) = simple_fields.next_if(|f| f.range().start < run_start) {
                let field_pos = pos.push("Field", field_count);
                field_count += 1;
                child_records.push((instr.range().start, simple_field(instr, &resolved, &field_pos)));
            }

            let rpr = wml(run.node, "rPr");
            let char_style = rpr.and_then(|rpr| wml_attr(rpr, "rStyle"));
            let explicit_run = rpr
                .map(|rpr| run_properties(rpr, self.theme))
                .unwrap_or_default();
            let mut run_base = resolved.clone();
            if let Some(cs) = char_style {
                run_base.apply_override(&self.catalog.resolve_chain(cs));
            }
            let mut run_props = run_base.clone();
            run_props.apply_override(&explicit_run);

            let mut run_text = String::new();
            for child in run.node.children() {
                if child.tag_name().namespace() != Some(WML_NS) {
                    continue;
                }
                match child.tag_name().name() {
                    "fldChar" => match child.attribute((WML_NS, "fldCharType")) {
                        Some("begin") => {
                            if let Some(f) = field.as_mut() {
                                f.depth += 1;
                            } else {
                                field = Some(FieldBuild {
                                    anchor: run_start,
                                    instruction: String::new(),
                                    result: String::new(),
                                    in_result: false,
                                    depth: 0,
                                    props: run_props.clone(),
                                });
                            }
                        }
                        Some("separate") => {
                            if let Some(f) = field.as_mut()
                                && f.depth == 0
                            {
                                f.in_result = true;
                            }
                        }
                        Some("end") => {
                            let nested = field.as_ref().is_some_and(|f| f.depth > 0);
                            if nested {
                                if let Some(f) = field.as_mut() {
                                    f.depth -= 1;
                                }
                            } else if let Some(f) = field.take() {
                                let field_pos = pos.push("Field", field_count);
                                field_count += 1;
                                let mut props = f.props;
                                props.apply_override(&field_properties(&f.instruction));
                                let label = if f.result.trim().is_empty() {
                                    format!("{{{}}}", field_code(&f.instruction))
                                } else {
                                    f.result
                                };
                                child_records.push((
                                    f.anchor,
                                    new_record(
                                        StyleType::Field,
                                        field_code(&f.instruction),
                                        None,
                                        props,
                                        field_pos.context(StyleType::Field, StructuralRole::Field, &label),
                                    ),
                                ));
                            }
                        }
                        _ => {}
                    },
                    "instrText" => {
                        if let Some(f) = field.as_mut()
                            && f.depth == 0
                            && !f.in_result
                        {
                            f.instruction.push_str(child.text().unwrap_or(""));
                        }
                    }
                    "t" => {
                        let t = child.text().unwrap_or("");
                        match field.as_mut() {
                            Some(f) if !f.in_result => {}
                            Some(f) => {
                                f.result.push_str(t);
                                run_text.push_str(t);
                            }
                            None => run_text.push_str(t),
                        }
                    }
                    "tab" => run_text.push('\t'),
                    "br" | "cr" => run_text.push(' '),
                    "drawing" => match drawing_properties(child) {
                        Some((props, label)) => {
                            let drawing_pos = pos.push("Drawing", drawing_count);
                            drawing_count += 1;
                            child_records.push((
                                child.range().start,
                                new_record(
                                    StyleType::Drawing,
                                    "Drawing".to_string(),
                                    None,
                                    props,
                                    drawing_pos.context(
                                        StyleType::Drawing,
                                        StructuralRole::Drawing,
                                        &label,
                                    ),
                                ),
                            ));
                        }
                        None => log::debug!(
                            "Skipping drawing without inline/anchor container at {}",
                            pos.key()
                        ),
                    },
                    _ => {}
                }
            }

            if let Some(h) = run.hyperlink {
                hyperlink_text[h].push_str(&run_text);
                if hyperlink_runs[h].is_none() {
                    hyperlink_runs[h] = Some((run_props.clone(), char_style.map(str::to_string)));
                }
            }

            if has_direct_formatting(run.node) {
                let mut visual = explicit_run.clone();
                // Proofing.
                visual.language = None;
                let overrides = visual.deviations_from(&run_base);
                if !overrides.is_empty() {
                    run_overrides.push(RunOverride {
                        run_index: ri,
                        overrides,
                        text: run_text.clone(),
                    });
                }
            }

            if let Some(cs) = char_style {
                let run_pos = pos.with_run(ri);
                child_records.push((
                    run_start,
                    new_record(
                        StyleType::Run,
                        self.catalog.name_of(cs).to_string(),
                        Some(cs.to_string()),
                        run_props,
                        run_pos.context(StyleType::Run, StructuralRole::Run, &run_text),
                    ),
                ));
            }

            text.push_str(&run_text);
        }

        for instr in simple_fields {
            let field_pos = pos.push("Field", field_count);
            field_count += 1;
            child_records.push((instr.range().start, simple_field(instr, &resolved, &field_pos)));
        }

        for (h, link) in inline.hyperlinks.iter().enumerate() {
            let (mut props, char_style) = hyperlink_runs[h].take().unwrap_or((resolved.clone(), None));
            props.hyperlink_target = link
                .attribute((REL_NS, "id"))
                .and_then(|rid| match scope.rels.get(rid) {
                    Some(rel) => Some(rel.target.clone()),
                    None => {
                        log::warn!("Hyperlink relationship {rid} not found at {}", pos.key());
                        None
                    }
                });
            props.hyperlink_anchor = link
                .attribute((WML_NS, "anchor"))
                .map(str::to_string);
            props.hyperlink_tooltip = link
                .attribute((WML_NS, "tooltip"))
                .map(str::to_string);
            let name = char_style
                .as_deref()
                .map(|cs| self.catalog.name_of(cs).to_string())
                .unwrap_or_else(|| "Hyperlink".to_string());
            child_records.push((
                link.range().start,
                new_record(
                    StyleType::Hyperlink,
                    name,
                    char_style,
                    props,
                    pos.push("Hyperlink", h).context(
                        StyleType::Hyperlink,
                        StructuralRole::Hyperlink,
                        &hyperlink_text[h],
                    ),
                ),
            ));
        }

        for (c, sdt) in inline.controls.iter().enumerate() {
            let mut props = resolved.clone();
            props.apply_override(&control_properties(*sdt, self.theme));
            let label = wml(*sdt, "sdtContent").map(node_text).unwrap_or_default();
            child_records.push((
                sdt.range().start,
                new_record(
                    StyleType::ContentControl,
                    props.control_alias.clone().unwrap_or_else(|| "Content Control".to_string()),
                    None,
                    props,
                    pos.push("ContentControl", c).context(
                        StyleType::ContentControl,
                        StructuralRole::ContentControl,
                        &label,
                    ),
                ),
            ));
        }

        let has_style_ref = style_ref.is_some();
        let has_explicit = !explicit.is_empty();
        let is_list = list_props.is_some();
        let in_cell = pos.cell.is_some();
        let role = self.paragraph_role(style_id, has_style_ref, &resolved, is_list, in_cell, scope);
        let emit = has_style_ref || has_explicit || is_list || !run_overrides.is_empty();

        if emit {
            let style_type = match scope.header_footer {
                Some(hf) => hf.style_type,
                None if is_list => StyleType::List,
                None if !has_style_ref && !has_explicit => StyleType::DirectFormatting,
                None => StyleType::Paragraph,
            };
            let name = if style_type == StyleType::DirectFormatting {
                "Direct Formatting".to_string()
            } else {
                self.catalog.name_of(style_id).to_string()
            };
            let context = pos.context(style_type, role, &text);

            if has_direct_paragraph_formatting(node) {
                let mut style_only = base.clone();
                if let Some(list) = &list_props {
                    style_only.apply_override(list);
                }
                let overrides = explicit.deviations_from(&style_only);
                if !overrides.is_empty() {
                    out.patterns.push(paragraph_pattern(&context, overrides));
                }
            }
            out.patterns.extend(run_patterns(&context, run_overrides));

            out.records.push(new_record(
                style_type,
                name,
                Some(style_id.to_string()),
                resolved,
                context,
            ));
        }

        child_records.sort_by_key(|(anchor, _)| *anchor);
        out.records.extend(child_records.into_iter().map(|(_, record)| record));
        out
    }

    fn table(
        &self,
        node: roxmltree::Node,
        pos: &Position,
        scope: &Scope,
    ) -> Result<Output, Error> {
        let mut out = Output::default();
        let tbl_pr = wml(node, "tblPr");
        let style_ref = tbl_pr.and_then(|pr| wml_attr(pr, "tblStyle"));
        let explicit = tbl_pr.map(table_properties).unwrap_or_default();

        let content_base = style_ref
            .map(|id| self.catalog.resolve_chain(id))
            .unwrap_or_default();
        let mut resolved = self
            .catalog
            .resolve_over(style_ref, &FormattingProperties::default());
        resolved.apply_override(&explicit);

        let rows: Vec<_> = collect_block_nodes(node)
            .into_iter()
            .filter(|n| is_wml(*n, "tr"))
            .collect();

        let table_text = rows
            .iter()
            .map(|r| node_text(*r))
            .find(|t| !t.trim().is_empty())
            .unwrap_or_default();

        let name = style_ref
            .map(|id| self.catalog.name_of(id).to_string())
            .unwrap_or_else(|| "Table".to_string());
        out.records.push(new_record(
            StyleType::Table,
            name,
            style_ref.map(str::to_string),
            resolved.clone(),
            pos.context(StyleType::Table, StructuralRole::Table, &table_text),
        ));

        for (ri, tr) in rows.iter().enumerate() {
            self.cancel.check()?;
            let row_pos = pos.with_row(ri);
            let row_explicit = wml(*tr, "trPr").map(row_properties).unwrap_or_default();
            let cells: Vec<_> = collect_block_nodes(*tr)
                .into_iter()
                .filter(|n| is_wml(*n, "tc"))
                .collect();

            if !row_explicit.is_empty() {
                let mut row_props = row_explicit;
                row_props.inherit_from(&resolved);
                let row_text: Vec<String> = cells
                    .iter()
                    .map(|c| node_text(*c).trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect();
                out.records.push(new_record(
                    StyleType::TableRow,
                    format!("Row {}", ri + 1),
                    None,
                    row_props,
                    row_pos.context(StyleType::TableRow, StructuralRole::TableRow, &row_text.join(" | ")),
                ));
            }

            for (ci, tc) in cells.iter().enumerate() {
                let cell_pos = row_pos.with_cell(ci);
                let cell_explicit = wml(*tc, "tcPr").map(cell_properties).unwrap_or_default();
                if !cell_explicit.is_empty() {
                    let mut cell_props = cell_explicit;
                    cell_props.inherit_from(&resolved);
                    out.records.push(new_record(
                        StyleType::TableCell,
                        format!("Cell {}.{}", ri + 1, ci + 1),
                        None,
                        cell_props,
                        cell_pos.context(StyleType::TableCell, StructuralRole::TableCell, &node_text(*tc)),
                    ));
                }

                let mut paragraph = 0usize;
                let mut nested_table = 0usize;
                for child in collect_block_nodes(*tc) {
                    if is_wml(child, "p") {
                        out.append(self.paragraph(
                            child,
                            &cell_pos.with_paragraph(paragraph),
                            scope,
                            Some(&content_base),
                        ));
                        paragraph += 1;
                    } else if is_wml(child, "tbl") {
                        out.append(self.table(child, &cell_pos.with_table(nested_table), scope)?);
                        nested_table += 1;
                    }
                }
            }
        }

        Ok(out)
    }

    fn block_control(&self, sdt: roxmltree::Node, pos: &Position) -> StyleRecord {
        let mut props = self.catalog.resolve(self.catalog.default_paragraph_style());
        props.apply_override(&control_properties(sdt, self.theme));
        let text = wml(sdt, "sdtContent").map(node_text).unwrap_or_default();
        new_record(
            StyleType::ContentControl,
            props
                .control_alias
                .clone()
                .unwrap_or_else(|| "Content Control".to_string()),
            None,
            props,
            pos.context(StyleType::ContentControl, StructuralRole::ContentControl, &text),
        )
    }

    fn section_record(&self, sect_pr: roxmltree::Node, index: usize, sample: &str) -> StyleRecord {
        new_record(
            StyleType::Section,
            format!("Section {}", index + 1),
            None,
            section_properties(sect_pr),
            Position::section(index).context(StyleType::Section, StructuralRole::Section, sample),
        )
    }

    /// Body content in traversal order, closing a section record at every
    /// `w:sectPr`.
    fn walk_body<'a>(
        &self,
        parent: roxmltree::Node<'a, 'a>,
        state: &mut BodyState<'a>,
        scope: &Scope,
        out: &mut Output,
    ) -> Result<(), Error> {
        for node in parent.children() {
            if node.tag_name().namespace() != Some(WML_NS) {
                continue;
            }
            self.cancel.check()?;
            let section_pos = Position::section(state.section);
            match node.tag_name().name() {
                "p" => {
                    let pos = section_pos.with_paragraph(state.paragraph);
                    let para_text = node_text(node);
                    if state.section_text.trim().is_empty() {
                        state.section_text = para_text;
                    }
                    out.append(self.paragraph(node, &pos, scope, None));
                    state.paragraph += 1;

                    if let Some(sect_pr) = wml(node, "pPr").and_then(|ppr| wml(ppr, "sectPr")) {
                        self.close_section(sect_pr, state, out);
                    }
                }
                "tbl" => {
                    let pos = section_pos.with_table(state.table);
                    if state.section_text.trim().is_empty() {
                        state.section_text = node_text(node);
                    }
                    out.append(self.table(node, &pos, scope)?);
                    state.table += 1;
                }
                "sdt" => {
                    let pos = section_pos.push("ContentControl", state.control);
                    state.control += 1;
                    out.records.push(self.block_control(node, &pos));
                    if let Some(content) = wml(node, "sdtContent") {
                        self.walk_body(content, state, scope, out)?;
                    }
                }
                "customXml" => self.walk_body(node, state, scope, out)?,
                _ => {}
            }
        }
        Ok(())
    }

    fn close_section<'a>(
        &self,
        sect_pr: roxmltree::Node<'a, 'a>,
        state: &mut BodyState<'a>,
        out: &mut Output,
    ) {
        let mut record = self.section_record(sect_pr, state.section, &state.section_text);
        record.context.paragraph_range = Some((state.section_first_paragraph, state.paragraph));
        out.records.push(record);
        state.sections.push((state.section, sect_pr));
        state.section += 1;
        state.section_first_paragraph = state.paragraph;
        state.section_text.clear();
    }

    fn body_pass<'a>(
        &self,
        body: roxmltree::Node<'a, 'a>,
        rels: &HashMap<String, Relationship>,
    ) -> Result<(Output, Vec<(usize, roxmltree::Node<'a, 'a>)>), Error> {
        let scope = Scope {
            rels,
            header_footer: None,
        };
        let mut state = BodyState::default();
        let mut out = Output::default();
        self.walk_body(body, &mut state, &scope, &mut out)?;
        if let Some(sect_pr) = wml(body, "sectPr") {
            self.close_section(sect_pr, &mut state, &mut out);
        }
        Ok((out, state.sections))
    }

    /// Header and footer parts referenced by each section.
    fn header_footer_pass(
        &self,
        sections: &[(usize, roxmltree::Node)],
        package: &Package,
    ) -> Result<Output, Error> {
        let mut out = Output::default();
        for (section, sect_pr) in sections {
            for reference in sect_pr.children() {
                let (label, style_type, role) = if is_wml(reference, "headerReference") {
                    ("Header", StyleType::Header, StructuralRole::Header)
                } else if is_wml(reference, "footerReference") {
                    ("Footer", StyleType::Footer, StructuralRole::Footer)
                } else {
                    continue;
                };
                self.cancel.check()?;
                let kind = format!(
                    "{label}:{}",
                    reference.attribute((WML_NS, "type")).unwrap_or("default")
                );
                let Some(rid) = reference.attribute((REL_NS, "id")) else {
                    continue;
                };
                let Some(part) = package.header_footer_parts.get(rid) else {
                    log::warn!("Section {section}: {kind} part {rid} is missing, skipping it");
                    continue;
                };
                let xml = match roxmltree::Document::parse(&part.xml) {
                    Ok(xml) => xml,
                    Err(e) => {
                        log::warn!("Section {section}: {kind} part is malformed ({e}), skipping it");
                        continue;
                    }
                };
                let scope = Scope {
                    rels: &part.rels,
                    header_footer: Some(HeaderFooterScope { style_type, role }),
                };
                let pos = Position::section(*section).with_header_footer(&kind);
                let mut paragraph = 0usize;
                let mut table = 0usize;
                for node in collect_block_nodes(xml.root_element()) {
                    if is_wml(node, "p") {
                        out.append(self.paragraph(node, &pos.with_paragraph(paragraph), &scope, None));
                        paragraph += 1;
                    } else if is_wml(node, "tbl") {
                        out.append(self.table(node, &pos.with_table(table), &scope)?);
                        table += 1;
                    }
                }
            }
        }
        Ok(out)
    }

    fn definitions_pass(&self) -> Output {
        let records = self
            .catalog
            .definitions()
            .map(|def| {
                let pos = Position {
                    segments: vec![format!("Style:{}", def.style_id)],
                    ..Default::default()
                };
                new_record(
                    StyleType::NamedStyleDefinition,
                    def.name.clone(),
                    def.based_on_id.clone(),
                    self.catalog.resolve(&def.style_id),
                    pos.context(
                        StyleType::NamedStyleDefinition,
                        StructuralRole::StyleDefinition,
                        &def.name,
                    ),
                )
            })
            .collect();
        Output {
            records,
            patterns: Vec::new(),
        }
    }
}

/// Extracts every style record and direct-format pattern of a package.
///
/// A missing or corrupt main part fails the extraction; missing styles,
/// numbering, theme or header parts fall back to defaults.
pub fn extract(package: &Package, options: &ExtractOptions) -> Result<StyleSet, Error> {
    let t0 = Instant::now();
    options.cancel.check()?;

    let theme = Theme::parse(package.theme.as_deref());
    let catalog = StyleCatalog::parse(package.styles.as_deref(), &theme);
    let numbering = Numbering::parse(package.numbering.as_deref());

    let xml = roxmltree::Document::parse(&package.main.xml)?;
    let body = wml(xml.root_element(), "body")
        .ok_or_else(|| Error::InvalidDocx("missing w:body in word/document.xml".into()))?;

    let extractor = Extractor {
        theme: &theme,
        catalog: &catalog,
        numbering: &numbering,
        cancel: &options.cancel,
    };

    let (mut out, sections) = extractor.body_pass(body, &package.main.rels)?;
    out.append(extractor.header_footer_pass(&sections, package)?);
    if options.include_style_definitions {
        out.append(extractor.definitions_pass());
    }
    let t_walk = t0.elapsed();

    let Output {
        mut records,
        patterns,
    } = out;
    for (i, record) in records.iter_mut().enumerate() {
        record.id = i;
        record.owning_document_id = options.document_id.clone();
    }
    let discovered = patterns.len();
    let patterns = associate(&mut records, patterns);
    let t_total = t0.elapsed();

    log::info!(
        "Extracted {}: {} records, {} direct-format patterns ({} dropped), {} sections; walk={:.1}ms, associate={:.1}ms",
        options.document_id,
        records.len(),
        patterns.len(),
        discovered - patterns.len(),
        sections.len(),
        t_walk.as_secs_f64() * 1000.0,
        (t_total - t_walk).as_secs_f64() * 1000.0,
    );

    Ok(StyleSet {
        document_id: options.document_id.clone(),
        records,
        patterns,
    })
}
