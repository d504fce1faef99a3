use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TabStop {
    pub position: f32, // points
    pub alignment: String,
    pub leader: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Border {
    pub style: String,
    pub width: f32, // points
    pub space: f32, // points
    pub color: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Borders {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top: Option<Border>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bottom: Option<Border>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<Border>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<Border>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub between: Option<Border>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inside_h: Option<Border>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inside_v: Option<Border>,
}

impl Borders {
    pub fn is_empty(&self) -> bool {
        self.top.is_none()
            && self.bottom.is_none()
            && self.left.is_none()
            && self.right.is_none()
            && self.between.is_none()
            && self.inside_h.is_none()
            && self.inside_v.is_none()
    }
}

/// One formatting value, as it appears in a report's property map.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Flag(bool),
    Integer(i64),
    Number(f32),
    Text(String),
    Tabs(Vec<TabStop>),
    Borders(Borders),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Flag(v) => write!(f, "{v}"),
            PropertyValue::Integer(v) => write!(f, "{v}"),
            PropertyValue::Number(v) => write!(f, "{v:.2}"),
            PropertyValue::Text(v) => write!(f, "{v}"),
            PropertyValue::Tabs(tabs) => {
                let parts: Vec<String> = tabs
                    .iter()
                    .map(|t| format!("{}@{:.1}", t.alignment, t.position))
                    .collect();
                write!(f, "[{}]", parts.join(", "))
            }
            PropertyValue::Borders(b) => {
                let mut sides = Vec::new();
                for (name, border) in [
                    ("top", &b.top),
                    ("bottom", &b.bottom),
                    ("left", &b.left),
                    ("right", &b.right),
                    ("between", &b.between),
                    ("insideH", &b.inside_h),
                    ("insideV", &b.inside_v),
                ] {
                    if let Some(border) = border {
                        sides.push(format!("{name}:{}/{:.2}", border.style, border.width));
                    }
                }
                write!(f, "{{{}}}", sides.join(" "))
            }
        }
    }
}

/// Declares `FormattingProperties` from one table so the field list, the
/// external names and both merge folds never drift apart.
macro_rules! formatting_properties {
    ($( $field:ident : $ty:ty => $name:literal as $kind:ident, )*) => {
        /// Every field is independently optional: `None` means "inherit",
        /// never "off" or "zero".
        #[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
        pub struct FormattingProperties {
            $(
                #[serde(rename = $name, default, skip_serializing_if = "Option::is_none")]
                pub $field: Option<$ty>,
            )*
        }

        impl FormattingProperties {
            pub const FIELD_NAMES: &'static [&'static str] = &[$($name),*];

            /// Ancestor fold: fills only fields that are still unset, so the
            /// closest definition wins.
            pub fn inherit_from(&mut self, ancestor: &FormattingProperties) {
                $(
                    if self.$field.is_none() {
                        self.$field.clone_from(&ancestor.$field);
                    }
                )*
            }

            /// Override fold: every field set on `over` replaces ours, so the
            /// last applied layer wins.
            pub fn apply_override(&mut self, over: &FormattingProperties) {
                $(
                    if over.$field.is_some() {
                        self.$field.clone_from(&over.$field);
                    }
                )*
            }

            pub fn is_empty(&self) -> bool {
                $( self.$field.is_none() )&&*
            }

            pub fn get(&self, name: &str) -> Option<PropertyValue> {
                match name {
                    $( $name => self.$field.clone().map(|v| PropertyValue::$kind(v.into())), )*
                    _ => None,
                }
            }

            /// Set fields in declaration order.
            pub fn values(&self) -> Vec<(&'static str, PropertyValue)> {
                let mut out = Vec::new();
                $(
                    if let Some(v) = &self.$field {
                        out.push(($name, PropertyValue::$kind(v.clone().into())));
                    }
                )*
                out
            }

            /// Fields of `self` that are set and disagree with `base`.
            pub fn deviations_from(&self, base: &FormattingProperties) -> FormattingProperties {
                let mut out = FormattingProperties::default();
                $(
                    if self.$field.is_some() && self.$field != base.$field {
                        out.$field.clone_from(&self.$field);
                    }
                )*
                out
            }
        }
    };
}

formatting_properties! {
    // character
    font_family: String => "FontFamily" as Text,
    font_size: f32 => "FontSize" as Number,
    bold: bool => "IsBold" as Flag,
    italic: bool => "IsItalic" as Flag,
    underline: String => "Underline" as Text,
    strikethrough: bool => "IsStrikethrough" as Flag,
    double_strikethrough: bool => "IsDoubleStrikethrough" as Flag,
    all_caps: bool => "IsAllCaps" as Flag,
    small_caps: bool => "IsSmallCaps" as Flag,
    shadow: bool => "HasShadow" as Flag,
    outline: bool => "HasOutline" as Flag,
    hidden: bool => "IsHidden" as Flag,
    color: String => "Color" as Text,
    highlight: String => "Highlight" as Text,
    character_spacing: f32 => "CharacterSpacing" as Number,
    character_scale: u32 => "CharacterScale" as Integer,
    vertical_text_alignment: String => "VerticalTextAlignment" as Text,
    run_shading: String => "RunShading" as Text,
    language: String => "Language" as Text,
    // paragraph
    alignment: String => "Alignment" as Text,
    space_before: f32 => "SpacingBefore" as Number,
    space_after: f32 => "SpacingAfter" as Number,
    line_spacing: f32 => "LineSpacing" as Number,
    line_spacing_rule: String => "LineSpacingRule" as Text,
    indent_left: f32 => "IndentLeft" as Number,
    indent_right: f32 => "IndentRight" as Number,
    indent_first_line: f32 => "IndentFirstLine" as Number,
    tab_stops: Vec<TabStop> => "TabStops" as Tabs,
    paragraph_borders: Borders => "ParagraphBorders" as Borders,
    paragraph_shading: String => "ParagraphShading" as Text,
    keep_with_next: bool => "KeepWithNext" as Flag,
    keep_together: bool => "KeepTogether" as Flag,
    widow_control: bool => "WidowControl" as Flag,
    page_break_before: bool => "PageBreakBefore" as Flag,
    contextual_spacing: bool => "ContextualSpacing" as Flag,
    outline_level: u32 => "OutlineLevel" as Integer,
    // table
    table_width: f32 => "TableWidth" as Number,
    table_width_type: String => "TableWidthType" as Text,
    table_alignment: String => "TableAlignment" as Text,
    table_indent: f32 => "TableIndent" as Number,
    table_layout: String => "TableLayout" as Text,
    table_borders: Borders => "TableBorders" as Borders,
    table_shading: String => "TableShading" as Text,
    cell_margin_top: f32 => "CellMarginTop" as Number,
    cell_margin_bottom: f32 => "CellMarginBottom" as Number,
    cell_margin_left: f32 => "CellMarginLeft" as Number,
    cell_margin_right: f32 => "CellMarginRight" as Number,
    // row
    row_height: f32 => "RowHeight" as Number,
    row_height_rule: String => "RowHeightRule" as Text,
    is_header_row: bool => "IsHeaderRow" as Flag,
    cant_split: bool => "CantSplit" as Flag,
    // cell
    cell_width: f32 => "CellWidth" as Number,
    cell_borders: Borders => "CellBorders" as Borders,
    cell_shading: String => "CellShading" as Text,
    grid_span: u32 => "GridSpan" as Integer,
    vertical_merge: String => "VerticalMerge" as Text,
    cell_vertical_alignment: String => "CellVerticalAlignment" as Text,
    text_direction: String => "TextDirection" as Text,
    no_wrap: bool => "NoWrap" as Flag,
    // list / numbering
    list_numbering_id: String => "ListNumberingId" as Text,
    list_level: u32 => "ListLevel" as Integer,
    list_format: String => "ListFormat" as Text,
    list_level_text: String => "ListLevelText" as Text,
    list_start: u32 => "ListStart" as Integer,
    list_indent_left: f32 => "ListIndentLeft" as Number,
    list_indent_hanging: f32 => "ListIndentHanging" as Number,
    // drawing
    image_width: f32 => "ImageWidth" as Number,
    image_height: f32 => "ImageHeight" as Number,
    is_inline: bool => "IsInline" as Flag,
    wrap_type: String => "WrapType" as Text,
    anchor_horizontal: String => "AnchorHorizontal" as Text,
    anchor_horizontal_offset: f32 => "AnchorHorizontalOffset" as Number,
    anchor_vertical: String => "AnchorVertical" as Text,
    anchor_vertical_offset: f32 => "AnchorVerticalOffset" as Number,
    alt_text: String => "AltText" as Text,
    // hyperlink
    hyperlink_target: String => "HyperlinkTarget" as Text,
    hyperlink_anchor: String => "HyperlinkAnchor" as Text,
    hyperlink_tooltip: String => "HyperlinkTooltip" as Text,
    // field
    field_code: String => "FieldCode" as Text,
    field_instruction: String => "FieldInstruction" as Text,
    // content control
    control_tag: String => "ControlTag" as Text,
    control_alias: String => "ControlAlias" as Text,
    control_type: String => "ControlType" as Text,
    // section / page
    page_width: f32 => "PageWidth" as Number,
    page_height: f32 => "PageHeight" as Number,
    orientation: String => "Orientation" as Text,
    page_margin_top: f32 => "PageMarginTop" as Number,
    page_margin_bottom: f32 => "PageMarginBottom" as Number,
    page_margin_left: f32 => "PageMarginLeft" as Number,
    page_margin_right: f32 => "PageMarginRight" as Number,
    gutter: f32 => "Gutter" as Number,
    header_distance: f32 => "HeaderDistance" as Number,
    footer_distance: f32 => "FooterDistance" as Number,
    column_count: u32 => "ColumnCount" as Integer,
    column_spacing: f32 => "ColumnSpacing" as Number,
    page_number_format: String => "PageNumberFormat" as Text,
    page_number_start: u32 => "PageNumberStart" as Integer,
    section_break_type: String => "SectionBreakType" as Text,
    title_page: bool => "HasTitlePage" as Flag,
}

/// Direct-format overrides: the same bag, where every unset field means
/// "same as the base style".
pub type PartialFormattingProperties = FormattingProperties;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StyleType {
    Paragraph,
    Run,
    Table,
    TableRow,
    TableCell,
    Section,
    List,
    Header,
    Footer,
    ContentControl,
    Drawing,
    Field,
    Hyperlink,
    NamedStyleDefinition,
    DirectFormatting,
}

impl StyleType {
    pub const ALL: [StyleType; 15] = [
        StyleType::Paragraph,
        StyleType::Run,
        StyleType::Table,
        StyleType::TableRow,
        StyleType::TableCell,
        StyleType::Section,
        StyleType::List,
        StyleType::Header,
        StyleType::Footer,
        StyleType::ContentControl,
        StyleType::Drawing,
        StyleType::Field,
        StyleType::Hyperlink,
        StyleType::NamedStyleDefinition,
        StyleType::DirectFormatting,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StyleType::Paragraph => "Paragraph",
            StyleType::Run => "Run",
            StyleType::Table => "Table",
            StyleType::TableRow => "TableRow",
            StyleType::TableCell => "TableCell",
            StyleType::Section => "Section",
            StyleType::List => "List",
            StyleType::Header => "Header",
            StyleType::Footer => "Footer",
            StyleType::ContentControl => "ContentControl",
            StyleType::Drawing => "Drawing",
            StyleType::Field => "Field",
            StyleType::Hyperlink => "Hyperlink",
            StyleType::NamedStyleDefinition => "NamedStyleDefinition",
            StyleType::DirectFormatting => "DirectFormatting",
        }
    }
}

impl fmt::Display for StyleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StyleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StyleType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown style type: {s}"))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StructuralRole {
    Heading,
    Title,
    Body,
    Paragraph,
    ListItem,
    Table,
    TableRow,
    TableCell,
    TableCellParagraph,
    Header,
    Footer,
    Section,
    Drawing,
    Field,
    Hyperlink,
    ContentControl,
    Run,
    StyleDefinition,
}

impl StructuralRole {
    /// Roles whose elements exist because of document structure, whatever
    /// their formatting.
    pub fn is_structural(self) -> bool {
        matches!(
            self,
            StructuralRole::TableCell
                | StructuralRole::TableCellParagraph
                | StructuralRole::Paragraph
                | StructuralRole::Heading
                | StructuralRole::Body
                | StructuralRole::Table
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StructuralRole::Heading => "Heading",
            StructuralRole::Title => "Title",
            StructuralRole::Body => "Body",
            StructuralRole::Paragraph => "Paragraph",
            StructuralRole::ListItem => "ListItem",
            StructuralRole::Table => "Table",
            StructuralRole::TableRow => "TableRow",
            StructuralRole::TableCell => "TableCell",
            StructuralRole::TableCellParagraph => "TableCellParagraph",
            StructuralRole::Header => "Header",
            StructuralRole::Footer => "Footer",
            StructuralRole::Section => "Section",
            StructuralRole::Drawing => "Drawing",
            StructuralRole::Field => "Field",
            StructuralRole::Hyperlink => "Hyperlink",
            StructuralRole::ContentControl => "ContentControl",
            StructuralRole::Run => "Run",
            StructuralRole::StyleDefinition => "StyleDefinition",
        }
    }
}

impl fmt::Display for StructuralRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an element sits in its document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FormattingContext {
    pub element_type: StyleType,
    pub structural_role: StructuralRole,
    pub section_index: Option<usize>,
    pub table_index: Option<usize>,
    pub row_index: Option<usize>,
    pub cell_index: Option<usize>,
    pub paragraph_index: Option<usize>,
    pub run_index: Option<usize>,
    /// Body paragraphs `[start, end)` covered by a section record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paragraph_range: Option<(usize, usize)>,
    pub is_in_header_footer: bool,
    pub header_footer_kind: Option<String>,
    pub sample_text: String,
    /// Colon-joined positional path, e.g. `Section:0:Table:1:Row:2:Cell:0:Paragraph:3`.
    pub context_key: String,
}

impl FormattingContext {
    pub fn new(element_type: StyleType, structural_role: StructuralRole) -> Self {
        Self {
            element_type,
            structural_role,
            section_index: None,
            table_index: None,
            row_index: None,
            cell_index: None,
            paragraph_index: None,
            run_index: None,
            paragraph_range: None,
            is_in_header_footer: false,
            header_footer_kind: None,
            sample_text: String::new(),
            context_key: String::new(),
        }
    }

    /// Human readable position, 1-based.
    pub fn location(&self) -> String {
        let mut parts = Vec::new();
        if let Some(s) = self.section_index {
            parts.push(format!("Section {}", s + 1));
        }
        if let Some(kind) = &self.header_footer_kind {
            parts.push(kind.replace(':', " "));
        }
        if let Some(t) = self.table_index {
            parts.push(format!("Table {}", t + 1));
        }
        if let Some(r) = self.row_index {
            parts.push(format!("Row {}", r + 1));
        }
        if let Some(c) = self.cell_index {
            parts.push(format!("Cell {}", c + 1));
        }
        if let Some(p) = self.paragraph_index {
            parts.push(format!("Paragraph {}", p + 1));
        }
        if let Some(r) = self.run_index {
            parts.push(format!("Run {}", r + 1));
        }
        if parts.is_empty() {
            return self.context_key.clone();
        }
        parts.join(", ")
    }
}

/// Content hash over the properties that decide how an element looks.
/// Position is deliberately not part of it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StyleSignature(pub String);

impl StyleSignature {
    pub fn compute(props: &FormattingProperties, style_type: StyleType) -> Self {
        fn num(v: Option<f32>) -> String {
            v.map(|v| format!("{v:.2}")).unwrap_or_else(|| "-".into())
        }
        fn flag(v: Option<bool>) -> &'static str {
            match v {
                Some(true) => "1",
                Some(false) => "0",
                None => "-",
            }
        }
        fn text(v: Option<&str>) -> String {
            v.map(str::to_string).unwrap_or_else(|| "-".into())
        }

        let canonical = [
            ("FontFamily", text(props.font_family.as_deref().map(str::to_lowercase).as_deref())),
            ("FontSize", num(props.font_size)),
            ("IsBold", flag(props.bold).to_string()),
            ("IsItalic", flag(props.italic).to_string()),
            ("Underline", text(props.underline.as_deref())),
            ("Color", text(props.color.as_deref().map(str::to_uppercase).as_deref())),
            ("Alignment", text(props.alignment.as_deref().map(str::to_lowercase).as_deref())),
            ("SpacingBefore", num(props.space_before)),
            ("SpacingAfter", num(props.space_after)),
            ("LineSpacing", num(props.line_spacing)),
            ("IndentLeft", num(props.indent_left)),
            ("IndentRight", num(props.indent_right)),
            ("IndentFirstLine", num(props.indent_first_line)),
            ("StyleType", style_type.as_str().to_string()),
        ];

        let mut hasher = Sha256::new();
        for (key, value) in &canonical {
            hasher.update(key.as_bytes());
            hasher.update(b"=");
            hasher.update(value.as_bytes());
            hasher.update(b"|");
        }
        let digest = hasher.finalize();
        let hex: String = digest[..16].iter().map(|b| format!("{b:02x}")).collect();
        StyleSignature(hex)
    }
}

impl fmt::Display for StyleSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StyleRecord {
    /// Index of this record inside its `StyleSet`.
    pub id: usize,
    pub owning_document_id: String,
    pub style_type: StyleType,
    pub name: String,
    pub based_on_style_id: Option<String>,
    pub resolved_properties: FormattingProperties,
    pub signature: StyleSignature,
    pub context: FormattingContext,
    /// Indices into the owning set's `patterns`.
    pub direct_format_patterns: Vec<usize>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DirectFormatPattern {
    pub pattern_name: String,
    /// Owning element's context key plus `:Run:N` for run-level patterns.
    pub pattern_context: String,
    pub context: FormattingContext,
    pub overrides: PartialFormattingProperties,
    pub sample_text: String,
    pub occurrence_count: u32,
    /// Index of the owning record, set by association.
    pub owner: Option<usize>,
}

/// Everything extracted from one document. Records and patterns refer to
/// each other by index, so the set is self-contained and never shared.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StyleSet {
    pub document_id: String,
    pub records: Vec<StyleRecord>,
    pub patterns: Vec<DirectFormatPattern>,
}

impl StyleSet {
    pub fn patterns_of<'a>(
        &'a self,
        record: &'a StyleRecord,
    ) -> impl Iterator<Item = &'a DirectFormatPattern> + 'a {
        record
            .direct_format_patterns
            .iter()
            .filter_map(|&i| self.patterns.get(i))
    }

    /// Resolved properties with every attached pattern's overrides on top,
    /// in pattern order.
    pub fn effective_properties(&self, record: &StyleRecord) -> FormattingProperties {
        let mut props = record.resolved_properties.clone();
        for pattern in self.patterns_of(record) {
            props.apply_override(&pattern.overrides);
        }
        props
    }

    pub fn from_json(json: &str) -> Result<Self, crate::Error> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, crate::Error> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
