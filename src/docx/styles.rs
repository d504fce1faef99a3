use std::collections::{HashMap, HashSet};

use crate::model::FormattingProperties;

use super::props::{
    cell_properties, paragraph_properties, row_properties, run_properties, table_properties,
};
use super::theme::Theme;
use super::{WML_NS, wml, wml_attr, wml_bool};

pub const DEFAULT_FONT_FAMILY: &str = "Calibri";
pub const DEFAULT_FONT_SIZE: f32 = 11.0;
pub const DEFAULT_COLOR: &str = "000000";
pub const DEFAULT_LINE_SPACING: f32 = 1.0;
pub const DEFAULT_PARAGRAPH_STYLE: &str = "Normal";

/// One `w:style` entry of the styles part.
#[derive(Clone, Debug, Default)]
pub struct NamedStyleDefinition {
    pub style_id: String,
    pub name: String,
    /// `paragraph`, `character`, `table` or `numbering`.
    pub kind: String,
    pub based_on_id: Option<String>,
    pub next_style_id: Option<String>,
    pub linked_style_id: Option<String>,
    pub priority: Option<u32>,
    pub hidden: bool,
    pub is_custom: bool,
    pub is_default: bool,
    /// Only what this definition itself sets.
    pub properties: FormattingProperties,
    /// `numPr` carried by a paragraph style: (numId, ilvl).
    pub numbering: Option<(String, u8)>,
}

/// Named styles of one document plus its `w:docDefaults`.
///
/// Resolution never caches and never mutates the catalog, so one catalog can
/// serve any number of concurrent extraction passes.
#[derive(Clone, Debug, Default)]
pub struct StyleCatalog {
    definitions: HashMap<String, NamedStyleDefinition>,
    order: Vec<String>,
    doc_defaults: FormattingProperties,
    default_paragraph_style: Option<String>,
}

impl StyleCatalog {
    pub fn parse(xml_content: Option<&str>, theme: &Theme) -> StyleCatalog {
        let mut catalog = StyleCatalog::default();
        let Some(xml_content) = xml_content else {
            log::warn!("Document has no styles part, resolving against defaults only");
            return catalog;
        };
        let xml = match roxmltree::Document::parse(xml_content) {
            Ok(xml) => xml,
            Err(e) => {
                log::warn!("Styles part is malformed ({e}), resolving against defaults only");
                return catalog;
            }
        };
        let root = xml.root_element();

        if let Some(doc_defaults) = wml(root, "docDefaults") {
            if let Some(rpr) = wml(doc_defaults, "rPrDefault").and_then(|n| wml(n, "rPr")) {
                catalog
                    .doc_defaults
                    .apply_override(&run_properties(rpr, theme));
            }
            if let Some(ppr) = wml(doc_defaults, "pPrDefault").and_then(|n| wml(n, "pPr")) {
                catalog
                    .doc_defaults
                    .apply_override(&paragraph_properties(ppr));
            }
        }

        for style_node in root.children() {
            if style_node.tag_name().name() != "style"
                || style_node.tag_name().namespace() != Some(WML_NS)
            {
                continue;
            }
            let Some(style_id) = style_node.attribute((WML_NS, "styleId")) else {
                log::warn!("Skipping style definition without a styleId");
                continue;
            };

            let mut properties = FormattingProperties::default();
            if let Some(rpr) = wml(style_node, "rPr") {
                properties.apply_override(&run_properties(rpr, theme));
            }
            let ppr = wml(style_node, "pPr");
            if let Some(ppr) = ppr {
                properties.apply_override(&paragraph_properties(ppr));
            }
            if let Some(tbl_pr) = wml(style_node, "tblPr") {
                properties.apply_override(&table_properties(tbl_pr));
            }
            if let Some(tr_pr) = wml(style_node, "trPr") {
                properties.apply_override(&row_properties(tr_pr));
            }
            if let Some(tc_pr) = wml(style_node, "tcPr") {
                properties.apply_override(&cell_properties(tc_pr));
            }

            let numbering = ppr.and_then(|ppr| wml(ppr, "numPr")).and_then(|num_pr| {
                let num_id = wml_attr(num_pr, "numId")?;
                let level = wml_attr(num_pr, "ilvl")
                    .and_then(|v| v.parse::<u8>().ok())
                    .unwrap_or(0);
                Some((num_id.to_string(), level))
            });

            let flag_attr = |name: &str| {
                style_node
                    .attribute((WML_NS, name))
                    .is_some_and(|v| v == "1" || v == "true")
            };

            let definition = NamedStyleDefinition {
                style_id: style_id.to_string(),
                name: wml_attr(style_node, "name").unwrap_or(style_id).to_string(),
                kind: style_node
                    .attribute((WML_NS, "type"))
                    .unwrap_or("paragraph")
                    .to_string(),
                based_on_id: wml_attr(style_node, "basedOn").map(str::to_string),
                next_style_id: wml_attr(style_node, "next").map(str::to_string),
                linked_style_id: wml_attr(style_node, "link").map(str::to_string),
                priority: wml_attr(style_node, "uiPriority").and_then(|v| v.parse().ok()),
                hidden: wml_bool(style_node, "hidden").unwrap_or(false)
                    || wml_bool(style_node, "semiHidden").unwrap_or(false),
                is_custom: flag_attr("customStyle"),
                is_default: flag_attr("default"),
                properties,
                numbering,
            };
            catalog.insert(definition);
        }

        catalog
    }

    pub fn insert(&mut self, definition: NamedStyleDefinition) {
        if definition.is_default && definition.kind == "paragraph" {
            self.default_paragraph_style = Some(definition.style_id.clone());
        }
        if !self.definitions.contains_key(&definition.style_id) {
            self.order.push(definition.style_id.clone());
        }
        self.definitions
            .insert(definition.style_id.clone(), definition);
    }

    pub fn set_doc_defaults(&mut self, defaults: FormattingProperties) {
        self.doc_defaults = defaults;
    }

    pub fn get(&self, style_id: &str) -> Option<&NamedStyleDefinition> {
        self.definitions.get(style_id)
    }

    /// Definitions in the order the styles part lists them.
    pub fn definitions(&self) -> impl Iterator<Item = &NamedStyleDefinition> {
        self.order.iter().filter_map(|id| self.definitions.get(id))
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn default_paragraph_style(&self) -> &str {
        self.default_paragraph_style
            .as_deref()
            .unwrap_or(DEFAULT_PARAGRAPH_STYLE)
    }

    pub fn name_of<'a>(&'a self, style_id: &'a str) -> &'a str {
        self.definitions
            .get(style_id)
            .map(|d| d.name.as_str())
            .unwrap_or(style_id)
    }

    /// `style_id` followed by its `basedOn` ancestors, closest first. Stops at
    /// an absent or unknown parent, or at the first repeated id.
    pub fn chain(&self, style_id: &str) -> Vec<&NamedStyleDefinition> {
        let mut chain = Vec::new();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut current = Some(style_id);
        while let Some(id) = current {
            if !visited.insert(id) {
                log::debug!("Style inheritance cycle at '{id}' (from '{style_id}'), truncating");
                break;
            }
            let Some(def) = self.definitions.get(id) else {
                if !chain.is_empty() {
                    log::debug!("Style '{style_id}' is based on unknown style '{id}'");
                }
                break;
            };
            chain.push(def);
            current = def.based_on_id.as_deref();
        }
        chain
    }

    /// Properties contributed by the style and its ancestors only.
    pub fn resolve_chain(&self, style_id: &str) -> FormattingProperties {
        let mut props = FormattingProperties::default();
        for def in self.chain(style_id) {
            props.inherit_from(&def.properties);
        }
        props
    }

    /// Fully populated effective properties of a named style.
    pub fn resolve(&self, style_id: &str) -> FormattingProperties {
        let mut props = self.resolve_chain(style_id);
        self.apply_defaults(&mut props);
        props
    }

    /// Style chain, then `base` (e.g. a table style under a cell paragraph),
    /// then document defaults.
    pub fn resolve_over(
        &self,
        style_id: Option<&str>,
        base: &FormattingProperties,
    ) -> FormattingProperties {
        let mut props = style_id
            .map(|id| self.resolve_chain(id))
            .unwrap_or_default();
        props.inherit_from(base);
        self.apply_defaults(&mut props);
        props
    }

    /// `w:docDefaults`, then the fixed fallbacks for anything still unset.
    pub fn apply_defaults(&self, props: &mut FormattingProperties) {
        props.inherit_from(&self.doc_defaults);
        props
            .font_family
            .get_or_insert_with(|| DEFAULT_FONT_FAMILY.to_string());
        props.font_size.get_or_insert(DEFAULT_FONT_SIZE);
        props.color.get_or_insert_with(|| DEFAULT_COLOR.to_string());
        if props.line_spacing.is_none() {
            props.line_spacing = Some(DEFAULT_LINE_SPACING);
            props.line_spacing_rule = Some("auto".to_string());
        }
    }

    /// Numbering inherited through the style chain.
    pub fn list_reference(&self, style_id: &str) -> Option<(String, u8)> {
        self.chain(style_id)
            .into_iter()
            .find_map(|def| def.numbering.clone())
    }
}
