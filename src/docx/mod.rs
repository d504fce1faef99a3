mod direct;
mod extract;
mod numbering;
mod props;
mod styles;
mod theme;
pub mod units;

use std::collections::HashMap;
use std::io::{Read, Seek};
use std::path::Path;

use crate::error::Error;
use crate::model::StyleSet;

pub use direct::{associate, has_direct_formatting, has_direct_paragraph_formatting};
pub use extract::{ExtractOptions, extract};
pub use styles::{NamedStyleDefinition, StyleCatalog};
pub use theme::Theme;

pub(crate) const WML_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
pub(crate) const DML_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
pub(crate) const WPD_NS: &str =
    "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
pub(crate) const REL_NS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

pub(crate) fn wml<'a>(
    node: roxmltree::Node<'a, 'a>,
    name: &str,
) -> Option<roxmltree::Node<'a, 'a>> {
    node.children()
        .find(|n| n.tag_name().name() == name && n.tag_name().namespace() == Some(WML_NS))
}

pub(crate) fn is_wml(node: roxmltree::Node, name: &str) -> bool {
    node.tag_name().name() == name && node.tag_name().namespace() == Some(WML_NS)
}

pub(crate) fn wml_val<'a>(node: roxmltree::Node<'a, 'a>) -> Option<&'a str> {
    node.attribute((WML_NS, "val"))
}

pub(crate) fn wml_attr<'a>(node: roxmltree::Node<'a, 'a>, child: &str) -> Option<&'a str> {
    wml(node, child).and_then(wml_val)
}

/// Parse a WML boolean toggle element (e.g., w:b, w:i, w:strike).
/// Present with no val or val != "0"/"false"/"off" means true.
pub(crate) fn wml_bool(parent: roxmltree::Node, name: &str) -> Option<bool> {
    wml(parent, name).map(|n| wml_val(n).is_none_or(|v| v != "0" && v != "false" && v != "off"))
}

pub(crate) fn num_attr(node: roxmltree::Node, attr: &str) -> Option<f32> {
    node.attribute((WML_NS, attr))
        .and_then(|v| v.parse::<f32>().ok())
}

pub(crate) fn twips_attr(node: roxmltree::Node, attr: &str) -> Option<f32> {
    num_attr(node, attr).map(units::twips_to_pts)
}

/// Normalizes a 6-digit hex color to upper case. `auto` and malformed
/// values yield `None`.
pub(crate) fn parse_hex_color(val: &str) -> Option<String> {
    if val.len() != 6 || !val.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(val.to_ascii_uppercase())
}

#[derive(Clone, Debug)]
pub(crate) struct Relationship {
    pub(crate) target: String,
    pub(crate) external: bool,
}

/// One XML part together with its own relationships.
pub(crate) struct Part {
    pub(crate) xml: String,
    pub(crate) rels: HashMap<String, Relationship>,
}

/// The parts of a DOCX package the extractor reads. Only the main document
/// part is mandatory; everything else degrades to defaults when absent.
pub struct Package {
    pub(crate) main: Part,
    pub(crate) styles: Option<String>,
    pub(crate) numbering: Option<String>,
    pub(crate) theme: Option<String>,
    /// Header and footer parts keyed by the main part's relationship id.
    pub(crate) header_footer_parts: HashMap<String, Part>,
}

impl Package {
    pub fn open(path: &Path) -> Result<Package, Error> {
        let file = std::fs::File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => Error::Io(
                std::io::Error::new(e.kind(), format!("{}: {}", e, path.display())),
            ),
            _ => Error::Io(e),
        })?;
        let zip = zip::ZipArchive::new(file)
            .map_err(|_| Error::InvalidDocx("file is not a ZIP archive".into()))?;
        Self::from_archive(zip)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Package, Error> {
        let zip = zip::ZipArchive::new(std::io::Cursor::new(bytes))
            .map_err(|_| Error::InvalidDocx("data is not a ZIP archive".into()))?;
        Self::from_archive(zip)
    }

    fn from_archive<R: Read + Seek>(mut zip: zip::ZipArchive<R>) -> Result<Package, Error> {
        let document_xml = read_zip_text(&mut zip, "word/document.xml").ok_or_else(|| {
            Error::InvalidDocx("missing word/document.xml (is this a DOCX file?)".into())
        })?;
        let main_rels = parse_part_relationships(&mut zip, "word/document.xml");

        let styles = read_optional_part(&mut zip, "word/styles.xml");
        let numbering = read_optional_part(&mut zip, "word/numbering.xml");

        let names: Vec<String> = zip.file_names().map(|s| s.to_string()).collect();
        let theme = names
            .iter()
            .filter(|n| n.starts_with("word/theme/") && n.ends_with(".xml"))
            .min()
            .and_then(|name| read_zip_text(&mut zip, name));

        let mut header_footer_parts = HashMap::new();
        for (id, rel) in &main_rels {
            if rel.external {
                continue;
            }
            let zip_path = resolve_target(&rel.target);
            let file_name = zip_path.rsplit('/').next().unwrap_or("");
            if !(file_name.starts_with("header") || file_name.starts_with("footer")) {
                continue;
            }
            let Some(xml) = read_zip_text(&mut zip, &zip_path) else {
                log::warn!("Relationship {id} points at missing part {zip_path}");
                continue;
            };
            let rels = parse_part_relationships(&mut zip, &zip_path);
            header_footer_parts.insert(id.clone(), Part { xml, rels });
        }

        Ok(Package {
            main: Part {
                xml: document_xml,
                rels: main_rels,
            },
            styles,
            numbering,
            theme,
            header_footer_parts,
        })
    }
}

fn read_optional_part<R: Read + Seek>(zip: &mut zip::ZipArchive<R>, name: &str) -> Option<String> {
    let text = read_zip_text(zip, name);
    if text.is_none() {
        log::debug!("Optional part {name} not present, using defaults");
    }
    text
}

pub(crate) fn read_zip_text<R: Read + Seek>(
    zip: &mut zip::ZipArchive<R>,
    name: &str,
) -> Option<String> {
    let mut content = String::new();
    zip.by_name(name).ok()?.read_to_string(&mut content).ok()?;
    Some(content)
}

fn resolve_target(target: &str) -> String {
    target
        .strip_prefix('/')
        .map(String::from)
        .unwrap_or_else(|| format!("word/{}", target))
}

fn parse_rels_xml(xml_content: &str) -> HashMap<String, Relationship> {
    let mut rels = HashMap::new();
    let Ok(xml) = roxmltree::Document::parse(xml_content) else {
        log::warn!("Unparseable relationships part, ignoring it");
        return rels;
    };
    for node in xml.root_element().children() {
        if node.tag_name().name() == "Relationship"
            && let (Some(id), Some(target)) = (node.attribute("Id"), node.attribute("Target"))
        {
            rels.insert(
                id.to_string(),
                Relationship {
                    target: target.to_string(),
                    external: node.attribute("TargetMode") == Some("External"),
                },
            );
        }
    }
    rels
}

/// Load relationships for a part like "word/header1.xml" → "word/_rels/header1.xml.rels"
fn parse_part_relationships<R: Read + Seek>(
    zip: &mut zip::ZipArchive<R>,
    part_path: &str,
) -> HashMap<String, Relationship> {
    let (dir, file) = match part_path.rsplit_once('/') {
        Some((d, f)) => (d, f),
        None => ("", part_path),
    };
    let rels_path = if dir.is_empty() {
        format!("_rels/{}.rels", file)
    } else {
        format!("{}/_rels/{}.rels", dir, file)
    };
    let Some(xml_content) = read_zip_text(zip, &rels_path) else {
        return HashMap::new();
    };
    parse_rels_xml(&xml_content)
}

pub fn extract_file(path: &Path, options: &ExtractOptions) -> Result<StyleSet, Error> {
    let package = Package::open(path)?;
    extract(&package, options)
}

pub fn extract_bytes(bytes: &[u8], options: &ExtractOptions) -> Result<StyleSet, Error> {
    let package = Package::from_bytes(bytes)?;
    extract(&package, options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_colors_are_normalized() {
        assert_eq!(parse_hex_color("ff00aa").as_deref(), Some("FF00AA"));
        assert_eq!(parse_hex_color("auto"), None);
        assert_eq!(parse_hex_color("12345"), None);
    }

    #[test]
    fn relative_targets_live_under_word() {
        assert_eq!(resolve_target("header1.xml"), "word/header1.xml");
        assert_eq!(resolve_target("/word/footer2.xml"), "word/footer2.xml");
    }
}
