use std::collections::HashMap;

use crate::model::FormattingProperties;

use super::{WML_NS, is_wml, twips_attr, wml, wml_attr};

#[derive(Clone, Debug)]
struct LevelDef {
    num_fmt: String,
    lvl_text: String,
    start: u32,
    indent_left: Option<f32>,
    indent_hanging: Option<f32>,
}

struct NumDef {
    abstract_id: String,
    start_overrides: HashMap<u8, u32>,
}

/// Numbering definitions part. An absent or broken part simply yields no
/// list properties.
#[derive(Default)]
pub(crate) struct Numbering {
    abstract_nums: HashMap<String, HashMap<u8, LevelDef>>,
    nums: HashMap<String, NumDef>,
}

impl Numbering {
    pub(crate) fn parse(xml_content: Option<&str>) -> Numbering {
        let mut numbering = Numbering::default();
        let Some(xml_content) = xml_content else {
            return numbering;
        };
        let xml = match roxmltree::Document::parse(xml_content) {
            Ok(xml) => xml,
            Err(e) => {
                log::warn!("Numbering part is malformed ({e}), list properties unavailable");
                return numbering;
            }
        };

        for node in xml.root_element().children() {
            if node.tag_name().namespace() != Some(WML_NS) {
                continue;
            }
            match node.tag_name().name() {
                "abstractNum" => {
                    let Some(abs_id) = node.attribute((WML_NS, "abstractNumId")) else {
                        continue;
                    };
                    let mut levels = HashMap::new();
                    for lvl in node.children().filter(|n| is_wml(*n, "lvl")) {
                        let Some(ilvl) = lvl
                            .attribute((WML_NS, "ilvl"))
                            .and_then(|v| v.parse::<u8>().ok())
                        else {
                            continue;
                        };
                        let ind = wml(lvl, "pPr").and_then(|ppr| wml(ppr, "ind"));
                        levels.insert(
                            ilvl,
                            LevelDef {
                                num_fmt: wml_attr(lvl, "numFmt").unwrap_or("decimal").to_string(),
                                lvl_text: wml_attr(lvl, "lvlText").unwrap_or("").to_string(),
                                start: wml_attr(lvl, "start")
                                    .and_then(|v| v.parse().ok())
                                    .unwrap_or(1),
                                indent_left: ind.and_then(|n| {
                                    twips_attr(n, "left").or_else(|| twips_attr(n, "start"))
                                }),
                                indent_hanging: ind.and_then(|n| twips_attr(n, "hanging")),
                            },
                        );
                    }
                    numbering.abstract_nums.insert(abs_id.to_string(), levels);
                }
                "num" => {
                    let Some(num_id) = node.attribute((WML_NS, "numId")) else {
                        continue;
                    };
                    let Some(abs_id) = wml_attr(node, "abstractNumId") else {
                        continue;
                    };
                    let mut start_overrides = HashMap::new();
                    for ovr in node.children().filter(|n| is_wml(*n, "lvlOverride")) {
                        let level = ovr
                            .attribute((WML_NS, "ilvl"))
                            .and_then(|v| v.parse::<u8>().ok());
                        let start = wml_attr(ovr, "startOverride").and_then(|v| v.parse().ok());
                        if let (Some(level), Some(start)) = (level, start) {
                            start_overrides.insert(level, start);
                        }
                    }
                    numbering.nums.insert(
                        num_id.to_string(),
                        NumDef {
                            abstract_id: abs_id.to_string(),
                            start_overrides,
                        },
                    );
                }
                _ => {}
            }
        }

        numbering
    }

    /// List properties for `numId` / `ilvl`. `numId` 0 removes numbering.
    pub(crate) fn list_properties(&self, num_id: &str, level: u8) -> Option<FormattingProperties> {
        if num_id == "0" {
            return None;
        }
        let mut props = FormattingProperties {
            list_numbering_id: Some(num_id.to_string()),
            list_level: Some(level as u32),
            ..Default::default()
        };
        let Some(num) = self.nums.get(num_id) else {
            log::warn!("Paragraph references unknown numbering id {num_id}");
            return Some(props);
        };
        let Some(def) = self
            .abstract_nums
            .get(&num.abstract_id)
            .and_then(|levels| levels.get(&level))
        else {
            return Some(props);
        };
        props.list_format = Some(def.num_fmt.clone());
        props.list_level_text = Some(def.lvl_text.clone());
        props.list_start = Some(num.start_overrides.get(&level).copied().unwrap_or(def.start));
        props.list_indent_left = def.indent_left;
        props.list_indent_hanging = def.indent_hanging;
        Some(props)
    }
}
