use std::collections::HashMap;

use super::{DML_NS, WML_NS, parse_hex_color};

pub const DEFAULT_MAJOR_FONT: &str = "Calibri Light";
pub const DEFAULT_MINOR_FONT: &str = "Calibri";

/// Office default color scheme, used for any slot the theme part omits.
const FALLBACK_COLORS: &[(&str, &str)] = &[
    ("dk1", "000000"),
    ("lt1", "FFFFFF"),
    ("dk2", "44546A"),
    ("lt2", "E7E6E6"),
    ("accent1", "4472C4"),
    ("accent2", "ED7D31"),
    ("accent3", "A5A5A5"),
    ("accent4", "FFC000"),
    ("accent5", "5B9BD5"),
    ("accent6", "70AD47"),
    ("hlink", "0563C1"),
    ("folHlink", "954F72"),
];

fn dml<'a>(node: roxmltree::Node<'a, 'a>, name: &str) -> Option<roxmltree::Node<'a, 'a>> {
    node.children()
        .find(|n| n.tag_name().name() == name && n.tag_name().namespace() == Some(DML_NS))
}

fn latin_typeface<'a>(node: roxmltree::Node<'a, 'a>) -> Option<&'a str> {
    dml(node, "latin")
        .and_then(|n| n.attribute("typeface"))
        .filter(|tf| !tf.is_empty())
}

/// Theme fonts and colors that `w:asciiTheme` / `w:themeColor` tokens point at.
#[derive(Clone, Debug)]
pub struct Theme {
    pub major_font: String,
    pub minor_font: String,
    colors: HashMap<String, String>,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            major_font: DEFAULT_MAJOR_FONT.to_string(),
            minor_font: DEFAULT_MINOR_FONT.to_string(),
            colors: FALLBACK_COLORS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

impl Theme {
    /// Parses a theme part. Anything missing or malformed keeps the
    /// fallback value.
    pub fn parse(xml_content: Option<&str>) -> Theme {
        let mut theme = Theme::default();
        let Some(xml_content) = xml_content else {
            return theme;
        };
        let xml = match roxmltree::Document::parse(xml_content) {
            Ok(xml) => xml,
            Err(e) => {
                log::warn!("Theme part is malformed ({e}), using default theme");
                return theme;
            }
        };

        for node in xml.descendants() {
            if node.tag_name().namespace() != Some(DML_NS) {
                continue;
            }
            match node.tag_name().name() {
                "majorFont" => {
                    if let Some(tf) = latin_typeface(node) {
                        theme.major_font = tf.to_string();
                    }
                }
                "minorFont" => {
                    if let Some(tf) = latin_typeface(node) {
                        theme.minor_font = tf.to_string();
                    }
                }
                "clrScheme" => {
                    for slot in node.children().filter(|n| n.is_element()) {
                        let value = slot.children().filter(|n| n.is_element()).find_map(|c| {
                            match c.tag_name().name() {
                                "srgbClr" => c.attribute("val").and_then(parse_hex_color),
                                "sysClr" => c.attribute("lastClr").and_then(parse_hex_color),
                                _ => None,
                            }
                        });
                        if let Some(value) = value {
                            theme
                                .colors
                                .insert(slot.tag_name().name().to_string(), value);
                        }
                    }
                }
                _ => {}
            }
        }

        theme
    }

    /// Resolves a theme font token (`majorHAnsi`, `minorAscii`, ...).
    pub fn font(&self, token: &str) -> Option<&str> {
        if token.starts_with("major") {
            Some(&self.major_font)
        } else if token.starts_with("minor") {
            Some(&self.minor_font)
        } else {
            None
        }
    }

    /// Resolves a `w:themeColor` token, applying `w:themeTint` /
    /// `w:themeShade` (hex bytes) when present.
    pub fn color(&self, token: &str, tint: Option<&str>, shade: Option<&str>) -> Option<String> {
        let slot = match token {
            "text1" | "dark1" => "dk1",
            "background1" | "light1" => "lt1",
            "text2" | "dark2" => "dk2",
            "background2" | "light2" => "lt2",
            "hyperlink" => "hlink",
            "followedHyperlink" => "folHlink",
            other => other,
        };
        let base = self.colors.get(slot)?;
        let mut rgb = [0u8; 3];
        for (i, c) in rgb.iter_mut().enumerate() {
            *c = u8::from_str_radix(&base[i * 2..i * 2 + 2], 16).ok()?;
        }
        if let Some(t) = tint.and_then(|t| u8::from_str_radix(t, 16).ok()) {
            let f = t as f32 / 255.0;
            for c in rgb.iter_mut() {
                *c = (*c as f32 * f + 255.0 * (1.0 - f)).round() as u8;
            }
        }
        if let Some(s) = shade.and_then(|s| u8::from_str_radix(s, 16).ok()) {
            let f = s as f32 / 255.0;
            for c in rgb.iter_mut() {
                *c = (*c as f32 * f).round() as u8;
            }
        }
        Some(format!("{:02X}{:02X}{:02X}", rgb[0], rgb[1], rgb[2]))
    }

    /// Font family named by a `w:rFonts` element: explicit `w:ascii` first,
    /// then `w:hAnsi`, then the theme token.
    pub(crate) fn font_from_rfonts(&self, rfonts: roxmltree::Node) -> Option<String> {
        if let Some(f) = rfonts
            .attribute((WML_NS, "ascii"))
            .or_else(|| rfonts.attribute((WML_NS, "hAnsi")))
        {
            return Some(f.to_string());
        }
        rfonts
            .attribute((WML_NS, "asciiTheme"))
            .or_else(|| rfonts.attribute((WML_NS, "hAnsiTheme")))
            .and_then(|token| self.font(token))
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THEME: &str = r#"<a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main">
      <a:themeElements>
        <a:clrScheme name="Custom">
          <a:dk1><a:sysClr val="windowText" lastClr="111111"/></a:dk1>
          <a:accent1><a:srgbClr val="336699"/></a:accent1>
        </a:clrScheme>
        <a:fontScheme name="Custom">
          <a:majorFont><a:latin typeface="Georgia"/></a:majorFont>
          <a:minorFont><a:latin typeface="Verdana"/></a:minorFont>
        </a:fontScheme>
      </a:themeElements>
    </a:theme>"#;

    #[test]
    fn theme_overrides_fallbacks() {
        let theme = Theme::parse(Some(THEME));
        assert_eq!(theme.font("majorHAnsi"), Some("Georgia"));
        assert_eq!(theme.font("minorAscii"), Some("Verdana"));
        assert_eq!(theme.color("text1", None, None).as_deref(), Some("111111"));
        assert_eq!(theme.color("accent1", None, None).as_deref(), Some("336699"));
        // untouched slot falls back
        assert_eq!(theme.color("accent2", None, None).as_deref(), Some("ED7D31"));
    }

    #[test]
    fn missing_or_broken_theme_uses_defaults() {
        for theme in [Theme::parse(None), Theme::parse(Some("<not-xml"))] {
            assert_eq!(theme.minor_font, DEFAULT_MINOR_FONT);
            assert_eq!(theme.color("background1", None, None).as_deref(), Some("FFFFFF"));
        }
    }

    #[test]
    fn shade_darkens() {
        let theme = Theme::default();
        assert_eq!(theme.color("background1", None, Some("80")).as_deref(), Some("808080"));
    }
}
