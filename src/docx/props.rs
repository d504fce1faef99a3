//! Readers turning `w:rPr`, `w:pPr`, `w:tblPr`, `w:trPr`, `w:tcPr` and
//! `w:sectPr` into partial property bags. Only what is written in the XML
//! is set; nothing here applies inheritance or defaults.

use crate::model::{Border, Borders, FormattingProperties, TabStop};

use super::theme::Theme;
use super::units::{eighths_to_pts, half_points_to_pts, line_spacing, table_width, twips_to_pts};
use super::{WML_NS, num_attr, parse_hex_color, twips_attr, wml, wml_attr, wml_bool, wml_val};

pub(crate) fn normalize_alignment(val: &str) -> String {
    match val {
        "both" => "justify",
        "start" | "left" => "left",
        "end" | "right" => "right",
        "center" => "center",
        "distribute" => "distribute",
        other => other,
    }
    .to_string()
}

fn parse_border(node: roxmltree::Node) -> Option<Border> {
    let style = wml_val(node).unwrap_or("none");
    if style == "none" || style == "nil" {
        return None;
    }
    let width = num_attr(node, "sz").map(eighths_to_pts).unwrap_or(0.5);
    let space = num_attr(node, "space").unwrap_or(0.0);
    let color = node
        .attribute((WML_NS, "color"))
        .and_then(parse_hex_color);
    Some(Border {
        style: style.to_string(),
        width,
        space,
        color,
    })
}

pub(crate) fn parse_borders(container: roxmltree::Node) -> Option<Borders> {
    let side = |names: &[&str]| names.iter().find_map(|n| wml(container, n).and_then(parse_border));
    let borders = Borders {
        top: side(&["top"]),
        bottom: side(&["bottom"]),
        left: side(&["left", "start"]),
        right: side(&["right", "end"]),
        between: side(&["between"]),
        inside_h: side(&["insideH"]),
        inside_v: side(&["insideV"]),
    };
    if borders.is_empty() { None } else { Some(borders) }
}

fn shading_fill(node: roxmltree::Node) -> Option<String> {
    wml(node, "shd")
        .and_then(|shd| shd.attribute((WML_NS, "fill")))
        .and_then(parse_hex_color)
}

pub(crate) fn run_properties(rpr: roxmltree::Node, theme: &Theme) -> FormattingProperties {
    let mut p = FormattingProperties {
        font_family: wml(rpr, "rFonts").and_then(|rf| theme.font_from_rfonts(rf)),
        font_size: wml_attr(rpr, "sz")
            .and_then(|v| v.parse::<f32>().ok())
            .map(half_points_to_pts),
        bold: wml_bool(rpr, "b"),
        italic: wml_bool(rpr, "i"),
        strikethrough: wml_bool(rpr, "strike"),
        double_strikethrough: wml_bool(rpr, "dstrike"),
        all_caps: wml_bool(rpr, "caps"),
        small_caps: wml_bool(rpr, "smallCaps"),
        shadow: wml_bool(rpr, "shadow"),
        outline: wml_bool(rpr, "outline"),
        hidden: wml_bool(rpr, "vanish"),
        highlight: wml_attr(rpr, "highlight")
            .filter(|v| *v != "none")
            .map(str::to_string),
        character_spacing: wml_attr(rpr, "spacing")
            .and_then(|v| v.parse::<f32>().ok())
            .map(twips_to_pts),
        character_scale: wml_attr(rpr, "w").and_then(|v| v.trim_end_matches('%').parse().ok()),
        vertical_text_alignment: wml_attr(rpr, "vertAlign").map(str::to_string),
        run_shading: shading_fill(rpr),
        language: wml_attr(rpr, "lang").map(str::to_string),
        ..Default::default()
    };

    if let Some(u) = wml(rpr, "u") {
        p.underline = Some(wml_val(u).unwrap_or("single").to_string());
    }

    if let Some(color) = wml(rpr, "color") {
        p.color = match color.attribute((WML_NS, "themeColor")) {
            Some(token) => theme.color(
                token,
                color.attribute((WML_NS, "themeTint")),
                color.attribute((WML_NS, "themeShade")),
            ),
            None => None,
        }
        .or_else(|| match wml_val(color) {
            Some("auto") => Some("000000".to_string()),
            Some(v) => parse_hex_color(v),
            None => None,
        });
    }

    p
}

fn parse_tab_stops(ppr: roxmltree::Node) -> Option<Vec<TabStop>> {
    let tabs = wml(ppr, "tabs")?;
    let mut stops: Vec<TabStop> = tabs
        .children()
        .filter(|n| n.tag_name().name() == "tab" && n.tag_name().namespace() == Some(WML_NS))
        .filter_map(|n| {
            let position = twips_attr(n, "pos")?;
            let val = wml_val(n).unwrap_or("left");
            if val == "clear" {
                return None;
            }
            Some(TabStop {
                position,
                alignment: normalize_alignment(val),
                leader: n
                    .attribute((WML_NS, "leader"))
                    .filter(|l| *l != "none")
                    .map(str::to_string),
            })
        })
        .collect();
    stops.sort_by(|a, b| a.position.total_cmp(&b.position));
    Some(stops)
}

pub(crate) fn paragraph_properties(ppr: roxmltree::Node) -> FormattingProperties {
    let mut p = FormattingProperties {
        alignment: wml_attr(ppr, "jc").map(normalize_alignment),
        tab_stops: parse_tab_stops(ppr),
        paragraph_borders: wml(ppr, "pBdr").and_then(parse_borders),
        paragraph_shading: shading_fill(ppr),
        keep_with_next: wml_bool(ppr, "keepNext"),
        keep_together: wml_bool(ppr, "keepLines"),
        widow_control: wml_bool(ppr, "widowControl"),
        page_break_before: wml_bool(ppr, "pageBreakBefore"),
        contextual_spacing: wml_bool(ppr, "contextualSpacing"),
        outline_level: wml_attr(ppr, "outlineLvl").and_then(|v| v.parse().ok()),
        ..Default::default()
    };

    if let Some(spacing) = wml(ppr, "spacing") {
        p.space_before = twips_attr(spacing, "before");
        p.space_after = twips_attr(spacing, "after");
        if let Some(line) = num_attr(spacing, "line") {
            let (value, rule) = line_spacing(line, spacing.attribute((WML_NS, "lineRule")));
            p.line_spacing = Some(value);
            p.line_spacing_rule = Some(rule.to_string());
        }
    }

    if let Some(ind) = wml(ppr, "ind") {
        p.indent_left = twips_attr(ind, "left").or_else(|| twips_attr(ind, "start"));
        p.indent_right = twips_attr(ind, "right").or_else(|| twips_attr(ind, "end"));
        p.indent_first_line = match twips_attr(ind, "hanging") {
            Some(h) => Some(-h),
            None => twips_attr(ind, "firstLine"),
        };
    }

    p
}

pub(crate) fn table_properties(tbl_pr: roxmltree::Node) -> FormattingProperties {
    let mut p = FormattingProperties {
        table_alignment: wml_attr(tbl_pr, "jc").map(normalize_alignment),
        table_indent: wml(tbl_pr, "tblInd").and_then(|n| twips_attr(n, "w")),
        table_layout: wml(tbl_pr, "tblLayout")
            .and_then(|n| n.attribute((WML_NS, "type")))
            .map(str::to_string),
        table_borders: wml(tbl_pr, "tblBorders").and_then(parse_borders),
        table_shading: shading_fill(tbl_pr),
        ..Default::default()
    };

    if let Some(w) = wml(tbl_pr, "tblW")
        && let Some(raw) = num_attr(w, "w")
    {
        let (value, kind) = table_width(raw, w.attribute((WML_NS, "type")));
        p.table_width = Some(value);
        p.table_width_type = Some(kind.to_string());
    }

    if let Some(mar) = wml(tbl_pr, "tblCellMar") {
        apply_cell_margins(&mut p, mar);
    }

    p
}

fn apply_cell_margins(p: &mut FormattingProperties, mar: roxmltree::Node) {
    let side = |names: &[&str]| {
        names
            .iter()
            .find_map(|n| wml(mar, n).and_then(|m| twips_attr(m, "w")))
    };
    p.cell_margin_top = side(&["top"]);
    p.cell_margin_bottom = side(&["bottom"]);
    p.cell_margin_left = side(&["left", "start"]);
    p.cell_margin_right = side(&["right", "end"]);
}

pub(crate) fn row_properties(tr_pr: roxmltree::Node) -> FormattingProperties {
    let mut p = FormattingProperties {
        is_header_row: wml_bool(tr_pr, "tblHeader"),
        cant_split: wml_bool(tr_pr, "cantSplit"),
        ..Default::default()
    };
    if let Some(h) = wml(tr_pr, "trHeight") {
        p.row_height = twips_attr(h, "val");
        p.row_height_rule = Some(
            h.attribute((WML_NS, "hRule"))
                .unwrap_or("atLeast")
                .to_string(),
        );
    }
    p
}

pub(crate) fn cell_properties(tc_pr: roxmltree::Node) -> FormattingProperties {
    let mut p = FormattingProperties {
        cell_borders: wml(tc_pr, "tcBorders").and_then(parse_borders),
        cell_shading: shading_fill(tc_pr),
        grid_span: wml_attr(tc_pr, "gridSpan").and_then(|v| v.parse().ok()),
        vertical_merge: wml(tc_pr, "vMerge")
            .map(|n| wml_val(n).unwrap_or("continue").to_string()),
        cell_vertical_alignment: wml_attr(tc_pr, "vAlign").map(str::to_string),
        text_direction: wml_attr(tc_pr, "textDirection").map(str::to_string),
        no_wrap: wml_bool(tc_pr, "noWrap"),
        ..Default::default()
    };
    if let Some(w) = wml(tc_pr, "tcW")
        && let Some(raw) = num_attr(w, "w")
    {
        p.cell_width = Some(table_width(raw, w.attribute((WML_NS, "type"))).0);
    }
    if let Some(mar) = wml(tc_pr, "tcMar") {
        apply_cell_margins(&mut p, mar);
    }
    p
}

pub(crate) fn section_properties(sect_pr: roxmltree::Node) -> FormattingProperties {
    let mut p = FormattingProperties {
        section_break_type: wml_attr(sect_pr, "type").map(str::to_string),
        title_page: wml_bool(sect_pr, "titlePg"),
        ..Default::default()
    };

    if let Some(pg_sz) = wml(sect_pr, "pgSz") {
        p.page_width = twips_attr(pg_sz, "w");
        p.page_height = twips_attr(pg_sz, "h");
        p.orientation = Some(
            pg_sz
                .attribute((WML_NS, "orient"))
                .map(str::to_string)
                .unwrap_or_else(|| match (p.page_width, p.page_height) {
                    (Some(w), Some(h)) if w > h => "landscape".to_string(),
                    _ => "portrait".to_string(),
                }),
        );
    }

    if let Some(pg_mar) = wml(sect_pr, "pgMar") {
        p.page_margin_top = twips_attr(pg_mar, "top");
        p.page_margin_bottom = twips_attr(pg_mar, "bottom");
        p.page_margin_left = twips_attr(pg_mar, "left");
        p.page_margin_right = twips_attr(pg_mar, "right");
        p.gutter = twips_attr(pg_mar, "gutter");
        p.header_distance = twips_attr(pg_mar, "header");
        p.footer_distance = twips_attr(pg_mar, "footer");
    }

    if let Some(cols) = wml(sect_pr, "cols") {
        let explicit = cols
            .children()
            .filter(|c| c.tag_name().name() == "col" && c.tag_name().namespace() == Some(WML_NS))
            .count() as u32;
        p.column_count = cols
            .attribute((WML_NS, "num"))
            .and_then(|v| v.parse().ok())
            .or(if explicit > 0 { Some(explicit) } else { Some(1) });
        p.column_spacing = twips_attr(cols, "space");
    }

    if let Some(pg_num) = wml(sect_pr, "pgNumType") {
        p.page_number_format = pg_num
            .attribute((WML_NS, "fmt"))
            .map(str::to_string);
        p.page_number_start = pg_num
            .attribute((WML_NS, "start"))
            .and_then(|v| v.parse().ok());
    }

    p
}
