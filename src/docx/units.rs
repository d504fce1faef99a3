//! Raw WordprocessingML units to points.

pub const EMU_PER_POINT: f32 = 12_700.0;

/// Line-spacing `w:line` values are 240ths of a line for the `auto` rule.
const AUTO_LINE_UNITS: f32 = 240.0;

/// Height in points of one `auto` line, `AUTO_LINE_UNITS` in twips.
pub const AUTO_LINE_PTS: f32 = AUTO_LINE_UNITS / 20.0;

pub fn twips_to_pts(twips: f32) -> f32 {
    twips / 20.0
}

/// Border widths (`w:sz` on borders) are eighths of a point.
pub fn eighths_to_pts(eighths: f32) -> f32 {
    eighths / 8.0
}

/// Font sizes (`w:sz` on run properties) are half-points.
pub fn half_points_to_pts(half_points: f32) -> f32 {
    half_points / 2.0
}

pub fn emu_to_pts(emu: f32) -> f32 {
    emu / EMU_PER_POINT
}

/// `(value, rule)`: a multiplier for `auto`, points for `exact` / `atLeast`.
pub fn line_spacing(line: f32, rule: Option<&str>) -> (f32, &'static str) {
    match rule {
        Some("exact") => (twips_to_pts(line), "exact"),
        Some("atLeast") => (twips_to_pts(line), "atLeast"),
        _ => (line / AUTO_LINE_UNITS, "auto"),
    }
}

/// Table widths carry their own unit in `w:type`. Percentages are stored
/// in fiftieths of a percent.
pub fn table_width(w: f32, kind: Option<&str>) -> (f32, &'static str) {
    match kind {
        Some("pct") => (w / 50.0, "pct"),
        Some("auto") => (0.0, "auto"),
        Some("nil") => (0.0, "nil"),
        _ => (twips_to_pts(w), "dxa"),
    }
}
