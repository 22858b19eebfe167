//! Diffing terminal writer: converts a new grid into minimal ANSI output
//! relative to a previously emitted grid.
//!
//! The writer walks both grids in row-major order, tracking a running
//! cursor position and a running style so it only emits a cursor-position
//! sequence or SGR codes when either actually changes. Continuation cells
//! are skipped; their content is implied by the leader that preceded them.

use crate::{Attrs, Color, Grid, Style};

/// Produces ANSI byte sequences from grid diffs.
#[derive(Debug, Default)]
pub struct Writer;

impl Writer {
    pub fn new() -> Self {
        Self
    }

    /// Returns the ANSI byte sequence that, applied to a terminal currently
    /// displaying `prev`, yields `next`. `prev` and `next` must share
    /// dimensions.
    pub fn diff_and_emit(&self, prev: &Grid, next: &Grid) -> Vec<u8> {
        debug_assert_eq!(prev.width(), next.width());
        debug_assert_eq!(prev.height(), next.height());

        let mut out = Vec::new();
        let mut cursor: Option<(u16, u16)> = None;
        let mut style = Style::default();
        let mut style_initialized = false;

        for y in 0..next.height() {
            let mut x = 0u16;
            while x < next.width() {
                let ncell = next.get(x, y).expect("in-bounds cell");
                if !ncell.is_leader() {
                    x += 1;
                    continue;
                }
                let pcell = prev.get(x, y).expect("in-bounds cell");
                if ncell == pcell {
                    x += ncell.visual_width();
                    continue;
                }
                if cursor != Some((x, y)) {
                    emit_move(&mut out, x, y);
                    cursor = Some((x, y));
                }
                let target = ncell.style();
                if !style_initialized || target != style {
                    emit_style_diff(&mut out, &style, &target);
                    style = target;
                    style_initialized = true;
                }
                out.extend_from_slice(ncell.cluster.as_bytes());
                let advanced = ncell.visual_width();
                cursor = Some((x + advanced, y));
                x += advanced;
            }
        }
        out
    }
}

fn emit_move(out: &mut Vec<u8>, x: u16, y: u16) {
    out.extend_from_slice(format!("\x1b[{};{}H", y + 1, x + 1).as_bytes());
}

fn fg_code(color: Color) -> String {
    match color {
        Color::Default => "39".to_string(),
        Color::Rgb(r, g, b) => format!("38;2;{r};{g};{b}"),
    }
}

fn bg_code(color: Color) -> String {
    match color {
        Color::Default => "49".to_string(),
        Color::Rgb(r, g, b) => format!("48;2;{r};{g};{b}"),
    }
}

/// Emits the minimal SGR sequence transforming `old` into `new`. Never
/// encodes the default color as a concrete RGB triple; default colors
/// always use their own opcode (39/49).
fn emit_style_diff(out: &mut Vec<u8>, old: &Style, new: &Style) {
    let mut codes: Vec<String> = Vec::new();

    let old_intensity = old.attrs & (Attrs::BOLD | Attrs::DIM);
    let new_intensity = new.attrs & (Attrs::BOLD | Attrs::DIM);
    if old_intensity != new_intensity {
        if new_intensity.is_empty() {
            codes.push("22".to_string());
        } else {
            if !old_intensity.is_empty() {
                codes.push("22".to_string());
            }
            if new.attrs.contains(Attrs::BOLD) {
                codes.push("1".to_string());
            }
            if new.attrs.contains(Attrs::DIM) {
                codes.push("2".to_string());
            }
        }
    }

    for (flag, set, unset) in [
        (Attrs::ITALIC, "3", "23"),
        (Attrs::UNDERLINE, "4", "24"),
        (Attrs::BLINK, "5", "25"),
        (Attrs::REVERSE, "7", "27"),
        (Attrs::STRIKE, "9", "29"),
        (Attrs::OVERLINE, "53", "55"),
    ] {
        let was = old.attrs.contains(flag);
        let is = new.attrs.contains(flag);
        if was != is {
            codes.push(if is { set.to_string() } else { unset.to_string() });
        }
    }

    if old.fg != new.fg {
        codes.push(fg_code(new.fg));
    }
    if old.bg != new.bg {
        codes.push(bg_code(new.bg));
    }

    if !codes.is_empty() {
        out.extend_from_slice(format!("\x1b[{}m", codes.join(";")).as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Cell;
    use pretty_assertions::assert_eq;

    fn apply(prev: &Grid, bytes: &[u8]) -> Grid {
        // Minimal escape-sequence interpreter covering exactly the grammar
        // this writer emits: CUP moves, SGR, and plain text.
        let s = std::str::from_utf8(bytes).expect("writer output is UTF-8");
        let mut result = prev.clone();
        let mut x = 0u16;
        let mut y = 0u16;
        let mut fg = Color::Default;
        let mut bg = Color::Default;
        let mut attrs = Attrs::empty();
        let mut chars = s.chars().peekable();
        while let Some(c) = chars.next() {
            if c != '\x1b' {
                let grapheme = c.to_string();
                result.put(x, y, Cell::leader(&grapheme, 1, Style::new(fg, bg, attrs)));
                x += 1;
                continue;
            }
            assert_eq!(chars.next(), Some('['));
            let mut buf = String::new();
            loop {
                match chars.next() {
                    Some('H') => {
                        let mut parts = buf.split(';');
                        let row: u16 = parts.next().unwrap().parse().unwrap();
                        let col: u16 = parts.next().unwrap().parse().unwrap();
                        y = row - 1;
                        x = col - 1;
                        break;
                    }
                    Some('m') => {
                        for code in buf.split(';') {
                            match code {
                                "" => {}
                                "1" => attrs |= Attrs::BOLD,
                                "2" => attrs |= Attrs::DIM,
                                "22" => attrs &= !(Attrs::BOLD | Attrs::DIM),
                                "3" => attrs |= Attrs::ITALIC,
                                "23" => attrs &= !Attrs::ITALIC,
                                "4" => attrs |= Attrs::UNDERLINE,
                                "24" => attrs &= !Attrs::UNDERLINE,
                                "5" => attrs |= Attrs::BLINK,
                                "25" => attrs &= !Attrs::BLINK,
                                "7" => attrs |= Attrs::REVERSE,
                                "27" => attrs &= !Attrs::REVERSE,
                                "9" => attrs |= Attrs::STRIKE,
                                "29" => attrs &= !Attrs::STRIKE,
                                "53" => attrs |= Attrs::OVERLINE,
                                "55" => attrs &= !Attrs::OVERLINE,
                                "39" => fg = Color::Default,
                                "49" => bg = Color::Default,
                                // rgb triples ("38;2;r;g;b"/"48;2;r;g;b") are reconstructed
                                // below by re-scanning the raw buffer, since splitting on
                                // ';' loses the grouping.
                                _ => {}
                            }
                        }
                        // handle rgb color codes by re-scanning the raw buffer since the
                        // naive split above can't reconstruct "38;2;r;g;b" groupings.
                        apply_rgb_colors(&buf, &mut fg, &mut bg);
                        break;
                    }
                    Some(ch) => buf.push(ch),
                    None => break,
                }
            }
        }
        result
    }

    fn apply_rgb_colors(buf: &str, fg: &mut Color, bg: &mut Color) {
        let parts: Vec<&str> = buf.split(';').collect();
        let mut i = 0;
        while i < parts.len() {
            if parts[i] == "38" && parts.get(i + 1) == Some(&"2") {
                let r = parts[i + 2].parse().unwrap();
                let g = parts[i + 3].parse().unwrap();
                let b = parts[i + 4].parse().unwrap();
                *fg = Color::Rgb(r, g, b);
                i += 5;
            } else if parts[i] == "48" && parts.get(i + 1) == Some(&"2") {
                let r = parts[i + 2].parse().unwrap();
                let g = parts[i + 3].parse().unwrap();
                let b = parts[i + 4].parse().unwrap();
                *bg = Color::Rgb(r, g, b);
                i += 5;
            } else {
                i += 1;
            }
        }
    }

    #[test]
    fn no_op_diff_emits_nothing() {
        let mut g = Grid::new(5, 2);
        g.write_text(0, 0, "hi", Style::default());
        let w = Writer::new();
        let out = w.diff_and_emit(&g, &g);
        assert!(out.is_empty());
    }

    #[test]
    fn single_cell_change_round_trips() {
        let mut prev = Grid::new(5, 1);
        prev.write_text(0, 0, "hello", Style::default());
        let mut next = prev.clone();
        next.write_text(1, 0, "E", Style::default());

        let w = Writer::new();
        let out = w.diff_and_emit(&prev, &next);
        let result = apply(&prev, &out);
        assert_eq!(result.get(1, 0).unwrap().cluster, "E");
        assert_eq!(result.get(0, 0).unwrap().cluster, "h");
    }

    #[test]
    fn full_repaint_round_trips() {
        let prev = Grid::new(4, 2);
        let mut next = Grid::new(4, 2);
        next.write_text(0, 0, "abcd", Style::default());
        next.write_text(0, 1, "efgh", Style::default());

        let w = Writer::new();
        let out = w.diff_and_emit(&prev, &next);
        let result = apply(&prev, &out);
        assert_eq!(result.get(0, 0).unwrap().cluster, "a");
        assert_eq!(result.get(3, 1).unwrap().cluster, "h");
    }

    #[test]
    fn style_transition_round_trips_colors_and_attrs() {
        let prev = Grid::new(3, 1);
        let mut next = Grid::new(3, 1);
        let style = Style::new(Color::Rgb(10, 20, 30), Color::Rgb(1, 2, 3), Attrs::BOLD | Attrs::UNDERLINE);
        next.write_text(0, 0, "x", style);

        let w = Writer::new();
        let out = w.diff_and_emit(&prev, &next);
        let result = apply(&prev, &out);
        let cell = result.get(0, 0).unwrap();
        assert_eq!(cell.fg, Color::Rgb(10, 20, 30));
        assert_eq!(cell.bg, Color::Rgb(1, 2, 3));
        assert!(cell.attrs.contains(Attrs::BOLD));
        assert!(cell.attrs.contains(Attrs::UNDERLINE));
    }

    #[test]
    fn returning_to_default_color_uses_reset_opcode_not_rgb() {
        let mut prev = Grid::new(3, 1);
        prev.write_text(0, 0, "x", Style::new(Color::Rgb(9, 9, 9), Color::Default, Attrs::empty()));
        let mut next = Grid::new(3, 1);
        next.write_text(0, 0, "x", Style::default());

        let w = Writer::new();
        let out = w.diff_and_emit(&prev, &next);
        let text = std::str::from_utf8(&out).unwrap();
        assert!(text.contains("39"));
        assert!(!text.contains("38;2;0;0;0"));
    }

    #[test]
    fn wide_grapheme_continuation_is_skipped_in_diff() {
        let prev = Grid::new(4, 1);
        let mut next = Grid::new(4, 1);
        next.write_text(0, 0, "\u{4e2d}", Style::default());

        let w = Writer::new();
        let out = w.diff_and_emit(&prev, &next);
        let result = apply(&prev, &out);
        assert_eq!(result.get(0, 0).unwrap().cluster, "\u{4e2d}");
    }
}
