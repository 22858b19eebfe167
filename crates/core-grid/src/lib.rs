//! Styled cell grid and the diffing terminal writer.
//!
//! `Cell` stores the full grapheme cluster for leader cells along with its
//! visual width; continuation cells (width == 0) occupy the remaining
//! columns of a multi-column cluster and carry no text of their own. All
//! writer paths emit only leader clusters, exactly once.
//!
//! Invariants:
//! - Leader: width >= 1, `cluster` non-empty.
//! - Continuation: width == 0, `cluster` empty.
//! - Continuations immediately follow their leader horizontally; no gaps.
//! - The default color is a sentinel distinct from any RGB triple so the
//!   writer can emit the terminal's own reset opcode rather than a concrete
//!   value.

pub mod writer;

use bitflags::bitflags;
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Attrs: u8 {
        const BOLD      = 0b0000_0001;
        const DIM       = 0b0000_0010;
        const ITALIC    = 0b0000_0100;
        const UNDERLINE = 0b0000_1000;
        const BLINK     = 0b0001_0000;
        const REVERSE   = 0b0010_0000;
        const STRIKE    = 0b0100_0000;
        const OVERLINE  = 0b1000_0000;
    }
}

/// A terminal color. `Default` is a sentinel distinct from any RGB triple;
/// the writer emits the terminal's own default-color opcode for it rather
/// than a concrete value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Color {
    #[default]
    Default,
    Rgb(u8, u8, u8),
}

/// Foreground, background, and attribute set applied to a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Style {
    pub fg: Color,
    pub bg: Color,
    pub attrs: Attrs,
}

impl Style {
    pub fn new(fg: Color, bg: Color, attrs: Attrs) -> Self {
        Self { fg, bg, attrs }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    /// Full grapheme cluster string. Empty for continuation cells.
    pub cluster: String,
    /// Visual width in terminal columns. `0` designates a continuation cell.
    pub width: u8,
    pub fg: Color,
    pub bg: Color,
    pub attrs: Attrs,
}

impl Cell {
    #[inline]
    pub fn leader(cluster: &str, width: u16, style: Style) -> Self {
        Self {
            cluster: cluster.to_string(),
            width: width.max(1) as u8,
            fg: style.fg,
            bg: style.bg,
            attrs: style.attrs,
        }
    }

    #[inline]
    pub fn continuation(style: Style) -> Self {
        Self {
            cluster: String::new(),
            width: 0,
            fg: style.fg,
            bg: style.bg,
            attrs: style.attrs,
        }
    }

    #[inline]
    pub fn is_leader(&self) -> bool {
        self.width > 0
    }

    #[inline]
    pub fn visual_width(&self) -> u16 {
        self.width as u16
    }

    #[inline]
    pub fn style(&self) -> Style {
        Style::new(self.fg, self.bg, self.attrs)
    }
}

impl Default for Cell {
    fn default() -> Self {
        Cell {
            cluster: " ".to_string(),
            width: 1,
            fg: Color::Default,
            bg: Color::Default,
            attrs: Attrs::empty(),
        }
    }
}

/// Origin (x, y) and size (w, h) in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u16,
    pub y: u16,
    pub w: u16,
    pub h: u16,
}

impl Rect {
    pub fn new(x: u16, y: u16, w: u16, h: u16) -> Self {
        Self { x, y, w, h }
    }

    #[inline]
    pub fn right(&self) -> u16 {
        self.x + self.w
    }

    #[inline]
    pub fn bottom(&self) -> u16 {
        self.y + self.h
    }

    #[inline]
    pub fn contains(&self, x: u16, y: u16) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }
}

/// Rectangular array of `Cell` with width W and height H.
#[derive(Debug, Clone)]
pub struct Grid {
    width: u16,
    height: u16,
    cells: Vec<Cell>,
}

impl Grid {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            cells: vec![Cell::default(); width as usize * height as usize],
        }
    }

    #[inline]
    pub fn width(&self) -> u16 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u16 {
        self.height
    }

    #[inline]
    fn index(&self, x: u16, y: u16) -> Option<usize> {
        if x < self.width && y < self.height {
            Some(y as usize * self.width as usize + x as usize)
        } else {
            None
        }
    }

    pub fn get(&self, x: u16, y: u16) -> Option<&Cell> {
        self.index(x, y).map(|i| &self.cells[i])
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Writes `text` at (x, y), advancing by the Unicode display width of
    /// each grapheme cluster. Continuation columns of wide graphemes carry
    /// no independent text. Writes that fall outside the grid are silently
    /// clipped. Returns the column one past the last cell written.
    pub fn write_text(&mut self, x: u16, y: u16, text: &str, style: Style) -> u16 {
        let mut cur = x;
        for grapheme in text.graphemes(true) {
            let w = UnicodeWidthStr::width(grapheme).max(1) as u16;
            if cur < self.width && y < self.height {
                if let Some(idx) = self.index(cur, y) {
                    self.cells[idx] = Cell::leader(grapheme, w, style);
                }
                for offset in 1..w {
                    if let Some(idx) = self.index(cur + offset, y) {
                        self.cells[idx] = Cell::continuation(style);
                    }
                }
            }
            cur += w;
        }
        cur
    }

    /// Fills a rectangle with `cell`, clipping to the grid bounds.
    pub fn fill(&mut self, rect: Rect, cell: Cell) {
        for y in rect.y..rect.bottom().min(self.height) {
            for x in rect.x..rect.right().min(self.width) {
                if let Some(idx) = self.index(x, y) {
                    self.cells[idx] = cell.clone();
                }
            }
        }
    }

    /// Writes a single cell at (x, y). Out-of-bounds writes are discarded.
    pub fn put(&mut self, x: u16, y: u16, cell: Cell) {
        if let Some(idx) = self.index(x, y) {
            self.cells[idx] = cell;
        }
    }
}
