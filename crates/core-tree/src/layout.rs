//! Container layout policies. A node with children but no policy of its own
//! is a leaf as far as layout is concerned: it keeps whatever bounds its
//! parent assigned and lays out nothing beneath it.

use core_grid::Rect;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Horizontal,
    Vertical,
}

/// How a container assigns bounds to its children from its own bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Layout {
    /// Children split the container evenly along `direction`.
    Stack { direction: Direction },
    /// Children fill row-major cells of a grid `columns` wide.
    Grid { columns: u16 },
    /// Exactly two children; the first receives `ratio` of the container
    /// (0.0..=1.0) along `direction`, the second the remainder.
    Splitter { direction: Direction, ratio: f32 },
    /// All children receive the full container bounds, painted in order;
    /// the last child is topmost.
    ZStack,
}

/// Assigns `n` children's bounds within `bounds` per `layout`. The returned
/// vector always has exactly `n` entries, even when `n` is zero.
pub fn compute_child_bounds(layout: &Layout, bounds: Rect, n: usize) -> Vec<Rect> {
    if n == 0 {
        return Vec::new();
    }
    match layout {
        Layout::Stack { direction } => stack_bounds(*direction, bounds, n),
        Layout::Grid { columns } => grid_bounds(*columns, bounds, n),
        Layout::Splitter { direction, ratio } => splitter_bounds(*direction, *ratio, bounds, n),
        Layout::ZStack => vec![bounds; n],
    }
}

fn stack_bounds(direction: Direction, bounds: Rect, n: usize) -> Vec<Rect> {
    let n = n as u16;
    match direction {
        Direction::Vertical => {
            let base = bounds.h / n;
            let mut extra = bounds.h % n;
            let mut y = bounds.y;
            (0..n)
                .map(|_| {
                    let h = base + if extra > 0 { extra -= 1; 1 } else { 0 };
                    let r = Rect::new(bounds.x, y, bounds.w, h);
                    y += h;
                    r
                })
                .collect()
        }
        Direction::Horizontal => {
            let base = bounds.w / n;
            let mut extra = bounds.w % n;
            let mut x = bounds.x;
            (0..n)
                .map(|_| {
                    let w = base + if extra > 0 { extra -= 1; 1 } else { 0 };
                    let r = Rect::new(x, bounds.y, w, bounds.h);
                    x += w;
                    r
                })
                .collect()
        }
    }
}

fn grid_bounds(columns: u16, bounds: Rect, n: usize) -> Vec<Rect> {
    let columns = columns.max(1).min(n as u16);
    let rows = (n as u16).div_ceil(columns);
    let cell_w = bounds.w / columns;
    let cell_h = bounds.h / rows;
    (0..n)
        .map(|i| {
            let col = (i as u16) % columns;
            let row = (i as u16) / columns;
            Rect::new(
                bounds.x + col * cell_w,
                bounds.y + row * cell_h,
                cell_w,
                cell_h,
            )
        })
        .collect()
}

fn splitter_bounds(direction: Direction, ratio: f32, bounds: Rect, n: usize) -> Vec<Rect> {
    let ratio = ratio.clamp(0.0, 1.0);
    if n == 1 {
        return vec![bounds];
    }
    match direction {
        Direction::Vertical => {
            let first_h = (bounds.h as f32 * ratio).round() as u16;
            let first = Rect::new(bounds.x, bounds.y, bounds.w, first_h);
            let second = Rect::new(bounds.x, bounds.y + first_h, bounds.w, bounds.h - first_h);
            let mut out = vec![first, second];
            out.truncate(n);
            while out.len() < n {
                out.push(Rect::new(bounds.x, bounds.bottom(), bounds.w, 0));
            }
            out
        }
        Direction::Horizontal => {
            let first_w = (bounds.w as f32 * ratio).round() as u16;
            let first = Rect::new(bounds.x, bounds.y, first_w, bounds.h);
            let second = Rect::new(bounds.x + first_w, bounds.y, bounds.w - first_w, bounds.h);
            let mut out = vec![first, second];
            out.truncate(n);
            while out.len() < n {
                out.push(Rect::new(bounds.right(), bounds.y, 0, bounds.h));
            }
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn vertical_stack_splits_evenly() {
        let bounds = Rect::new(0, 0, 10, 10);
        let out = compute_child_bounds(&Layout::Stack { direction: Direction::Vertical }, bounds, 3);
        assert_eq!(out.len(), 3);
        assert_eq!(out.iter().map(|r| r.h).sum::<u16>(), 10);
        assert_eq!(out[0].y, 0);
        assert_eq!(out[1].y, out[0].h);
    }

    #[test]
    fn grid_lays_out_row_major() {
        let bounds = Rect::new(0, 0, 12, 8);
        let out = compute_child_bounds(&Layout::Grid { columns: 3 }, bounds, 4);
        assert_eq!(out.len(), 4);
        assert_eq!(out[0].x, 0);
        assert_eq!(out[1].x, 4);
        assert_eq!(out[3].y, out[0].bottom());
    }

    #[test]
    fn splitter_honors_ratio() {
        let bounds = Rect::new(0, 0, 100, 10);
        let out = compute_child_bounds(
            &Layout::Splitter { direction: Direction::Horizontal, ratio: 0.25 },
            bounds,
            2,
        );
        assert_eq!(out[0].w, 25);
        assert_eq!(out[1].w, 75);
        assert_eq!(out[1].x, 25);
    }

    #[test]
    fn zstack_gives_every_child_full_bounds() {
        let bounds = Rect::new(1, 2, 3, 4);
        let out = compute_child_bounds(&Layout::ZStack, bounds, 3);
        assert!(out.iter().all(|r| *r == bounds));
    }

    #[test]
    fn zero_children_yields_empty_vec() {
        let bounds = Rect::new(0, 0, 10, 10);
        let out = compute_child_bounds(&Layout::Stack { direction: Direction::Vertical }, bounds, 0);
        assert!(out.is_empty());
    }
}
