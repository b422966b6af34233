#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Target geometry for the shapes elements can form.
//!
//! Generators are pure: they see only the requested shape, the element count
//! and the grid dimensions. Callers treat the result as untrusted and filter
//! it against walls before use.

use std::collections::HashSet;

use matter_core::{CellCoord, ShapeKind};

/// Source of target cells for a shape.
pub trait ShapeGenerator {
    /// Produces up to `count` distinct cells forming `kind` on a
    /// `columns` x `rows` grid.
    ///
    /// Fewer cells are returned only when the grid cannot hold `count`.
    fn generate(&self, kind: ShapeKind, count: usize, columns: u32, rows: u32) -> Vec<CellCoord>;
}

/// Built-in square, circle, triangle and heart layouts centred on the grid.
#[derive(Clone, Copy, Debug, Default)]
pub struct StandardShapes;

/// Heart outline designed on a 10 x 10 canvas.
const HEART: [(i64, i64); 13] = [
    (2, 3),
    (2, 6),
    (3, 2),
    (3, 4),
    (3, 5),
    (3, 7),
    (4, 2),
    (4, 7),
    (5, 3),
    (5, 6),
    (6, 4),
    (6, 5),
    (7, 5),
];

const HEART_CANVAS: i64 = 10;

impl ShapeGenerator for StandardShapes {
    fn generate(&self, kind: ShapeKind, count: usize, columns: u32, rows: u32) -> Vec<CellCoord> {
        if count == 0 || columns == 0 || rows == 0 {
            return Vec::new();
        }
        let mut layout = Layout::new(columns, rows, count);
        match kind {
            ShapeKind::Square => square(&mut layout),
            ShapeKind::Circle => circle(&mut layout),
            ShapeKind::Triangle => triangle(&mut layout),
            ShapeKind::Heart => heart(&mut layout),
        }
        layout.fill_toward_centre();
        layout.cells
    }
}

/// Accumulates distinct in-bounds cells up to the requested count.
#[derive(Debug)]
struct Layout {
    columns: i64,
    rows: i64,
    count: usize,
    cells: Vec<CellCoord>,
    seen: HashSet<CellCoord>,
}

impl Layout {
    fn new(columns: u32, rows: u32, count: usize) -> Self {
        Self {
            columns: i64::from(columns),
            rows: i64::from(rows),
            count,
            cells: Vec::with_capacity(count),
            seen: HashSet::with_capacity(count),
        }
    }

    fn is_full(&self) -> bool {
        self.cells.len() >= self.count
    }

    fn push(&mut self, column: i64, row: i64) {
        if self.is_full() || column < 0 || row < 0 || column >= self.columns || row >= self.rows {
            return;
        }
        let (Ok(column), Ok(row)) = (u32::try_from(column), u32::try_from(row)) else {
            return;
        };
        let cell = CellCoord::new(column, row);
        if self.seen.insert(cell) {
            self.cells.push(cell);
        }
    }

    fn is_interior(&self, column: i64, row: i64) -> bool {
        column > 0 && row > 0 && column < self.columns - 1 && row < self.rows - 1
    }

    /// Tops the layout up with the free cells closest to the grid centre,
    /// interior cells first.
    fn fill_toward_centre(&mut self) {
        if self.is_full() {
            return;
        }
        let mut spare: Vec<(bool, i64, i64, i64)> = (0..self.rows)
            .flat_map(|row| (0..self.columns).map(move |column| (column, row)))
            .map(|(column, row)| {
                let dx = 2 * column - (self.columns - 1);
                let dy = 2 * row - (self.rows - 1);
                (!self.is_interior(column, row), dx * dx + dy * dy, row, column)
            })
            .collect();
        spare.sort_unstable();
        for (_, _, row, column) in spare {
            if self.is_full() {
                break;
            }
            self.push(column, row);
        }
    }
}

fn square(layout: &mut Layout) {
    let side = ceil_sqrt(layout.count);
    let start_column = (layout.columns - side).div_euclid(2);
    let start_row = (layout.rows - side).div_euclid(2);
    for row in start_row..start_row + side {
        for column in start_column..start_column + side {
            layout.push(column, row);
        }
    }
}

fn circle(layout: &mut Layout) {
    let radius = (layout.columns.min(layout.rows) / 3) as f64;
    let centre_column = (layout.columns / 2) as f64;
    let centre_row = (layout.rows / 2) as f64;
    let count = layout.count;
    for index in 0..count {
        let angle = std::f64::consts::TAU * index as f64 / count as f64;
        let column = (centre_column + radius * angle.cos()).trunc() as i64;
        let row = (centre_row + radius * angle.sin()).trunc() as i64;
        layout.push(column, row);
    }
}

fn triangle(layout: &mut Layout) {
    let count = i64::try_from(layout.count).unwrap_or(i64::MAX);
    let mut height = 1;
    while height * (height + 1) / 2 < count {
        height += 1;
    }
    let start_column = (layout.columns - height).div_euclid(2);
    let start_row = (layout.rows - height).div_euclid(2);
    for row in 0..height {
        for column in 0..=row {
            layout.push(start_column + column, start_row + row);
        }
    }
}

fn heart(layout: &mut Layout) {
    let offset_column = (layout.columns - HEART_CANVAS).div_euclid(2);
    let offset_row = (layout.rows - HEART_CANVAS).div_euclid(2);
    let outline: Vec<(i64, i64)> = HEART
        .iter()
        .map(|&(column, row)| (column + offset_column, row + offset_row))
        .collect();
    for &(column, row) in &outline {
        layout.push(column, row);
    }
    for &(column, row) in &outline {
        for (dx, dy) in [(1, 0), (-1, 0), (0, 1), (0, -1)] {
            if layout.is_interior(column + dx, row + dy) {
                layout.push(column + dx, row + dy);
            }
        }
    }
}

fn ceil_sqrt(value: usize) -> i64 {
    let value = i64::try_from(value).unwrap_or(i64::MAX);
    let mut side = 0;
    while side * side < value {
        side += 1;
    }
    side
}
