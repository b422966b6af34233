//! Plain-text rendering of reports for the terminal.

use std::{collections::HashMap, fmt::Write};

use matter_core::{CellCoord, SimulationState, TransformReport};
use matter_system_analytics::{AlgorithmResult, DeadlockHeatmap};

/// Intensity ramp used by the heatmap, lightest first.
const SHADES: &[u8] = b" .:-=+*#%@";

/// Hotspots listed under the heatmap.
const HOTSPOTS_SHOWN: usize = 5;

/// Summary lines followed by the final grid.
///
/// `#` wall, `o` element on its target, `x` element elsewhere, `+` target
/// nobody reached, `.` empty.
pub(crate) fn transform_summary(report: &TransformReport, state: &SimulationState) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "success: {} ({:.1}% at target)",
        if report.success { "yes" } else { "no" },
        report.success_rate * 100.0
    );
    let _ = writeln!(
        out,
        "moves: {}  nodes: {}  ticks: {}  interventions: {}  elapsed: {} ms",
        report.moves.len(),
        report.nodes_explored,
        report.ticks,
        report.interventions,
        report.elapsed.as_millis()
    );
    if let Some(message) = &report.message {
        let _ = writeln!(out, "note: {message}");
    }

    let mut glyphs: HashMap<CellCoord, char> = HashMap::new();
    for target in &state.targets {
        let _ = glyphs.insert(*target, '+');
    }
    for wall in &state.walls {
        let _ = glyphs.insert(*wall, '#');
    }
    for element in &state.elements {
        let glyph = if element.target == Some(element.cell) {
            'o'
        } else {
            'x'
        };
        let _ = glyphs.insert(element.cell, glyph);
    }
    for row in 0..state.rows {
        let line: String = (0..state.columns)
            .map(|column| {
                glyphs
                    .get(&CellCoord::new(column, row))
                    .copied()
                    .unwrap_or('.')
            })
            .collect();
        let _ = writeln!(out, "{line}");
    }
    out
}

/// One row per algorithm.
pub(crate) fn comparison_table(results: &[AlgorithmResult]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<12}{:>9}{:>8}{:>12}{:>8}{:>10}",
        "algorithm", "success", "moves", "nodes", "fixes", "ms"
    );
    for result in results {
        let _ = writeln!(
            out,
            "{:<12}{:>8.1}%{:>8}{:>12}{:>8}{:>10}",
            result.algorithm.name(),
            result.success_rate * 100.0,
            result.moves,
            result.nodes_explored,
            result.interventions,
            result.elapsed.as_millis()
        );
    }
    out
}

pub(crate) fn heatmap_grid(heatmap: &DeadlockHeatmap) -> String {
    let mut out = String::new();
    let top = (SHADES.len() - 1) as f64;
    for row in heatmap.normalised() {
        let line: String = row
            .iter()
            .map(|value| {
                let index = (value * top).round() as usize;
                char::from(SHADES[index.min(SHADES.len() - 1)])
            })
            .collect();
        let _ = writeln!(out, "|{line}|");
    }
    let _ = writeln!(
        out,
        "max {} stranded per cell over {} runs",
        heatmap.max(),
        heatmap.runs()
    );
    for (cell, count) in heatmap.hotspots().into_iter().take(HOTSPOTS_SHOWN) {
        let _ = writeln!(out, "  {cell}: {count}");
    }
    out
}
