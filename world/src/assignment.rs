//! Element-to-target assignment using Manhattan cost.

use matter_core::CellCoord;
use serde::{Deserialize, Serialize};

/// Strategy used to pair elements with shape targets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStrategy {
    /// Minimum total Manhattan distance (Kuhn-Munkres).
    #[default]
    Optimal,
    /// Repeatedly pair the globally closest unassigned element and target.
    Greedy,
}

impl AssignmentStrategy {
    /// Pairs each position with at most one target.
    ///
    /// The result is aligned with `positions`; entries stay `None` when there
    /// are fewer targets than positions.
    #[must_use]
    pub(crate) fn assign(self, positions: &[CellCoord], targets: &[CellCoord]) -> Vec<Option<CellCoord>> {
        if positions.is_empty() || targets.is_empty() {
            return vec![None; positions.len()];
        }

        let columns = match self {
            Self::Optimal => optimal(positions, targets),
            Self::Greedy => greedy(positions, targets),
        };
        columns
            .into_iter()
            .map(|column| column.and_then(|index| targets.get(index).copied()))
            .collect()
    }
}

fn greedy(positions: &[CellCoord], targets: &[CellCoord]) -> Vec<Option<usize>> {
    let mut pairs: Vec<(u32, usize, usize)> = Vec::with_capacity(positions.len() * targets.len());
    for (row, position) in positions.iter().enumerate() {
        for (column, target) in targets.iter().enumerate() {
            pairs.push((position.manhattan_distance(*target), row, column));
        }
    }
    pairs.sort_unstable();

    let mut result = vec![None; positions.len()];
    let mut taken = vec![false; targets.len()];
    for (_, row, column) in pairs {
        if result[row].is_some() || taken[column] {
            continue;
        }
        result[row] = Some(column);
        taken[column] = true;
    }
    result
}

fn optimal(positions: &[CellCoord], targets: &[CellCoord]) -> Vec<Option<usize>> {
    if positions.len() <= targets.len() {
        let costs = cost_matrix(positions, targets);
        return hungarian(&costs, targets.len());
    }

    // More elements than targets: solve the transposed problem and invert.
    let costs = cost_matrix(targets, positions);
    let by_target = hungarian(&costs, positions.len());
    let mut result = vec![None; positions.len()];
    for (target, position) in by_target.into_iter().enumerate() {
        if let Some(position) = position {
            result[position] = Some(target);
        }
    }
    result
}

fn cost_matrix(rows: &[CellCoord], columns: &[CellCoord]) -> Vec<Vec<i64>> {
    rows.iter()
        .map(|row| {
            columns
                .iter()
                .map(|column| i64::from(row.manhattan_distance(*column)))
                .collect()
        })
        .collect()
}

/// Kuhn-Munkres with potentials; requires `costs.len() <= width`.
fn hungarian(costs: &[Vec<i64>], width: usize) -> Vec<Option<usize>> {
    const INFINITY: i64 = i64::MAX / 4;
    let height = costs.len();

    let mut row_potential = vec![0_i64; height + 1];
    let mut column_potential = vec![0_i64; width + 1];
    let mut owner = vec![0_usize; width + 1];
    let mut way = vec![0_usize; width + 1];

    for row in 1..=height {
        owner[0] = row;
        let mut current = 0;
        let mut slack = vec![INFINITY; width + 1];
        let mut used = vec![false; width + 1];

        loop {
            used[current] = true;
            let active_row = owner[current];
            let mut delta = INFINITY;
            let mut next = 0;

            for column in 1..=width {
                if used[column] {
                    continue;
                }
                let reduced = costs[active_row - 1][column - 1]
                    - row_potential[active_row]
                    - column_potential[column];
                if reduced < slack[column] {
                    slack[column] = reduced;
                    way[column] = current;
                }
                if slack[column] < delta {
                    delta = slack[column];
                    next = column;
                }
            }

            for column in 0..=width {
                if used[column] {
                    row_potential[owner[column]] += delta;
                    column_potential[column] -= delta;
                } else {
                    slack[column] -= delta;
                }
            }

            current = next;
            if owner[current] == 0 {
                break;
            }
        }

        loop {
            let previous = way[current];
            owner[current] = owner[previous];
            current = previous;
            if current == 0 {
                break;
            }
        }
    }

    let mut result = vec![None; height];
    for column in 1..=width {
        if owner[column] != 0 {
            result[owner[column] - 1] = Some(column - 1);
        }
    }
    result
}
