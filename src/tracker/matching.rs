//! Matching utilities for multi-object tracking.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::tracker::rect::Rect;

/// How the track/detection cost matrix is solved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssignmentStrategy {
    /// Exact minimum-cost matching (Jonker-Volgenant)
    #[default]
    Optimal,
    /// Cheapest pair first, ties to the lower track then detection index
    Greedy,
}

/// Compute IoU distance matrix between tracks and detections.
pub fn iou_distance(track_boxes: &[Rect], det_boxes: &[Rect]) -> Array2<f32> {
    let mut dists = Array2::zeros((track_boxes.len(), det_boxes.len()));
    for (i, t) in track_boxes.iter().enumerate() {
        for (j, d) in det_boxes.iter().enumerate() {
            dists[[i, j]] = 1.0 - t.iou(d);
        }
    }
    dists
}

/// Fold detection confidence into an IoU cost matrix: `1 - IoU * score`.
pub fn fuse_score(cost_matrix: &mut Array2<f32>, scores: &[f32]) {
    let (rows, cols) = cost_matrix.dim();
    debug_assert_eq!(cols, scores.len());
    for i in 0..rows {
        for j in 0..cols {
            let iou_sim = 1.0 - cost_matrix[[i, j]];
            cost_matrix[[i, j]] = 1.0 - iou_sim * scores[j];
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentResult {
    /// `(track index, detection index)` pairs
    pub matches: Vec<(usize, usize)>,
    /// Track indices without a match, ascending
    pub unmatched_tracks: Vec<usize>,
    /// Detection indices without a match, ascending
    pub unmatched_detections: Vec<usize>,
}

impl AssignmentResult {
    fn from_matches(matches: Vec<(usize, usize)>, num_rows: usize, num_cols: usize) -> Self {
        let mut row_used = vec![false; num_rows];
        let mut col_used = vec![false; num_cols];
        for &(r, c) in &matches {
            row_used[r] = true;
            col_used[c] = true;
        }
        Self {
            matches,
            unmatched_tracks: (0..num_rows).filter(|&r| !row_used[r]).collect(),
            unmatched_detections: (0..num_cols).filter(|&c| !col_used[c]).collect(),
        }
    }
}

/// Solve the rectangular assignment problem on `cost_matrix`.
///
/// A pair is accepted only when its cost is strictly below `thresh`. Empty
/// inputs are not errors: every row or column is reported unmatched.
pub fn linear_assignment(
    cost_matrix: &Array2<f32>,
    thresh: f32,
    strategy: AssignmentStrategy,
) -> Result<AssignmentResult> {
    let (num_rows, num_cols) = cost_matrix.dim();

    if num_rows == 0 || num_cols == 0 {
        return Ok(AssignmentResult::from_matches(Vec::new(), num_rows, num_cols));
    }

    if let Some(bad) = cost_matrix.iter().find(|c| !c.is_finite()) {
        return Err(Error::Assignment(format!("cost matrix contains {bad}")));
    }

    let mut matches = match strategy {
        AssignmentStrategy::Optimal => solve_optimal(cost_matrix, thresh)?,
        AssignmentStrategy::Greedy => solve_greedy(cost_matrix, thresh),
    };
    matches.sort_unstable();

    Ok(AssignmentResult::from_matches(matches, num_rows, num_cols))
}

/// Jonker-Volgenant on the cost-limit extended matrix.
///
/// Every real row and column gets a dummy partner costing `thresh / 2`, so
/// leaving a track and a detection both unmatched costs exactly `thresh` and
/// pairs at or above the threshold are never forced.
fn solve_optimal(cost_matrix: &Array2<f32>, thresh: f32) -> Result<Vec<(usize, usize)>> {
    let (num_rows, num_cols) = cost_matrix.dim();
    let size = num_rows + num_cols;
    let limit = f64::from(thresh) / 2.0;

    let mut extended = Array2::<f64>::from_elem((size, size), limit);
    for i in num_rows..size {
        for j in num_cols..size {
            extended[[i, j]] = 0.0;
        }
    }
    for i in 0..num_rows {
        for j in 0..num_cols {
            extended[[i, j]] = f64::from(cost_matrix[[i, j]]);
        }
    }

    let (row_to_col, _) =
        lapjv::lapjv(&extended).map_err(|e| Error::Assignment(format!("{e:?}")))?;

    let mut col_of_row: Vec<Option<usize>> = row_to_col
        .iter()
        .take(num_rows)
        .enumerate()
        .map(|(row, &col)| (col < num_cols && cost_matrix[[row, col]] < thresh).then_some(col))
        .collect();
    canonicalize_ties(cost_matrix, thresh, &mut col_of_row);

    Ok(col_of_row
        .iter()
        .enumerate()
        .filter_map(|(row, col)| col.map(|c| (row, c)))
        .collect())
}

/// Among equal-cost matchings, prefer lower detection indices for lower
/// track indices.
///
/// Each step lowers the column of one row without changing the total cost,
/// so the row-ordered column vector decreases lexicographically and the loop
/// ends.
fn canonicalize_ties(cost_matrix: &Array2<f32>, thresh: f32, col_of_row: &mut [Option<usize>]) {
    let num_cols = cost_matrix.ncols();
    let cost = |i: usize, j: usize| f64::from(cost_matrix[[i, j]]);
    let mut row_of_col: Vec<Option<usize>> = vec![None; num_cols];
    for (row, col) in col_of_row.iter().enumerate() {
        if let Some(c) = col {
            row_of_col[*c] = Some(row);
        }
    }

    let mut changed = true;
    while changed {
        changed = false;
        for i in 0..col_of_row.len() {
            let current = col_of_row[i];
            for j in 0..current.unwrap_or(num_cols) {
                if cost_matrix[[i, j]] >= thresh {
                    continue;
                }
                let moved = match (current, row_of_col[j]) {
                    // Free column with the same cost
                    (Some(c), None) => cost(i, j) == cost(i, c),
                    // Row `k` gives column `j` up to the lower row `i`
                    (None, Some(k)) if k > i => cost(i, j) == cost(k, j),
                    // Swap columns with the higher row `k`
                    (Some(c), Some(k)) if k > i => {
                        cost_matrix[[k, c]] < thresh && cost(i, j) + cost(k, c) == cost(i, c) + cost(k, j)
                    }
                    _ => false,
                };
                if !moved {
                    continue;
                }

                if let Some(k) = row_of_col[j] {
                    col_of_row[k] = current;
                }
                if let Some(c) = current {
                    row_of_col[c] = row_of_col[j];
                }
                col_of_row[i] = Some(j);
                row_of_col[j] = Some(i);
                changed = true;
                break;
            }
        }
    }
}

fn solve_greedy(cost_matrix: &Array2<f32>, thresh: f32) -> Vec<(usize, usize)> {
    let (num_rows, num_cols) = cost_matrix.dim();

    let mut pairs: Vec<(f32, usize, usize)> = cost_matrix
        .indexed_iter()
        .filter(|&(_, &cost)| cost < thresh)
        .map(|((i, j), &cost)| (cost, i, j))
        .collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

    let mut row_used = vec![false; num_rows];
    let mut col_used = vec![false; num_cols];
    let mut matches = Vec::new();
    for (_, i, j) in pairs {
        if row_used[i] || col_used[j] {
            continue;
        }
        row_used[i] = true;
        col_used[j] = true;
        matches.push((i, j));
    }
    matches
}
