//! Watershed crown segmentation over a canopy height model.
//!
//! Treetops are the local maxima of the height surface; each becomes a basin
//! seed and the basins are grown outward in order of decreasing height
//! (priority flood), so every reachable cell is claimed by the first flood to
//! arrive. All ordering is fixed: seeds are numbered in row-major detection
//! order, and the flood queue breaks height ties by seed label, then by
//! row-major cell index. The same raster therefore always yields the same
//! crowns.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use canopy_core::nalgebra::Point2;
use canopy_core::CanopyResult;
use float_ord::FloatOrd;

use crate::raster::Raster;

/// A detected treetop: the seed cell of one crown.
#[derive(Debug, Clone, Copy)]
pub struct Treetop {
    pub row: usize,
    pub col: usize,
    /// World coordinates of the seed cell center.
    pub x: f64,
    pub y: f64,
    pub height: f64,
}

/// One segmented crown: its treetop, watershed label and the world-space
/// polygon footprint (closed ring) of its cell region.
#[derive(Debug, Clone)]
pub struct Crown {
    pub top: Treetop,
    pub label: u32,
    pub cell_count: usize,
    /// Footprint area in squared map units.
    pub area: f64,
    pub polygon: Vec<Point2<f64>>,
}

/// Thresholds applied when `classify` is requested: spurious sub-canopy maxima
/// are removed before crowns are emitted.
#[derive(Debug, Clone, Copy)]
pub struct ClassifyParams {
    /// Minimum treetop height; lower seeds are discarded before flooding.
    pub min_height: f64,
    /// Minimum crown footprint area in squared map units; smaller crowns are
    /// discarded after flooding.
    pub min_area: f64,
}

impl Default for ClassifyParams {
    fn default() -> Self {
        Self {
            min_height: 2.0,
            min_area: 0.0,
        }
    }
}

// Max-heap entry: highest cell first, ties to the lower seed label, then the
// lower row-major index.
#[derive(PartialEq, Eq)]
struct FloodCell {
    height: FloatOrd<f64>,
    label: u32,
    index: usize,
}

impl Ord for FloodCell {
    fn cmp(&self, other: &Self) -> Ordering {
        self.height
            .cmp(&other.height)
            .then_with(|| other.label.cmp(&self.label))
            .then_with(|| other.index.cmp(&self.index))
    }
}

impl PartialOrd for FloodCell {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Segments a canopy height model into tree crowns.
///
/// With `classify = true` the default [ClassifyParams] thresholds are applied;
/// see [watershed_seg_with] to override them. An all-nodata surface yields no
/// crowns.
pub fn watershed_seg(chm: &Raster, classify: bool) -> CanopyResult<Vec<Crown>> {
    watershed_seg_with(chm, if classify { Some(ClassifyParams::default()) } else { None })
}

/// [watershed_seg] with explicit classification thresholds.
pub fn watershed_seg_with(
    chm: &Raster,
    classify: Option<ClassifyParams>,
) -> CanopyResult<Vec<Crown>> {
    let rows = chm.rows();
    let cols = chm.cols();

    let mut seeds = detect_local_maxima(chm);
    if let Some(params) = classify {
        seeds.retain(|&(row, col)| chm.get(row, col) >= params.min_height);
    }

    // flood basins from the seeds, highest front first
    let mut labels = vec![0u32; rows * cols];
    let mut heap = BinaryHeap::new();
    for (seed_order, &(row, col)) in seeds.iter().enumerate() {
        let label = seed_order as u32 + 1;
        labels[row * cols + col] = label;
        heap.push(FloodCell {
            height: FloatOrd(chm.get(row, col)),
            label,
            index: row * cols + col,
        });
    }
    let neighbors_4 = [(-1isize, 0isize), (1, 0), (0, -1), (0, 1)];
    while let Some(cell) = heap.pop() {
        let row = (cell.index / cols) as isize;
        let col = (cell.index % cols) as isize;
        for &(dr, dc) in neighbors_4.iter() {
            let (nr, nc) = (row + dr, col + dc);
            if chm.get_opt(nr, nc).is_none() {
                continue;
            }
            let neighbor_index = nr as usize * cols + nc as usize;
            if labels[neighbor_index] != 0 {
                continue;
            }
            labels[neighbor_index] = cell.label;
            heap.push(FloodCell {
                height: FloatOrd(chm.get(nr as usize, nc as usize)),
                label: cell.label,
                index: neighbor_index,
            });
        }
    }

    // gather regions and emit one crown per surviving seed
    let cell_size = chm.transform().cell_size();
    let mut region_cells: HashMap<u32, Vec<(usize, usize)>> = HashMap::new();
    for (index, &label) in labels.iter().enumerate() {
        if label != 0 {
            region_cells
                .entry(label)
                .or_default()
                .push((index / cols, index % cols));
        }
    }

    let mut crowns = Vec::with_capacity(seeds.len());
    for (seed_order, &(row, col)) in seeds.iter().enumerate() {
        let label = seed_order as u32 + 1;
        let cells = match region_cells.get(&label) {
            Some(cells) => cells,
            None => continue,
        };
        let area = cells.len() as f64 * cell_size * cell_size;
        if let Some(params) = classify {
            if area < params.min_area {
                continue;
            }
        }
        let (x, y) = chm.transform().cell_center(row, col);
        crowns.push(Crown {
            top: Treetop {
                row,
                col,
                x,
                y,
                height: chm.get(row, col),
            },
            label,
            cell_count: cells.len(),
            area,
            polygon: trace_outer_ring(chm, &labels, label, cells),
        });
    }
    Ok(crowns)
}

/// Local maxima of the surface in row-major first-seen order: a cell is a seed
/// when no 8-neighbor is higher and no equal-valued 8-neighbor was already
/// accepted as a seed (the fixed tie-break for flat two-cell tops).
pub fn detect_local_maxima(chm: &Raster) -> Vec<(usize, usize)> {
    let rows = chm.rows();
    let cols = chm.cols();
    let mut is_seed = vec![false; rows * cols];
    let mut seeds = Vec::new();
    for row in 0..rows {
        for col in 0..cols {
            let value = chm.get(row, col);
            if value.is_nan() {
                continue;
            }
            let mut accept = true;
            for dr in -1isize..=1 {
                for dc in -1isize..=1 {
                    if dr == 0 && dc == 0 {
                        continue;
                    }
                    let (nr, nc) = (row as isize + dr, col as isize + dc);
                    if let Some(neighbor) = chm.get_opt(nr, nc) {
                        if neighbor > value {
                            accept = false;
                        } else if neighbor == value
                            && is_seed[nr as usize * cols + nc as usize]
                        {
                            accept = false;
                        }
                    }
                }
            }
            if accept {
                is_seed[row * cols + col] = true;
                seeds.push((row, col));
            }
        }
    }
    seeds
}

// Boundary trace of a labeled region: directed cell edges (clockwise in array
// space, region on the right) chained into the outer ring, preferring the
// right turn at pinch corners. Corners are (col, row) lattice coordinates
// mapped through the affine at the end.
fn trace_outer_ring(
    chm: &Raster,
    labels: &[u32],
    label: u32,
    cells: &[(usize, usize)],
) -> Vec<Point2<f64>> {
    let cols = chm.cols();
    let rows = chm.rows();
    let labeled = |r: isize, c: isize| -> bool {
        r >= 0
            && c >= 0
            && (r as usize) < rows
            && (c as usize) < cols
            && labels[r as usize * cols + c as usize] == label
    };

    let mut edges: HashMap<(i64, i64), Vec<(i64, i64)>> = HashMap::new();
    let mut add_edge = |from: (i64, i64), to: (i64, i64)| {
        edges.entry(from).or_default().push(to);
    };
    for &(row, col) in cells {
        let (r, c) = (row as isize, col as isize);
        let (x0, y0) = (col as i64, row as i64);
        let (x1, y1) = (x0 + 1, y0 + 1);
        if !labeled(r - 1, c) {
            add_edge((x0, y0), (x1, y0));
        }
        if !labeled(r, c + 1) {
            add_edge((x1, y0), (x1, y1));
        }
        if !labeled(r + 1, c) {
            add_edge((x1, y1), (x0, y1));
        }
        if !labeled(r, c - 1) {
            add_edge((x0, y1), (x0, y0));
        }
    }

    // start at the topmost-leftmost corner; its outgoing edge runs along a top
    // side, direction +x
    let start = *edges
        .keys()
        .min_by_key(|&&(x, y)| (y, x))
        .expect("a non-empty region has boundary edges");
    let mut ring = vec![start];
    let mut current = start;
    let mut direction = (0i64, 0i64);
    loop {
        let candidates = match edges.get_mut(&current) {
            Some(c) if !c.is_empty() => c,
            _ => break,
        };
        let next = if candidates.len() == 1 || direction == (0, 0) {
            candidates.swap_remove(0)
        } else {
            // pinch corner: prefer the right turn, then straight, then left
            let preferences = [
                (-direction.1, direction.0),
                direction,
                (direction.1, -direction.0),
            ];
            let mut chosen = 0;
            'search: for preferred in preferences.iter() {
                for (i, &candidate) in candidates.iter().enumerate() {
                    let step = (candidate.0 - current.0, candidate.1 - current.1);
                    if step == *preferred {
                        chosen = i;
                        break 'search;
                    }
                }
            }
            candidates.swap_remove(chosen)
        };
        direction = (next.0 - current.0, next.1 - current.1);
        ring.push(next);
        current = next;
        if current == start {
            break;
        }
    }

    ring.into_iter()
        .map(|(x, y)| {
            let (wx, wy) = chm.transform().cell_corner(y as usize, x as usize);
            Point2::new(wx, wy)
        })
        .collect()
}
