// THEORY:
// The `GridAnalyzer` is the whole of the analysis layer. It owns nothing but a
// grid shape, and turns one borrowed frame into an ordered list of `CellData`
// records, one per cell, in row-major order.
//
// Key architectural principles:
// 1.  **Partitioning**: Each axis is split independently. Every cell on an axis
//     gets `floor(len / parts)` pixels except the last, which runs to the edge
//     of the frame and absorbs the remainder. The union of the cells covers the
//     frame exactly, with no overlap.
// 2.  **Fail Fast**: A frame smaller than the grid would produce empty cells
//     with undefined statistics, so it is rejected before any work is done.
// 3.  **Statelessness**: No state is carried between frames. The same analyzer
//     can be shared, reused, and called from several threads at once.
// 4.  **Optional Parallelism**: Cells have no data dependencies on each other.
//     `analyze_frame_parallel` spreads them across worker threads and returns
//     exactly what `analyze_frame` would.

use crate::config::GridConfig;
use crate::core_modules::cell::{CellBounds, CellData, analyze_cell};
use crate::core_modules::frame::Frame;
use crate::error::{GridcastError, GridcastResult};

/// Below this many cells, spawning workers costs more than it saves.
const MIN_CELLS_PER_WORKER: usize = 4;

/// Partitions frames into a fixed grid and fingerprints every cell.
#[derive(Debug, Clone)]
pub struct GridAnalyzer {
    grid: GridConfig,
}

impl GridAnalyzer {
    pub fn new(grid: GridConfig) -> GridcastResult<Self> {
        grid.validate()?;
        Ok(Self { grid })
    }

    pub fn grid(&self) -> GridConfig {
        self.grid
    }

    /// The `[start, end)` span of part `index` when `len` pixels are split
    /// into `parts` pieces. The last piece absorbs the remainder.
    pub fn axis_span(len: usize, parts: usize, index: usize) -> (usize, usize) {
        let step = len / parts;
        let start = index * step;
        let end = if index + 1 < parts { start + step } else { len };
        (start, end)
    }

    /// Cell rectangles for a `width` x `height` frame, in row-major order.
    pub fn partition(&self, width: usize, height: usize) -> GridcastResult<Vec<CellBounds>> {
        let GridConfig { rows, cols } = self.grid;
        if height < rows || width < cols {
            return Err(GridcastError::FrameSmallerThanGrid {
                width,
                height,
                rows,
                cols,
            });
        }

        let mut cells = Vec::with_capacity(self.grid.cell_count());
        for row in 0..rows {
            let (y_start, y_end) = Self::axis_span(height, rows, row);
            for col in 0..cols {
                let (x_start, x_end) = Self::axis_span(width, cols, col);
                cells.push(CellBounds {
                    row,
                    col,
                    y_start,
                    y_end,
                    x_start,
                    x_end,
                });
            }
        }
        Ok(cells)
    }

    /// Analyzes every cell of `frame` on the calling thread.
    pub fn analyze_frame(&self, frame: &Frame<'_>) -> GridcastResult<Vec<CellData>> {
        let cells = self.partition(frame.width(), frame.height())?;
        Ok(cells.iter().map(|bounds| analyze_cell(frame, bounds)).collect())
    }

    /// Same result as `analyze_frame`, with cells spread over the available cores.
    pub fn analyze_frame_parallel(&self, frame: &Frame<'_>) -> GridcastResult<Vec<CellData>> {
        let cells = self.partition(frame.width(), frame.height())?;
        let workers = num_cpus::get()
            .min(cells.len() / MIN_CELLS_PER_WORKER)
            .max(1);
        if workers == 1 {
            return Ok(cells.iter().map(|bounds| analyze_cell(frame, bounds)).collect());
        }

        let per_worker = cells.len().div_ceil(workers);
        let results = std::thread::scope(|scope| {
            let handles: Vec<_> = cells
                .chunks(per_worker)
                .map(|batch| {
                    scope.spawn(move || {
                        batch
                            .iter()
                            .map(|bounds| analyze_cell(frame, bounds))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join())
                .collect::<Result<Vec<_>, _>>()
        })
        .map_err(|_| GridcastError::malformed_frame("a cell analysis worker panicked"))?;

        Ok(results.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::frame::FrameBuffer;
    use crate::core_modules::pixel::{ChannelOrder, Rgb};

    fn analyzer(rows: usize, cols: usize) -> GridAnalyzer {
        GridAnalyzer::new(GridConfig::new(rows, cols).unwrap()).unwrap()
    }

    /// A frame whose bytes vary with position so every cell differs.
    fn gradient(width: usize, height: usize) -> FrameBuffer {
        let mut data = Vec::with_capacity(width * height * 3);
        for y in 0..height {
            for x in 0..width {
                data.push((x * 7 % 256) as u8);
                data.push((y * 13 % 256) as u8);
                data.push(((x + y) * 31 % 256) as u8);
            }
        }
        FrameBuffer::new(data, width, height, ChannelOrder::Bgr)
    }

    #[test]
    fn remainder_lands_in_the_last_row_and_column() {
        let cells = analyzer(3, 3).partition(10, 10).unwrap();
        let rows: Vec<_> = cells
            .iter()
            .filter(|c| c.col == 0)
            .map(|c| (c.y_start, c.y_end))
            .collect();
        assert_eq!(rows, vec![(0, 3), (3, 6), (6, 10)]);

        let cols: Vec<_> = cells
            .iter()
            .filter(|c| c.row == 0)
            .map(|c| (c.x_start, c.x_end))
            .collect();
        assert_eq!(cols, vec![(0, 3), (3, 6), (6, 10)]);
    }

    #[test]
    fn partition_covers_every_pixel_exactly_once() {
        for &(width, height, rows, cols) in &[
            (10, 10, 3, 3),
            (17, 5, 5, 4),
            (64, 48, 4, 4),
            (7, 9, 9, 7),
            (1, 1, 1, 1),
            (33, 20, 1, 6),
        ] {
            let cells = analyzer(rows, cols).partition(width, height).unwrap();
            let mut hits = vec![0u8; width * height];
            for cell in &cells {
                assert!(cell.area() > 0);
                for y in cell.y_start..cell.y_end {
                    for x in cell.x_start..cell.x_end {
                        hits[y * width + x] += 1;
                    }
                }
            }
            assert!(
                hits.iter().all(|&h| h == 1),
                "{width}x{height} split {rows}x{cols} leaves gaps or overlaps"
            );
        }
    }

    #[test]
    fn output_is_row_major() {
        let buffer = gradient(20, 12);
        let frame = buffer.as_frame().unwrap();
        let records = analyzer(3, 5).analyze_frame(&frame).unwrap();

        assert_eq!(records.len(), 15);
        for (i, record) in records.iter().enumerate() {
            assert_eq!((record.row, record.col), (i / 5, i % 5));
        }
    }

    #[test]
    fn statistics_stay_normalized() {
        let mut data = vec![0u8; 31 * 17 * 3];
        for (i, byte) in data.iter_mut().enumerate() {
            *byte = if (i / 3) % 2 == 0 { 255 } else { (i * 37 % 256) as u8 };
        }
        let buffer = FrameBuffer::new(data, 31, 17, ChannelOrder::Bgr);
        let frame = buffer.as_frame().unwrap();
        for record in analyzer(4, 6).analyze_frame(&frame).unwrap() {
            let (dr, dg, db) = record.dominant_color;
            for value in [
                record.avg_red,
                record.avg_green,
                record.avg_blue,
                record.brightness,
                record.contrast,
                dr,
                dg,
                db,
            ] {
                assert!((0.0..=1.0).contains(&value), "{value} out of range");
            }
        }
    }

    #[test]
    fn analysis_is_deterministic() {
        let buffer = gradient(40, 30);
        let frame = buffer.as_frame().unwrap();
        let grid = analyzer(4, 4);
        assert_eq!(grid.analyze_frame(&frame).unwrap(), grid.analyze_frame(&frame).unwrap());
    }

    #[test]
    fn parallel_matches_sequential() {
        let buffer = gradient(96, 64);
        let frame = buffer.as_frame().unwrap();
        let grid = analyzer(8, 12);
        assert_eq!(
            grid.analyze_frame(&frame).unwrap(),
            grid.analyze_frame_parallel(&frame).unwrap()
        );
    }

    #[test]
    fn single_cell_equals_whole_frame() {
        let buffer = gradient(13, 9);
        let frame = buffer.as_frame().unwrap();
        let records = analyzer(1, 1).analyze_frame(&frame).unwrap();
        assert_eq!(records.len(), 1);

        let whole = CellBounds {
            row: 0,
            col: 0,
            y_start: 0,
            y_end: 9,
            x_start: 0,
            x_end: 13,
        };
        assert_eq!(records[0], analyze_cell(&frame, &whole));
    }

    #[test]
    fn uniform_frame_gives_uniform_cells() {
        let buffer = FrameBuffer::filled(12, 8, ChannelOrder::Bgr, [10, 20, 30]);
        let frame = buffer.as_frame().unwrap();
        for record in analyzer(2, 3).analyze_frame(&frame).unwrap() {
            assert_eq!(record.contrast, 0.0);
            assert_eq!(record.dominant(), Rgb::new(30, 20, 10).normalized());
            assert_eq!(record.average_color(), Rgb::new(30, 20, 10).normalized());
        }
    }

    #[test]
    fn rejects_frames_smaller_than_the_grid() {
        let buffer = gradient(3, 10);
        let frame = buffer.as_frame().unwrap();
        let err = analyzer(2, 4).analyze_frame(&frame).unwrap_err();
        assert!(matches!(err, GridcastError::FrameSmallerThanGrid { .. }));
        assert!(analyzer(2, 4).analyze_frame_parallel(&frame).is_err());
    }
}
