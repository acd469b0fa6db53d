use mandelfarm_core::Orientation;

use crate::error::ClusterError;

/// Coordinator-side output buffer, filled one row at a time.
///
/// Each row may be written once. The orientation is applied on write, so
/// [`ResultAssembler::cells`] is already in raster order.
#[derive(Debug)]
pub struct ResultAssembler {
    width: u32,
    rows: u32,
    orientation: Orientation,
    cells: Vec<u32>,
    written: Vec<bool>,
    filled: u32,
}

impl ResultAssembler {
    pub fn new(width: u32, rows: u32, orientation: Orientation) -> Self {
        Self {
            width,
            rows,
            orientation,
            cells: vec![0; width as usize * rows as usize],
            written: vec![false; rows as usize],
            filled: 0,
        }
    }

    /// Copy `values` for computation row `row` into the buffer.
    pub fn write_row(&mut self, row: u32, values: &[u32]) -> Result<(), ClusterError> {
        if row >= self.rows {
            return Err(ClusterError::RowOutOfRange {
                row,
                rows: self.rows,
            });
        }
        if values.len() != self.width as usize {
            return Err(ClusterError::MalformedRow {
                row,
                reason: format!("expected {} values, got {}", self.width, values.len()),
            });
        }
        let slot = &mut self.written[row as usize];
        if *slot {
            return Err(ClusterError::MalformedRow {
                row,
                reason: "row written twice".into(),
            });
        }
        *slot = true;

        let target = self.orientation.output_row(row, self.rows) as usize;
        let width = self.width as usize;
        self.cells[target * width..(target + 1) * width].copy_from_slice(values);
        self.filled += 1;
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.filled == self.rows
    }

    pub fn rows_written(&self) -> u32 {
        self.filled
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// Output buffer in raster order.
    pub fn cells(&self) -> &[u32] {
        &self.cells
    }

    /// Consume the assembler once every row has been written.
    pub fn finish(self) -> Result<Vec<u32>, ClusterError> {
        if !self.is_complete() {
            return Err(ClusterError::Incomplete {
                completed: self.filled,
                rows: self.rows,
            });
        }
        Ok(self.cells)
    }
}
