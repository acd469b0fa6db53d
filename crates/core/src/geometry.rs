use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FarmError;

/// Left edge of the rendered window on the real axis.
pub const REAL_MIN: f64 = -2.0;

/// Width of the rendered window on the real axis.
pub const REAL_SPAN: f64 = 3.0;

/// Bottom edge of the rendered window on the imaginary axis.
pub const IMAG_MIN: f64 = -1.125;

/// Height of the rendered window on the imaginary axis.
pub const IMAG_SPAN: f64 = 2.25;

/// Immutable description of one computation: `width x height` pixels and
/// an iteration budget per pixel.
///
/// Constructed through [`Geometry::new`], which rejects grids the affine
/// mapping cannot handle. Every participant of a run must hold the same
/// value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Geometry {
    width: u32,
    height: u32,
    max_iter: u32,
}

impl Geometry {
    /// Validate and build a geometry. Requires `width >= 2`, `height >= 2`
    /// and `max_iter >= 1`.
    pub fn new(width: u32, height: u32, max_iter: u32) -> Result<Self, FarmError> {
        if width < 2 {
            return Err(FarmError::InvalidGeometry(format!(
                "width must be at least 2, got {width}"
            )));
        }
        if height < 2 {
            return Err(FarmError::InvalidGeometry(format!(
                "height must be at least 2, got {height}"
            )));
        }
        if max_iter < 1 {
            return Err(FarmError::InvalidGeometry(
                "max_iter must be at least 1".into(),
            ));
        }
        Ok(Self {
            width,
            height,
            max_iter,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn max_iter(&self) -> u32 {
        self.max_iter
    }

    /// Number of cells in the output buffer.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Real-axis step between adjacent columns.
    pub fn scale_x(&self) -> f64 {
        REAL_SPAN / f64::from(self.width - 1)
    }

    /// Imaginary-axis step between adjacent rows.
    pub fn scale_y(&self) -> f64 {
        IMAG_SPAN / f64::from(self.height - 1)
    }

    /// Map pixel `(column, row)` to its point `c = (re, im)` on the complex plane.
    pub fn point(&self, column: u32, row: u32) -> (f64, f64) {
        (
            REAL_MIN + f64::from(column) * self.scale_x(),
            IMAG_MIN + f64::from(row) * self.scale_y(),
        )
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} (K={})", self.width, self.height, self.max_iter)
    }
}

/// Where row 0 of the computation lands in the output buffer.
///
/// The complex plane grows upward while raster images grow downward, so
/// the default stores row `r` at output row `H - 1 - r`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    #[default]
    BottomUp,
    TopDown,
}

impl Orientation {
    /// Output row index for computation row `row` in a grid of `height` rows.
    pub fn output_row(self, row: u32, height: u32) -> u32 {
        match self {
            Self::BottomUp => height - 1 - row,
            Self::TopDown => row,
        }
    }
}

impl FromStr for Orientation {
    type Err = FarmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "bottom_up" => Ok(Self::BottomUp),
            "top_down" => Ok(Self::TopDown),
            other => Err(FarmError::Config(format!(
                "unknown orientation '{other}', expected 'bottom_up' or 'top_down'"
            ))),
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BottomUp => f.write_str("bottom_up"),
            Self::TopDown => f.write_str("top_down"),
        }
    }
}
