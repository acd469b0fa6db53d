//! Binary PPM (`P6`) output.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use tracing::info;

use crate::error::ClusterError;

/// Map an escape count to an RGB triple.
///
/// With `v = count / max_iter`, each channel is `-(floor(v * scale) mod 256)`
/// in 8-bit arithmetic, using scales `2^8` (red), `2^24` (green) and
/// `2^16` (blue).
pub fn colour(count: u32, max_iter: u32) -> [u8; 3] {
    let v = f64::from(count) / f64::from(max_iter);
    let channel = |scale: f64| ((v * scale) as u64 & 0xFF) as u8;
    [
        channel(256.0).wrapping_neg(),
        channel(16_777_216.0).wrapping_neg(),
        channel(65_536.0).wrapping_neg(),
    ]
}

/// Write `cells` (raster order, `width * height` values) as a P6 image.
pub fn write_ppm<W: Write>(
    out: &mut W,
    width: u32,
    height: u32,
    cells: &[u32],
    max_iter: u32,
) -> io::Result<()> {
    if cells.len() != width as usize * height as usize {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "{} cells do not fill a {width}x{height} image",
                cells.len()
            ),
        ));
    }
    write!(out, "P6\n{width} {height}\n255\n")?;
    for &count in cells {
        out.write_all(&colour(count, max_iter))?;
    }
    out.flush()
}

/// Write the image to `path`, replacing any existing file.
pub fn save_ppm(
    path: &Path,
    width: u32,
    height: u32,
    cells: &[u32],
    max_iter: u32,
) -> Result<(), ClusterError> {
    let mut out = BufWriter::new(File::create(path)?);
    write_ppm(&mut out, width, height, cells, max_iter)?;
    info!(path = %path.display(), width, height, "image written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converged_and_zero_counts_are_black() {
        assert_eq!(colour(0, 100), [0, 0, 0]);
        assert_eq!(colour(100, 100), [0, 0, 0]);
    }

    #[test]
    fn channels_use_their_own_scale() {
        // v = 1/4: red 64, green and blue wrap to 0.
        assert_eq!(colour(1, 4), [192, 0, 0]);
        // v = 1/512: red floors to 0, blue is 128.
        assert_eq!(colour(1, 512), [0, 0, 128]);
    }

    #[test]
    fn header_and_payload() {
        let mut buf = Vec::new();
        write_ppm(&mut buf, 2, 1, &[0, 1], 4).unwrap();
        let header = b"P6\n2 1\n255\n";
        assert_eq!(&buf[..header.len()], header);
        assert_eq!(&buf[header.len()..], &[0, 0, 0, 192, 0, 0]);
    }

    #[test]
    fn size_mismatch_is_rejected() {
        let mut buf = Vec::new();
        assert!(write_ppm(&mut buf, 2, 2, &[0, 1, 2], 4).is_err());
    }
}
