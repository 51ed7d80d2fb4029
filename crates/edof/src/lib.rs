//! EDOF: reader for the proprietary depth-map marker some wide-aperture
//! cameras embed inside their JPEG output.
//!
//! The marker carries a coarse grid of single-byte depth samples alongside
//! the visual image. This crate only locates and decodes that marker; the
//! surrounding JPEG streams are left to a real image decoder.
//!
//! Marker layout (byte offsets relative to the token position):
//!   +00 : [u8;6]  token = 00 "edof" 00
//!   +12 : u8      orientation code
//!   +21 : u16 LE  columns
//!   +23 : u16 LE  rows
//!   +73 : rows*columns u8 depth samples, bottom row first
//!
//! Orientation codes:
//!   0x10 => rotate 180
//!   0x11 => rotate 90 counter-clockwise
//!   0x13 => rotate 90 clockwise
//!   anything else => no rotation

use std::io::{self, ErrorKind};
use std::path::Path;

/// Six-byte token that introduces the depth marker inside the JPEG stream.
pub const EDOF_TOKEN: [u8; 6] = *b"\x00edof\x00";

/// JPEG start-of-image byte pair.
pub const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];

const ORIENTATION_OFFSET: usize = 12;
const COLUMNS_OFFSET: usize = 21;
const ROWS_OFFSET: usize = 23;
const SAMPLES_OFFSET: usize = 73;

/// Rotation needed to align the decoded grid with the photo's visual
/// orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Unrotated,
    Rotate180,
    Rotate90Ccw,
    Rotate90Cw,
}

impl Orientation {
    /// Map the raw orientation byte. Unknown codes mean "no rotation".
    pub fn from_code(code: u8) -> Self {
        match code {
            0x10 => Orientation::Rotate180,
            0x11 => Orientation::Rotate90Ccw,
            0x13 => Orientation::Rotate90Cw,
            _ => Orientation::Unrotated,
        }
    }
}

/// A decoded depth grid, row-major with row 0 at the visual top, already
/// orientation-corrected.
#[derive(Debug, Clone)]
pub struct DepthMap {
    pub rows: usize,
    pub columns: usize,
    pub orientation: Orientation,
    samples: Vec<u8>,
}

impl DepthMap {
    #[inline]
    pub fn get(&self, row: usize, column: usize) -> u8 {
        self.samples[row * self.columns + column]
    }

    #[inline]
    pub fn samples(&self) -> &[u8] {
        &self.samples
    }

    /// Rotate the grid by 180 degrees. Shape is unchanged.
    pub fn rotate180(mut self) -> Self {
        self.samples.reverse();
        self
    }

    /// Rotate the grid 90 degrees counter-clockwise. Rows and columns swap.
    pub fn rotate90_ccw(self) -> Self {
        let (rows, columns) = (self.rows, self.columns);
        let mut samples = Vec::with_capacity(self.samples.len());

        for i in 0..columns {
            for j in 0..rows {
                samples.push(self.samples[j * columns + (columns - 1 - i)]);
            }
        }

        Self {
            rows: columns,
            columns: rows,
            samples,
            ..self
        }
    }

    /// Rotate the grid 90 degrees clockwise. Rows and columns swap.
    pub fn rotate90_cw(self) -> Self {
        let (rows, columns) = (self.rows, self.columns);
        let mut samples = Vec::with_capacity(self.samples.len());

        for i in 0..columns {
            for j in 0..rows {
                samples.push(self.samples[(rows - 1 - j) * columns + i]);
            }
        }

        Self {
            rows: columns,
            columns: rows,
            samples,
            ..self
        }
    }

    fn apply(self, orientation: Orientation) -> Self {
        match orientation {
            Orientation::Unrotated => self,
            Orientation::Rotate180 => self.rotate180(),
            Orientation::Rotate90Ccw => self.rotate90_ccw(),
            Orientation::Rotate90Cw => self.rotate90_cw(),
        }
    }
}

#[inline(always)]
fn need(buf: &[u8], want: usize) -> io::Result<()> {
    if buf.len() < want {
        Err(io::Error::new(
            ErrorKind::UnexpectedEof,
            "truncated EDOF marker",
        ))
    } else {
        Ok(())
    }
}

#[inline(always)]
fn le_u16_at(buf: &[u8], at: usize) -> io::Result<u16> {
    need(buf, at + 2)?;
    Ok(u16::from_le_bytes([buf[at], buf[at + 1]]))
}

#[cold]
fn bad(msg: &str) -> io::Error {
    io::Error::new(ErrorKind::InvalidData, msg)
}

/// Find the first occurrence of `token` in `data`.
fn find_token(data: &[u8], token: &[u8]) -> Option<usize> {
    data.windows(token.len()).position(|w| w == token)
}

/// Parse the EDOF depth marker out of raw JPEG bytes. This is the single
/// source of truth for parsing.
///
/// The grid is stored bottom-to-top in the file; rows are flipped on load so
/// row 0 ends up at the visual top, then the orientation correction is
/// applied once.
pub fn parse_edof_bytes(data: &[u8]) -> io::Result<DepthMap> {
    if data.len() < 3 || data[..3] != [0xFF, 0xD8, 0xFF] {
        return Err(bad("not a JPEG"));
    }

    let idx = match find_token(data, &EDOF_TOKEN) {
        Some(i) if i > 0 => i,
        _ => return Err(bad("no EDOF marker")),
    };

    need(data, idx + ORIENTATION_OFFSET + 1)?;
    let orientation = Orientation::from_code(data[idx + ORIENTATION_OFFSET]);

    let columns = le_u16_at(data, idx + COLUMNS_OFFSET)? as usize;
    let rows = le_u16_at(data, idx + ROWS_OFFSET)? as usize;
    if rows == 0 || columns == 0 {
        return Err(bad("empty depth grid"));
    }

    let count = rows
        .checked_mul(columns)
        .ok_or_else(|| bad("depth grid size overflow"))?;
    let base = idx + SAMPLES_OFFSET;
    need(data, base + count)?;

    // File order is bottom row first; flip so row 0 is the visual top.
    let mut samples = Vec::with_capacity(count);
    for row in (0..rows).rev() {
        let off = base + row * columns;
        samples.extend_from_slice(&data[off..off + columns]);
    }

    let map = DepthMap {
        rows,
        columns,
        orientation,
        samples,
    };

    Ok(map.apply(orientation))
}

/// Byte offsets of every JPEG start-of-image pair after position zero.
///
/// Offset zero is the primary image itself, so the scan starts at one; the
/// caller decides which candidates actually decode.
pub fn jpeg_soi_offsets(data: &[u8]) -> impl Iterator<Item = usize> + '_ {
    data.windows(2)
        .enumerate()
        .skip(1)
        .filter_map(|(i, w)| (w == JPEG_SOI).then_some(i))
}

/// Read a whole file and parse the depth marker from it.
pub fn read_file<P: AsRef<Path>>(path: P) -> io::Result<DepthMap> {
    let bytes = std::fs::read(path)?;
    parse_edof_bytes(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a minimal JPEG-looking buffer with an EDOF marker at a fixed
    /// position. `samples` is in file order (bottom row first).
    fn marker_buf(orientation: u8, columns: u16, rows: u16, samples: &[u8]) -> Vec<u8> {
        let idx = 16usize;
        let mut buf = vec![0u8; idx + SAMPLES_OFFSET + samples.len()];
        buf[..3].copy_from_slice(&[0xFF, 0xD8, 0xFF]);
        buf[idx..idx + 6].copy_from_slice(&EDOF_TOKEN);
        buf[idx + ORIENTATION_OFFSET] = orientation;
        buf[idx + COLUMNS_OFFSET..idx + COLUMNS_OFFSET + 2]
            .copy_from_slice(&columns.to_le_bytes());
        buf[idx + ROWS_OFFSET..idx + ROWS_OFFSET + 2].copy_from_slice(&rows.to_le_bytes());
        buf[idx + SAMPLES_OFFSET..].copy_from_slice(samples);
        buf
    }

    #[test]
    fn rejects_non_jpeg() {
        let err = parse_edof_bytes(b"PNG\x0d\x0a").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
        assert_eq!(err.to_string(), "not a JPEG");
    }

    #[test]
    fn rejects_missing_marker() {
        let err = parse_edof_bytes(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
        assert_eq!(err.to_string(), "no EDOF marker");
    }

    #[test]
    fn rejects_truncated_samples() {
        let mut buf = marker_buf(0x00, 3, 2, &[0; 6]);
        buf.truncate(buf.len() - 1);
        let err = parse_edof_bytes(&buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedEof);
    }

    #[test]
    fn decodes_grid_with_rows_flipped() {
        // File order: bottom row [1,2,3], top row [4,5,6].
        let buf = marker_buf(0x00, 3, 2, &[1, 2, 3, 4, 5, 6]);
        let map = parse_edof_bytes(&buf).unwrap();

        assert_eq!((map.rows, map.columns), (2, 3));
        assert_eq!(map.orientation, Orientation::Unrotated);
        assert_eq!(map.samples(), &[4, 5, 6, 1, 2, 3]);
    }

    #[test]
    fn unknown_orientation_code_means_unrotated() {
        let buf = marker_buf(0x42, 2, 2, &[0; 4]);
        let map = parse_edof_bytes(&buf).unwrap();
        assert_eq!(map.orientation, Orientation::Unrotated);
    }

    #[test]
    fn rotations_round_trip() {
        let buf = marker_buf(0x00, 3, 2, &[1, 2, 3, 4, 5, 6]);
        let map = parse_edof_bytes(&buf).unwrap();
        let flat = map.samples().to_vec();

        let back = map.clone().rotate180().rotate180();
        assert_eq!(back.samples(), &flat[..]);

        let back = map.clone().rotate90_ccw().rotate90_cw();
        assert_eq!((back.rows, back.columns), (2, 3));
        assert_eq!(back.samples(), &flat[..]);

        let back = map.clone().rotate90_cw().rotate90_ccw();
        assert_eq!(back.samples(), &flat[..]);
    }

    #[test]
    fn orientation_codes_apply_matching_rotation() {
        let file_order = [1u8, 2, 3, 4, 5, 6];
        let plain = parse_edof_bytes(&marker_buf(0x00, 3, 2, &file_order)).unwrap();

        let rotated = parse_edof_bytes(&marker_buf(0x10, 3, 2, &file_order)).unwrap();
        assert_eq!(rotated.samples(), plain.clone().rotate180().samples());

        let rotated = parse_edof_bytes(&marker_buf(0x11, 3, 2, &file_order)).unwrap();
        assert_eq!((rotated.rows, rotated.columns), (3, 2));
        assert_eq!(rotated.samples(), plain.clone().rotate90_ccw().samples());

        let rotated = parse_edof_bytes(&marker_buf(0x13, 3, 2, &file_order)).unwrap();
        assert_eq!(rotated.samples(), plain.clone().rotate90_cw().samples());
    }

    #[test]
    fn rotate90_ccw_moves_last_column_to_first_row() {
        let buf = marker_buf(0x00, 3, 2, &[4, 5, 6, 1, 2, 3]);
        // Flipped on load: [[1,2,3],[4,5,6]].
        let map = parse_edof_bytes(&buf).unwrap().rotate90_ccw();
        assert_eq!((map.rows, map.columns), (3, 2));
        assert_eq!(map.samples(), &[3, 6, 2, 5, 1, 4]);
    }

    #[test]
    fn soi_offsets_skip_position_zero() {
        let data = [0xFF, 0xD8, 0x00, 0xFF, 0xD8, 0xFF, 0xFF, 0xD8];
        let offsets: Vec<usize> = jpeg_soi_offsets(&data).collect();
        assert_eq!(offsets, vec![3, 6]);
    }
}
