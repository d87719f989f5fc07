//! NumPy `.npy` export of feature arrays.

use std::path::Path;

use constants::dataset::FEATURES_PER_POINT;

use crate::resample::FeatureArray;

const MAGIC: &[u8] = b"\x93NUMPY";
/// Header (magic through newline) is padded to a multiple of this.
const HEADER_ALIGNMENT: usize = 64;

fn header(rows: usize, columns: usize) -> Vec<u8> {
    let dict = format!(
        "{{'descr': '<f4', 'fortran_order': False, 'shape': ({rows}, {columns}), }}"
    );
    // magic + version + u16 length + dict + newline
    let unpadded = MAGIC.len() + 2 + 2 + dict.len() + 1;
    let padding = (HEADER_ALIGNMENT - unpadded % HEADER_ALIGNMENT) % HEADER_ALIGNMENT;
    let header_len = dict.len() + padding + 1;

    let mut bytes = Vec::with_capacity(unpadded + padding);
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&[1, 0]);
    bytes.extend_from_slice(&(header_len as u16).to_le_bytes());
    bytes.extend_from_slice(dict.as_bytes());
    bytes.extend(std::iter::repeat_n(b' ', padding));
    bytes.push(b'\n');
    bytes
}

/// Write a little-endian f32 array of shape `(rows, 5)`, C order.
pub fn write_features_npy(path: &Path, features: &FeatureArray) -> std::io::Result<()> {
    let rows = features.rows.len();
    let mut bytes = header(rows, FEATURES_PER_POINT);
    bytes.reserve(rows * FEATURES_PER_POINT * 4);
    for row in &features.rows {
        for value in row {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
    }
    std::fs::write(path, bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_aligned_and_describes_shape() {
        let bytes = header(8192, 5);
        assert_eq!(bytes.len() % HEADER_ALIGNMENT, 0);
        assert_eq!(&bytes[..6], MAGIC);
        assert_eq!(bytes[6..8], [1, 0]);
        let len = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
        assert_eq!(len + 10, bytes.len());
        let text = std::str::from_utf8(&bytes[10..]).unwrap();
        assert!(text.contains("'shape': (8192, 5)"));
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn data_follows_header_row_major() {
        let features = FeatureArray {
            rows: vec![[1.0, 2.0, 3.0, 4.0, 5.0], [6.0, 7.0, 8.0, 9.0, 255.0]],
            centroid: [0.0; 3],
            scale: 1.0,
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("features.npy");
        write_features_npy(&path, &features).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        let data = &bytes[bytes.len() - 40..];
        assert_eq!(bytes.len() % 4, 0);
        let value = |i: usize| f32::from_le_bytes(data[4 * i..4 * i + 4].try_into().unwrap());
        assert_eq!(value(0), 1.0);
        assert_eq!(value(5), 6.0);
        assert_eq!(value(9), 255.0);
    }
}
