//! LAS/LAZ and ASCII point I/O for raw and labelled scans.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use constants::dataset::INTENSITY_PLACEHOLDER;
use las::{Builder, Reader, Writer};
use nalgebra::Point3;

use crate::acquisition::RawScanPoint;
use crate::error::AcquisitionError;

/// Create LAS file reader for point cloud access.
/// Handles both .las and .laz compressed formats.
pub fn create_reader(file_path: &Path) -> Result<Reader, AcquisitionError> {
    let file = File::open(file_path)?;
    let buf_reader = BufReader::new(file);
    Ok(Reader::new(buf_reader)?)
}

/// Read every return of one leg from a LAS/LAZ file.
pub fn read_las_points(path: &Path, leg: usize) -> Result<Vec<RawScanPoint>, AcquisitionError> {
    let mut reader = create_reader(path)?;
    let total = reader.header().number_of_points() as usize;
    let mut points = Vec::with_capacity(total);
    for point in reader.points() {
        let point = point?;
        points.push(RawScanPoint {
            position: Point3::new(point.x, point.y, point.z),
            intensity: f32::from(point.intensity),
            leg: leg as u8,
        });
    }
    Ok(points)
}

/// Read whitespace separated `x y z [intensity ...]` records.
pub fn read_xyz_points(path: &Path, leg: usize) -> Result<Vec<RawScanPoint>, AcquisitionError> {
    let reader = BufReader::new(File::open(path)?);
    let mut points = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
            continue;
        }
        let parse_error = |message: String| AcquisitionError::Parse {
            path: path.to_path_buf(),
            line: index + 1,
            message,
        };
        let columns: Vec<f64> = line
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<f64>().map_err(|e| parse_error(format!("{s}: {e}"))))
            .collect::<Result<_, _>>()?;
        if columns.len() < 3 {
            return Err(parse_error(format!(
                "expected at least 3 columns, found {}",
                columns.len()
            )));
        }
        points.push(RawScanPoint {
            position: Point3::new(columns[0], columns[1], columns[2]),
            intensity: columns
                .get(3)
                .map(|v| *v as f32)
                .unwrap_or(INTENSITY_PLACEHOLDER),
            leg: leg as u8,
        });
    }
    Ok(points)
}

/// Read points from LAS, LAZ or ASCII depending on the extension.
pub fn read_points(path: &Path, leg: usize) -> Result<Vec<RawScanPoint>, AcquisitionError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("las") | Some("laz") => read_las_points(path, leg),
        _ => read_xyz_points(path, leg),
    }
}

/// Write positions as whitespace separated `x y z` lines, readable by
/// `read_xyz_points`.
pub fn write_xyz_positions<'a>(
    path: &Path,
    positions: impl IntoIterator<Item = &'a Point3<f64>>,
) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for p in positions {
        writeln!(writer, "{} {} {}", p.x, p.y, p.z)?;
    }
    writer.flush()
}

/// Write points to a LAS 1.4 file. The label goes to `user_data`, the leg to
/// `point_source_id`.
pub fn write_las<'a>(
    path: &Path,
    points: impl IntoIterator<Item = (&'a RawScanPoint, u8)>,
) -> Result<(), las::Error> {
    let header = Builder::from((1, 4)).into_header()?;
    let mut writer = Writer::from_path(path, header)?;
    for (point, label) in points {
        writer.write_point(las::Point {
            x: point.position.x,
            y: point.position.y,
            z: point.position.z,
            intensity: point.intensity.clamp(0.0, u16::MAX as f32) as u16,
            user_data: label,
            point_source_id: u16::from(point.leg),
            ..Default::default()
        })?;
    }
    writer.close()
}
