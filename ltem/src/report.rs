//! Plain-text cluster report.
//!
//! One line per cluster: core points as `row,col` pairs joined by commas, a
//! colon, then the perimeter points in the same form. A line holding a
//! single `;` closes the report.

use std::io::{self, Write};

use crate::clustering::{Cluster, Point};

pub const REPORT_TERMINATOR: &str = ";";

fn write_points<W: Write>(writer: &mut W, points: &[Point]) -> io::Result<()> {
    for (i, point) in points.iter().enumerate() {
        if i > 0 {
            writer.write_all(b",")?;
        }
        write!(writer, "{}", point)?;
    }
    Ok(())
}

pub fn write_report<W: Write>(writer: &mut W, clusters: &[Cluster]) -> io::Result<()> {
    for cluster in clusters {
        write_points(writer, &cluster.core_points)?;
        writer.write_all(b":")?;
        write_points(writer, &cluster.perimeter_points)?;
        writer.write_all(b"\n")?;
    }
    writeln!(writer, "{}", REPORT_TERMINATOR)?;
    writer.flush()
}

/// Report of a failed request: no clusters, just the terminator.
pub fn write_empty_report<W: Write>(writer: &mut W) -> io::Result<()> {
    write_report(writer, &[])
}
