use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::field::grid::ScalarGrid;

/// Write data to CSV file with headers
pub fn write_csv<P: AsRef<Path>>(path: P, headers: &[&str], data: &[Vec<f64>]) -> io::Result<()> {
    if !headers.is_empty() && !data.is_empty() && headers.len() != data.len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "Headers count ({}) doesn't match data columns ({})",
                headers.len(),
                data.len()
            ),
        ));
    }

    let mut file = File::create(path)?;

    writeln!(file, "{}", headers.join(","))?;

    let n_rows = data.iter().map(|col| col.len()).max().unwrap_or(0);

    for i in 0..n_rows {
        let row: Vec<String> = data
            .iter()
            .map(|col| {
                if i < col.len() {
                    format!("{:.15e}", col[i])
                } else {
                    String::new()
                }
            })
            .collect();
        writeln!(file, "{}", row.join(","))?;
    }

    Ok(())
}

/// Write x-y data pairs
pub fn write_xy<P: AsRef<Path>>(
    path: P,
    x_header: &str,
    y_header: &str,
    x_data: &[f64],
    y_data: &[f64],
) -> io::Result<()> {
    if x_data.len() != y_data.len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "X and Y data lengths don't match ({} vs {})",
                x_data.len(),
                y_data.len()
            ),
        ));
    }
    write_csv(
        path,
        &[x_header, y_header],
        &[x_data.to_vec(), y_data.to_vec()],
    )
}

const AXIS_NAMES: [&str; 3] = ["x", "y", "z"];

/// Write the potential and field magnitude along one axis through a voxel.
///
/// Positions are the grid node coordinates in mm.
pub fn write_axis_profile<P: AsRef<Path>>(
    path: P,
    potential: &ScalarGrid,
    magnitude: &ScalarGrid,
    axis: usize,
    through: (usize, usize, usize),
) -> io::Result<()> {
    if axis > 2 || potential.grid != magnitude.grid {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Cannot profile axis {} across mismatched grids", axis),
        ));
    }
    let (i, j, k) = through;
    let [x, y, z] = potential.grid.coordinates();
    let coords = match axis {
        0 => x,
        1 => y,
        _ => z,
    };
    let position_header = format!("{}_mm", AXIS_NAMES[axis]);
    write_csv(
        path,
        &[&position_header, "potential_v", "field_v_per_m"],
        &[
            coords,
            potential.line(axis, i, j, k),
            magnitude.line(axis, i, j, k),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discretization::grid::VoxelGrid;
    use std::fs;

    #[test]
    fn test_write_csv() {
        let path = "test_output.csv";
        let headers = &["x", "y", "z"];
        let data = vec![
            vec![1.0, 2.0, 3.0],
            vec![4.0, 5.0, 6.0],
            vec![7.0, 8.0, 9.0],
        ];

        write_csv(path, headers, &data).unwrap();

        let content = fs::read_to_string(path).unwrap();
        assert!(content.contains("x,y,z"));

        fs::remove_file(path).ok();
    }

    #[test]
    fn test_write_axis_profile() {
        let path = "test_profile.csv";
        let grid = VoxelGrid::cube(3, 4.0).unwrap();
        let v = ScalarGrid::from_fn(grid, |_, j, _| j as f64);
        let m = ScalarGrid::zeros(grid);

        write_axis_profile(path, &v, &m, 1, (0, 0, 0)).unwrap();

        let content = fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "y_mm,potential_v,field_v_per_m");
        assert_eq!(lines.len(), 4);
        assert!(lines[3].starts_with("4.0"));

        assert!(write_axis_profile(path, &v, &m, 3, (0, 0, 0)).is_err());
        fs::remove_file(path).ok();
    }
}
