use crate::Grid;

/// Parses an ASCII picture into a boolean grid: `#` is `true`, `.` is `false`.
/// Whitespace around rows is ignored; all rows must have the same length.
pub fn mask_from_ascii(picture: &str) -> Grid<bool> {
    let rows: Vec<Vec<bool>> = picture
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            line.chars()
                .map(|c| match c {
                    '#' => true,
                    '.' => false,
                    other => panic!("unexpected mask character {:?}", other),
                })
                .collect()
        })
        .collect();

    let cols = rows.first().map_or(0, Vec::len);
    assert!(
        rows.iter().all(|row| row.len() == cols),
        "all mask rows must have the same length"
    );
    Grid::new(rows.len(), cols, rows.into_iter().flatten().collect())
}
