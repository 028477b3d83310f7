//! Plain-text views of a world snapshot, north at the top.

use drive_world_core::{Position, map::Grid};

/// The whole world inside a `+---+` border.
pub fn full_view(grid: &Grid<char>) -> String {
    let border = format!("+{}+\n", "-".repeat(grid.width()));
    let mut out = border.clone();
    for y in (0..grid.height()).rev() {
        out.push('|');
        out.extend(grid.row(y).unwrap_or_default());
        out.push_str("|\n");
    }
    out.push_str(&border);
    out
}

/// The square of cells within `radius` of `center`. Cells outside the world
/// are blank.
pub fn pov_view(grid: &Grid<char>, center: Position, radius: i32) -> String {
    let mut out = String::new();
    for y in (center.y - radius..=center.y + radius).rev() {
        for x in center.x - radius..=center.x + radius {
            out.push(*grid.get(Position::new(x, y)).unwrap_or(&' '));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> Grid<char> {
        Grid::from_generator(3, 2, |p| if p == Position::new(0, 1) { '@' } else { '.' })
    }

    #[test]
    fn full_view_puts_north_on_top() {
        assert_eq!(full_view(&grid()), "+---+\n|@..|\n|...|\n+---+\n");
    }

    #[test]
    fn pov_view_blanks_cells_outside_the_world() {
        assert_eq!(pov_view(&grid(), Position::new(0, 1), 1), "   \n @.\n ..\n");
    }
}
