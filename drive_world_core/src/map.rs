use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

use crate::Position;

/// Represents errors that can occur within the grid operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("Coordinates ({x}, {y}) are out of bounds for grid size ({width}, {height})")]
    OutOfBounds {
        x: i32,
        y: i32,
        width: usize,
        height: usize,
    },
}

/// A generic 2D grid structure.
///
/// Stores elements of type `T` in a flat vector using row-major order, row 0
/// being the southernmost row. Used for read-only snapshots of the world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid<T> {
    width: usize,
    height: usize,
    cells: Vec<T>,
}

impl<T> Grid<T> {
    /// Creates a new grid with the specified dimensions, filled by a generator function.
    ///
    /// The generator function `f` receives the position of each cell.
    pub fn from_generator<F>(width: usize, height: usize, mut f: F) -> Self
    where
        F: FnMut(Position) -> T,
    {
        let mut cells = Vec::with_capacity(width.saturating_mul(height));
        for y in 0..height {
            for x in 0..width {
                cells.push(f(Position::new(x as i32, y as i32)));
            }
        }
        Grid {
            width,
            height,
            cells,
        }
    }

    /// Returns the width of the grid.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the height of the grid.
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Converts a position to a flat vector index.
    ///
    /// Returns `None` if the position is out of bounds.
    #[inline]
    pub fn position_to_index(&self, pos: Position) -> Option<usize> {
        if self.is_valid(pos) {
            Some(pos.y as usize * self.width + pos.x as usize)
        } else {
            None
        }
    }

    /// Checks if the given position is within the grid boundaries.
    #[inline]
    pub fn is_valid(&self, pos: Position) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as usize) < self.width && (pos.y as usize) < self.height
    }

    /// Gets an immutable reference to the cell at the given position.
    pub fn get(&self, pos: Position) -> Option<&T> {
        self.position_to_index(pos).and_then(|i| self.cells.get(i))
    }

    /// Sets the value of the cell at the given position.
    ///
    /// Returns `Err(GridError::OutOfBounds)` if the position is invalid.
    pub fn set(&mut self, pos: Position, value: T) -> Result<(), GridError> {
        let index = self.position_to_index(pos).ok_or(GridError::OutOfBounds {
            x: pos.x,
            y: pos.y,
            width: self.width,
            height: self.height,
        })?;
        self.cells[index] = value;
        Ok(())
    }

    /// Returns the row with the given `y` coordinate.
    pub fn row(&self, y: usize) -> Option<&[T]> {
        if y < self.height {
            Some(&self.cells[y * self.width..(y + 1) * self.width])
        } else {
            None
        }
    }

    /// Returns an iterator that yields `(Position, &T)` for each cell.
    pub fn enumerate(&self) -> impl Iterator<Item = (Position, &T)> {
        let width = self.width;
        self.cells.iter().enumerate().map(move |(index, cell)| {
            let pos = Position::new((index % width) as i32, (index / width) as i32);
            (pos, cell)
        })
    }
}

impl<T> Index<Position> for Grid<T> {
    type Output = T;

    #[inline]
    fn index(&self, pos: Position) -> &Self::Output {
        match self.position_to_index(pos) {
            Some(idx) => &self.cells[idx],
            None => panic!(
                "Grid index {} out of bounds for grid size ({}, {})",
                pos, self.width, self.height
            ),
        }
    }
}

impl<T> IndexMut<Position> for Grid<T> {
    #[inline]
    fn index_mut(&mut self, pos: Position) -> &mut Self::Output {
        let (width, height) = (self.width, self.height);
        match self.position_to_index(pos) {
            Some(idx) => &mut self.cells[idx],
            None => panic!(
                "Grid index {} out of bounds for grid size ({}, {})",
                pos, width, height
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generator_sees_every_cell_once() {
        let grid = Grid::from_generator(3, 2, |p| p);
        assert_eq!(grid.enumerate().count(), 6);
        for (pos, value) in grid.enumerate() {
            assert_eq!(pos, *value);
        }
        assert_eq!(grid.row(1).map(|r| r.len()), Some(3));
        assert!(grid.row(2).is_none());
    }

    #[test]
    fn set_rejects_negative_and_overflowing_positions() {
        let mut grid = Grid::from_generator(2, 2, |_| '.');
        assert!(grid.set(Position::new(1, 1), '@').is_ok());
        assert_eq!(grid[Position::new(1, 1)], '@');
        assert_eq!(
            grid.set(Position::new(-1, 0), 'x'),
            Err(GridError::OutOfBounds {
                x: -1,
                y: 0,
                width: 2,
                height: 2
            })
        );
        assert!(grid.get(Position::new(2, 0)).is_none());
    }
}
