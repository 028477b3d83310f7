use std::fmt;

use serde::{Deserialize, Serialize};

pub mod agent;
pub mod config;
pub mod entity;
pub mod fusion;
pub mod map;
pub mod navigation;
pub mod population;
pub mod sensor;
pub mod simulation;
pub mod traffic_light;
pub mod world;

/// Represents a 2D coordinate. `y` grows towards the north.
///
/// Coordinates are signed so that a projected move past the edge of the
/// world can still be represented and rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Position { x, y }
    }

    /// Returns the manhattan distance (`|dx| + |dy|`) to `other`.
    pub fn distance_to(&self, other: &Position) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// Returns the position `steps` cells away along `heading`.
    ///
    /// Coordinates saturate at the `i32` range. No world reaches `i32::MAX`,
    /// so a saturated position is always out of bounds.
    pub fn stepped(&self, heading: Heading, steps: u32) -> Position {
        let (dx, dy) = heading.delta();
        let axis = |from: i32, delta: i32| {
            let to = i64::from(from) + i64::from(delta) * i64::from(steps);
            to.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
        };
        Position {
            x: axis(self.x, dx),
            y: axis(self.y, dy),
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

/// One of the four cardinal directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Heading {
    North,
    East,
    South,
    West,
}

impl Heading {
    pub const ALL: [Heading; 4] = [Heading::North, Heading::East, Heading::South, Heading::West];

    /// Unit step for this heading. North is `+y`.
    #[inline]
    pub fn delta(self) -> (i32, i32) {
        match self {
            Heading::North => (0, 1),
            Heading::East => (1, 0),
            Heading::South => (0, -1),
            Heading::West => (-1, 0),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Heading::North => "N",
            Heading::East => "E",
            Heading::South => "S",
            Heading::West => "W",
        }
    }
}

impl fmt::Display for Heading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stepping_follows_heading() {
        let origin = Position::new(3, 3);
        assert_eq!(origin.stepped(Heading::North, 2), Position::new(3, 5));
        assert_eq!(origin.stepped(Heading::East, 1), Position::new(4, 3));
        assert_eq!(origin.stepped(Heading::South, 2), Position::new(3, 1));
        assert_eq!(origin.stepped(Heading::West, 4), Position::new(-1, 3));
    }

    #[test]
    fn stepping_saturates_instead_of_wrapping() {
        let origin = Position::new(5, 5);
        assert_eq!(origin.stepped(Heading::East, u32::MAX), Position::new(i32::MAX, 5));
        assert_eq!(origin.stepped(Heading::West, u32::MAX), Position::new(i32::MIN, 5));
        assert_eq!(
            origin.stepped(Heading::North, i32::MAX as u32),
            Position::new(5, i32::MAX)
        );
    }

    #[test]
    fn distance_counts_both_axes() {
        let a = Position::new(0, 0);
        let b = Position::new(-3, 4);
        assert_eq!(a.distance_to(&b), 7);
        assert_eq!(a.distance_to(&a), 0);
    }
}
