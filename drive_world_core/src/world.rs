use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    Position,
    entity::{Entity, EntityId, EntityKind, IdAllocator, Observable},
    map::{Grid, GridError},
};

/// Size of the world. Valid cells are `0..width` by `0..height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub width: u32,
    pub height: u32,
}

impl Bounds {
    pub const fn new(width: u32, height: u32) -> Self {
        Bounds { width, height }
    }

    #[inline]
    pub fn contains(&self, pos: Position) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.width && (pos.y as u32) < self.height
    }
}

/// Owns every non-agent entity on the road.
///
/// Entities are keyed by id so iteration order (and therefore the order in
/// which random noise is drawn for them) is stable across runs.
#[derive(Debug, Clone)]
pub struct GridWorld {
    bounds: Bounds,
    entities: BTreeMap<EntityId, Entity>,
    ids: IdAllocator,
}

impl GridWorld {
    /// Creates a new, empty world.
    pub fn new(width: u32, height: u32) -> Self {
        GridWorld {
            bounds: Bounds::new(width, height),
            entities: BTreeMap::new(),
            ids: IdAllocator::new(),
        }
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn width(&self) -> u32 {
        self.bounds.width
    }

    pub fn height(&self) -> u32 {
        self.bounds.height
    }

    /// Reserves the next id for an entity of the given kind.
    pub fn allocate_id(&mut self, kind: EntityKind) -> EntityId {
        self.ids.allocate(kind)
    }

    /// Inserts an entity. Entities placed outside the world are rejected.
    pub fn add_entity(&mut self, entity: Entity) -> Result<EntityId, GridError> {
        let pos = entity.position();
        if !self.in_bounds(pos) {
            return Err(GridError::OutOfBounds {
                x: pos.x,
                y: pos.y,
                width: self.bounds.width as usize,
                height: self.bounds.height as usize,
            });
        }
        let id = entity.id();
        debug!("Added {} at {}", id, pos);
        self.entities.insert(id, entity);
        Ok(id)
    }

    /// Removes an entity, returning it if it was present.
    pub fn remove_entity(&mut self, id: EntityId) -> Option<Entity> {
        self.entities.remove(&id)
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Returns the entity occupying `pos`, if any.
    pub fn entity_at(&self, pos: Position) -> Option<&Entity> {
        self.entities.values().find(|e| e.position() == pos)
    }

    pub fn is_occupied(&self, pos: Position) -> bool {
        self.entity_at(pos).is_some()
    }

    #[inline]
    pub fn in_bounds(&self, pos: Position) -> bool {
        self.bounds.contains(pos)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Advances every entity's timer by one tick.
    pub fn tick(&mut self) {
        for entity in self.entities.values_mut() {
            entity.tick();
        }
    }

    /// Moves every mover along its heading and drops those that would leave
    /// the world. Returns the ids of the dropped entities.
    pub fn move_entities(&mut self) -> Vec<EntityId> {
        let bounds = self.bounds;
        let mut exited = Vec::new();
        for entity in self.entities.values_mut() {
            if !entity.advance(bounds) {
                exited.push(entity.id());
            }
        }
        for id in &exited {
            self.entities.remove(id);
            debug!("Removed {}: drove out of the world", id);
        }
        exited
    }

    /// Glyph map of the world with `agent` drawn on top. Empty cells are `.`.
    pub fn snapshot(&self, agent: &impl Observable) -> Grid<char> {
        let mut grid = Grid::from_generator(
            self.bounds.width as usize,
            self.bounds.height as usize,
            |_| '.',
        );
        for entity in self.entities.values() {
            // Cells cannot be out of bounds here; add_entity and
            // move_entities keep every stored position inside the world.
            let _ = grid.set(entity.position(), entity.glyph());
        }
        let _ = grid.set(agent.position(), agent.glyph());
        grid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Heading;

    fn world_with_bike(pos: Position, heading: Heading) -> (GridWorld, EntityId) {
        let mut world = GridWorld::new(5, 5);
        let id = world.allocate_id(EntityKind::Bike);
        world
            .add_entity(Entity::mover(id, pos, heading, 1))
            .unwrap();
        (world, id)
    }

    #[test]
    fn bounds_reject_negative_and_edge_cells() {
        let world = GridWorld::new(3, 2);
        assert!(world.in_bounds(Position::new(0, 0)));
        assert!(world.in_bounds(Position::new(2, 1)));
        assert!(!world.in_bounds(Position::new(3, 1)));
        assert!(!world.in_bounds(Position::new(0, 2)));
        assert!(!world.in_bounds(Position::new(-1, 0)));
    }

    #[test]
    fn add_query_remove() {
        let (mut world, id) = world_with_bike(Position::new(2, 2), Heading::North);
        assert_eq!(world.entity_at(Position::new(2, 2)).map(|e| e.id()), Some(id));
        assert!(world.entity_at(Position::new(1, 1)).is_none());
        assert!(world.remove_entity(id).is_some());
        assert!(world.remove_entity(id).is_none());
        assert!(world.is_empty());
    }

    #[test]
    fn add_rejects_out_of_bounds_entity() {
        let mut world = GridWorld::new(2, 2);
        let id = world.allocate_id(EntityKind::ParkedCar);
        let err = world
            .add_entity(Entity::parked_car(id, Position::new(5, 0)))
            .unwrap_err();
        assert!(matches!(err, GridError::OutOfBounds { x: 5, y: 0, .. }));
    }

    #[test]
    fn movers_leaving_the_world_are_removed() {
        let (mut world, id) = world_with_bike(Position::new(4, 4), Heading::East);
        let removed = world.move_entities();
        assert_eq!(removed, vec![id]);
        assert_eq!(world.entities().count(), 0);
    }

    #[test]
    fn movers_with_unbounded_speed_are_removed() {
        let mut world = GridWorld::new(10, 10);
        let fast = world.allocate_id(EntityKind::OtherCar);
        let faster = world.allocate_id(EntityKind::Bike);
        world
            .add_entity(Entity::mover(fast, Position::new(5, 5), Heading::East, i32::MAX as u32))
            .unwrap();
        world
            .add_entity(Entity::mover(faster, Position::new(5, 6), Heading::West, u32::MAX))
            .unwrap();
        let mut removed = world.move_entities();
        removed.sort();
        let mut expected = vec![fast, faster];
        expected.sort();
        assert_eq!(removed, expected);
        assert!(world.is_empty());
    }

    #[test]
    fn movers_inside_the_world_advance() {
        let (mut world, id) = world_with_bike(Position::new(1, 1), Heading::North);
        assert!(world.move_entities().is_empty());
        assert_eq!(world.entity(id).map(|e| e.position()), Some(Position::new(1, 2)));
    }
}
