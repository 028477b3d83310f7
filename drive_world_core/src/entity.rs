use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

use crate::{
    Heading, Position,
    traffic_light::{LightColor, TrafficLight},
    world::Bounds,
};

/// Closed set of things that can exist on the road.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    ParkedCar,
    StopSign,
    TrafficLight,
    Bike,
    OtherCar,
    SelfDrivingCar,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::ParkedCar => "ParkedCar",
            EntityKind::StopSign => "StopSign",
            EntityKind::TrafficLight => "TrafficLight",
            EntityKind::Bike => "Bike",
            EntityKind::OtherCar => "Car",
            EntityKind::SelfDrivingCar => "SelfDrivingCar",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of an entity, rendered as `"<kind>:<number>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId {
    pub kind: EntityKind,
    pub number: u32,
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.number)
    }
}

/// Hands out sequential per-kind numbers, starting at 1.
#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    last: BTreeMap<EntityKind, u32>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, kind: EntityKind) -> EntityId {
        let counter = self.last.entry(kind).or_insert(0);
        *counter += 1;
        EntityId {
            kind,
            number: *counter,
        }
    }
}

/// Read-only view shared by everything a sensor or a renderer can look at.
///
/// Defaults describe a featureless, stationary object.
pub trait Observable {
    fn id(&self) -> EntityId;
    fn position(&self) -> Position;
    fn glyph(&self) -> char;

    fn kind(&self) -> EntityKind {
        self.id().kind
    }
    fn speed(&self) -> u32 {
        0
    }
    fn heading(&self) -> Option<Heading> {
        None
    }
    fn sign_text(&self) -> Option<&str> {
        None
    }
    fn traffic_light(&self) -> Option<LightColor> {
        None
    }
}

/// Fixed heading and speed of a non-agent road user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Motion {
    pub speed: u32,
    pub heading: Option<Heading>,
}

/// Type-specific state of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Body {
    Static {
        sign_text: Option<String>,
        light: Option<TrafficLight>,
    },
    Moving(Motion),
}

/// A non-agent entity living in the world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    id: EntityId,
    position: Position,
    body: Body,
}

impl Entity {
    pub fn new(id: EntityId, position: Position, body: Body) -> Self {
        Entity { id, position, body }
    }

    pub fn parked_car(id: EntityId, position: Position) -> Self {
        Self::new(
            id,
            position,
            Body::Static {
                sign_text: None,
                light: None,
            },
        )
    }

    pub fn stop_sign(id: EntityId, position: Position) -> Self {
        Self::new(
            id,
            position,
            Body::Static {
                sign_text: Some("STOP".to_string()),
                light: None,
            },
        )
    }

    pub fn signal(id: EntityId, position: Position, light: TrafficLight) -> Self {
        Self::new(
            id,
            position,
            Body::Static {
                sign_text: None,
                light: Some(light),
            },
        )
    }

    /// A bike or other car cruising along `heading` at `speed` cells per tick.
    pub fn mover(id: EntityId, position: Position, heading: Heading, speed: u32) -> Self {
        Self::new(
            id,
            position,
            Body::Moving(Motion {
                speed,
                heading: Some(heading),
            }),
        )
    }

    pub fn is_mover(&self) -> bool {
        matches!(self.body, Body::Moving(_))
    }

    /// Advances the internal timer. Only traffic lights respond.
    pub fn tick(&mut self) {
        if let Body::Static {
            light: Some(light), ..
        } = &mut self.body
        {
            light.tick();
        }
    }

    /// Where this entity would be after one move, if it moves at all.
    pub fn projected_position(&self) -> Option<Position> {
        match self.body {
            Body::Moving(Motion {
                speed,
                heading: Some(heading),
            }) if speed > 0 => Some(self.position.stepped(heading, speed)),
            _ => None,
        }
    }

    /// Moves one step along the fixed heading.
    ///
    /// Returns `false` and leaves the entity in place if the destination is
    /// outside `bounds`. Entities that do not move always succeed.
    pub fn advance(&mut self, bounds: Bounds) -> bool {
        match self.projected_position() {
            Some(next) if bounds.contains(next) => {
                self.position = next;
                true
            }
            Some(_) => false,
            None => true,
        }
    }
}

impl Observable for Entity {
    fn id(&self) -> EntityId {
        self.id
    }

    fn position(&self) -> Position {
        self.position
    }

    fn glyph(&self) -> char {
        match self.id.kind {
            EntityKind::ParkedCar => 'P',
            EntityKind::StopSign => 'S',
            EntityKind::TrafficLight => self.traffic_light().map_or('?', LightColor::glyph),
            EntityKind::Bike => 'B',
            EntityKind::OtherCar => 'C',
            EntityKind::SelfDrivingCar => '@',
        }
    }

    fn speed(&self) -> u32 {
        match self.body {
            Body::Moving(motion) => motion.speed,
            Body::Static { .. } => 0,
        }
    }

    fn heading(&self) -> Option<Heading> {
        match self.body {
            Body::Moving(motion) => motion.heading,
            Body::Static { .. } => None,
        }
    }

    fn sign_text(&self) -> Option<&str> {
        match &self.body {
            Body::Static { sign_text, .. } => sign_text.as_deref(),
            Body::Moving(_) => None,
        }
    }

    fn traffic_light(&self) -> Option<LightColor> {
        match &self.body {
            Body::Static { light, .. } => light.as_ref().map(TrafficLight::color),
            Body::Moving(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_sequential_per_kind() {
        let mut ids = IdAllocator::new();
        let b1 = ids.allocate(EntityKind::Bike);
        let c1 = ids.allocate(EntityKind::OtherCar);
        let b2 = ids.allocate(EntityKind::Bike);
        assert_eq!(b1.to_string(), "Bike:1");
        assert_eq!(c1.to_string(), "Car:1");
        assert_eq!(b2.to_string(), "Bike:2");
    }

    #[test]
    fn static_entities_expose_semantics() {
        let mut ids = IdAllocator::new();
        let sign = Entity::stop_sign(ids.allocate(EntityKind::StopSign), Position::new(1, 1));
        assert_eq!(sign.sign_text(), Some("STOP"));
        assert_eq!(sign.speed(), 0);
        assert_eq!(sign.heading(), None);
        assert_eq!(sign.glyph(), 'S');

        let mut light = Entity::signal(
            ids.allocate(EntityKind::TrafficLight),
            Position::new(2, 2),
            TrafficLight::new(),
        );
        assert_eq!(light.glyph(), 'R');
        for _ in 0..4 {
            light.tick();
        }
        assert_eq!(light.traffic_light(), Some(LightColor::Green));
        assert_eq!(light.glyph(), 'G');
    }

    #[test]
    fn movers_stop_at_the_edge() {
        let bounds = Bounds::new(5, 5);
        let mut ids = IdAllocator::new();
        let mut bike = Entity::mover(
            ids.allocate(EntityKind::Bike),
            Position::new(3, 0),
            Heading::East,
            1,
        );
        assert!(bike.advance(bounds));
        assert_eq!(bike.position(), Position::new(4, 0));
        assert!(!bike.advance(bounds));
        assert_eq!(bike.position(), Position::new(4, 0));

        let mut parked = Entity::parked_car(ids.allocate(EntityKind::ParkedCar), Position::new(0, 0));
        assert!(parked.advance(bounds));
        assert_eq!(parked.projected_position(), None);
    }

    #[test]
    fn huge_speeds_leave_the_world_forwards() {
        let bounds = Bounds::new(10, 10);
        let mut ids = IdAllocator::new();
        for speed in [i32::MAX as u32, u32::MAX] {
            let mut car = Entity::mover(
                ids.allocate(EntityKind::OtherCar),
                Position::new(5, 5),
                Heading::East,
                speed,
            );
            assert_eq!(car.projected_position(), Some(Position::new(i32::MAX, 5)));
            assert!(!car.advance(bounds));
            assert_eq!(car.position(), Position::new(5, 5));
        }
    }
}
