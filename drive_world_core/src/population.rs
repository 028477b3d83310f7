//! Random placement of road users around the car.

use log::{debug, warn};
use rand::{Rng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use crate::{
    Heading, Position,
    entity::{Entity, EntityKind},
    traffic_light::TrafficLight,
    world::GridWorld,
};

/// How many of each kind to place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationConfig {
    pub moving_cars: u32,
    pub moving_bikes: u32,
    pub parked_cars: u32,
    pub stop_signs: u32,
    pub traffic_lights: u32,
    /// Cells per tick for bikes and other cars.
    pub npc_speed: u32,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        PopulationConfig {
            moving_cars: 3,
            moving_bikes: 4,
            parked_cars: 7,
            stop_signs: 1,
            traffic_lights: 2,
            npc_speed: 1,
        }
    }
}

impl PopulationConfig {
    /// A world with nothing in it.
    pub fn empty() -> Self {
        PopulationConfig {
            moving_cars: 0,
            moving_bikes: 0,
            parked_cars: 0,
            stop_signs: 0,
            traffic_lights: 0,
            ..Self::default()
        }
    }

    pub fn total(&self) -> u32 {
        self.moving_cars
            + self.moving_bikes
            + self.parked_cars
            + self.stop_signs
            + self.traffic_lights
    }
}

/// Picks a uniformly random cell that is neither `keep_clear` nor occupied.
fn free_cell(world: &GridWorld, keep_clear: Position, rng: &mut StdRng) -> Option<Position> {
    let free = (world.width() as usize * world.height() as usize).saturating_sub(world.len());
    let blocked = usize::from(world.in_bounds(keep_clear) && !world.is_occupied(keep_clear));
    if free <= blocked {
        return None;
    }
    loop {
        let pos = Position::new(
            rng.random_range(0..world.width() as i32),
            rng.random_range(0..world.height() as i32),
        );
        if pos != keep_clear && !world.is_occupied(pos) {
            return Some(pos);
        }
    }
}

/// Fills `world` with the configured road users, never on `agent_position`.
///
/// Bikes come first, then moving cars, parked cars, stop signs and traffic
/// lights. Returns how many entities were placed; fewer than requested only
/// when the world runs out of free cells.
pub fn populate(
    world: &mut GridWorld,
    config: &PopulationConfig,
    agent_position: Position,
    rng: &mut StdRng,
) -> u32 {
    let plan = [
        (EntityKind::Bike, config.moving_bikes),
        (EntityKind::OtherCar, config.moving_cars),
        (EntityKind::ParkedCar, config.parked_cars),
        (EntityKind::StopSign, config.stop_signs),
        (EntityKind::TrafficLight, config.traffic_lights),
    ];

    let mut placed = 0;
    for (kind, count) in plan {
        for _ in 0..count {
            let Some(pos) = free_cell(world, agent_position, rng) else {
                warn!(
                    "World is full: placed {} of {} entities",
                    placed,
                    config.total()
                );
                return placed;
            };
            let id = world.allocate_id(kind);
            let entity = match kind {
                EntityKind::Bike | EntityKind::OtherCar => {
                    let heading = Heading::ALL[rng.random_range(0..Heading::ALL.len())];
                    debug!("{} heading {} at {} cells/tick", id, heading, config.npc_speed);
                    Entity::mover(id, pos, heading, config.npc_speed)
                }
                EntityKind::StopSign => Entity::stop_sign(id, pos),
                EntityKind::TrafficLight => {
                    let phase = rng.random_range(0..TrafficLight::CYCLE_TICKS);
                    Entity::signal(id, pos, TrafficLight::with_phase(phase))
                }
                EntityKind::ParkedCar | EntityKind::SelfDrivingCar => Entity::parked_car(id, pos),
            };
            if world.add_entity(entity).is_ok() {
                placed += 1;
            }
        }
    }
    placed
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;
    use crate::entity::Observable;

    #[test]
    fn places_requested_counts_on_distinct_cells() {
        let mut world = GridWorld::new(10, 10);
        let mut rng = StdRng::seed_from_u64(42);
        let config = PopulationConfig::default();
        let agent = Position::new(5, 5);
        assert_eq!(populate(&mut world, &config, agent, &mut rng), config.total());

        let mut cells: Vec<Position> = world.entities().map(|e| e.position()).collect();
        cells.sort();
        cells.dedup();
        assert_eq!(cells.len() as u32, config.total());
        assert!(!cells.contains(&agent));

        let bikes = world.entities().filter(|e| e.kind() == EntityKind::Bike).count();
        assert_eq!(bikes as u32, config.moving_bikes);
        assert!(
            world
                .entities()
                .filter(|e| e.is_mover())
                .all(|e| e.speed() == 1 && e.heading().is_some())
        );
    }

    #[test]
    fn stops_when_world_is_full() {
        let mut world = GridWorld::new(2, 2);
        let mut rng = StdRng::seed_from_u64(1);
        let config = PopulationConfig {
            parked_cars: 10,
            ..PopulationConfig::empty()
        };
        assert_eq!(populate(&mut world, &config, Position::new(0, 0), &mut rng), 3);
        assert!(world.entity_at(Position::new(0, 0)).is_none());
    }

    #[test]
    fn same_seed_same_world() {
        let build = || {
            let mut world = GridWorld::new(15, 15);
            let mut rng = StdRng::seed_from_u64(9);
            populate(&mut world, &PopulationConfig::default(), Position::new(0, 0), &mut rng);
            world.entities().cloned().collect::<Vec<_>>()
        };
        assert_eq!(build(), build());
    }
}
