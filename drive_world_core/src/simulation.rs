use std::fmt;

use log::{info, warn};
use rand::{SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use crate::{
    Heading, Position,
    agent::{MoveOutcome, SelfDrivingCar},
    config::{ConfigError, SimConfig},
    entity::{EntityId, Observable},
    fusion::{FusedReading, FusionEngine},
    map::Grid,
    navigation::{Action, Navigator, SpeedLevel},
    population::populate,
    sensor::SensorReading,
    world::GridWorld,
};

/// Lifecycle of a simulation. Everything except `Running` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimState {
    Running,
    TargetsExhausted,
    OutOfBounds { attempted: Position },
    TickBudgetExceeded,
}

impl SimState {
    pub fn is_terminal(&self) -> bool {
        *self != SimState::Running
    }
}

impl fmt::Display for SimState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimState::Running => f.write_str("RUNNING"),
            SimState::TargetsExhausted => f.write_str("TARGETS_EXHAUSTED"),
            SimState::OutOfBounds { attempted } => write!(f, "OUT_OF_BOUNDS at {attempted}"),
            SimState::TickBudgetExceeded => f.write_str("TICK_BUDGET_EXCEEDED"),
        }
    }
}

/// Everything observable about one tick, for renderers and logs.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub tick: u32,
    /// Entities that drove out of the world this tick.
    pub removed: Vec<EntityId>,
    pub raw: Vec<SensorReading>,
    pub fused: Vec<FusedReading>,
    pub action: Action,
    pub outcome: MoveOutcome,
    pub position: Position,
    pub heading: Heading,
    pub speed: SpeedLevel,
    pub state: SimState,
}

/// Drives the world and the car one tick at a time.
#[derive(Debug)]
pub struct Simulation {
    world: GridWorld,
    car: SelfDrivingCar,
    rng: StdRng,
    tick: u32,
    max_ticks: u32,
    state: SimState,
}

impl Simulation {
    /// Validates `config`, then builds and populates the world from its seed.
    pub fn new(config: &SimConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let seed = config.seed.unwrap_or_default();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut world = GridWorld::new(config.width, config.height);
        let placed = populate(&mut world, &config.population, config.start, &mut rng);

        let mut navigator = Navigator::new(config.rules);
        navigator.set_targets(config.targets.clone());
        let car = SelfDrivingCar::new(
            config.start,
            FusionEngine::new(config.min_confidence),
            navigator,
        );
        info!(
            "Simulation ready: {}x{} world, {} entities, {} targets, seed {}",
            config.width,
            config.height,
            placed,
            config.targets.len(),
            seed
        );
        Ok(Self::from_parts(world, car, rng, config.max_ticks))
    }

    /// Runs a hand-built world and car. `max_ticks` of 0 ends on the first tick.
    pub fn from_parts(world: GridWorld, car: SelfDrivingCar, rng: StdRng, max_ticks: u32) -> Self {
        Simulation {
            world,
            car,
            rng,
            tick: 0,
            max_ticks,
            state: SimState::Running,
        }
    }

    pub fn world(&self) -> &GridWorld {
        &self.world
    }

    pub fn car(&self) -> &SelfDrivingCar {
        &self.car
    }

    pub fn state(&self) -> SimState {
        self.state
    }

    /// Number of ticks completed so far.
    pub fn tick(&self) -> u32 {
        self.tick
    }

    pub fn max_ticks(&self) -> u32 {
        self.max_ticks
    }

    /// Glyph map of the world with the car drawn on top.
    pub fn snapshot(&self) -> Grid<char> {
        self.world.snapshot(&self.car)
    }

    /// Advances one tick. Returns `None` once a terminal state was reached.
    pub fn step(&mut self) -> Option<TickReport> {
        if self.state.is_terminal() {
            return None;
        }

        self.world.tick();
        let removed = self.world.move_entities();
        let (action, outcome) = self.car.drive(&self.world, &mut self.rng);
        self.tick += 1;

        self.state = match outcome {
            MoveOutcome::OutOfBounds { attempted } => {
                warn!("Car went out of bounds at {}", attempted);
                SimState::OutOfBounds { attempted }
            }
            _ if action == Action::Stop && !self.car.navigator().has_more_targets() => {
                SimState::TargetsExhausted
            }
            _ if self.tick >= self.max_ticks => SimState::TickBudgetExceeded,
            _ => SimState::Running,
        };
        if self.state.is_terminal() {
            info!("Simulation ended after {} ticks: {}", self.tick, self.state);
        }

        Some(TickReport {
            tick: self.tick - 1,
            removed,
            raw: self.car.last_readings().to_vec(),
            fused: self.car.fused_readings().to_vec(),
            action,
            outcome,
            position: self.car.position(),
            heading: self.car.facing(),
            speed: self.car.speed_level(),
            state: self.state,
        })
    }

    /// Runs until a terminal state, handing every tick to `on_tick`.
    pub fn run_with<F>(&mut self, mut on_tick: F) -> SimState
    where
        F: FnMut(&TickReport),
    {
        while let Some(report) = self.step() {
            on_tick(&report);
        }
        self.state
    }

    pub fn run(&mut self) -> SimState {
        self.run_with(|_| {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::population::PopulationConfig;

    fn config(targets: Vec<Position>) -> SimConfig {
        SimConfig {
            width: 10,
            height: 10,
            targets,
            population: PopulationConfig::empty(),
            max_ticks: 50,
            ..SimConfig::default()
        }
    }

    #[test]
    fn invalid_config_is_rejected() {
        let err = Simulation::new(&config(Vec::new())).unwrap_err();
        assert_eq!(err, ConfigError::NoTargets);
    }

    #[test]
    fn terminal_state_stops_stepping() {
        let mut sim = Simulation::new(&config(vec![Position::new(0, 0)])).unwrap();
        assert_eq!(sim.run(), SimState::TargetsExhausted);
        assert_eq!(sim.tick(), 2);
        assert!(sim.step().is_none());
    }

    #[test]
    fn tick_budget_ends_the_run() {
        let mut cfg = config(vec![Position::new(9, 9)]);
        cfg.max_ticks = 3;
        let mut sim = Simulation::new(&cfg).unwrap();
        let mut ticks = Vec::new();
        let end = sim.run_with(|report| ticks.push(report.tick));
        assert_eq!(end, SimState::TickBudgetExceeded);
        assert_eq!(ticks, vec![0, 1, 2]);
    }

    #[test]
    fn snapshot_draws_the_car() {
        let sim = Simulation::new(&config(vec![Position::new(3, 3)])).unwrap();
        let grid = sim.snapshot();
        assert_eq!(grid[Position::new(0, 0)], '@');
        assert_eq!(grid.enumerate().filter(|(_, c)| **c == '.').count(), 99);
    }
}
