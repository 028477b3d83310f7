use log::{debug, warn};
use rand::rngs::StdRng;

use crate::{
    Heading, Position,
    entity::{EntityId, EntityKind, Observable},
    fusion::{FusedReading, FusionEngine},
    navigation::{Action, Navigator, SpeedLevel},
    sensor::{CameraSensor, LidarSensor, RadarSensor, Sensor, SensorReading},
    world::GridWorld,
};

/// What happened to the car after it applied an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The car is stopped or the action did not move it.
    Stayed,
    Moved { from: Position, to: Position },
    /// The move would have left the world. The car stays where it was.
    OutOfBounds { attempted: Position },
}

/// The agent: a car carrying three sensors, a fusion engine and a navigator.
///
/// The sensors are mounted on the car, so every scan is taken from the car's
/// current position and heading.
#[derive(Debug)]
pub struct SelfDrivingCar {
    id: EntityId,
    position: Position,
    heading: Heading,
    speed: SpeedLevel,
    sensors: Vec<Box<dyn Sensor>>,
    fusion: FusionEngine,
    navigator: Navigator,
    last_readings: Vec<SensorReading>,
    fused_readings: Vec<FusedReading>,
}

impl SelfDrivingCar {
    /// A stopped car facing east, equipped with camera, lidar and radar.
    pub fn new(position: Position, fusion: FusionEngine, navigator: Navigator) -> Self {
        let sensors: Vec<Box<dyn Sensor>> = vec![
            Box::new(CameraSensor::default()),
            Box::new(LidarSensor::default()),
            Box::new(RadarSensor::default()),
        ];
        debug!("Self-driving car created at {}", position);
        SelfDrivingCar {
            id: EntityId {
                kind: EntityKind::SelfDrivingCar,
                number: 0,
            },
            position,
            heading: Heading::East,
            speed: SpeedLevel::Stopped,
            sensors,
            fusion,
            navigator,
            last_readings: Vec::new(),
            fused_readings: Vec::new(),
        }
    }

    pub fn with_heading(mut self, heading: Heading) -> Self {
        self.heading = heading;
        self
    }

    pub fn with_speed(mut self, speed: SpeedLevel) -> Self {
        self.speed = speed;
        self
    }

    pub fn facing(&self) -> Heading {
        self.heading
    }

    pub fn speed_level(&self) -> SpeedLevel {
        self.speed
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    /// Raw readings from the last scan, all sensors concatenated.
    pub fn last_readings(&self) -> &[SensorReading] {
        &self.last_readings
    }

    pub fn fused_readings(&self) -> &[FusedReading] {
        &self.fused_readings
    }

    /// Runs every sensor against the world, replacing the previous readings.
    pub fn perceive(&mut self, world: &GridWorld, rng: &mut StdRng) {
        self.last_readings.clear();
        for sensor in &self.sensors {
            let readings = sensor.scan(world, self.position, self.heading, rng);
            self.last_readings.extend(readings);
        }
    }

    /// Merges the last raw readings into one reading per object.
    pub fn fuse(&mut self) {
        self.fused_readings = self.fusion.fuse(&self.last_readings);
    }

    pub fn decide(&self) -> Action {
        self.navigator
            .decide(self.position, self.heading, &self.fused_readings, self.speed)
    }

    /// Applies `action`, then moves `speed` cells along the heading if moving.
    ///
    /// `NextTarget` never moves the car.
    pub fn apply(&mut self, action: Action, world: &GridWorld) -> MoveOutcome {
        match action {
            Action::Accelerate => self.speed = self.speed.accelerated(),
            Action::Decelerate => self.speed = self.speed.decelerated(),
            Action::Turn(heading) => self.heading = heading,
            Action::NextTarget => {
                // Switching targets takes the whole tick.
                self.navigator.advance_target();
                return MoveOutcome::Stayed;
            }
            Action::Stop => self.speed = SpeedLevel::Stopped,
            Action::Continue => {}
        }

        if !self.speed.is_moving() {
            return MoveOutcome::Stayed;
        }
        let from = self.position;
        let to = from.stepped(self.heading, self.speed.cells_per_tick());
        if !world.in_bounds(to) {
            warn!("{} would leave the world at {}", self.id, to);
            return MoveOutcome::OutOfBounds { attempted: to };
        }
        self.position = to;
        MoveOutcome::Moved { from, to }
    }

    /// One perceive, fuse, decide, act cycle.
    pub fn drive(&mut self, world: &GridWorld, rng: &mut StdRng) -> (Action, MoveOutcome) {
        self.perceive(world, rng);
        self.fuse();
        let action = self.decide();
        debug!(
            "{} at {} facing {}: {} raw, {} fused, decision {}",
            self.id,
            self.position,
            self.heading,
            self.last_readings.len(),
            self.fused_readings.len(),
            action
        );
        let outcome = self.apply(action, world);
        (action, outcome)
    }
}

impl Observable for SelfDrivingCar {
    fn id(&self) -> EntityId {
        self.id
    }

    fn position(&self) -> Position {
        self.position
    }

    fn glyph(&self) -> char {
        '@'
    }

    fn speed(&self) -> u32 {
        self.speed.cells_per_tick()
    }

    fn heading(&self) -> Option<Heading> {
        Some(self.heading)
    }
}
