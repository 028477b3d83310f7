//! Virtual sensors mounted on the self-driving car.
//!
//! Each sensor scans the world relative to the car's position and heading and
//! returns one [`SensorReading`] per object inside its field of view. Readings
//! carry a confidence that falls off linearly with manhattan distance and is
//! jittered by a small random amount drawn from the simulation's generator.

use std::fmt;

use rand::{Rng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use crate::{
    Heading, Position,
    entity::{Entity, EntityId, EntityKind, Observable},
    traffic_light::LightColor,
    world::GridWorld,
};

/// Noise is drawn in steps of `NOISE_STEP` from `-NOISE_STEPS..=NOISE_STEPS`.
pub const NOISE_STEPS: i32 = 5;
pub const NOISE_STEP: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorKind {
    /// Wide-area, omnidirectional.
    Lidar,
    /// Forward-narrow, moving objects only.
    Radar,
    /// Forward-wide, reads signs and lights.
    Camera,
}

impl SensorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SensorKind::Lidar => "LIDAR",
            SensorKind::Radar => "RADAR",
            SensorKind::Camera => "CAMERA",
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One sensor's observation of one object during one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub sensor: SensorKind,
    pub object_type: EntityKind,
    pub object_id: EntityId,
    pub position: Position,
    /// Manhattan distance from the car.
    pub distance: u32,
    pub confidence: f64,
    pub speed: u32,
    pub heading: Option<Heading>,
    pub sign_text: Option<String>,
    pub traffic_light: Option<LightColor>,
}

impl SensorReading {
    fn observe(sensor: SensorKind, object: &Entity, distance: u32, confidence: f64) -> Self {
        SensorReading {
            sensor,
            object_type: object.kind(),
            object_id: object.id(),
            position: object.position(),
            distance,
            confidence,
            speed: object.speed(),
            heading: object.heading(),
            sign_text: None,
            traffic_light: None,
        }
    }

    fn with_semantics(mut self, object: &Entity) -> Self {
        self.sign_text = object.sign_text().map(str::to_string);
        self.traffic_light = object.traffic_light();
        self
    }
}

impl fmt::Display for SensorReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} at {}, distance: {}, confidence: {:.2}",
            self.sensor, self.object_id, self.position, self.distance, self.confidence
        )?;
        if let Some(light) = self.traffic_light {
            write!(f, ", light: {light}")?;
        }
        if let Some(text) = &self.sign_text {
            write!(f, ", sign: {text}")?;
        }
        if self.speed > 0 {
            write!(f, ", speed: {}", self.speed)?;
            if let Some(heading) = self.heading {
                write!(f, ", dir: {heading}")?;
            }
        }
        Ok(())
    }
}

/// A field-of-view and confidence policy.
pub trait Sensor: fmt::Debug {
    fn kind(&self) -> SensorKind;

    /// Observes every object in range of a car at `origin` facing `heading`.
    ///
    /// Only the noise draw touches `rng`; the world is never mutated.
    fn scan(
        &self,
        world: &GridWorld,
        origin: Position,
        heading: Heading,
        rng: &mut StdRng,
    ) -> Vec<SensorReading>;
}

/// `base * (1 - distance / (2 * range)) + noise`, clamped to `[0, 1]`.
pub fn jittered_confidence(base: f64, distance: u32, range: u32, rng: &mut StdRng) -> f64 {
    let falloff = 1.0 - f64::from(distance) / f64::from(2 * range);
    let noise = f64::from(rng.random_range(-NOISE_STEPS..=NOISE_STEPS)) * NOISE_STEP;
    (base * falloff + noise).clamp(0.0, 1.0)
}

/// Splits an offset into (forward, lateral) components relative to `heading`.
fn relative_offset(heading: Heading, dx: i32, dy: i32) -> (i32, i32) {
    match heading {
        Heading::East => (dx, dy),
        Heading::West => (-dx, dy),
        Heading::North => (dy, dx),
        Heading::South => (-dy, dx),
    }
}

/// Wide-area scanner: a square window centred on the car. Measures geometry
/// and motion but cannot read signs or lights.
#[derive(Debug, Clone, Copy)]
pub struct LidarSensor {
    pub half_extent: u32,
    pub base_confidence: f64,
}

impl Default for LidarSensor {
    fn default() -> Self {
        LidarSensor {
            half_extent: 4,
            base_confidence: 0.99,
        }
    }
}

impl Sensor for LidarSensor {
    fn kind(&self) -> SensorKind {
        SensorKind::Lidar
    }

    fn scan(
        &self,
        world: &GridWorld,
        origin: Position,
        _heading: Heading,
        rng: &mut StdRng,
    ) -> Vec<SensorReading> {
        let mut readings = Vec::new();
        for object in world.entities() {
            let pos = object.position();
            if pos.x.abs_diff(origin.x) > self.half_extent
                || pos.y.abs_diff(origin.y) > self.half_extent
            {
                continue;
            }
            let distance = origin.distance_to(&pos);
            let confidence =
                jittered_confidence(self.base_confidence, distance, self.half_extent, rng);
            readings.push(SensorReading::observe(self.kind(), object, distance, confidence));
        }
        readings
    }
}

/// Forward-narrow scanner: a three-cell-wide corridor straight ahead. Static
/// clutter produces no return.
#[derive(Debug, Clone, Copy)]
pub struct RadarSensor {
    pub range: u32,
    pub half_width: u32,
    pub base_confidence: f64,
}

impl Default for RadarSensor {
    fn default() -> Self {
        RadarSensor {
            range: 12,
            half_width: 1,
            base_confidence: 0.95,
        }
    }
}

impl Sensor for RadarSensor {
    fn kind(&self) -> SensorKind {
        SensorKind::Radar
    }

    fn scan(
        &self,
        world: &GridWorld,
        origin: Position,
        heading: Heading,
        rng: &mut StdRng,
    ) -> Vec<SensorReading> {
        let mut readings = Vec::new();
        for object in world.entities().filter(|e| e.speed() > 0) {
            let pos = object.position();
            let (forward, lateral) = relative_offset(heading, pos.x - origin.x, pos.y - origin.y);
            if forward <= 0
                || forward as u32 > self.range
                || lateral.unsigned_abs() > self.half_width
            {
                continue;
            }
            let distance = origin.distance_to(&pos);
            let confidence = jittered_confidence(self.base_confidence, distance, self.range, rng);
            readings.push(SensorReading::observe(self.kind(), object, distance, confidence));
        }
        readings
    }
}

/// Forward-wide camera: a `range` deep, `2 * range + 1` wide box ahead of
/// the car. The only sensor that reads sign text and light colour.
#[derive(Debug, Clone, Copy)]
pub struct CameraSensor {
    pub range: u32,
    pub base_confidence: f64,
}

impl Default for CameraSensor {
    fn default() -> Self {
        CameraSensor {
            range: 3,
            base_confidence: 0.87,
        }
    }
}

impl Sensor for CameraSensor {
    fn kind(&self) -> SensorKind {
        SensorKind::Camera
    }

    fn scan(
        &self,
        world: &GridWorld,
        origin: Position,
        heading: Heading,
        rng: &mut StdRng,
    ) -> Vec<SensorReading> {
        let mut readings = Vec::new();
        for object in world.entities() {
            let pos = object.position();
            let (forward, lateral) = relative_offset(heading, pos.x - origin.x, pos.y - origin.y);
            if forward <= 0
                || forward as u32 > self.range
                || lateral.unsigned_abs() > self.range
            {
                continue;
            }
            let distance = origin.distance_to(&pos);
            let confidence = jittered_confidence(self.base_confidence, distance, self.range, rng);
            readings.push(
                SensorReading::observe(self.kind(), object, distance, confidence)
                    .with_semantics(object),
            );
        }
        readings
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;
    use crate::traffic_light::TrafficLight;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn place(world: &mut GridWorld, kind: EntityKind, pos: Position) -> EntityId {
        let id = world.allocate_id(kind);
        let entity = match kind {
            EntityKind::StopSign => Entity::stop_sign(id, pos),
            EntityKind::TrafficLight => Entity::signal(id, pos, TrafficLight::new()),
            EntityKind::Bike | EntityKind::OtherCar => Entity::mover(id, pos, Heading::North, 1),
            _ => Entity::parked_car(id, pos),
        };
        world.add_entity(entity).unwrap()
    }

    fn seen(readings: &[SensorReading]) -> Vec<EntityId> {
        readings.iter().map(|r| r.object_id).collect()
    }

    #[test]
    fn confidence_stays_within_noise_band() {
        let mut rng = rng();
        for distance in 0..=8 {
            let exact = 0.99 * (1.0 - f64::from(distance) / 8.0);
            for _ in 0..50 {
                let c = jittered_confidence(0.99, distance, 4, &mut rng);
                assert!((0.0..=1.0).contains(&c));
                assert!((c - exact).abs() <= 0.05 + 1e-9 || c == 0.0 || c == 1.0);
            }
        }
    }

    #[test]
    fn lidar_sees_square_window_without_semantics() {
        let mut world = GridWorld::new(20, 20);
        let origin = Position::new(10, 10);
        let corner = place(&mut world, EntityKind::StopSign, Position::new(14, 6));
        let behind = place(&mut world, EntityKind::ParkedCar, Position::new(6, 10));
        place(&mut world, EntityKind::ParkedCar, Position::new(15, 10));

        let readings = LidarSensor::default().scan(&world, origin, Heading::East, &mut rng());
        assert_eq!(seen(&readings), vec![behind, corner]);
        let sign = readings.iter().find(|r| r.object_id == corner).unwrap();
        assert_eq!(sign.distance, 8);
        assert_eq!(sign.sign_text, None);
        assert!(readings.iter().all(|r| r.sensor == SensorKind::Lidar));
    }

    #[test]
    fn radar_ignores_static_objects_and_looks_ahead_only() {
        let mut world = GridWorld::new(30, 30);
        let origin = Position::new(5, 5);
        let ahead = place(&mut world, EntityKind::Bike, Position::new(17, 6));
        place(&mut world, EntityKind::ParkedCar, Position::new(8, 5));
        place(&mut world, EntityKind::OtherCar, Position::new(18, 5));
        place(&mut world, EntityKind::OtherCar, Position::new(7, 7));
        place(&mut world, EntityKind::Bike, Position::new(4, 5));

        let readings = RadarSensor::default().scan(&world, origin, Heading::East, &mut rng());
        assert_eq!(seen(&readings), vec![ahead]);
        assert_eq!(readings[0].distance, 13);
        assert_eq!(readings[0].speed, 1);
        assert_eq!(readings[0].heading, Some(Heading::North));
    }

    #[test]
    fn radar_corridor_turns_with_heading() {
        let mut world = GridWorld::new(30, 30);
        let origin = Position::new(10, 10);
        let south = place(&mut world, EntityKind::Bike, Position::new(9, 2));
        let north = place(&mut world, EntityKind::Bike, Position::new(10, 14));
        let radar = RadarSensor::default();
        assert_eq!(seen(&radar.scan(&world, origin, Heading::South, &mut rng())), vec![south]);
        assert_eq!(seen(&radar.scan(&world, origin, Heading::North, &mut rng())), vec![north]);
        assert!(radar.scan(&world, origin, Heading::West, &mut rng()).is_empty());
    }

    #[test]
    fn camera_reads_signs_and_lights_ahead() {
        let mut world = GridWorld::new(20, 20);
        let origin = Position::new(10, 10);
        let sign = place(&mut world, EntityKind::StopSign, Position::new(10, 13));
        let light = place(&mut world, EntityKind::TrafficLight, Position::new(7, 11));
        place(&mut world, EntityKind::StopSign, Position::new(10, 14));
        place(&mut world, EntityKind::StopSign, Position::new(10, 9));

        let readings = CameraSensor::default().scan(&world, origin, Heading::North, &mut rng());
        assert_eq!(seen(&readings), vec![sign, light]);
        assert_eq!(readings[0].sign_text.as_deref(), Some("STOP"));
        assert_eq!(readings[1].traffic_light, Some(LightColor::Red));
        assert_eq!(readings[1].distance, 4);
    }

    #[test]
    fn scans_are_reproducible_from_a_seed() {
        let mut world = GridWorld::new(20, 20);
        for x in 11..14 {
            place(&mut world, EntityKind::Bike, Position::new(x, 10));
        }
        let origin = Position::new(10, 10);
        let a = LidarSensor::default().scan(&world, origin, Heading::East, &mut rng());
        let b = LidarSensor::default().scan(&world, origin, Heading::East, &mut rng());
        assert_eq!(a, b);
    }
}
