use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

use crate::{
    Heading, Position,
    entity::{EntityId, EntityKind},
    sensor::{SensorKind, SensorReading},
    traffic_light::LightColor,
};

/// Best estimate of one object for one tick, merged from every sensor that
/// saw it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedReading {
    pub object_type: EntityKind,
    pub object_id: EntityId,
    pub position: Position,
    pub distance: u32,
    /// Mean of the member confidences.
    pub confidence: f64,
    pub speed: u32,
    pub heading: Option<Heading>,
    pub sign_text: Option<String>,
    pub traffic_light: Option<LightColor>,
    /// Sensors that contributed, in input order.
    pub sources: Vec<SensorKind>,
}

impl fmt::Display for FusedReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at {}, distance: {}, confidence: {:.2}, sensors: {}",
            self.object_id,
            self.position,
            self.distance,
            self.confidence,
            self.sources.len()
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

/// Merges per-sensor readings into one reading per object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionEngine {
    min_confidence: f64,
    /// Kinds that are reported no matter how low their fused confidence is.
    always_keep: Vec<EntityKind>,
}

impl FusionEngine {
    pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.4;

    /// Creates an engine that drops fused readings below `min_confidence`,
    /// except for bikes.
    pub fn new(min_confidence: f64) -> Self {
        FusionEngine {
            min_confidence,
            always_keep: vec![EntityKind::Bike],
        }
    }

    pub fn always_keeps(&self, kind: EntityKind) -> bool {
        self.always_keep.contains(&kind)
    }

    /// Groups `readings` by object id and merges each group.
    ///
    /// Confidence is the plain mean over the group. Speed and heading come
    /// from the most confident reading; sign text and light colour from the
    /// most confident reading that reports them. Output is ordered by id.
    pub fn fuse(&self, readings: &[SensorReading]) -> Vec<FusedReading> {
        let mut by_object: BTreeMap<EntityId, Vec<&SensorReading>> = BTreeMap::new();
        for reading in readings {
            by_object.entry(reading.object_id).or_default().push(reading);
        }

        by_object
            .into_values()
            .filter_map(|group| merge(&group))
            .filter(|fused| {
                fused.confidence >= self.min_confidence || self.always_keeps(fused.object_type)
            })
            .collect()
    }
}

impl Default for FusionEngine {
    fn default() -> Self {
        FusionEngine::new(Self::DEFAULT_MIN_CONFIDENCE)
    }
}

/// Earliest reading with the strictly highest confidence among `candidates`.
fn most_confident<'a, I>(candidates: I) -> Option<&'a SensorReading>
where
    I: IntoIterator<Item = &'a SensorReading>,
{
    candidates.into_iter().fold(None, |best, r| match best {
        Some(b) if b.confidence >= r.confidence => Some(b),
        _ => Some(r),
    })
}

fn merge(group: &[&SensorReading]) -> Option<FusedReading> {
    let first = *group.first()?;
    let best = most_confident(group.iter().copied())?;
    let total: f64 = group.iter().map(|r| r.confidence).sum();

    let sign_text = most_confident(group.iter().copied().filter(|r| r.sign_text.is_some()))
        .and_then(|r| r.sign_text.clone());
    let traffic_light =
        most_confident(group.iter().copied().filter(|r| r.traffic_light.is_some()))
            .and_then(|r| r.traffic_light);

    Some(FusedReading {
        object_type: first.object_type,
        object_id: first.object_id,
        position: first.position,
        distance: first.distance,
        confidence: total / group.len() as f64,
        speed: best.speed,
        heading: best.heading,
        sign_text,
        traffic_light,
        sources: group.iter().map(|r| r.sensor).collect(),
    })
}
