use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{Heading, Position, entity::EntityKind, fusion::FusedReading};

/// Discrete action chosen once per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Accelerate,
    Decelerate,
    Turn(Heading),
    NextTarget,
    Stop,
    Continue,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Accelerate => f.write_str("ACCELERATE"),
            Action::Decelerate => f.write_str("DECELERATE"),
            Action::Turn(heading) => write!(f, "TURN_{heading}"),
            Action::NextTarget => f.write_str("NEXT_TARGET"),
            Action::Stop => f.write_str("STOP"),
            Action::Continue => f.write_str("CONTINUE"),
        }
    }
}

/// Speed of the self-driving car, in cells per tick.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum SpeedLevel {
    #[default]
    Stopped,
    Half,
    Full,
}

impl SpeedLevel {
    pub fn cells_per_tick(self) -> u32 {
        match self {
            SpeedLevel::Stopped => 0,
            SpeedLevel::Half => 1,
            SpeedLevel::Full => 2,
        }
    }

    /// One level up, saturating at `Full`.
    pub fn accelerated(self) -> SpeedLevel {
        match self {
            SpeedLevel::Stopped => SpeedLevel::Half,
            SpeedLevel::Half | SpeedLevel::Full => SpeedLevel::Full,
        }
    }

    /// One level down, saturating at `Stopped`.
    pub fn decelerated(self) -> SpeedLevel {
        match self {
            SpeedLevel::Full => SpeedLevel::Half,
            SpeedLevel::Half | SpeedLevel::Stopped => SpeedLevel::Stopped,
        }
    }

    pub fn is_moving(self) -> bool {
        self != SpeedLevel::Stopped
    }
}

/// Tunable distances used by the decision rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionRules {
    /// Slow down for anything moving this close.
    pub moving_hazard_range: u32,
    /// Slow down for red or yellow lights this close.
    pub light_range: u32,
    /// Slow down for stop signs this close.
    pub stop_sign_range: u32,
    /// Slow down when the current target is this close.
    pub approach_range: u32,
    /// When set, the stop-sign and approach rules only fire while moving, so
    /// a stopped car can creep forward instead of waiting forever. Off by
    /// default.
    pub creep_when_stopped: bool,
}

impl Default for DecisionRules {
    fn default() -> Self {
        DecisionRules {
            moving_hazard_range: 2,
            light_range: 3,
            stop_sign_range: 5,
            approach_range: 5,
            creep_when_stopped: false,
        }
    }
}

impl DecisionRules {
    /// The default table, but a stopped car may creep through the stop-sign
    /// and approach zones one cell at a time.
    pub fn creeping() -> Self {
        DecisionRules {
            creep_when_stopped: true,
            ..Self::default()
        }
    }
}

/// GPS target list plus the rule engine that picks one action per tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Navigator {
    targets: Vec<Position>,
    index: usize,
    rules: DecisionRules,
}

impl Navigator {
    pub fn new(rules: DecisionRules) -> Self {
        Navigator {
            targets: Vec::new(),
            index: 0,
            rules,
        }
    }

    /// Replaces the target list and starts again from the first target.
    pub fn set_targets(&mut self, targets: Vec<Position>) {
        debug!("Navigation set with {} targets", targets.len());
        self.targets = targets;
        self.index = 0;
    }

    pub fn targets(&self) -> &[Position] {
        &self.targets
    }

    /// Index of the current target. Equals `targets().len()` once exhausted.
    pub fn target_index(&self) -> usize {
        self.index
    }

    /// The target being driven to, or `None` once every target was reached.
    pub fn current_target(&self) -> Option<Position> {
        self.targets.get(self.index).copied()
    }

    pub fn has_more_targets(&self) -> bool {
        self.index < self.targets.len()
    }

    pub fn has_reached_target(&self, pos: Position) -> bool {
        self.current_target()
            .is_some_and(|target| pos.distance_to(&target) == 0)
    }

    /// Moves on to the next target. Does nothing once the list is exhausted.
    pub fn advance_target(&mut self) {
        if self.has_more_targets() {
            self.index += 1;
            match self.current_target() {
                Some(next) => debug!("Moving to next target: {}", next),
                None => debug!("Reached final destination"),
            }
        }
    }

    /// Picks the action for this tick. The first matching rule wins.
    pub fn decide(
        &self,
        pos: Position,
        heading: Heading,
        fused: &[FusedReading],
        speed: SpeedLevel,
    ) -> Action {
        let Some(target) = self.current_target() else {
            return Action::Stop;
        };
        if pos == target {
            return Action::NextTarget;
        }

        let rules = &self.rules;
        let advisory = speed.is_moving() || !rules.creep_when_stopped;

        if fused
            .iter()
            .any(|r| r.distance <= rules.moving_hazard_range && r.speed > 0)
        {
            return Action::Decelerate;
        }
        if fused.iter().any(|r| {
            r.distance <= rules.light_range && r.traffic_light.is_some_and(|l| l.requires_stop())
        }) {
            return Action::Decelerate;
        }
        if advisory
            && fused
                .iter()
                .any(|r| r.distance <= rules.stop_sign_range && r.object_type == EntityKind::StopSign)
        {
            return Action::Decelerate;
        }
        if advisory && pos.distance_to(&target) <= rules.approach_range {
            return Action::Decelerate;
        }

        if let Some(turn) = steer(pos, target, heading) {
            return Action::Turn(turn);
        }
        if speed < SpeedLevel::Full {
            Action::Accelerate
        } else {
            Action::Continue
        }
    }
}

/// Heading to turn to, if the car is not already facing the dominant axis
/// towards `target`. Ties go to the vertical axis.
fn steer(pos: Position, target: Position, heading: Heading) -> Option<Heading> {
    let dx = target.x - pos.x;
    let dy = target.y - pos.y;
    let wanted = if dx.abs() > dy.abs() {
        match dx.signum() {
            1 => Heading::East,
            _ => Heading::West,
        }
    } else {
        match dy.signum() {
            1 => Heading::North,
            -1 => Heading::South,
            _ => return None,
        }
    };
    (wanted != heading).then_some(wanted)
}
