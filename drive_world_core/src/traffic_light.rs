use std::fmt;

use serde::{Deserialize, Serialize};

/// Colour shown by a traffic light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LightColor {
    Red,
    Green,
    Yellow,
}

impl LightColor {
    /// Number of ticks spent in this colour before switching.
    pub const fn duration(self) -> u32 {
        match self {
            LightColor::Red => 4,
            LightColor::Green => 8,
            LightColor::Yellow => 2,
        }
    }

    /// The colour that follows this one.
    pub const fn next(self) -> LightColor {
        match self {
            LightColor::Red => LightColor::Green,
            LightColor::Green => LightColor::Yellow,
            LightColor::Yellow => LightColor::Red,
        }
    }

    /// Whether an approaching vehicle has to slow down.
    pub fn requires_stop(self) -> bool {
        matches!(self, LightColor::Red | LightColor::Yellow)
    }

    pub fn glyph(self) -> char {
        match self {
            LightColor::Red => 'R',
            LightColor::Green => 'G',
            LightColor::Yellow => 'Y',
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LightColor::Red => "RED",
            LightColor::Green => "GREEN",
            LightColor::Yellow => "YELLOW",
        }
    }
}

impl fmt::Display for LightColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timed RED -> GREEN -> YELLOW -> RED controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficLight {
    color: LightColor,
    ticks_in_color: u32,
}

impl TrafficLight {
    /// Length of one full cycle in ticks.
    pub const CYCLE_TICKS: u32 = LightColor::Red.duration()
        + LightColor::Green.duration()
        + LightColor::Yellow.duration();

    /// A light that has just turned red.
    pub fn new() -> Self {
        TrafficLight {
            color: LightColor::Red,
            ticks_in_color: 0,
        }
    }

    /// A light started red and then advanced `offset` ticks into its cycle.
    pub fn with_phase(offset: u32) -> Self {
        let mut light = TrafficLight::new();
        for _ in 0..offset % Self::CYCLE_TICKS {
            light.tick();
        }
        light
    }

    pub fn color(&self) -> LightColor {
        self.color
    }

    /// Advances the light by one tick. The counter resets on every transition.
    pub fn tick(&mut self) {
        self.ticks_in_color += 1;
        if self.ticks_in_color >= self.color.duration() {
            self.color = self.color.next();
            self.ticks_in_color = 0;
        }
    }
}

impl Default for TrafficLight {
    fn default() -> Self {
        TrafficLight::new()
    }
}
