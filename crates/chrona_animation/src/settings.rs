//! Playable configuration

use crate::easing::{Easing, Formula};
use crate::error::{AnimationError, Result};
use crate::playable::{Direction, LoopType};
use crate::timing::Timing;

/// Construction-time settings shared by every playable
#[derive(Clone, Copy, Debug)]
pub struct PlayableSettings {
    /// Length of one loop in seconds
    pub loop_duration: f32,
    /// Number of loops, at least 1
    pub loops: u32,
    pub loop_type: LoopType,
    /// Initial playback direction
    pub direction: Direction,
    pub formula: Formula,
}

impl Default for PlayableSettings {
    fn default() -> Self {
        Self {
            loop_duration: 1.0,
            loops: 1,
            loop_type: LoopType::Reset,
            direction: Direction::Forward,
            formula: Formula::linear(),
        }
    }
}

impl PlayableSettings {
    pub fn new(loop_duration: f32) -> Self {
        Self {
            loop_duration,
            ..Self::default()
        }
    }

    pub fn with_loops(mut self, loops: u32) -> Self {
        self.loops = loops;
        self
    }

    pub fn with_loop_type(mut self, loop_type: LoopType) -> Self {
        self.loop_type = loop_type;
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.formula = Formula::new(easing);
        self
    }

    pub fn with_formula(mut self, formula: Formula) -> Self {
        self.formula = formula;
        self
    }

    /// Check the settings describe a playable timeline
    pub fn validate(&self) -> Result<()> {
        if !self.loop_duration.is_finite() || self.loop_duration < 0.0 {
            return Err(AnimationError::InvalidDuration(self.loop_duration));
        }
        if self.loops == 0 {
            return Err(AnimationError::InvalidLoopCount);
        }
        Ok(())
    }

    pub(crate) fn timing(&self) -> Timing {
        Timing {
            loop_duration: self.loop_duration,
            loops: self.loops,
            loop_type: self.loop_type,
            formula: self.formula,
        }
    }
}
