//! Outbound direction command.
//!
//! Wire frame, 6 bytes: `[up, down, left, right, 0, 0]`. Each channel
//! drives one transducer of the wearable and is never negative; a 2D
//! vector maps to at most one channel per axis.

use handguide_processing_core::DirectionalFeedback;
use serde::{Deserialize, Serialize};

pub const COMMAND_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DirectionCommand {
    pub up: u8,
    pub down: u8,
    pub left: u8,
    pub right: u8,
}

impl DirectionCommand {
    /// Channels from a vector with components in `[-1, 1]`.
    /// Negative `y` drives `up`, negative `x` drives `left`.
    pub fn from_vector(x: f64, y: f64) -> Self {
        Self {
            up: channel(-y),
            down: channel(y),
            left: channel(-x),
            right: channel(x),
        }
    }

    pub fn encode(&self) -> [u8; COMMAND_LEN] {
        [self.up, self.down, self.left, self.right, 0, 0]
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

impl From<DirectionalFeedback> for DirectionCommand {
    fn from(feedback: DirectionalFeedback) -> Self {
        Self::from_vector(feedback.vx, feedback.vy)
    }
}

fn channel(v: f64) -> u8 {
    if v > 0.0 {
        (v * 255.0).round().min(255.0) as u8
    } else {
        0
    }
}
