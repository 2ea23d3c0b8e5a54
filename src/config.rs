use serde_derive::{Deserialize, Serialize};

use crate::association::{MatchStrategy, PROXIMITY_WEIGHT};
use crate::error::Error;
use crate::orientation;

/// Options fixed at session construction.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Consecutive missed frames tolerated before a track is purged.
    pub max_age: u32,
    /// Matches needed before a track is confirmed.
    pub min_hits: u32,
    pub iou_threshold: f32,
    /// Center distance (px) at which proximity drops to zero.
    pub distance_threshold: f32,
    /// Minimum proximity for a distance-only match.
    pub proximity_threshold: f32,
    /// Overrides the derived `min(iou_threshold, 0.5 * proximity_threshold)`.
    pub match_threshold: Option<f32>,
    pub use_iou: bool,
    pub strategy: MatchStrategy,
    /// Clamped into 5..=10.
    pub orientation_history_size: usize,
    pub position_history_size: usize,
    /// Camera image (width, height) in px.
    pub frame_size: (f32, f32),
    /// Board (width, height); none means pixels pass through uncalibrated.
    pub board_size: Option<(f32, f32)>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_age: 30,
            min_hits: 1,
            iou_threshold: 0.15,
            distance_threshold: 100.0,
            proximity_threshold: 0.3,
            match_threshold: None,
            use_iou: true,
            strategy: MatchStrategy::Greedy,
            orientation_history_size: orientation::MIN_HISTORY,
            position_history_size: 10,
            frame_size: (1280.0, 720.0),
            board_size: None,
        }
    }
}

impl SessionConfig {
    /// Nearest-center tracker: no IoU term, confirmed on first sight.
    pub fn simple() -> Self {
        Self {
            min_hits: 1,
            use_iou: false,
            proximity_threshold: 0.02,
            orientation_history_size: orientation::MAX_HISTORY,
            ..Self::default()
        }
    }

    pub fn effective_match_threshold(&self) -> f32 {
        self.match_threshold.unwrap_or_else(|| {
            if self.use_iou {
                self.iou_threshold
                    .min(PROXIMITY_WEIGHT * self.proximity_threshold)
            } else {
                PROXIMITY_WEIGHT * self.proximity_threshold
            }
        })
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.min_hits == 0 {
            return Err(Error::InvalidConfig("min_hits must be at least 1".into()));
        }

        let positive = |name: &str, v: f32| {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(Error::InvalidConfig(format!("{} must be positive, got {}", name, v)))
            }
        };

        positive("distance_threshold", self.distance_threshold)?;
        positive("match_threshold", self.effective_match_threshold())?;

        if self.use_iou {
            positive("iou_threshold", self.iou_threshold)?;
        }

        if self.match_threshold.is_none() {
            positive("proximity_threshold", self.proximity_threshold)?;
        }

        if !(self.frame_size.0 > 0.0 && self.frame_size.1 > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "frame_size must be positive, got {:?}",
                self.frame_size
            )));
        }

        if let Some((w, h)) = self.board_size {
            positive("board width", w)?;
            positive("board height", h)?;
        }

        Ok(())
    }
}
