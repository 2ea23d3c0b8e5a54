use serde_derive::{Deserialize, Serialize};

use crate::bbox::{BBox, Ltrb};
use crate::error::Error;
use crate::math;

/// One detector output for a single frame. Carries no identity.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Detection {
    pub bbox: BBox<Ltrb>,
    #[serde(default = "unknown_class")]
    pub class: String,
    #[serde(default = "full_confidence")]
    pub confidence: f32,
    /// Heading hint in degrees
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orientation: Option<f32>,
}

fn unknown_class() -> String {
    "unknown".to_string()
}

fn full_confidence() -> f32 {
    1.0
}

impl Detection {
    pub fn new<S: Into<String>>(bbox: BBox<Ltrb>, class: S, confidence: f32) -> Self {
        Self {
            bbox,
            class: class.into(),
            confidence,
            orientation: None,
        }
    }

    /// For adapters that report boxes as center + size.
    pub fn from_center_size<S: Into<String>>(
        cx: f32,
        cy: f32,
        w: f32,
        h: f32,
        class: S,
        confidence: f32,
    ) -> Self {
        Self::new(BBox::xywh(cx, cy, w, h).as_ltrb(), class, confidence)
    }

    pub fn with_orientation(mut self, degrees: f32) -> Self {
        self.orientation = Some(degrees);
        self
    }

    /// Orientation hint wrapped into [0, 360), non-finite hints dropped.
    #[inline]
    pub fn heading(&self) -> Option<f32> {
        self.orientation
            .filter(|a| a.is_finite())
            .map(math::normalize_degrees)
    }

    /// Checks the geometry; `index` is the position within the frame and only
    /// ends up in the error.
    pub fn validate(&self, index: usize) -> Result<(), Error> {
        if !self.bbox.is_finite() {
            return Err(Error::InvalidDetection {
                index,
                reason: "non-finite box coordinates",
            });
        }

        if self.bbox.right() < self.bbox.left() || self.bbox.bottom() < self.bbox.top() {
            return Err(Error::InvalidDetection {
                index,
                reason: "inverted box corners",
            });
        }

        if !self.confidence.is_finite() {
            return Err(Error::InvalidDetection {
                index,
                reason: "non-finite confidence",
            });
        }

        Ok(())
    }
}
