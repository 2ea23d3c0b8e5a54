use serde_derive::Serialize;

use crate::bbox::{BBox, Corners, Ltrb};
use crate::detection::Detection;
use crate::motion::MotionHistory;
use crate::orientation::OrientationSmoother;
use nalgebra as na;

/// Tentative -> Confirmed -> Lost. Lost is terminal.
#[derive(Serialize, Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Tentative,
    Confirmed,
    Lost,
}

#[derive(Debug, Clone)]
pub struct Track {
    pub(crate) id: u64,
    pub(crate) bbox: BBox<Ltrb>,
    pub(crate) center: na::Point2<f32>,
    pub(crate) class: String,
    pub(crate) confidence: f32,
    pub(crate) orientation: OrientationSmoother,
    pub(crate) motion: MotionHistory,
    pub(crate) first_seen: f64,
    pub(crate) last_seen: f64,
    pub(crate) frames_tracked: u32,
    pub(crate) frames_missing: u32,
    pub(crate) state: LifecycleState,
}

impl Track {
    pub(crate) fn new(
        id: u64,
        det: &Detection,
        ts: f64,
        min_hits: u32,
        orientation_window: usize,
        position_window: usize,
    ) -> Self {
        let center = det.bbox.center();

        let mut orientation = OrientationSmoother::new(orientation_window);
        if let Some(heading) = det.heading() {
            orientation.push(heading);
        }

        let mut motion = MotionHistory::new(position_window);
        motion.push(center);

        let mut track = Self {
            id,
            bbox: det.bbox,
            center,
            class: det.class.clone(),
            confidence: det.confidence,
            orientation,
            motion,
            first_seen: ts,
            last_seen: ts,
            frames_tracked: 1,
            frames_missing: 0,
            state: LifecycleState::Tentative,
        };

        track.try_confirm(min_hits);
        track
    }

    /// Applies a matched detection. Returns true when this hit confirmed the track.
    pub(crate) fn hit(&mut self, det: &Detection, ts: f64, min_hits: u32) -> bool {
        self.bbox = det.bbox;
        self.center = det.bbox.center();
        self.class = det.class.clone();
        self.confidence = det.confidence;
        self.last_seen = ts;
        self.frames_tracked += 1;
        self.frames_missing = 0;

        self.motion.push(self.center);

        if let Some(heading) = det.heading() {
            self.orientation.push(heading);
        }

        self.try_confirm(min_hits)
    }

    /// Ages an unmatched track. Returns true once it has gone Lost.
    pub(crate) fn miss(&mut self, max_age: u32) -> bool {
        self.frames_missing += 1;

        if self.frames_missing > max_age {
            self.state = LifecycleState::Lost;
        }

        self.state == LifecycleState::Lost
    }

    fn try_confirm(&mut self, min_hits: u32) -> bool {
        if self.state == LifecycleState::Tentative && self.frames_tracked >= min_hits {
            self.state = LifecycleState::Confirmed;
            return true;
        }

        false
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn bbox(&self) -> &BBox<Ltrb> {
        &self.bbox
    }

    #[inline]
    pub fn center(&self) -> na::Point2<f32> {
        self.center
    }

    #[inline]
    pub fn class(&self) -> &str {
        &self.class
    }

    #[inline]
    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Smoothed heading in [0, 360).
    #[inline]
    pub fn orientation(&self) -> f32 {
        self.orientation.value()
    }

    /// Raw heading samples, oldest first.
    #[inline]
    pub fn orientation_history(&self) -> impl Iterator<Item = &f32> {
        self.orientation.samples()
    }

    /// Recent centers, oldest first.
    #[inline]
    pub fn position_history(&self) -> impl Iterator<Item = &na::Point2<f32>> {
        self.motion.iter_points()
    }

    #[inline]
    pub fn velocity(&self) -> na::Vector2<f32> {
        self.motion.velocity()
    }

    #[inline]
    pub fn predicted_center(&self) -> na::Point2<f32> {
        self.motion.predict().unwrap_or(self.center)
    }

    #[inline]
    pub fn first_seen(&self) -> f64 {
        self.first_seen
    }

    #[inline]
    pub fn last_seen(&self) -> f64 {
        self.last_seen
    }

    #[inline]
    pub fn frames_tracked(&self) -> u32 {
        self.frames_tracked
    }

    #[inline]
    pub fn frames_missing(&self) -> u32 {
        self.frames_missing
    }

    #[inline]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    #[inline]
    pub fn is_confirmed(&self) -> bool {
        self.state == LifecycleState::Confirmed
    }

    pub fn view(&self) -> TrackView {
        self.into()
    }
}

#[derive(Serialize, Debug, Copy, Clone, PartialEq)]
pub struct Xy {
    pub x: f32,
    pub y: f32,
}

/// Transport shape of a track, as forwarded to clients.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TrackView {
    pub id: u64,
    pub class: String,
    pub bbox: Corners,
    pub center: Xy,
    pub confidence: f32,
    pub orientation: f32,
    pub velocity: Xy,
    pub frames_tracked: u32,
}

#[inline]
fn round_to(v: f32, decimals: i32) -> f32 {
    let p = 10f32.powi(decimals);
    (v * p).round() / p
}

impl From<&Track> for TrackView {
    fn from(t: &Track) -> TrackView {
        let velocity = t.velocity();

        TrackView {
            id: t.id,
            class: t.class.clone(),
            bbox: Corners::from(&t.bbox),
            center: Xy {
                x: t.center.x,
                y: t.center.y,
            },
            confidence: round_to(t.confidence, 2),
            orientation: round_to(t.orientation(), 1),
            velocity: Xy {
                x: round_to(velocity.x, 1),
                y: round_to(velocity.y, 1),
            },
            frames_tracked: t.frames_tracked,
        }
    }
}
