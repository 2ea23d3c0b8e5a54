use std::time::{SystemTime, UNIX_EPOCH};

use crate::association::Associator;
use crate::calibration::{CalibrationMapper, CalibrationStatus};
use crate::config::SessionConfig;
use crate::detection::Detection;
use crate::error::Error;
use crate::frame::Frame;
use crate::track::{LifecycleState, Track, TrackView};

fn wall_clock() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Tracking state of one camera stream.
///
/// Every mutation takes `&mut self`, so a session has exactly one writer at a
/// time. Callers feeding one stream from several threads wrap it in a mutex or
/// an actor; independent sessions share nothing.
#[derive(Debug, Clone)]
pub struct TrackingSession {
    config: SessionConfig,
    associator: Associator,
    tracks: Vec<Track>,
    next_id: u64,
    frame_count: u64,
    calibration: CalibrationMapper,
}

impl TrackingSession {
    pub fn new(config: SessionConfig) -> Result<Self, Error> {
        config.validate()?;

        Ok(Self::from_validated(config))
    }

    pub(crate) fn from_validated(config: SessionConfig) -> Self {
        Self {
            associator: Associator::new(&config),
            calibration: CalibrationMapper::new(config.frame_size, config.board_size),
            tracks: Vec::with_capacity(32),
            next_id: 1,
            frame_count: 0,
            config,
        }
    }

    #[inline]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[inline]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Advances one frame stamped with the wall clock and returns the
    /// confirmed tracks.
    pub fn update(&mut self, detections: &[Detection]) -> Vec<Track> {
        self.update_at(wall_clock(), detections)
    }

    /// Like [`update`](Self::update), but takes the timestamp from the frame and
    /// follows its dimensions for calibration.
    pub fn update_frame(&mut self, frame: &Frame) -> Vec<Track> {
        let (fw, fh) = frame.dims;
        if fw > 0 && fh > 0 {
            self.calibration.set_image_size(fw as f32, fh as f32);
        }

        self.update_at(frame.timestamp, &frame.detections)
    }

    pub fn update_at(&mut self, ts: f64, detections: &[Detection]) -> Vec<Track> {
        self.frame_count += 1;

        let dets: Vec<&Detection> = detections
            .iter()
            .enumerate()
            .filter_map(|(idx, det)| match det.validate(idx) {
                Ok(()) => Some(det),
                Err(err) => {
                    log::warn!("frame {}: skipping {}", self.frame_count, err);
                    None
                }
            })
            .collect();

        let assignment = {
            let tracks: Vec<&Track> = self.tracks.iter().collect();
            self.associator.associate(&dets, &tracks)
        };

        log::debug!(
            "frame {}: {} detections, {} tracks, {} matched",
            self.frame_count,
            dets.len(),
            self.tracks.len(),
            assignment.matches.len()
        );

        let (min_hits, max_age) = (self.config.min_hits, self.config.max_age);

        for &(d, t, _) in &assignment.matches {
            let track = &mut self.tracks[t];

            if track.hit(dets[d], ts, min_hits) {
                log::debug!("track {} confirmed", track.id);
            }
        }

        for &t in &assignment.unmatched_tracks {
            self.tracks[t].miss(max_age);
        }

        self.tracks.retain(|t| {
            if t.state == LifecycleState::Lost {
                log::debug!("track {} lost after {} frames", t.id, t.frames_missing);
                return false;
            }

            true
        });

        for &d in &assignment.unmatched_detections {
            self.spawn(dets[d], ts);
        }

        self.active_tracks()
    }

    fn spawn(&mut self, det: &Detection, ts: f64) {
        let id = self.next_id;
        self.next_id += 1;

        let track = Track::new(
            id,
            det,
            ts,
            self.config.min_hits,
            self.config.orientation_history_size,
            self.config.position_history_size,
        );

        log::debug!(
            "track {} spawned: {} at ({:.1}, {:.1})",
            id,
            track.class,
            track.center.x,
            track.center.y
        );

        self.tracks.push(track);
    }

    /// Confirmed tracks only.
    pub fn active_tracks(&self) -> Vec<Track> {
        self.tracks
            .iter()
            .filter(|t| t.is_confirmed())
            .cloned()
            .collect()
    }

    /// Every live track, tentative ones included, in creation order.
    #[inline]
    pub fn get_all_tracks(&self) -> &[Track] {
        &self.tracks
    }

    #[inline]
    pub fn get_track(&self, id: u64) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    pub fn try_get_track(&self, id: u64) -> Result<&Track, Error> {
        self.get_track(id).ok_or(Error::UnknownTrackId(id))
    }

    /// Transport views of the confirmed tracks.
    pub fn views(&self) -> Vec<TrackView> {
        self.tracks
            .iter()
            .filter(|t| t.is_confirmed())
            .map(TrackView::from)
            .collect()
    }

    /// Drops all tracks and restarts ids from 1. Calibration is kept.
    pub fn reset(&mut self) {
        log::info!(
            "tracking session reset, dropping {} tracks",
            self.tracks.len()
        );

        self.tracks.clear();
        self.next_id = 1;
        self.frame_count = 0;
    }

    /// Drops collected points and any homography. The board size from the
    /// config or the last simple calibration is kept for the linear fallback.
    pub fn start_calibration(&mut self) {
        self.calibration.start();
    }

    pub fn add_calibration_point(&mut self, image: (f32, f32), board: (f32, f32)) -> usize {
        self.calibration.add_point(image, board)
    }

    pub fn try_finish_calibration(&mut self) -> Result<(), Error> {
        self.calibration.finish()
    }

    /// False when there are fewer than 4 points or they are degenerate; the
    /// linear fallback then stays in effect.
    pub fn finish_calibration(&mut self) -> bool {
        self.try_finish_calibration().is_ok()
    }

    pub fn set_simple_calibration(&mut self, board_width: f32, board_height: f32) -> bool {
        self.calibration
            .set_simple(board_width, board_height)
            .is_ok()
    }

    #[inline]
    pub fn transform(&self, px: f32, py: f32) -> (f32, f32) {
        self.calibration.transform(px, py)
    }

    #[inline]
    pub fn calibration_status(&self) -> CalibrationStatus {
        self.calibration.status()
    }

    #[inline]
    pub fn calibration(&self) -> &CalibrationMapper {
        &self.calibration
    }

    /// Board coordinates of a track's center.
    pub fn board_position(&self, id: u64) -> Option<(f32, f32)> {
        let c = self.get_track(id)?.center;

        Some(self.transform(c.x, c.y))
    }
}
