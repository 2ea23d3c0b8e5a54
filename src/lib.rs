pub mod association;
pub mod bbox;
pub mod calibration;
pub mod config;
pub mod detection;
pub mod error;
pub mod frame;
pub mod math;
pub mod motion;
pub mod orientation;
pub mod session;
pub mod track;

mod circular_queue;

pub use association::{Assignment, Associator, MatchStrategy};
pub use calibration::{CalibrationMapper, CalibrationModel, CalibrationStatus};
pub use config::SessionConfig;
pub use detection::Detection;
pub use error::Error;
pub use frame::Frame;
pub use session::TrackingSession;
pub use track::{LifecycleState, Track, TrackView};

use std::collections::HashMap;
use std::sync::Arc;

/// Owns one [`TrackingSession`] per video source. Sessions are created on the
/// first frame of a source and never share state.
pub struct Tracker {
    config: SessionConfig,
    sessions: HashMap<String, TrackingSession>,
}

impl Tracker {
    pub fn new(config: SessionConfig) -> Result<Self, Error> {
        config.validate()?;

        Ok(Self {
            config,
            sessions: HashMap::new(),
        })
    }

    /// The session for `src`, created on first use.
    pub fn session_mut(&mut self, src: &str) -> &mut TrackingSession {
        if !self.sessions.contains_key(src) {
            log::debug!("new tracking session for source {:?}", src);
        }

        let config = &self.config;
        self.sessions
            .entry(src.to_string())
            .or_insert_with(|| TrackingSession::from_validated(config.clone()))
    }

    #[inline]
    pub fn session(&self, src: &str) -> Option<&TrackingSession> {
        self.sessions.get(src)
    }

    /// Feeds `frames` in order and returns the confirmed tracks after the last one.
    pub fn update(&mut self, frames: &[Frame], src: &str) -> Arc<[Track]> {
        let session = self.session_mut(src);

        for frame in frames {
            session.update_frame(frame);
        }

        session.active_tracks().into()
    }

    pub fn tracks(&self, src: &str) -> Arc<[Track]> {
        if let Some(session) = self.sessions.get(src) {
            return session.active_tracks().into();
        }

        Arc::new([])
    }

    /// Detaches a source, e.g. when switching video inputs.
    pub fn remove(&mut self, src: &str) -> Option<TrackingSession> {
        self.sessions.remove(src)
    }

    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.sessions.keys().map(String::as_str)
    }
}
