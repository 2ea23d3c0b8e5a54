use nalgebra as na;
use serde_derive::Serialize;

use crate::error::Error;
use crate::math;

/// Image/board point correspondences and the homography solved from them.
#[derive(Debug, Clone, Default)]
pub struct CalibrationModel {
    image_points: Vec<na::Point2<f64>>,
    board_points: Vec<na::Point2<f64>>,
    homography: Option<na::Matrix3<f64>>,
}

impl CalibrationModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pairs are matched by insertion order. Returns the number of pairs.
    pub fn add_point(&mut self, image: (f32, f32), board: (f32, f32)) -> usize {
        self.image_points
            .push(na::Point2::new(image.0 as f64, image.1 as f64));
        self.board_points
            .push(na::Point2::new(board.0 as f64, board.1 as f64));

        self.image_points.len()
    }

    #[inline]
    pub fn points_count(&self) -> usize {
        self.image_points.len()
    }

    #[inline]
    pub fn is_calibrated(&self) -> bool {
        self.homography.is_some()
    }

    #[inline]
    pub fn homography(&self) -> Option<&na::Matrix3<f64>> {
        self.homography.as_ref()
    }

    /// Solves the image -> board homography. On failure the model is left
    /// uncalibrated.
    pub fn solve(&mut self) -> Result<(), Error> {
        self.homography = None;
        self.homography = Some(math::find_homography(
            &self.image_points,
            &self.board_points,
        )?);

        Ok(())
    }

    pub fn clear(&mut self) {
        self.image_points.clear();
        self.board_points.clear();
        self.homography = None;
    }

    #[inline]
    pub fn map(&self, px: f32, py: f32) -> Option<(f32, f32)> {
        let p = math::project(self.homography.as_ref()?, px as f64, py as f64)?;

        Some((p.x as f32, p.y as f32))
    }
}

#[derive(Serialize, Debug, Copy, Clone, PartialEq)]
pub struct CalibrationStatus {
    pub is_calibrated: bool,
    pub points_count: usize,
    pub board_size: Option<(f32, f32)>,
}

/// Pixel -> board coordinates. Uses the homography once calibrated and a
/// proportional image-to-board scale otherwise (identity without a board size).
#[derive(Debug, Clone)]
pub struct CalibrationMapper {
    model: CalibrationModel,
    image_size: (f32, f32),
    board_size: Option<(f32, f32)>,
}

impl CalibrationMapper {
    pub fn new(image_size: (f32, f32), board_size: Option<(f32, f32)>) -> Self {
        Self {
            model: CalibrationModel::new(),
            image_size,
            board_size,
        }
    }

    #[inline]
    pub fn model(&self) -> &CalibrationModel {
        &self.model
    }

    #[inline]
    pub fn image_size(&self) -> (f32, f32) {
        self.image_size
    }

    pub fn set_image_size(&mut self, width: f32, height: f32) {
        self.image_size = (width, height);
    }

    #[inline]
    pub fn board_size(&self) -> Option<(f32, f32)> {
        self.board_size
    }

    /// Drops any previous points and homography.
    pub fn start(&mut self) {
        self.model.clear();
    }

    #[inline]
    pub fn add_point(&mut self, image: (f32, f32), board: (f32, f32)) -> usize {
        self.model.add_point(image, board)
    }

    pub fn finish(&mut self) -> Result<(), Error> {
        match self.model.solve() {
            Ok(()) => {
                log::info!(
                    "calibration solved from {} point pairs",
                    self.model.points_count()
                );
                Ok(())
            }
            Err(err) => {
                log::warn!("calibration failed: {}", err);
                Err(err)
            }
        }
    }

    /// Maps the four image corners onto a `width` x `height` board. A rejected
    /// board leaves the mapper uncalibrated.
    pub fn set_simple(&mut self, width: f32, height: f32) -> Result<(), Error> {
        self.model.clear();

        if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
            log::warn!("simple calibration rejected: board {}x{}", width, height);
            return Err(Error::DegenerateCalibration("empty board area"));
        }

        let (iw, ih) = self.image_size;

        self.board_size = Some((width, height));
        self.model.add_point((0.0, 0.0), (0.0, 0.0));
        self.model.add_point((iw, 0.0), (width, 0.0));
        self.model.add_point((iw, ih), (width, height));
        self.model.add_point((0.0, ih), (0.0, height));

        self.finish()
    }

    pub fn transform(&self, px: f32, py: f32) -> (f32, f32) {
        if let Some(p) = self.model.map(px, py) {
            return p;
        }

        self.linear(px, py)
    }

    #[inline]
    pub fn linear(&self, px: f32, py: f32) -> (f32, f32) {
        let (iw, ih) = self.image_size;

        match self.board_size {
            Some((bw, bh)) if iw > 0.0 && ih > 0.0 => (px * bw / iw, py * bh / ih),
            _ => (px, py),
        }
    }

    pub fn status(&self) -> CalibrationStatus {
        CalibrationStatus {
            is_calibrated: self.model.is_calibrated(),
            points_count: self.model.points_count(),
            board_size: self.board_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: (f32, f32), b: (f32, f32)) -> bool {
        (a.0 - b.0).abs() < 1e-2 && (a.1 - b.1).abs() < 1e-2
    }

    #[test]
    fn corners_round_trip() {
        let (w, h) = (1280.0, 720.0);
        let (bw, bh) = (30.0, 20.0);

        let mut m = CalibrationMapper::new((w, h), None);
        m.start();
        m.add_point((0.0, 0.0), (0.0, 0.0));
        m.add_point((w, 0.0), (bw, 0.0));
        m.add_point((w, h), (bw, bh));
        assert_eq!(m.add_point((0.0, h), (0.0, bh)), 4);
        m.finish().unwrap();

        assert!(m.status().is_calibrated);
        assert!(close(m.transform(0.0, 0.0), (0.0, 0.0)));
        assert!(close(m.transform(w, 0.0), (bw, 0.0)));
        assert!(close(m.transform(w, h), (bw, bh)));
        assert!(close(m.transform(0.0, h), (0.0, bh)));
        assert!(close(m.transform(w / 2.0, h / 2.0), (bw / 2.0, bh / 2.0)));
    }

    #[test]
    fn too_few_points_keeps_fallback() {
        let mut m = CalibrationMapper::new((100.0, 100.0), Some((10.0, 10.0)));
        m.add_point((0.0, 0.0), (0.0, 0.0));
        m.add_point((100.0, 0.0), (10.0, 0.0));
        m.add_point((100.0, 100.0), (10.0, 10.0));

        assert_eq!(
            m.finish(),
            Err(Error::InsufficientCalibrationPoints {
                found: 3,
                required: 4
            })
        );
        assert!(!m.status().is_calibrated);
        assert_eq!(m.transform(50.0, 20.0), (5.0, 2.0));
    }

    #[test]
    fn failed_solve_clears_previous_calibration() {
        let mut m = CalibrationMapper::new((100.0, 100.0), None);
        m.set_simple(10.0, 10.0).unwrap();
        assert!(m.status().is_calibrated);

        m.start();
        for i in 0..4 {
            let v = i as f32;
            m.add_point((v, v), (v, 0.0));
        }

        assert!(matches!(m.finish(), Err(Error::DegenerateCalibration(_))));
        assert!(!m.status().is_calibrated);
    }

    #[test]
    fn uncalibrated_without_board_is_identity() {
        let m = CalibrationMapper::new((1280.0, 720.0), None);
        assert_eq!(m.transform(321.5, 17.0), (321.5, 17.0));
    }

    #[test]
    fn simple_calibration_scales_the_frame() {
        let mut m = CalibrationMapper::new((1280.0, 720.0), None);
        m.set_simple(64.0, 36.0).unwrap();

        assert!(close(m.transform(640.0, 360.0), (32.0, 18.0)));
        assert!(close(m.transform(1280.0, 0.0), (64.0, 0.0)));
        assert_eq!(m.status().board_size, Some((64.0, 36.0)));
        assert_eq!(m.status().points_count, 4);
    }

    #[test]
    fn simple_calibration_rejects_empty_board() {
        let mut m = CalibrationMapper::new((1280.0, 720.0), None);
        assert!(m.set_simple(0.0, 36.0).is_err());
        assert_eq!(m.board_size(), None);
    }

    #[test]
    fn rejected_simple_calibration_drops_previous_homography() {
        let mut m = CalibrationMapper::new((1280.0, 720.0), None);
        m.set_simple(64.0, 36.0).unwrap();
        assert!(m.status().is_calibrated);

        assert!(m.set_simple(0.0, 36.0).is_err());

        let status = m.status();
        assert!(!status.is_calibrated);
        assert_eq!(status.points_count, 0);
        // linear scale against the last valid board
        assert_eq!(m.transform(640.0, 360.0), (32.0, 18.0));
        assert_eq!(m.transform(640.0, 360.0), m.linear(640.0, 360.0));
    }
}
