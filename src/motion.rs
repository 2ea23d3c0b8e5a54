use crate::circular_queue::CircularQueue;
use nalgebra as na;

/// Recent centers of one track. Only feeds display and extrapolation, never
/// the association step.
#[derive(Debug, Clone)]
pub struct MotionHistory {
    history: CircularQueue<na::Point2<f32>>,
    velocity: na::Vector2<f32>,
}

impl MotionHistory {
    pub fn new(hcount: usize) -> Self {
        Self {
            history: CircularQueue::with_capacity(hcount.max(2)),
            velocity: na::Vector2::zeros(),
        }
    }

    pub fn push(&mut self, pos: na::Point2<f32>) {
        if let Some(prev) = self.history.newest() {
            self.velocity = pos - prev;
        }

        self.history.push(pos);
    }

    /// Displacement between the last two centers, in px per frame.
    #[inline]
    pub fn velocity(&self) -> na::Vector2<f32> {
        self.velocity
    }

    /// One frame ahead at the current velocity.
    #[inline]
    pub fn predict(&self) -> Option<na::Point2<f32>> {
        self.history.newest().map(|p| p + self.velocity)
    }

    #[inline]
    pub fn iter_points(&self) -> impl Iterator<Item = &na::Point2<f32>> {
        self.history.asc_iter()
    }

    #[inline]
    pub fn num_points(&self) -> usize {
        self.history.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn velocity_is_last_delta() {
        let mut m = MotionHistory::new(10);
        assert_eq!(m.velocity(), na::Vector2::zeros());

        m.push(na::Point2::new(10.0, 10.0));
        assert_eq!(m.velocity(), na::Vector2::zeros());

        m.push(na::Point2::new(13.0, 6.0));
        m.push(na::Point2::new(15.0, 5.0));

        assert_eq!(m.velocity(), na::Vector2::new(2.0, -1.0));
        assert_eq!(m.predict(), Some(na::Point2::new(17.0, 4.0)));
        assert_eq!(m.num_points(), 3);
    }

    #[test]
    fn history_is_bounded() {
        let mut m = MotionHistory::new(3);
        for i in 0..10 {
            m.push(na::Point2::new(i as f32, 0.0));
        }

        let xs: Vec<f32> = m.iter_points().map(|p| p.x).collect();
        assert_eq!(xs, vec![7.0, 8.0, 9.0]);
    }
}
