use crate::detection::Detection;

pub struct Frame {
    /// (width, height) in px
    pub dims: (u32, u32),
    pub detections: Vec<Detection>,
    pub timestamp: f64, // in seconds
}

impl Frame {
    pub fn new(dims: (u32, u32), timestamp: f64, detections: Vec<Detection>) -> Self {
        Self {
            dims,
            detections,
            timestamp,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.detections.len()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Detection> {
        self.detections.iter()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}
