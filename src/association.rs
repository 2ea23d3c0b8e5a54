use munkres::{solve_assignment, WeightMatrix};
use nalgebra as na;
use serde_derive::{Deserialize, Serialize};

use crate::bbox::{BBox, Ltrb};
use crate::config::SessionConfig;
use crate::detection::Detection;
use crate::track::Track;

/// Pure proximity never scores above half a perfect overlap.
pub const PROXIMITY_WEIGHT: f32 = 0.5;

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    /// Repeatedly commits the best remaining pair. Ties go to the first pair
    /// in row-major (detection, track) order.
    #[default]
    Greedy,
    /// Optimal assignment over `1 - score`.
    Hungarian,
}

/// Outcome of one association pass. Indices refer to the detection slice and
/// the track slice handed to [`Associator::associate`].
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Assignment {
    /// (detection index, track index, score)
    pub matches: Vec<(usize, usize, f32)>,
    pub unmatched_detections: Vec<usize>,
    pub unmatched_tracks: Vec<usize>,
}

#[derive(Debug, Copy, Clone)]
pub struct Associator {
    pub distance_threshold: f32,
    pub match_threshold: f32,
    pub use_iou: bool,
    pub strategy: MatchStrategy,
}

impl Associator {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            distance_threshold: config.distance_threshold,
            match_threshold: config.effective_match_threshold(),
            use_iou: config.use_iou,
            strategy: config.strategy,
        }
    }

    /// `1 - d / distance_threshold`, floored at zero.
    #[inline]
    pub fn proximity(&self, a: &na::Point2<f32>, b: &na::Point2<f32>) -> f32 {
        (1.0 - na::distance(a, b) / self.distance_threshold).max(0.0)
    }

    /// `max(iou, 0.5 * proximity)`
    pub fn score(&self, det: &BBox<Ltrb>, track: &BBox<Ltrb>) -> f32 {
        let iou = if self.use_iou { det.iou(track) } else { 0.0 };
        let proximity = self.proximity(&det.center(), &track.center());

        iou.max(PROXIMITY_WEIGHT * proximity)
    }

    /// Rows are detections, columns are tracks.
    pub fn score_matrix(&self, dets: &[&Detection], tracks: &[&Track]) -> na::DMatrix<f32> {
        na::DMatrix::from_fn(dets.len(), tracks.len(), |r, c| {
            self.score(&dets[r].bbox, &tracks[c].bbox)
        })
    }

    pub fn associate(&self, dets: &[&Detection], tracks: &[&Track]) -> Assignment {
        if dets.is_empty() || tracks.is_empty() {
            return Assignment {
                matches: Vec::new(),
                unmatched_detections: (0..dets.len()).collect(),
                unmatched_tracks: (0..tracks.len()).collect(),
            };
        }

        let scores = self.score_matrix(dets, tracks);

        let matches = match self.strategy {
            MatchStrategy::Greedy => self.greedy(scores),
            MatchStrategy::Hungarian => self.hungarian(&scores).unwrap_or_else(|| {
                log::warn!("assignment could not be solved, falling back to greedy");
                self.greedy(scores)
            }),
        };

        let mut det_used = vec![false; dets.len()];
        let mut trk_used = vec![false; tracks.len()];
        for &(d, t, _) in &matches {
            det_used[d] = true;
            trk_used[t] = true;
        }

        Assignment {
            matches,
            unmatched_detections: (0..dets.len()).filter(|&i| !det_used[i]).collect(),
            unmatched_tracks: (0..tracks.len()).filter(|&i| !trk_used[i]).collect(),
        }
    }

    fn greedy(&self, mut scores: na::DMatrix<f32>) -> Vec<(usize, usize, f32)> {
        let (rows, cols) = scores.shape();
        let mut matches = Vec::with_capacity(rows.min(cols));

        for _ in 0..rows.min(cols) {
            let mut best: Option<(usize, usize, f32)> = None;

            for r in 0..rows {
                for c in 0..cols {
                    let s = scores[(r, c)];
                    if best.map_or(true, |(_, _, b)| s > b) {
                        best = Some((r, c, s));
                    }
                }
            }

            let (r, c, s) = match best {
                Some(b) if b.2 >= self.match_threshold => b,
                _ => break,
            };

            matches.push((r, c, s));
            scores.row_mut(r).fill(0.0);
            scores.column_mut(c).fill(0.0);
        }

        matches
    }

    fn hungarian(&self, scores: &na::DMatrix<f32>) -> Option<Vec<(usize, usize, f32)>> {
        let (rows, cols) = scores.shape();
        let n = rows.max(cols);

        let mut weights = WeightMatrix::from_fn(n, |(r, c)| {
            if r < rows && c < cols {
                1.0 - scores[(r, c)]
            } else {
                1.0
            }
        });

        let solved = solve_assignment(&mut weights).ok()?;

        let mut matches: Vec<_> = solved
            .into_iter()
            .filter(|p| p.row < rows && p.column < cols)
            .map(|p| (p.row, p.column, scores[(p.row, p.column)]))
            .filter(|&(_, _, s)| s >= self.match_threshold)
            .collect();

        matches.sort_by_key(|&(r, _, _)| r);

        Some(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(x1: f32, y1: f32, x2: f32, y2: f32) -> Detection {
        Detection::new(BBox::ltrb(x1, y1, x2, y2), "mini", 1.0)
    }

    fn track(id: u64, x1: f32, y1: f32, x2: f32, y2: f32) -> Track {
        Track::new(id, &det(x1, y1, x2, y2), 0.0, 1, 5, 10)
    }

    fn associator(strategy: MatchStrategy) -> Associator {
        Associator::new(&SessionConfig {
            strategy,
            ..SessionConfig::default()
        })
    }

    #[test]
    fn score_prefers_overlap_but_falls_back_to_proximity() {
        let a = associator(MatchStrategy::Greedy);
        let b = BBox::ltrb(100.0, 100.0, 140.0, 140.0);

        assert!((a.score(&b, &b) - 1.0).abs() < 1e-6);

        // 50 px apart, no overlap: 0.5 * (1 - 50 / 100)
        let far = BBox::ltrb(150.0, 100.0, 190.0, 140.0);
        assert!((a.score(&b, &far) - 0.25).abs() < 1e-6);

        let gone = BBox::ltrb(400.0, 400.0, 440.0, 440.0);
        assert_eq!(a.score(&b, &gone), 0.0);
    }

    #[test]
    fn iou_can_be_disabled() {
        let a = Associator {
            use_iou: false,
            ..associator(MatchStrategy::Greedy)
        };
        let b = BBox::ltrb(100.0, 100.0, 140.0, 140.0);

        assert!((a.score(&b, &b) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn greedy_takes_best_pairs_first() {
        let a = associator(MatchStrategy::Greedy);
        let dets = [det(0.0, 0.0, 10.0, 10.0), det(200.0, 200.0, 210.0, 210.0)];
        let tracks = [
            track(1, 201.0, 200.0, 211.0, 210.0),
            track(2, 1.0, 0.0, 11.0, 10.0),
        ];

        let d: Vec<&Detection> = dets.iter().collect();
        let t: Vec<&Track> = tracks.iter().collect();
        let res = a.associate(&d, &t);

        let pairs: Vec<(usize, usize)> = res.matches.iter().map(|&(d, t, _)| (d, t)).collect();
        assert_eq!(pairs.len(), 2);
        assert!(pairs.contains(&(0, 1)));
        assert!(pairs.contains(&(1, 0)));
        assert!(res.unmatched_detections.is_empty());
        assert!(res.unmatched_tracks.is_empty());
    }

    #[test]
    fn greedy_ties_resolve_in_row_major_order() {
        let a = associator(MatchStrategy::Greedy);
        let dets = [det(0.0, 0.0, 10.0, 10.0), det(0.0, 0.0, 10.0, 10.0)];
        let tracks = [track(1, 0.0, 0.0, 10.0, 10.0)];

        let d: Vec<&Detection> = dets.iter().collect();
        let t: Vec<&Track> = tracks.iter().collect();
        let res = a.associate(&d, &t);

        assert_eq!(res.matches.len(), 1);
        assert_eq!((res.matches[0].0, res.matches[0].1), (0, 0));
        assert_eq!(res.unmatched_detections, vec![1]);
    }

    #[test]
    fn pairs_below_threshold_stay_unmatched() {
        let a = associator(MatchStrategy::Greedy);
        let dets = [det(0.0, 0.0, 10.0, 10.0)];
        let tracks = [track(1, 500.0, 500.0, 510.0, 510.0)];

        let d: Vec<&Detection> = dets.iter().collect();
        let t: Vec<&Track> = tracks.iter().collect();
        let res = a.associate(&d, &t);

        assert!(res.matches.is_empty());
        assert_eq!(res.unmatched_detections, vec![0]);
        assert_eq!(res.unmatched_tracks, vec![0]);
    }

    #[test]
    fn hungarian_beats_greedy_on_crossed_pairs() {
        let dets = [det(0.0, 0.0, 40.0, 40.0), det(30.0, 0.0, 70.0, 40.0)];
        let tracks = [
            track(1, 15.0, 0.0, 55.0, 40.0),
            track(2, -20.0, 0.0, 20.0, 40.0),
        ];
        let d: Vec<&Detection> = dets.iter().collect();
        let t: Vec<&Track> = tracks.iter().collect();

        let res = associator(MatchStrategy::Hungarian).associate(&d, &t);
        let pairs: Vec<(usize, usize)> = res.matches.iter().map(|&(d, t, _)| (d, t)).collect();

        assert_eq!(pairs, vec![(0, 1), (1, 0)]);
    }

    #[test]
    fn empty_inputs() {
        let a = associator(MatchStrategy::Greedy);
        let dets = [det(0.0, 0.0, 10.0, 10.0)];
        let d: Vec<&Detection> = dets.iter().collect();

        let res = a.associate(&d, &[]);
        assert_eq!(res.unmatched_detections, vec![0]);
        assert!(res.matches.is_empty());
    }
}
