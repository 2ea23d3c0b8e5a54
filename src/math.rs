use nalgebra as na;

use crate::error::Error;

pub const MIN_HOMOGRAPHY_POINTS: usize = 4;

const EPS: f64 = 1e-12;

/// Wraps any angle in degrees into [0, 360).
#[inline]
pub fn normalize_degrees(angle: f32) -> f32 {
    let a = angle.rem_euclid(360.0);

    // rem_euclid rounds tiny negatives up to exactly 360.0
    if a >= 360.0 {
        0.0
    } else {
        a
    }
}

/// Circular mean of headings in degrees: average the unit vectors and take
/// the angle of the result. `None` for an empty input.
pub fn circular_mean<I: IntoIterator<Item = f32>>(angles: I) -> Option<f32> {
    let (mut s, mut c, mut n) = (0.0f64, 0.0f64, 0usize);

    for a in angles {
        let r = (a as f64).to_radians();
        s += r.sin();
        c += r.cos();
        n += 1;
    }

    if n == 0 {
        return None;
    }

    let n = n as f64;
    let mean = (s / n).atan2(c / n).to_degrees();

    Some(normalize_degrees(mean as f32))
}

/// Similarity transform moving the centroid to the origin with a mean
/// distance of sqrt(2).
fn normalizer(points: &[na::Point2<f64>]) -> Option<na::Matrix3<f64>> {
    let n = points.len() as f64;
    let centroid = points
        .iter()
        .fold(na::Vector2::<f64>::zeros(), |acc, p| acc + p.coords)
        / n;

    let mean_dist = points
        .iter()
        .map(|p| (p.coords - centroid).norm())
        .sum::<f64>()
        / n;

    if mean_dist < EPS {
        return None;
    }

    let s = std::f64::consts::SQRT_2 / mean_dist;

    Some(na::Matrix3::new(
        s,
        0.0,
        -s * centroid.x,
        0.0,
        s,
        -s * centroid.y,
        0.0,
        0.0,
        1.0,
    ))
}

#[inline]
fn apply(t: &na::Matrix3<f64>, p: &na::Point2<f64>) -> na::Point2<f64> {
    let v = t * na::Vector3::new(p.x, p.y, 1.0);
    na::Point2::new(v.x / v.z, v.y / v.z)
}

fn is_collinear(points: &[na::Point2<f64>]) -> bool {
    let n = points.len() as f64;
    let mean = points
        .iter()
        .fold(na::Vector2::<f64>::zeros(), |acc, p| acc + p.coords)
        / n;

    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for p in points {
        let d = p.coords - mean;
        sxx += d.x * d.x;
        syy += d.y * d.y;
        sxy += d.x * d.y;
    }

    let trace = sxx + syy;
    let det = sxx * syy - sxy * sxy;

    trace < EPS || det / (trace * trace) < 1e-9
}

/// Direct linear transform over `src -> dst` correspondences, with both
/// point sets normalized first. The result maps `src` into `dst` and has
/// `h33 == 1` whenever that entry is non-zero.
pub fn find_homography(
    src: &[na::Point2<f64>],
    dst: &[na::Point2<f64>],
) -> Result<na::Matrix3<f64>, Error> {
    let n = src.len().min(dst.len());

    if n < MIN_HOMOGRAPHY_POINTS {
        return Err(Error::InsufficientCalibrationPoints {
            found: n,
            required: MIN_HOMOGRAPHY_POINTS,
        });
    }

    let (src, dst) = (&src[..n], &dst[..n]);

    if src.iter().chain(dst).any(|p| !p.x.is_finite() || !p.y.is_finite()) {
        return Err(Error::DegenerateCalibration("non-finite point"));
    }

    if is_collinear(src) || is_collinear(dst) {
        return Err(Error::DegenerateCalibration("collinear points"));
    }

    let t_src = normalizer(src).ok_or(Error::DegenerateCalibration("coincident points"))?;
    let t_dst = normalizer(dst).ok_or(Error::DegenerateCalibration("coincident points"))?;

    let mut a = na::DMatrix::<f64>::zeros(2 * n, 9);

    for (i, (s, d)) in src.iter().zip(dst).enumerate() {
        let s = apply(&t_src, s);
        let d = apply(&t_dst, d);
        let (x, y, u, v) = (s.x, s.y, d.x, d.y);

        let r = 2 * i;
        a[(r, 0)] = -x;
        a[(r, 1)] = -y;
        a[(r, 2)] = -1.0;
        a[(r, 6)] = u * x;
        a[(r, 7)] = u * y;
        a[(r, 8)] = u;

        a[(r + 1, 3)] = -x;
        a[(r + 1, 4)] = -y;
        a[(r + 1, 5)] = -1.0;
        a[(r + 1, 6)] = v * x;
        a[(r + 1, 7)] = v * y;
        a[(r + 1, 8)] = v;
    }

    // The null vector of A is the eigenvector of A^T A with the smallest eigenvalue.
    let ata = a.transpose() * &a;
    let eigen = na::SymmetricEigen::new(ata);

    let mut order: Vec<usize> = (0..eigen.eigenvalues.len()).collect();
    order.sort_by(|&i, &j| {
        eigen.eigenvalues[i]
            .partial_cmp(&eigen.eigenvalues[j])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let largest = eigen.eigenvalues[order[order.len() - 1]].abs().max(EPS);
    if eigen.eigenvalues[order[1]].abs() / largest < 1e-12 {
        return Err(Error::DegenerateCalibration("solution is not unique"));
    }

    let h = eigen.eigenvectors.column(order[0]);
    let hn = na::Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]);

    if hn.determinant().abs() < 1e-9 {
        return Err(Error::DegenerateCalibration("singular homography"));
    }

    let t_dst_inv = t_dst
        .try_inverse()
        .ok_or(Error::DegenerateCalibration("singular normalization"))?;

    let mut hm = t_dst_inv * hn * t_src;

    let h33 = hm[(2, 2)];
    if h33.abs() > EPS {
        hm /= h33;
    } else {
        hm /= hm.norm();
    }

    if hm.iter().any(|v| !v.is_finite()) {
        return Err(Error::DegenerateCalibration("non-finite homography"));
    }

    Ok(hm)
}

/// Projects a point through `h`. `None` when it lands on the line at infinity.
#[inline]
pub fn project(h: &na::Matrix3<f64>, x: f64, y: f64) -> Option<na::Point2<f64>> {
    let v = h * na::Vector3::new(x, y, 1.0);

    if v.z.abs() < EPS {
        return None;
    }

    Some(na::Point2::new(v.x / v.z, v.y / v.z))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(v: &[(f64, f64)]) -> Vec<na::Point2<f64>> {
        v.iter().map(|&(x, y)| na::Point2::new(x, y)).collect()
    }

    #[test]
    fn normalize_wraps_both_directions() {
        assert_eq!(normalize_degrees(370.0), 10.0);
        assert_eq!(normalize_degrees(-10.0), 350.0);
        assert_eq!(normalize_degrees(360.0), 0.0);
        assert!(normalize_degrees(-1e-9) < 360.0);
    }

    #[test]
    fn circular_mean_across_zero() {
        let m = circular_mean([350.0, 10.0]).unwrap();
        assert!(m < 1e-3 || m > 360.0 - 1e-3, "got {}", m);
    }

    #[test]
    fn circular_mean_plain_values() {
        let m = circular_mean([80.0, 100.0]).unwrap();
        assert!((m - 90.0).abs() < 1e-3);

        assert_eq!(circular_mean(std::iter::empty()), None);
    }

    #[test]
    fn homography_of_a_scaled_rectangle() {
        let src = pts(&[(0.0, 0.0), (1280.0, 0.0), (1280.0, 720.0), (0.0, 720.0)]);
        let dst = pts(&[(0.0, 0.0), (64.0, 0.0), (64.0, 36.0), (0.0, 36.0)]);

        let h = find_homography(&src, &dst).unwrap();
        let p = project(&h, 640.0, 360.0).unwrap();

        assert!((p.x - 32.0).abs() < 1e-6);
        assert!((p.y - 18.0).abs() < 1e-6);
    }

    #[test]
    fn homography_of_a_perspective_quad() {
        let src = pts(&[(100.0, 80.0), (520.0, 60.0), (600.0, 420.0), (40.0, 450.0)]);
        let dst = pts(&[(0.0, 0.0), (30.0, 0.0), (30.0, 20.0), (0.0, 20.0)]);

        let h = find_homography(&src, &dst).unwrap();

        for (s, d) in src.iter().zip(&dst) {
            let p = project(&h, s.x, s.y).unwrap();
            assert!((p - d).norm() < 1e-6, "{:?} -> {:?}, want {:?}", s, p, d);
        }
    }

    #[test]
    fn too_few_points() {
        let src = pts(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]);
        assert_eq!(
            find_homography(&src, &src),
            Err(Error::InsufficientCalibrationPoints {
                found: 3,
                required: 4
            })
        );
    }

    #[test]
    fn collinear_points_are_degenerate() {
        let src = pts(&[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0), (3.0, 3.0)]);
        let dst = pts(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]);

        assert!(matches!(
            find_homography(&src, &dst),
            Err(Error::DegenerateCalibration(_))
        ));
    }

    #[test]
    fn coincident_points_are_degenerate() {
        let src = pts(&[(5.0, 5.0); 4]);
        let dst = pts(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]);

        assert!(find_homography(&src, &dst).is_err());
    }
}
