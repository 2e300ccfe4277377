use crate::error::{CoreError, CoreResult};
use crate::geometry::Landmarks;
use crate::image_buffer::ImageBuffer;

pub const ALIGNED_SIDE: u32 = 112;

/// Reference landmark positions for a 112×112 aligned output (§4.5).
pub const REFERENCE_LANDMARKS: [(f64, f64); 5] = [
    (30.29, 51.70),
    (65.53, 51.50),
    (48.03, 71.74),
    (33.55, 92.37),
    (62.73, 92.20),
];

/// A forward 2×3 affine transform `[[a,b,tx],[c,d,ty]]` mapping source pixel
/// coordinates to aligned-output pixel coordinates (§4.5).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub tx: f64,
    pub ty: f64,
}

impl SimilarityTransform {
    fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.b * y + self.tx,
            self.c * x + self.d * y + self.ty,
        )
    }

    fn invert(&self) -> Option<Self> {
        let det = self.a * self.d - self.b * self.c;
        if det.abs() < 1e-12 {
            return None;
        }
        let ia = self.d / det;
        let ib = -self.b / det;
        let ic = -self.c / det;
        let id = self.a / det;
        let itx = -(ia * self.tx + ib * self.ty);
        let ity = -(ic * self.tx + id * self.ty);
        Some(Self {
            a: ia,
            b: ib,
            c: ic,
            d: id,
            tx: itx,
            ty: ity,
        })
    }
}

/// Solve `A x = b` by forming normal equations `AᵀA x = Aᵀb` and running
/// Gaussian elimination with partial pivoting (§4.5 step 2).
fn solve_normal_equations(rows: &[[f64; 4]], targets: &[f64]) -> CoreResult<[f64; 4]> {
    let mut ata = [[0.0f64; 4]; 4];
    let mut atb = [0.0f64; 4];
    for (row, &t) in rows.iter().zip(targets.iter()) {
        for i in 0..4 {
            atb[i] += row[i] * t;
            for j in 0..4 {
                ata[i][j] += row[i] * row[j];
            }
        }
    }

    let mut m = ata;
    let mut rhs = atb;
    for col in 0..4 {
        let mut pivot_row = col;
        let mut pivot_val = m[col][col].abs();
        for r in (col + 1)..4 {
            if m[r][col].abs() > pivot_val {
                pivot_row = r;
                pivot_val = m[r][col].abs();
            }
        }
        if pivot_val < 1e-12 {
            return Err(CoreError::InvalidImage(
                "alignment least-squares system is singular".to_string(),
            ));
        }
        if pivot_row != col {
            m.swap(col, pivot_row);
            rhs.swap(col, pivot_row);
        }
        for r in (col + 1)..4 {
            let factor = m[r][col] / m[col][col];
            for k in col..4 {
                m[r][k] -= factor * m[col][k];
            }
            rhs[r] -= factor * rhs[col];
        }
    }

    let mut x = [0.0f64; 4];
    for col in (0..4).rev() {
        let mut sum = rhs[col];
        for k in (col + 1)..4 {
            sum -= m[col][k] * x[k];
        }
        x[col] = sum / m[col][col];
    }
    Ok(x)
}

fn fit_similarity(source: &[(f64, f64); 5], target: &[(f64, f64); 5]) -> CoreResult<SimilarityTransform> {
    let mut rows = Vec::with_capacity(10);
    let mut targets = Vec::with_capacity(10);
    for &(x, y) in source {
        rows.push([x, y, 1.0, 0.0]);
        rows.push([y, -x, 0.0, 1.0]);
    }
    for &(u, v) in target {
        targets.push(u);
        targets.push(v);
    }

    let r = solve_normal_equations(&rows, &targets)?;
    let (sc, ss, tx, ty) = (r[0], r[1], r[2], r[3]);
    let inverse = SimilarityTransform {
        a: sc,
        b: -ss,
        c: ss,
        d: sc,
        tx,
        ty,
    };
    inverse
        .invert()
        .ok_or_else(|| CoreError::InvalidImage("degenerate similarity transform".to_string()))
}

fn residual(transform: &SimilarityTransform, source: &[(f64, f64); 5], target: &[(f64, f64); 5]) -> f64 {
    source
        .iter()
        .zip(target.iter())
        .map(|(&(x, y), &(u, v))| {
            let (px, py) = transform.apply(x, y);
            (px - u).powi(2) + (py - v).powi(2)
        })
        .sum::<f64>()
        .sqrt()
}

/// Fit both the direct and y-mirrored candidate transforms and keep
/// whichever has the lower residual (§4.5 step 4).
pub fn fit_transform(landmarks: &Landmarks) -> CoreResult<SimilarityTransform> {
    let source = landmarks.points;
    let target = REFERENCE_LANDMARKS;

    let direct = fit_similarity(&source, &target)?;
    let mirrored_source: [(f64, f64); 5] = [
        (source[0].0, -source[0].1),
        (source[1].0, -source[1].1),
        (source[2].0, -source[2].1),
        (source[3].0, -source[3].1),
        (source[4].0, -source[4].1),
    ];
    let mirrored = fit_similarity(&mirrored_source, &target)?;

    let direct_residual = residual(&direct, &source, &target);
    let mirrored_residual = residual(&mirrored, &mirrored_source, &target);

    if mirrored_residual < direct_residual {
        Ok(mirrored)
    } else {
        Ok(direct)
    }
}

/// Warp `image` by `transform` into a 112×112 RGB crop with black padding
/// outside the source domain (§4.5). Uses the inverse mapping (output →
/// source) with nearest-neighbor sampling on the inverted affine.
pub fn warp_aligned(image: &ImageBuffer, transform: &SimilarityTransform) -> CoreResult<ImageBuffer> {
    let inverse = transform
        .invert()
        .ok_or_else(|| CoreError::InvalidImage("transform has no inverse".to_string()))?;

    let mut out = vec![0u8; (ALIGNED_SIDE * ALIGNED_SIDE * 4) as usize];
    for oy in 0..ALIGNED_SIDE {
        for ox in 0..ALIGNED_SIDE {
            let (sx, sy) = inverse.apply(ox as f64, oy as f64);
            let idx = ((oy * ALIGNED_SIDE + ox) * 4) as usize;
            if sx < 0.0 || sy < 0.0 || sx >= image.width() as f64 || sy >= image.height() as f64 {
                out[idx..idx + 4].copy_from_slice(&[0, 0, 0, 255]);
                continue;
            }
            let p = image.get_pixel(sx as u32, sy as u32);
            out[idx..idx + 4].copy_from_slice(&p);
        }
    }
    ImageBuffer::new(out, ALIGNED_SIDE, ALIGNED_SIDE)
}

/// Align `image` to a 112×112 face crop given its detected landmarks (§4.5).
pub fn align_face(image: &ImageBuffer, landmarks: &Landmarks) -> CoreResult<ImageBuffer> {
    let transform = fit_transform(landmarks)?;
    warp_aligned(image, &transform)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_transform_on_reference_points_is_near_identity() {
        let landmarks = Landmarks {
            points: REFERENCE_LANDMARKS,
        };
        let transform = fit_transform(&landmarks).unwrap();
        for &(x, y) in &REFERENCE_LANDMARKS {
            let (px, py) = transform.apply(x, y);
            assert!((px - x).abs() < 1.0, "x mismatch: {px} vs {x}");
            assert!((py - y).abs() < 1.0, "y mismatch: {py} vs {y}");
        }
    }

    #[test]
    fn align_face_produces_112_square() {
        let mut rgba = vec![0u8; 200 * 200 * 4];
        for px in rgba.chunks_mut(4) {
            px.copy_from_slice(&[90, 100, 110, 255]);
        }
        let image = ImageBuffer::new(rgba, 200, 200).unwrap();
        let landmarks = Landmarks {
            points: [
                (70.0, 70.0),
                (130.0, 70.0),
                (100.0, 100.0),
                (75.0, 135.0),
                (125.0, 135.0),
            ],
        };
        let aligned = align_face(&image, &landmarks).unwrap();
        assert_eq!(aligned.width(), 112);
        assert_eq!(aligned.height(), 112);
    }

    #[test]
    fn solve_normal_equations_recovers_exact_linear_system() {
        // x + y = 3, x - y = 1 embedded in the 4-unknown solver's first two slots,
        // with the remaining two equations trivially satisfied.
        let rows = vec![[1.0, 1.0, 0.0, 0.0], [1.0, -1.0, 0.0, 0.0], [0.0, 0.0, 1.0, 0.0], [0.0, 0.0, 0.0, 1.0]];
        let targets = vec![3.0, 1.0, 5.0, 7.0];
        let x = solve_normal_equations(&rows, &targets).unwrap();
        assert!((x[0] - 2.0).abs() < 1e-6);
        assert!((x[1] - 1.0).abs() < 1e-6);
    }
}
