use crate::image_buffer::ImageBuffer;

/// 3x3 Laplacian kernel (§4.3): detects edges; its variance over the image
/// is a standard proxy for focus/blur.
const KERNEL: [[f64; 3]; 3] = [[0.0, 1.0, 0.0], [1.0, -4.0, 1.0], [0.0, 1.0, 0.0]];

/// Variance of the Laplacian response over the grayscale image (§4.3).
/// The kernel is only applied where the full 3x3 window stays inside the
/// image; a border pixel's response is zero rather than being computed from
/// zero-extended neighbors, so a uniform image (including its border) has an
/// all-zero response map and therefore zero variance.
pub fn laplacian_variance(image: &ImageBuffer) -> f64 {
    let (w, h) = (image.width() as i64, image.height() as i64);
    if w == 0 || h == 0 {
        return 0.0;
    }
    let gray = image.to_grayscale_f64();
    let at = |x: i64, y: i64| -> f64 { gray[y as usize * w as usize + x as usize] };

    let mut responses = Vec::with_capacity((w * h) as usize);
    for y in 0..h {
        for x in 0..w {
            let on_border = x == 0 || y == 0 || x == w - 1 || y == h - 1;
            let acc = if on_border {
                0.0
            } else {
                let mut acc = 0.0;
                for ky in 0..3i64 {
                    for kx in 0..3i64 {
                        let weight = KERNEL[ky as usize][kx as usize];
                        if weight == 0.0 {
                            continue;
                        }
                        acc += weight * at(x + kx - 1, y + ky - 1);
                    }
                }
                acc
            };
            responses.push(acc);
        }
    }

    let n = responses.len() as f64;
    let mean = responses.iter().sum::<f64>() / n;
    responses.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}

/// §4.3's sharpness gate: sharp enough iff the Laplacian variance is at
/// least `threshold`.
pub fn is_sharp_enough(image: &ImageBuffer, threshold: f64) -> bool {
    laplacian_variance(image) >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32, rgb: [u8; 3]) -> ImageBuffer {
        let mut rgba = Vec::with_capacity((w * h * 4) as usize);
        for _ in 0..(w * h) {
            rgba.extend_from_slice(&[rgb[0], rgb[1], rgb[2], 255]);
        }
        ImageBuffer::new(rgba, w, h).unwrap()
    }

    fn checkerboard(w: u32, h: u32) -> ImageBuffer {
        let mut rgba = Vec::with_capacity((w * h * 4) as usize);
        for y in 0..h {
            for x in 0..w {
                let v = if (x + y) % 2 == 0 { 255 } else { 0 };
                rgba.extend_from_slice(&[v, v, v, 255]);
            }
        }
        ImageBuffer::new(rgba, w, h).unwrap()
    }

    #[test]
    fn flat_image_has_zero_variance() {
        let img = solid(32, 32, [100, 100, 100]);
        assert_eq!(laplacian_variance(&img), 0.0);
    }

    #[test]
    fn checkerboard_has_high_variance() {
        let img = checkerboard(32, 32);
        assert!(laplacian_variance(&img) > 1000.0);
    }

    #[test]
    fn is_sharp_enough_passes_at_threshold_exactly() {
        let img = solid(32, 32, [10, 10, 10]);
        assert!(is_sharp_enough(&img, 0.0));
        let sharp = checkerboard(32, 32);
        assert!(is_sharp_enough(&sharp, 45.0));
    }

    #[test]
    fn is_sharp_enough_fails_below_threshold() {
        let img = solid(32, 32, [10, 10, 10]);
        assert!(!is_sharp_enough(&img, 1.0));
    }
}
