use std::sync::Arc;

use crate::error::CoreResult;
use crate::image_buffer::{ImageBuffer, Interpolation};
use crate::model_store::ModelSession;

const SIDE: u32 = 224;
const IMAGENET_MEAN: [f32; 3] = [0.485 * 255.0, 0.456 * 255.0, 0.406 * 255.0];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Result of the occlusion classifier (§4.7).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OcclusionResult {
    pub is_normal: bool,
    pub avg_normal: f64,
    pub avg_occluded: f64,
}

impl OcclusionResult {
    pub fn label(&self) -> &'static str {
        if self.is_normal {
            "normal"
        } else {
            "occluded"
        }
    }
}

fn softmax2(logits: [f32; 2]) -> (f64, f64) {
    let max = logits[0].max(logits[1]) as f64;
    let e0 = ((logits[0] as f64) - max).exp();
    let e1 = ((logits[1] as f64) - max).exp();
    let sum = e0 + e1;
    (e0 / sum, e1 / sum)
}

/// Run `occlusion_iterations` inferences on the 224×224 ImageNet-normalized
/// crop and average the softmaxed probabilities (§4.7). Degrades open
/// (returns `normal`, confidence 1.0) when `session` is `None`.
pub fn check_occlusion(
    image: &ImageBuffer,
    session: Option<&Arc<ModelSession>>,
    iterations: u32,
    threshold: f64,
) -> CoreResult<OcclusionResult> {
    let session = match session {
        Some(s) if !s.is_placeholder() => s,
        _ => {
            return Ok(OcclusionResult {
                is_normal: true,
                avg_normal: 1.0,
                avg_occluded: 0.0,
            })
        }
    };

    let resized = image.resize(SIDE, SIDE, Interpolation::Bilinear);
    let tensor = resized.to_chw_tensor(IMAGENET_MEAN, IMAGENET_STD);
    let input = tensor.into_dyn();

    let iterations = iterations.max(1);
    let mut occluded_sum = 0.0;
    let mut normal_sum = 0.0;
    for _ in 0..iterations {
        let outputs = session.run(&input)?;
        let (_, data) = &outputs[0];
        let logits = [data[0], data[1]];
        let (occluded, normal) = softmax2(logits);
        occluded_sum += occluded;
        normal_sum += normal;
    }

    let avg_occluded = occluded_sum / iterations as f64;
    let avg_normal = normal_sum / iterations as f64;
    Ok(OcclusionResult {
        is_normal: avg_normal > threshold,
        avg_normal,
        avg_occluded,
    })
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

    #[test]
    fn degrades_open_without_a_session() {
        let img = solid(224, 224, [128, 128, 128]);
        let result = check_occlusion(&img, None, 3, 0.7).unwrap();
        assert!(result.is_normal);
        assert_eq!(result.avg_normal, 1.0);
    }

    #[test]
    fn softmax2_sums_to_one() {
        let (a, b) = softmax2([2.0, 1.0]);
        assert!((a + b - 1.0).abs() < 1e-9);
        assert!(a < b);
    }

    #[test]
    fn label_matches_is_normal() {
        let live = OcclusionResult {
            is_normal: true,
            avg_normal: 0.9,
            avg_occluded: 0.1,
        };
        assert_eq!(live.label(), "normal");
        let occluded = OcclusionResult {
            is_normal: false,
            avg_normal: 0.1,
            avg_occluded: 0.9,
        };
        assert_eq!(occluded.label(), "occluded");
    }
}
