use std::sync::Arc;

use crate::error::CoreResult;
use crate::image_buffer::{ImageBuffer, Interpolation};
use crate::model_store::ModelSession;

const SIDE: u32 = 224;
const IMAGENET_MEAN: [f32; 3] = [0.485 * 255.0, 0.456 * 255.0, 0.406 * 255.0];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessLabel {
    Live,
    Spoof,
}

/// Result of the weighted two-model ensemble with majority-vote averaging
/// (§4.8).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LivenessResult {
    pub label: LivenessLabel,
    pub confidence: f64,
    pub combined_live: f64,
    pub combined_spoof: f64,
}

fn run_once(
    model1: &ModelSession,
    model2: &ModelSession,
    input: &ndarray::ArrayD<f32>,
    weights: (f64, f64),
) -> CoreResult<(f64, f64)> {
    let out1 = model1.run(input)?;
    let out2 = model2.run(input)?;
    let (_, data1) = &out1[0];
    let (_, data2) = &out2[0];

    let (live1, spoof1) = (data1[0] as f64, data1[1] as f64);
    let (live2, spoof2) = (data2[0] as f64, data2[1] as f64);

    let combined_live = weights.0 * live1 + weights.1 * live2;
    let combined_spoof = weights.0 * spoof1 + weights.1 * spoof2;
    Ok((combined_live, combined_spoof))
}

/// Run the ensemble for `iterations` rounds on the same 224×224
/// ImageNet-normalized input, majority-voting the per-round label and
/// averaging the winning label's combined score (§4.8).
pub fn check_liveness(
    image: &ImageBuffer,
    model1: &ModelSession,
    model2: &ModelSession,
    weights: (f64, f64),
    iterations: u32,
    threshold: f64,
) -> CoreResult<LivenessResult> {
    let resized = image.resize(SIDE, SIDE, Interpolation::Bilinear);
    let tensor = resized.to_chw_tensor(IMAGENET_MEAN, IMAGENET_STD);
    let input = tensor.into_dyn();

    let iterations = iterations.max(1);
    let mut rounds = Vec::with_capacity(iterations as usize);
    for _ in 0..iterations {
        let (combined_live, combined_spoof) = run_once(model1, model2, &input, weights)?;
        let label = if combined_live > threshold {
            LivenessLabel::Live
        } else {
            LivenessLabel::Spoof
        };
        rounds.push((label, combined_live, combined_spoof));
    }

    let live_votes = rounds
        .iter()
        .filter(|(l, _, _)| *l == LivenessLabel::Live)
        .count();
    let spoof_votes = rounds.len() - live_votes;

    // Majority vote; ties go to whichever label the first round cast, per
    // §4.8's "first label reaching majority" tiebreak.
    let winning_label = if live_votes > spoof_votes {
        LivenessLabel::Live
    } else if spoof_votes > live_votes {
        LivenessLabel::Spoof
    } else {
        rounds[0].0
    };

    let winning_scores: Vec<f64> = rounds
        .iter()
        .filter(|(l, _, _)| *l == winning_label)
        .map(|(_, live, spoof)| match winning_label {
            LivenessLabel::Live => *live,
            LivenessLabel::Spoof => *spoof,
        })
        .collect();
    let confidence = winning_scores.iter().sum::<f64>() / winning_scores.len() as f64;

    let combined_live = rounds.iter().map(|(_, live, _)| live).sum::<f64>() / rounds.len() as f64;
    let combined_spoof =
        rounds.iter().map(|(_, _, spoof)| spoof).sum::<f64>() / rounds.len() as f64;

    Ok(LivenessResult {
        label: winning_label,
        confidence,
        combined_live,
        combined_spoof,
    })
}
