use crate::image_buffer::{ImageBuffer, Interpolation};

/// Diagnostics retained from a single albedo check (§4.6).
#[derive(Debug, Clone, PartialEq)]
pub struct AlbedoResult {
    pub is_live: bool,
    pub brightness: f64,
    pub channel_variance: [f64; 3],
    pub channel_outliers: [usize; 3],
    pub channel_upper_bound: [f64; 3],
    pub contrast: f64,
}

const SIDE: u32 = 224;
const BRIGHTNESS_SPOOF_THRESHOLD: f64 = 200.0;

fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = pos - lo as f64;
        sorted[lo] * (1.0 - frac) + sorted[hi] * frac
    }
}

fn channel_stats(channel: &[f64]) -> (f64, f64, usize, f64) {
    let n = channel.len() as f64;
    let mean = channel.iter().sum::<f64>() / n;
    let variance = channel.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

    let mut sorted = channel.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let q25 = quantile(&sorted, 0.25);
    let q75 = quantile(&sorted, 0.75);
    let iqr = q75 - q25;
    let upper_bound = mean + 1.5 * iqr;
    let outliers = channel.iter().filter(|&&v| v > upper_bound).count();

    (mean, variance, outliers, upper_bound)
}

/// §4.6's channel-wise IQR-outlier spoof check, run on a 224×224 bilinear
/// resize of the input.
pub fn check_albedo(image: &ImageBuffer) -> AlbedoResult {
    let resized = image.resize(SIDE, SIDE, Interpolation::Bilinear);
    let hwc = resized.to_hwc_f64();
    let pixel_count = (SIDE * SIDE) as usize;

    let mut channels: [Vec<f64>; 3] = [
        Vec::with_capacity(pixel_count),
        Vec::with_capacity(pixel_count),
        Vec::with_capacity(pixel_count),
    ];
    for y in 0..SIDE as usize {
        for x in 0..SIDE as usize {
            for c in 0..3 {
                channels[c].push(hwc[[y, x, c]]);
            }
        }
    }

    let mut means = [0.0; 3];
    let mut variances = [0.0; 3];
    let mut outliers = [0usize; 3];
    let mut upper_bounds = [0.0; 3];
    for c in 0..3 {
        let (mean, variance, count, ub) = channel_stats(&channels[c]);
        means[c] = mean;
        variances[c] = variance;
        outliers[c] = count;
        upper_bounds[c] = ub;
    }

    let brightness = (means[0] + means[1] + means[2]) / 3.0;
    let contrast = (variances[0] + variances[1] + variances[2]) / 3.0;

    let is_live = if brightness > BRIGHTNESS_SPOOF_THRESHOLD {
        false
    } else {
        outliers[1] > 0 && outliers[2] > 0
    };

    AlbedoResult {
        is_live,
        brightness,
        channel_variance: variances,
        channel_outliers: outliers,
        channel_upper_bound: upper_bounds,
        contrast,
    }
}
