use crate::cancellation::CancellationToken;
use crate::error::{CoreError, CoreResult};
use crate::geometry::{nms, BoundingBox, Landmarks, NmsMode};
use crate::image_buffer::{ImageBuffer, Interpolation};
use crate::model_store::ModelSession;

const MIN_FACE_SIZE: f64 = 12.0;
const FACTOR: f64 = 0.709;
const CELL_SIZE: i64 = 12;
const STRIDE: i64 = 2;
const THRESHOLDS: [f64; 3] = [0.1, 0.7, 0.9];
const NMS_THRESHOLDS: [f64; 3] = [0.7, 0.7, 0.7];

/// The scale pyramid the P-Net stage runs over (§4.4): `s_k = m · factor^k`
/// while `min(W,H) · s_k > 12`.
pub fn scale_pyramid(width: u32, height: u32) -> Vec<f64> {
    let m = MIN_FACE_SIZE / 12.0;
    let min_side = width.min(height) as f64;
    let mut scales = Vec::new();
    let mut k = 0u32;
    loop {
        let s = m * FACTOR.powi(k as i32);
        if min_side * s <= 12.0 {
            break;
        }
        scales.push(s);
        k += 1;
    }
    scales
}

fn check_cancelled(token: &CancellationToken) -> CoreResult<()> {
    if token.is_cancelled() {
        Err(CoreError::Cancelled)
    } else {
        Ok(())
    }
}

/// Stage 1 (§4.4): slide a 12×12/stride-2 window over each scaled image,
/// batched into one inference call per scale, and back-project surviving
/// cells to source coordinates.
fn run_pnet(
    image: &ImageBuffer,
    pnet: &ModelSession,
    token: &CancellationToken,
) -> CoreResult<Vec<BoundingBox>> {
    let scales = scale_pyramid(image.width(), image.height());
    let mut candidates = Vec::new();

    for scale in scales {
        check_cancelled(token)?;

        let scaled_w = (image.width() as f64 * scale).ceil().max(1.0) as u32;
        let scaled_h = (image.height() as f64 * scale).ceil().max(1.0) as u32;
        if scaled_w < 12 || scaled_h < 12 {
            continue;
        }
        let scaled = image.resize(scaled_w, scaled_h, Interpolation::Bilinear);

        let grid_w = (scaled_w as i64 - CELL_SIZE) / STRIDE + 1;
        let grid_h = (scaled_h as i64 - CELL_SIZE) / STRIDE + 1;
        if grid_w <= 0 || grid_h <= 0 {
            continue;
        }

        let mut tensor = ndarray::Array4::<f32>::zeros((
            (grid_w * grid_h) as usize,
            3,
            CELL_SIZE as usize,
            CELL_SIZE as usize,
        ));
        for i in 0..grid_h {
            for j in 0..grid_w {
                let batch_idx = (i * grid_w + j) as usize;
                let x0 = j * STRIDE;
                let y0 = i * STRIDE;
                for dy in 0..CELL_SIZE {
                    for dx in 0..CELL_SIZE {
                        let p = scaled.get_pixel((x0 + dx) as u32, (y0 + dy) as u32);
                        for c in 0..3 {
                            tensor[[batch_idx, c, dy as usize, dx as usize]] =
                                (p[c] as f32 - 127.5) * 0.0078125;
                        }
                    }
                }
            }
        }

        let outputs = pnet.run(&tensor.into_dyn())?;
        let (prob_shape, prob_data) = &outputs[0];
        let (_, offset_data) = &outputs[1];
        let num_classes = prob_shape.get(1).copied().unwrap_or(2);

        for i in 0..grid_h {
            for j in 0..grid_w {
                let batch_idx = (i * grid_w + j) as usize;
                let p = prob_data[batch_idx * num_classes + (num_classes - 1)] as f64;
                if p <= THRESHOLDS[0] {
                    continue;
                }
                let x1 = ((STRIDE * j + 1) as f64 / scale).round();
                let y1 = ((STRIDE * i + 1) as f64 / scale).round();
                let x2 = ((STRIDE * j + 1 + CELL_SIZE) as f64 / scale).round();
                let y2 = ((STRIDE * i + 1 + CELL_SIZE) as f64 / scale).round();
                let base = BoundingBox {
                    x1,
                    y1,
                    x2,
                    y2,
                    score: p,
                };
                let offsets = [
                    offset_data[batch_idx * 4] as f64,
                    offset_data[batch_idx * 4 + 1] as f64,
                    offset_data[batch_idx * 4 + 2] as f64,
                    offset_data[batch_idx * 4 + 3] as f64,
                ];
                candidates.push((base, offsets));
            }
        }
    }

    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    // NMS (mode union) runs on the raw back-projected boxes, then surviving
    // boxes are calibrated (§4.4 Stage 1) — calibrating first would change
    // the IoU overlaps NMS decides on.
    let raw: Vec<BoundingBox> = candidates.iter().map(|(b, _)| *b).collect();
    let keep = nms(&raw, NMS_THRESHOLDS[0], NmsMode::Union);
    Ok(keep
        .into_iter()
        .map(|i| {
            let (base, offsets) = candidates[i];
            base.calibrate(offsets).to_square().round()
        })
        .collect())
}

/// Shared protocol for R-Net/O-Net (§4.4): crop each box with zero-fill
/// padding, resize to `side`, normalize, and batch into one inference call.
fn extract_batch(image: &ImageBuffer, boxes: &[BoundingBox], side: u32) -> ndarray::Array4<f32> {
    let mut tensor = ndarray::Array4::<f32>::zeros((boxes.len(), 3, side as usize, side as usize));
    for (n, b) in boxes.iter().enumerate() {
        let crop = image.crop_padded(b.x1 as i64, b.y1 as i64, b.x2 as i64 + 1, b.y2 as i64 + 1);
        let resized = crop.resize(side, side, Interpolation::Bilinear);
        for y in 0..side {
            for x in 0..side {
                let p = resized.get_pixel(x, y);
                for c in 0..3 {
                    tensor[[n, c, y as usize, x as usize]] = (p[c] as f32 - 127.5) * 0.0078125;
                }
            }
        }
    }
    tensor
}

/// Stage 2 (§4.4): 24×24 refinement.
fn run_rnet(
    image: &ImageBuffer,
    boxes: Vec<BoundingBox>,
    rnet: &ModelSession,
    token: &CancellationToken,
) -> CoreResult<Vec<BoundingBox>> {
    check_cancelled(token)?;
    if boxes.is_empty() {
        return Ok(Vec::new());
    }
    let tensor = extract_batch(image, &boxes, 24);
    let outputs = rnet.run(&tensor.into_dyn())?;
    let (_, offset_data) = &outputs[0];
    let (prob_shape, prob_data) = &outputs[1];
    let num_classes = prob_shape.get(1).copied().unwrap_or(2);

    let mut survivors = Vec::new();
    for (n, b) in boxes.iter().enumerate() {
        let p = prob_data[n * num_classes + (num_classes - 1)] as f64;
        if p <= THRESHOLDS[1] {
            continue;
        }
        let mut updated = *b;
        updated.score = p;
        let offsets = [
            offset_data[n * 4] as f64,
            offset_data[n * 4 + 1] as f64,
            offset_data[n * 4 + 2] as f64,
            offset_data[n * 4 + 3] as f64,
        ];
        survivors.push((updated, offsets));
    }

    if survivors.is_empty() {
        return Ok(Vec::new());
    }

    // NMS union at N[1] on the uncalibrated boxes, then calibrate, then
    // square (§4.4 Stage 2) — same ordering rationale as Stage 1.
    let raw: Vec<BoundingBox> = survivors.iter().map(|(b, _)| *b).collect();
    let keep = nms(&raw, NMS_THRESHOLDS[1], NmsMode::Union);
    Ok(keep
        .into_iter()
        .map(|i| {
            let (b, offsets) = survivors[i];
            b.calibrate(offsets).to_square().round()
        })
        .collect())
}

/// Stage 3 (§4.4): 48×48 refinement plus landmark regression.
fn run_onet(
    image: &ImageBuffer,
    boxes: Vec<BoundingBox>,
    onet: &ModelSession,
    token: &CancellationToken,
) -> CoreResult<Vec<(BoundingBox, Landmarks)>> {
    check_cancelled(token)?;
    if boxes.is_empty() {
        return Ok(Vec::new());
    }
    let tensor = extract_batch(image, &boxes, 48);
    let outputs = onet.run(&tensor.into_dyn())?;
    let (_, landmark_data) = &outputs[0];
    let (_, offset_data) = &outputs[1];
    let (prob_shape, prob_data) = &outputs[2];
    let num_classes = prob_shape.get(1).copied().unwrap_or(2);

    let mut boxed_landmarks = Vec::new();
    for (n, b) in boxes.iter().enumerate() {
        let p = prob_data[n * num_classes + (num_classes - 1)] as f64;
        if p <= THRESHOLDS[2] {
            continue;
        }
        let mut updated = *b;
        updated.score = p;
        let offsets = [
            offset_data[n * 4] as f64,
            offset_data[n * 4 + 1] as f64,
            offset_data[n * 4 + 2] as f64,
            offset_data[n * 4 + 3] as f64,
        ];
        let calibrated = updated.calibrate(offsets);

        let w = b.width();
        let h = b.height();
        let mut points = [(0.0, 0.0); 5];
        for i in 0..5 {
            let lx = landmark_data[n * 10 + i] as f64;
            let ly = landmark_data[n * 10 + 5 + i] as f64;
            points[i] = (b.x1 + w * lx, b.y1 + h * ly);
        }
        boxed_landmarks.push((calibrated, Landmarks { points }));
    }

    if boxed_landmarks.is_empty() {
        return Ok(Vec::new());
    }

    let boxes_only: Vec<BoundingBox> = boxed_landmarks.iter().map(|(b, _)| *b).collect();
    let keep = nms(&boxes_only, NMS_THRESHOLDS[2], NmsMode::Min);
    Ok(keep
        .into_iter()
        .map(|i| boxed_landmarks[i].clone())
        .collect())
}

/// Run the full P→R→O cascade and select a single face: highest score in
/// stage 3, ties broken by larger bbox (§4.4). Returns `None` rather than an
/// error when no face survives any stage (§4.10.1: treated the same as a
/// quality/albedo failure by the caller, not as a fatal `CoreError`).
pub fn detect_face(
    image: &ImageBuffer,
    pnet: &ModelSession,
    rnet: &ModelSession,
    onet: &ModelSession,
    token: &CancellationToken,
) -> CoreResult<Option<(BoundingBox, Landmarks)>> {
    let stage1 = run_pnet(image, pnet, token)?;
    if stage1.is_empty() {
        return Ok(None);
    }
    let stage2 = run_rnet(image, stage1, rnet, token)?;
    if stage2.is_empty() {
        return Ok(None);
    }
    let stage3 = run_onet(image, stage2, onet, token)?;
    if stage3.is_empty() {
        return Ok(None);
    }

    let best = stage3
        .into_iter()
        .max_by(|(a, _), (b, _)| {
            a.score
                .partial_cmp(&b.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.area().partial_cmp(&b.area()).unwrap_or(std::cmp::Ordering::Equal))
        })
        .expect("non-empty after emptiness check above");
    Ok(Some(best))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_pyramid_shrinks_geometrically() {
        let scales = scale_pyramid(640, 480);
        assert!(!scales.is_empty());
        for w in scales.windows(2) {
            assert!(w[1] < w[0]);
        }
    }

    #[test]
    fn scale_pyramid_stops_below_min_face_projection() {
        let scales = scale_pyramid(640, 480);
        let min_side = 480.0;
        for &s in &scales {
            assert!(min_side * s > 12.0);
        }
    }

    #[test]
    fn scale_pyramid_empty_for_tiny_images() {
        let scales = scale_pyramid(10, 10);
        assert!(scales.is_empty());
    }

    #[test]
    fn detect_face_returns_none_when_pnet_has_no_model() {
        use crate::model_store::ModelName;
        let image_rgba = vec![128u8; 200 * 200 * 4];
        let image = ImageBuffer::new(image_rgba, 200, 200).unwrap();
        let pnet = ModelSession::placeholder(ModelName::PNet, vec![], vec![]);
        let rnet = ModelSession::placeholder(ModelName::RNet, vec![], vec![]);
        let onet = ModelSession::placeholder(ModelName::ONet, vec![], vec![]);
        let token = CancellationToken::new();
        let result = detect_face(&image, &pnet, &rnet, &onet, &token);
        assert!(result.is_err());
    }
}
