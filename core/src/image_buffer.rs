use ndarray::{Array3, Array4};

use crate::error::{CoreError, CoreResult};

/// Lower/upper bounds on the short/long side of an image accepted by the
/// pipeline (§3): `64 ≤ min(W,H)` and `max(W,H) < 4096`.
pub const MIN_DIMENSION: u32 = 64;
pub const MAX_DIMENSION: u32 = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    Bilinear,
    Nearest,
}

/// An axis-aligned pixel rectangle, used by `crop`/`crop_padded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i64, y: i64, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Immutable 8-bit RGBA raster, row-major (§3 `Image`, §4.1 `Image Buffer`).
///
/// Color channel order is RGB; alpha is carried but ignored by every numeric
/// stage downstream (§3).
#[derive(Debug, Clone)]
pub struct ImageBuffer {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl ImageBuffer {
    pub fn new(rgba: Vec<u8>, width: u32, height: u32) -> CoreResult<Self> {
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(CoreError::InvalidImage(format!(
                "expected {expected} RGBA bytes for {width}x{height}, got {}",
                rgba.len()
            )));
        }
        Ok(Self {
            width,
            height,
            rgba,
        })
    }

    /// Decode arbitrary PNG/JPEG bytes the same way the reference
    /// `FaceModel::generate_embedding` decodes its input (`image::load_from_memory`).
    pub fn decode(bytes: &[u8]) -> CoreResult<Self> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| CoreError::InvalidImage(format!("failed to decode image: {e}")))?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self::new(rgba.into_raw(), width, height)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.rgba
    }

    /// §3's size-bounds acceptance test. Rejects too-small or too-large rasters.
    pub fn validate_bounds(&self) -> CoreResult<()> {
        let min_side = self.width.min(self.height);
        let max_side = self.width.max(self.height);
        if min_side <= MIN_DIMENSION {
            return Err(CoreError::InvalidImage(format!(
                "image too small: {}x{} (min side must exceed {MIN_DIMENSION})",
                self.width, self.height
            )));
        }
        if max_side >= MAX_DIMENSION {
            return Err(CoreError::InvalidImage(format!(
                "image too large: {}x{} (max side must be below {MAX_DIMENSION})",
                self.width, self.height
            )));
        }
        Ok(())
    }

    #[inline]
    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.rgba[idx],
            self.rgba[idx + 1],
            self.rgba[idx + 2],
            self.rgba[idx + 3],
        ]
    }

    /// Resize to `(new_w, new_h)`. Bilinear is the default/required mode for
    /// MTCNN stages 2/3 and the embedding input; nearest is permitted for the
    /// MTCNN stage-1 scaled pyramid (§4.1).
    pub fn resize(&self, new_w: u32, new_h: u32, interpolation: Interpolation) -> Self {
        if new_w == self.width && new_h == self.height {
            return self.clone();
        }
        let mut out = vec![0u8; new_w as usize * new_h as usize * 4];
        match interpolation {
            Interpolation::Bilinear => self.resize_bilinear_into(&mut out, new_w, new_h),
            Interpolation::Nearest => self.resize_nearest_into(&mut out, new_w, new_h),
        }
        Self {
            width: new_w,
            height: new_h,
            rgba: out,
        }
    }

    fn resize_bilinear_into(&self, out: &mut [u8], new_w: u32, new_h: u32) {
        let (sw, sh) = (self.width as f32, self.height as f32);
        let scale_x = sw / new_w as f32;
        let scale_y = sh / new_h as f32;
        for dy in 0..new_h {
            let sy = ((dy as f32 + 0.5) * scale_y - 0.5).clamp(0.0, sh - 1.0);
            let y0 = sy.floor() as u32;
            let y1 = (y0 + 1).min(self.height - 1);
            let fy = sy - y0 as f32;
            for dx in 0..new_w {
                let sx = ((dx as f32 + 0.5) * scale_x - 0.5).clamp(0.0, sw - 1.0);
                let x0 = sx.floor() as u32;
                let x1 = (x0 + 1).min(self.width - 1);
                let fx = sx - x0 as f32;

                let p00 = self.get_pixel(x0, y0);
                let p10 = self.get_pixel(x1, y0);
                let p01 = self.get_pixel(x0, y1);
                let p11 = self.get_pixel(x1, y1);

                let out_idx = (dy as usize * new_w as usize + dx as usize) * 4;
                for c in 0..4 {
                    let top = p00[c] as f32 * (1.0 - fx) + p10[c] as f32 * fx;
                    let bottom = p01[c] as f32 * (1.0 - fx) + p11[c] as f32 * fx;
                    let v = top * (1.0 - fy) + bottom * fy;
                    out[out_idx + c] = v.round().clamp(0.0, 255.0) as u8;
                }
            }
        }
    }

    fn resize_nearest_into(&self, out: &mut [u8], new_w: u32, new_h: u32) {
        let scale_x = self.width as f32 / new_w as f32;
        let scale_y = self.height as f32 / new_h as f32;
        for dy in 0..new_h {
            let sy = ((dy as f32 * scale_y) as u32).min(self.height - 1);
            for dx in 0..new_w {
                let sx = ((dx as f32 * scale_x) as u32).min(self.width - 1);
                let p = self.get_pixel(sx, sy);
                let out_idx = (dy as usize * new_w as usize + dx as usize) * 4;
                out[out_idx..out_idx + 4].copy_from_slice(&p);
            }
        }
    }

    /// Crop clipped to `[0,W)×[0,H)`; fails with `InvalidImage` if the
    /// resulting area is zero (§4.1).
    pub fn crop(&self, rect: Rect) -> CoreResult<Self> {
        let x0 = rect.x.max(0).min(self.width as i64) as u32;
        let y0 = rect.y.max(0).min(self.height as i64) as u32;
        let x1 = (rect.x + rect.width as i64).max(0).min(self.width as i64) as u32;
        let y1 = (rect.y + rect.height as i64).max(0).min(self.height as i64) as u32;
        if x1 <= x0 || y1 <= y0 {
            return Err(CoreError::InvalidImage(
                "crop rectangle has zero area after clipping".to_string(),
            ));
        }
        let w = x1 - x0;
        let h = y1 - y0;
        let mut out = vec![0u8; w as usize * h as usize * 4];
        for row in 0..h {
            let src_start = ((y0 + row) as usize * self.width as usize + x0 as usize) * 4;
            let src_end = src_start + w as usize * 4;
            let dst_start = row as usize * w as usize * 4;
            out[dst_start..dst_start + w as usize * 4]
                .copy_from_slice(&self.rgba[src_start..src_end]);
        }
        Ok(Self {
            width: w,
            height: h,
            rgba: out,
        })
    }

    /// Crop with zero-fill for any region outside `[0,W)×[0,H)`, the protocol
    /// MTCNN's R-Net/O-Net stages use to extract a box that may overhang the
    /// source image (§4.4).
    pub fn crop_padded(&self, x1: i64, y1: i64, x2: i64, y2: i64) -> Self {
        let w = (x2 - x1).max(0) as u32;
        let h = (y2 - y1).max(0) as u32;
        let mut out = vec![0u8; w as usize * h as usize * 4];
        for dy in 0..h {
            let sy = y1 + dy as i64;
            if sy < 0 || sy >= self.height as i64 {
                continue;
            }
            for dx in 0..w {
                let sx = x1 + dx as i64;
                if sx < 0 || sx >= self.width as i64 {
                    continue;
                }
                let p = self.get_pixel(sx as u32, sy as u32);
                let out_idx = (dy as usize * w as usize + dx as usize) * 4;
                out[out_idx..out_idx + 4].copy_from_slice(&p);
            }
        }
        Self {
            width: w,
            height: h,
            rgba: out,
        }
    }

    /// Resize-to-`long_side` (matching the shorter source dimension) then
    /// center-crop to `short_side × short_side` — the behavior §6's
    /// `FaceCropProvider` reference uses (resize-to-256, center-crop-to-224).
    pub fn center_crop_resize(&self, long_side: u32, short_side: u32) -> CoreResult<Self> {
        let min_side = self.width.min(self.height) as f32;
        let scale = long_side as f32 / min_side;
        let new_w = (self.width as f32 * scale).round().max(1.0) as u32;
        let new_h = (self.height as f32 * scale).round().max(1.0) as u32;
        let resized = self.resize(new_w, new_h, Interpolation::Bilinear);

        let x = ((new_w.saturating_sub(short_side)) / 2) as i64;
        let y = ((new_h.saturating_sub(short_side)) / 2) as i64;
        resized.crop(Rect::new(x, y, short_side, short_side))
    }

    /// Normalize to NCHW with explicit per-channel mean/std (§4.1):
    /// `(pixel − mean) × (1/(255·std))`.
    pub fn to_chw_tensor(&self, mean: [f32; 3], std: [f32; 3]) -> Array4<f32> {
        let (w, h) = (self.width as usize, self.height as usize);
        let mut tensor = Array4::<f32>::zeros((1, 3, h, w));
        for y in 0..h {
            for x in 0..w {
                let p = self.get_pixel(x as u32, y as u32);
                for c in 0..3 {
                    tensor[[0, c, y, x]] = (p[c] as f32 - mean[c]) * (1.0 / (255.0 * std[c]));
                }
            }
        }
        tensor
    }

    /// MTCNN's normalization (§4.1): `(pixel − 127.5) × 0.0078125`, no
    /// per-channel mean/std.
    pub fn to_chw_tensor_mtcnn(&self) -> Array4<f32> {
        let (w, h) = (self.width as usize, self.height as usize);
        let mut tensor = Array4::<f32>::zeros((1, 3, h, w));
        for y in 0..h {
            for x in 0..w {
                let p = self.get_pixel(x as u32, y as u32);
                for c in 0..3 {
                    tensor[[0, c, y, x]] = (p[c] as f32 - 127.5) * 0.0078125;
                }
            }
        }
        tensor
    }

    /// Raw per-channel f64 view (H,W,3), used by §4.6's quantile statistics,
    /// which run in f64 for numerical stability rather than f32 inference
    /// precision (§9).
    pub fn to_hwc_f64(&self) -> Array3<f64> {
        let (w, h) = (self.width as usize, self.height as usize);
        let mut out = Array3::<f64>::zeros((h, w, 3));
        for y in 0..h {
            for x in 0..w {
                let p = self.get_pixel(x as u32, y as u32);
                out[[y, x, 0]] = p[0] as f64;
                out[[y, x, 1]] = p[1] as f64;
                out[[y, x, 2]] = p[2] as f64;
            }
        }
        out
    }

    /// Grayscale conversion with luma weights (0.299, 0.587, 0.114), used by
    /// the Laplacian sharpness gate (§4.3).
    pub fn to_grayscale_f64(&self) -> Vec<f64> {
        let (w, h) = (self.width as usize, self.height as usize);
        let mut out = vec![0.0f64; w * h];
        for y in 0..h {
            for x in 0..w {
                let p = self.get_pixel(x as u32, y as u32);
                out[y * w + x] =
                    0.299 * p[0] as f64 + 0.587 * p[1] as f64 + 0.114 * p[2] as f64;
            }
        }
        out
    }
}
