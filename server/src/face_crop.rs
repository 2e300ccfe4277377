use async_trait::async_trait;
use liveness_core::collaborators::FaceCropProvider;
use liveness_core::image_buffer::ImageBuffer;
use liveness_core::CoreResult;

/// Demo stand-in for §6's `FaceCropProvider`: resize-to-256 + center-crop-to-224,
/// the same geometry the reference external detector applies, but without
/// running a second face detector — this binary's own MTCNN (C4) still runs
/// against the result inside the pipeline right afterward. A production
/// deployment would replace this with a real external detector as §6 requires.
pub struct CenterCropFaceProvider;

#[async_trait]
impl FaceCropProvider for CenterCropFaceProvider {
    async fn crop(&self, image: &ImageBuffer) -> CoreResult<Option<ImageBuffer>> {
        Ok(Some(image.center_crop_resize(256, 224)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn crops_to_224_square() {
        let rgba = vec![120u8; 400 * 300 * 4];
        let image = ImageBuffer::new(rgba, 400, 300).unwrap();
        let provider = CenterCropFaceProvider;
        let cropped = provider.crop(&image).await.unwrap().unwrap();
        assert_eq!(cropped.width(), 224);
        assert_eq!(cropped.height(), 224);
    }
}
