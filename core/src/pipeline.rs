use std::sync::Arc;

use common::{LivenessScores, LivenessVerdict, OcclusionScores, Prediction};
use tracing::{info_span, warn};

use crate::aligner::align_face;
use crate::albedo::check_albedo;
use crate::cancellation::CancellationToken;
use crate::collaborators::FaceCropProvider;
use crate::config::DetectorConfig;
use crate::detector::detect_face;
use crate::embedding::extract_embedding;
use crate::error::{CoreError, CoreResult};
use crate::image_buffer::ImageBuffer;
use crate::liveness::{check_liveness, LivenessLabel};
use crate::model_store::ModelSession;
use crate::occlusion::check_occlusion;
use crate::quality::is_sharp_enough;

fn spoof(failure_reason: impl Into<String>) -> LivenessVerdict {
    LivenessVerdict {
        prediction: Prediction::Spoof,
        confidence: 0.0,
        failure_reason: Some(failure_reason.into()),
        liveness_scores: None,
        occlusion_scores: None,
    }
}

/// The five sessions plus configuration a `LivenessPipeline` needs to run
/// `detect_liveness` end to end (§4.10). The occlusion session is optional:
/// its absence degrades open rather than failing the call (§4.7).
pub struct LivenessPipeline {
    config: DetectorConfig,
    pnet: Arc<ModelSession>,
    rnet: Arc<ModelSession>,
    onet: Arc<ModelSession>,
    embedding: Arc<ModelSession>,
    occlusion: Option<Arc<ModelSession>>,
    liveness1: Arc<ModelSession>,
    liveness2: Arc<ModelSession>,
}

impl LivenessPipeline {
    pub fn new(
        config: DetectorConfig,
        pnet: Arc<ModelSession>,
        rnet: Arc<ModelSession>,
        onet: Arc<ModelSession>,
        embedding: Arc<ModelSession>,
        occlusion: Option<Arc<ModelSession>>,
        liveness1: Arc<ModelSession>,
        liveness2: Arc<ModelSession>,
    ) -> Self {
        Self {
            config,
            pnet,
            rnet,
            onet,
            embedding,
            occlusion,
            liveness1,
            liveness2,
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Run the full pipeline (§4.10) and return just the verdict.
    pub async fn detect_liveness(
        &self,
        rgba: &[u8],
        width: u32,
        height: u32,
        face_crop: Option<&(dyn FaceCropProvider)>,
        token: &CancellationToken,
    ) -> CoreResult<LivenessVerdict> {
        let (verdict, _aligned) = self
            .run(rgba, width, height, face_crop, token)
            .await?;
        Ok(verdict)
    }

    /// Like `detect_liveness`, but also returns the 512-D embedding when the
    /// call resolves to `Live` — the handoff C9 makes to the external
    /// embedding store/API per the §2 data-flow line.
    pub async fn detect_with_embedding(
        &self,
        rgba: &[u8],
        width: u32,
        height: u32,
        face_crop: Option<&(dyn FaceCropProvider)>,
        token: &CancellationToken,
    ) -> CoreResult<(LivenessVerdict, Option<Vec<f64>>)> {
        let (verdict, aligned) = self.run(rgba, width, height, face_crop, token).await?;
        if !verdict.is_live() {
            return Ok((verdict, None));
        }
        let embedding = match aligned {
            Some(face) => Some(extract_embedding(&face, &self.embedding)?),
            None => None,
        };
        Ok((verdict, embedding))
    }

    async fn run(
        &self,
        rgba: &[u8],
        width: u32,
        height: u32,
        face_crop: Option<&(dyn FaceCropProvider)>,
        token: &CancellationToken,
    ) -> CoreResult<(LivenessVerdict, Option<ImageBuffer>)> {
        let span = info_span!("detect_liveness", width, height);
        let _enter = span.enter();

        // Step 1: validate input image (§3 size bounds).
        let image = ImageBuffer::new(rgba.to_vec(), width, height)?;
        image.validate_bounds()?;

        if token.is_cancelled() {
            return Err(CoreError::Cancelled);
        }

        // Step 2: optional external face-crop collaborator.
        let working_image = if !self.config.skip_face_cropping {
            match face_crop {
                Some(provider) => match provider.crop(&image).await {
                    Ok(Some(cropped)) => cropped,
                    Ok(None) => image,
                    Err(err) => {
                        warn!(error = %err, "face-crop collaborator failed, continuing with original image");
                        image
                    }
                },
                None => image,
            }
        } else {
            image
        };

        // MTCNN detect + align, placed between steps 2 and 3 per §4.10.1.
        if token.is_cancelled() {
            return Err(CoreError::Cancelled);
        }
        let detected = detect_face(&working_image, &self.pnet, &self.rnet, &self.onet, token)?;
        let (_, landmarks) = match detected {
            Some(d) => d,
            None => return Ok((spoof("No face detected in the image"), None)),
        };
        let aligned_face = match align_face(&working_image, &landmarks) {
            Ok(face) => face,
            Err(_) => return Ok((spoof("No face detected in the image"), None)),
        };

        // Step 3: quality gate.
        if !is_sharp_enough(&aligned_face, self.config.sharpness_threshold) {
            return Ok((spoof("Image is blurry"), Some(aligned_face)));
        }

        // Step 4: albedo check.
        if !self.config.skip_albedo_check {
            let albedo = check_albedo(&aligned_face);
            if !albedo.is_live {
                return Ok((
                    spoof("Albedo check failed: Image is spoof"),
                    Some(aligned_face),
                ));
            }
        }

        // Step 5: occlusion check.
        let mut occlusion_scores = None;
        if !self.config.skip_occlusion_check {
            if token.is_cancelled() {
                return Err(CoreError::Cancelled);
            }
            let occlusion = check_occlusion(
                &aligned_face,
                self.occlusion.as_ref(),
                self.config.occlusion_iterations,
                self.config.occlusion_threshold,
            )?;
            occlusion_scores = Some(OcclusionScores {
                occluded: occlusion.avg_occluded as f32,
                normal: occlusion.avg_normal as f32,
            });
            if !occlusion.is_normal {
                let mut verdict = spoof(format!("Face is occluded: {}", occlusion.label()));
                verdict.confidence = occlusion.avg_occluded as f32;
                verdict.occlusion_scores = occlusion_scores;
                return Ok((verdict, Some(aligned_face)));
            }
        }

        // Step 6: liveness ensemble.
        if token.is_cancelled() {
            return Err(CoreError::Cancelled);
        }
        let liveness = check_liveness(
            &aligned_face,
            &self.liveness1,
            &self.liveness2,
            self.config.liveness_model_weights,
            self.config.liveness_iterations,
            self.config.liveness_threshold,
        )?;

        let liveness_scores = Some(LivenessScores {
            live: liveness.combined_live as f32,
            spoof: liveness.combined_spoof as f32,
        });

        let verdict = match liveness.label {
            LivenessLabel::Live => LivenessVerdict {
                prediction: Prediction::Live,
                confidence: liveness.confidence as f32,
                failure_reason: None,
                liveness_scores,
                occlusion_scores,
            },
            LivenessLabel::Spoof => LivenessVerdict {
                prediction: Prediction::Spoof,
                confidence: liveness.confidence as f32,
                failure_reason: Some("Liveness check failed".to_string()),
                liveness_scores,
                occlusion_scores,
            },
        };
        Ok((verdict, Some(aligned_face)))
    }
}
