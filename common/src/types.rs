use serde::{Deserialize, Serialize};

/// Request to run the liveness pipeline against a still image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectRequest {
    pub image_base64: String,
}

/// The two labels a liveness check can resolve to (§3 `LivenessVerdict.prediction`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Prediction {
    Live,
    Spoof,
}

/// Liveness/spoof probabilities reported by the C8 ensemble (§4.8).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LivenessScores {
    pub live: f32,
    pub spoof: f32,
}

/// Occluded/normal probabilities reported by the C7 classifier (§4.7).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OcclusionScores {
    pub occluded: f32,
    pub normal: f32,
}

/// The full result of a `detect_liveness` call (§3 `LivenessVerdict`).
///
/// `liveness_scores`/`occlusion_scores` are populated only for the pipeline steps that
/// actually ran (§4.10): a quality or albedo failure leaves both absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessVerdict {
    pub prediction: Prediction,
    pub confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub liveness_scores: Option<LivenessScores>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occlusion_scores: Option<OcclusionScores>,
}

impl LivenessVerdict {
    pub fn is_live(&self) -> bool {
        self.prediction == Prediction::Live
    }
}

/// Response returned by the demo server's `/detect-liveness` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectResponse {
    #[serde(flatten)]
    pub verdict: LivenessVerdict,
    pub duration_ms: u64,
}

/// Request to enroll a still image's embedding against a user id (§6 `EmbeddingStore::put`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollRequest {
    pub user_id: String,
    pub name: String,
    pub image_base64: String,
}

/// Response from the demo server's `/enroll` endpoint. `enrolled` is false
/// when the liveness check failed and the embedding store was never written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollResponse {
    pub enrolled: bool,
    #[serde(flatten)]
    pub verdict: LivenessVerdict,
    pub duration_ms: u64,
}

/// Request to verify a still image's embedding against a previously enrolled user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub user_id: String,
    pub image_base64: String,
}

/// Response from the demo server's `/verify` endpoint (§4.9 `verify`, §6 `increment_match`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub matched: bool,
    pub similarity: f64,
    #[serde(flatten)]
    pub verdict: LivenessVerdict,
    pub duration_ms: u64,
}

/// Internal representation of a user embedding, persisted to the embeddings store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserEmbedding {
    pub user_id: String,
    pub name: String,
    pub embedding: Vec<f64>,
}

/// Database of enrolled embeddings (loaded from the embeddings-store file, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingsData {
    pub embeddings: Vec<UserEmbedding>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_request_serialization() {
        let req = DetectRequest {
            image_base64: "base64data".to_string(),
        };

        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("base64data"));
        assert!(json.contains("image_base64"));
    }

    #[test]
    fn test_liveness_verdict_serialization_live() {
        let verdict = LivenessVerdict {
            prediction: Prediction::Live,
            confidence: 0.95,
            failure_reason: None,
            liveness_scores: Some(LivenessScores {
                live: 0.95,
                spoof: 0.05,
            }),
            occlusion_scores: Some(OcclusionScores {
                occluded: 0.01,
                normal: 0.99,
            }),
        };

        let json = serde_json::to_string(&verdict).unwrap();
        assert!(json.contains("\"Live\""));
        assert!(!json.contains("failure_reason"));

        let back: LivenessVerdict = serde_json::from_str(&json).unwrap();
        assert!(back.is_live());
    }

    #[test]
    fn test_liveness_verdict_serialization_spoof_with_reason() {
        let verdict = LivenessVerdict {
            prediction: Prediction::Spoof,
            confidence: 0.0,
            failure_reason: Some("Image is blurry".to_string()),
            liveness_scores: None,
            occlusion_scores: None,
        };

        let json = serde_json::to_string(&verdict).unwrap();
        assert!(json.contains("Image is blurry"));
        assert!(!json.contains("liveness_scores"));

        let back: LivenessVerdict = serde_json::from_str(&json).unwrap();
        assert!(!back.is_live());
    }

    #[test]
    fn test_user_embedding_serialization() {
        let embedding = UserEmbedding {
            user_id: "user1".to_string(),
            name: "John Doe".to_string(),
            embedding: vec![0.1, 0.2, 0.3],
        };

        let json = serde_json::to_string(&embedding).unwrap();
        let deserialized: UserEmbedding = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.user_id, "user1");
        assert_eq!(deserialized.name, "John Doe");
        assert_eq!(deserialized.embedding.len(), 3);
    }

    #[test]
    fn test_embeddings_data_serialization() {
        let data = EmbeddingsData {
            embeddings: vec![
                UserEmbedding {
                    user_id: "user1".to_string(),
                    name: "User 1".to_string(),
                    embedding: vec![0.1, 0.2],
                },
                UserEmbedding {
                    user_id: "user2".to_string(),
                    name: "User 2".to_string(),
                    embedding: vec![0.3, 0.4],
                },
            ],
        };

        let json = serde_json::to_string(&data).unwrap();
        let deserialized: EmbeddingsData = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.embeddings.len(), 2);
        assert_eq!(deserialized.embeddings[0].user_id, "user1");
        assert_eq!(deserialized.embeddings[1].user_id, "user2");
    }

    #[test]
    fn test_enroll_request_serialization() {
        let req = EnrollRequest {
            user_id: "user1".to_string(),
            name: "Ada".to_string(),
            image_base64: "base64data".to_string(),
        };
        let json = serde_json::to_string(&req).unwrap();
        let back: EnrollRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.user_id, "user1");
        assert_eq!(back.name, "Ada");
    }

    #[test]
    fn test_verify_response_flattens_verdict_fields() {
        let resp = VerifyResponse {
            matched: true,
            similarity: 0.92,
            verdict: LivenessVerdict {
                prediction: Prediction::Live,
                confidence: 0.95,
                failure_reason: None,
                liveness_scores: None,
                occlusion_scores: None,
            },
            duration_ms: 42,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"matched\":true"));
        assert!(json.contains("\"similarity\":0.92"));
        assert!(json.contains("\"Live\""));
        assert!(!json.contains("\"verdict\""));
    }
}
