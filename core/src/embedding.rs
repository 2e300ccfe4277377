use crate::error::CoreResult;
use crate::image_buffer::ImageBuffer;
use crate::model_store::ModelSession;

/// Extract the 512-D embedding from a 112×112 aligned face (§4.9).
pub fn extract_embedding(aligned_face: &ImageBuffer, session: &ModelSession) -> CoreResult<Vec<f64>> {
    let tensor = aligned_face.to_chw_tensor_mtcnn();
    let outputs = session.run(&tensor.into_dyn())?;
    let (_, data) = &outputs[0];
    Ok(data.iter().map(|&v| v as f64).collect())
}

/// Exact dot-product cosine similarity; embeddings are never L2-normalized
/// before storage (§4.9).
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// `verify(a,b) = cosine(a,b) > cosine_threshold` (§4.9).
pub fn verify(a: &[f64], b: &[f64], cosine_threshold: f64) -> bool {
    cosine_similarity(a, b) > cosine_threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model_store::ModelName;

    #[test]
    fn cosine_of_identical_vector_is_one() {
        let v = vec![0.3, -0.2, 0.8, 0.1];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_is_symmetric() {
        let a = vec![0.1, 0.5, -0.3];
        let b = vec![0.4, -0.1, 0.2];
        assert_eq!(cosine_similarity(&a, &b), cosine_similarity(&b, &a));
    }

    #[test]
    fn cosine_of_zero_vector_is_zero() {
        let a = vec![0.0, 0.0, 0.0];
        let b = vec![1.0, 2.0, 3.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn verify_uses_strict_greater_than() {
        let a = vec![1.0, 0.0];
        let b = vec![1.0, 0.0];
        // cosine == 1.0, threshold == 1.0 -> must be false under a strict `>`
        assert!(!verify(&a, &b, 1.0));
    }

    #[test]
    fn extract_embedding_fails_without_a_backing_session() {
        let rgba = vec![100u8; 112 * 112 * 4];
        let image = ImageBuffer::new(rgba, 112, 112).unwrap();
        let session = ModelSession::placeholder(ModelName::Embedding, vec![], vec![]);
        assert!(extract_embedding(&image, &session).is_err());
    }
}
