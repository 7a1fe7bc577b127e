use anyhow::Result;

/// Face embedding vector. Length is fixed by the embedding model.
pub type Embedding = Vec<f32>;

/// Face detection + embedding capability.
///
/// # Audit Boundary
///
/// The gateway treats this as a black box. Implementations receive the encoded
/// image (JPEG/PNG) exactly as the Reporter sent it and must return one
/// embedding per detected face, most prominent face first. An empty vector
/// means "no face", not an error.
pub trait FaceCapability: Send + Sync {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    fn detect_and_embed(&self, image: &[u8]) -> Result<Vec<Embedding>>;
}

/// Visual difference capability.
pub trait DiffCapability: Send + Sync {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Percentage in `[0, 100]` describing how much `candidate` differs from
    /// `reference`. Implementations must tolerate size mismatches.
    fn percent_difference(&self, reference: &[u8], candidate: &[u8]) -> Result<f64>;
}
