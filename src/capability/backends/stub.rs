use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;

use crate::capability::backend::{Embedding, FaceCapability};

/// Stub face backend for testing and for deployments without a face model.
///
/// Returns the embeddings registered for an exact image payload and no faces
/// for anything else.
#[derive(Default)]
pub struct StubFaceBackend {
    faces: HashMap<Vec<u8>, Vec<Embedding>>,
    calls: AtomicUsize,
}

impl StubFaceBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the faces "seen" in `image`.
    pub fn with_faces(mut self, image: &[u8], embeddings: Vec<Embedding>) -> Self {
        self.faces.insert(image.to_vec(), embeddings);
        self
    }

    /// Number of `detect_and_embed` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FaceCapability for StubFaceBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect_and_embed(&self, image: &[u8]) -> Result<Vec<Embedding>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.faces.get(image).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_registered_faces_only() {
        let backend = StubFaceBackend::new().with_faces(b"alice.jpg", vec![vec![1.0, 0.0]]);
        assert_eq!(
            backend.detect_and_embed(b"alice.jpg").unwrap(),
            vec![vec![1.0, 0.0]]
        );
        assert!(backend.detect_and_embed(b"other").unwrap().is_empty());
        assert_eq!(backend.calls(), 2);
    }
}
