use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::capability::{Embedding, FaceCapability};

const GALLERY_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

#[derive(Clone, Debug, PartialEq)]
pub struct KnownFace {
    pub name: String,
    pub embedding: Embedding,
}

/// Known-person embeddings, loaded once at startup and read-only afterwards.
///
/// There is no reload path; picking up new reference photos needs a restart.
#[derive(Clone, Debug, Default)]
pub struct KnownFaceGallery {
    faces: Vec<KnownFace>,
}

impl KnownFaceGallery {
    pub fn new(faces: Vec<KnownFace>) -> Self {
        Self { faces }
    }

    /// Learn every labelled image in `dir`. The label is the file stem.
    ///
    /// Images without a face, or that the capability cannot process, are
    /// skipped. A missing directory is created and yields an empty gallery.
    pub fn load(dir: &Path, capability: &dyn FaceCapability) -> Result<Self> {
        if !dir.exists() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create known faces dir {}", dir.display()))?;
            log::info!("created empty known faces dir {}", dir.display());
            return Ok(Self::default());
        }

        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
            .with_context(|| format!("read known faces dir {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.is_file() && has_gallery_extension(path))
            .collect();
        paths.sort();

        let mut faces = Vec::new();
        for path in paths {
            let Some(name) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
                continue;
            };
            let bytes = match std::fs::read(&path) {
                Ok(bytes) => bytes,
                Err(err) => {
                    log::warn!("skipping {}: {}", path.display(), err);
                    continue;
                }
            };
            match capability.detect_and_embed(&bytes) {
                Ok(embeddings) => match embeddings.into_iter().next() {
                    Some(embedding) => {
                        log::info!("learned face: {}", name);
                        faces.push(KnownFace { name, embedding });
                    }
                    None => log::debug!("no face found in {}", path.display()),
                },
                Err(err) => log::warn!("face backend failed on {}: {}", path.display(), err),
            }
        }

        log::info!("known faces loaded: {}", faces.len());
        Ok(Self { faces })
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    pub fn faces(&self) -> &[KnownFace] {
        &self.faces
    }

    /// First gallery entry, in gallery order, whose similarity to `candidate`
    /// exceeds `threshold`. This is deliberately not a best-match search.
    pub fn match_face(&self, candidate: &[f32], threshold: f32) -> Option<(&KnownFace, f32)> {
        self.faces.iter().find_map(|face| {
            let similarity = cosine_similarity(candidate, &face.embedding);
            (similarity > threshold).then_some((face, similarity))
        })
    }
}

/// `dot(a, b) / (|a| * |b|)`. Zero vectors and length mismatches score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn has_gallery_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            GALLERY_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}
