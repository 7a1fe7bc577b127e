pub mod pixel_diff;
pub mod stub;

pub use pixel_diff::PixelDiffBackend;
pub use stub::StubFaceBackend;
