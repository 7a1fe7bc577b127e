/// Binary-safe line reassembly.
///
/// Transports hand over arbitrary chunks; the decoder wants lines. Each yielded
/// line keeps its trailing `\n` so photo bytes are reproduced exactly.
#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let rest = self.pending.split_off(pos + 1);
            lines.push(std::mem::replace(&mut self.pending, rest));
        }
        lines
    }
}
