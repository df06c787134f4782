//! # Chunk Buffer
//!
//! Ordered, append-only storage for the encoded fragments a recorder emits.
//! Nothing is ever dropped: the upload needs every fragment, in order, to
//! produce a decodable file.

/// Encoded audio fragments in arrival order.
#[derive(Debug, Default, Clone)]
pub struct ChunkBuffer {
    chunks: Vec<Vec<u8>>,
    total_bytes: usize,
}

impl ChunkBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one fragment. Empty fragments are skipped; returns whether
    /// anything was stored.
    pub fn append(&mut self, data: &[u8]) -> bool {
        if data.is_empty() {
            return false;
        }
        self.total_bytes += data.len();
        self.chunks.push(data.to_vec());
        true
    }

    /// Concatenate every fragment into one payload and leave the buffer empty.
    pub fn assemble(&mut self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(self.total_bytes);
        for chunk in self.chunks.drain(..) {
            payload.extend_from_slice(&chunk);
        }
        self.total_bytes = 0;
        payload
    }

    /// Number of fragments stored.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }
}
