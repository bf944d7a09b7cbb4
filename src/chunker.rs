//! Content-defined chunker.
//!
//! A streaming rolling-sum boundary detector. The ring buffer holds the
//! last `2^buffer_pot` bytes seen; a boundary is declared when the low
//! `modulus_pot` bits of the running sum of those bytes are all zero.
//! Because the decision depends only on the last `2^buffer_pot` bytes, an
//! insertion earlier in the stream shifts boundaries locally but doesn't
//! disturb ones far enough away — the shift-resistance that makes
//! content-defined chunking worth using over fixed-size chunking.

/// Reference chunker parameters: 1 KiB ring buffer, boundary on 12 zero
/// bits of the running sum (mean chunk size 4 KiB).
pub const DEFAULT_BUFFER_POT: u32 = 10;
pub const DEFAULT_MODULUS_POT: u32 = 12;

#[derive(Debug, Clone, Copy)]
pub struct ChunkerParams {
    pub buffer_pot: u32,
    pub modulus_pot: u32,
}

impl Default for ChunkerParams {
    fn default() -> Self {
        ChunkerParams {
            buffer_pot: DEFAULT_BUFFER_POT,
            modulus_pot: DEFAULT_MODULUS_POT,
        }
    }
}

pub struct Chunker {
    ring: Vec<u8>,
    index: usize,
    sum: u64,
    modulus_mask: u64,
}

impl Chunker {
    pub fn new(params: ChunkerParams) -> Self {
        let size = 1usize << params.buffer_pot;
        Chunker {
            ring: vec![0u8; size],
            index: 0,
            sum: 0,
            modulus_mask: (1u64 << params.modulus_pot) - 1,
        }
    }

    /// Feed one byte into the rolling window.
    pub fn update(&mut self, b: u8) {
        let evicted = self.ring[self.index];
        self.sum = self.sum.wrapping_sub(evicted as u64);
        self.sum = self.sum.wrapping_add(b as u64);
        self.ring[self.index] = b;
        self.index = (self.index + 1) % self.ring.len();
    }

    /// Whether the window currently sits on a chunk boundary.
    pub fn is_marker(&self) -> bool {
        self.sum & self.modulus_mask == 0
    }

    pub fn reset(&mut self) {
        self.sum = 0;
        for b in self.ring.iter_mut() {
            *b = 0;
        }
        self.index = 0;
    }
}
