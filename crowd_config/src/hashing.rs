use std::hash::Hasher;

/// A deterministic FNV-1a 64-bit hasher.
///
/// Used to fingerprint compiled documents so identical descriptions can be
/// recognised across runs and machines.
#[derive(Debug)]
pub struct FnvHasher {
    state: u64,
}

impl FnvHasher {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;

    pub fn new() -> Self {
        Self {
            state: Self::OFFSET_BASIS,
        }
    }
}

impl Default for FnvHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher for FnvHasher {
    fn finish(&self) -> u64 {
        self.state
    }

    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.state ^= byte as u64;
            self.state = self.state.wrapping_mul(Self::PRIME);
        }
    }
}

/// FNV-1a digest of a compiled document.
pub fn document_digest(bytes: &[u8]) -> u64 {
    let mut hasher = FnvHasher::new();
    hasher.write(bytes);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_the_offset_basis() {
        assert_eq!(document_digest(&[]), 0xcbf29ce484222325);
    }

    #[test]
    fn matches_reference_vector() {
        // FNV-1a 64 of "a"
        assert_eq!(document_digest(b"a"), 0xaf63dc4c8601ec8c);
    }
}
