//! RC4 stream cipher.
//!
//! The site encrypts download links with classic RC4, so this must match the
//! textbook key schedule and keystream bit for bit. Encryption and decryption
//! are the same operation.

/// RC4 cipher state.
#[derive(Clone)]
pub struct Rc4 {
    state: [u8; 256],
    i: u8,
    j: u8,
}

impl Rc4 {
    /// Runs the key schedule for `key`.
    ///
    /// Returns `None` for an empty key.
    #[must_use]
    pub fn new(key: &[u8]) -> Option<Self> {
        if key.is_empty() {
            return None;
        }

        let mut state = [0u8; 256];
        for (slot, value) in state.iter_mut().zip(0u8..=255) {
            *slot = value;
        }

        let mut j: u8 = 0;
        for i in 0..256 {
            j = j
                .wrapping_add(state[i])
                .wrapping_add(key[i % key.len()]);
            state.swap(i, usize::from(j));
        }

        Some(Self { state, i: 0, j: 0 })
    }

    /// XORs `data` in place with the next keystream bytes.
    pub fn apply_keystream(&mut self, data: &mut [u8]) {
        for byte in data {
            self.i = self.i.wrapping_add(1);
            self.j = self.j.wrapping_add(self.state[usize::from(self.i)]);
            self.state.swap(usize::from(self.i), usize::from(self.j));
            let index = self.state[usize::from(self.i)]
                .wrapping_add(self.state[usize::from(self.j)]);
            *byte ^= self.state[usize::from(index)];
        }
    }
}

impl std::fmt::Debug for Rc4 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rc4").finish_non_exhaustive()
    }
}

/// Encrypts or decrypts `data` with a fresh cipher keyed by `key`.
///
/// Returns `None` for an empty key.
#[must_use]
pub fn rc4_apply(key: &[u8], data: &[u8]) -> Option<Vec<u8>> {
    let mut cipher = Rc4::new(key)?;
    let mut output = data.to_vec();
    cipher.apply_keystream(&mut output);
    Some(output)
}
