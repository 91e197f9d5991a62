//! RC4 keystream for the Standard Security Handler.
//!
//! RC4 is the stream cipher behind revisions 2 and 3 of the handler. The
//! recovery loop runs the key schedule once or twenty times per candidate,
//! so everything here works in place on caller buffers and never allocates
//! on the hot path.
//!
//! PDF Spec: Section 7.6.2 - General Encryption Algorithm

/// RC4 cipher state.
#[derive(Clone)]
pub(crate) struct Rc4 {
    s: [u8; 256],
    i: u8,
    j: u8,
}

impl Rc4 {
    /// Initialize RC4 with a key, picking a key schedule specialised for the
    /// two lengths the handler actually uses (40-bit and 128-bit).
    ///
    /// # Panics
    ///
    /// Panics if `key` is empty.
    pub(crate) fn new(key: &[u8]) -> Self {
        assert!(!key.is_empty(), "RC4 key must not be empty");
        match key.len() {
            5 => Self::keyed::<5>(key),
            16 => Self::keyed::<16>(key),
            _ => Self::keyed_dyn(key),
        }
    }

    /// Key schedule with a compile-time key length, so `i % N` folds into
    /// a cheap constant operation.
    #[inline]
    fn keyed<const N: usize>(key: &[u8]) -> Self {
        let key: &[u8; N] = match key.try_into() {
            Ok(k) => k,
            Err(_) => return Self::keyed_dyn(key),
        };
        let mut s = identity();
        let mut j = 0u8;
        for i in 0..256 {
            j = j.wrapping_add(s[i]).wrapping_add(key[i % N]);
            s.swap(i, j as usize);
        }
        Self { s, i: 0, j: 0 }
    }

    fn keyed_dyn(key: &[u8]) -> Self {
        let mut s = identity();
        let mut j = 0u8;
        for i in 0..256 {
            j = j.wrapping_add(s[i]).wrapping_add(key[i % key.len()]);
            s.swap(i, j as usize);
        }
        Self { s, i: 0, j: 0 }
    }

    /// Generate the next byte of keystream.
    #[inline]
    fn next_byte(&mut self) -> u8 {
        self.i = self.i.wrapping_add(1);
        self.j = self.j.wrapping_add(self.s[self.i as usize]);
        self.s.swap(self.i as usize, self.j as usize);
        let k = self.s[self.i as usize].wrapping_add(self.s[self.j as usize]);
        self.s[k as usize]
    }

    /// Apply keystream to data (XOR operation).
    #[inline]
    pub(crate) fn apply_keystream(&mut self, data: &mut [u8]) {
        for byte in data.iter_mut() {
            *byte ^= self.next_byte();
        }
    }
}

#[inline]
fn identity() -> [u8; 256] {
    let mut s = [0u8; 256];
    for (i, val) in s.iter_mut().enumerate() {
        *val = i as u8;
    }
    s
}

/// Encrypt or decrypt `data` in place.
#[inline]
pub(crate) fn rc4_in_place(key: &[u8], data: &mut [u8]) {
    Rc4::new(key).apply_keystream(data);
}

/// Encrypt or decrypt data using RC4, returning a new buffer.
///
/// RC4 is symmetric, so encryption and decryption are the same operation.
pub(crate) fn rc4_crypt(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut result = data.to_vec();
    rc4_in_place(key, &mut result);
    result
}

/// Check whether decrypting `ciphertext` with `key` yields `expected`.
///
/// Stops at the first differing byte, which on a wrong key is almost always
/// the first one.
#[inline]
pub(crate) fn rc4_matches(key: &[u8], ciphertext: &[u8], expected: &[u8]) -> bool {
    if ciphertext.len() != expected.len() {
        return false;
    }
    let mut cipher = Rc4::new(key);
    ciphertext
        .iter()
        .zip(expected)
        .all(|(&c, &e)| c ^ cipher.next_byte() == e)
}
