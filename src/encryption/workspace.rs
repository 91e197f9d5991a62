//! Precomputed input buffer for Algorithm 2.
//!
//! The MD5 input that produces the file encryption key is
//!
//! ```text
//! field            | bytes
//! -----------------+--------------
//! padded password  | 32
//! O entry          | 32
//! P entry (LE)     | 4
//! file identifier  | len(ID[0])
//! [0xFFFFFFFF]     | 4, only R>3 with EncryptMetadata false
//! ```
//!
//! Only the password slot changes between candidates, so the rest is built
//! once per document.

use super::algorithms::{self, write_padded, PADDING};
use super::EncryptionParameters;

const SLOT_LEN: usize = 32;
const FIXED_LEN: usize = 68;

/// Key derivation buffer for one document.
#[derive(Debug, Clone)]
pub struct KeyDerivationWorkspace {
    buf: Vec<u8>,
    revision: u32,
    key_len: usize,
}

impl KeyDerivationWorkspace {
    /// Build the workspace for `params`, with the padding constant in the
    /// password slot.
    pub fn new(params: &EncryptionParameters) -> Self {
        let extra = params.revision > 3 && !params.encrypt_metadata;
        let size = FIXED_LEN + params.file_id.len() + if extra { 4 } else { 0 };

        let mut buf = Vec::with_capacity(size);
        buf.extend_from_slice(&PADDING);
        buf.extend_from_slice(&params.owner_string_32());
        buf.extend_from_slice(&params.permissions.to_le_bytes());
        buf.extend_from_slice(&params.file_id);
        if extra {
            buf.extend_from_slice(&[0xFF; 4]);
        }
        debug_assert_eq!(buf.len(), size);

        Self {
            buf,
            revision: params.revision,
            key_len: params.key_length_bytes(),
        }
    }

    /// Total length of the buffer.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Always false: the fixed fields alone are 68 bytes.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Whole buffer.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Current password slot contents.
    pub fn password_slot(&self) -> &[u8] {
        &self.buf[..SLOT_LEN]
    }

    /// Put `password`, padded, into the slot. Longer input is truncated.
    #[inline]
    pub fn set_password(&mut self, password: &[u8]) {
        write_padded(&mut self.buf[..SLOT_LEN], password);
    }

    /// Put already padded 32-byte material into the slot.
    #[inline]
    pub fn set_padded(&mut self, padded: &[u8; 32]) {
        self.buf[..SLOT_LEN].copy_from_slice(padded);
    }

    /// Restore the padding constant (the empty password) in the slot.
    pub fn reset_password(&mut self) {
        self.buf[..SLOT_LEN].copy_from_slice(&PADDING);
    }

    /// MD5 over the first `length` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `length` exceeds the buffer.
    #[inline]
    pub fn digest(&self, length: usize) -> [u8; 16] {
        algorithms::md5(&self.buf[..length])
    }

    /// File encryption key for the password in the slot (Algorithm 2),
    /// stretched for revision 3. The first `key_length()` bytes are the key.
    #[inline]
    pub fn derive_key(&self) -> [u8; 16] {
        let mut key = self.digest(self.buf.len());
        if self.revision >= 3 {
            algorithms::stretch_key(&mut key, self.key_len);
        }
        key
    }

    /// RC4 key length in bytes.
    pub fn key_length(&self) -> usize {
        self.key_len
    }
}
