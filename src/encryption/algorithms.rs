//! Standard Security Handler algorithms (revisions 2 and 3).
//!
//! This module implements the key derivation and the O/U string algorithms
//! from the PDF specification. The recovery engine only runs them in the
//! checking direction; the generating direction is kept so documents can be
//! synthesised for tests and benchmarks.
//!
//! PDF Spec: Section 7.6.3 - Standard Security Handler
//! (PDF Reference 1.7: Algorithms 3.2 - 3.5)

use md5::{Digest, Md5};

use super::rc4;

/// Padding string used in PDF encryption (32 bytes).
///
/// PDF Spec: Algorithm 2, step 1
pub const PADDING: [u8; 32] = *b"\x28\xBF\x4E\x5E\x4E\x75\x8A\x41\
                                 \x64\x00\x4E\x56\xFF\xFA\x01\x08\
                                 \x2E\x2E\x00\xB6\xD0\x68\x3E\x80\
                                 \x2F\x0C\xA9\xFE\x64\x53\x69\x7A";

/// Maximum number of password bytes that take part in key derivation.
pub const MAX_PASSWORD_LEN: usize = 32;

/// Number of leading bytes decrypted by the revision 3 early-exit check.
///
/// Three bytes means a wrong key passes the partial check once every
/// 256^3 = 16,777,216 candidates.
pub const PARTIAL_TEST_SIZE: usize = 3;

/// Rounds of RC4 applied to the verification strings for revision 3.
pub(crate) const REV3_RC4_ROUNDS: u8 = 20;

/// Rounds of MD5 key stretching for revision 3.
pub(crate) const REV3_MD5_ROUNDS: usize = 50;

/// Pad or truncate a password to 32 bytes using the standard padding.
///
/// Bytes beyond [`MAX_PASSWORD_LEN`] are dropped.
///
/// PDF Spec: Algorithm 2, step 1
pub fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut padded = PADDING;
    write_padded(&mut padded, password);
    padded
}

/// Write `password` padded to 32 bytes into `slot`.
///
/// # Panics
///
/// Panics if `slot` is not exactly 32 bytes long.
#[inline]
pub(crate) fn write_padded(slot: &mut [u8], password: &[u8]) {
    assert_eq!(slot.len(), MAX_PASSWORD_LEN, "password slot must be 32 bytes");
    let pass_len = password.len().min(MAX_PASSWORD_LEN);
    slot[..pass_len].copy_from_slice(&password[..pass_len]);
    slot[pass_len..].copy_from_slice(&PADDING[..MAX_PASSWORD_LEN - pass_len]);
}

/// Strip the standard padding from a padded password.
///
/// The password ends where the longest suffix that is a prefix of
/// [`PADDING`] begins.
pub fn unpad_password(padded: &[u8; 32]) -> Vec<u8> {
    for start in 0..=MAX_PASSWORD_LEN {
        if padded[start..] == PADDING[..MAX_PASSWORD_LEN - start] {
            return padded[..start].to_vec();
        }
    }
    padded.to_vec()
}

/// MD5 digest of `data`.
#[inline]
pub(crate) fn md5(data: &[u8]) -> [u8; 16] {
    Md5::digest(data).into()
}

/// Revision 3 key stretching: 50 rounds of MD5 over the first `key_len`
/// bytes of the previous digest.
///
/// PDF Spec: Algorithm 2, step h
#[inline]
pub(crate) fn stretch_key(digest: &mut [u8; 16], key_len: usize) {
    for _ in 0..REV3_MD5_ROUNDS {
        *digest = md5(&digest[..key_len]);
    }
}

/// Undo the revision 3 RC4 chain on `data`.
///
/// Round `i` runs from 19 down to 0 and uses the key with every byte XORed
/// with `i`. Each round consumes the previous round's output, so the rounds
/// cannot be reordered or overlapped.
#[inline]
pub(crate) fn rev3_decrypt(key: &[u8], data: &mut [u8]) {
    let mut round_key = [0u8; 16];
    let round_key = &mut round_key[..key.len()];
    for i in (0..REV3_RC4_ROUNDS).rev() {
        for (dst, src) in round_key.iter_mut().zip(key) {
            *dst = src ^ i;
        }
        rc4::rc4_in_place(round_key, data);
    }
}

/// Apply the revision 3 RC4 chain in the encrypting direction (rounds 0..19).
pub(crate) fn rev3_encrypt(key: &[u8], data: &mut [u8]) {
    let mut round_key = [0u8; 16];
    let round_key = &mut round_key[..key.len()];
    for i in 0..REV3_RC4_ROUNDS {
        for (dst, src) in round_key.iter_mut().zip(key) {
            *dst = src ^ i;
        }
        rc4::rc4_in_place(round_key, data);
    }
}

/// Expected plaintext of the first 16 bytes of a revision 3 U string:
/// MD5(padding || file identifier).
///
/// PDF Spec: Algorithm 5, step b
pub fn rev3_test_key(file_id: &[u8]) -> [u8; 16] {
    let mut hasher = Md5::new();
    hasher.update(PADDING);
    hasher.update(file_id);
    hasher.finalize().into()
}

/// Key used to encrypt (or decrypt) the O string: MD5 of the padded owner
/// password, stretched for revision 3.
///
/// PDF Spec: Algorithm 3, steps a-d
#[inline]
pub(crate) fn owner_key(padded_owner: &[u8; 32], revision: u32, key_len: usize) -> [u8; 16] {
    let mut digest = md5(padded_owner);
    if revision >= 3 {
        stretch_key(&mut digest, key_len);
    }
    digest
}

/// Compute the file encryption key from a password (Algorithm 2).
///
/// Only the first `key_len` bytes of the returned digest are the key.
pub fn compute_encryption_key(
    password: &[u8],
    owner_string: &[u8; 32],
    permissions: i32,
    file_id: &[u8],
    revision: u32,
    key_len: usize,
    encrypt_metadata: bool,
) -> [u8; 16] {
    let mut hasher = Md5::new();
    hasher.update(pad_password(password));
    hasher.update(owner_string);
    hasher.update(permissions.to_le_bytes());
    hasher.update(file_id);
    if revision >= 4 && !encrypt_metadata {
        hasher.update([0xFF, 0xFF, 0xFF, 0xFF]);
    }
    let mut digest: [u8; 16] = hasher.finalize().into();
    if revision >= 3 {
        stretch_key(&mut digest, key_len);
    }
    digest
}

/// Compute the O string (Algorithm 3).
///
/// An empty owner password falls back to the user password.
pub fn compute_owner_string(
    owner_password: &[u8],
    user_password: &[u8],
    revision: u32,
    key_len: usize,
) -> [u8; 32] {
    let password = if owner_password.is_empty() {
        user_password
    } else {
        owner_password
    };
    let key = owner_key(&pad_password(password), revision, key_len);
    let mut result = pad_password(user_password);
    if revision >= 3 {
        rev3_encrypt(&key[..key_len], &mut result);
    } else {
        rc4::rc4_in_place(&key[..5], &mut result);
    }
    result
}

/// Compute the U string (Algorithm 4 for R=2, Algorithm 5 for R=3).
///
/// For revision 3 the trailing 16 arbitrary bytes are zeros.
pub fn compute_user_string(key: &[u8], file_id: &[u8], revision: u32) -> [u8; 32] {
    let mut result = [0u8; 32];
    if revision >= 3 {
        let mut hash = rev3_test_key(file_id);
        rev3_encrypt(key, &mut hash);
        result[..16].copy_from_slice(&hash);
    } else {
        result.copy_from_slice(&rc4::rc4_crypt(key, &PADDING));
    }
    result
}
