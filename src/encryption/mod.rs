//! Standard Security Handler parameters.
//!
//! This module holds the per-document encryption parameters consumed by the
//! recovery engine, together with the RC4/MD5 algorithms of the PDF
//! specification (ISO 32000-1:2008, Section 7.6.3) that the engine runs.
//!
//! Only revisions 2 (40-bit RC4) and 3 (40-128 bit RC4 with key stretching)
//! are handled; AES based revisions are rejected when a session begins.

use serde::{Deserialize, Serialize};

pub mod algorithms;
pub(crate) mod rc4;
mod workspace;

pub use algorithms::{pad_password, unpad_password, PADDING, PARTIAL_TEST_SIZE};
pub use workspace::KeyDerivationWorkspace;

/// Non-fatal problem found in a set of encryption parameters.
///
/// Derivation still runs with normalised values; the warning only makes the
/// permissive behavior observable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamWarning {
    /// O string is not exactly 32 bytes
    OwnerStringLength(usize),
    /// U string is not exactly 32 bytes
    UserStringLength(usize),
    /// Key length is not a multiple of 8 in 40..=128 bits
    KeyLength(u32),
    /// V and R values do not belong together
    VersionRevisionMismatch {
        /// Algorithm version (V)
        version: u32,
        /// Handler revision (R)
        revision: u32,
    },
}

impl std::fmt::Display for ParamWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamWarning::OwnerStringLength(len) => write!(f, "O-String != 32 Bytes: {}", len),
            ParamWarning::UserStringLength(len) => write!(f, "U-String != 32 Bytes: {}", len),
            ParamWarning::KeyLength(bits) => write!(f, "unusual key length: {} bits", bits),
            ParamWarning::VersionRevisionMismatch { version, revision } => {
                write!(f, "V={} does not match R={}", version, revision)
            },
        }
    }
}

/// Encryption parameters of one document.
///
/// This is the output of the encryption-dictionary extractor and the only
/// document input the engine needs. It is never mutated by a session.
///
/// PDF Spec: Table 20 / Table 21 - Encryption dictionary entries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionParameters {
    /// Revision number (R): 2 or 3
    pub revision: u32,
    /// Algorithm version (V)
    pub version: u32,
    /// Key length in bits (Length), 40 when absent
    pub key_length_bits: u32,
    /// User permissions (P field)
    pub permissions: i32,
    /// EncryptMetadata flag, true by default
    pub encrypt_metadata: bool,
    /// Owner verification string (O), 32 bytes
    pub owner_string: Vec<u8>,
    /// User verification string (U), 32 bytes (16 meaningful for R=3)
    pub user_string: Vec<u8>,
    /// First element of the trailer /ID array
    pub file_id: Vec<u8>,
}

impl EncryptionParameters {
    /// Effective key length in bytes.
    ///
    /// Revision 2 always uses 40-bit keys. Other revisions use `Length / 8`
    /// clamped to the 5..=16 range RC4-with-MD5 can produce.
    pub fn key_length_bytes(&self) -> usize {
        if self.revision == 2 {
            5
        } else {
            ((self.key_length_bits / 8) as usize).clamp(5, 16)
        }
    }

    /// O string normalised to 32 bytes (truncated or zero-extended).
    pub fn owner_string_32(&self) -> [u8; 32] {
        fixed_32(&self.owner_string)
    }

    /// U string normalised to 32 bytes (truncated or zero-extended).
    pub fn user_string_32(&self) -> [u8; 32] {
        fixed_32(&self.user_string)
    }

    /// Permission flags.
    pub fn permission_flags(&self) -> Permissions {
        Permissions::from_bits(self.permissions)
    }

    /// Check the parameters for non-fatal inconsistencies.
    pub fn validate(&self) -> Vec<ParamWarning> {
        let mut warnings = Vec::new();
        if self.owner_string.len() != 32 {
            warnings.push(ParamWarning::OwnerStringLength(self.owner_string.len()));
        }
        if self.user_string.len() != 32 {
            warnings.push(ParamWarning::UserStringLength(self.user_string.len()));
        }
        let bits = self.key_length_bits;
        if self.revision != 2 && (bits % 8 != 0 || !(40..=128).contains(&bits)) {
            warnings.push(ParamWarning::KeyLength(bits));
        }
        let expected_version = match self.revision {
            2 => Some(1),
            3 => Some(2),
            _ => None,
        };
        // V=0 is what an absent /V entry yields
        if let Some(expected) = expected_version {
            if self.version != expected && self.version != 0 {
                warnings.push(ParamWarning::VersionRevisionMismatch {
                    version: self.version,
                    revision: self.revision,
                });
            }
        }
        warnings
    }

    /// Build the parameters a writer would produce for the given password
    /// pair. Used to create fixtures with known passwords.
    ///
    /// PDF Spec: Algorithms 3, 4 and 5
    pub fn synthesize(
        owner_password: &[u8],
        user_password: &[u8],
        revision: u32,
        key_length_bits: u32,
        permissions: i32,
        file_id: &[u8],
    ) -> Self {
        let mut params = Self {
            revision,
            version: if revision >= 3 { 2 } else { 1 },
            key_length_bits,
            permissions,
            encrypt_metadata: true,
            owner_string: Vec::new(),
            user_string: Vec::new(),
            file_id: file_id.to_vec(),
        };
        let key_len = params.key_length_bytes();
        let owner_string =
            algorithms::compute_owner_string(owner_password, user_password, revision, key_len);
        let key = algorithms::compute_encryption_key(
            user_password,
            &owner_string,
            permissions,
            file_id,
            revision,
            key_len,
            true,
        );
        params.user_string =
            algorithms::compute_user_string(&key[..key_len], file_id, revision).to_vec();
        params.owner_string = owner_string.to_vec();
        params
    }
}

fn fixed_32(bytes: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    let len = bytes.len().min(32);
    out[..len].copy_from_slice(&bytes[..len]);
    out
}

/// PDF encryption permissions (P field).
///
/// PDF Spec: Table 22 - User access permissions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permissions {
    bits: i32,
}

impl Permissions {
    /// Create permissions from the P field value.
    pub fn from_bits(bits: i32) -> Self {
        Self { bits }
    }

    /// Check if printing is allowed.
    pub fn can_print(&self) -> bool {
        (self.bits & (1 << 2)) != 0
    }

    /// Check if modifying the document is allowed.
    pub fn can_modify(&self) -> bool {
        (self.bits & (1 << 3)) != 0
    }

    /// Check if copying text/graphics is allowed.
    pub fn can_copy(&self) -> bool {
        (self.bits & (1 << 4)) != 0
    }

    /// Check if adding/modifying annotations is allowed.
    pub fn can_annotate(&self) -> bool {
        (self.bits & (1 << 5)) != 0
    }

    /// Check if filling form fields is allowed (R>=3).
    pub fn can_fill_forms(&self) -> bool {
        (self.bits & (1 << 8)) != 0
    }

    /// Check if content extraction for accessibility is allowed (R>=3).
    pub fn can_extract_accessibility(&self) -> bool {
        (self.bits & (1 << 9)) != 0
    }

    /// Check if assembling the document is allowed (R>=3).
    pub fn can_assemble(&self) -> bool {
        (self.bits & (1 << 10)) != 0
    }

    /// Check if high-quality printing is allowed (R>=3).
    pub fn can_print_high_quality(&self) -> bool {
        (self.bits & (1 << 11)) != 0
    }
}

impl std::fmt::Display for Permissions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let flags = [
            (self.can_print(), "print"),
            (self.can_modify(), "modify"),
            (self.can_copy(), "copy"),
            (self.can_annotate(), "annotate"),
            (self.can_fill_forms(), "fill-forms"),
            (self.can_extract_accessibility(), "accessibility"),
            (self.can_assemble(), "assemble"),
            (self.can_print_high_quality(), "print-hq"),
        ];
        let allowed: Vec<&str> = flags.iter().filter(|(on, _)| *on).map(|(_, n)| *n).collect();
        if allowed.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", allowed.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EncryptionParameters {
        EncryptionParameters {
            revision: 3,
            version: 2,
            key_length_bits: 128,
            permissions: -4,
            encrypt_metadata: true,
            owner_string: vec![1; 32],
            user_string: vec![2; 32],
            file_id: vec![0x12, 0x34],
        }
    }

    #[test]
    fn test_key_length_bytes() {
        let mut p = sample();
        assert_eq!(p.key_length_bytes(), 16);
        p.key_length_bits = 40;
        assert_eq!(p.key_length_bytes(), 5);
        p.key_length_bits = 256;
        assert_eq!(p.key_length_bytes(), 16);
        p.revision = 2;
        p.key_length_bits = 128;
        assert_eq!(p.key_length_bytes(), 5);
    }

    #[test]
    fn test_validate_clean() {
        assert!(sample().validate().is_empty());
    }

    #[test]
    fn test_validate_short_strings() {
        let mut p = sample();
        p.owner_string.truncate(31);
        p.user_string.push(0);
        let warnings = p.validate();
        assert!(warnings.contains(&ParamWarning::OwnerStringLength(31)));
        assert!(warnings.contains(&ParamWarning::UserStringLength(33)));
        assert_eq!(p.owner_string_32()[31], 0);
    }

    #[test]
    fn test_validate_key_length_and_version() {
        let mut p = sample();
        p.key_length_bits = 44;
        p.version = 4;
        let warnings = p.validate();
        assert!(warnings.contains(&ParamWarning::KeyLength(44)));
        assert!(warnings
            .contains(&ParamWarning::VersionRevisionMismatch { version: 4, revision: 3 }));
    }

    #[test]
    fn test_synthesize_lengths() {
        let p = EncryptionParameters::synthesize(b"o", b"u", 3, 128, -4, b"id");
        assert_eq!(p.owner_string.len(), 32);
        assert_eq!(p.user_string.len(), 32);
        assert_eq!(p.version, 2);
        assert!(p.validate().is_empty());
    }

    #[test]
    fn test_permissions_display() {
        let perms = Permissions::from_bits(0b1100);
        assert!(perms.can_print());
        assert!(perms.can_modify());
        assert!(!perms.can_copy());
        assert_eq!(perms.to_string(), "print, modify");
        assert_eq!(Permissions::from_bits(0).to_string(), "none");
    }
}
