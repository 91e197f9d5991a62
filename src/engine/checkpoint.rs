//! Resumable session state.
//!
//! A checkpoint is a JSON document holding everything a session needs to
//! pick up where it stopped: the flags the mode was chosen from, the known
//! user password, the last base candidate and the counters. Byte strings
//! are stored base64 encoded.

use std::fs;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{PermutationKind, Session};
use crate::encryption::{algorithms, EncryptionParameters};
use crate::error::{Error, Result};

/// Checkpoint format written by this version.
pub const FORMAT_VERSION: u32 = 1;

/// Saved state of a [`Session`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Format version, [`FORMAT_VERSION`] when written by this crate
    pub format_version: u32,
    /// When the checkpoint was taken
    pub saved_at: DateTime<Utc>,
    /// Revision of the document
    pub revision: u32,
    /// MD5 over the document's O, U, P and ID values
    #[serde(with = "b64")]
    pub fingerprint: Vec<u8>,
    /// Candidates are user passwords
    pub working_as_user: bool,
    /// A user password is known
    pub known_password: bool,
    /// Padded user password, present when known or recovered
    #[serde(with = "b64_opt", default)]
    pub user_password: Option<Vec<u8>>,
    /// Permutation strategy
    pub permutation: PermutationKind,
    /// Last base candidate handed to the session
    #[serde(with = "b64")]
    pub current_candidate: Vec<u8>,
    /// Password already confirmed, if any
    #[serde(with = "b64_opt", default)]
    pub found: Option<Vec<u8>>,
    /// Tests in the open reporting window
    pub processed: u64,
    /// Tests over the whole run
    pub total_processed: u64,
    /// Elapsed time over the whole run
    pub elapsed: Duration,
}

impl Checkpoint {
    pub(crate) fn capture(session: &Session) -> Self {
        let stats = session.stats();
        Self {
            format_version: FORMAT_VERSION,
            saved_at: Utc::now(),
            revision: session.parameters().revision,
            fingerprint: fingerprint(session.parameters()).to_vec(),
            working_as_user: session.working_as_user(),
            known_password: session.known_password(),
            user_password: session.padded_user_password().map(|p| p.to_vec()),
            permutation: session.permutation(),
            current_candidate: session.current_candidate().to_vec(),
            found: session.found_password().map(<[u8]>::to_vec),
            processed: stats.processed,
            total_processed: stats.total_processed,
            elapsed: stats.elapsed(),
        }
    }

    /// Fail unless this checkpoint was taken on the document `params`
    /// describes.
    pub fn check_document(&self, params: &EncryptionParameters) -> Result<()> {
        if self.format_version != FORMAT_VERSION {
            return Err(Error::Checkpoint(format!(
                "unsupported format version {}",
                self.format_version
            )));
        }
        if self.revision != params.revision {
            return Err(Error::CheckpointMismatch(format!(
                "revision {} in checkpoint, {} in document",
                self.revision, params.revision
            )));
        }
        if self.fingerprint != fingerprint(params) {
            return Err(Error::CheckpointMismatch(
                "encryption dictionary differs".to_string(),
            ));
        }
        Ok(())
    }

    /// Write the checkpoint as JSON.
    ///
    /// The file is written next to `path` first and renamed over it, so an
    /// interrupted save leaves the previous checkpoint intact.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_vec_pretty(self)?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        log::debug!("Checkpoint saved to {}", path.display());
        Ok(())
    }

    /// Read a checkpoint written by [`Checkpoint::save`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = fs::read(path.as_ref())?;
        let checkpoint: Checkpoint = serde_json::from_slice(&data)?;
        if let Some(password) = &checkpoint.user_password {
            if password.len() != algorithms::MAX_PASSWORD_LEN {
                return Err(Error::Checkpoint(format!(
                    "stored user password is {} bytes",
                    password.len()
                )));
            }
        }
        Ok(checkpoint)
    }
}

fn fingerprint(params: &EncryptionParameters) -> [u8; 16] {
    let mut data = Vec::with_capacity(68 + params.user_string.len() + params.file_id.len());
    data.extend_from_slice(&params.owner_string);
    data.extend_from_slice(&params.user_string);
    data.extend_from_slice(&params.permissions.to_le_bytes());
    data.extend_from_slice(&params.file_id);
    algorithms::md5(&data)
}

mod b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s.as_bytes()).map_err(serde::de::Error::custom)
    }
}

mod b64_opt {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|s| STANDARD.decode(s.as_bytes()).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> EncryptionParameters {
        EncryptionParameters::synthesize(b"owner", b"user", 3, 128, -4, b"checkpoint-id")
    }

    #[test]
    fn test_json_uses_base64() {
        let mut session = Session::begin(&params(), None, true, PermutationKind::None).unwrap();
        session.test(b"\xffbinary");
        let json = serde_json::to_string(&session.checkpoint()).unwrap();
        assert!(json.contains("\"current_candidate\":\"/2JpbmFyeQ==\""));
        assert!(json.contains("\"user_password\":null"));
    }

    #[test]
    fn test_check_document_rejects_other_file() {
        let session = Session::begin(&params(), None, true, PermutationKind::None).unwrap();
        let checkpoint = session.checkpoint();
        let other = EncryptionParameters::synthesize(b"owner", b"user", 3, 128, -4, b"other-id");
        assert!(matches!(
            checkpoint.check_document(&other),
            Err(Error::CheckpointMismatch(_))
        ));
        assert!(checkpoint.check_document(&params()).is_ok());
    }

    #[test]
    fn test_check_document_rejects_format_version() {
        let session = Session::begin(&params(), None, true, PermutationKind::None).unwrap();
        let mut checkpoint = session.checkpoint();
        checkpoint.format_version = 99;
        assert!(matches!(checkpoint.check_document(&params()), Err(Error::Checkpoint(_))));
    }
}
