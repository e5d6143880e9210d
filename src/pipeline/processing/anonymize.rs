//! One-way anonymization of user identity fields.
//!
//! The digest is an unsalted SHA-256 of the identity string. It is stable across
//! the whole dataset so rows from the same user stay linkable, but anyone
//! holding a candidate user name can recompute it; the export therefore must
//! not be treated as safe against dictionary attacks on known user names.

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::constants;
use crate::error::{ExportError, Result};
use crate::table::Frame;

/// Lowercase hex SHA-256 of an identity string.
pub fn hash_identity(identity: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(identity.as_bytes());
    hex::encode(hasher.finalize())
}

/// Derived, non-identifying view of one user identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnonymizedIdentity {
    /// `None` when the identity itself was missing.
    pub user_name_hash: Option<String>,
    pub logged_in: bool,
}

#[derive(Debug, Clone)]
pub struct Anonymizer {
    anonymous_marker: String,
}

impl Default for Anonymizer {
    fn default() -> Self {
        Self::new(constants::DEFAULT_ANONYMOUS_MARKER)
    }
}

impl Anonymizer {
    pub fn new(anonymous_marker: impl Into<String>) -> Self {
        Self {
            anonymous_marker: anonymous_marker.into(),
        }
    }

    /// An identity is authenticated unless it is missing or carries the anonymous marker.
    pub fn is_logged_in(&self, identity: Option<&str>) -> bool {
        match identity {
            Some(name) => !name.contains(self.anonymous_marker.as_str()),
            None => false,
        }
    }

    pub fn anonymize(&self, identity: Option<&str>) -> AnonymizedIdentity {
        AnonymizedIdentity {
            user_name_hash: identity.map(hash_identity),
            logged_in: self.is_logged_in(identity),
        }
    }

    /// Add the hash and logged-in columns derived from the user name, then
    /// remove every raw PII column. Returns the names of the removed columns.
    pub fn apply(&self, frame: &mut Frame, table: &str) -> Result<Vec<String>> {
        frame.require_column(table, constants::USER_NAME)?;
        let identities = frame
            .column_values(constants::USER_NAME)
            .unwrap_or_default();

        let (hashes, flags): (Vec<Option<String>>, Vec<Option<String>>) = identities
            .into_iter()
            .map(|(_, identity)| {
                let anon = self.anonymize(identity);
                (anon.user_name_hash, Some(anon.logged_in.to_string()))
            })
            .unzip();

        let dropped = drop_pii(frame);
        frame.push_column(constants::USER_NAME_HASH, hashes)?;
        frame.push_column(constants::LOGGED_IN, flags)?;
        debug!(table, dropped = ?dropped, "Anonymized identity columns");
        Ok(dropped)
    }
}

/// Remove the raw identity, identifier and network-address columns if present.
pub fn drop_pii(frame: &mut Frame) -> Vec<String> {
    frame.drop_columns(&constants::PII_COLUMNS)
}

/// Fail if any raw PII column survived into a table about to be exported.
pub fn ensure_pii_free(frame: &Frame) -> Result<()> {
    let leaked: Vec<&str> = constants::PII_COLUMNS
        .iter()
        .copied()
        .filter(|c| frame.has_column(c) || frame.index_name() == *c)
        .collect();
    if leaked.is_empty() {
        Ok(())
    } else {
        Err(ExportError::Integrity(format!(
            "PII columns present in output: {}",
            leaked.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_deterministic_sha256() {
        assert_eq!(hash_identity("alice"), hash_identity("alice"));
        assert_eq!(
            hash_identity("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_ne!(hash_identity("alice"), hash_identity("bob"));
    }

    #[test]
    fn test_logged_in_flag() {
        let anon = Anonymizer::default();
        assert!(anon.is_logged_in(Some("alice")));
        assert!(!anon.is_logged_in(Some("not-logged-in-1a2b3c")));
        assert!(!anon.is_logged_in(None));
    }

    #[test]
    fn test_missing_identity_passes_through() {
        let anon = Anonymizer::default().anonymize(None);
        assert_eq!(
            anon,
            AnonymizedIdentity {
                user_name_hash: None,
                logged_in: false
            }
        );
    }

    #[test]
    fn test_custom_marker() {
        let anon = Anonymizer::new("guest:");
        assert!(!anon.is_logged_in(Some("guest:42")));
        assert!(anon.is_logged_in(Some("not-logged-in-1")));
    }

    #[test]
    fn test_apply_replaces_pii_columns() {
        let mut frame = Frame::new(
            "classification_id",
            vec![
                "user_name".to_string(),
                "user_id".to_string(),
                "user_ip".to_string(),
                "workflow_id".to_string(),
            ],
        );
        frame
            .push_row(
                "1",
                vec![
                    Some("alice".to_string()),
                    Some("42".to_string()),
                    Some("10.0.0.1".to_string()),
                    Some("7".to_string()),
                ],
            )
            .unwrap();
        frame
            .push_row("2", vec![None, None, Some("10.0.0.2".to_string()), Some("7".to_string())])
            .unwrap();

        let dropped = Anonymizer::default().apply(&mut frame, "classifications").unwrap();
        assert_eq!(dropped, vec!["user_name", "user_id", "user_ip"]);
        assert_eq!(
            frame.columns(),
            &[
                "workflow_id".to_string(),
                "user_name_hash".to_string(),
                "logged_in".to_string()
            ]
        );
        assert_eq!(frame.rows()[0].cells[1], Some(hash_identity("alice")));
        assert_eq!(frame.rows()[0].cells[2].as_deref(), Some("true"));
        assert_eq!(frame.rows()[1].cells[1], None);
        assert_eq!(frame.rows()[1].cells[2].as_deref(), Some("false"));
        assert!(ensure_pii_free(&frame).is_ok());
    }

    #[test]
    fn test_ensure_pii_free_detects_leak() {
        let frame = Frame::new("subject_id", vec!["user_ip".to_string()]);
        assert!(ensure_pii_free(&frame).is_err());
    }
}
