use anyhow::{Context, Result};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const DEFAULT_ADMIN_USER: &str = "admin";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

const SALT_LEN: usize = 16;

/// One stored credential. New registrations always carry a per-record salt;
/// the bare-digest form is what older store files contain (unsalted SHA-256
/// of the password) and stays verifiable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CredentialRecord {
    Salted { salt: String, digest: String },
    Legacy(String),
}

impl CredentialRecord {
    fn matches(&self, password: &str) -> bool {
        match self {
            CredentialRecord::Salted { salt, digest } => match hex::decode(salt) {
                Ok(salt_bytes) => digest == &salted_digest(&salt_bytes, password),
                Err(_) => false,
            },
            CredentialRecord::Legacy(digest) => digest == &unsalted_digest(password),
        }
    }
}

/// Durable username → digest map behind the login screen. The whole map is
/// loaded at startup and rewritten on every mutation; the backing file is
/// the only durable copy.
#[derive(Debug)]
pub struct CredentialStore {
    path: PathBuf,
    records: HashMap<String, CredentialRecord>,
}

impl CredentialStore {
    /// Load the store from `path`. A missing file seeds the default
    /// administrator account and persists it immediately; a present but
    /// unreadable or malformed file is an error the caller must treat as
    /// fatal, never a silent reset.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            let mut store = Self {
                path,
                records: HashMap::new(),
            };
            store.records.insert(
                DEFAULT_ADMIN_USER.to_string(),
                new_salted_record(DEFAULT_ADMIN_PASSWORD),
            );
            store.save()?;
            info!(path = %store.path.display(), "seeded credential store with default admin");
            return Ok(store);
        }

        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read credential store {}", path.display()))?;
        let records: HashMap<String, CredentialRecord> = serde_json::from_str(&text)
            .with_context(|| format!("malformed credential store {}", path.display()))?;
        info!(path = %path.display(), users = records.len(), "loaded credential store");
        Ok(Self { path, records })
    }

    /// True iff the username exists and the password matches its digest.
    /// Unknown user and wrong password are indistinguishable.
    pub fn verify(&self, username: &str, password: &str) -> bool {
        match self.records.get(username) {
            Some(record) => record.matches(password),
            None => false,
        }
    }

    /// Add a new user and persist the whole store. Returns `Ok(false)`
    /// without mutation when the username is already taken (exact,
    /// case-sensitive match) or when either field is empty. Password
    /// strength policy belongs to the caller.
    pub fn register(&mut self, username: &str, password: &str) -> Result<bool> {
        if username.is_empty() || password.is_empty() {
            return Ok(false);
        }
        if self.records.contains_key(username) {
            warn!(username, "registration rejected: username already exists");
            return Ok(false);
        }
        self.records
            .insert(username.to_string(), new_salted_record(password));
        self.save()?;
        info!(username, "registered new user");
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whole-file rewrite via a sibling temp file and rename, so a crash
    /// mid-write cannot truncate the only durable copy.
    fn save(&self) -> Result<()> {
        let text = serde_json::to_string_pretty(&self.records)
            .context("failed to serialize credential store")?;
        let tmp = self.path.with_extension("json.tmp");
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create store directory {}", parent.display())
                })?;
            }
        }
        fs::write(&tmp, text)
            .with_context(|| format!("failed to write credential store {}", tmp.display()))?;
        fs::rename(&tmp, &self.path).with_context(|| {
            format!("failed to replace credential store {}", self.path.display())
        })?;
        Ok(())
    }
}

fn new_salted_record(password: &str) -> CredentialRecord {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    CredentialRecord::Salted {
        salt: hex::encode(salt),
        digest: salted_digest(&salt, password),
    }
}

fn salted_digest(salt: &[u8], password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn unsalted_digest(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn test_store_path(name: &str) -> PathBuf {
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        std::env::temp_dir().join(format!("fileguard-auth-{name}-{nonce}/users.json"))
    }

    fn cleanup(path: &Path) {
        if let Some(parent) = path.parent() {
            let _ = fs::remove_dir_all(parent);
        }
    }

    #[test]
    fn missing_store_seeds_default_admin() {
        let path = test_store_path("seed");
        let store = CredentialStore::load(&path).expect("load");

        assert!(store.verify(DEFAULT_ADMIN_USER, DEFAULT_ADMIN_PASSWORD));
        assert!(!store.verify(DEFAULT_ADMIN_USER, "wrong"));
        assert!(path.exists());
        cleanup(&path);
    }

    #[test]
    fn register_then_verify_round_trip() {
        let path = test_store_path("round-trip");
        let mut store = CredentialStore::load(&path).expect("load");

        assert!(store.register("alice", "hunter22").expect("register"));
        assert!(store.verify("alice", "hunter22"));
        assert!(!store.verify("alice", "hunter22x"));
        assert!(!store.verify("bob", "hunter22"));
        cleanup(&path);
    }

    #[test]
    fn duplicate_registration_leaves_record_unchanged() {
        let path = test_store_path("duplicate");
        let mut store = CredentialStore::load(&path).expect("load");
        store.register("alice", "original").expect("register");

        assert!(!store.register("alice", "replacement").expect("register"));
        assert!(store.verify("alice", "original"));
        assert!(!store.verify("alice", "replacement"));
        cleanup(&path);
    }

    #[test]
    fn usernames_are_case_sensitive() {
        let path = test_store_path("case");
        let mut store = CredentialStore::load(&path).expect("load");
        store.register("Alice", "password1").expect("register");

        assert!(store.register("alice", "password2").expect("register"));
        assert!(store.verify("Alice", "password1"));
        assert!(!store.verify("alice", "password1"));
        cleanup(&path);
    }

    #[test]
    fn empty_username_or_password_is_rejected() {
        let path = test_store_path("empty");
        let mut store = CredentialStore::load(&path).expect("load");

        assert!(!store.register("", "password").expect("register"));
        assert!(!store.register("user", "").expect("register"));
        assert!(!store.verify("", ""));
        cleanup(&path);
    }

    #[test]
    fn reload_preserves_verification_behavior() {
        let path = test_store_path("reload");
        {
            let mut store = CredentialStore::load(&path).expect("load");
            store.register("alice", "secret99").expect("register");
        }

        let first = CredentialStore::load(&path).expect("reload");
        let second = CredentialStore::load(&path).expect("reload again");
        for store in [&first, &second] {
            assert!(store.verify("alice", "secret99"));
            assert!(!store.verify("alice", "secret"));
            assert!(store.verify(DEFAULT_ADMIN_USER, DEFAULT_ADMIN_PASSWORD));
        }
        cleanup(&path);
    }

    #[test]
    fn legacy_unsalted_records_still_verify() {
        let path = test_store_path("legacy");
        fs::create_dir_all(path.parent().expect("parent")).expect("create dir");
        // Old store format: bare unsalted digests.
        let legacy = format!("{{\"admin\": \"{}\"}}", unsalted_digest("admin123"));
        fs::write(&path, legacy).expect("write legacy store");

        let store = CredentialStore::load(&path).expect("load");
        assert!(store.verify("admin", "admin123"));
        assert!(!store.verify("admin", "admin124"));
        cleanup(&path);
    }

    #[test]
    fn malformed_store_is_a_load_error() {
        let path = test_store_path("corrupt");
        fs::create_dir_all(path.parent().expect("parent")).expect("create dir");
        fs::write(&path, "{not json").expect("write corrupt store");

        assert!(CredentialStore::load(&path).is_err());
        cleanup(&path);
    }

    #[test]
    fn store_file_stays_parseable_after_every_mutation() {
        let path = test_store_path("parseable");
        let mut store = CredentialStore::load(&path).expect("load");
        for i in 0..4 {
            store
                .register(&format!("user{i}"), "longenough")
                .expect("register");
            let text = fs::read_to_string(&path).expect("read store");
            let parsed: HashMap<String, CredentialRecord> =
                serde_json::from_str(&text).expect("parse store");
            assert_eq!(parsed.len(), i + 2);
        }
        cleanup(&path);
    }

    #[test]
    fn salts_differ_between_records() {
        let (a, b) = (new_salted_record("same"), new_salted_record("same"));
        match (a, b) {
            (
                CredentialRecord::Salted {
                    salt: sa,
                    digest: da,
                },
                CredentialRecord::Salted {
                    salt: sb,
                    digest: db,
                },
            ) => {
                assert_ne!(sa, sb);
                assert_ne!(da, db);
            }
            _ => panic!("expected salted records"),
        }
    }

    #[test]
    fn record_with_malformed_salt_never_verifies() {
        let record = CredentialRecord::Salted {
            salt: "not hex".to_string(),
            digest: unsalted_digest("password1"),
        };
        assert!(!record.matches("password1"));
        assert!(!record.matches(""));
    }

    #[test]
    fn salts_and_digests_are_hex_encoded() {
        match new_salted_record("password1") {
            CredentialRecord::Salted { salt, digest } => {
                assert_eq!(hex::decode(&salt).expect("salt").len(), SALT_LEN);
                assert_eq!(hex::decode(&digest).expect("digest").len(), 32);
            }
            CredentialRecord::Legacy(_) => panic!("expected salted record"),
        }
    }
}
