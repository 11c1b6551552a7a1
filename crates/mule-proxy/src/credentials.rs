//! Credential directory: public identifiers ↔ real account credentials.
//!
//! Clients only ever see a [`PublicId`], the lowercase hex MD5 digest of the
//! account username. The directory is built once at startup from the
//! credential file and never mutated afterwards, so it can be shared behind an
//! `Arc` with any number of concurrent readers.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Opaque identifier a client uses in place of a username.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PublicId(String);

impl PublicId {
    /// Derive the identifier for an account username.
    pub fn derive(username: &str) -> Self {
        Self(format!("{:x}", md5::compute(username.as_bytes())))
    }

    /// Map a client-supplied identifier into the directory key space.
    ///
    /// Email addresses (anything containing `@`) are hashed the same way
    /// usernames are; everything else is taken verbatim.
    pub fn normalize(raw: &str) -> Self {
        if raw.contains('@') {
            Self::derive(raw)
        } else {
            Self(raw.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PublicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A real username/password pair plus its derived public identifier.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    public_id: PublicId,
    username: String,
    password: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        let username = username.into();
        Self {
            public_id: PublicId::derive(&username),
            username,
            password: password.into(),
        }
    }

    pub fn public_id(&self) -> &PublicId {
        &self.public_id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("public_id", &self.public_id)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Immutable lookup table from [`PublicId`] to [`Credential`].
#[derive(Debug, Default)]
pub struct CredentialDirectory {
    by_id: HashMap<PublicId, Credential>,
}

impl CredentialDirectory {
    /// Build the directory. A username listed twice keeps its last password.
    pub fn new(credentials: impl IntoIterator<Item = Credential>) -> Self {
        let mut by_id = HashMap::new();
        for credential in credentials {
            let id = credential.public_id().clone();
            if by_id.insert(id.clone(), credential).is_some() {
                tracing::warn!(public_id = %id, "Duplicate account in credential list, keeping the last entry");
            }
        }
        Self { by_id }
    }

    /// Look up the credential for a raw GUID or email address.
    pub fn resolve(&self, raw: &str) -> Option<&Credential> {
        self.by_id.get(&PublicId::normalize(raw))
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// One entry of the credential file.
#[derive(Deserialize)]
struct CredentialEntry {
    user: String,
    password: String,
}

/// Errors raised while loading the credential file.
#[derive(Debug, thiserror::Error)]
pub enum CredentialsError {
    #[error("error opening config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error decoding config file {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Decode a JSON array of `{"user": ..., "password": ...}` objects.
pub fn parse_credentials(json: &str) -> Result<Vec<Credential>, serde_json::Error> {
    let entries: Vec<CredentialEntry> = serde_json::from_str(json)?;
    Ok(entries
        .into_iter()
        .map(|entry| Credential::new(entry.user, entry.password))
        .collect())
}

/// Read and decode the credential file at `path`.
pub fn load_credentials(path: &Path) -> Result<Vec<Credential>, CredentialsError> {
    let contents = std::fs::read_to_string(path).map_err(|source| CredentialsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_credentials(&contents).map_err(|source| CredentialsError::Decode {
        path: path.to_path_buf(),
        source,
    })
}
