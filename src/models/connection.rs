//! ConnectionConfig and its identity fingerprint (spec §3).

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    Postgres,
    Oracle,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Oracle => "oracle",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque credential material. Never logged or serialized.
#[derive(Clone)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials").field("user", &self.user).field("password", &"<redacted>").finish()
    }
}

/// Identity of a connection. Immutable per session (spec §3).
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub dialect: Dialect,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub schema: Option<String>,
    pub credentials: Credentials,
}

/// Hash identity of a [`ConnectionConfig`], used as the key for
/// per-connection pools, VectorIndex namespaces, and caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint([u8; 32]);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl ConnectionConfig {
    /// `hash(dialect,host,port,database,schema,user)` per spec §3. The
    /// password never enters the fingerprint so two sessions reusing the
    /// same credentials against the same database share pools and caches.
    pub fn fingerprint(&self) -> Fingerprint {
        let mut hasher = Sha256::new();
        hasher.update(self.dialect.as_str().as_bytes());
        hasher.update(b"\0");
        hasher.update(self.host.as_bytes());
        hasher.update(b"\0");
        hasher.update(self.port.to_be_bytes());
        hasher.update(b"\0");
        hasher.update(self.database.as_bytes());
        hasher.update(b"\0");
        hasher.update(self.schema.as_deref().unwrap_or("").as_bytes());
        hasher.update(b"\0");
        hasher.update(self.credentials.user.as_bytes());
        let digest = hasher.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Fingerprint(bytes)
    }
}
