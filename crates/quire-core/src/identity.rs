//! Caller identity and moderator authorization.
//!
//! Identity is always passed explicitly into core operations. Bearer tokens
//! are never stored in plaintext: the config carries blake3 digests and
//! [`TokenDirectory`] matches presented tokens against them.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::warn;

use crate::config::AuthConfig;
use crate::error::{Error, Result};

/// Authenticated account name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who is making a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Anonymous,
    Account { account: AccountId, moderator: bool },
}

impl Identity {
    /// The local operator running the admin CLI against its own store.
    #[must_use]
    pub fn operator() -> Self {
        Self::Account {
            account: AccountId::new("operator"),
            moderator: true,
        }
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Account { .. })
    }

    #[must_use]
    pub const fn account(&self) -> Option<&AccountId> {
        match self {
            Self::Anonymous => None,
            Self::Account { account, .. } => Some(account),
        }
    }

    /// Exchange this identity for a moderator capability.
    ///
    /// # Errors
    ///
    /// [`Error::Unauthorized`] for anonymous callers, [`Error::Forbidden`]
    /// for accounts without the moderator role.
    pub fn require_moderator(&self) -> Result<Moderator> {
        match self {
            Self::Anonymous => Err(Error::Unauthorized),
            Self::Account {
                account,
                moderator: true,
            } => Ok(Moderator {
                account: account.clone(),
            }),
            Self::Account { account, .. } => Err(Error::Forbidden(account.to_string())),
        }
    }
}

/// Proof that the caller passed the moderator check. Only obtainable through
/// [`Identity::require_moderator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Moderator {
    account: AccountId,
}

impl Moderator {
    #[must_use]
    pub const fn account(&self) -> &AccountId {
        &self.account
    }
}

/// Resolves bearer tokens to identities.
#[derive(Debug, Clone, Default)]
pub struct TokenDirectory {
    by_digest: HashMap<String, Identity>,
    /// First configured identity per account name.
    by_account: BTreeMap<String, Identity>,
}

impl TokenDirectory {
    #[must_use]
    pub fn from_config(auth: &AuthConfig) -> Self {
        let mut by_digest = HashMap::with_capacity(auth.tokens.len());
        let mut by_account: BTreeMap<String, Identity> = BTreeMap::new();
        for entry in &auth.tokens {
            let digest = entry.digest.trim().to_ascii_lowercase();
            if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
                warn!(account = %entry.account, "ignoring token entry with malformed digest");
                continue;
            }
            let identity = Identity::Account {
                account: AccountId::new(entry.account.trim()),
                moderator: entry.moderator,
            };
            match by_account.get(entry.account.trim()) {
                Some(first) if *first != identity => {
                    warn!(
                        account = %entry.account,
                        "account has token entries with different roles; `--as` uses the first"
                    );
                }
                Some(_) => {}
                None => {
                    by_account.insert(entry.account.trim().to_string(), identity.clone());
                }
            }
            if by_digest.insert(digest, identity).is_some() {
                warn!(account = %entry.account, "duplicate token digest, last entry wins");
            }
        }
        Self {
            by_digest,
            by_account,
        }
    }

    /// Hex blake3 digest of a bearer token, as stored in config.
    #[must_use]
    pub fn digest(token: &str) -> String {
        blake3::hash(token.as_bytes()).to_hex().to_string()
    }

    /// Identify the caller of a request.
    ///
    /// A missing token means an anonymous caller.
    ///
    /// # Errors
    ///
    /// [`Error::Unauthorized`] when a token is presented but not recognized.
    pub fn identify(&self, bearer: Option<&str>) -> Result<Identity> {
        let Some(token) = bearer.map(str::trim) else {
            return Ok(Identity::Anonymous);
        };
        if token.is_empty() {
            return Err(Error::Unauthorized);
        }
        self.by_digest
            .get(&Self::digest(token))
            .cloned()
            .ok_or(Error::Unauthorized)
    }

    /// Look up a configured account by name.
    ///
    /// When an account has several token entries, the first one in config
    /// order decides its role.
    #[must_use]
    pub fn account(&self, name: &str) -> Option<Identity> {
        self.by_account.get(name).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_digest.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_digest.is_empty()
    }
}
