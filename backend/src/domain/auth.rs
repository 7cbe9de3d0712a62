//! Authentication and authorization primitives.
//!
//! Requests authenticate with personal access tokens presented as bearer
//! credentials. Only the SHA-256 digest of a token is ever stored.

use std::fmt;

use rand::RngCore;
use rand::rngs::OsRng;
use uuid::Uuid;

use super::attributes::sha256_hex;
use super::entity::Role;
use super::ports::AccessGate;
use super::registry::GateAction;

const TOKEN_BYTES: usize = 20;

/// The authenticated user behind a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    user_id: Uuid,
    role: Role,
}

impl Actor {
    pub const fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    pub const fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub const fn role(&self) -> Role {
        self.role
    }

    pub const fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }
}

/// Freshly generated plaintext access token.
///
/// The plaintext is only available until the value is dropped; persist
/// [`AccessToken::digest`] instead.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Generate a random hex token from the operating system RNG.
    ///
    /// # Examples
    /// ```
    /// use bookshelf::domain::AccessToken;
    ///
    /// let token = AccessToken::generate();
    /// assert_eq!(token.as_str().len(), 40);
    /// ```
    pub fn generate() -> Self {
        let mut bytes = [0_u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Digest stored alongside the owning user.
    pub fn digest(&self) -> String {
        digest_token(&self.0)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Digest a presented bearer token for lookup.
pub fn digest_token(plain: &str) -> String {
    sha256_hex(plain)
}

/// Gate granting guarded actions by role.
///
/// Managing authorship is reserved for administrators.
#[derive(Debug, Default, Clone, Copy)]
pub struct RoleAccessGate;

impl AccessGate for RoleAccessGate {
    fn is_allowed(&self, action: GateAction, actor: &Actor) -> bool {
        match action {
            GateAction::ManageAuthorship => actor.is_admin(),
        }
    }
}
