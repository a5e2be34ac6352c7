//! Allow-set authorization.

use std::collections::BTreeSet;

use crate::model::Identity;

/// Decides whether a caller may drive the bridge.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationGate {
    security_mode: bool,
    allowed: BTreeSet<Identity>,
}

impl AuthorizationGate {
    pub fn new(security_mode: bool, allowed: impl IntoIterator<Item = Identity>) -> Self {
        Self {
            security_mode,
            allowed: allowed.into_iter().collect(),
        }
    }

    /// Always true with security mode off; otherwise allow-set membership.
    pub fn authorize(&self, identity: Identity) -> bool {
        !self.security_mode || self.allowed.contains(&identity)
    }

    pub fn security_mode(&self) -> bool {
        self.security_mode
    }

    /// The configured allow-set, in ascending id order.
    pub fn allowed(&self) -> impl Iterator<Item = Identity> + '_ {
        self.allowed.iter().copied()
    }

    pub fn allowed_len(&self) -> usize {
        self.allowed.len()
    }
}
