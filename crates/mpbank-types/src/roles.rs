//! Role bitmask and named capabilities.
//!
//! A caller's roles arrive as a fixed-width integer where each bit grants
//! one capability. The bit assignment is explicit in [`CAPABILITY_BITS`];
//! nothing depends on enum declaration order.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single named permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// May sign in and use the bank at all.
    AccessPlatform,
    /// May create transfer transactions.
    #[serde(rename = "transfer_mt")]
    Transfer,
    /// May vouch for pending mints.
    #[serde(rename = "vouch_mt")]
    Vouch,
    /// May invite new members.
    InviteUser,
    /// May create mint transactions (only enforced when configured).
    #[serde(rename = "create_mt")]
    Create,
    /// May ban members.
    BanUsers,
    /// May revoke transactions.
    #[serde(rename = "revoke_transaction")]
    Revoke,
}

/// Bit position of every capability inside a [`RoleMask`].
pub const CAPABILITY_BITS: [(Capability, u32); 7] = [
    (Capability::AccessPlatform, 0),
    (Capability::Transfer, 1),
    (Capability::Vouch, 2),
    (Capability::InviteUser, 3),
    (Capability::Create, 4),
    (Capability::BanUsers, 5),
    (Capability::Revoke, 6),
];

impl Capability {
    /// Bit position assigned to this capability.
    #[must_use]
    pub fn bit(self) -> u32 {
        CAPABILITY_BITS
            .iter()
            .find(|(cap, _)| *cap == self)
            .map_or(u32::MAX, |(_, bit)| *bit)
    }

    /// Single-bit mask for this capability.
    #[must_use]
    pub fn mask(self) -> u32 {
        1u32.checked_shl(self.bit()).unwrap_or(0)
    }

    /// Stable wire name, as used in the bank metadata document.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::AccessPlatform => "access_platform",
            Self::Transfer => "transfer_mt",
            Self::Vouch => "vouch_mt",
            Self::InviteUser => "invite_user",
            Self::Create => "create_mt",
            Self::BanUsers => "ban_users",
            Self::Revoke => "revoke_transaction",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Pure membership test: does `mask` grant `capability`?
#[must_use]
pub fn has_capability(mask: u32, capability: Capability) -> bool {
    mask & capability.mask() != 0
}

/// The role bitmask carried by an authenticated caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleMask(pub u32);

impl RoleMask {
    /// A mask granting nothing.
    pub const NONE: Self = Self(0);

    /// Build a mask from a set of capabilities.
    #[must_use]
    pub fn of(capabilities: &[Capability]) -> Self {
        Self(capabilities.iter().fold(0, |acc, cap| acc | cap.mask()))
    }

    /// Copy of this mask with `capability` added.
    #[must_use]
    pub fn with(self, capability: Capability) -> Self {
        Self(self.0 | capability.mask())
    }

    #[must_use]
    pub fn has(self, capability: Capability) -> bool {
        has_capability(self.0, capability)
    }

    #[must_use]
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Every capability granted by this mask, in bit order.
    #[must_use]
    pub fn capabilities(self) -> Vec<Capability> {
        CAPABILITY_BITS
            .iter()
            .filter(|(cap, _)| self.has(*cap))
            .map(|(cap, _)| *cap)
            .collect()
    }
}

impl fmt::Display for RoleMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.capabilities().into_iter().map(Capability::name).collect();
        write!(f, "[{}]", names.join(","))
    }
}
