//! Actors and capabilities
//!
//! Authentication happens outside of the core. The boundary hands the core an
//! [`Actor`] whose role has already been mapped to a [`CapabilitySet`]; from
//! there on every privilege decision is a capability lookup, never a role-name
//! comparison.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::value_objects::DomainError;

/// Unique identifier for an actor (user, seller, admin, system job)
pub type ActorId = Uuid;

/// A single permission held by an actor
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Capability {
    /// Place orders and request returns on own orders
    PlaceOrders,
    /// Drive order fulfillment and cancellation
    ManageOrders,
    /// Drive the return lifecycle
    ManageReturns,
    /// Resolve pending approval requests
    ResolveApprovals,
    /// Privileged transitions apply immediately instead of going through approval
    BypassApproval,
}

/// Set of capabilities held by an actor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    /// Empty set
    pub fn empty() -> Self {
        Self(BTreeSet::new())
    }

    /// Check membership
    pub fn has(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    /// Add a capability (builder style)
    pub fn with(mut self, capability: Capability) -> Self {
        self.0.insert(capability);
        self
    }

    /// Iterate the capabilities in stable order
    pub fn iter(&self) -> impl Iterator<Item = &Capability> {
        self.0.iter()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<T: IntoIterator<Item = Capability>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Platform roles as issued by the account service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Shopper
    Customer,
    /// Marketplace seller
    Seller,
    /// Platform staff
    Admin,
    /// Top-privilege operator
    SuperAdmin,
}

impl Role {
    /// Capabilities granted by the role
    ///
    /// This is the only place role names turn into privileges.
    pub fn capabilities(&self) -> CapabilitySet {
        use Capability::*;
        match self {
            Role::Customer => [PlaceOrders].into_iter().collect(),
            Role::Seller => [PlaceOrders, ManageOrders, ManageReturns].into_iter().collect(),
            Role::Admin => [PlaceOrders, ManageOrders, ManageReturns].into_iter().collect(),
            Role::SuperAdmin => {
                [PlaceOrders, ManageOrders, ManageReturns, ResolveApprovals, BypassApproval]
                    .into_iter()
                    .collect()
            },
        }
    }

    /// Stable string form
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "CUSTOMER",
            Role::Seller => "SELLER",
            Role::Admin => "ADMIN",
            Role::SuperAdmin => "SUPER_ADMIN",
        }
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace(['-', ' '], "_").as_str() {
            "CUSTOMER" | "USER" => Ok(Role::Customer),
            "SELLER" => Ok(Role::Seller),
            "ADMIN" => Ok(Role::Admin),
            "SUPER_ADMIN" | "SUPERADMIN" => Ok(Role::SuperAdmin),
            _ => Err(DomainError::UnknownTag {
                kind: "role",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The principal performing an operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Actor identifier
    pub id: ActorId,
    /// Display name at the time of the call
    pub display_name: String,
    /// Role label (kept for audit snapshots only)
    pub role: String,
    /// Capabilities resolved at the boundary
    pub capabilities: CapabilitySet,
}

impl Actor {
    /// Build an actor from an account-service role
    pub fn with_role(id: ActorId, display_name: impl Into<String>, role: Role) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            role: role.as_str().to_string(),
            capabilities: role.capabilities(),
        }
    }

    /// Internal system actor (scheduled jobs, migrations)
    pub fn system() -> Self {
        Self {
            id: Uuid::nil(),
            display_name: "system".to_string(),
            role: "SYSTEM".to_string(),
            capabilities: CapabilitySet::empty(),
        }
    }

    /// Check a single capability
    pub fn can(&self, capability: Capability) -> bool {
        self.capabilities.has(capability)
    }

    /// The single privilege predicate consumed by the approval gate
    pub fn is_top_privilege(&self) -> bool {
        self.can(Capability::BypassApproval)
    }

    /// Immutable snapshot for audit and history records
    pub fn snapshot(&self) -> ActorSnapshot {
        ActorSnapshot {
            id: self.id,
            name: self.display_name.clone(),
            role: self.role.clone(),
        }
    }
}

/// Point-in-time copy of an actor's identity (not a live reference)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorSnapshot {
    /// Actor identifier
    pub id: ActorId,
    /// Display name
    pub name: String,
    /// Role label
    pub role: String,
}
