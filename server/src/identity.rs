//! Display identities handed out to joining players
//!
//! The session asks an [`IdentityPool`] for the next free name/color pair
//! whenever a connection is accepted. The default roster has exactly two
//! slots, matching the two-player cap of the session.

use shared::Color;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub color: Color,
}

impl Identity {
    pub fn new(name: impl Into<String>, color: Color) -> Self {
        Self {
            name: name.into(),
            color,
        }
    }
}

/// Assigns identities to joining players
pub trait IdentityPool: Send {
    /// Returns the next identity whose name is not in `in_use`, or None
    /// when every identity is taken.
    fn assign(&mut self, in_use: &[&str]) -> Option<Identity>;
}

/// Fixed, ordered list of identities. Joiners get the first free slot.
#[derive(Debug, Clone)]
pub struct RosterPool {
    identities: Vec<Identity>,
}

impl RosterPool {
    pub fn new(identities: Vec<Identity>) -> Self {
        Self { identities }
    }

    /// Alice (red) for the first joiner, Bob (blue) for the second.
    pub fn two_slot() -> Self {
        Self::new(vec![
            Identity::new("Alice", [255, 100, 100]),
            Identity::new("Bob", [100, 100, 255]),
        ])
    }

    pub fn capacity(&self) -> usize {
        self.identities.len()
    }
}

impl Default for RosterPool {
    fn default() -> Self {
        Self::two_slot()
    }
}

impl IdentityPool for RosterPool {
    fn assign(&mut self, in_use: &[&str]) -> Option<Identity> {
        self.identities
            .iter()
            .find(|identity| !in_use.contains(&identity.name.as_str()))
            .cloned()
    }
}
