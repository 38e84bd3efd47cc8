//! Identities that own ratchet state

use std::fmt;

use serde::{Deserialize, Serialize};

/// A remote device: the owner of one pairwise session record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProtocolAddress {
    /// Account name (phone number, user id, ...)
    pub name: String,
    /// Device number within the account
    pub device_id: u32,
}

impl ProtocolAddress {
    /// Create an address.
    pub fn new(name: impl Into<String>, device_id: u32) -> Self {
        Self { name: name.into(), device_id }
    }
}

impl fmt::Display for ProtocolAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.name, self.device_id)
    }
}

/// A sender within a group: the owner of one sender key record.
///
/// Individual chains inside the record are further distinguished by key id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SenderKeyName {
    /// Group identifier
    pub group_id: String,
    /// Sending device
    pub sender: ProtocolAddress,
}

impl SenderKeyName {
    /// Create a sender key name.
    pub fn new(group_id: impl Into<String>, sender: ProtocolAddress) -> Self {
        Self { group_id: group_id.into(), sender }
    }
}

impl fmt::Display for SenderKeyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.group_id, self.sender)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats() {
        let address = ProtocolAddress::new("alice", 2);
        assert_eq!(address.to_string(), "alice.2");

        let name = SenderKeyName::new("family", address);
        assert_eq!(name.to_string(), "family::alice.2");
    }
}
