//! Capability flags declared by every command.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// What a command needs from, and does to, the shared resource.
    ///
    /// Fixed when the command is built. The execution core derives the lock
    /// intent and the release point from these flags alone.
    ///
    /// ```
    /// use keystone_core::Capabilities;
    ///
    /// let caps = Capabilities::NEEDS_RESOURCE | Capabilities::PRODUCES_OUTPUT;
    /// assert!(caps.needs_resource());
    /// assert!(!caps.mutates_resource());
    /// ```
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct Capabilities: u8 {
        /// Fails with "no database opened" when nothing is open.
        const NEEDS_RESOURCE = 1 << 0;
        /// Holds the lock until the output phase has serialized the result.
        const PRODUCES_OUTPUT = 1 << 1;
        /// Takes the lock exclusively.
        const MUTATES_RESOURCE = 1 << 2;
    }
}

impl Capabilities {
    /// No flags: a command that neither reads nor writes through the lock.
    pub const STANDARD: Capabilities = Capabilities::empty();

    /// Returns `true` if the command requires an open resource.
    pub fn needs_resource(&self) -> bool {
        self.contains(Capabilities::NEEDS_RESOURCE)
    }

    /// Returns `true` if the command produces output.
    pub fn produces_output(&self) -> bool {
        self.contains(Capabilities::PRODUCES_OUTPUT)
    }

    /// Returns `true` if the command updates the resource.
    pub fn mutates_resource(&self) -> bool {
        self.contains(Capabilities::MUTATES_RESOURCE)
    }
}
