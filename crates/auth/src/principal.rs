use serde::{Deserialize, Serialize};

use chaintrack_core::Address;

/// The identity on whose behalf a mutating call is made.
///
/// A `Principal` is produced by whatever authenticated the caller (a verified
/// token, a signed transaction); ledgers never accept a bare address as "the
/// caller".
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    address: Address,
}

impl Principal {
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn is(&self, address: Address) -> bool {
        self.address == address
    }
}

impl core::fmt::Display for Principal {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.address, f)
    }
}

impl From<Address> for Principal {
    fn from(value: Address) -> Self {
        Self::new(value)
    }
}
