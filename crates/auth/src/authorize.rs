use serde::{Deserialize, Serialize};
use thiserror::Error;

use chaintrack_core::{Address, DomainError};

use crate::Principal;

/// A role a principal can hold with respect to one shipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Party {
    Sender,
    Receiver,
}

impl Party {
    pub fn as_str(&self) -> &'static str {
        match self {
            Party::Sender => "sender",
            Party::Receiver => "receiver",
        }
    }
}

/// The two parties of a shipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShipmentParties {
    pub sender: Address,
    pub receiver: Address,
}

impl ShipmentParties {
    /// Every party role the address holds (both, when a principal ships to itself).
    pub fn roles_of(&self, address: Address) -> Vec<Party> {
        let mut roles = Vec::with_capacity(2);
        if self.sender == address {
            roles.push(Party::Sender);
        }
        if self.receiver == address {
            roles.push(Party::Receiver);
        }
        roles
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("{caller} is not a party to this shipment")]
    NotAParty { caller: Address },

    #[error("{caller} must be the {}", required_list(.allowed))]
    Forbidden { caller: Address, allowed: Vec<Party> },
}

fn required_list(allowed: &[Party]) -> String {
    allowed
        .iter()
        .map(|p| p.as_str())
        .collect::<Vec<_>>()
        .join(" or ")
}

impl From<AuthzError> for DomainError {
    fn from(value: AuthzError) -> Self {
        DomainError::unauthorized(value.to_string())
    }
}

/// Authorize a principal against the parties allowed to act.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn authorize_party(
    principal: &Principal,
    parties: &ShipmentParties,
    allowed: &[Party],
) -> Result<(), AuthzError> {
    let caller = principal.address();
    let held = parties.roles_of(caller);

    if held.is_empty() {
        return Err(AuthzError::NotAParty { caller });
    }

    if held.iter().any(|p| allowed.contains(p)) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden {
            caller,
            allowed: allowed.to_vec(),
        })
    }
}
