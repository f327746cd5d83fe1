use chaintrack_auth::Principal;
use chaintrack_core::Address;

/// Principal context for a request (the authenticated wallet identity).
///
/// Inserted by the auth middleware; every protected handler reads the caller
/// from here and never from the request body.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Principal,
}

impl PrincipalContext {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn address(&self) -> Address {
        self.principal.address()
    }
}
