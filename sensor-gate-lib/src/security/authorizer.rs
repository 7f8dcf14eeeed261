use crate::security::{Principal, Role};

/// Capability an operation requires from an authenticated principal.
///
/// Roles are matched exactly; there is no hierarchy between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// Any authenticated principal
    AnyPrincipal,
    /// Only principals holding this role
    Role(Role),
}

impl Requirement {
    pub const ADMINISTRATOR: Requirement = Requirement::Role(Role::Administrator);
}

/// Stateless role check applied after authentication
#[derive(Debug, Clone, Copy, Default)]
pub struct Authorizer;

impl Authorizer {
    pub fn authorize(&self, principal: &Principal, requirement: Requirement) -> bool {
        match requirement {
            Requirement::AnyPrincipal => true,
            Requirement::Role(role) => principal.role == role,
        }
    }
}
