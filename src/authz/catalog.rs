use std::collections::BTreeSet;

use crate::types::{Action, Privilege, PrivilegeShape};

/// A global role seeded into every database.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinRole {
    pub name: &'static str,
    include: fn(Privilege) -> bool,
}

impl BuiltinRole {
    #[must_use]
    pub fn privileges(&self) -> BTreeSet<Privilege> {
        Privilege::ALL.into_iter().filter(|p| (self.include)(*p)).collect()
    }
}

pub const BUILTIN_ROLES: [BuiltinRole; 3] = [
    BuiltinRole {
        name: "Environment Owner",
        include: |_| true,
    },
    BuiltinRole {
        name: "Tenant Admin",
        include: |p| p.shape() == PrivilegeShape::ByTenant || p.action() == Action::Read,
    },
    BuiltinRole {
        name: "Read Only",
        include: |p| p.action() == Action::Read,
    },
];
