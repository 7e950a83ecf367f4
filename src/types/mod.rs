mod models;
mod privilege;

pub use models::*;
pub use privilege::{
    Action, Privilege, PrivilegeShape, Subject, is_cached_by_environment, is_cached_by_tenant,
    shape_of,
};
