//! Team authorization: ownership expansion, per-team caches and the
//! query-time primitives handlers use to filter and check resources.

mod builder;
mod cache;
pub mod catalog;
mod filter;
mod hierarchy;
mod ids;
mod ownership;
mod registry;
mod resolver;

pub use builder::build_cache;
pub use cache::{AuthorizationCache, CacheEntry};
pub use filter::{
    EdOrgPair, QueryFilter, ScopeParams, check_composite, check_safe, check_unsafe, edorg_key_v1,
    edorg_key_v2,
};
pub use hierarchy::HierarchyWriter;
pub use ids::{AuthKey, EdOrgKey, Ids, ScopedIds};
pub use ownership::OwnershipWriter;
pub use registry::{CacheInvalidator, CacheRegistry};
pub use resolver::{Expansion, PartialCoverage, Resolver};
