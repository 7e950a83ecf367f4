//! # Tierguard
//!
//! Team authorization over an Environment → Tenant → ODS → EdOrg hierarchy,
//! usable both as a standalone server and as a library.
//!
//! Ownerships grant a role to a team over one resource (or globally). For each
//! team they are expanded down the hierarchy into an [`authz::AuthorizationCache`],
//! which handlers query to filter lists and check individual resources.
//!
//! ## Library Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tierguard::authz::{CacheRegistry, ScopeParams};
//! use tierguard::config::CacheMode;
//! use tierguard::store::{SqliteStore, Store};
//! use tierguard::types::Privilege;
//!
//! let store: Arc<dyn Store> = Arc::new(SqliteStore::new("./data/tierguard.db")?);
//! store.initialize()?;
//!
//! let registry = CacheRegistry::new(Arc::clone(&store), CacheMode::Shared);
//! let cache = registry.get(team_id)?;
//! let ids = cache.extract(Privilege::OdsRead, &ScopeParams::tenant(tenant_id));
//! let odss = store.list_odss(tenant_id, &ids.to_query_filter())?;
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Includes CLI module. Disable with `default-features = false`.

pub mod authz;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod server;
pub mod store;
pub mod types;
