mod admin;
pub mod extract;
pub mod response;
mod router;
mod teams;

pub use router::{AppState, create_router};
