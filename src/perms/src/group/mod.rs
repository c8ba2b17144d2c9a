//! Group definitions and their concurrent store

mod store;
mod types;

pub use store::GroupStore;
pub use types::Group;
