//! # Simple Perms
//!
//! Group-based permission engine with inheritance and tiered fallback groups.
//!
//! ## Features
//!
//! - **Tri-state decisions**: granted, denied or undecided; undecided queries
//!   are handed to host-supplied fallback authorities
//! - **Group inheritance** resolved breadth-first; cycles and dangling parent
//!   names are legal
//! - **Fallback groups** per privilege tier for unassigned principals
//! - **Lock-free stores** built on DashMap with copy-on-write groups
//! - **JSON persistence** with single-flight load/save, dirty tracking,
//!   autosave and legacy data migration
//!
//! ## Example
//!
//! ```rust,no_run
//! use simple_perms::{PermissionFacade, PermsConfig, Principal, TierAuthority};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let vanilla = Arc::new(TierAuthority::new());
//!     vanilla.register("server.stop", Some(4));
//!
//!     let perms = PermissionFacade::builder(PermsConfig::with_data_dir("world/simpleperms"))
//!         .authority(vanilla)
//!         .open()
//!         .await?;
//!
//!     perms.create_group("member");
//!     perms.grant("member", "chat.send", true);
//!     perms.set_fallback_group(0, "member");
//!
//!     let player = Principal::new(uuid::Uuid::new_v4());
//!     assert!(perms.decide(&player, "chat.send"));
//!     assert!(!perms.decide(&player, "server.stop"));
//!
//!     perms.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod assignment;
pub mod config;
pub mod error;
pub mod facade;
pub mod fallback;
pub mod group;
pub mod persistence;
pub mod resolver;
pub mod types;

// Re-export commonly used types
pub use types::{ChangeTracker, GameMode, Node, Principal, PrincipalId, Tristate};
pub use config::PermsConfig;
pub use error::{PermsError, Result};
pub use facade::{AutosaveHandle, FacadeBuilder, FallbackAuthority, PermissionFacade, TierAuthority, VerboseSink};
pub use group::{Group, GroupStore};
pub use persistence::{LoadStatus, SaveReport, SaveStatus};
pub use resolver::{PermissionDetail, PermissionResolver};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
