//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     ServiceCatalog (config file or external store)
//!     → directory.rs / tenants.rs (load once)
//!     → Compile matchers per HTTP rule
//!     → Freeze as read-mostly snapshot
//!
//! Incoming HTTP request (host, path)
//!     → directory.rs (rule scan)
//!     → matcher.rs (prefix or domain)
//!     → Return: ServiceDetail or NotMatched
//!
//! Matched service
//!     → transform.rs (header rules, prefix strip, URL rewrite)
//! ```
//!
//! # Design Decisions
//! - Catalog read once; restart to reconfigure
//! - No regex in the matching path (regex only in URL rewrite)
//! - Deterministic: same input always matches same service
//! - First match wins (catalog order)

pub mod catalog;
pub mod directory;
pub mod matcher;
pub mod tenants;
pub mod transform;

pub use catalog::{CatalogError, ServiceCatalog, StaticCatalog};
pub use directory::{DirectoryError, ServiceDirectory};
pub use tenants::TenantDirectory;
