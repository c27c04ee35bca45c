//! Vidya Catalog - cybersecurity content catalog
//!
//! Serves curated bug-bounty reports and security blog articles.
//!
//! # How it works
//!
//! 1. Reports live in the local content gateway and are only public once approved
//! 2. The filter-sort engine narrows the approved set by category, year,
//!    organization, severity and free text, then orders it
//! 3. Blog pages come from a remote article API, filtered for relevance,
//!    optionally augmented by a tag search, ranked by reactions and capped
//! 4. Empty pages fall back to a tag sweep; an unreachable API falls back to
//!    a built-in article
//!
//! Interactive search is debounced, and stale responses are discarded so
//! only the latest request updates the view.

pub mod config;
pub mod content;
pub mod debounce;
pub mod devto;
pub mod discovery;
pub mod error;
pub mod filter;
pub mod identity;
pub mod models;
pub mod seed;
pub mod server;
pub mod session;
pub mod store;

pub use config::Config;
pub use devto::{ArticleSource, DevtoClient};
pub use discovery::{Discovery, DiscoveryPipeline, DiscoverySettings, LocalArticles, Origin};
pub use error::{AuthError, GatewayError, SourceError};
pub use filter::{Facets, QueryState, Selection, SortKey};
pub use identity::{authorize, Access, AccessDecision, IdentityProvider, LocalIdentity};
pub use session::{DiscoverySession, DiscoveryView, QueryWindow};
pub use store::CatalogStore;
