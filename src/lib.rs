//! # stratum-di
//!
//! Tier-scoped dependency injection and object-lifecycle container for async
//! Rust servers.
//!
//! Given a declarative set of provider definitions, the registry constructs
//! objects in dependency order, enforces which objects may depend on which
//! others based on their lifetime tier, and caches per-session instances
//! safely under concurrent access.
//!
//! ## Features
//!
//! - **Three lifetime tiers**: global (process-wide, built eagerly in
//!   topological order), session (cached per key), request (fresh per
//!   invocation)
//! - **Graph validation up front**: unregistered dependencies, tier
//!   violations, and cycles all fail at bootstrap, never at use time
//! - **Race-safe session builds**: generation-guarded build locks guarantee
//!   one construction per key, with bounded waits and forced recovery from
//!   dead builders
//! - **Bounded cache**: LRU eviction that never removes a store
//!   mid-construction, plus a background TTL sweep owned by the registry
//! - **Hierarchical registries**: child registries delegate unresolved
//!   lookups to a parent through a non-owning link
//!
//! ## Quick Start
//!
//! ```rust
//! use stratum_di::{DefinitionSet, DiResult, Tier, Token};
//!
//! struct Config { greeting: &'static str }
//! struct Greeter { line: String }
//!
//! # async fn demo() -> DiResult<()> {
//! let mut defs = DefinitionSet::new();
//! defs.add_value(Config { greeting: "hello" });
//! defs.add_factory::<Greeter, _>(Tier::Global, vec![Token::of::<Config>()], |args| {
//!     let config = args.get::<Config>(0)?;
//!     Ok(Greeter { line: format!("{}, world", config.greeting) })
//! });
//!
//! // Ready once the eager global pass finishes.
//! let registry = defs.build().await?;
//! assert_eq!(registry.get::<Greeter>()?.line, "hello, world");
//! # Ok(())
//! # }
//! ```
//!
//! ## Sessions and views
//!
//! Each invocation composes a three-tier view for a session key. The session
//! tier is built once per key (concurrent calls for the same unseen key
//! coordinate through a build lock, so every session constructor runs exactly
//! once) and the request tier is rebuilt for every view.
//!
//! ```rust
//! use stratum_di::{DefinitionSet, DiResult, Tier};
//!
//! struct SessionState { hits: u64 }
//!
//! # async fn demo() -> DiResult<()> {
//! let mut defs = DefinitionSet::new();
//! defs.add_factory::<SessionState, _>(Tier::Session, Vec::new(), |_| {
//!     Ok(SessionState { hits: 0 })
//! });
//!
//! let registry = defs.build().await?;
//! let a = registry.build_view("user-1", None).await?;
//! let b = registry.build_view("user-1", None).await?;
//!
//! // Same session key, same cached instance.
//! assert!(std::sync::Arc::ptr_eq(
//!     &a.get::<SessionState>()?,
//!     &b.get::<SessionState>()?,
//! ));
//! # Ok(())
//! # }
//! ```

// Module declarations
pub mod collection;
pub mod config;
pub mod definition;
pub mod error;
pub mod provider;
pub mod tier;
pub mod token;
pub mod traits;

// Internal modules
mod graph;
mod internal;

// Re-export core types
pub use collection::{DefinitionSet, RequestSeed};
pub use config::RegistryOptions;
pub use definition::{Args, ProviderDefinition};
pub use error::{DiError, DiResult};
pub use provider::{ProviderView, ScopedRegistry};
pub use tier::Tier;
pub use token::{token_of, Token};
pub use traits::{AdHocConstructible, AsyncConstructible, Constructible};
