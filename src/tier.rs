//! Lifetime tier definitions.

use std::fmt;

/// Lifetime tiers controlling where a provider's instances live and how long
/// they are cached.
///
/// Every provider definition declares exactly one tier. The tier decides which
/// store an instance is built into, and the registry enforces that global
/// providers never depend on shorter-lived ones.
///
/// # Tier Characteristics
///
/// - **Global**: one instance per registry, built eagerly at bootstrap in
///   topological order, alive until the registry is disposed
/// - **Session**: one instance per session key, built lazily under the
///   session build lock, evicted by capacity or TTL
/// - **Request**: one instance per invocation, built fresh for every view and
///   dropped with it, never cached
///
/// # Examples
///
/// ```
/// use stratum_di::{DefinitionSet, Tier};
///
/// struct Config { name: &'static str }
/// struct RequestId(u64);
///
/// let mut defs = DefinitionSet::new();
/// defs.add_value(Config { name: "app" });
/// defs.add_factory::<RequestId, _>(Tier::Request, Vec::new(), |_| Ok(RequestId(7)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// Process-wide singleton, constructed once during the eager bootstrap
    /// pass and shared by every session and invocation.
    Global,
    /// Cached per logical session key. Built on first access for a key and
    /// reused until the session is cleaned up, evicted, or expired.
    Session,
    /// Fresh per invocation. Built into the request map of each composed view
    /// and discarded when the view is dropped.
    Request,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Global => write!(f, "global"),
            Tier::Session => write!(f, "session"),
            Tier::Request => write!(f, "request"),
        }
    }
}
