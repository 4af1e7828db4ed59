//! Error types for the scoped provider registry.

use std::fmt;

use crate::tier::Tier;

/// Registry errors.
///
/// Represents every failure that can occur while validating a definition
/// graph, eagerly constructing the global tier, building a session, or
/// resolving from a composed view.
///
/// Graph errors (`UnregisteredDependency`, `ScopeViolation`, `Cycle`) and any
/// construction failure during the eager global pass are fatal at bootstrap:
/// the registry never becomes ready. Session build failures are local to one
/// `build_view` call and leave the cache clean for retry.
///
/// # Examples
///
/// ```
/// use stratum_di::DiError;
///
/// let cycle = DiError::Cycle(vec!["A", "B", "C", "A"]);
/// assert_eq!(cycle.to_string(), "dependency cycle: A -> B -> C -> A");
///
/// let missing = DiError::NotRegistered("app::Database");
/// assert!(missing.to_string().contains("app::Database"));
/// ```
#[derive(Debug, Clone)]
pub enum DiError {
    /// Token absent from the local registry and the whole ancestor chain.
    NotRegistered(&'static str),
    /// A definition declares a dependency that resolves nowhere.
    UnregisteredDependency {
        /// The dependent provider.
        token: &'static str,
        /// The dependency that could not be resolved.
        dependency: &'static str,
    },
    /// A global definition depends on a shorter-lived tier.
    ScopeViolation {
        /// The offending global provider.
        token: &'static str,
        /// The dependency with the shorter lifetime.
        dependency: &'static str,
        /// The dependency's declared tier.
        dependency_tier: Tier,
    },
    /// Dependency cycle detected (includes the full path, first node repeated
    /// at the end).
    Cycle(Vec<&'static str>),
    /// A global dependency was requested before the eager pass produced it.
    NotYetInstantiated(&'static str),
    /// An asynchronous construction step exceeded the configured timeout.
    ConstructionTimeout {
        /// The provider being constructed.
        token: &'static str,
        /// Which step timed out: `"factory"`, `"initialize"`, or `"create"`.
        step: &'static str,
    },
    /// Construction of a provider failed; wraps the inner cause.
    ConstructionFailed {
        /// The provider that failed to construct.
        token: &'static str,
        /// The underlying failure.
        source: Box<DiError>,
    },
    /// A session- or request-tier token was resolved as a global singleton.
    ScopedAsGlobal {
        /// The tier-restricted provider.
        token: &'static str,
        /// Its declared tier.
        tier: Tier,
    },
    /// Token absent from every tier of a composed view.
    NotFoundInView(&'static str),
    /// Session key rejected before touching the cache.
    InvalidSessionKey(String),
    /// Typed accessor downcast failed.
    TypeMismatch(&'static str),
    /// Failure surfaced by a user factory, constructor, or init hook.
    Provider(String),
}

impl fmt::Display for DiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiError::NotRegistered(name) => write!(f, "provider not registered: {}", name),
            DiError::UnregisteredDependency { token, dependency } => {
                write!(f, "provider {} depends on unregistered {}", token, dependency)
            }
            DiError::ScopeViolation { token, dependency, dependency_tier } => write!(
                f,
                "scope violation: global provider {} depends on {}-tier provider {}",
                token, dependency_tier, dependency
            ),
            DiError::Cycle(path) => {
                write!(f, "dependency cycle: {}", path.join(" -> "))
            }
            DiError::NotYetInstantiated(name) => {
                write!(f, "global provider {} has not been instantiated yet", name)
            }
            DiError::ConstructionTimeout { token, step } => {
                write!(f, "construction of {} timed out during {}", token, step)
            }
            DiError::ConstructionFailed { token, source } => {
                write!(f, "failed to construct {}: {}", token, source)
            }
            DiError::ScopedAsGlobal { token, tier } => write!(
                f,
                "provider {} is {}-tier and cannot be resolved as a global singleton",
                token, tier
            ),
            DiError::NotFoundInView(name) => write!(f, "provider not found in view: {}", name),
            DiError::InvalidSessionKey(key) => write!(f, "invalid session key: {:?}", key),
            DiError::TypeMismatch(name) => write!(f, "type mismatch for: {}", name),
            DiError::Provider(msg) => write!(f, "provider error: {}", msg),
        }
    }
}

impl std::error::Error for DiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DiError::ConstructionFailed { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// Result type for registry operations.
///
/// A convenience alias for `Result<T, DiError>` used throughout the crate.
pub type DiResult<T> = Result<T, DiError>;
