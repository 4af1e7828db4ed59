//! Token types identifying providers in the registry.

use std::any::TypeId;

/// Identity of a requestable provider.
///
/// Tokens are the nodes of the dependency graph and the keys of every
/// instance store. A token is either a concrete Rust type or a named
/// contract, and no two definitions in one registry may claim the same token
/// (re-registering overwrites the earlier definition).
///
/// # Examples
///
/// ```
/// use stratum_di::Token;
///
/// struct Database;
///
/// let by_type = Token::of::<Database>();
/// let by_name = Token::Named("primary-database");
///
/// assert_eq!(by_type, Token::of::<Database>());
/// assert_ne!(by_name, Token::Named("replica-database"));
/// assert_eq!(by_name.display_name(), "primary-database");
/// ```
#[derive(Debug, Clone)]
pub enum Token {
    /// Concrete type token with TypeId and type name for diagnostics.
    Type(TypeId, &'static str),
    /// Named contract token, for values registered under a string identity
    /// rather than a unique Rust type.
    Named(&'static str),
}

impl Token {
    /// Builds the token for a concrete type.
    #[inline]
    pub fn of<T: 'static>() -> Token {
        Token::Type(TypeId::of::<T>(), std::any::type_name::<T>())
    }

    /// Human-readable name used in error messages and logs.
    pub fn display_name(&self) -> &'static str {
        match self {
            Token::Type(_, name) => name,
            Token::Named(name) => name,
        }
    }
}

// Type tokens compare by TypeId alone; the embedded name exists only for
// diagnostics and may differ across compilation sessions.
impl PartialEq for Token {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Token::Type(a, _), Token::Type(b, _)) => a == b,
            (Token::Named(a), Token::Named(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Token {}

impl std::hash::Hash for Token {
    #[inline]
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            Token::Type(id, _) => {
                0u8.hash(state);
                id.hash(state);
            }
            Token::Named(name) => {
                1u8.hash(state);
                name.hash(state);
            }
        }
    }
}

/// Helper for creating type tokens.
#[inline]
pub fn token_of<T: 'static>() -> Token {
    Token::of::<T>()
}
