//! Per-invocation view composition and three-tier lookup.

use std::collections::HashMap;
use std::sync::Arc;

use crate::collection::RequestSeed;
use crate::definition::AnyArc;
use crate::error::{DiError, DiResult};
use crate::token::Token;

use super::session::SessionStore;
use super::{RegistryInner, ScopedRegistry};

/// Three-tier lookup context composed for one invocation.
///
/// `global` aliases the registry's live singleton map (never copied), the
/// session tier is the cached store built for the view's session key, and the
/// request tier is freshly allocated per view and dropped with it.
///
/// Lookups resolve request → session → global → ancestor globals and fail
/// with [`DiError::NotFoundInView`] when the token is absent everywhere.
pub struct ProviderView {
    pub(crate) registry: Arc<RegistryInner>,
    pub(crate) session: Arc<SessionStore>,
    pub(crate) request: HashMap<Token, AnyArc>,
}

impl ProviderView {
    /// The session key this view was composed for.
    pub fn session_key(&self) -> &str {
        self.session.key()
    }

    /// Looks up a token across the view's tiers by type.
    pub fn get<T: Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        let token = Token::of::<T>();
        self.get_any(&token)?
            .downcast::<T>()
            .map_err(|_| DiError::TypeMismatch(token.display_name()))
    }

    /// Looks up a named contract token across the view's tiers.
    pub fn get_named<T: Send + Sync + 'static>(&self, name: &'static str) -> DiResult<Arc<T>> {
        let token = Token::Named(name);
        self.get_any(&token)?
            .downcast::<T>()
            .map_err(|_| DiError::TypeMismatch(token.display_name()))
    }

    /// Type-erased lookup in priority order: request, session, global, then
    /// the ancestor chain's finished globals.
    pub fn get_any(&self, token: &Token) -> DiResult<AnyArc> {
        if let Some(value) = self.request.get(token) {
            return Ok(value.clone());
        }
        if let Some(value) = self.session.get(token) {
            return Ok(value);
        }
        if let Some(value) = self.registry.finished_global(token) {
            return Ok(value);
        }
        Err(DiError::NotFoundInView(token.display_name()))
    }

    /// Number of request-tier instances held by this view.
    pub fn request_instance_count(&self) -> usize {
        self.request.len()
    }
}

impl ScopedRegistry {
    /// Composes the three-tier view for one invocation.
    ///
    /// Validates the session key before touching any cache, lazily builds or
    /// reuses the session store under its build lock, then builds every
    /// request-tier token into a fresh map seeded with any externally
    /// supplied pre-built values.
    ///
    /// A session or request construction failure fails only this call; the
    /// session store is rolled back so a retry starts clean, and other
    /// sessions are unaffected.
    ///
    /// # Examples
    ///
    /// ```
    /// use stratum_di::{DefinitionSet, DiResult, RequestSeed, Tier};
    ///
    /// struct Peer(&'static str);
    /// struct Trace(u64);
    ///
    /// # async fn demo() -> DiResult<()> {
    /// let mut defs = DefinitionSet::new();
    /// defs.add_factory::<Trace, _>(Tier::Request, Vec::new(), |_| Ok(Trace(1)));
    /// let registry = defs.build().await?;
    ///
    /// let seed = RequestSeed::new().with(Peer("10.0.0.7"));
    /// let view = registry.build_view("session-1", Some(seed)).await?;
    /// assert_eq!(view.get::<Peer>()?.0, "10.0.0.7");
    /// assert_eq!(view.get::<Trace>()?.0, 1);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn build_view(
        &self,
        session_key: &str,
        seed: Option<RequestSeed>,
    ) -> DiResult<ProviderView> {
        validate_session_key(session_key)?;
        let session = self.inner.build_session(session_key).await?;

        let mut request = seed.map(RequestSeed::into_map).unwrap_or_default();
        let order = self.inner.table.read().request_order.clone();
        for token in order {
            if request.contains_key(&token) {
                continue;
            }
            self.inner
                .build_into(token, &mut request, Some(session.as_ref()))
                .await?;
        }

        Ok(ProviderView {
            registry: self.inner.clone(),
            session,
            request,
        })
    }
}

/// Session keys are validated before any cache access so malformed input can
/// never pollute the store map: non-empty, at most 128 bytes, ASCII
/// alphanumerics plus `-` `_` `.` `:`.
fn validate_session_key(key: &str) -> DiResult<()> {
    let well_formed = !key.is_empty()
        && key.len() <= 128
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b':'));
    if well_formed {
        Ok(())
    } else {
        Err(DiError::InvalidSessionKey(key.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_key_validation() {
        assert!(validate_session_key("session-1").is_ok());
        assert!(validate_session_key("a.b:c_d").is_ok());
        assert!(validate_session_key("").is_err());
        assert!(validate_session_key("has space").is_err());
        assert!(validate_session_key("naïve").is_err());
        assert!(validate_session_key(&"x".repeat(129)).is_err());
    }
}
