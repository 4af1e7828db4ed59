//! The scoped registry: eager global bootstrap, hierarchical resolution,
//! session builds, and lifecycle maintenance.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::collection::DefinitionSet;
use crate::config::RegistryOptions;
use crate::definition::{AdHocCtor, AnyArc, ProviderDefinition, ProviderKind};
use crate::error::{DiError, DiResult};
use crate::graph::{self, ProviderTable};
use crate::tier::Tier;
use crate::token::Token;

mod construct;
pub(crate) mod session;
mod view;

pub use view::ProviderView;

use session::{SessionCache, SessionStore};

/// Scoped dependency-injection registry.
///
/// Built from a [`DefinitionSet`]; the build completes once every global-tier
/// provider has been eagerly constructed in topological order. Thereafter the
/// registry serves direct global lookups via [`get`](Self::get) and composes
/// per-invocation views via [`build_view`](Self::build_view), caching the
/// session tier per key under a race-safe build lock.
///
/// The handle is cheap to clone (`Arc` internally) and safe to share across
/// threads.
///
/// # Examples
///
/// ```
/// use stratum_di::{DefinitionSet, DiResult, Tier, Token};
///
/// struct Config { name: &'static str }
/// struct Session { label: String }
///
/// # async fn demo() -> DiResult<()> {
/// let mut defs = DefinitionSet::new();
/// defs.add_value(Config { name: "app" });
/// defs.add_factory::<Session, _>(Tier::Session, vec![Token::of::<Config>()], |args| {
///     Ok(Session { label: args.get::<Config>(0)?.name.to_owned() })
/// });
///
/// let registry = defs.build().await?;
/// let view = registry.build_view("session-1", None).await?;
/// assert_eq!(view.get::<Session>()?.label, "app");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ScopedRegistry {
    inner: Arc<RegistryInner>,
}

pub(crate) struct RegistryInner {
    /// Definitions and per-tier build orders. Mutated only by the
    /// dynamic-definition and injection paths.
    pub(crate) table: RwLock<ProviderTable>,
    /// Finished global singletons. Written by the eager bootstrap pass and
    /// the explicit re-initialization paths; shared-read everywhere else.
    pub(crate) globals: RwLock<HashMap<Token, AnyArc>>,
    pub(crate) ad_hoc: HashMap<Token, AdHocCtor>,
    /// Non-owning hierarchy link; the child never outlives the parent in
    /// practice, and a dropped parent simply stops resolving.
    parent: Option<Weak<RegistryInner>>,
    pub(crate) sessions: SessionCache,
    pub(crate) options: RegistryOptions,
    /// Serializes the dynamic-definition path.
    reinit: tokio::sync::Mutex<()>,
    /// Owned background TTL sweep task, aborted on dispose/drop.
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for RegistryInner {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.lock().take() {
            handle.abort();
        }
    }
}

/// Builds a registry from a definition set: validates the graph, eagerly
/// constructs the global tier in topological order, and starts the TTL
/// sweeper. Any validation or construction failure aborts the whole build.
pub(crate) async fn bootstrap(
    set: DefinitionSet,
    parent: Option<&ScopedRegistry>,
    options: RegistryOptions,
) -> DiResult<ScopedRegistry> {
    let (definitions, ad_hoc) = set.into_parts();

    let ancestor_tier = |token: &Token| parent.and_then(|p| p.inner.tier_of(token));
    let ancestor_ad_hoc = |token: &Token| {
        parent.map_or(false, |p| p.inner.ad_hoc_ctor(token).is_some())
    };
    let table = graph::build_table(definitions, &ad_hoc, &ancestor_tier, &ancestor_ad_hoc)?;

    let inner = Arc::new(RegistryInner {
        table: RwLock::new(table),
        globals: RwLock::new(HashMap::new()),
        ad_hoc,
        parent: parent.map(|p| Arc::downgrade(&p.inner)),
        sessions: SessionCache::new(&options),
        options,
        reinit: tokio::sync::Mutex::new(()),
        sweeper: Mutex::new(None),
    });

    // Eager global pass. Built into a local map and committed wholesale, so
    // a failed bootstrap never leaves a half-populated registry behind.
    let order = inner.table.read().global_order.clone();
    let mut built: HashMap<Token, AnyArc> = HashMap::with_capacity(order.len());
    for token in order {
        inner.build_into(token, &mut built, None).await?;
    }
    debug!(globals = built.len(), "global tier constructed");
    *inner.globals.write() = built;

    let handle = tokio::spawn({
        let weak = Arc::downgrade(&inner);
        let interval = inner.options.sweep_interval;
        async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else { break };
                let expired = inner.sessions.cleanup_expired();
                if expired > 0 {
                    debug!(expired, "session ttl sweep");
                }
            }
        }
    });
    *inner.sweeper.lock() = Some(handle);

    Ok(ScopedRegistry { inner })
}

impl RegistryInner {
    fn parent_inner(&self) -> Option<Arc<RegistryInner>> {
        self.parent.as_ref()?.upgrade()
    }

    /// Declared tier for `token`, searching this registry then its ancestors.
    pub(crate) fn tier_of(&self, token: &Token) -> Option<Tier> {
        let local = self.table.read().definitions.get(token).map(|d| d.tier);
        if local.is_some() {
            return local;
        }
        self.parent_inner()?.tier_of(token)
    }

    /// Definition for `token`, searching this registry then its ancestors.
    pub(crate) fn definition(&self, token: &Token) -> Option<ProviderDefinition> {
        let local = self.table.read().definitions.get(token).cloned();
        if local.is_some() {
            return local;
        }
        self.parent_inner()?.definition(token)
    }

    /// Finished global singleton for `token`, searching this registry then
    /// its ancestors. Never constructs.
    pub(crate) fn finished_global(&self, token: &Token) -> Option<AnyArc> {
        if let Some(value) = self.globals.read().get(token) {
            return Some(value.clone());
        }
        self.parent_inner()?.finished_global(token)
    }

    /// Ad hoc constructor for `token`, searching this registry then its
    /// ancestors.
    pub(crate) fn ad_hoc_ctor(&self, token: &Token) -> Option<AdHocCtor> {
        if let Some(ctor) = self.ad_hoc.get(token) {
            return Some(ctor.clone());
        }
        self.parent_inner()?.ad_hoc_ctor(token)
    }

    pub(crate) fn get_any(&self, token: &Token) -> DiResult<AnyArc> {
        let local_tier = self.table.read().definitions.get(token).map(|d| d.tier);
        match local_tier {
            Some(Tier::Global) => self
                .globals
                .read()
                .get(token)
                .cloned()
                .ok_or(DiError::NotYetInstantiated(token.display_name())),
            Some(tier) => Err(DiError::ScopedAsGlobal {
                token: token.display_name(),
                tier,
            }),
            None => match self.parent_inner() {
                Some(parent) => parent.get_any(token),
                None => Err(DiError::NotRegistered(token.display_name())),
            },
        }
    }

    /// Builds (or reuses) the session store for `key` under its build lock.
    ///
    /// The lock is released with the owned generation on every path; a
    /// construction failure deletes the partially-built store so a retry
    /// starts clean.
    pub(crate) async fn build_session(&self, key: &str) -> DiResult<Arc<SessionStore>> {
        let generation = self.sessions.acquire(key).await;
        let result = self.build_session_locked(key).await;
        self.sessions.release(key, generation);
        result
    }

    async fn build_session_locked(&self, key: &str) -> DiResult<Arc<SessionStore>> {
        let store = self.sessions.get_or_create(key);
        let order = self.table.read().session_order.clone();
        let mut instances = store.snapshot();
        for token in order {
            if instances.contains_key(&token) {
                continue;
            }
            if let Err(err) = self.build_into(token, &mut instances, None).await {
                self.sessions.remove_store(key);
                return Err(err);
            }
        }
        store.commit(instances);
        Ok(store)
    }

    fn inject_value(&self, token: Token, value: AnyArc) {
        let definition = ProviderDefinition::new(
            token.clone(),
            Tier::Global,
            Vec::new(),
            ProviderKind::Injected(value.clone()),
        );
        self.table.write().register_injected(definition);
        self.globals.write().insert(token, value);
    }

    async fn add_dynamic(&self, set: DefinitionSet) -> DiResult<()> {
        let _guard = self.reinit.lock().await;
        let (new_definitions, new_ad_hoc) = set.into_parts();
        if !new_ad_hoc.is_empty() {
            return Err(DiError::Provider(
                "ad hoc grants must be registered before build".to_owned(),
            ));
        }
        let new_tokens: Vec<Token> = new_definitions.iter().map(|d| d.token.clone()).collect();

        // Revalidate the merged graph before touching anything.
        let mut merged: Vec<ProviderDefinition> = {
            let table = self.table.read();
            table
                .declaration
                .iter()
                .filter_map(|token| table.definitions.get(token).cloned())
                .collect()
        };
        for definition in new_definitions {
            if let Some(position) = merged.iter().position(|d| d.token == definition.token) {
                merged[position] = definition;
            } else {
                merged.push(definition);
            }
        }
        let ancestor_tier = |token: &Token| self.parent_inner().and_then(|p| p.tier_of(token));
        let ancestor_ad_hoc =
            |token: &Token| self.parent_inner().map_or(false, |p| p.ad_hoc_ctor(token).is_some());
        let new_table =
            graph::build_table(merged, &self.ad_hoc, &ancestor_tier, &ancestor_ad_hoc)?;

        // Install the merged table, build the new global tokens into an
        // overlay, and commit. A failed build restores the previous table.
        let old_table = std::mem::replace(&mut *self.table.write(), new_table);
        let mut overlay = self.globals.read().clone();
        for token in &new_tokens {
            overlay.remove(token);
        }
        let order = self.table.read().global_order.clone();
        for token in order {
            if overlay.contains_key(&token) {
                continue;
            }
            if let Err(err) = self.build_into(token, &mut overlay, None).await {
                *self.table.write() = old_table;
                return Err(err);
            }
        }
        debug!(added = new_tokens.len(), "dynamic definitions built");
        *self.globals.write() = overlay;
        Ok(())
    }
}

impl ScopedRegistry {
    /// Resolves a global singleton by type.
    ///
    /// Fails with [`DiError::ScopedAsGlobal`] for session/request-tier tokens
    /// and [`DiError::NotRegistered`] when the token is absent from the whole
    /// hierarchy.
    pub fn get<T: Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        let token = Token::of::<T>();
        self.get_any(&token)?
            .downcast::<T>()
            .map_err(|_| DiError::TypeMismatch(token.display_name()))
    }

    /// Resolves a global singleton registered under a named contract token.
    pub fn get_named<T: Send + Sync + 'static>(&self, name: &'static str) -> DiResult<Arc<T>> {
        let token = Token::Named(name);
        self.get_any(&token)?
            .downcast::<T>()
            .map_err(|_| DiError::TypeMismatch(token.display_name()))
    }

    /// Type-erased variant of [`get`](Self::get).
    pub fn get_any(&self, token: &Token) -> DiResult<AnyArc> {
        self.inner.get_any(token)
    }

    /// Registers an externally-constructed global value after bootstrap.
    ///
    /// The value is immediately available to `get` and to every subsequently
    /// composed view; no dependency resolution is attempted.
    pub fn inject<T: Send + Sync + 'static>(&self, value: T) {
        self.inner.inject_value(Token::of::<T>(), Arc::new(value));
    }

    /// Named-token variant of [`inject`](Self::inject).
    pub fn inject_named<T: Send + Sync + 'static>(&self, name: &'static str, value: T) {
        self.inner.inject_value(Token::Named(name), Arc::new(value));
    }

    /// Registers additional definitions after bootstrap and immediately
    /// builds the new global-tier tokens.
    ///
    /// The merged graph is fully revalidated first; a validation or
    /// construction failure leaves the registry as it was. Must not run
    /// concurrently with the request path; concurrent calls to this method
    /// are serialized internally.
    pub async fn add_dynamic_definitions(&self, definitions: DefinitionSet) -> DiResult<()> {
        self.inner.add_dynamic(definitions).await
    }

    /// Removes one session's store and resolves any lock held for it.
    /// Returns whether a store existed.
    pub fn cleanup_session(&self, session_key: &str) -> bool {
        self.inner.sessions.drop_session(session_key)
    }

    /// Removes every session store idle longer than the configured TTL,
    /// resolving held locks so no waiter hangs. Returns the evicted count.
    ///
    /// The background sweeper calls this periodically; it is also callable
    /// directly for deterministic maintenance.
    pub fn cleanup_expired_sessions(&self) -> usize {
        self.inner.sessions.cleanup_expired()
    }

    /// Number of currently cached session stores.
    pub fn session_count(&self) -> usize {
        self.inner.sessions.store_count()
    }

    /// Whether a store is cached for `session_key`.
    pub fn has_session(&self, session_key: &str) -> bool {
        self.inner.sessions.contains(session_key)
    }

    /// Stops the background sweep, clears all session stores, and resolves
    /// every outstanding build lock so no caller is left waiting.
    pub fn dispose(&self) {
        if let Some(handle) = self.inner.sweeper.lock().take() {
            handle.abort();
        }
        self.inner.sessions.clear_all();
        debug!("registry disposed");
    }
}
