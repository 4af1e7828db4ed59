//! The instance constructor: builds one token into the store being
//! populated, resolving dependencies across tiers and the hierarchy.

use std::collections::HashMap;

use crate::definition::{AnyArc, Args, ClassBody, FactoryBody, ProviderDefinition, ProviderKind};
use crate::error::{DiError, DiResult};
use crate::internal::BoxFuture;
use crate::tier::Tier;
use crate::token::Token;

use super::session::SessionStore;
use super::RegistryInner;

impl RegistryInner {
    /// Builds `token` into `store`, reusing an existing entry if present.
    ///
    /// `session` is the read-only lower tier visible while populating a
    /// request map; it is `None` for session and global builds. Any failure
    /// is wrapped as [`DiError::ConstructionFailed`] and nothing is committed
    /// for the token.
    pub(crate) fn build_into<'a>(
        &'a self,
        token: Token,
        store: &'a mut HashMap<Token, AnyArc>,
        session: Option<&'a SessionStore>,
    ) -> BoxFuture<'a, DiResult<AnyArc>> {
        Box::pin(async move {
            if let Some(existing) = store.get(&token) {
                return Ok(existing.clone());
            }
            let name = token.display_name();
            let definition = self
                .definition(&token)
                .ok_or(DiError::NotRegistered(name))?;
            let value = self
                .construct(&definition, store, session)
                .await
                .map_err(|source| DiError::ConstructionFailed {
                    token: name,
                    source: Box::new(source),
                })?;
            store.insert(token, value.clone());
            Ok(value)
        })
    }

    /// Produces the value for one definition, dispatching on its variant.
    async fn construct(
        &self,
        definition: &ProviderDefinition,
        store: &mut HashMap<Token, AnyArc>,
        session: Option<&SessionStore>,
    ) -> DiResult<AnyArc> {
        match &definition.kind {
            ProviderKind::Value(value) | ProviderKind::Injected(value) => Ok(value.clone()),
            ProviderKind::Factory(body) => {
                let args = self.resolve_args(definition, store, session).await?;
                match body {
                    FactoryBody::Sync(factory) => factory(&args),
                    FactoryBody::Async(factory) => {
                        self.bounded(definition, "factory", factory(args)).await
                    }
                }
            }
            ProviderKind::Class(body) => match body {
                ClassBody::Plain { construct, init } => {
                    let args = self.resolve_args(definition, store, session).await?;
                    let value = construct(&args)?;
                    self.bounded(definition, "initialize", init(value.clone())).await?;
                    Ok(value)
                }
                ClassBody::Create(create) => {
                    let args = self.resolve_args(definition, store, session).await?;
                    self.bounded(definition, "create", create(args)).await
                }
            },
        }
    }

    /// Awaits one asynchronous construction step under the configured
    /// timeout. Expiry fails that step only, never the whole registry.
    async fn bounded<T>(
        &self,
        definition: &ProviderDefinition,
        step: &'static str,
        fut: BoxFuture<'static, DiResult<T>>,
    ) -> DiResult<T> {
        match tokio::time::timeout(self.options.construction_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(DiError::ConstructionTimeout {
                token: definition.token.display_name(),
                step,
            }),
        }
    }

    async fn resolve_args(
        &self,
        definition: &ProviderDefinition,
        store: &mut HashMap<Token, AnyArc>,
        session: Option<&SessionStore>,
    ) -> DiResult<Args> {
        let mut entries = Vec::with_capacity(definition.dependencies.len());
        for dependency in &definition.dependencies {
            let value = self.resolve_dependency(dependency, store, session).await?;
            entries.push((dependency.clone(), value));
        }
        Ok(Args::new(entries))
    }

    /// Resolves one dependency for an in-progress construction:
    /// already-built value in the store being populated, then the session
    /// tier (request builds only), then finished global singletons across the
    /// hierarchy, then a recursive scoped build, then the ad hoc fallback.
    async fn resolve_dependency(
        &self,
        dependency: &Token,
        store: &mut HashMap<Token, AnyArc>,
        session: Option<&SessionStore>,
    ) -> DiResult<AnyArc> {
        if let Some(value) = store.get(dependency) {
            return Ok(value.clone());
        }
        if let Some(session) = session {
            if let Some(value) = session.get(dependency) {
                return Ok(value);
            }
        }
        match self.tier_of(dependency) {
            Some(Tier::Global) => {
                // Global tokens are only ever built by the eager topological
                // pass; a miss here means the pass has not produced them.
                self.finished_global(dependency)
                    .ok_or(DiError::NotYetInstantiated(dependency.display_name()))
            }
            Some(_) => self.build_into(dependency.clone(), &mut *store, session).await,
            None => match self.ad_hoc_ctor(dependency) {
                Some(ctor) => {
                    let value = ctor();
                    store.insert(dependency.clone(), value.clone());
                    Ok(value)
                }
                None => Err(DiError::NotRegistered(dependency.display_name())),
            },
        }
    }
}
