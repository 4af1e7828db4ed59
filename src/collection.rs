//! Definition set: the registration surface for building a registry.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use crate::config::RegistryOptions;
use crate::definition::{
    AdHocCtor, AnyArc, Args, AsyncCtor, ClassBody, FactoryBody, InitHook, ProviderDefinition,
    ProviderKind, SyncCtor,
};
use crate::error::{DiError, DiResult};
use crate::internal::BoxFuture;
use crate::provider::{self, ScopedRegistry};
use crate::tier::Tier;
use crate::token::Token;
use crate::traits::{AdHocConstructible, AsyncConstructible, Constructible};

/// Ordered list of provider definitions plus the ad hoc capability grants,
/// consumed by an async `build*` call to produce a ready registry.
///
/// Registering a token twice overwrites the earlier definition in place, so
/// the first registration's position keeps deciding declaration order.
///
/// # Examples
///
/// ```
/// use stratum_di::{DefinitionSet, DiResult, Tier, Token};
///
/// struct Base(u32);
/// struct Next(u32);
///
/// # async fn demo() -> DiResult<()> {
/// let mut defs = DefinitionSet::new();
/// defs.add_value(Base(1));
/// defs.add_factory::<Next, _>(Tier::Global, vec![Token::of::<Base>()], |args| {
///     Ok(Next(args.get::<Base>(0)?.0 + 1))
/// });
///
/// let registry = defs.build().await?;
/// assert_eq!(registry.get::<Next>()?.0, 2);
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct DefinitionSet {
    definitions: Vec<ProviderDefinition>,
    ad_hoc: HashMap<Token, AdHocCtor>,
}

impl DefinitionSet {
    /// Creates an empty definition set.
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, definition: ProviderDefinition) -> &mut Self {
        if let Some(position) = self
            .definitions
            .iter()
            .position(|existing| existing.token == definition.token)
        {
            self.definitions[position] = definition;
        } else {
            self.definitions.push(definition);
        }
        self
    }

    // ----- Value and injected registrations -----

    /// Registers a global constant value under its type token.
    ///
    /// The value is returned verbatim on every lookup; no construction step
    /// and no dependencies.
    pub fn add_value<T: Send + Sync + 'static>(&mut self, value: T) -> &mut Self {
        self.push(ProviderDefinition::new(
            Token::of::<T>(),
            Tier::Global,
            Vec::new(),
            ProviderKind::Value(Arc::new(value)),
        ))
    }

    /// Registers a global constant value under a named contract token.
    pub fn add_named_value<T: Send + Sync + 'static>(
        &mut self,
        name: &'static str,
        value: T,
    ) -> &mut Self {
        self.push(ProviderDefinition::new(
            Token::Named(name),
            Tier::Global,
            Vec::new(),
            ProviderKind::Value(Arc::new(value)),
        ))
    }

    /// Registers an externally-constructed value.
    ///
    /// The value participates in lookups like any global singleton but has no
    /// construction path and no dependency edges. Used by bootstrap code
    /// supplying environment-derived instances.
    pub fn inject<T: Send + Sync + 'static>(&mut self, value: T) -> &mut Self {
        self.push(ProviderDefinition::new(
            Token::of::<T>(),
            Tier::Global,
            Vec::new(),
            ProviderKind::Injected(Arc::new(value)),
        ))
    }

    /// Named-token variant of [`inject`](Self::inject).
    pub fn inject_named<T: Send + Sync + 'static>(
        &mut self,
        name: &'static str,
        value: T,
    ) -> &mut Self {
        self.push(ProviderDefinition::new(
            Token::Named(name),
            Tier::Global,
            Vec::new(),
            ProviderKind::Injected(Arc::new(value)),
        ))
    }

    // ----- Factory registrations -----

    /// Registers a factory invoked with its resolved dependencies in declared
    /// order.
    ///
    /// The dependency list must name exactly the tokens the factory consults,
    /// in the order it reads them from [`Args`].
    ///
    /// # Examples
    ///
    /// ```
    /// use stratum_di::{DefinitionSet, Tier, Token};
    ///
    /// struct Config { prefix: &'static str }
    /// struct Greeter { line: String }
    ///
    /// let mut defs = DefinitionSet::new();
    /// defs.add_value(Config { prefix: "hello" });
    /// defs.add_factory::<Greeter, _>(Tier::Session, vec![Token::of::<Config>()], |args| {
    ///     let config = args.get::<Config>(0)?;
    ///     Ok(Greeter { line: format!("{}, world", config.prefix) })
    /// });
    /// ```
    pub fn add_factory<T, F>(
        &mut self,
        tier: Tier,
        dependencies: Vec<Token>,
        factory: F,
    ) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Args) -> DiResult<T> + Send + Sync + 'static,
    {
        let ctor: SyncCtor =
            Arc::new(move |args: &Args| factory(args).map(|value| Arc::new(value) as AnyArc));
        self.push(ProviderDefinition::new(
            Token::of::<T>(),
            tier,
            dependencies,
            ProviderKind::Factory(FactoryBody::Sync(ctor)),
        ))
    }

    /// Named-token variant of [`add_factory`](Self::add_factory).
    pub fn add_named_factory<T, F>(
        &mut self,
        name: &'static str,
        tier: Tier,
        dependencies: Vec<Token>,
        factory: F,
    ) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Args) -> DiResult<T> + Send + Sync + 'static,
    {
        let ctor: SyncCtor =
            Arc::new(move |args: &Args| factory(args).map(|value| Arc::new(value) as AnyArc));
        self.push(ProviderDefinition::new(
            Token::Named(name),
            tier,
            dependencies,
            ProviderKind::Factory(FactoryBody::Sync(ctor)),
        ))
    }

    /// Registers a factory whose result is an in-flight asynchronous
    /// computation, awaited under the construction timeout.
    ///
    /// # Examples
    ///
    /// ```
    /// use stratum_di::{DefinitionSet, Tier};
    ///
    /// struct Pool { size: u32 }
    ///
    /// let mut defs = DefinitionSet::new();
    /// defs.add_async_factory::<Pool, _, _>(Tier::Global, Vec::new(), |_args| async {
    ///     // handshake, warm-up, ...
    ///     Ok(Pool { size: 8 })
    /// });
    /// ```
    pub fn add_async_factory<T, F, Fut>(
        &mut self,
        tier: Tier,
        dependencies: Vec<Token>,
        factory: F,
    ) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DiResult<T>> + Send + 'static,
    {
        let ctor: AsyncCtor = Arc::new(move |args: Args| -> BoxFuture<'static, DiResult<AnyArc>> {
            let fut = factory(args);
            Box::pin(async move { fut.await.map(|value| Arc::new(value) as AnyArc) })
        });
        self.push(ProviderDefinition::new(
            Token::of::<T>(),
            tier,
            dependencies,
            ProviderKind::Factory(FactoryBody::Async(ctor)),
        ))
    }

    // ----- Class registrations -----

    /// Registers a constructible type: built via
    /// [`Constructible::construct`], then its `initialize` hook is awaited
    /// under the construction timeout.
    pub fn add_class<T: Constructible>(&mut self, tier: Tier, dependencies: Vec<Token>) -> &mut Self {
        let construct: SyncCtor =
            Arc::new(|args: &Args| T::construct(args).map(|value| Arc::new(value) as AnyArc));
        let init: InitHook = Arc::new(|value: AnyArc| -> BoxFuture<'static, DiResult<()>> {
            Box::pin(async move {
                let instance = value
                    .downcast::<T>()
                    .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))?;
                instance.initialize().await
            })
        });
        self.push(ProviderDefinition::new(
            Token::of::<T>(),
            tier,
            dependencies,
            ProviderKind::Class(ClassBody::Plain { construct, init }),
        ))
    }

    /// Registers a type with a fully-formed asynchronous constructor.
    ///
    /// [`AsyncConstructible::create`] replaces plain construction and the
    /// init hook entirely; the two paths never mix for one registration.
    pub fn add_async_class<T: AsyncConstructible>(
        &mut self,
        tier: Tier,
        dependencies: Vec<Token>,
    ) -> &mut Self {
        let create: AsyncCtor = Arc::new(|args: Args| -> BoxFuture<'static, DiResult<AnyArc>> {
            Box::pin(async move { T::create(args).await.map(|value| Arc::new(value) as AnyArc) })
        });
        self.push(ProviderDefinition::new(
            Token::of::<T>(),
            tier,
            dependencies,
            ProviderKind::Class(ClassBody::Create(create)),
        ))
    }

    // ----- Ad hoc grants -----

    /// Permits `T` to be constructed ad hoc when it appears in a dependency
    /// list without being registered.
    ///
    /// The grant is the capability check for the fallback path: without it,
    /// an unregistered dependency fails validation at bootstrap.
    pub fn permit_ad_hoc<T: AdHocConstructible>(&mut self) -> &mut Self {
        let ctor: AdHocCtor = Arc::new(|| Arc::new(T::construct_ad_hoc()) as AnyArc);
        self.ad_hoc.insert(Token::of::<T>(), ctor);
        self
    }

    /// Read access to the registered definitions, in declaration order.
    ///
    /// Useful for debugging and for asserting on a configuration before it
    /// is built.
    pub fn definitions(&self) -> &[ProviderDefinition] {
        &self.definitions
    }

    /// Number of registered definitions.
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// True when nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub(crate) fn into_parts(self) -> (Vec<ProviderDefinition>, HashMap<Token, AdHocCtor>) {
        (self.definitions, self.ad_hoc)
    }

    // ----- Build entry points -----

    /// Builds a root registry with default options. Completes once the eager
    /// global pass has finished, or fails if validation or any global
    /// construction fails.
    pub async fn build(self) -> DiResult<ScopedRegistry> {
        self.build_with(RegistryOptions::default()).await
    }

    /// Builds a root registry with explicit options.
    pub async fn build_with(self, options: RegistryOptions) -> DiResult<ScopedRegistry> {
        provider::bootstrap(self, None, options).await
    }

    /// Builds a child registry delegating unresolved lookups to `parent`.
    ///
    /// The child holds a non-owning reference; the parent must outlive it for
    /// hierarchy lookups to keep resolving.
    pub async fn build_child(self, parent: &ScopedRegistry) -> DiResult<ScopedRegistry> {
        self.build_child_with(parent, RegistryOptions::default()).await
    }

    /// Builds a child registry with explicit options.
    pub async fn build_child_with(
        self,
        parent: &ScopedRegistry,
        options: RegistryOptions,
    ) -> DiResult<ScopedRegistry> {
        provider::bootstrap(self, Some(parent), options).await
    }
}

/// Externally pre-built request-tier values seeded into one view.
///
/// Entries behave like injected values scoped to a single invocation: they
/// participate in lookups and satisfy dependencies but are never constructed.
///
/// # Examples
///
/// ```
/// use stratum_di::RequestSeed;
///
/// struct RequestId(&'static str);
///
/// let seed = RequestSeed::new().with(RequestId("req-42"));
/// ```
#[derive(Default)]
pub struct RequestSeed {
    entries: Vec<(Token, AnyArc)>,
}

impl RequestSeed {
    /// Creates an empty seed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a pre-built value under its type token.
    pub fn with<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.entries.push((Token::of::<T>(), Arc::new(value)));
        self
    }

    /// Adds a pre-built value under a named contract token.
    pub fn with_named<T: Send + Sync + 'static>(mut self, name: &'static str, value: T) -> Self {
        self.entries.push((Token::Named(name), Arc::new(value)));
        self
    }

    pub(crate) fn into_map(self) -> HashMap<Token, AnyArc> {
        self.entries.into_iter().collect()
    }
}
