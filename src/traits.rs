//! Construction capability traits for class-style providers.

use async_trait::async_trait;

use crate::definition::Args;
use crate::error::DiResult;

/// A type the registry can construct from its resolved dependencies.
///
/// `construct` receives the dependencies declared at registration, in order.
/// Types needing asynchronous setup after construction override
/// `initialize`; it runs under the registry's construction timeout. Types
/// whose construction is asynchronous from the start should implement
/// [`AsyncConstructible`] instead; the two paths are mutually exclusive per
/// registration.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use stratum_di::{Args, Constructible, DiResult};
/// use std::sync::Arc;
///
/// struct Config { url: String }
///
/// struct Repository {
///     config: Arc<Config>,
/// }
///
/// #[async_trait]
/// impl Constructible for Repository {
///     fn construct(args: &Args) -> DiResult<Self> {
///         Ok(Repository { config: args.get::<Config>(0)? })
///     }
///
///     async fn initialize(&self) -> DiResult<()> {
///         // open connections, warm caches, ...
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Constructible: Send + Sync + Sized + 'static {
    /// Builds the instance from its resolved dependencies.
    fn construct(args: &Args) -> DiResult<Self>;

    /// Optional asynchronous post-construction hook. The default does
    /// nothing.
    async fn initialize(&self) -> DiResult<()> {
        Ok(())
    }
}

/// A type constructed through a single fully-formed asynchronous step.
///
/// Registered via
/// [`DefinitionSet::add_async_class`](crate::DefinitionSet::add_async_class);
/// `create` replaces plain construction and the init hook entirely and runs
/// under the construction timeout.
#[async_trait]
pub trait AsyncConstructible: Send + Sync + Sized + 'static {
    /// Builds the instance, awaiting whatever setup it needs.
    async fn create(args: Args) -> DiResult<Self>;
}

/// Fallback construction for types that participate in dependency lists
/// without being registered.
///
/// This is an explicit, auditable escape hatch: a type is only eligible
/// after [`DefinitionSet::permit_ad_hoc`](crate::DefinitionSet::permit_ad_hoc)
/// grants it, and it is always built with no injected dependencies.
pub trait AdHocConstructible: Send + Sync + Sized + 'static {
    /// Builds the instance with no dependencies.
    fn construct_ad_hoc() -> Self;
}
