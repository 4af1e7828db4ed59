//! Provider definitions: how to produce the value for one token.

use std::any::Any;
use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::internal::BoxFuture;
use crate::tier::Tier;
use crate::token::Token;

/// Type-erased instance value as stored in every tier's instance map.
pub(crate) type AnyArc = Arc<dyn Any + Send + Sync>;

/// Synchronous constructor taking the resolved dependency arguments.
pub(crate) type SyncCtor = Arc<dyn Fn(&Args) -> DiResult<AnyArc> + Send + Sync>;

/// Asynchronous constructor; the returned future is awaited under the
/// per-step construction timeout.
pub(crate) type AsyncCtor = Arc<dyn Fn(Args) -> BoxFuture<'static, DiResult<AnyArc>> + Send + Sync>;

/// Post-construction initialization hook, invoked on the erased instance.
pub(crate) type InitHook = Arc<dyn Fn(AnyArc) -> BoxFuture<'static, DiResult<()>> + Send + Sync>;

/// Zero-dependency fallback constructor for ad hoc types.
pub(crate) type AdHocCtor = Arc<dyn Fn() -> AnyArc + Send + Sync>;

/// Resolved dependency values, in the order they were declared.
///
/// Factories and constructors receive their dependencies positionally: the
/// value at index `i` was built for the `i`-th token of the definition's
/// dependency list.
///
/// # Examples
///
/// ```
/// use stratum_di::{Args, DefinitionSet, Tier, Token};
///
/// struct Base(u32);
/// struct Doubled(u32);
///
/// let mut defs = DefinitionSet::new();
/// defs.add_value(Base(21));
/// defs.add_factory::<Doubled, _>(Tier::Global, vec![Token::of::<Base>()], |args: &Args| {
///     let base = args.get::<Base>(0)?;
///     Ok(Doubled(base.0 * 2))
/// });
/// ```
pub struct Args {
    entries: Vec<(Token, AnyArc)>,
}

impl Args {
    pub(crate) fn new(entries: Vec<(Token, AnyArc)>) -> Self {
        Self { entries }
    }

    /// Returns the dependency at `index` downcast to its concrete type.
    ///
    /// Fails with [`DiError::TypeMismatch`] when the requested type does not
    /// match the value built for that position, and with
    /// [`DiError::Provider`] when the index exceeds the declared dependency
    /// list.
    pub fn get<T: Send + Sync + 'static>(&self, index: usize) -> DiResult<Arc<T>> {
        let (token, value) = self.entries.get(index).ok_or_else(|| {
            DiError::Provider(format!("dependency index {} out of range", index))
        })?;
        value
            .clone()
            .downcast::<T>()
            .map_err(|_| DiError::TypeMismatch(token.display_name()))
    }

    /// Number of resolved dependencies.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the definition declared no dependencies.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Payload of a factory definition.
#[derive(Clone)]
pub(crate) enum FactoryBody {
    /// Plain function of the resolved arguments; never awaited.
    Sync(SyncCtor),
    /// Function returning an in-flight computation, awaited under the
    /// construction timeout.
    Async(AsyncCtor),
}

/// Payload of a class definition.
#[derive(Clone)]
pub(crate) enum ClassBody {
    /// Plain construction followed by the (possibly no-op) async
    /// initialization hook.
    Plain { construct: SyncCtor, init: InitHook },
    /// Fully-formed asynchronous construction; replaces plain construction
    /// entirely.
    Create(AsyncCtor),
}

/// How to produce the value for one token.
///
/// One payload shape per variant; construction dispatches exhaustively so a
/// new variant cannot be added without the compiler pointing at every match.
#[derive(Clone)]
pub(crate) enum ProviderKind {
    /// Literal value returned verbatim, no async step.
    Value(AnyArc),
    /// Factory function of the resolved dependencies.
    Factory(FactoryBody),
    /// Constructible type, with either an init hook or a fully-formed async
    /// constructor.
    Class(ClassBody),
    /// Externally-built value handed to the container; participates in
    /// lookups but has no construction path and no dependency edges.
    Injected(AnyArc),
}

/// A single "how to build X" record: token, lifetime tier, ordered
/// dependencies, and the construction payload.
///
/// Definitions are created through [`DefinitionSet`](crate::DefinitionSet)
/// registration methods and consumed by the registry at build time.
#[derive(Clone)]
pub struct ProviderDefinition {
    pub(crate) token: Token,
    pub(crate) tier: Tier,
    pub(crate) dependencies: Vec<Token>,
    pub(crate) kind: ProviderKind,
}

impl ProviderDefinition {
    pub(crate) fn new(token: Token, tier: Tier, dependencies: Vec<Token>, kind: ProviderKind) -> Self {
        Self { token, tier, dependencies, kind }
    }

    /// The token this definition produces.
    pub fn token(&self) -> &Token {
        &self.token
    }

    /// The lifetime tier the produced value is valid at.
    pub fn tier(&self) -> Tier {
        self.tier
    }

    /// The declared dependency tokens, in argument order.
    pub fn dependencies(&self) -> &[Token] {
        &self.dependencies
    }
}
