//! Internal implementation details.

use std::future::Future;
use std::pin::Pin;

/// Boxed, pinned, sendable future used wherever a construction step may
/// suspend (async factories, initialization hooks, recursive builds).
pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
