//! Registry configuration.

use std::time::Duration;

/// Tunable limits and timeouts, all with sensible defaults.
///
/// Passed to the `build_with`/`build_child_with` variants of
/// [`DefinitionSet`](crate::DefinitionSet); the plain `build` uses
/// `RegistryOptions::default()`.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use stratum_di::RegistryOptions;
///
/// let options = RegistryOptions::default()
///     .with_session_capacity(32)
///     .with_session_ttl(Duration::from_secs(300))
///     .with_lock_timeout(Duration::from_secs(5));
///
/// assert_eq!(options.session_capacity, 32);
/// ```
#[derive(Debug, Clone)]
pub struct RegistryOptions {
    /// Maximum number of cached session stores. When at capacity, creating a
    /// store for a new key evicts the least-recently-accessed unlocked store.
    pub session_capacity: usize,
    /// Idle lifetime of a session store; stores untouched for longer are
    /// removed by the background sweep.
    pub session_ttl: Duration,
    /// Interval of the background TTL sweep task.
    pub sweep_interval: Duration,
    /// How long a caller waits on another builder's lock before forcibly
    /// breaking it.
    pub lock_timeout: Duration,
    /// Bound on each asynchronous construction step (async factory, init
    /// hook, async create).
    pub construction_timeout: Duration,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            session_capacity: 128,
            session_ttl: Duration::from_secs(30 * 60),
            sweep_interval: Duration::from_secs(60),
            lock_timeout: Duration::from_secs(10),
            construction_timeout: Duration::from_secs(30),
        }
    }
}

impl RegistryOptions {
    /// Sets the session cache capacity.
    pub fn with_session_capacity(mut self, capacity: usize) -> Self {
        self.session_capacity = capacity;
        self
    }

    /// Sets the session idle TTL.
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Sets the background sweep interval.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Sets the build-lock acquisition timeout.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Sets the per-step construction timeout.
    pub fn with_construction_timeout(mut self, timeout: Duration) -> Self {
        self.construction_timeout = timeout;
        self
    }
}
