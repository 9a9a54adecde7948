//! Region-based navigation for agents confined to liquid terrain.
//!
//! The crate answers two questions for every loaded map: whether an agent can
//! ever reach a target (a breadth-first search over cached connectivity
//! regions) and which concrete cells it should step through (a cell-level A*
//! pruned by the region graph). See [`nav::MapNavigation`] for the per-map
//! entry point and [`nav::NavWorld`] for hosts juggling several maps.

pub mod nav;

// ============================================================================
// Profiling Macros
// ============================================================================

/// Log a message on every 100th call when the `perf_stats` feature is enabled.
///
/// `$counter` is any integer expression that increases per call (a query
/// counter, a rebuild counter). Without `perf_stats` this expands to nothing
/// and the arguments are never evaluated.
///
/// # Example
/// ```ignore
/// profile_log!(self.stats.queries, "[REACH] {} cached entries", self.cache.len());
/// ```
#[macro_export]
#[cfg(feature = "perf_stats")]
macro_rules! profile_log {
    ($counter:expr, $($arg:tt)*) => {
        if $counter % 100 == 0 {
            ::tracing::info!($($arg)*);
        }
    };
}

#[macro_export]
#[cfg(not(feature = "perf_stats"))]
macro_rules! profile_log {
    ($counter:expr, $($arg:tt)*) => {};
}
