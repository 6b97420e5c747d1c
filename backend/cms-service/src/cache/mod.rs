/// Content caching
///
/// Redis-backed cache for composed public pages. Keys fold in a per-locale
/// generation counter so a whole locale invalidates with one INCR.
mod page_cache;

pub use page_cache::PageCache;
