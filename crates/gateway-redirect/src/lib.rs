//! Redirect Cache (C5)
//!
//! Maps a pick handle to a signed URL and its expiry, coalescing concurrent
//! misses for the same handle into a single upstream call. Grounded on the
//! mutex-guarded-shared-state idiom already used for rate limiting in
//! `gateway-drive115::rate_limit`.

pub mod cache;

pub use cache::RedirectCache;
