//! Provider selection, quota accounting, and fallback across search providers.

mod fallback;

pub use fallback::{FallbackSearch, Provider, SearchError, SearchRequest};
