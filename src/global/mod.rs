//! Per-user state outside any installation prefix: default directories and
//! the archive download cache.

pub mod cache;
pub mod utils;
