//! Republishes a paginated article listing API as an RSS 2.0 feed.

pub mod config;
pub mod feed;
pub mod util;
