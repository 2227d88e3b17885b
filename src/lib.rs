//! Kite Digest - a static news digest generator
//!
//! This crate fetches Kagi Kite category feeds, merges stories that appear
//! in several categories and renders the result as an RSS feed plus static
//! HTML pages.

pub mod config;
pub mod error;
pub mod fetcher;
pub mod filter;
pub mod identity;
pub mod merge;
pub mod normalize;
pub mod pipeline;
pub mod projector;
pub mod render;
pub mod site;
pub mod story;
pub mod validate;
pub mod workflow;
