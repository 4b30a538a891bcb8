//! The library code for the `rocktobot` static site generator, which builds a
//! personal blog and portfolio from a Tumblr blog. The architecture can be
//! generally broken down into three steps:
//!
//! 1. Loading the posts from the platform API ([`crate::fetch`]) through a
//!    time-limited cache ([`crate::cache`]), and resolving the curated
//!    metadata overrides ([`crate::metadata`])
//! 2. Deriving the view models: the post list ([`crate::listing`]), single
//!    posts ([`crate::detail`]), and the portfolio ([`crate::portfolio`])
//! 3. Rendering the view models to disk ([`crate::write`])
//!
//! The views never touch the network or the filesystem themselves; each is a
//! pure transformation of already loaded data. Post bodies are third-party
//! HTML and go through [`crate::normalize`] before they are rendered.
//!
//! [`crate::build`] stitches the steps together.

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod build;
pub mod cache;
pub mod comment;
pub mod config;
pub mod detail;
pub mod feed;
pub mod fetch;
pub mod lightbox;
pub mod listing;
pub mod metadata;
pub mod normalize;
pub mod portfolio;
pub mod post;
pub mod tag;
pub mod write;
