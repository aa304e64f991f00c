//! Thicket - a plugin-driven static site generator.
//!
//! Source files are resolved into a [`ContentTree`](content::ContentTree) by
//! content plugins, extended by generators, and rendered through views,
//! either once into an output directory ([`build::build_site`]) or on demand
//! by the live preview server ([`preview::preview_site`]).
//!
//! ```no_run
//! use std::sync::Arc;
//! use thicket::{build::build_site, config::SiteConfig, environment::Environment};
//! # use thicket::{content::{Content, FilePath}, plugin::{ContentPlugin, StaticFilePlugin}};
//! # struct Markdown;
//! # impl ContentPlugin for Markdown {
//! #     fn name(&self) -> &str { "Markdown" }
//! #     fn from_file(&self, path: &FilePath) -> anyhow::Result<Box<dyn Content>> {
//! #         StaticFilePlugin.from_file(path)
//! #     }
//! # }
//!
//! let mut env = Environment::new(SiteConfig::default());
//! env.register_content_plugin("pages", "**/*.md", Arc::new(Markdown));
//! build_site(&env)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod build;
pub mod cli;
pub mod config;
pub mod content;
pub mod environment;
pub mod error;
pub mod generator;
pub mod logger;
pub mod plugin;
pub mod preview;
pub mod render;
pub mod templates;

#[cfg(test)]
mod test_support;
