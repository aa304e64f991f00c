//! One-shot site build.
//!
//! # Architecture
//!
//! ```text
//! build_site()
//!     │
//!     ├── clean output (if [build].clean)
//!     │
//!     ├── load_contents() ──► static tree
//!     ├── load_templates(), load_views(), load_locals()
//!     │
//!     ├── run_generators(static tree) ──► merged into static tree
//!     │
//!     └── render() ──► output/<filename>
//! ```
//!
//! Any error aborts the build.

use crate::{
    environment::Environment,
    generator::run_generators,
    log,
    render::{RenderScope, render},
};
use anyhow::{Context, Result};
use std::{fs, time::Instant};

/// Resolve, generate and render the whole site into `[build].output`.
pub fn build_site(env: &Environment) -> Result<()> {
    let started = Instant::now();
    let config = env.config();
    let output = &config.build.output;

    if config.build.clean && output.exists() {
        log!("build"; "cleaning {}", output.display());
        fs::remove_dir_all(output)
            .with_context(|| format!("Failed to clean {}", output.display()))?;
    }

    let mut contents = env.load_contents().context("Failed to load contents")?;
    let templates = env.load_templates().context("Failed to load templates")?;
    let views = env.load_views();
    let locals = env.load_locals().context("Failed to load locals")?;

    if !env.generators().is_empty() {
        let generated = run_generators(env, &contents).context("Failed to run generators")?;
        contents.merge(Some(&generated));
    }

    let scope = RenderScope {
        env,
        views: &views,
        locals: &locals,
        contents: &contents,
        templates: &templates,
    };
    fs::create_dir_all(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    render(&scope, output).context("Failed to render")?;

    log!("build"; "done in {:.2?}", started.elapsed());
    Ok(())
}
