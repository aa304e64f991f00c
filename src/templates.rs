//! Template map: template-relative path → compiled template.

use crate::{
    content::FilePath,
    error::ContentError,
    log,
    plugin::{Registry, Template},
};
use rayon::prelude::*;
use std::{collections::BTreeMap, path::Path, sync::Arc};
use walkdir::WalkDir;

pub type TemplateMap = BTreeMap<String, Arc<dyn Template>>;

/// Compile every template below `dir` with its matching template plugin.
///
/// Files no plugin claims are skipped. A missing directory yields an empty
/// map.
pub fn load_templates(registry: &Registry, dir: &Path) -> Result<TemplateMap, ContentError> {
    if !dir.is_dir() {
        return Ok(TemplateMap::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.map_err(|err| {
            let path = err.path().unwrap_or(dir).to_path_buf();
            ContentError::Io(path, err.into())
        })?;
        if entry.file_type().is_file() {
            files.push(FilePath::new(dir, entry.into_path()));
        }
    }

    let compiled: Vec<Option<(String, Arc<dyn Template>)>> = files
        .par_iter()
        .map(|path| {
            let Some(plugin) = registry.resolve_template(path) else {
                return Ok(None);
            };
            let template = plugin
                .from_file(path)
                .map_err(|source| ContentError::Factory {
                    path: path.relative_str(),
                    source,
                })?;
            Ok(Some((path.relative_str(), Arc::from(template))))
        })
        .collect::<Result<_, ContentError>>()?;

    let templates: TemplateMap = compiled.into_iter().flatten().collect();
    log!("render"; "loaded {} templates", templates.len());
    Ok(templates)
}
