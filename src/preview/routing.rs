//! Request path normalization, URL lookup and response shaping.

use crate::content::{ContentTree, Leaf};
use rustc_hash::FxHashMap;
use std::sync::Arc;

pub const NOT_FOUND_BODY: &str = "404 Not Found";

/// Normalize a request path (or a leaf URL) into a lookup key.
///
/// ```text
/// /            → /index.html
/// /foo         → /foo/index.html
/// /foo.html    → /foo.html
/// /a%20b.txt   → /a b.txt
/// ```
pub fn normalize_url(raw: &str) -> String {
    let path = raw.split(['?', '#']).next().unwrap_or_default();
    let mut path = path.to_owned();

    if path.ends_with('/') {
        path.push_str("index.html");
    } else {
        let last = path.rsplit('/').next().unwrap_or_default();
        if !last.contains('.') {
            path.push_str("/index.html");
        }
    }

    match urlencoding::decode(&path) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => path,
    }
}

/// Path part of a leaf URL, dropping `scheme://host` if present.
fn url_path(url: &str) -> &str {
    match url.find("://") {
        Some(scheme_end) => {
            let rest = &url[scheme_end + 3..];
            rest.find('/').map_or("/", |start| &rest[start..])
        }
        None => url,
    }
}

/// Normalized URL → leaf, for routing only.
#[derive(Debug, Default, Clone)]
pub struct ContentMap {
    leaves: FxHashMap<String, Arc<Leaf>>,
}

impl ContentMap {
    pub fn build(tree: &ContentTree) -> Self {
        let leaves = tree
            .leaves()
            .into_iter()
            .map(|leaf| (normalize_url(url_path(&leaf.url())), leaf))
            .collect();
        Self { leaves }
    }

    pub fn get(&self, path: &str) -> Option<&Arc<Leaf>> {
        self.leaves.get(path)
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }
}

/// MIME type for `filename`, falling back to the request path.
///
/// Text, JSON and JavaScript types get a UTF-8 charset.
pub fn content_type(filename: &str, request_path: &str) -> String {
    let mime = mime_guess::from_path(filename)
        .first()
        .or_else(|| mime_guess::from_path(request_path).first())
        .unwrap_or(mime_guess::mime::APPLICATION_OCTET_STREAM);

    let textual = mime.type_() == mime_guess::mime::TEXT
        || mime.subtype() == mime_guess::mime::JSON
        || mime.subtype() == mime_guess::mime::JAVASCRIPT;
    if textual {
        format!("{mime}; charset=utf-8")
    } else {
        mime.to_string()
    }
}

/// Transport-independent response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
}

impl Reply {
    pub fn ok(content_type: String, body: Vec<u8>) -> Self {
        Self {
            status: 200,
            content_type,
            body,
        }
    }

    pub fn not_found() -> Self {
        Self::plain(404, NOT_FOUND_BODY)
    }

    pub fn error(message: &str) -> Self {
        Self::plain(500, message)
    }

    fn plain(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: "text/plain; charset=utf-8".to_owned(),
            body: body.as_bytes().to_vec(),
        }
    }
}
