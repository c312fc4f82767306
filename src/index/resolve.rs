//! Second-pass link resolution against the set of indexed documents.

use super::{IndexedPath, LinkResolution, StoredLink};
use crate::domain::LinkKind;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

const DOCUMENT_EXTENSIONS: &[&str] = &["md", "markdown"];

/// Resolves link targets to indexed documents.
///
/// Built once per resolution pass from the current path universe, so a
/// target that appeared or disappeared since the last run is picked up.
#[derive(Debug, Clone)]
pub struct LinkResolver {
    root: PathBuf,
    /// Relative path (as stored) to absolute path.
    by_relative: HashMap<String, PathBuf>,
    /// Lowercased relative path to absolute path.
    by_relative_lower: HashMap<String, PathBuf>,
    /// Lowercased file stem to `(relative path, absolute path)` candidates.
    by_stem: HashMap<String, Vec<(String, PathBuf)>>,
    /// Lowercased alias to absolute path.
    by_alias: HashMap<String, PathBuf>,
}

impl LinkResolver {
    pub fn new(root: &Path, documents: &[IndexedPath], aliases: &[(PathBuf, String)]) -> Self {
        let mut by_relative = HashMap::with_capacity(documents.len());
        let mut by_relative_lower = HashMap::with_capacity(documents.len());
        let mut by_stem: HashMap<String, Vec<(String, PathBuf)>> = HashMap::new();

        for doc in documents {
            by_relative.insert(doc.relative_path.clone(), doc.path.clone());
            by_relative_lower
                .entry(doc.relative_path.to_lowercase())
                .or_insert_with(|| doc.path.clone());
            let stem = strip_extension(file_name(&doc.relative_path)).to_lowercase();
            by_stem
                .entry(stem)
                .or_default()
                .push((doc.relative_path.clone(), doc.path.clone()));
        }

        for candidates in by_stem.values_mut() {
            candidates.sort_by(|a, b| a.0.len().cmp(&b.0.len()).then_with(|| a.0.cmp(&b.0)));
        }

        let mut by_alias = HashMap::new();
        for (path, alias) in aliases {
            by_alias
                .entry(alias.trim().to_lowercase())
                .or_insert_with(|| path.clone());
        }

        Self {
            root: root.to_path_buf(),
            by_relative,
            by_relative_lower,
            by_stem,
            by_alias,
        }
    }

    /// Computes the resolution of one stored link.
    pub fn resolve(&self, link: &StoredLink) -> LinkResolution {
        let target_path = match link.kind {
            LinkKind::External => None,
            _ if link.target.trim().is_empty() => {
                // same-document section reference
                link.section.as_ref().map(|_| link.source.clone())
            }
            LinkKind::Wikilink => self.resolve_wikilink(&link.target),
            LinkKind::Inline | LinkKind::Reference => {
                self.resolve_relative(&link.source_relative, &link.target)
            }
        };

        LinkResolution {
            id: link.id,
            is_valid: link.kind == LinkKind::External || target_path.is_some(),
            target_path,
        }
    }

    fn resolve_wikilink(&self, target: &str) -> Option<PathBuf> {
        let target = target.trim().replace('\\', "/");
        let target = target.trim_start_matches('/');
        let lower = target.to_lowercase();

        if let Some(path) = self.lookup(target) {
            return Some(path);
        }
        for ext in DOCUMENT_EXTENSIONS {
            if let Some(path) = self.lookup(&format!("{}.{}", target, ext)) {
                return Some(path);
            }
        }

        // `folder/note` matches any document whose path ends with it
        let stem = strip_extension(file_name(&lower));
        if let Some(candidates) = self.by_stem.get(stem) {
            let suffix = strip_extension(&lower);
            let found = candidates.iter().find(|(relative, _)| {
                let relative = strip_extension(relative).to_lowercase();
                relative == suffix || relative.ends_with(&format!("/{}", suffix))
            });
            if let Some((_, path)) = found {
                return Some(path.clone());
            }
        }

        if let Some(path) = self.by_alias.get(&lower) {
            return Some(path.clone());
        }

        self.existing_file(target)
    }

    fn resolve_relative(&self, source_relative: &str, target: &str) -> Option<PathBuf> {
        let target = target.split(['?', '#']).next().unwrap_or_default();
        let target = percent_decode(target.trim());
        if target.is_empty() {
            return None;
        }

        let mut attempts = Vec::with_capacity(2);
        if let Some(rooted) = target.strip_prefix('/') {
            attempts.extend(normalize(rooted));
        } else {
            let dir = parent_dir(source_relative);
            let joined = if dir.is_empty() {
                target.clone()
            } else {
                format!("{}/{}", dir, target)
            };
            attempts.extend(normalize(&joined));
            attempts.extend(normalize(&target));
        }

        for candidate in &attempts {
            if let Some(path) = self.lookup(candidate) {
                return Some(path);
            }
            if Path::new(candidate).extension().is_none() {
                for ext in DOCUMENT_EXTENSIONS {
                    if let Some(path) = self.lookup(&format!("{}.{}", candidate, ext)) {
                        return Some(path);
                    }
                }
            }
        }

        attempts.iter().find_map(|c| self.existing_file(c))
    }

    fn lookup(&self, relative: &str) -> Option<PathBuf> {
        self.by_relative
            .get(relative)
            .or_else(|| self.by_relative_lower.get(&relative.to_lowercase()))
            .cloned()
    }

    /// Attachments (images, PDFs) are valid targets when they exist on disk.
    fn existing_file(&self, relative: &str) -> Option<PathBuf> {
        let relative = normalize(relative)?;
        let path = self.root.join(&relative);
        path.is_file().then_some(path)
    }
}

fn file_name(relative: &str) -> &str {
    relative.rsplit('/').next().unwrap_or(relative)
}

fn parent_dir(relative: &str) -> &str {
    relative.rsplit_once('/').map_or("", |(dir, _)| dir)
}

fn strip_extension(name: &str) -> &str {
    for ext in DOCUMENT_EXTENSIONS {
        if let Some(stripped) = name.strip_suffix(ext).and_then(|s| s.strip_suffix('.')) {
            return stripped;
        }
    }
    name
}

/// Lexically normalizes a `/`-separated relative path. `None` if it escapes
/// the root.
fn normalize(relative: &str) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    (!parts.is_empty()).then(|| parts.join("/"))
}

/// Decodes `%XX` escapes. Malformed escapes are kept verbatim.
fn percent_decode(s: &str) -> String {
    urlencoding::decode(s).map_or_else(|_| s.to_string(), |decoded| decoded.into_owned())
}
