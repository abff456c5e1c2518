//! Discovery of passive-mitigation extensions.
//!
//! Extensions are expected as already-unpacked directories (anything holding
//! a `manifest.json`) somewhere under a configured root. They are loaded
//! into the browser at launch; a missing or empty root lowers the odds of
//! clearing a challenge but is never an error.

use std::path::{Path, PathBuf};

/// How deep below the root we look for a `manifest.json`.
const MAX_DEPTH: usize = 3;

/// Collect every unpacked extension directory under `root`.
pub fn discover(root: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    if !root.is_dir() {
        tracing::warn!("extensions dir {} does not exist; none loaded", root.display());
        return found;
    }
    walk(root, 0, &mut found);
    if found.is_empty() {
        tracing::warn!("no unpacked extensions under {}", root.display());
    } else {
        for ext in &found {
            tracing::info!("passive mitigation extension: {}", ext.display());
        }
    }
    found
}

fn walk(dir: &Path, depth: usize, found: &mut Vec<PathBuf>) {
    if dir.join("manifest.json").is_file() {
        found.push(dir.to_path_buf());
        return;
    }
    if depth >= MAX_DEPTH {
        return;
    }
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    let mut children: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    children.sort();
    for child in children {
        walk(&child, depth + 1, found);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_nested_manifest_dirs() {
        let tmp = std::env::temp_dir().join(format!("evergreen-ext-test-{}", std::process::id()));
        let a = tmp.join("silk");
        let b = tmp.join("cfpass").join("unpacked");
        std::fs::create_dir_all(&a).unwrap();
        std::fs::create_dir_all(&b).unwrap();
        std::fs::write(a.join("manifest.json"), "{}").unwrap();
        std::fs::write(b.join("manifest.json"), "{}").unwrap();

        let mut found = discover(&tmp);
        found.sort();
        assert_eq!(found, vec![b, a]);

        std::fs::remove_dir_all(&tmp).ok();
    }

    #[test]
    fn missing_root_yields_nothing() {
        assert!(discover(Path::new("/definitely/not/here")).is_empty());
    }
}
