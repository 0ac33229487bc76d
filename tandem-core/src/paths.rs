//! Checks on replica roots and entry names, shared by the registry and the
//! sync engine.

use std::path::{Component, Path, PathBuf};

/// `path` with symlinks and `.`/`..` resolved as far as it exists on disk.
///
/// The longest existing ancestor is canonicalized and the missing tail is
/// appended unchanged, so roots that do not exist yet still compare sanely.
pub fn resolved(path: &Path) -> PathBuf {
    let mut existing = path;
    let mut tail = Vec::new();
    loop {
        if let Ok(canonical) = existing.canonicalize() {
            return tail.iter().rev().fold(canonical, |acc, part| acc.join(part));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                existing = parent;
            }
            _ => return path.to_path_buf(),
        }
    }
}

/// True when one root is the other or sits anywhere inside it.
pub fn roots_overlap(a: &Path, b: &Path) -> bool {
    let (a, b) = (resolved(a), resolved(b));
    a.starts_with(&b) || b.starts_with(&a)
}

/// True when `name` is a single plain path component: no separators, no
/// `.`/`..`, not absolute.
pub fn is_entry_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn nested_roots_overlap_either_way() {
        let tmp = TempDir::new().unwrap();
        let inner = tmp.path().join("inner");
        fs::create_dir(&inner).unwrap();

        assert!(roots_overlap(tmp.path(), &inner));
        assert!(roots_overlap(&inner, tmp.path()));
        assert!(roots_overlap(tmp.path(), tmp.path()));
    }

    #[test]
    fn siblings_do_not_overlap_even_when_missing() {
        let tmp = TempDir::new().unwrap();
        let a = tmp.path().join("a");
        let ab = tmp.path().join("ab");
        assert!(!roots_overlap(&a, &ab));
        assert!(roots_overlap(&a, &a.join("not/yet")));
    }

    #[test]
    fn dot_dot_is_resolved_before_comparing() {
        let tmp = TempDir::new().unwrap();
        let work = tmp.path().join("work");
        fs::create_dir(&work).unwrap();
        assert!(roots_overlap(&work.join(".."), &work));
    }

    #[test]
    fn entry_names_are_single_components() {
        assert!(is_entry_name("drafts"));
        assert!(is_entry_name("styles.yml"));
        assert!(!is_entry_name(""));
        assert!(!is_entry_name("."));
        assert!(!is_entry_name(".."));
        assert!(!is_entry_name("drafts/one"));
        assert!(!is_entry_name("/etc"));
    }
}
