use crate::domain::{Diagnostic, DiagnosticKind};
use common::error::ScanError;
use common::EntityType;
use std::collections::{BTreeMap, BTreeSet};
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::time::Instant;
use walkdir::WalkDir;

/// Directories never worth descending into.
pub const NOISE_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "node_modules",
    "target",
    "__pycache__",
    ".venv",
    "venv",
    ".tox",
    ".mypy_cache",
    ".pytest_cache",
    ".cache",
    ".idea",
    ".vscode",
    ".next",
];

/// Manifest hints are capped; frontmatter lives at the top of the file.
pub const MAX_HINT_BYTES: u64 = 64 * 1024;

pub const ROOT: &str = ".";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestHint {
    Text(String),
    /// Readable, but not UTF-8 before the cap.
    NotUtf8 { valid_up_to: usize },
    Unreadable(String),
}

#[derive(Debug, Clone, Default)]
pub struct DirEntryInfo {
    pub files: BTreeSet<String>,
    pub subdirs: BTreeSet<String>,
    /// Content of recognized manifest files, keyed by on-disk file name.
    pub manifests: BTreeMap<String, ManifestHint>,
}

impl DirEntryInfo {
    /// Whether any recognized artifact manifest sits directly inside.
    pub fn carries_manifest(&self) -> bool {
        self.files
            .iter()
            .any(|f| EntityType::for_manifest_file(f).is_some())
    }

    /// The first manifest file `entity_type` recognizes, in the type's
    /// preference order.
    pub fn manifest_for(&self, entity_type: EntityType) -> Option<&str> {
        entity_type.manifest_files().iter().find_map(|m| {
            self.files
                .iter()
                .find(|f| f.eq_ignore_ascii_case(m))
                .map(String::as_str)
        })
    }
}

/// Every directory under a scan root, keyed by POSIX relative path, with its
/// immediate children. Built by one traversal and read-only afterward.
#[derive(Debug, Clone)]
pub struct DirectoryIndex {
    entries: BTreeMap<String, DirEntryInfo>,
    diagnostics: Vec<Diagnostic>,
    truncated: bool,
}

pub fn is_noise_dir(name: &str) -> bool {
    NOISE_DIRS.contains(&name)
}

/// Parent of a relative path; top-level directories belong to `.`.
pub fn parent_path(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some((parent, _)) => parent,
        None => ROOT,
    }
}

pub fn leaf_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

pub fn path_depth(path: &str) -> usize {
    if path == ROOT || path.is_empty() {
        0
    } else {
        path.split('/').count()
    }
}

/// Proper ancestors of `path`, nearest first, excluding the root.
pub fn ancestors(path: &str) -> impl Iterator<Item = &str> {
    let mut current = path;
    std::iter::from_fn(move || {
        let parent = parent_path(current);
        if parent == ROOT {
            return None;
        }
        current = parent;
        Some(parent)
    })
}

fn relative_key(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let key = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    if key.is_empty() {
        ROOT.to_string()
    } else {
        key
    }
}

fn read_hint(path: &Path) -> ManifestHint {
    let mut bytes = Vec::new();
    let read = std::fs::File::open(path)
        .and_then(|f| f.take(MAX_HINT_BYTES).read_to_end(&mut bytes));
    match read {
        Ok(_) => decode_hint(bytes),
        Err(e) => ManifestHint::Unreadable(e.to_string()),
    }
}

/// A capped read may end inside a multibyte character; that tail is dropped.
/// Any other invalid sequence makes the hint undecodable.
fn decode_hint(bytes: Vec<u8>) -> ManifestHint {
    let capped = bytes.len() as u64 >= MAX_HINT_BYTES;
    match String::from_utf8(bytes) {
        Ok(text) => ManifestHint::Text(text),
        Err(e) => {
            let valid_up_to = e.utf8_error().valid_up_to();
            if capped && e.utf8_error().error_len().is_none() {
                let bytes = e.as_bytes();
                ManifestHint::Text(String::from_utf8_lossy(&bytes[..valid_up_to]).into_owned())
            } else {
                ManifestHint::NotUtf8 { valid_up_to }
            }
        }
    }
}

impl DirectoryIndex {
    /// Walks `root` once, at most `walk_depth` levels deep.
    ///
    /// Fails only when the root itself is missing or unreadable. Unreadable
    /// subdirectories are dropped from the index and reported as
    /// diagnostics. When `deadline` passes the walk stops early and the
    /// index is marked truncated.
    pub fn build(
        root: &Path,
        walk_depth: usize,
        deadline: Option<Instant>,
    ) -> Result<Self, ScanError> {
        let meta = std::fs::metadata(root).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ScanError::RootNotFound(root.to_path_buf()),
            _ => ScanError::RootUnreadable {
                path: root.to_path_buf(),
                source: e,
            },
        })?;
        if !meta.is_dir() {
            return Err(ScanError::RootNotDirectory(root.to_path_buf()));
        }
        std::fs::read_dir(root).map_err(|e| ScanError::RootUnreadable {
            path: root.to_path_buf(),
            source: e,
        })?;

        let mut index = DirectoryIndex {
            entries: BTreeMap::new(),
            diagnostics: Vec::new(),
            truncated: false,
        };
        index.entries.insert(ROOT.to_string(), DirEntryInfo::default());

        let walker = WalkDir::new(root)
            .follow_links(false)
            .max_depth(walk_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0
                    || !e.file_type().is_dir()
                    || !is_noise_dir(&e.file_name().to_string_lossy())
            });

        for item in walker {
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    tracing::warn!(root = %root.display(), "Scan deadline reached during directory walk");
                    index.truncated = true;
                    index.diagnostics.push(Diagnostic::new(
                        DiagnosticKind::Timeout,
                        ROOT,
                        "directory walk stopped at the scan deadline",
                    ));
                    break;
                }
            }

            let entry = match item {
                Ok(entry) => entry,
                Err(err) => {
                    let key = err
                        .path()
                        .map(|p| relative_key(root, p))
                        .unwrap_or_else(|| ROOT.to_string());
                    tracing::warn!(path = %key, error = %err, "Skipping unreadable subtree");
                    index.omit_subtree(&key);
                    index.diagnostics.push(Diagnostic::new(
                        DiagnosticKind::SubtreeUnreadable,
                        key,
                        err.to_string(),
                    ));
                    continue;
                }
            };

            if entry.depth() == 0 {
                continue;
            }

            let key = relative_key(root, entry.path());
            let name = entry.file_name().to_string_lossy().to_string();
            let parent = parent_path(&key).to_string();

            if entry.file_type().is_dir() {
                index.entries.entry(key).or_default();
                index.entries.entry(parent).or_default().subdirs.insert(name);
                continue;
            }

            let hint = EntityType::for_manifest_file(&name).map(|_| read_hint(entry.path()));
            if let Some(ManifestHint::Unreadable(message)) = &hint {
                tracing::warn!(path = %key, error = %message, "Manifest file is unreadable");
                index.diagnostics.push(Diagnostic::new(
                    DiagnosticKind::ManifestUnreadable,
                    key.clone(),
                    message.clone(),
                ));
            }
            let info = index.entries.entry(parent).or_default();
            if let Some(hint) = hint {
                info.manifests.insert(name.clone(), hint);
            }
            info.files.insert(name);
        }

        tracing::debug!(
            root = %root.display(),
            directories = index.entries.len(),
            truncated = index.truncated,
            "Built directory index"
        );
        Ok(index)
    }

    fn omit_subtree(&mut self, key: &str) {
        if key == ROOT {
            return;
        }
        let prefix = format!("{}/", key);
        self.entries
            .retain(|path, _| path != key && !path.starts_with(&prefix));
        if let Some(parent) = self.entries.get_mut(parent_path(key)) {
            parent.subdirs.remove(leaf_name(key));
        }
    }

    pub fn get(&self, path: &str) -> Option<&DirEntryInfo> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Directory paths in lexicographic order, root included.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn truncated(&self) -> bool {
        self.truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, rel: &str, body: &str) -> std::io::Result<()> {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, body)
    }

    #[test]
    fn path_helpers_use_posix_segments() {
        assert_eq!(parent_path("a/b/c"), "a/b");
        assert_eq!(parent_path("a"), ROOT);
        assert_eq!(leaf_name("a/b/c"), "c");
        assert_eq!(path_depth("a/b/c"), 3);
        assert_eq!(path_depth(ROOT), 0);
        assert_eq!(ancestors("a/b/c").collect::<Vec<_>>(), vec!["a/b", "a"]);
        assert_eq!(ancestors("a").count(), 0);
    }

    #[test]
    fn build_records_files_subdirs_and_manifest_hints() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write(dir.path(), "skills/pdf/SKILL.md", "---\nname: pdf\n---\n")?;
        write(dir.path(), "skills/pdf/notes.txt", "x")?;
        write(dir.path(), "README.md", "# repo")?;

        let index = DirectoryIndex::build(dir.path(), 5, None)?;
        let root = index.get(ROOT).expect("root entry");
        assert!(root.files.contains("README.md"));
        assert!(root.subdirs.contains("skills"));

        let pdf = index.get("skills/pdf").expect("skill entry");
        assert_eq!(pdf.files.len(), 2);
        assert!(pdf.carries_manifest());
        assert_eq!(pdf.manifest_for(EntityType::Skill), Some("SKILL.md"));
        assert!(matches!(
            pdf.manifests.get("SKILL.md"),
            Some(ManifestHint::Text(t)) if t.contains("name: pdf")
        ));
        assert!(!pdf.manifests.contains_key("notes.txt"));
        Ok(())
    }

    #[test]
    fn build_prunes_noise_directories() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write(dir.path(), ".git/skills/x/SKILL.md", "")?;
        write(dir.path(), "node_modules/pkg/SKILL.md", "")?;
        write(dir.path(), "tools/a.md", "")?;

        let index = DirectoryIndex::build(dir.path(), 5, None)?;
        assert!(index.contains("tools"));
        assert!(!index.paths().any(|p| p.starts_with(".git")));
        assert!(!index.paths().any(|p| p.starts_with("node_modules")));
        Ok(())
    }

    #[test]
    fn build_respects_walk_depth() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write(dir.path(), "a/b/c/d/file.md", "")?;

        let index = DirectoryIndex::build(dir.path(), 2, None)?;
        assert!(index.contains("a/b"));
        assert!(!index.contains("a/b/c"));
        Ok(())
    }

    #[test]
    fn build_fails_for_missing_or_file_root() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let missing = DirectoryIndex::build(&dir.path().join("nope"), 3, None);
        assert!(matches!(missing, Err(ScanError::RootNotFound(_))));

        write(dir.path(), "file.txt", "")?;
        let file = DirectoryIndex::build(&dir.path().join("file.txt"), 3, None);
        assert!(matches!(file, Err(ScanError::RootNotDirectory(_))));
        Ok(())
    }

    #[test]
    fn expired_deadline_truncates_the_walk() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write(dir.path(), "a/b.md", "")?;

        let index = DirectoryIndex::build(dir.path(), 3, Some(Instant::now()))?;
        assert!(index.truncated());
        assert!(index
            .diagnostics()
            .iter()
            .any(|d| d.kind == DiagnosticKind::Timeout));
        Ok(())
    }

    #[test]
    fn omit_subtree_drops_descendants_and_parent_link() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write(dir.path(), "a/b/c/x.md", "")?;
        write(dir.path(), "ab/y.md", "")?;

        let mut index = DirectoryIndex::build(dir.path(), 5, None)?;
        index.omit_subtree("a/b");
        assert!(!index.contains("a/b"));
        assert!(!index.contains("a/b/c"));
        assert!(index.contains("ab"));
        assert!(!index.get("a").map(|a| a.subdirs.contains("b")).unwrap_or(true));
        Ok(())
    }

    #[test]
    fn hint_cap_inside_a_character_keeps_the_valid_prefix() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let header = "---\nname: pdf\ndescription: Reads PDFs\n---\n";
        let cap = MAX_HINT_BYTES as usize;
        // Pad so the two-byte `é` straddles the cap.
        let mut body = String::from(header);
        body.push_str(&"x".repeat(cap - 1 - header.len()));
        body.push('é');
        body.push_str("tail");
        write(dir.path(), "skills/pdf/SKILL.md", &body)?;

        let index = DirectoryIndex::build(dir.path(), 5, None)?;
        let pdf = index.get("skills/pdf").expect("skill entry");
        match pdf.manifests.get("SKILL.md") {
            Some(ManifestHint::Text(text)) => {
                assert_eq!(text.len(), cap - 1);
                assert!(text.starts_with(header));
            }
            other => panic!("unexpected hint {:?}", other),
        }
        assert!(index.diagnostics().is_empty());
        Ok(())
    }

    #[test]
    fn non_utf8_manifest_is_readable_but_undecodable() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        fs::create_dir_all(dir.path().join("skills/legacy"))?;
        fs::write(
            dir.path().join("skills/legacy/SKILL.md"),
            b"---\nname: caf\xe9\n---\n",
        )?;

        let index = DirectoryIndex::build(dir.path(), 5, None)?;
        let legacy = index.get("skills/legacy").expect("skill entry");
        assert_eq!(
            legacy.manifests.get("SKILL.md"),
            Some(&ManifestHint::NotUtf8 { valid_up_to: 13 })
        );
        assert!(!index
            .diagnostics()
            .iter()
            .any(|d| d.kind == DiagnosticKind::ManifestUnreadable));
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_subtree_is_omitted_with_a_diagnostic() -> anyhow::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir()?;
        write(dir.path(), "skills/pdf/SKILL.md", "---\nname: pdf\n---\n")?;
        write(dir.path(), "skills/xlsx/SKILL.md", "---\nname: xlsx\n---\n")?;
        write(dir.path(), "locked/inner/AGENT.md", "")?;
        let locked = dir.path().join("locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000))?;
        if fs::read_dir(&locked).is_ok() {
            // Permission bits do not bind this user (e.g. root).
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755))?;
            return Ok(());
        }

        let built = DirectoryIndex::build(dir.path(), 5, None);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755))?;
        let index = built?;

        assert!(index.contains("skills/pdf"));
        assert!(index.contains("skills/xlsx"));
        assert!(!index.contains("locked"));
        assert!(!index.contains("locked/inner"));
        assert!(!index.get(ROOT).map(|r| r.subdirs.contains("locked")).unwrap_or(true));
        assert!(index
            .diagnostics()
            .iter()
            .any(|d| d.kind == DiagnosticKind::SubtreeUnreadable && d.path == "locked"));
        Ok(())
    }
}
