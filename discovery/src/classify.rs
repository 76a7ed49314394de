//! Structural classification of directories.
//!
//! Each decision looks only at a directory, its immediate children and its
//! parent (plus a depth-bounded ancestor walk for artifact interiors), so the
//! cost stays linear in the size of the tree.

use crate::index::{self, DirEntryInfo, DirectoryIndex, ROOT};
use common::EntityType;

/// Marker file inside `.claude-plugin/` that declares a plugin package.
pub const PLUGIN_MANIFEST_DIR: &str = ".claude-plugin";
pub const PLUGIN_MANIFEST_FILE: &str = "plugin.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirRole {
    Root,
    /// Holds two or more entity-type directories (or a plugin manifest).
    Plugin,
    /// Entity-type directory grouping artifacts; never an artifact itself.
    Container,
    /// Lives inside a directory that already carries a manifest.
    ArtifactInterior,
    Candidate,
}

fn entity_subdir_count(info: &DirEntryInfo) -> usize {
    info.subdirs
        .iter()
        .filter(|name| EntityType::from_dir_name(name).is_some())
        .count()
}

fn has_plugin_manifest(index: &DirectoryIndex, path: &str) -> bool {
    let marker = if path == ROOT {
        PLUGIN_MANIFEST_DIR.to_string()
    } else {
        format!("{}/{}", path, PLUGIN_MANIFEST_DIR)
    };
    index
        .get(&marker)
        .map(|m| m.files.contains(PLUGIN_MANIFEST_FILE))
        .unwrap_or(false)
}

pub fn is_plugin(index: &DirectoryIndex, path: &str) -> bool {
    let Some(info) = index.get(path) else {
        return false;
    };
    entity_subdir_count(info) >= 2 || has_plugin_manifest(index, path)
}

/// An entity-type directory whose parent is the scan root or a plugin.
///
/// A root-level entity-type directory that carries its own type's manifest
/// (for example `skills/SKILL.md`) is the artifact itself rather than a
/// container.
pub fn is_container(index: &DirectoryIndex, path: &str) -> bool {
    if path == ROOT {
        return false;
    }
    let Some(entity_type) = EntityType::from_dir_name(index::leaf_name(path)) else {
        return false;
    };
    let parent = index::parent_path(path);
    if parent == ROOT {
        let self_describing = index
            .get(path)
            .and_then(|info| info.manifest_for(entity_type))
            .is_some();
        return !self_describing;
    }
    is_plugin(index, parent)
}

pub fn is_artifact_interior(index: &DirectoryIndex, path: &str) -> bool {
    index::ancestors(path).any(|ancestor| {
        index
            .get(ancestor)
            .map(DirEntryInfo::carries_manifest)
            .unwrap_or(false)
    })
}

pub fn classify(index: &DirectoryIndex, path: &str) -> DirRole {
    if path == ROOT {
        DirRole::Root
    } else if is_plugin(index, path) {
        DirRole::Plugin
    } else if is_container(index, path) {
        DirRole::Container
    } else if is_artifact_interior(index, path) {
        DirRole::ArtifactInterior
    } else {
        DirRole::Candidate
    }
}
