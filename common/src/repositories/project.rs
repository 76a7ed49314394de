use crate::domain::entity::{ArtifactKey, EntityType};
use crate::error::ExistenceCheckError;
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Artifacts deployed into a project's `.claude/` directory.
///
/// Directory artifacts live at `.claude/<type-dir>/<name>/`; single-file
/// commands, agents and rules at `.claude/<type-dir>/<name>.md`. MCP servers
/// are also recognized by name in the project's `.mcp.json`.
#[derive(Debug)]
pub struct ProjectTreeDir {
    root: PathBuf,
    mcp_servers: OnceLock<Result<HashSet<String>, String>>,
}

impl ProjectTreeDir {
    pub const DEPLOY_DIR: &'static str = ".claude";

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            mcp_servers: OnceLock::new(),
        }
    }

    pub fn contains(&self, key: &ArtifactKey) -> Result<bool, ExistenceCheckError> {
        let type_dir = self
            .root
            .join(Self::DEPLOY_DIR)
            .join(key.artifact_type.dir_name());

        if probe(&type_dir.join(&key.name), |m| m.is_dir())? {
            return Ok(true);
        }
        if matches!(
            key.artifact_type,
            EntityType::Command | EntityType::Agent | EntityType::Rule
        ) && probe(&type_dir.join(format!("{}.md", key.name)), |m| m.is_file())?
        {
            return Ok(true);
        }
        if key.artifact_type == EntityType::Mcp {
            return self.declares_mcp_server(&key.name);
        }
        Ok(false)
    }

    fn declares_mcp_server(&self, name: &str) -> Result<bool, ExistenceCheckError> {
        let path = self.root.join(".mcp.json");
        let servers = self.mcp_servers.get_or_init(|| read_mcp_servers(&path));
        match servers {
            Ok(names) => Ok(names.contains(name)),
            Err(message) => Err(ExistenceCheckError::Parse {
                path,
                message: message.clone(),
            }),
        }
    }
}

fn probe(
    path: &Path,
    check: impl Fn(&std::fs::Metadata) -> bool,
) -> Result<bool, ExistenceCheckError> {
    match std::fs::metadata(path) {
        Ok(meta) => Ok(check(&meta)),
        Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => Ok(false),
        Err(e) => Err(ExistenceCheckError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

fn read_mcp_servers(path: &Path) -> Result<HashSet<String>, String> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashSet::new()),
        Err(e) => return Err(e.to_string()),
    };
    let value: serde_json::Value = serde_json::from_str(&raw).map_err(|e| e.to_string())?;
    Ok(value
        .get("mcpServers")
        .and_then(|v| v.as_object())
        .map(|servers| servers.keys().cloned().collect())
        .unwrap_or_default())
}
