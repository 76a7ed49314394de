use crate::error::SkipStoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Artifact kinds the library manages. The order of `ALL` is also the
/// priority used when a directory carries more than one manifest file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Skill,
    Command,
    Agent,
    Hook,
    Mcp,
    Rule,
}

impl EntityType {
    pub const ALL: [EntityType; 6] = [
        EntityType::Skill,
        EntityType::Command,
        EntityType::Agent,
        EntityType::Hook,
        EntityType::Mcp,
        EntityType::Rule,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityType::Skill => "skill",
            EntityType::Command => "command",
            EntityType::Agent => "agent",
            EntityType::Hook => "hook",
            EntityType::Mcp => "mcp",
            EntityType::Rule => "rule",
        }
    }

    /// Conventional directory name grouping artifacts of this type.
    pub fn dir_name(self) -> &'static str {
        match self {
            EntityType::Skill => "skills",
            EntityType::Command => "commands",
            EntityType::Agent => "agents",
            EntityType::Hook => "hooks",
            EntityType::Mcp => "mcp",
            EntityType::Rule => "rules",
        }
    }

    /// Matches a directory name against the entity-type vocabulary,
    /// ignoring case.
    pub fn from_dir_name(name: &str) -> Option<EntityType> {
        Self::ALL
            .into_iter()
            .find(|t| t.dir_name().eq_ignore_ascii_case(name))
    }

    /// Definition files recognized directly inside an artifact directory.
    pub fn manifest_files(self) -> &'static [&'static str] {
        match self {
            EntityType::Skill => &["SKILL.md"],
            EntityType::Command => &["COMMAND.md"],
            EntityType::Agent => &["AGENT.md"],
            EntityType::Hook => &["HOOK.md", "hooks.json"],
            EntityType::Mcp => &["MCP.md", ".mcp.json", "mcp.json"],
            EntityType::Rule => &["RULE.md"],
        }
    }

    pub fn expected_extensions(self) -> &'static [&'static str] {
        match self {
            EntityType::Skill | EntityType::Command | EntityType::Agent | EntityType::Rule => {
                &["md"]
            }
            EntityType::Hook => &["sh", "py", "js", "json"],
            EntityType::Mcp => &["json", "toml", "py", "js", "ts"],
        }
    }

    /// The manifest file name this type owns, if `file_name` is one.
    pub fn matches_manifest(self, file_name: &str) -> bool {
        self.manifest_files()
            .iter()
            .any(|m| m.eq_ignore_ascii_case(file_name))
    }

    /// Entity type owning `file_name` as its manifest, in priority order.
    pub fn for_manifest_file(file_name: &str) -> Option<EntityType> {
        Self::ALL.into_iter().find(|t| t.matches_manifest(file_name))
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = String;

    /// Accepts both the singular form (`skill`) and the directory form
    /// (`skills`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == lower || t.dir_name() == lower)
            .ok_or_else(|| format!("unknown artifact type '{}'", s))
    }
}

/// Result of inferring an artifact type from a directory's position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeHint {
    Known(EntityType),
    Unknown,
}

impl TypeHint {
    pub fn known(self) -> Option<EntityType> {
        match self {
            TypeHint::Known(t) => Some(t),
            TypeHint::Unknown => None,
        }
    }
}

/// Infers an artifact type from the nearest ancestor directory whose name is
/// in the entity-type vocabulary. The leaf segment itself is not considered.
pub fn infer_type(path: &str) -> TypeHint {
    let segments: Vec<&str> = path
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();
    let Some((_, ancestors)) = segments.split_last() else {
        return TypeHint::Unknown;
    };
    ancestors
        .iter()
        .rev()
        .find_map(|seg| EntityType::from_dir_name(seg))
        .map(TypeHint::Known)
        .unwrap_or(TypeHint::Unknown)
}

/// Identity of an artifact across collection, project and skip list.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ArtifactKey {
    pub artifact_type: EntityType,
    pub name: String,
}

impl ArtifactKey {
    pub fn new(artifact_type: EntityType, name: impl Into<String>) -> Self {
        Self {
            artifact_type,
            name: name.into(),
        }
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.artifact_type, self.name)
    }
}

impl FromStr for ArtifactKey {
    type Err = SkipStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, name) = s
            .split_once(':')
            .ok_or_else(|| SkipStoreError::InvalidKey(s.to_string()))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(SkipStoreError::InvalidKey(s.to_string()));
        }
        let artifact_type =
            EntityType::from_str(kind).map_err(|_| SkipStoreError::InvalidKey(s.to_string()))?;
        Ok(Self::new(artifact_type, name))
    }
}

impl From<ArtifactKey> for String {
    fn from(key: ArtifactKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for ArtifactKey {
    type Error = SkipStoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
