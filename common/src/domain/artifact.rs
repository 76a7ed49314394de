use super::entity::EntityType;
use super::markdown;
use crate::error::ManifestParseError;
use serde_json::Value;

/// The fields of a manifest's structured header the engine cares about.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactFrontmatter {
    pub name: Option<String>,
    pub description: Option<String>,
    pub metadata: Value,
}

impl ArtifactFrontmatter {
    /// The declared name when it follows the artifact naming convention.
    pub fn alias(&self) -> Option<&str> {
        self.name.as_deref().filter(|n| is_kebab_case(n))
    }
}

/// Artifact names: 1-64 chars of lowercase letters, digits and single
/// hyphens, not starting or ending with a hyphen.
pub fn is_kebab_case(name: &str) -> bool {
    if name.is_empty() || name.len() > 64 {
        return false;
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return false;
    }
    !(name.starts_with('-') || name.ends_with('-') || name.contains("--"))
}

/// Looser convention: a whitespace-free identifier such as `My_Tool` or
/// `tool.v2`.
pub fn is_plain_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && !name.starts_with('.')
}

fn required_markdown_fields(entity_type: EntityType) -> &'static [&'static str] {
    match entity_type {
        EntityType::Skill | EntityType::Agent => &["name", "description"],
        EntityType::Command | EntityType::Rule => &["description"],
        EntityType::Hook | EntityType::Mcp => &["name"],
    }
}

fn required_json_field(entity_type: EntityType) -> Option<&'static str> {
    match entity_type {
        EntityType::Hook => Some("hooks"),
        EntityType::Mcp => Some("mcpServers"),
        _ => None,
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Parses and validates a manifest's header for `entity_type`.
///
/// Markdown manifests need a YAML frontmatter mapping carrying the type's
/// required string fields. JSON manifests need to be an object carrying the
/// type's required object key.
pub fn verify_manifest(
    entity_type: EntityType,
    file_name: &str,
    content: &str,
) -> Result<ArtifactFrontmatter, ManifestParseError> {
    if file_name.to_ascii_lowercase().ends_with(".json") {
        return verify_json_manifest(entity_type, content);
    }

    let (frontmatter_raw, _body) = markdown::split_raw_frontmatter(content)?;
    let yaml_value: serde_yaml::Value = serde_yaml::from_str(&frontmatter_raw)
        .map_err(|e| ManifestParseError::InvalidYaml(e.to_string()))?;
    if !yaml_value.is_mapping() {
        return Err(ManifestParseError::NotAMapping);
    }
    let metadata = serde_json::to_value(yaml_value)
        .map_err(|e| ManifestParseError::InvalidYaml(e.to_string()))?;

    for field in required_markdown_fields(entity_type) {
        if string_field(&metadata, field).is_none() {
            return Err(ManifestParseError::MissingField(field));
        }
    }

    Ok(ArtifactFrontmatter {
        name: string_field(&metadata, "name"),
        description: string_field(&metadata, "description"),
        metadata,
    })
}

fn verify_json_manifest(
    entity_type: EntityType,
    content: &str,
) -> Result<ArtifactFrontmatter, ManifestParseError> {
    let value: Value =
        serde_json::from_str(content).map_err(|e| ManifestParseError::InvalidJson(e.to_string()))?;
    if !value.is_object() {
        return Err(ManifestParseError::NotAMapping);
    }
    if let Some(field) = required_json_field(entity_type) {
        if !value.get(field).map(Value::is_object).unwrap_or(false) {
            return Err(ManifestParseError::MissingField(field));
        }
    }
    Ok(ArtifactFrontmatter {
        name: string_field(&value, "name"),
        description: string_field(&value, "description"),
        metadata: value,
    })
}
