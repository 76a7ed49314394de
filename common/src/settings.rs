use dotenvy::dotenv;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    #[serde(default)]
    pub discovery: DiscoverySettings,
    pub collection: CollectionSettings,
    pub skip_preferences: SkipPreferenceSettings,
    #[serde(default)]
    pub debug: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DiscoverySettings {
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    pub min_confidence: Option<u8>,
    pub timeout_ms: Option<u64>,
    /// Size of the scoring worker pool; the rayon default when unset.
    pub workers: Option<usize>,
}

fn default_max_depth() -> usize {
    4
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            min_confidence: None,
            timeout_ms: None,
            workers: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CollectionSettings {
    pub manifest_path: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SkipPreferenceSettings {
    pub path: PathBuf,
}

fn data_root() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("agentlib")
}

impl Settings {
    /// Layers, lowest precedence first: built-in defaults, system config,
    /// user config, `./agentlib.toml`, the explicit config file, then
    /// `AGENTLIB_` environment variables (`AGENTLIB_DISCOVERY__MAX_DEPTH=6`).
    #[allow(clippy::result_large_err)]
    pub fn new(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        dotenv().ok();

        let mut figment = Figment::from(Serialized::defaults(Settings::default()));

        figment = figment.merge(Toml::file("/etc/agentlib/config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            figment = figment.merge(Toml::file(config_dir.join("agentlib/config.toml")));
        }

        figment = figment.merge(Toml::file("agentlib.toml"));

        let config_path = config_path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("AGENTLIB_CONFIG_PATH").ok().map(PathBuf::from));
        if let Some(config_path) = config_path {
            figment = figment.merge(Toml::file(config_path));
        }

        figment = figment.merge(Env::prefixed("AGENTLIB_").ignore(&["CONFIG_PATH"]).split("__"));

        figment.extract()
    }
}

impl Default for Settings {
    fn default() -> Self {
        let data = data_root();
        Settings {
            discovery: DiscoverySettings::default(),
            collection: CollectionSettings {
                manifest_path: data.join("collection").join("collection.toml"),
            },
            skip_preferences: SkipPreferenceSettings {
                path: data.join("skip-preferences.toml"),
            },
            debug: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_extract_without_any_sources() -> Result<(), figment::Error> {
        let settings: Settings = Figment::from(Serialized::defaults(Settings::default())).extract()?;
        assert_eq!(settings.discovery.max_depth, 4);
        assert!(settings.discovery.min_confidence.is_none());
        assert!(settings
            .skip_preferences
            .path
            .ends_with("agentlib/skip-preferences.toml"));
        Ok(())
    }

    #[test]
    fn toml_file_overrides_defaults() -> Result<(), figment::Error> {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "custom.toml",
                "[discovery]\nmax_depth = 6\nmin_confidence = 50\n\n[collection]\nmanifest_path = \"/tmp/c.toml\"\n",
            )?;
            let settings = Settings::new(Some(Path::new("custom.toml")))?;
            assert_eq!(settings.discovery.max_depth, 6);
            assert_eq!(settings.discovery.min_confidence, Some(50));
            assert_eq!(settings.collection.manifest_path, PathBuf::from("/tmp/c.toml"));
            Ok(())
        });
        Ok(())
    }

    #[test]
    fn environment_overrides_files() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("agentlib.toml", "[discovery]\nmax_depth = 2\n")?;
            jail.set_env("AGENTLIB_DISCOVERY__MAX_DEPTH", "7");
            let settings = Settings::new(None)?;
            assert_eq!(settings.discovery.max_depth, 7);
            Ok(())
        });
    }
}
