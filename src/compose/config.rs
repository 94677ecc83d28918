use serde::Deserialize;
use serde_yaml::Value as YamlValue;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use crate::compose::ImageReference;
use crate::error::ConfigLoadError;
use crate::{WATCH_DISABLED, WATCH_LABEL};

/// One deployable service declared in a compose file
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceDescriptor {
    pub name: String,
    /// Build-only services have no image and are never watched
    pub image: Option<ImageReference>,
    pub labels: HashMap<String, String>,
}

impl ServiceDescriptor {
    /// False when the service carries the opt-out label
    pub fn is_watched(&self) -> bool {
        self.labels.get(WATCH_LABEL).map(String::as_str) != Some(WATCH_DISABLED)
    }

    pub fn uses_image(&self, image: &str) -> bool {
        self.image.as_ref().map(ImageReference::as_str) == Some(image)
    }
}

/// Parsed compose file. The service map is replaced wholesale on reload.
#[derive(Debug, Clone)]
pub struct ComposeConfig {
    path: PathBuf,
    /// `path` with symlinks and relative parts resolved, fixed at load time
    canonical: PathBuf,
    pub version: Option<String>,
    pub volumes: Option<YamlValue>,
    pub networks: Option<YamlValue>,
    services: BTreeMap<String, ServiceDescriptor>,
}

#[derive(Debug, Deserialize)]
struct ComposeFile {
    #[serde(default)]
    version: Option<YamlValue>,
    #[serde(default)]
    volumes: Option<YamlValue>,
    #[serde(default)]
    networks: Option<YamlValue>,
    #[serde(default)]
    services: Option<BTreeMap<String, Option<ComposeService>>>,
}

#[derive(Debug, Default, Deserialize)]
struct ComposeService {
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    labels: Option<ComposeLabels>,
}

// Compose accepts labels either as a mapping or as a list of KEY=VALUE strings
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ComposeLabels {
    Map(BTreeMap<String, YamlValue>),
    List(Vec<String>),
}

impl ComposeLabels {
    fn into_map(self) -> HashMap<String, String> {
        match self {
            ComposeLabels::Map(map) => map
                .into_iter()
                .map(|(key, value)| (key, scalar_to_string(&value)))
                .collect(),
            ComposeLabels::List(entries) => entries
                .into_iter()
                .map(|entry| match entry.split_once('=') {
                    Some((key, value)) => (key.to_string(), value.to_string()),
                    None => (entry, String::new()),
                })
                .collect(),
        }
    }
}

// `enable: false` and `enable: "false"` must mean the same thing
fn scalar_to_string(value: &YamlValue) -> String {
    match value {
        YamlValue::Null => String::new(),
        YamlValue::Bool(b) => b.to_string(),
        YamlValue::Number(n) => n.to_string(),
        YamlValue::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

impl ComposeConfig {
    /// Read and parse a compose file
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigLoadError> {
        let path = path.into();
        let contents = fs::read_to_string(&path).map_err(|source| ConfigLoadError::Io {
            path: path.clone(),
            source,
        })?;
        let mut config = Self::parse(&path, &contents)?;
        config.canonical = fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
        log::info!(
            "loaded configuration from {} ({} services)",
            path.display(),
            config.services.len()
        );
        Ok(config)
    }

    /// Parse compose YAML that is attributed to `path`
    pub fn parse(path: &Path, contents: &str) -> Result<Self, ConfigLoadError> {
        let file: ComposeFile =
            serde_yaml::from_str(contents).map_err(|source| ConfigLoadError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let services = file
            .services
            .unwrap_or_default()
            .into_iter()
            .map(|(name, service)| {
                let service = service.unwrap_or_default();
                let descriptor = ServiceDescriptor {
                    name: name.clone(),
                    image: service.image.map(ImageReference::from),
                    labels: service
                        .labels
                        .map(ComposeLabels::into_map)
                        .unwrap_or_default(),
                };
                (name, descriptor)
            })
            .collect();

        Ok(Self {
            path: path.to_path_buf(),
            canonical: path.to_path_buf(),
            version: file.version.as_ref().map(scalar_to_string),
            volumes: file.volumes,
            networks: file.networks,
            services,
        })
    }

    /// Re-read from the stored path. On failure the previous snapshot is kept.
    pub fn reload(&mut self) -> Result<(), ConfigLoadError> {
        let fresh = Self::load(self.path.clone())?;
        *self = fresh;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn canonical_path(&self) -> &Path {
        &self.canonical
    }

    pub fn services(&self) -> impl Iterator<Item = &ServiceDescriptor> {
        self.services.values()
    }

    pub fn service(&self, name: &str) -> Option<&ServiceDescriptor> {
        self.services.get(name)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Services declaring exactly `image`
    pub fn services_using<'a>(&'a self, image: &'a str) -> impl Iterator<Item = &'a ServiceDescriptor> {
        self.services
            .values()
            .filter(move |service| service.uses_image(image))
    }

    /// Whether a container's `config_files` label (comma separated paths) names this file
    pub fn is_source_of(&self, config_files: &str) -> bool {
        config_files
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(Path::new)
            .any(|entry| entry == self.path || entry == self.canonical)
    }
}
