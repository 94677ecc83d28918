use std::collections::HashSet;
use std::path::Path;

use crate::compose::{unique_images, ComposeConfig, ImageSet};
use crate::error::ConfigLoadError;

/// Holds every compose file being watched
#[derive(Debug, Default)]
pub struct ConfigStore {
    configs: Vec<ComposeConfig>,
}

impl ConfigStore {
    pub fn new(configs: Vec<ComposeConfig>) -> Self {
        Self { configs }
    }

    /// Load each path. Files that fail their initial load are dropped for good
    /// and returned alongside the store so the caller can report them.
    /// A file named twice (e.g. `a.yml` and `./a.yml`) is kept once.
    pub fn load<P: AsRef<Path>>(paths: &[P]) -> (Self, Vec<ConfigLoadError>) {
        let mut configs: Vec<ComposeConfig> = Vec::with_capacity(paths.len());
        let mut errors = Vec::new();
        let mut seen = HashSet::new();

        for path in paths {
            let path = path.as_ref();
            log::info!("load {} configuration", path.display());
            match ComposeConfig::load(path) {
                Ok(config) => {
                    if !seen.insert(config.canonical_path().to_path_buf()) {
                        log::warn!(
                            "{} is already watched, ignoring the duplicate entry",
                            path.display()
                        );
                        continue;
                    }
                    configs.push(config);
                }
                Err(e) => {
                    log::error!("dropping {} from the watch list: {e}", path.display());
                    errors.push(e);
                }
            }
        }

        (Self { configs }, errors)
    }

    pub fn configs(&self) -> &[ComposeConfig] {
        &self.configs
    }

    pub fn configs_mut(&mut self) -> &mut [ComposeConfig] {
        &mut self.configs
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// Images currently watched across all configs
    pub fn unique_images(&self) -> ImageSet {
        unique_images(&self.configs)
    }

    /// Reload every config in place, returning the failures.
    /// A config that fails keeps its previous snapshot.
    pub fn reload_all(&mut self) -> Vec<ConfigLoadError> {
        let mut errors = Vec::new();
        for config in &mut self.configs {
            if let Err(e) = config.reload() {
                log::warn!(
                    "unable to reload {}, keeping previous services: {e}",
                    config.path().display()
                );
                errors.push(e);
            }
        }
        errors
    }
}
