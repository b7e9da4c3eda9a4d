//! Process configuration and seed data.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use quartermaster_auth::UserProfile;
use quartermaster_core::{ComponentId, LocationId};

use crate::catalog::{CatalogItem, InMemoryCatalog};
use crate::error::ServiceError;
use crate::identity::InMemoryIdentityDirectory;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_ORDER_PREFIX: &str = "TR";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: String,
    pub order_prefix: String,
    pub seed_file: Option<PathBuf>,
    /// Postgres URL for the ledger and request stores; `None` keeps them in memory.
    pub database_url: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            order_prefix: DEFAULT_ORDER_PREFIX.to_string(),
            seed_file: None,
            database_url: None,
        }
    }
}

impl AppConfig {
    /// Read `QM_BIND_ADDR`, `QM_ORDER_PREFIX`, `QM_SEED_FILE`, and
    /// `USE_PERSISTENT_STORES` with `DATABASE_URL`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let bind_addr = lookup("QM_BIND_ADDR").unwrap_or_else(|| {
            tracing::warn!("QM_BIND_ADDR not set; using {DEFAULT_BIND_ADDR}");
            defaults.bind_addr
        });
        let order_prefix = lookup("QM_ORDER_PREFIX")
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .unwrap_or(defaults.order_prefix);
        let seed_file = lookup("QM_SEED_FILE").map(PathBuf::from);
        if seed_file.is_none() {
            tracing::warn!("QM_SEED_FILE not set; starting with an empty directory and catalog");
        }

        let use_persistent = lookup("USE_PERSISTENT_STORES")
            .and_then(|v| v.trim().parse::<bool>().ok())
            .unwrap_or(false);
        let database_url = if use_persistent {
            let url = lookup("DATABASE_URL").filter(|u| !u.trim().is_empty());
            if url.is_none() {
                tracing::warn!(
                    "USE_PERSISTENT_STORES=true but DATABASE_URL is not set, falling back to in-memory"
                );
            }
            url
        } else {
            None
        };

        Self {
            bind_addr,
            order_prefix,
            seed_file,
            database_url,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read seed file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid seed file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Users and catalog rows loaded at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub users: Vec<UserProfile>,
    #[serde(default)]
    pub components: Vec<CatalogItem<ComponentId>>,
    #[serde(default)]
    pub locations: Vec<CatalogItem<LocationId>>,
}

impl SeedData {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn install(
        self,
        directory: &InMemoryIdentityDirectory,
        catalog: &InMemoryCatalog,
    ) -> Result<(), ConfigError> {
        let (users, components, locations) =
            (self.users.len(), self.components.len(), self.locations.len());

        for user in self.users {
            directory.upsert(user)?;
        }
        for item in self.components {
            catalog.add_component(item.id, item.name)?;
        }
        for item in self.locations {
            catalog.add_location(item.id, item.name)?;
        }

        tracing::info!(users, components, locations, "seed data installed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use quartermaster_auth::IdentityDirectory;
    use crate::catalog::Catalog;

    #[test]
    fn missing_variables_fall_back_to_defaults() {
        let config = AppConfig::from_lookup(|_| None);
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn variables_override_defaults() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("QM_BIND_ADDR", "127.0.0.1:9000"),
            ("QM_ORDER_PREFIX", " ORG "),
            ("QM_SEED_FILE", "/etc/quartermaster/seed.json"),
        ]);
        let config = AppConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.order_prefix, "ORG");
        assert_eq!(
            config.seed_file,
            Some(PathBuf::from("/etc/quartermaster/seed.json"))
        );
        assert_eq!(config.database_url, None);
    }

    #[test]
    fn persistent_stores_need_the_flag_and_a_url() {
        let url = "postgres://qm@localhost/quartermaster";

        let vars: HashMap<&str, &str> =
            HashMap::from([("USE_PERSISTENT_STORES", "true"), ("DATABASE_URL", url)]);
        let config = AppConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.database_url.as_deref(), Some(url));

        let url_only: HashMap<&str, &str> = HashMap::from([("DATABASE_URL", url)]);
        let config = AppConfig::from_lookup(|k| url_only.get(k).map(|v| v.to_string()));
        assert_eq!(config.database_url, None);

        let flag_only: HashMap<&str, &str> = HashMap::from([("USE_PERSISTENT_STORES", "true")]);
        let config = AppConfig::from_lookup(|k| flag_only.get(k).map(|v| v.to_string()));
        assert_eq!(config.database_url, None);
    }

    #[test]
    fn seed_json_installs_users_and_catalog() {
        let user = uuid::Uuid::now_v7();
        let component = uuid::Uuid::now_v7();
        let location = uuid::Uuid::now_v7();
        let raw = serde_json::json!({
            "users": [
                { "user_id": user, "display_name": "Ashe", "roles": ["pioneer"] }
            ],
            "components": [ { "id": component, "name": "Cooler" } ],
            "locations": [ { "id": location, "name": "Area18" } ]
        });
        let seed: SeedData = serde_json::from_value(raw).unwrap();

        let directory = InMemoryIdentityDirectory::new();
        let catalog = InMemoryCatalog::new();
        seed.install(&directory, &catalog).unwrap();

        let profile = directory.profile(user.into()).unwrap();
        assert!(profile.is_pioneer());
        assert!(profile.is_active());
        assert!(catalog.has_component(component.into()));
        assert!(catalog.has_location(location.into()));
    }

    #[test]
    fn unreadable_seed_file_reports_path() {
        let err = SeedData::load(Path::new("/nonexistent/seed.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/seed.json"));
    }
}
