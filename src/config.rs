//! `rapidsql.toml` configuration.
//!
//! ```toml
//! [[connection]]
//! id = 1
//! host = "localhost"
//! database = "app"
//! user = "root"
//! password = "secret"
//! keys = { orders = "order_id" }
//!
//! [cache]
//! path = "/tmp/rapidsql-cache"
//! expire = "10 minutes"
//!
//! [pagination]
//! rpp = 25
//! ```

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::ast::ConnectionId;
use crate::backend::Connector;
use crate::cache::{Cache, Expiry};
use crate::engine::Engine;
use crate::error::{RapidError, RapidResult};
use crate::registry::ConnectionConfig;

/// File name looked up in the working directory.
pub const FILE_NAME: &str = "rapidsql.toml";

fn default_true() -> bool {
    true
}

/// Parsed configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(rename = "connection")]
    pub connections: Vec<ConnectionEntry>,
    pub cache: Option<CacheSection>,
    pub pagination: Option<PaginationSection>,
}

/// One `[[connection]]` table.
#[derive(Debug, Deserialize)]
pub struct ConnectionEntry {
    /// Integer or digit string; auto-assigned when absent
    pub id: Option<toml::Value>,
    pub host: String,
    pub port: Option<u16>,
    pub database: String,
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_true")]
    pub logging: bool,
    /// Surface recorded errors to the caller
    #[serde(default = "default_true")]
    pub errors: bool,
    /// Rows as keyed objects
    #[serde(default = "default_true")]
    pub objects: bool,
    /// Primary key overrides, table → column
    #[serde(default)]
    pub keys: BTreeMap<String, String>,
}

/// `[cache]`: file store when `path` is set, in-memory otherwise.
#[derive(Debug, Default, Deserialize)]
pub struct CacheSection {
    pub path: Option<PathBuf>,
    pub expire: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PaginationSection {
    pub rpp: Option<i64>,
    pub page: Option<i64>,
    pub next_string: Option<String>,
    pub prev_string: Option<String>,
}

impl ConnectionEntry {
    pub fn connection_id(&self) -> RapidResult<Option<ConnectionId>> {
        self.id.as_ref().map(parse_id).transpose()
    }

    pub fn to_config(&self) -> RapidResult<ConnectionConfig> {
        let mut config = ConnectionConfig::new(&self.host, &self.database, &self.user, &self.password)
            .logging(self.logging)
            .surface_errors(self.errors)
            .object_results(self.objects);
        if let Some(id) = self.connection_id()? {
            config = config.id(id);
        }
        if let Some(port) = self.port {
            config = config.port(port);
        }
        Ok(config)
    }
}

impl Config {
    pub fn from_toml(content: &str) -> RapidResult<Self> {
        toml::from_str(content).map_err(|e| RapidError::config(e.to_string()))
    }

    pub fn load(path: &Path) -> RapidResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Default lookup order: `./rapidsql.toml`, then the user config dir.
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(FILE_NAME)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("rapidsql").join("config.toml"));
        }
        paths
    }

    /// Load `explicit` if given (it must exist), else the first file found on
    /// the search path.
    pub fn discover(explicit: Option<&Path>) -> RapidResult<Option<(PathBuf, Self)>> {
        if let Some(path) = explicit {
            return Ok(Some((path.to_path_buf(), Self::load(path)?)));
        }
        for path in Self::search_paths() {
            if path.is_file() {
                let config = Self::load(&path)?;
                tracing::debug!(path = %path.display(), "loaded config");
                return Ok(Some((path, config)));
            }
        }
        Ok(None)
    }

    /// Build the configured cache, if any.
    pub fn build_cache(&self) -> RapidResult<Option<Cache>> {
        let Some(section) = &self.cache else {
            return Ok(None);
        };
        let mut cache = match &section.path {
            Some(path) => Cache::file(path),
            None => Cache::memory(),
        };
        if let Some(expire) = &section.expire {
            cache.set_expire_global(expire.parse::<Expiry>()?);
        }
        Ok(Some(cache))
    }

    /// Register connections, key overrides, cache and pagination defaults.
    pub fn apply<C: Connector>(&self, engine: &mut Engine<C>) -> RapidResult<Vec<ConnectionId>> {
        let mut ids = Vec::with_capacity(self.connections.len());
        for entry in &self.connections {
            let id = engine.register(entry.to_config()?)?;
            for (table, key) in &entry.keys {
                engine.set_key(id, table, key)?;
            }
            ids.push(id);
        }

        if let Some(cache) = self.build_cache()? {
            engine.set_cache(cache);
        }

        if let Some(section) = &self.pagination {
            let state = engine.pagination_mut();
            if let Some(rpp) = section.rpp {
                state.set_rpp(rpp);
            }
            if let Some(page) = section.page {
                state.set_page(page);
            }
            if section.next_string.is_some() {
                state.set_next_string(section.next_string.clone());
            }
            if section.prev_string.is_some() {
                state.set_prev_string(section.prev_string.clone());
            }
        }
        Ok(ids)
    }
}

fn parse_id(value: &toml::Value) -> RapidResult<ConnectionId> {
    let invalid = || RapidError::config(format!("Invalid connection ID '{}', must be an integer", value));
    match value {
        toml::Value::Integer(n) => ConnectionId::try_from(*n).map_err(|_| invalid()),
        toml::Value::String(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => {
            s.parse().map_err(|_| invalid())
        }
        _ => Err(invalid()),
    }
}
