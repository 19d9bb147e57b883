//! Result cache.
//!
//! [`Cache`] decides freshness and derives keys; a [`CacheStore`] keeps the
//! serialized rows. Expiry, key override and key prefix set for a single
//! query reset after the next freshness check.

use once_cell::sync::Lazy;
use regex::Regex;
use sha1::{Digest, Sha1};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use crate::ast::ConnectionId;
use crate::error::{RapidError, RapidResult};
use crate::value::Params;

static KEY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\w\-]+$").expect("valid regex"));
static NON_WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w]+").expect("valid regex"));

/// How long a cached entry stays fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    Never,
    After(Duration),
}

impl Default for Expiry {
    fn default() -> Self {
        Expiry::After(Duration::from_secs(30))
    }
}

impl FromStr for Expiry {
    type Err = RapidError;

    /// Accepts `never`, `<n>` (seconds) or `<n> <unit>` with unit one of
    /// seconds, minutes, hours, days, weeks (singular or short forms too).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let invalid = || RapidError::InvalidExpire(s.to_string());
        if text.eq_ignore_ascii_case("never") {
            return Ok(Expiry::Never);
        }

        let mut parts = text.split_whitespace();
        let amount: u64 = parts.next().ok_or_else(invalid)?.parse().map_err(|_| invalid())?;
        let unit = parts.next().unwrap_or("seconds").to_ascii_lowercase();
        if parts.next().is_some() {
            return Err(invalid());
        }

        let secs = match unit.as_str() {
            "s" | "sec" | "secs" | "second" | "seconds" => 1,
            "m" | "min" | "mins" | "minute" | "minutes" => 60,
            "h" | "hour" | "hours" => 3_600,
            "d" | "day" | "days" => 86_400,
            "w" | "week" | "weeks" => 604_800,
            _ => return Err(invalid()),
        };
        let total = amount.checked_mul(secs).ok_or_else(invalid)?;
        Ok(Expiry::After(Duration::from_secs(total)))
    }
}

impl std::fmt::Display for Expiry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expiry::Never => write!(f, "never"),
            Expiry::After(d) => write!(f, "{} seconds", d.as_secs()),
        }
    }
}

/// Time source for freshness checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    base: SystemTime,
    elapsed_secs: AtomicU64,
}

impl ManualClock {
    pub fn new(base: SystemTime) -> Self {
        Self {
            base,
            elapsed_secs: AtomicU64::new(0),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.elapsed_secs.fetch_add(by.as_secs(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        self.base + Duration::from_secs(self.elapsed_secs.load(Ordering::SeqCst))
    }
}

/// Storage behind the cache.
pub trait CacheStore: Send + Sync {
    /// When `key` was written, `None` if absent.
    fn written_at(&self, key: &str) -> Option<SystemTime>;

    fn read(&self, key: &str) -> RapidResult<serde_json::Value>;

    fn write(&self, key: &str, value: &serde_json::Value, now: SystemTime) -> RapidResult<()>;

    /// Remove every entry.
    fn flush(&self) -> RapidResult<()>;
}

/// One file per key; freshness is the file's modification time.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl CacheStore for FileStore {
    fn written_at(&self, key: &str) -> Option<SystemTime> {
        std::fs::metadata(self.path(key))
            .and_then(|m| m.modified())
            .ok()
    }

    fn read(&self, key: &str) -> RapidResult<serde_json::Value> {
        let content = std::fs::read_to_string(self.path(key))
            .map_err(|_| RapidError::CacheRead(key.to_string()))?;
        serde_json::from_str(&content).map_err(|_| RapidError::CacheRead(key.to_string()))
    }

    fn write(&self, key: &str, value: &serde_json::Value, now: SystemTime) -> RapidResult<()> {
        let content = serde_json::to_string(value).map_err(|e| RapidError::cache_write(key, e))?;
        std::fs::create_dir_all(&self.dir).map_err(|e| RapidError::cache_write(key, e))?;
        std::fs::write(self.path(key), content).map_err(|e| RapidError::cache_write(key, e))?;
        std::fs::File::options()
            .write(true)
            .open(self.path(key))
            .and_then(|f| f.set_modified(now))
            .map_err(|e| RapidError::cache_write(key, e))
    }

    fn flush(&self) -> RapidResult<()> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let path = entry?.path();
            if path.is_file() {
                std::fs::remove_file(path)?;
            }
        }
        Ok(())
    }
}

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, (SystemTime, serde_json::Value)>>,
}

impl CacheStore for MemoryStore {
    fn written_at(&self, key: &str) -> Option<SystemTime> {
        let entries = self.entries.lock().ok()?;
        entries.get(key).map(|(at, _)| *at)
    }

    fn read(&self, key: &str) -> RapidResult<serde_json::Value> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| RapidError::CacheRead(key.to_string()))?;
        entries
            .get(key)
            .map(|(_, v)| v.clone())
            .ok_or_else(|| RapidError::CacheRead(key.to_string()))
    }

    fn write(&self, key: &str, value: &serde_json::Value, now: SystemTime) -> RapidResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| RapidError::cache_write(key, e))?;
        entries.insert(key.to_string(), (now, value.clone()));
        Ok(())
    }

    fn flush(&self) -> RapidResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| RapidError::cache_write("*", e))?;
        entries.clear();
        Ok(())
    }
}

/// Cache policy over a store.
pub struct Cache {
    store: Box<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    expire_global: Expiry,
    expire: Expiry,
    key: Option<String>,
    key_prefix: Option<String>,
}

impl Cache {
    pub fn new(store: impl CacheStore + 'static) -> Self {
        Self {
            store: Box::new(store),
            clock: Arc::new(SystemClock),
            expire_global: Expiry::default(),
            expire: Expiry::default(),
            key: None,
            key_prefix: None,
        }
    }

    /// File-backed cache in `dir`.
    pub fn file(dir: impl Into<PathBuf>) -> Self {
        Self::new(FileStore::new(dir))
    }

    /// In-process cache.
    pub fn memory() -> Self {
        Self::new(MemoryStore::default())
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Default expiry for every query.
    pub fn set_expire_global(&mut self, expire: Expiry) {
        self.expire_global = expire;
        self.reset();
    }

    /// Expiry for the next query only.
    pub fn set_expire(&mut self, expire: Expiry) {
        self.expire = expire;
    }

    pub fn expire(&self) -> Expiry {
        self.expire
    }

    pub fn expire_global(&self) -> Expiry {
        self.expire_global
    }

    /// Use `key` verbatim for the next query.
    pub fn set_key(&mut self, key: &str) -> RapidResult<()> {
        if !KEY_RE.is_match(key) {
            return Err(RapidError::InvalidCacheKey(key.to_string()));
        }
        self.key = Some(key.to_string());
        Ok(())
    }

    /// Prefix the derived key of the next query; non-word characters are dropped.
    pub fn set_key_prefix(&mut self, prefix: &str) {
        self.key_prefix = Some(NON_WORD_RE.replace_all(prefix, "").into_owned());
    }

    /// Key for a query: the override if set, else sha1 of connection id, SQL
    /// and parameter values, optionally prefixed.
    pub fn key(&self, connection_id: ConnectionId, sql: &str, params: &Params) -> String {
        if let Some(key) = &self.key {
            return key.clone();
        }

        let mut hasher = Sha1::new();
        hasher.update(connection_id.to_string().as_bytes());
        hasher.update(sql.as_bytes());
        for value in params.values() {
            hasher.update(value.as_text().as_bytes());
        }
        let digest = hex::encode(hasher.finalize());

        match &self.key_prefix {
            Some(prefix) => format!("{}-{}", prefix, digest),
            None => digest,
        }
    }

    /// Whether a fresh entry exists. Resets one-shot settings.
    pub fn has(&mut self, key: &str) -> bool {
        let fresh = match self.store.written_at(key) {
            None => false,
            Some(written) => match self.expire {
                Expiry::Never => true,
                Expiry::After(age) => match self.clock.now().checked_sub(age) {
                    Some(cutoff) => written >= cutoff,
                    None => true,
                },
            },
        };
        self.reset();
        fresh
    }

    pub fn read(&self, key: &str) -> RapidResult<serde_json::Value> {
        self.store.read(key)
    }

    pub fn write(&self, key: &str, value: &serde_json::Value) -> RapidResult<()> {
        self.store.write(key, value, self.clock.now())
    }

    pub fn flush(&self) -> RapidResult<()> {
        self.store.flush()
    }

    fn reset(&mut self) {
        self.expire = self.expire_global;
        self.key = None;
        self.key_prefix = None;
    }
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("expire_global", &self.expire_global)
            .field("expire", &self.expire)
            .field("key", &self.key)
            .field("key_prefix", &self.key_prefix)
            .finish()
    }
}
