//! Config files on disk.
//!
//! A [`ConfigFile`] pairs a JSON or TOML config file with the JSON Schema
//! describing it, optionally backed by lower-priority fallback files such
//! as a user-wide config.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::SystemTime,
};

use anyhow::{Context, bail};
use serde_json::Value;

use crate::{SchemaClass, SerializeOptions, schema::Schema};

const DEFAULT_CONFIG_PATH: &str = ".config.toml";

/// Derive a default schema path from a config path: `app.toml` → `app-schema.json`.
pub fn default_schema_by_init(config: &Path) -> PathBuf {
    let file_name = config
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut name_split = file_name.split('.').collect::<Vec<_>>();
    if name_split.len() > 1 {
        name_split.pop();
    }

    let name = format!("{}-schema.json", name_split.join("."));

    match config.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}

/// A config file loaded through its schema.
#[derive(Debug)]
pub struct ConfigFile {
    path: PathBuf,
    schema: Arc<Schema>,
    fallbacks: Vec<PathBuf>,
    fallback_values: Vec<Value>,
    class: SchemaClass,
}

impl ConfigFile {
    /// Load a config file and its schema.
    ///
    /// `config` defaults to `.config.toml`. When `schema` is not given it is
    /// derived from the config path with [`default_schema_by_init`]. A missing
    /// or blank config file yields an empty config.
    ///
    /// # Errors
    ///
    /// Fails when the schema file is missing or invalid, or when the config
    /// file cannot be parsed or does not fit the schema.
    pub fn open(
        config: Option<impl AsRef<Path>>,
        schema: Option<impl AsRef<Path>>,
    ) -> anyhow::Result<Self> {
        let path = Self::config_path(config);
        let schema_path = match schema {
            Some(s) => s.as_ref().to_path_buf(),
            None => default_schema_by_init(&path),
        };

        if !schema_path.exists() {
            bail!("Schema file does not exist: {}", schema_path.display());
        }

        let content = fs::read_to_string(&schema_path)
            .with_context(|| format!("Failed to read {}", schema_path.display()))?;
        let schema: Value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", schema_path.display()))?;
        Self::with_schema(Some(path), &schema)
    }

    /// Load a config file against an in-memory schema.
    pub fn with_schema(config: Option<impl AsRef<Path>>, schema: &Value) -> anyhow::Result<Self> {
        let path = Self::config_path(config);
        let schema = Schema::parse(schema).context("Invalid config schema")?;
        let value = read_value(&path)?.unwrap_or_else(|| Value::Object(Default::default()));
        let class = SchemaClass::from_schema(schema.clone(), value, Vec::new())
            .with_context(|| format!("Invalid config {}", path.display()))?;

        Ok(Self {
            path,
            schema,
            fallbacks: Vec::new(),
            fallback_values: Vec::new(),
            class,
        })
    }

    fn config_path(config: Option<impl AsRef<Path>>) -> PathBuf {
        match config {
            Some(cfg) => cfg.as_ref().to_path_buf(),
            None => PathBuf::from(DEFAULT_CONFIG_PATH),
        }
    }

    /// Add a lower-priority fallback file, below any added before.
    ///
    /// The tree is rebuilt from the loaded primary file, so unsaved changes
    /// are discarded. A missing fallback file is skipped.
    pub fn with_fallback(mut self, path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        match read_value(&path)? {
            Some(value) => {
                debug!("using fallback config {}", path.display());
                self.fallback_values.push(value);
                self.fallbacks.push(path.clone());
            }
            None => {
                debug!("fallback config {} is absent", path.display());
                return Ok(self);
            }
        }

        self.class = SchemaClass::from_schema(
            self.schema.clone(),
            self.class.original().clone(),
            self.fallback_values.clone(),
        )
        .with_context(|| format!("Invalid fallback config {}", path.display()))?;
        Ok(self)
    }

    /// Location of the primary config file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fallback files in priority order.
    pub fn fallbacks(&self) -> &[PathBuf] {
        &self.fallbacks
    }

    /// The loaded tree.
    pub fn class(&self) -> &SchemaClass {
        &self.class
    }

    /// The loaded tree, for edits that [`ConfigFile::save`] writes back.
    pub fn class_mut(&mut self) -> &mut SchemaClass {
        &mut self.class
    }

    /// Give up the file binding and keep the tree.
    pub fn into_class(self) -> SchemaClass {
        self.class
    }

    /// Write pending changes, keeping a timestamped copy of the previous file.
    ///
    /// Only values held by the primary tree are written; fallback and default
    /// values stay where they came from. Returns whether anything was written.
    pub fn save(&mut self) -> anyhow::Result<bool> {
        if !self.class.is_dirty() {
            return Ok(false);
        }
        let ext = extension(&self.path);

        let text = self
            .class
            .serialize("application/json", &SerializeOptions::default().with_indent(0))?;
        let value: Value = if text.is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(&text)?
        };

        let s = match ext {
            "toml" | "tml" => toml::to_string_pretty(&value)
                .with_context(|| format!("Cannot represent config as TOML: {}", self.path.display()))?,
            "json" => serde_json::to_string_pretty(&value)?,
            _ => {
                bail!("Unsupported config file extension: {ext:?}");
            }
        };

        if self.path.exists() {
            let bk = format!(
                "bk-{}.{ext}",
                SystemTime::now()
                    .duration_since(SystemTime::UNIX_EPOCH)?
                    .as_secs()
            );

            let backup_path = self.path.with_extension(bk);
            fs::copy(&self.path, &backup_path)
                .with_context(|| format!("Failed to back up {}", self.path.display()))?;
            info!("backup written to {}", backup_path.display());
        }
        fs::write(&self.path, s).with_context(|| format!("Failed to write {}", self.path.display()))?;
        info!("config saved to {}", self.path.display());

        self.class = SchemaClass::from_schema(self.schema.clone(), value, self.fallback_values.clone())?;
        Ok(true)
    }
}

fn extension(path: &Path) -> &str {
    path.extension().and_then(|s| s.to_str()).unwrap_or("")
}

/// Read a config file as a JSON value. Absent and blank files give `None`.
fn read_value(path: &Path) -> anyhow::Result<Option<Value>> {
    if !path.exists() {
        return Ok(None);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    if content.trim().is_empty() {
        return Ok(None);
    }

    let value = match extension(path) {
        "json" => serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?,
        "toml" | "tml" => {
            let v: toml::Value = toml::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?;
            serde_json::to_value(v)?
        }
        ext => {
            bail!("Unsupported config file extension: {ext:?}");
        }
    };
    Ok(Some(value))
}
