use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Optional `mdlg.toml` settings
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct MdlgConfig {
    /// Data root holding the database and the dumps
    pub root: Option<String>,
    /// Database file, relative to the root unless absolute
    pub database: Option<String>,
    /// Dump directory, relative to the root unless absolute
    pub dumps: Option<String>,
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("mdlg.toml")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<MdlgConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: MdlgConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

/// Where the catalog keeps its files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    pub root: PathBuf,
    pub database: PathBuf,
    pub dumps: PathBuf,
}

impl DataLayout {
    /// Default layout: `<root>/mdlg.db` and `<root>/import/mandragore-dumps`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            database: root.join("mdlg.db"),
            dumps: root.join("import").join("mandragore-dumps"),
            root,
        }
    }

    /// Resolve the root (flag, config file, environment, then current
    /// directory) and apply the config overrides
    pub fn resolve(flag: Option<PathBuf>, config: Option<&MdlgConfig>, env: Option<PathBuf>) -> Self {
        let root = flag
            .or_else(|| config.and_then(|c| c.root.as_ref()).map(PathBuf::from))
            .or(env)
            .unwrap_or_else(|| PathBuf::from("."));

        let mut layout = Self::new(root);
        if let Some(config) = config {
            if let Some(database) = &config.database {
                layout.database = layout.root.join(database);
            }
            if let Some(dumps) = &config.dumps {
                layout.dumps = layout.root.join(dumps);
            }
        }
        layout
    }

    /// Create the root and dump directories, and the database parent
    pub fn ensure_dirs(&self) -> anyhow::Result<()> {
        for dir in [&self.root, &self.dumps] {
            if !dir.exists() {
                std::fs::create_dir_all(dir)?;
            }
        }
        ensure_db_dir(&self.database)
    }
}

pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
