//! Runtime settings, layered from built-in defaults, an optional file and
//! `NAGCFG_` prefixed environment variables, later layers winning.
use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::{NagcfgError, Result};
use crate::ingest::DEFAULT_BUFFER;
use crate::schema::{DEFAULT_ALIGN, DEFAULT_INDENT};

const ENV_PREFIX: &str = "NAGCFG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub indent: usize,
    /// Column where values start. Reading always treats braces up to
    /// column 31 inside a block as delimiters, so with a smaller value a
    /// value starting with `{` or `}` will not read back.
    pub align: usize,
    /// write properties in their customary order
    pub sorted: bool,
    /// align to the longest key instead of `align`; the same brace limit applies
    pub auto_align: bool,
    pub channel_buffer: usize,
    /// write back to the files objects were read from, instead of stdout
    pub split_output: bool,
    pub sources: Vec<PathBuf>,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            indent: DEFAULT_INDENT,
            align: DEFAULT_ALIGN,
            sorted: true,
            auto_align: false,
            channel_buffer: DEFAULT_BUFFER,
            split_output: true,
            sources: Vec::new(),
            log_filter: "info".to_string(),
        }
    }
}

impl Settings {
    /// Defaults, then the file at `path` if it exists (format by extension),
    /// then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::build(path, Environment::with_prefix(ENV_PREFIX))
    }

    /// Same as [`Settings::load`], with the given variables standing in for
    /// the process environment.
    pub fn load_with_env<I>(path: Option<&Path>, vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: config::Map<String, String> = vars.into_iter().collect();
        Self::build(path, Environment::with_prefix(ENV_PREFIX).source(Some(vars)))
    }

    fn build(path: Option<&Path>, environment: Environment) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }
        let environment = environment
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("sources");
        let settings: Settings = builder.add_source(environment).build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.channel_buffer == 0 {
            return Err(NagcfgError::Config("channel_buffer must be at least 1".into()));
        }
        if self.log_filter.trim().is_empty() {
            return Err(NagcfgError::Config("log_filter must not be empty".into()));
        }
        Ok(())
    }
}
