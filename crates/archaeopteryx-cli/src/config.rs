//! Configuration loading.
//!
//! Sources, lowest to highest priority:
//! 1. command-line flags (which carry the defaults for anything unset)
//! 2. `ARCHAEOPTERYX_*` environment variables
//! 3. `archaeopteryx.json` in the served root
//!
//! ```json
//! {
//!   "port": 3000,
//!   "noReload": true,
//!   "entry": "app.html",
//!   "before": ["log", "trailing-slash"]
//! }
//! ```

use crate::cli::Cli;
use crate::error::{CliError, ConfigError, Result, ResultExt};
use archaeopteryx::ServerConfig;
use figment::{
    Figment,
    providers::{Env, Format as _, Json, Serialized},
    value::Dict,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

/// Prefix for environment overrides, e.g. `ARCHAEOPTERYX_PORT=9000`.
pub const ENV_PREFIX: &str = "ARCHAEOPTERYX_";

/// Everything the CLI needs to start a server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(flatten)]
    pub server: ServerConfig,

    /// Interceptor names for the before pipeline
    #[serde(default, deserialize_with = "one_or_many")]
    pub before: Vec<String>,

    /// Interceptor names for the after pipeline
    #[serde(default, deserialize_with = "one_or_many")]
    pub after: Vec<String>,
}

impl AppConfig {
    /// Load configuration from flags, environment and `archaeopteryx.json`.
    ///
    /// # Errors
    ///
    /// Returns error if the config file cannot be read or any source holds
    /// a value of the wrong type.
    pub fn load(cli: &Cli) -> Result<Self> {
        let defaults = Self::from_cli(cli);
        let config_file = defaults.server.config_file_path();

        let mut figment = Figment::new()
            .merge(Serialized::defaults(&defaults))
            .merge(
                Env::prefixed(ENV_PREFIX)
                    .map(|key| canonical_key(&camel_case(key.as_str())).into())
                    .lowercase(false),
            );

        let has_file = config_file.is_file();
        if has_file {
            figment = figment.merge(Serialized::defaults(read_config_file(&config_file)?));
        }

        figment.extract().map_err(|e| {
            if has_file {
                invalid_file(&config_file, e)
            } else {
                ConfigError::InvalidSettings(e.to_string()).into()
            }
        })
    }

    /// Settings taken from flags alone.
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            server: ServerConfig {
                root: cli.root.clone(),
                port: cli.port,
                hostname: cli.hostname.clone(),
                silent: cli.silent,
                debug: cli.debug,
                disable_reload: cli.no_reload,
                secure: cli.secure,
                cors: cli.cors,
                dont_list: cli.files_only,
                allow_absolute: cli.allow_absolute,
                cert_file: cli.cert_file.clone(),
                key_file: cli.key_file.clone(),
                entry_point: cli.entry.clone(),
            },
            before: cli.before.clone(),
            after: cli.after.clone(),
        }
    }
}

/// Alternate spellings accepted in `archaeopteryx.json` and the environment.
const KEY_ALIASES: &[(&str, &str)] = &[
    ("noReload", "disableReload"),
    ("filesOnly", "dontList"),
    ("entry", "entryPoint"),
];

/// Map an alternate key onto its field name. Both spellings in one merged
/// document would otherwise be a duplicate field.
fn canonical_key(key: &str) -> String {
    KEY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map_or(key, |(_, field)| *field)
        .to_string()
}

fn read_config_file(path: &Path) -> Result<Dict> {
    let contents = std::fs::read_to_string(path).with_path(path)?;
    let dict: Dict = Figment::from(Json::string(&contents))
        .extract()
        .map_err(|e| invalid_file(path, e))?;

    Ok(dict
        .into_iter()
        .map(|(key, value)| (canonical_key(&key), value))
        .collect())
}

fn invalid_file(path: &Path, err: figment::Error) -> CliError {
    ConfigError::InvalidFile {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
    .into()
}

/// `DISABLE_RELOAD` → `disableReload`
fn camel_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper = false;
    for c in key.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.extend(c.to_lowercase());
        }
    }
    out
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

/// Accept `"log"` as well as `["log", "no-query"]`.
fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(name) => vec![name],
        OneOrMany::Many(names) => names,
    })
}
