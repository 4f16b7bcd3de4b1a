// settings are read from an optional facetdb.toml next to the process and FACETDB_* variables
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const CONFIG_FILE: &str = "facetdb";
pub const ENV_PREFIX: &str = "FACETDB";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Filter directives for the tracing subscriber, `RUST_LOG` wins when set.
    pub log_filter: String,
    /// Listener rounds run for one change before deferred updates are dropped.
    pub max_notification_rounds: usize,
    /// Bounds on the number of buckets an auto-scaled numeric facet shows.
    pub min_buckets: usize,
    pub max_buckets: usize,
    /// Label of the choice standing for items without a value.
    pub missing_label: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_filter: "facetdb=info".to_string(),
            max_notification_rounds: 4,
            min_buckets: 2,
            max_buckets: 20,
            missing_label: "(missing this field)".to_string(),
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        Self::load_from(CONFIG_FILE)
    }
    /// Reads the named file (any format the config crate knows, extension optional)
    /// and then the environment, each overriding the defaults.
    pub fn load_from(name: &str) -> Result<Self> {
        let settings: Settings = Config::builder()
            .add_source(File::with_name(name).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;
        settings.validated()
    }
    fn validated(mut self) -> Result<Self> {
        if self.min_buckets == 0 {
            self.min_buckets = 1;
        }
        if self.max_buckets < self.min_buckets {
            return Err(crate::error::FacetError::Config(format!(
                "max_buckets ({}) is below min_buckets ({})",
                self.max_buckets, self.min_buckets
            )));
        }
        if self.max_notification_rounds == 0 {
            self.max_notification_rounds = 1;
        }
        Ok(self)
    }
}
