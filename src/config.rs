use std::{fs, io, path::{Path, PathBuf}, time::Duration};

use serde::Deserialize;
use tracing::{debug, info};
use url::Url;
use validator::{Validate, ValidationError};

use crate::{
    clean::ExclusionRules,
    driver::Locator,
    error::ConfigError,
    page_scrapers::ListPosition,
    record::safe_term
};

pub(crate) const DEFAULT_CONFIG_PATH: &str = "config.toml";
const DEFAULT_CONFIG: &str = include_str!("default_config.toml");


/// Everything the scraper, consolidator and cleaner can be told.
///
/// Built from the embedded defaults with the user's config file laid over them, key by key.
#[derive(Debug, Deserialize, Validate)]
pub(crate) struct Config {
    #[validate]
    pub(crate) paths: PathsConfig,
    #[validate]
    pub(crate) scrape: ScrapeConfig,
    #[validate]
    pub(crate) site: SiteConfig,
    pub(crate) timing: TimingConfig,
    pub(crate) cleaning: ExclusionRules
}

impl Config {
    pub(crate) fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut table: toml::Table = toml::from_str(DEFAULT_CONFIG)?;
        match fs::read_to_string(path) {
            Ok(text) => {
                merge_tables(&mut table, toml::from_str(&text)?);
                info!("Loaded configuration from {}", path.display());
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No {}, using built-in configuration", path.display());
            }
            Err(source) => return Err(ConfigError::Read { path: path.to_path_buf(), source })
        }
        Self::from_table(table)
    }

    fn from_table(table: toml::Table) -> Result<Self, ConfigError> {
        let config: Self = toml::Value::Table(table).try_into()?;
        config.validate()?;
        Ok(config)
    }
}

/// Keys whose table value picks one enum variant, so a user table replaces the default outright.
const WHOLE_TABLES: [&str; 2] = ["site.lists.tasks", "site.lists.skills"];

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    merge_tables_at(base, overlay, "");
}

fn merge_tables_at(base: &mut toml::Table, overlay: toml::Table, prefix: &str) {
    for (key, value) in overlay {
        let path = if prefix.is_empty() { key.clone() } else { format!("{prefix}.{key}") };
        if let toml::Value::Table(overlay) = value {
            if !WHOLE_TABLES.contains(&path.as_str()) {
                if let Some(toml::Value::Table(inner)) = base.get_mut(&key) {
                    merge_tables_at(inner, overlay, &path);
                    continue;
                }
            }
            base.insert(key, toml::Value::Table(overlay));
        } else {
            base.insert(key, value);
        }
    }
}


#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "ascii_delimiter"))]
pub(crate) struct PathsConfig {
    /// Root of `raw/` (session and master files) and `processed/` (cleaned files).
    pub(crate) data_dir: PathBuf,
    pub(crate) delimiter: char
}

fn ascii_delimiter(paths: &PathsConfig) -> Result<(), ValidationError> {
    if paths.delimiter.is_ascii() && !paths.delimiter.is_ascii_alphanumeric() && paths.delimiter != '"' {
        Ok(())
    } else {
        Err(ValidationError::new("delimiter must be a single ASCII punctuation or whitespace character"))
    }
}

impl PathsConfig {
    pub(crate) fn delimiter(&self) -> u8 {
        // ASCII is checked on load
        self.delimiter as u8
    }

    pub(crate) fn raw_dir(&self) -> PathBuf {
        self.data_dir.join("raw")
    }

    pub(crate) fn processed_dir(&self) -> PathBuf {
        self.data_dir.join("processed")
    }

    pub(crate) fn session_file(&self, search_term: &str) -> PathBuf {
        self.raw_dir().join(format!("jobs_ch_{}_skills.csv", safe_term(search_term)))
    }

    pub(crate) fn master_file(&self) -> PathBuf {
        self.raw_dir().join("jobs_ch_skills_all.csv")
    }

    /// Master dataset with only records lacking both tasks and skills removed.
    pub(crate) fn intermediate_file(&self) -> PathBuf {
        self.processed_dir().join("jobs_ch_skills_all_intermediate.csv")
    }

    pub(crate) fn final_file(&self) -> PathBuf {
        self.processed_dir().join("jobs_ch_skills_all_cleaned_final.csv")
    }
}


#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ScrapeConfig {
    /// Used when the command line does not give a count.
    #[validate(range(min = 1))]
    pub(crate) max_jobs: u32
}


#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SiteConfig {
    pub(crate) base_url: Url,
    /// Falls back to a desktop Chrome user agent for the current platform.
    #[validate(length(min = 1))]
    pub(crate) user_agent: Option<String>,
    pub(crate) headless: bool,
    pub(crate) sandbox: bool,
    pub(crate) search_field: Locator,
    pub(crate) listing_link: Locator,
    /// Looked up inside a listing link.
    pub(crate) listing_title: Locator,
    /// Looked up inside a listing link.
    pub(crate) listing_company: Locator,
    /// Looked up inside a listing link.
    pub(crate) listing_location: Locator,
    pub(crate) next_page: Locator,
    /// Cookie and promotion banners, clicked away in order if they show up.
    pub(crate) consent_buttons: Vec<Locator>,
    #[validate]
    pub(crate) lists: ListsConfig
}


#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "one_based_positions"))]
pub(crate) struct ListsConfig {
    /// CSS selector of the containers holding task and skill bullet points.
    #[validate(length(min = 1))]
    pub(crate) container: String,
    /// CSS selector of one bullet point inside a container.
    #[validate(length(min = 1))]
    pub(crate) item: String,
    pub(crate) tasks: ListPosition,
    pub(crate) skills: ListPosition
}

fn one_based_positions(lists: &ListsConfig) -> Result<(), ValidationError> {
    if lists.tasks.is_valid() && lists.skills.is_valid() {
        Ok(())
    } else {
        Err(ValidationError::new("list positions start at 1"))
    }
}


/// Bounded waits and fixed settle pauses, in milliseconds.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TimingConfig {
    pub(crate) wait_ms: u64,
    pub(crate) consent_wait_ms: u64,
    pub(crate) settle_search_ms: u64,
    pub(crate) settle_scroll_ms: u64,
    pub(crate) settle_detail_ms: u64,
    pub(crate) settle_page_ms: u64
}

impl TimingConfig {
    /// Upper bound for any poll on an element.
    pub(crate) fn wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }

    pub(crate) fn consent_wait(&self) -> Duration {
        Duration::from_millis(self.consent_wait_ms)
    }

    pub(crate) fn settle_search(&self) -> Duration {
        Duration::from_millis(self.settle_search_ms)
    }

    pub(crate) fn settle_scroll(&self) -> Duration {
        Duration::from_millis(self.settle_scroll_ms)
    }

    pub(crate) fn settle_detail(&self) -> Duration {
        Duration::from_millis(self.settle_detail_ms)
    }

    pub(crate) fn settle_page(&self) -> Duration {
        Duration::from_millis(self.settle_page_ms)
    }
}


#[cfg(test)]
pub(crate) fn test_config(data_dir: &Path) -> Config {
    let mut table: toml::Table = toml::from_str(DEFAULT_CONFIG).unwrap();
    merge_tables(&mut table, toml::from_str(&format!(
        "[paths]\ndata_dir = {:?}\n[timing]\nwait_ms = 0\nconsent_wait_ms = 0\nsettle_search_ms = 0\nsettle_scroll_ms = 0\nsettle_detail_ms = 0\nsettle_page_ms = 0\n",
        data_dir.display().to_string()
    )).unwrap());
    Config::from_table(table).unwrap()
}
