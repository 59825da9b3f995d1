//! Reshapes a Trading 212 CSV export into what Digrin imports.
//!
//! Keeps market buys and sells only, drops blacklisted tickers, and rewrites
//! tickers that Digrin lists under an exchange suffix. All other columns pass
//! through unchanged.
//!
//! The ticker rules follow the same compile-time `include_str!` seed file
//! pattern as the other data-driven mappings.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;
use thiserror::Error;

/// `Action` values that survive the transform.
pub const KEPT_ACTIONS: &[&str] = &["Market buy", "Market sell"];

pub const ACTION_COLUMN: &str = "Action";
pub const TICKER_COLUMN: &str = "Ticker";

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Failed to parse ticker rules YAML: {0}")]
    YamlParse(#[from] serde_yml::Error),
    #[error("Duplicate 'from' ticker in alias file: {0}")]
    DuplicateFrom(String),
    #[error("Export is missing the '{0}' column")]
    MissingColumn(&'static str),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Deserialize, Debug)]
struct TickerRulesFile {
    #[serde(default)]
    blacklist: Vec<BlacklistEntry>,
    #[serde(default)]
    aliases: Vec<TickerAlias>,
}

#[derive(Deserialize, Debug)]
struct BlacklistEntry {
    ticker: String,
    #[allow(dead_code)]
    reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct TickerAlias {
    from: String,
    to: String,
}

/// Blacklist and rename map applied to the `Ticker` column.
#[derive(Debug, Clone, Default)]
pub struct TickerRules {
    blacklist: HashSet<String>,
    aliases: HashMap<String, String>,
}

impl TickerRules {
    pub fn new(blacklist: HashSet<String>, aliases: HashMap<String, String>) -> Self {
        Self { blacklist, aliases }
    }

    /// Parses rules from YAML content. Duplicate alias sources are rejected.
    pub fn from_yaml(yaml_content: &str) -> Result<Self, TransformError> {
        let file: TickerRulesFile = serde_yml::from_str(yaml_content)?;

        let mut aliases = HashMap::new();
        for alias in file.aliases {
            if aliases.contains_key(&alias.from) {
                return Err(TransformError::DuplicateFrom(alias.from));
            }
            aliases.insert(alias.from, alias.to);
        }
        let blacklist = file.blacklist.into_iter().map(|entry| entry.ticker).collect();

        Ok(Self { blacklist, aliases })
    }

    /// Loads the rules embedded from `seed_data/digrin_tickers.yml`.
    pub fn load_default() -> Result<Self, TransformError> {
        let yaml_content = include_str!("../../seed_data/digrin_tickers.yml");
        Self::from_yaml(yaml_content)
    }

    pub fn is_blacklisted(&self, ticker: &str) -> bool {
        self.blacklist.contains(ticker)
    }

    /// The Digrin ticker for `ticker`, unchanged when there is no alias.
    pub fn map_ticker<'a>(&'a self, ticker: &'a str) -> &'a str {
        self.aliases.get(ticker).map(String::as_str).unwrap_or(ticker)
    }
}

/// Result of [`transform_to_digrin`].
#[derive(Debug, Clone)]
pub struct TransformOutput {
    pub csv: Vec<u8>,
    pub rows_in: usize,
    pub rows_out: usize,
}

/// Filters and remaps raw export bytes. The header row is kept as-is.
pub fn transform_to_digrin(raw: &[u8], rules: &TickerRules) -> Result<TransformOutput, TransformError> {
    let mut reader = csv::Reader::from_reader(raw);
    let headers = reader.headers()?.clone();
    let action_idx = column_index(&headers, ACTION_COLUMN)?;
    let ticker_idx = column_index(&headers, TICKER_COLUMN)?;

    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(&headers)?;

    let mut rows_in = 0usize;
    let mut rows_out = 0usize;
    for result in reader.records() {
        let record = result?;
        rows_in += 1;

        let action = record.get(action_idx).unwrap_or_default();
        if !KEPT_ACTIONS.contains(&action) {
            continue;
        }
        let ticker = record.get(ticker_idx).unwrap_or_default();
        if rules.is_blacklisted(ticker) {
            continue;
        }

        let mapped = rules.map_ticker(ticker);
        let row: csv::StringRecord = record
            .iter()
            .enumerate()
            .map(|(idx, field)| if idx == ticker_idx { mapped } else { field })
            .collect();
        writer.write_record(&row)?;
        rows_out += 1;
    }

    let csv = writer
        .into_inner()
        .map_err(|e| TransformError::Csv(e.into_error().into()))?;

    tracing::debug!(rows_in, rows_out, "Transformed export for Digrin");
    Ok(TransformOutput {
        csv,
        rows_in,
        rows_out,
    })
}

fn column_index(headers: &csv::StringRecord, name: &'static str) -> Result<usize, TransformError> {
    headers
        .iter()
        .position(|header| header.trim_start_matches('\u{feff}').trim() == name)
        .ok_or(TransformError::MissingColumn(name))
}
