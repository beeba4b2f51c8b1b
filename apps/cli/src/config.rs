use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use clap::ValueEnum;

/// Where bars come from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    /// TWSE daily endpoints. Lists main board (`tse`) symbols only.
    Twse,
    /// One `<SYMBOL>_prices.csv` per symbol in a local directory.
    Csv,
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "twse" => Ok(SourceKind::Twse),
            "csv" => Ok(SourceKind::Csv),
            other => Err(format!("unknown source '{}'", other)),
        }
    }
}

pub struct Config {
    pub db_path: String,
    pub source: SourceKind,
    pub data_dir: Option<PathBuf>,
    pub concurrency: usize,
    pub max_attempts: u32,
    pub retry_base_delay: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let db_path = std::env::var("STOCKBASE_DB_PATH").unwrap_or_else(|_| "./db/stock.db".into());
        let source = std::env::var("STOCKBASE_SOURCE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(SourceKind::Twse);
        let data_dir = std::env::var("STOCKBASE_DATA_DIR").ok().map(PathBuf::from);
        let concurrency: usize = std::env::var("STOCKBASE_CONCURRENCY")
            .unwrap_or_else(|_| "2".into())
            .parse()
            .unwrap_or(2);
        let max_attempts: u32 = std::env::var("STOCKBASE_MAX_ATTEMPTS")
            .unwrap_or_else(|_| "3".into())
            .parse()
            .unwrap_or(3);
        let retry_base_ms: u64 = std::env::var("STOCKBASE_RETRY_BASE_MS")
            .unwrap_or_else(|_| "500".into())
            .parse()
            .unwrap_or(500);
        Self {
            db_path,
            source,
            data_dir,
            concurrency: concurrency.max(1),
            max_attempts: max_attempts.max(1),
            retry_base_delay: Duration::from_millis(retry_base_ms),
        }
    }

    /// Command line flags win over the environment.
    pub fn with_overrides(
        mut self,
        db_path: Option<String>,
        source: Option<SourceKind>,
        data_dir: Option<PathBuf>,
        concurrency: Option<usize>,
    ) -> Self {
        if let Some(db_path) = db_path {
            self.db_path = db_path;
        }
        if let Some(source) = source {
            self.source = source;
        }
        if data_dir.is_some() {
            self.data_dir = data_dir;
        }
        if let Some(concurrency) = concurrency {
            self.concurrency = concurrency.max(1);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_kind_parse() {
        assert_eq!("TWSE".parse::<SourceKind>(), Ok(SourceKind::Twse));
        assert_eq!(" csv ".parse::<SourceKind>(), Ok(SourceKind::Csv));
        assert!("yahoo".parse::<SourceKind>().is_err());
    }

    #[test]
    fn test_overrides_win() {
        let config = Config {
            db_path: "./db/stock.db".into(),
            source: SourceKind::Twse,
            data_dir: None,
            concurrency: 2,
            max_attempts: 3,
            retry_base_delay: Duration::from_millis(500),
        }
        .with_overrides(
            Some("/tmp/other.db".into()),
            Some(SourceKind::Csv),
            Some(PathBuf::from("/data")),
            Some(0),
        );

        assert_eq!(config.db_path, "/tmp/other.db");
        assert_eq!(config.source, SourceKind::Csv);
        assert_eq!(config.data_dir, Some(PathBuf::from("/data")));
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.max_attempts, 3);
    }
}
