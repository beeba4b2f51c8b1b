use serde::{Deserialize, Serialize};

/// One daily row exactly as a provider returned it.
///
/// Every field is kept as text. Sources disagree on date formats
/// (ISO, `YYYYMMDD`, ROC calendar), thousands separators and placeholders
/// such as `--` for halted sessions, so the ingestion layer owns parsing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawBar {
    /// Trading date in whatever format the source uses
    pub date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close: Option<String>,
    /// Traded shares
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<String>,
}

impl RawBar {
    /// Create a row with every OHLCV field present.
    pub fn ohlcv(
        date: impl Into<String>,
        open: impl Into<String>,
        high: impl Into<String>,
        low: impl Into<String>,
        close: impl Into<String>,
        volume: impl Into<String>,
    ) -> Self {
        Self {
            date: date.into(),
            open: Some(open.into()),
            high: Some(high.into()),
            low: Some(low.into()),
            close: Some(close.into()),
            volume: Some(volume.into()),
        }
    }
}
