use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A symbol as it appears in a provider's current listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListedSymbol {
    pub code: String,
    pub name: Option<String>,
    /// Market board: `tse`, `otc` or `esb`
    pub market: Option<String>,
    pub industry: Option<String>,
    pub security_type: Option<String>,
    pub listed_since: Option<NaiveDate>,
}

impl ListedSymbol {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: None,
            market: None,
            industry: None,
            security_type: None,
            listed_since: None,
        }
    }
}
