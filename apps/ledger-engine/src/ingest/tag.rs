//! Correlation tag resolution helpers.
//!
//! Run-scoped orders carry a structured tag
//! (`<namespace>:<run-id>:<index>:<symbol>`); directly-placed orders are
//! identified by the `direct_<order-id>` directory their event log lives
//! in.

use std::fmt;
use std::path::Path;

/// A parsed run-scoped correlation tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunTag {
    /// Tag namespace.
    pub namespace: String,
    /// Owning run id.
    pub run_id: String,
    /// Order index within the run.
    pub index: u32,
    /// Symbol.
    pub symbol: String,
}

impl RunTag {
    /// Parse a `<namespace>:<run-id>:<index>:<symbol>` tag.
    #[must_use]
    pub fn parse(tag: &str) -> Option<Self> {
        let mut parts = tag.split(':');
        let namespace = parts.next()?;
        let run_id = parts.next()?;
        let index = parts.next()?.parse().ok()?;
        let symbol = parts.next()?;
        if parts.next().is_some()
            || namespace.is_empty()
            || run_id.is_empty()
            || symbol.is_empty()
        {
            return None;
        }
        Some(Self {
            namespace: namespace.to_string(),
            run_id: run_id.to_string(),
            index,
            symbol: symbol.to_string(),
        })
    }
}

impl fmt::Display for RunTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.namespace, self.run_id, self.index, self.symbol
        )
    }
}

/// Extract the order id embedded in a `direct_<order-id>` path component,
/// searching from the log file upwards.
#[must_use]
pub fn direct_order_id(path: &Path, prefix: &str) -> Option<String> {
    path.components().rev().find_map(|component| {
        let name = component.as_os_str().to_str()?;
        name.strip_prefix(prefix)
            .filter(|id| !id.is_empty())
            .map(ToString::to_string)
    })
}
