//! Market data access port trait.

use chrono::{DateTime, Utc};

use crate::domain::error::StratsimError;
use crate::domain::ohlcv::Bar;

pub trait HistoricalDataSource: Send + Sync {
    /// Bars for `symbol` within `[start, end]`, ordered by timestamp. An empty
    /// vector means no data, not an error.
    fn get_historical(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        interval: &str,
    ) -> Result<Vec<Bar>, StratsimError>;

    /// Most recent observed price for `symbol`.
    fn get_latest_price(&self, symbol: &str) -> Result<f64, StratsimError>;
}
