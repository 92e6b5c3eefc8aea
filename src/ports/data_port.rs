//! Historical bar access port trait.

use crate::domain::error::RsitraderError;
use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDate;

/// Source of already-collected daily bars. Implementations must not fetch
/// over the network; acquisition happens before a run starts.
pub trait DataPort {
    /// Bars for `code` with `start_date <= date <= end_date`, sorted by date.
    fn fetch_ohlcv(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, RsitraderError>;

    fn list_symbols(&self) -> Result<Vec<String>, RsitraderError>;
}
