use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::PricePoint;

/// Indicator output aligned index-for-index with its input prices.
/// `None` marks positions without enough lookback.
pub type IndicatorSeries = Vec<Option<f64>>;

/// Stance of a single indicator, or of the combined signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Stance {
    Buy,
    Sell,
    #[default]
    Hold,
    /// Not enough data to form an opinion. Never counts as a vote.
    Unavailable,
}

impl Stance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stance::Buy => "buy",
            Stance::Sell => "sell",
            Stance::Hold => "hold",
            Stance::Unavailable => "unavailable",
        }
    }

    pub fn is_available(&self) -> bool {
        !matches!(self, Stance::Unavailable)
    }
}

impl fmt::Display for Stance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buy" => Ok(Stance::Buy),
            "sell" => Ok(Stance::Sell),
            "hold" => Ok(Stance::Hold),
            "unavailable" | "n/a" | "na" => Ok(Stance::Unavailable),
            other => Err(format!("unknown stance '{}'", other)),
        }
    }
}

/// Bollinger Bands as three parallel series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BandSet {
    pub middle: IndicatorSeries,
    pub upper: IndicatorSeries,
    pub lower: IndicatorSeries,
}

/// Per-indicator stances and the combined vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombinedSignal {
    pub sma: Stance,
    pub rsi: Stance,
    pub bb: Stance,
    /// Always one of buy, sell or hold.
    pub overall: Stance,
}

impl CombinedSignal {
    /// Signal used when no usable market data exists.
    pub fn unavailable() -> Self {
        Self {
            sma: Stance::Unavailable,
            rsi: Stance::Unavailable,
            bb: Stance::Unavailable,
            overall: Stance::Hold,
        }
    }

    pub fn indicators(&self) -> [Stance; 3] {
        [self.sma, self.rsi, self.bb]
    }

    /// True when any indicator could not be evaluated.
    pub fn is_degraded(&self) -> bool {
        self.indicators().iter().any(|s| !s.is_available())
    }
}

impl Default for CombinedSignal {
    fn default() -> Self {
        Self::unavailable()
    }
}

/// Full analysis payload for one instrument, replaced wholesale each cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSnapshot {
    pub symbol: String,
    pub overall: Stance,
    pub sma: Stance,
    pub rsi: Stance,
    pub bb: Stance,
    pub prices: Vec<PricePoint>,
    pub sma_short_series: IndicatorSeries,
    pub sma_long_series: IndicatorSeries,
    pub bollinger_bands: BandSet,
    pub rsi_series: IndicatorSeries,
    /// Unix timestamp (milliseconds) of computation, absent if never computed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub computed_at: Option<i64>,
    /// Why the snapshot is degraded, if it is.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalysisSnapshot {
    /// Snapshot returned for instruments never analyzed or whose data failed to load.
    pub fn empty(symbol: &str) -> Self {
        let signal = CombinedSignal::unavailable();
        Self {
            symbol: symbol.to_string(),
            overall: signal.overall,
            sma: signal.sma,
            rsi: signal.rsi,
            bb: signal.bb,
            prices: Vec::new(),
            sma_short_series: Vec::new(),
            sma_long_series: Vec::new(),
            bollinger_bands: BandSet::default(),
            rsi_series: Vec::new(),
            computed_at: None,
            error: None,
        }
    }

    pub fn signal(&self) -> CombinedSignal {
        CombinedSignal {
            sma: self.sma,
            rsi: self.rsi,
            bb: self.bb,
            overall: self.overall,
        }
    }

    pub fn last_price(&self) -> Option<f64> {
        self.prices.last().map(|p| p.value)
    }
}
