//! Full indicator pass for one instrument.

use crate::config::IndicatorConfig;
use crate::error::AppError;
use crate::types::{closes, AnalysisSnapshot, PricePoint};

use super::aggregation::combine;
use super::indicators::{bollinger, rsi, sma};

/// Check whether `available` points satisfy every indicator's lookback.
pub fn check_history(available: usize, config: &IndicatorConfig) -> Result<(), AppError> {
    let required = config.min_history();
    if available < required {
        return Err(AppError::InsufficientHistory {
            required,
            available,
        });
    }
    Ok(())
}

/// Compute all indicators and the combined signal for a price sequence.
///
/// Short histories degrade individual indicators to `unavailable` rather
/// than failing the whole snapshot.
pub fn analyze(
    symbol: &str,
    mut prices: Vec<PricePoint>,
    config: &IndicatorConfig,
    computed_at: i64,
) -> AnalysisSnapshot {
    prices.sort_by_key(|p| p.time);
    let values = closes(&prices);

    let sma_short_series = sma(&values, config.sma_short_period);
    let sma_long_series = sma(&values, config.sma_long_period);
    let rsi_series = rsi(&values, config.rsi_period);
    let bollinger_bands = bollinger(&values, config.bb_period, config.bb_std_dev);

    let signal = combine(
        &sma_short_series,
        &sma_long_series,
        &rsi_series,
        &bollinger_bands,
        values.last().copied(),
    );

    let error = check_history(values.len(), config)
        .err()
        .map(|e| e.to_string());

    AnalysisSnapshot {
        symbol: symbol.to_string(),
        overall: signal.overall,
        sma: signal.sma,
        rsi: signal.rsi,
        bb: signal.bb,
        prices,
        sma_short_series,
        sma_long_series,
        bollinger_bands,
        rsi_series,
        computed_at: Some(computed_at),
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Stance;

    fn small_config() -> IndicatorConfig {
        IndicatorConfig {
            sma_short_period: 3,
            sma_long_period: 5,
            rsi_period: 5,
            bb_period: 5,
            bb_std_dev: 2.0,
        }
    }

    fn points(values: &[f64]) -> Vec<PricePoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| PricePoint::new(1_000 + i as i64 * 60_000, *v))
            .collect()
    }

    #[test]
    fn test_series_aligned_with_prices() {
        let snapshot = analyze(
            "BTCUSDT",
            points(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]),
            &small_config(),
            0,
        );
        let len = snapshot.prices.len();
        assert_eq!(snapshot.sma_short_series.len(), len);
        assert_eq!(snapshot.sma_long_series.len(), len);
        assert_eq!(snapshot.rsi_series.len(), len);
        assert_eq!(snapshot.bollinger_bands.upper.len(), len);
        assert!(snapshot.error.is_none());
    }

    #[test]
    fn test_unsorted_input_is_ordered() {
        let mut prices = points(&[1.0, 2.0, 3.0]);
        prices.reverse();
        let snapshot = analyze("ETHUSDT", prices, &small_config(), 0);
        let times: Vec<i64> = snapshot.prices.iter().map(|p| p.time).collect();
        assert!(times.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_short_history_degrades() {
        let snapshot = analyze("SOLUSDT", points(&[1.0, 2.0]), &small_config(), 42);
        assert_eq!(snapshot.overall, Stance::Hold);
        assert_eq!(snapshot.sma, Stance::Unavailable);
        assert_eq!(snapshot.rsi, Stance::Unavailable);
        assert_eq!(snapshot.bb, Stance::Unavailable);
        assert_eq!(snapshot.computed_at, Some(42));
        assert!(snapshot.error.unwrap().contains("Insufficient history"));
    }

    #[test]
    fn test_steady_rally_reads_overbought() {
        let values: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        let snapshot = analyze("BNBUSDT", points(&values), &small_config(), 0);
        assert_eq!(snapshot.rsi, Stance::Sell);
        assert!(snapshot.signal().overall != Stance::Buy);
    }

    #[test]
    fn test_check_history() {
        let config = small_config();
        assert!(check_history(6, &config).is_ok());
        assert!(matches!(
            check_history(4, &config),
            Err(AppError::InsufficientHistory { required: 6, available: 4 })
        ));
    }
}
