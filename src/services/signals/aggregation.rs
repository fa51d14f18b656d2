//! Maps indicator series to stances and votes an overall stance.
//!
//! Only the last two defined points of each series are inspected, so a
//! stance reflects a fresh crossover or threshold breach, not history.

use crate::types::{BandSet, CombinedSignal, IndicatorSeries, Stance};

const RSI_OVERBOUGHT: f64 = 70.0;
const RSI_OVERSOLD: f64 = 30.0;

/// SMA crossover stance.
///
/// Buy when the short average crosses above the long one between the two
/// most recent points where both are defined, sell on the downward cross.
pub fn sma_stance(short: &IndicatorSeries, long: &IndicatorSeries) -> Stance {
    let defined: Vec<(f64, f64)> = short
        .iter()
        .zip(long.iter())
        .filter_map(|(s, l)| Some(((*s)?, (*l)?)))
        .collect();

    let [.., (prev_short, prev_long), (short_now, long_now)] = defined.as_slice() else {
        return Stance::Unavailable;
    };

    if prev_short <= prev_long && short_now > long_now {
        Stance::Buy
    } else if prev_short >= prev_long && short_now < long_now {
        Stance::Sell
    } else {
        Stance::Hold
    }
}

/// RSI threshold stance from the latest defined value.
pub fn rsi_stance(series: &IndicatorSeries) -> Stance {
    match series.iter().rev().find_map(|v| *v) {
        Some(rsi) if rsi > RSI_OVERBOUGHT => Stance::Sell,
        Some(rsi) if rsi < RSI_OVERSOLD => Stance::Buy,
        Some(_) => Stance::Hold,
        None => Stance::Unavailable,
    }
}

/// Bollinger stance: price outside the latest defined band.
pub fn bb_stance(bands: &BandSet, price: Option<f64>) -> Stance {
    let latest = bands
        .upper
        .iter()
        .zip(bands.lower.iter())
        .rev()
        .find_map(|(u, l)| Some(((*u)?, (*l)?)));

    match (latest, price) {
        (Some((upper, _)), Some(price)) if price > upper => Stance::Sell,
        (Some((_, lower)), Some(price)) if price < lower => Stance::Buy,
        (Some(_), Some(_)) => Stance::Hold,
        _ => Stance::Unavailable,
    }
}

/// Strict majority vote: two agreeing votes and no opposition, else hold.
pub fn overall_stance(stances: &[Stance]) -> Stance {
    let buys = stances.iter().filter(|s| **s == Stance::Buy).count();
    let sells = stances.iter().filter(|s| **s == Stance::Sell).count();

    if buys >= 2 && sells == 0 {
        Stance::Buy
    } else if sells >= 2 && buys == 0 {
        Stance::Sell
    } else {
        Stance::Hold
    }
}

/// Combine indicator outputs into per-indicator stances and an overall vote.
pub fn combine(
    sma_short: &IndicatorSeries,
    sma_long: &IndicatorSeries,
    rsi: &IndicatorSeries,
    bands: &BandSet,
    latest_price: Option<f64>,
) -> CombinedSignal {
    let sma = sma_stance(sma_short, sma_long);
    let rsi = rsi_stance(rsi);
    let bb = bb_stance(bands, latest_price);

    CombinedSignal {
        sma,
        rsi,
        bb,
        overall: overall_stance(&[sma, rsi, bb]),
    }
}
