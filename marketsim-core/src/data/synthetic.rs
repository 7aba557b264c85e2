//! Seeded synthetic price series for demos and tests.

use crate::domain::Bar;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Generate a daily random-walk OHLCV series. Deterministic for a given
/// seed: same inputs, same bars.
pub fn random_walk(
    symbol: &str,
    start: DateTime<Utc>,
    bars: usize,
    start_price: f64,
    daily_volatility: f64,
    seed: u64,
) -> Vec<Bar> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut series = Vec::with_capacity(bars);
    let mut price = start_price;

    for day in 0..bars {
        let drift: f64 = rng.gen_range(-daily_volatility..daily_volatility);
        let open = price;
        let close = (price * (1.0 + drift)).max(0.01);
        let spread = rng.gen_range(0.0..daily_volatility) * price;
        let high = open.max(close) + spread;
        let low = (open.min(close) - spread).max(0.01);
        let volume = rng.gen_range(10_000.0..1_000_000.0);

        series.push(Bar {
            symbol: symbol.to_string(),
            timestamp: start + Duration::days(day as i64),
            open: Some(open),
            high: Some(high),
            low: Some(low),
            close: Some(close),
            volume: Some(volume),
        });
        price = close;
    }

    series
}
