use crate::domain::is_valid_price;

/// Sample standard deviation of simple returns over the last `lookback`
/// valid prices. Falls back to `default` with fewer than two returns or
/// when the result is not a usable number.
pub fn rolling_volatility(closes: &[f64], lookback: usize, default: f64) -> f64 {
    let valid: Vec<f64> = closes.iter().copied().filter(|p| is_valid_price(*p)).collect();
    let window = &valid[valid.len().saturating_sub(lookback)..];

    let returns: Vec<f64> = window.windows(2).map(|w| w[1] / w[0] - 1.0).collect();
    if returns.len() < 2 {
        return default;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let vol = variance.sqrt();

    if vol.is_finite() {
        vol
    } else {
        default
    }
}
