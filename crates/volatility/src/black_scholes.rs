use serde::Serialize;
use std::f64::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionSide {
    Call,
    Put,
}

/// Theoretical price and Greeks.
///
/// Theta is per calendar day, vega per one volatility point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct OptionQuote {
    pub price: f64,
    pub delta: f64,
    pub gamma: f64,
    pub theta: f64,
    pub vega: f64,
}

pub fn norm_pdf(x: f64) -> f64 {
    (1.0 / (2.0 * PI).sqrt()) * (-0.5 * x * x).exp()
}

/// Abramowitz-Stegun 26.2.17, absolute error below 7.5e-8
pub fn norm_cdf(x: f64) -> f64 {
    let k = 1.0 / (1.0 + 0.2316419 * x.abs());
    let poly = k
        * (0.319381530 + k * (-0.356563782 + k * (1.781477937 + k * (-1.821255978 + k * 1.330274429))));

    let approx = 1.0 - norm_pdf(x) * poly;

    if x >= 0.0 {
        approx
    } else {
        1.0 - approx
    }
}

pub fn d1_d2(spot: f64, strike: f64, time: f64, rate: f64, sigma: f64) -> (f64, f64) {
    let sqrt_t = time.sqrt();
    let d1 = ((spot / strike).ln() + (rate + 0.5 * sigma * sigma) * time) / (sigma * sqrt_t);
    (d1, d1 - sigma * sqrt_t)
}

/// Black-Scholes price and Greeks for a European option.
///
/// A non-positive time to expiry or volatility yields an all-zero quote.
pub fn price(spot: f64, strike: f64, time: f64, rate: f64, sigma: f64, side: OptionSide) -> OptionQuote {
    if time <= 0.0 || sigma <= 0.0 || spot <= 0.0 || strike <= 0.0 {
        return OptionQuote::default();
    }

    let (d1, d2) = d1_d2(spot, strike, time, rate, sigma);
    let sqrt_t = time.sqrt();
    let pdf = norm_pdf(d1);
    let discounted = strike * (-rate * time).exp();

    let (value, delta, carry) = match side {
        OptionSide::Call => (
            spot * norm_cdf(d1) - discounted * norm_cdf(d2),
            norm_cdf(d1),
            rate * discounted * norm_cdf(d2),
        ),
        OptionSide::Put => (
            discounted * norm_cdf(-d2) - spot * norm_cdf(-d1),
            -norm_cdf(-d1),
            rate * discounted * norm_cdf(-d2),
        ),
    };

    OptionQuote {
        price: value,
        delta,
        gamma: pdf / (spot * sigma * sqrt_t),
        theta: (-(spot * pdf * sigma) / (2.0 * sqrt_t) - carry) / 365.0,
        vega: spot * pdf * sqrt_t / 100.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T30: f64 = 30.0 / 365.0;

    #[test]
    fn test_degenerate_inputs_zero() {
        assert_eq!(price(100.0, 100.0, 0.0, 0.05, 0.3, OptionSide::Call), OptionQuote::default());
        assert_eq!(price(100.0, 100.0, T30, 0.05, 0.0, OptionSide::Put), OptionQuote::default());
        assert_eq!(price(100.0, 100.0, -1.0, 0.05, 0.3, OptionSide::Put), OptionQuote::default());
    }

    #[test]
    fn test_atm_call_put_equal_at_zero_rate() {
        let call = price(100.0, 100.0, T30, 0.0, 0.6, OptionSide::Call);
        let put = price(100.0, 100.0, T30, 0.0, 0.6, OptionSide::Put);
        assert!((call.price - put.price).abs() < 1e-9);
        assert!((call.gamma - put.gamma).abs() < 1e-12);
        assert!((call.vega - put.vega).abs() < 1e-12);
    }

    #[test]
    fn test_put_call_parity() {
        let (s, k, r, v) = (60_000.0, 55_000.0, 0.05, 0.5);
        let call = price(s, k, T30, r, v, OptionSide::Call);
        let put = price(s, k, T30, r, v, OptionSide::Put);
        let rhs = s - k * (-r * T30).exp();
        assert!((call.price - put.price - rhs).abs() < 1e-6);
    }

    #[test]
    fn test_deltas() {
        let call = price(100.0, 100.0, T30, 0.0, 0.5, OptionSide::Call);
        let put = price(100.0, 100.0, T30, 0.0, 0.5, OptionSide::Put);
        assert!(call.delta > 0.5 && call.delta < 0.6);
        assert!((call.delta - put.delta - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_itm_call_above_intrinsic() {
        let call = price(60_000.0, 50_000.0, T30, 0.0, 0.5, OptionSide::Call);
        assert!(call.price >= 10_000.0);
        let put = price(60_000.0, 50_000.0, T30, 0.0, 0.5, OptionSide::Put);
        assert!(put.price > 0.0 && put.price < 1_000.0);
    }

    #[test]
    fn test_theta_negative_and_scaled_per_day() {
        let call = price(100.0, 100.0, T30, 0.05, 0.6, OptionSide::Call);
        assert!(call.theta < 0.0);
        // a day of decay is a small fraction of the premium
        assert!(call.theta.abs() < call.price / 10.0);
    }

    #[test]
    fn test_norm_cdf() {
        assert!((norm_cdf(0.0) - 0.5).abs() < 1e-7);
        assert!((norm_cdf(1.96) - 0.975).abs() < 1e-4);
        assert!((norm_cdf(-1.0) + norm_cdf(1.0) - 1.0).abs() < 1e-12);
    }
}
