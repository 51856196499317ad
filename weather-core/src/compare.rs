use serde::{Deserialize, Serialize};

pub const DEFAULT_DISCREPANCY_C: f64 = 5.0;
pub const DEFAULT_RELATIVE_TOLERANCE: f64 = 0.01;

/// Absolute floor used by [`approx_eq`] so that comparisons against zero still work.
const ABSOLUTE_FLOOR: f64 = 1e-12;

/// Thresholds applied when comparing readings from different sources.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerances {
    /// Largest allowed gap (°C, exclusive) between API and page temperatures.
    #[serde(default = "default_discrepancy")]
    pub discrepancy_c: f64,

    /// Relative tolerance for values read back from the store.
    #[serde(default = "default_relative")]
    pub relative: f64,
}

fn default_discrepancy() -> f64 {
    DEFAULT_DISCREPANCY_C
}

fn default_relative() -> f64 {
    DEFAULT_RELATIVE_TOLERANCE
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            discrepancy_c: DEFAULT_DISCREPANCY_C,
            relative: DEFAULT_RELATIVE_TOLERANCE,
        }
    }
}

pub fn discrepancy(a: f64, b: f64) -> f64 {
    (a - b).abs()
}

/// Outcome of comparing an API temperature with a page temperature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiscrepancyCheck {
    pub api_c: f64,
    pub page_c: f64,
    pub discrepancy: f64,
    pub threshold: f64,
}

impl DiscrepancyCheck {
    pub fn passed(&self) -> bool {
        self.discrepancy < self.threshold
    }
}

pub fn check_discrepancy(api_c: f64, page_c: f64, threshold: f64) -> DiscrepancyCheck {
    DiscrepancyCheck {
        api_c,
        page_c,
        discrepancy: discrepancy(api_c, page_c),
        threshold,
    }
}

/// `actual` is within `rel` of `expected`, relative to `expected`.
pub fn approx_eq(actual: f64, expected: f64, rel: f64) -> bool {
    let allowed = (rel * expected.abs()).max(ABSOLUTE_FLOOR);
    (actual - expected).abs() <= allowed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_degrees_apart_passes() {
        let check = check_discrepancy(10.0, 13.0, DEFAULT_DISCREPANCY_C);
        assert!((check.discrepancy - 3.0).abs() < 1e-9);
        assert!(check.passed());
    }

    #[test]
    fn six_degrees_apart_fails() {
        let check = check_discrepancy(10.0, 16.0, DEFAULT_DISCREPANCY_C);
        assert!((check.discrepancy - 6.0).abs() < 1e-9);
        assert!(!check.passed());
    }

    #[test]
    fn threshold_is_exclusive() {
        assert!(!check_discrepancy(0.0, 5.0, 5.0).passed());
    }

    #[test]
    fn approx_eq_relative() {
        assert!(approx_eq(101.0, 100.0, 0.01));
        assert!(!approx_eq(101.5, 100.0, 0.01));
        assert!(approx_eq(-99.5, -100.0, 0.01));
    }

    #[test]
    fn approx_eq_at_zero() {
        assert!(approx_eq(0.0, 0.0, 0.01));
        assert!(!approx_eq(0.001, 0.0, 0.01));
    }

    #[test]
    fn tolerances_fill_missing_fields() {
        let t: Tolerances = toml::from_str("discrepancy_c = 2.5").unwrap();
        assert_eq!(t.discrepancy_c, 2.5);
        assert_eq!(t.relative, DEFAULT_RELATIVE_TOLERANCE);
    }
}
