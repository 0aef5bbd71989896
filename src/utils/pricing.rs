use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Declarative cost rates for one model. All rates are integer micro-units of
/// the billing currency (1 USD = 1_000_000) to keep the arithmetic exact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Rate applied per second of generated output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_per_second: Option<i64>,
    /// Flat rate applied once per generation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_per_generation: Option<i64>,
    /// Resolution-keyed overrides; an entry replaces only the fields it defines.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub resolution_overrides: HashMap<String, ResolutionPricing>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolutionPricing {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_per_second: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_per_generation: Option<i64>,
}

/// Resolves the cost of one generation in micro-units.
///
/// A per-second rate (top-level or from a resolution override) wins over a
/// flat rate. A flat rate is charged regardless of duration, including a
/// missing or zero duration. Absent both, the cost is zero.
pub fn resolve_cost(
    pricing: Option<&ModelPricing>,
    duration_seconds: Option<i32>,
    resolution: Option<&str>,
) -> i64 {
    let Some(pricing) = pricing else {
        return 0;
    };

    let override_entry = resolution.and_then(|res| pricing.resolution_overrides.get(res));

    let per_second = override_entry
        .and_then(|o| o.cost_per_second)
        .or(pricing.cost_per_second);
    let per_generation = override_entry
        .and_then(|o| o.cost_per_generation)
        .or(pricing.cost_per_generation);

    if let Some(rate) = per_second {
        if rate > 0 {
            return match duration_seconds {
                Some(d) if d > 0 => rate * d as i64,
                _ => 0,
            };
        }
    }

    if let Some(flat) = per_generation {
        if flat > 0 {
            return flat;
        }
    }

    0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn per_second(rate: i64) -> ModelPricing {
        ModelPricing {
            cost_per_second: Some(rate),
            ..Default::default()
        }
    }

    fn flat(rate: i64) -> ModelPricing {
        ModelPricing {
            cost_per_generation: Some(rate),
            ..Default::default()
        }
    }

    #[test]
    fn missing_descriptor_costs_nothing() {
        assert_eq!(resolve_cost(None, Some(10), None), 0);
        assert_eq!(resolve_cost(Some(&ModelPricing::default()), Some(10), None), 0);
    }

    #[test]
    fn per_second_rate_scales_with_duration() {
        // $0.30/s for 8 seconds = $2.40
        assert_eq!(resolve_cost(Some(&per_second(300_000)), Some(8), None), 2_400_000);
    }

    #[test]
    fn per_second_rate_with_zero_or_missing_duration() {
        assert_eq!(resolve_cost(Some(&per_second(300_000)), Some(0), None), 0);
        assert_eq!(resolve_cost(Some(&per_second(300_000)), Some(-4), None), 0);
        assert_eq!(resolve_cost(Some(&per_second(300_000)), None, None), 0);
    }

    #[test]
    fn flat_rate_ignores_duration() {
        // $0.03 flat regardless of duration
        let pricing = flat(30_000);
        assert_eq!(resolve_cost(Some(&pricing), Some(12), None), 30_000);
        assert_eq!(resolve_cost(Some(&pricing), Some(0), None), 30_000);
        assert_eq!(resolve_cost(Some(&pricing), None, None), 30_000);
    }

    #[test]
    fn per_second_wins_over_flat() {
        let pricing = ModelPricing {
            cost_per_second: Some(100_000),
            cost_per_generation: Some(9_999_999),
            ..Default::default()
        };
        assert_eq!(resolve_cost(Some(&pricing), Some(5), None), 500_000);
    }

    #[test]
    fn resolution_override_replaces_rate() {
        let mut pricing = per_second(100_000);
        pricing.resolution_overrides.insert(
            "1080p".to_string(),
            ResolutionPricing {
                cost_per_second: Some(250_000),
                cost_per_generation: None,
            },
        );

        assert_eq!(resolve_cost(Some(&pricing), Some(4), Some("1080p")), 1_000_000);
        // Other resolutions keep the top-level rate.
        assert_eq!(resolve_cost(Some(&pricing), Some(4), Some("720p")), 400_000);
        assert_eq!(resolve_cost(Some(&pricing), Some(4), None), 400_000);
    }

    #[test]
    fn per_second_path_suppresses_flat_even_without_duration() {
        let pricing = ModelPricing {
            cost_per_second: Some(500_000),
            cost_per_generation: Some(30_000),
            ..Default::default()
        };
        assert_eq!(resolve_cost(Some(&pricing), None, None), 0);
    }

    #[test]
    fn partial_override_keeps_unspecified_fields() {
        // The override zeroes out only the per-second rate; the flat rate is
        // not overridden and stays at the top-level value.
        let pricing = ModelPricing {
            cost_per_second: Some(100_000),
            cost_per_generation: Some(30_000),
            resolution_overrides: HashMap::from([(
                "preview".to_string(),
                ResolutionPricing {
                    cost_per_second: Some(0),
                    cost_per_generation: None,
                },
            )]),
        };

        assert_eq!(resolve_cost(Some(&pricing), Some(2), Some("preview")), 30_000);
        assert_eq!(resolve_cost(Some(&pricing), Some(2), Some("720p")), 200_000);
    }

    #[test]
    fn zero_rates_fall_through() {
        let pricing = ModelPricing {
            cost_per_second: Some(0),
            cost_per_generation: Some(30_000),
            ..Default::default()
        };
        assert_eq!(resolve_cost(Some(&pricing), Some(8), None), 30_000);
    }
}
