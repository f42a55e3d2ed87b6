//! Domain data structures for locations and skip pricing options.

use std::fmt;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ports::GatewayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
/// Identifier of a pricing option as assigned by the pricing service.
pub struct OptionId(pub u64);

impl fmt::Display for OptionId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Postcode and area pair that scopes the pricing options on offer.
pub struct Location {
    /// Outward postcode, e.g. `NR32`.
    pub postcode: String,
    /// Area or town name, e.g. `Lowestoft`.
    pub area: String,
}

impl Location {
    /// Build a location from a postcode and area.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidLocation`] when either part is blank.
    pub fn new<P: Into<String>, A: Into<String>>(postcode: P, area: A) -> Result<Self, GatewayError> {
        let postcode = postcode.into().trim().to_owned();
        let area = area.into().trim().to_owned();
        if postcode.is_empty() || area.is_empty() {
            return Err(GatewayError::InvalidLocation);
        }
        Ok(Self { postcode, area })
    }

    /// Fill omitted or blank parts from `defaults`.
    #[must_use]
    pub fn resolve(postcode: Option<&str>, area: Option<&str>, defaults: &Location) -> Self {
        let pick = |given: Option<&str>, fallback: &str| {
            given
                .map(str::trim)
                .filter(|segment| !segment.is_empty())
                .unwrap_or(fallback)
                .to_owned()
        };
        Self {
            postcode: pick(postcode, &defaults.postcode),
            area: pick(area, &defaults.area),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{} {}", self.postcode, self.area)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// One rentable skip size at a location, with its price and placement rules.
pub struct PricingOption {
    /// Unique identifier.
    pub id: OptionId,
    /// Container size in yards.
    pub size: u32,
    /// Length of the hire in days.
    pub hire_period_days: u32,
    /// Optional flat transport surcharge.
    #[serde(default)]
    pub transport_cost: Option<Decimal>,
    /// Optional per-tonne surcharge.
    #[serde(default)]
    pub per_tonne_cost: Option<Decimal>,
    /// Price before VAT.
    pub price_before_vat: Decimal,
    /// VAT rate as a percentage, e.g. `20`.
    pub vat: Decimal,
    /// Postcode the price applies to.
    pub postcode: String,
    /// Area the price applies to.
    #[serde(default)]
    pub area: String,
    /// The option is not available for booking.
    #[serde(default)]
    pub forbidden: bool,
    /// The skip may be placed on a public road.
    #[serde(default)]
    pub allowed_on_road: bool,
    /// The skip accepts heavy waste such as soil or rubble.
    #[serde(default)]
    pub allows_heavy_waste: bool,
    /// Creation timestamp reported by the service.
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    /// Last update timestamp reported by the service.
    #[serde(default)]
    pub updated_at: Option<NaiveDateTime>,
}

impl PricingOption {
    /// VAT charged on top of [`Self::price_before_vat`].
    #[must_use]
    pub fn vat_amount(&self) -> Decimal {
        self.price_before_vat * self.vat / Decimal::ONE_HUNDRED
    }

    /// Price including VAT. Unrounded; round only when displaying.
    #[must_use]
    pub fn total_price(&self) -> Decimal {
        self.price_before_vat * (Decimal::ONE + self.vat / Decimal::ONE_HUNDRED)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn sample() -> PricingOption {
        serde_json::from_str(
            r#"{
                "id": 17933,
                "size": 4,
                "hire_period_days": 14,
                "transport_cost": null,
                "per_tonne_cost": null,
                "price_before_vat": 278,
                "vat": 20,
                "postcode": "NR32",
                "area": "",
                "forbidden": false,
                "created_at": "2025-04-03T13:51:46.897146",
                "updated_at": "2025-04-07T13:16:52.813",
                "allowed_on_road": true,
                "allows_heavy_waste": true
            }"#,
        )
        .expect("sample option parses")
    }

    #[test]
    fn parses_service_payload() {
        let option = sample();
        assert_eq!(option.id, OptionId(17933));
        assert_eq!(option.size, 4);
        assert_eq!(option.price_before_vat, dec!(278));
        assert!(option.allowed_on_road);
        assert!(option.created_at.is_some());
    }

    #[test]
    fn total_price_adds_vat_without_rounding() {
        let mut option = sample();
        assert_eq!(option.total_price(), dec!(333.6));
        assert_eq!(option.vat_amount(), dec!(55.6));

        option.price_before_vat = dec!(99.99);
        option.vat = dec!(17.5);
        assert_eq!(option.total_price(), dec!(117.488250));
    }

    #[test]
    fn location_rejects_blank_parts() {
        assert!(matches!(
            Location::new("  ", "Lowestoft"),
            Err(GatewayError::InvalidLocation)
        ));
        let location = Location::new(" NR32 ", "Lowestoft").expect("valid location");
        assert_eq!(location.postcode, "NR32");
    }

    #[test]
    fn resolve_falls_back_to_defaults() {
        let defaults = Location::new("NR32", "Lowestoft").expect("valid defaults");
        let resolved = Location::resolve(Some("LE10"), Some(" "), &defaults);
        assert_eq!(resolved.postcode, "LE10");
        assert_eq!(resolved.area, "Lowestoft");
        assert_eq!(Location::resolve(None, None, &defaults), defaults);
    }
}
