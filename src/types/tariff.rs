//! Tariff table types for the pricing calculator
//!
//! A tariff table is immutable per billing period and versioned by its
//! effective date. Amounts are VND; `Decimal` keeps the arithmetic exact for
//! dispute resolution.

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::LaneEngineError;
use super::session::VehicleClass;

/// Pricing rules for one vehicle class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassTariff {
    /// Duration covered by the flat first-block rate, in whole hours
    pub first_block_hours: u32,
    /// Flat rate charged for any stay up to `first_block_hours`
    pub first_block_rate: Decimal,
    /// Rate per started hour beyond the first block
    pub hourly_rate: Decimal,
    /// Added once if the stay overlaps the overnight window
    pub overnight_surcharge: Decimal,
    /// Monthly-pass flat rate for this class (billed per period, outside the
    /// per-use fee path)
    pub monthly_rate: Decimal,
}

impl ClassTariff {
    fn validate(&self, class: VehicleClass) -> Result<(), LaneEngineError> {
        if self.first_block_hours == 0 {
            return Err(LaneEngineError::configuration(format!(
                "tariff for {}: first_block_hours must be at least 1",
                class
            )));
        }
        for (name, rate) in [
            ("first_block_rate", self.first_block_rate),
            ("hourly_rate", self.hourly_rate),
            ("overnight_surcharge", self.overnight_surcharge),
            ("monthly_rate", self.monthly_rate),
        ] {
            if rate < Decimal::ZERO {
                return Err(LaneEngineError::configuration(format!(
                    "tariff for {}: {} must not be negative",
                    class, name
                )));
            }
        }
        Ok(())
    }
}

/// The complete tariff rule set applied by the pricing calculator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TariffTable {
    /// Version stamp; a table applies from this date until superseded
    pub effective_from: NaiveDate,
    /// Start of the overnight window (local time)
    pub overnight_start: NaiveTime,
    /// End of the overnight window (local time)
    pub overnight_end: NaiveTime,
    pub car: ClassTariff,
    pub motorbike: ClassTariff,
    pub truck: ClassTariff,
}

impl TariffTable {
    /// The rule set for a vehicle class
    pub fn class(&self, class: VehicleClass) -> &ClassTariff {
        match class {
            VehicleClass::Car => &self.car,
            VehicleClass::Motorbike => &self.motorbike,
            VehicleClass::Truck => &self.truck,
        }
    }

    /// Validate the table; a lane refuses to start on a malformed tariff
    pub fn validate(&self) -> Result<(), LaneEngineError> {
        self.car.validate(VehicleClass::Car)?;
        self.motorbike.validate(VehicleClass::Motorbike)?;
        self.truck.validate(VehicleClass::Truck)?;
        Ok(())
    }
}

impl Default for TariffTable {
    /// Rates mirroring the product's seed pricing configuration
    fn default() -> Self {
        TariffTable {
            effective_from: NaiveDate::from_ymd_opt(2023, 1, 1).expect("valid date"),
            overnight_start: NaiveTime::from_hms_opt(0, 0, 0).expect("valid time"),
            overnight_end: NaiveTime::from_hms_opt(6, 0, 0).expect("valid time"),
            car: ClassTariff {
                first_block_hours: 2,
                first_block_rate: Decimal::from(25_000),
                hourly_rate: Decimal::from(10_000),
                overnight_surcharge: Decimal::from(100_000),
                monthly_rate: Decimal::from(1_500_000),
            },
            motorbike: ClassTariff {
                first_block_hours: 2,
                first_block_rate: Decimal::from(5_000),
                hourly_rate: Decimal::from(2_000),
                overnight_surcharge: Decimal::from(30_000),
                monthly_rate: Decimal::from(120_000),
            },
            truck: ClassTariff {
                first_block_hours: 2,
                first_block_rate: Decimal::from(40_000),
                hourly_rate: Decimal::from(15_000),
                overnight_surcharge: Decimal::from(150_000),
                monthly_rate: Decimal::from(2_500_000),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_is_valid() {
        assert!(TariffTable::default().validate().is_ok());
    }

    #[test]
    fn test_default_car_rates_match_seed_pricing() {
        let table = TariffTable::default();
        assert_eq!(table.car.first_block_rate, Decimal::from(25_000));
        assert_eq!(table.car.hourly_rate, Decimal::from(10_000));
        assert_eq!(table.motorbike.first_block_rate, Decimal::from(5_000));
    }

    #[test]
    fn test_zero_first_block_is_rejected() {
        let mut table = TariffTable::default();
        table.car.first_block_hours = 0;
        let result = table.validate();
        assert!(matches!(
            result.unwrap_err(),
            LaneEngineError::Configuration { .. }
        ));
    }

    #[test]
    fn test_negative_rate_is_rejected() {
        let mut table = TariffTable::default();
        table.motorbike.hourly_rate = Decimal::from(-1);
        let result = table.validate();
        assert!(matches!(
            result.unwrap_err(),
            LaneEngineError::Configuration { .. }
        ));
    }

    #[test]
    fn test_class_lookup() {
        let table = TariffTable::default();
        assert_eq!(
            table.class(VehicleClass::Truck).first_block_rate,
            Decimal::from(40_000)
        );
    }
}
