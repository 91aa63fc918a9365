use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::Validate;

lazy_static! {
    static ref VALID_ID: Regex =
        Regex::new("^car(0|([1-9][0-9]*))$").unwrap();
}

/// A car ID is of the form `carN` where `N` is an integer with no
/// leading zeros.
pub fn valid_car_id(id: &str) -> bool {
    VALID_ID.is_match(id)
}

/// A car on the lot.
#[derive(
    Debug, Default, Deserialize, Serialize, Validate, PartialEq, Clone,
)]
pub struct Car {
    /// The car's make, for example "Honda".
    #[validate(length(min = 1))]
    pub make: String,
    /// The car's model, for example "Accord".
    #[validate(length(min = 1))]
    pub model: String,
    /// Year of manufacture, for example 2017.
    pub year: i32,
    /// Color of the car's paint.
    pub color: String,
}

/// Sale status of a car. A car may exist without a status.
#[derive(
    Debug, Default, Deserialize, Serialize, Validate, PartialEq, Clone, Copy,
)]
pub struct Status {
    /// True if the car has already been sold.
    pub sold: bool,
    /// True if the car is ready to be sold.
    pub ready: bool,
    /// Asking price for the car.
    pub price: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_validation() {
        assert!(valid_car_id("car0"));
        assert!(valid_car_id("car10"));
        assert!(!valid_car_id("car01"));
        assert!(!valid_car_id("car"));
        assert!(!valid_car_id("truck3"));
        assert!(!valid_car_id("car3x"));
    }
}
