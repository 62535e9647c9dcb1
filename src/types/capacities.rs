use serde::{Deserialize, Serialize};

/// Seat and cargo capacity, used both as vehicle supply and request demand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capacities {
    pub passengers: i32,
    pub wheelchairs: i32,
    pub bikes: i32,
    pub luggage: i32,
}

impl Capacities {
    /// Whether `required` fits into `self`.
    ///
    /// Luggage may overflow onto unused passenger seats, hence the combined
    /// `luggage + passengers` bound.
    pub fn fits(&self, required: &Capacities) -> bool {
        self.bikes >= required.bikes
            && self.wheelchairs >= required.wheelchairs
            && self.luggage + self.passengers >= required.luggage + required.passengers
            && self.passengers >= required.passengers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cap(passengers: i32, wheelchairs: i32, bikes: i32, luggage: i32) -> Capacities {
        Capacities {
            passengers,
            wheelchairs,
            bikes,
            luggage,
        }
    }

    #[test]
    fn test_fits_exact() {
        assert!(cap(4, 1, 2, 3).fits(&cap(4, 1, 2, 3)));
    }

    #[test]
    fn test_fits_rejects_too_many_passengers() {
        assert!(!cap(2, 0, 0, 4).fits(&cap(3, 0, 0, 0)));
    }

    #[test]
    fn test_luggage_overflows_onto_free_seats() {
        // 1 passenger in a 4-seater leaves 3 seats for luggage
        assert!(cap(4, 0, 0, 0).fits(&cap(1, 0, 0, 3)));
        assert!(!cap(4, 0, 0, 0).fits(&cap(1, 0, 0, 4)));
    }

    #[test]
    fn test_passengers_may_not_use_luggage_space() {
        assert!(!cap(1, 0, 0, 5).fits(&cap(2, 0, 0, 0)));
    }
}
