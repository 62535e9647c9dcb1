//! Feasible insertion ranges under vehicle capacity.
//!
//! Given a vehicle's ordered event sequence, finds every maximal run of
//! insertion positions where a new request's demand fits at all points in
//! between. Positions count gaps: 0 is before the first event, `len` is
//! after the last.

use serde::{Deserialize, Serialize};

use crate::types::{Capacities, EventEntry};

/// A maximal run of valid insertion positions. `earliest_pickup` and
/// `latest_dropoff` are both inclusive gap indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertionRange {
    pub earliest_pickup: usize,
    pub latest_dropoff: usize,
}

/// Anything that changes vehicle occupancy when passed.
pub trait OccupancyChange {
    fn is_pickup(&self) -> bool;
    fn capacities(&self) -> Capacities;
}

impl OccupancyChange for EventEntry {
    fn is_pickup(&self) -> bool {
        self.is_pickup
    }

    fn capacities(&self) -> Capacities {
        self.capacities
    }
}

fn apply<E: OccupancyChange>(occupied: &mut Capacities, event: &E) {
    let sign = if event.is_pickup() { 1 } else { -1 };
    let c = event.capacities();
    occupied.passengers += sign * c.passengers;
    occupied.wheelchairs += sign * c.wheelchairs;
    occupied.bikes += sign * c.bikes;
    occupied.luggage += sign * c.luggage;
}

/// Compute the feasible insertion ranges for `required` demand.
///
/// The scan starts with the new request's demand already on board, so every
/// reported position is valid as if pickup and dropoff bracketed it. An
/// empty event sequence yields the single whole-sequence range when the
/// bare demand fits the vehicle.
pub fn possible_insertion_ranges<E: OccupancyChange>(
    vehicle: &Capacities,
    required: &Capacities,
    events: &[E],
) -> Vec<InsertionRange> {
    if !vehicle.fits(required) {
        return vec![];
    }
    if events.is_empty() {
        return vec![InsertionRange {
            earliest_pickup: 0,
            latest_dropoff: 0,
        }];
    }

    let mut occupied = *required;
    let mut ranges = Vec::new();
    // Gap index where the current valid run began; the run before event 0
    // is valid because the bare demand fits.
    let mut run_start: Option<usize> = Some(0);
    for (i, event) in events.iter().enumerate() {
        apply(&mut occupied, event);
        let valid = vehicle.fits(&occupied);
        match run_start {
            Some(start) if !valid => {
                ranges.push(InsertionRange {
                    earliest_pickup: start,
                    latest_dropoff: i,
                });
                run_start = None;
            }
            None if valid => {
                run_start = Some(i + 1);
            }
            _ => {}
        }
    }
    if let Some(start) = run_start {
        ranges.push(InsertionRange {
            earliest_pickup: start,
            latest_dropoff: events.len(),
        });
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Delta {
        is_pickup: bool,
        capacities: Capacities,
    }

    impl OccupancyChange for Delta {
        fn is_pickup(&self) -> bool {
            self.is_pickup
        }

        fn capacities(&self) -> Capacities {
            self.capacities
        }
    }

    fn pax(n: i32) -> Capacities {
        Capacities {
            passengers: n,
            ..Default::default()
        }
    }

    fn ride(n: i32) -> Vec<Delta> {
        vec![
            Delta {
                is_pickup: true,
                capacities: pax(n),
            },
            Delta {
                is_pickup: false,
                capacities: pax(n),
            },
        ]
    }

    #[test]
    fn test_two_seater_fits_everywhere() {
        let ranges = possible_insertion_ranges(&pax(2), &pax(1), &ride(1));
        assert_eq!(
            ranges,
            vec![InsertionRange {
                earliest_pickup: 0,
                latest_dropoff: 2
            }]
        );
    }

    #[test]
    fn test_single_seater_can_only_bracket() {
        let ranges = possible_insertion_ranges(&pax(1), &pax(1), &ride(1));
        assert_eq!(
            ranges,
            vec![
                InsertionRange {
                    earliest_pickup: 0,
                    latest_dropoff: 0
                },
                InsertionRange {
                    earliest_pickup: 2,
                    latest_dropoff: 2
                },
            ]
        );
    }

    #[test]
    fn test_demand_exceeding_vehicle_yields_nothing() {
        let ranges = possible_insertion_ranges(&pax(1), &pax(2), &ride(1));
        assert!(ranges.is_empty());
    }

    #[test]
    fn test_empty_sequence_single_range() {
        let events: Vec<Delta> = vec![];
        let ranges = possible_insertion_ranges(&pax(4), &pax(2), &events);
        assert_eq!(
            ranges,
            vec![InsertionRange {
                earliest_pickup: 0,
                latest_dropoff: 0
            }]
        );
    }

    #[test]
    fn test_empty_sequence_demand_too_large() {
        let events: Vec<Delta> = vec![];
        assert!(possible_insertion_ranges(&pax(1), &pax(2), &events).is_empty());
    }

    #[test]
    fn test_interior_gap_between_two_rides() {
        // Two sequential single-passenger rides in a two-seater; a second
        // passenger fits anywhere, including between the rides.
        let mut events = ride(1);
        events.extend(ride(1));
        let ranges = possible_insertion_ranges(&pax(2), &pax(1), &events);
        assert_eq!(
            ranges,
            vec![InsertionRange {
                earliest_pickup: 0,
                latest_dropoff: 4
            }]
        );
    }

    #[test]
    fn test_occupancy_peak_splits_ranges() {
        // Occupancy over [p(1), p(1), d(1), d(1)] with 1 required runs
        // 2,3,2,1; in a 2-seater only the positions outside the nested
        // stretch survive.
        let events = vec![
            Delta {
                is_pickup: true,
                capacities: pax(1),
            },
            Delta {
                is_pickup: true,
                capacities: pax(1),
            },
            Delta {
                is_pickup: false,
                capacities: pax(1),
            },
            Delta {
                is_pickup: false,
                capacities: pax(1),
            },
        ];
        let ranges = possible_insertion_ranges(&pax(2), &pax(1), &events);
        assert_eq!(
            ranges,
            vec![
                InsertionRange {
                    earliest_pickup: 0,
                    latest_dropoff: 1
                },
                InsertionRange {
                    earliest_pickup: 3,
                    latest_dropoff: 4
                },
            ]
        );
    }

    #[test]
    fn test_luggage_overflow_blocks_insertion() {
        // Vehicle: 2 seats, no luggage space. Existing ride carries 1
        // passenger + 1 luggage (luggage rides on the free seat). A second
        // passenger would displace the luggage mid-ride.
        let events = vec![
            Delta {
                is_pickup: true,
                capacities: Capacities {
                    passengers: 1,
                    luggage: 1,
                    ..Default::default()
                },
            },
            Delta {
                is_pickup: false,
                capacities: Capacities {
                    passengers: 1,
                    luggage: 1,
                    ..Default::default()
                },
            },
        ];
        let vehicle = Capacities {
            passengers: 2,
            ..Default::default()
        };
        let ranges = possible_insertion_ranges(&vehicle, &pax(1), &events);
        assert_eq!(
            ranges,
            vec![
                InsertionRange {
                    earliest_pickup: 0,
                    latest_dropoff: 0
                },
                InsertionRange {
                    earliest_pickup: 2,
                    latest_dropoff: 2
                },
            ]
        );
    }
}
