//! Fleet snapshot queries.
//!
//! Loads everything the insertion planner needs to know about the eligible
//! companies in one read pass: capacity-filtered vehicles, their merged
//! availabilities, and the tours and events overlapping the search window.

use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::types::{
    Capacities, CompanySnapshot, Coordinates, EventEntry, Interval, TourSpan, VehicleSnapshot,
};

#[derive(Debug, FromRow)]
struct CompanyRow {
    id: Uuid,
    zone: Uuid,
    lat: f64,
    lng: f64,
}

#[derive(Debug, FromRow)]
struct VehicleRow {
    id: Uuid,
    company: Uuid,
    passengers: i32,
    wheelchairs: i32,
    bikes: i32,
    luggage: i32,
}

#[derive(Debug, FromRow)]
struct AvailabilityRow {
    vehicle: Uuid,
    start_time: i64,
    end_time: i64,
}

#[derive(Debug, FromRow)]
struct TourRow {
    id: Uuid,
    vehicle: Uuid,
    departure: i64,
    arrival: i64,
}

#[derive(Debug, Clone, FromRow)]
struct EventRow {
    id: Uuid,
    request_id: Uuid,
    tour_id: Uuid,
    vehicle_id: Uuid,
    event_group: Uuid,
    is_pickup: bool,
    communicated_time: i64,
    lat: f64,
    lng: f64,
    scheduled_time_start: i64,
    scheduled_time_end: i64,
    prev_leg_duration: i64,
    next_leg_duration: i64,
    passengers: i32,
    wheelchairs: i32,
    bikes: i32,
    luggage: i32,
    tour_departure: i64,
    tour_arrival: i64,
    direct_duration: Option<i64>,
}

impl EventRow {
    fn into_entry(self) -> EventEntry {
        EventEntry {
            id: self.id,
            request_id: self.request_id,
            tour_id: self.tour_id,
            event_group: self.event_group,
            is_pickup: self.is_pickup,
            coordinates: Coordinates::new(self.lat, self.lng),
            scheduled_time_start: self.scheduled_time_start,
            scheduled_time_end: self.scheduled_time_end,
            communicated_time: self.communicated_time,
            prev_leg_duration: self.prev_leg_duration,
            next_leg_duration: self.next_leg_duration,
            capacities: Capacities {
                passengers: self.passengers,
                wheelchairs: self.wheelchairs,
                bikes: self.bikes,
                luggage: self.luggage,
            },
            tour_departure: self.tour_departure,
            tour_arrival: self.tour_arrival,
            direct_duration: self.direct_duration,
        }
    }
}

const EVENT_SELECT: &str = r#"
    SELECT
        e.id, e.request AS request_id, r.tour AS tour_id, t.vehicle AS vehicle_id,
        e.event_group_id AS event_group,
        e.is_pickup, e.communicated_time,
        g.lat, g.lng,
        g.scheduled_time_start, g.scheduled_time_end,
        g.prev_leg_duration, g.next_leg_duration,
        r.passengers, r.wheelchairs, r.bikes, r.luggage,
        t.departure AS tour_departure, t.arrival AS tour_arrival,
        t.direct_duration
    FROM event e
    INNER JOIN request r ON e.request = r.id
    INNER JOIN tour t ON r.tour = t.id
    INNER JOIN event_group g ON e.event_group_id = g.id
    WHERE t.cancelled = FALSE
      AND r.cancelled = FALSE
      AND r.pending = FALSE
      AND e.cancelled = FALSE
"#;

/// Load the planning snapshot for all companies in the given zones whose
/// vehicles can carry `required`.
///
/// Tours are fetched over the twice-expanded window so that the nearest
/// events just outside the search window are known as well.
pub async fn load_snapshot(
    pool: &PgPool,
    zones: &[Uuid],
    required: &Capacities,
    expanded: Interval,
    twice_expanded: Interval,
) -> Result<Vec<CompanySnapshot>, sqlx::Error> {
    let companies: Vec<CompanyRow> =
        sqlx::query_as("SELECT id, zone, lat, lng FROM company WHERE zone = ANY($1)")
            .bind(zones)
            .fetch_all(pool)
            .await?;
    if companies.is_empty() {
        return Ok(vec![]);
    }
    let company_ids: Vec<Uuid> = companies.iter().map(|c| c.id).collect();

    let vehicles: Vec<VehicleRow> = sqlx::query_as(
        r#"
        SELECT id, company, passengers, wheelchairs, bikes, luggage
        FROM vehicle
        WHERE company = ANY($1)
          AND passengers >= $2
          AND wheelchairs >= $3
          AND bikes >= $4
          AND luggage >= $5 + $2 - passengers
        "#,
    )
    .bind(&company_ids)
    .bind(required.passengers)
    .bind(required.wheelchairs)
    .bind(required.bikes)
    .bind(required.luggage)
    .fetch_all(pool)
    .await?;
    if vehicles.is_empty() {
        return Ok(vec![]);
    }
    let vehicle_ids: Vec<Uuid> = vehicles.iter().map(|v| v.id).collect();

    let availabilities: Vec<AvailabilityRow> = sqlx::query_as(
        r#"
        SELECT vehicle, start_time, end_time
        FROM availability
        WHERE vehicle = ANY($1) AND start_time <= $2 AND end_time >= $3
        "#,
    )
    .bind(&vehicle_ids)
    .bind(expanded.end_time)
    .bind(expanded.start_time)
    .fetch_all(pool)
    .await?;

    let tours: Vec<TourRow> = sqlx::query_as(
        r#"
        SELECT id, vehicle, departure, arrival
        FROM tour
        WHERE vehicle = ANY($1) AND cancelled = FALSE
          AND departure <= $2 AND arrival >= $3
        "#,
    )
    .bind(&vehicle_ids)
    .bind(twice_expanded.end_time)
    .bind(twice_expanded.start_time)
    .fetch_all(pool)
    .await?;

    let events: Vec<EventRow> = sqlx::query_as(&format!(
        r#"{EVENT_SELECT}
          AND t.vehicle = ANY($1)
          AND t.departure <= $2 AND t.arrival >= $3
        ORDER BY g.scheduled_time_start, g.scheduled_time_end
        "#
    ))
    .bind(&vehicle_ids)
    .bind(twice_expanded.end_time)
    .bind(twice_expanded.start_time)
    .fetch_all(pool)
    .await?;

    Ok(assemble(
        companies,
        vehicles,
        availabilities,
        tours,
        events,
        expanded,
    ))
}

fn assemble(
    companies: Vec<CompanyRow>,
    vehicles: Vec<VehicleRow>,
    availabilities: Vec<AvailabilityRow>,
    tours: Vec<TourRow>,
    events: Vec<EventRow>,
    expanded: Interval,
) -> Vec<CompanySnapshot> {
    let mut snapshots = Vec::with_capacity(companies.len());
    for company in companies {
        let mut vehicle_snapshots = Vec::new();
        for vehicle in vehicles.iter().filter(|v| v.company == company.id) {
            let vehicle_availabilities: Vec<Interval> = availabilities
                .iter()
                .filter(|a| a.vehicle == vehicle.id)
                .map(|a| Interval::new(a.start_time, a.end_time))
                .collect();

            let mut tour_spans: Vec<TourSpan> = tours
                .iter()
                .filter(|t| {
                    t.vehicle == vehicle.id
                        && expanded.overlaps(&Interval::new(t.departure, t.arrival))
                })
                .map(|t| TourSpan {
                    id: t.id,
                    departure: t.departure,
                    arrival: t.arrival,
                })
                .collect();
            tour_spans.sort_by_key(|t| t.departure);

            let vehicle_events: Vec<EventEntry> = events
                .iter()
                .filter(|e| {
                    e.vehicle_id == vehicle.id
                        && expanded.overlaps(&Interval::new(e.tour_departure, e.tour_arrival))
                })
                .map(|e| e.clone().into_entry())
                .collect();

            let last_event_before = events
                .iter()
                .filter(|e| e.vehicle_id == vehicle.id && e.tour_arrival < expanded.start_time)
                .max_by_key(|e| e.communicated_time)
                .map(|e| e.clone().into_entry());
            let first_event_after = events
                .iter()
                .filter(|e| e.vehicle_id == vehicle.id && e.tour_departure > expanded.end_time)
                .min_by_key(|e| e.communicated_time)
                .map(|e| e.clone().into_entry());

            vehicle_snapshots.push(VehicleSnapshot {
                id: vehicle.id,
                capacities: Capacities {
                    passengers: vehicle.passengers,
                    wheelchairs: vehicle.wheelchairs,
                    bikes: vehicle.bikes,
                    luggage: vehicle.luggage,
                },
                availabilities: Interval::merge_all(vehicle_availabilities),
                tours: tour_spans,
                events: vehicle_events,
                last_event_before,
                first_event_after,
            });
        }
        if !vehicle_snapshots.is_empty() {
            snapshots.push(CompanySnapshot {
                id: company.id,
                zone_id: company.zone,
                coordinates: Coordinates::new(company.lat, company.lng),
                vehicles: vehicle_snapshots,
            });
        }
    }
    snapshots
}

/// Current event sequence of one vehicle, ordered by scheduled window.
/// Used inside the commit transaction to re-validate a prepared insertion.
pub async fn load_vehicle_events(
    conn: &mut PgConnection,
    vehicle: Uuid,
    window: Interval,
) -> Result<Vec<EventEntry>, sqlx::Error> {
    let events: Vec<EventRow> = sqlx::query_as(&format!(
        r#"{EVENT_SELECT}
          AND t.vehicle = $1
          AND t.departure <= $2 AND t.arrival >= $3
        ORDER BY g.scheduled_time_start, g.scheduled_time_end
        "#
    ))
    .bind(vehicle)
    .bind(window.end_time)
    .bind(window.start_time)
    .fetch_all(conn)
    .await?;
    Ok(events.into_iter().map(EventRow::into_entry).collect())
}

/// Events of one tour, ordered by scheduled window. Absorbed or unknown
/// tours yield `None`.
pub async fn load_tour_events(
    pool: &PgPool,
    tour: Uuid,
) -> Result<Option<Vec<EventEntry>>, sqlx::Error> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM tour WHERE id = $1)")
        .bind(tour)
        .fetch_one(pool)
        .await?;
    if !exists {
        return Ok(None);
    }
    let events: Vec<EventRow> = sqlx::query_as(&format!(
        r#"{EVENT_SELECT}
          AND r.tour = $1
        ORDER BY g.scheduled_time_start, g.scheduled_time_end
        "#
    ))
    .bind(tour)
    .fetch_all(pool)
    .await?;
    Ok(Some(events.into_iter().map(EventRow::into_entry).collect()))
}
