//! NATS message handlers

pub mod availability;
pub mod booking;
pub mod feasibility;
pub mod ping;
pub mod tour;

use std::sync::Arc;

use anyhow::Result;
use async_nats::Client;
use sqlx::PgPool;
use tracing::info;

use crate::config::Config;
use crate::error::BookingError;
use crate::services::notify::{LogNotifier, Notifier};
use crate::services::routing::{create_routing_oracle_with_fallback, RoutingOracle};
use crate::services::zones::{PostgisZoneIndex, ZoneIndex};

/// Stable error code for a failure, surfaced to the caller.
pub fn error_code(error: &BookingError) -> &'static str {
    match error {
        BookingError::Infeasible => "INFEASIBLE",
        BookingError::RoutingUnavailable => "ROUTING_UNAVAILABLE",
        BookingError::ConcurrencyConflict => "CONFLICT",
        BookingError::InvariantViolation(_) => "INTERNAL",
        BookingError::AuthorizationDenied => "FORBIDDEN",
        BookingError::Database(_) => "DATABASE_ERROR",
        BookingError::Oracle(_) => "ROUTING_ERROR",
    }
}

/// Start all message handlers
pub async fn start_handlers(client: Client, pool: PgPool, config: &Config) -> Result<()> {
    info!("Starting message handlers...");

    let oracle: Arc<dyn RoutingOracle> =
        Arc::from(create_routing_oracle_with_fallback(config.routing_url.clone()).await);
    info!("Routing oracle initialized: {}", oracle.name());

    let zones: Arc<dyn ZoneIndex> = Arc::new(PostgisZoneIndex::new(pool.clone()));
    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);

    let ping_sub = client.subscribe("ridepool.ping").await?;
    let blacklist_sub = client.subscribe("ridepool.booking.blacklist").await?;
    let whitelist_sub = client.subscribe("ridepool.booking.whitelist").await?;
    let commit_sub = client.subscribe("ridepool.booking.commit").await?;
    let cancel_request_sub = client.subscribe("ridepool.booking.cancel").await?;
    let cancel_tour_sub = client.subscribe("ridepool.tour.cancel").await?;
    let move_tour_sub = client.subscribe("ridepool.tour.move").await?;
    let availability_sub = client.subscribe("ridepool.availability.update").await?;

    info!("Subscribed to all subjects, handlers running");

    let ping_handle = {
        let client = client.clone();
        tokio::spawn(async move { ping::handle_ping(client, ping_sub).await })
    };
    let blacklist_handle = {
        let (client, pool, zones) = (client.clone(), pool.clone(), zones.clone());
        tokio::spawn(
            async move { feasibility::handle_blacklist(client, blacklist_sub, pool, zones).await },
        )
    };
    let whitelist_handle = {
        let (client, pool, oracle, zones) =
            (client.clone(), pool.clone(), oracle.clone(), zones.clone());
        tokio::spawn(async move {
            feasibility::handle_whitelist(client, whitelist_sub, pool, oracle, zones).await
        })
    };
    let commit_handle = {
        let (client, pool, oracle, zones, notifier) = (
            client.clone(),
            pool.clone(),
            oracle.clone(),
            zones.clone(),
            notifier.clone(),
        );
        tokio::spawn(async move {
            booking::handle_commit(client, commit_sub, pool, oracle, zones, notifier).await
        })
    };
    let cancel_request_handle = {
        let (client, pool, oracle, notifier) = (
            client.clone(),
            pool.clone(),
            oracle.clone(),
            notifier.clone(),
        );
        tokio::spawn(async move {
            booking::handle_cancel_request(client, cancel_request_sub, pool, oracle, notifier)
                .await
        })
    };
    let cancel_tour_handle = {
        let (client, pool, oracle, notifier) = (
            client.clone(),
            pool.clone(),
            oracle.clone(),
            notifier.clone(),
        );
        tokio::spawn(async move {
            tour::handle_cancel_tour(client, cancel_tour_sub, pool, oracle, notifier).await
        })
    };
    let move_tour_handle = {
        let (client, pool, oracle, notifier) = (
            client.clone(),
            pool.clone(),
            oracle.clone(),
            notifier.clone(),
        );
        tokio::spawn(async move {
            tour::handle_move_tour(client, move_tour_sub, pool, oracle, notifier).await
        })
    };
    let availability_handle = {
        let (client, pool) = (client.clone(), pool.clone());
        tokio::spawn(
            async move { availability::handle_update(client, availability_sub, pool).await },
        )
    };

    let results = futures::future::join_all([
        ping_handle,
        blacklist_handle,
        whitelist_handle,
        commit_handle,
        cancel_request_handle,
        cancel_tour_handle,
        move_tour_handle,
        availability_handle,
    ])
    .await;
    for result in results {
        result??;
    }
    Ok(())
}
