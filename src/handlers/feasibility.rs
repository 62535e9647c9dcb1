//! Blacklist and whitelist handlers.

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use chrono::Utc;
use futures::StreamExt;
use sqlx::PgPool;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::services::feasibility;
use crate::services::routing::RoutingOracle;
use crate::services::zones::ZoneIndex;
use crate::types::{ErrorResponse, Request, SuccessResponse, TripQuery};

use super::error_code;

/// Cheap boolean feasibility grid, no routing-oracle calls.
pub async fn handle_blacklist(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    zones: Arc<dyn ZoneIndex>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received booking.blacklist message");
        let Some(reply) = msg.reply.clone() else {
            warn!("Message without reply subject");
            continue;
        };

        let request: Request<TripQuery> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse blacklist request: {}", e);
                let response = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client
                    .publish(reply, serde_json::to_vec(&response)?.into())
                    .await;
                continue;
            }
        };

        let now = Utc::now().timestamp_millis();
        let response =
            match feasibility::blacklist(&pool, zones.as_ref(), &request.payload, now).await {
                Ok(result) => serde_json::to_vec(&SuccessResponse::new(request.id, result))?,
                Err(e) => {
                    error!("Blacklist evaluation failed: {}", e);
                    serde_json::to_vec(&ErrorResponse::new(
                        request.id,
                        error_code(&e),
                        e.to_string(),
                    ))?
                }
            };
        let _ = client.publish(reply, response.into()).await;
    }
    Ok(())
}

/// Exact best-insertion computation per candidate.
pub async fn handle_whitelist(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    oracle: Arc<dyn RoutingOracle>,
    zones: Arc<dyn ZoneIndex>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received booking.whitelist message");
        let Some(reply) = msg.reply.clone() else {
            warn!("Message without reply subject");
            continue;
        };

        let request: Request<TripQuery> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse whitelist request: {}", e);
                let response = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client
                    .publish(reply, serde_json::to_vec(&response)?.into())
                    .await;
                continue;
            }
        };

        let now = Utc::now().timestamp_millis();
        let response = match feasibility::whitelist(
            &pool,
            oracle.as_ref(),
            zones.as_ref(),
            &request.payload,
            now,
        )
        .await
        {
            Ok(result) => serde_json::to_vec(&SuccessResponse::new(request.id, result))?,
            Err(e) => {
                error!("Whitelist evaluation failed: {}", e);
                serde_json::to_vec(&ErrorResponse::new(
                    request.id,
                    error_code(&e),
                    e.to_string(),
                ))?
            }
        };
        let _ = client.publish(reply, response.into()).await;
    }
    Ok(())
}
