//! Tour-level handlers: company cancellation and vehicle reassignment.

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use chrono::Utc;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::services::cancellation::{cancel_tour, CancelOutcome};
use crate::services::move_tour::{move_tour, MoveOutcome};
use crate::services::notify::Notifier;
use crate::services::routing::RoutingOracle;
use crate::types::{ErrorResponse, MoveTourPayload, Request, StatusResponse, SuccessResponse};

use super::error_code;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelTourPayload {
    pub tour_id: Uuid,
    pub company_id: Uuid,
}

pub async fn handle_cancel_tour(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    oracle: Arc<dyn RoutingOracle>,
    notifier: Arc<dyn Notifier>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received tour.cancel message");
        let Some(reply) = msg.reply.clone() else {
            warn!("Message without reply subject");
            continue;
        };

        let request: Request<CancelTourPayload> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse tour cancel request: {}", e);
                let response = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client
                    .publish(reply, serde_json::to_vec(&response)?.into())
                    .await;
                continue;
            }
        };

        let payload = &request.payload;
        let response = match cancel_tour(
            &pool,
            oracle.as_ref(),
            notifier.as_ref(),
            payload.tour_id,
            payload.company_id,
        )
        .await
        {
            Ok(CancelOutcome::Cancelled { .. }) => {
                serde_json::to_vec(&SuccessResponse::new(request.id, StatusResponse::ok()))?
            }
            Ok(CancelOutcome::Declined(reason)) => serde_json::to_vec(&SuccessResponse::new(
                request.id,
                StatusResponse::declined(400, reason),
            ))?,
            Err(e) => {
                error!("Tour cancellation failed: {}", e);
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

pub async fn handle_move_tour(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    oracle: Arc<dyn RoutingOracle>,
    notifier: Arc<dyn Notifier>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received tour.move message");
        let Some(reply) = msg.reply.clone() else {
            warn!("Message without reply subject");
            continue;
        };

        let request: Request<MoveTourPayload> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse tour move request: {}", e);
                let response = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client
                    .publish(reply, serde_json::to_vec(&response)?.into())
                    .await;
                continue;
            }
        };

        let now = Utc::now().timestamp_millis();
        let response = match move_tour(
            &pool,
            oracle.as_ref(),
            notifier.as_ref(),
            &request.payload,
            now,
        )
        .await
        {
            Ok(MoveOutcome::Moved) => {
                serde_json::to_vec(&SuccessResponse::new(request.id, StatusResponse::ok()))?
            }
            Ok(MoveOutcome::Declined(reason)) => serde_json::to_vec(&SuccessResponse::new(
                request.id,
                StatusResponse::declined(400, reason),
            ))?,
            Err(e) => {
                error!("Tour move failed: {}", e);
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
