//! Booking commit and request cancellation handlers.

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use chrono::Utc;
use futures::StreamExt;
use sqlx::PgPool;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::services::booking::book_ride;
use crate::services::cancellation::{cancel_request, CancelOutcome};
use crate::services::notify::Notifier;
use crate::services::routing::RoutingOracle;
use crate::services::zones::ZoneIndex;
use crate::types::{
    BookingCommitRequest, BookingCommitResponse, CancelRequestPayload, ErrorResponse, Request,
    StatusResponse, SuccessResponse,
};

use super::error_code;

pub async fn handle_commit(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    oracle: Arc<dyn RoutingOracle>,
    zones: Arc<dyn ZoneIndex>,
    notifier: Arc<dyn Notifier>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received booking.commit message");
        let Some(reply) = msg.reply.clone() else {
            warn!("Message without reply subject");
            continue;
        };

        let request: Request<BookingCommitRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse booking commit request: {}", e);
                let response = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client
                    .publish(reply, serde_json::to_vec(&response)?.into())
                    .await;
                continue;
            }
        };

        let now = Utc::now().timestamp_millis();
        let response = match book_ride(
            &pool,
            oracle.as_ref(),
            zones.as_ref(),
            notifier.as_ref(),
            &request.payload,
            now,
        )
        .await
        {
            Ok(request_id) => serde_json::to_vec(&SuccessResponse::new(
                request.id,
                BookingCommitResponse { request_id },
            ))?,
            Err(e) => {
                error!("Booking commit failed: {}", e);
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

pub async fn handle_cancel_request(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    oracle: Arc<dyn RoutingOracle>,
    notifier: Arc<dyn Notifier>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received booking.cancel message");
        let Some(reply) = msg.reply.clone() else {
            warn!("Message without reply subject");
            continue;
        };

        let request: Request<CancelRequestPayload> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse cancel request: {}", e);
                let response = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client
                    .publish(reply, serde_json::to_vec(&response)?.into())
                    .await;
                continue;
            }
        };

        let now = Utc::now().timestamp_millis();
        let payload = &request.payload;
        let response = match cancel_request(
            &pool,
            oracle.as_ref(),
            notifier.as_ref(),
            payload.request_id,
            payload.customer,
            now,
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
                error!("Cancellation failed: {}", e);
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
