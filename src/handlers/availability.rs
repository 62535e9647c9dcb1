//! Availability maintenance handler.

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use sqlx::PgPool;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::services::availability::update_availability;
use crate::types::{AvailabilityUpdatePayload, ErrorResponse, Request, SuccessResponse};

use super::error_code;

pub async fn handle_update(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received availability.update message");
        let Some(reply) = msg.reply.clone() else {
            warn!("Message without reply subject");
            continue;
        };

        let request: Request<AvailabilityUpdatePayload> =
            match serde_json::from_slice(&msg.payload) {
                Ok(req) => req,
                Err(e) => {
                    error!("Failed to parse availability update: {}", e);
                    let response =
                        ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                    let _ = client
                        .publish(reply, serde_json::to_vec(&response)?.into())
                        .await;
                    continue;
                }
            };

        let response = match update_availability(&pool, &request.payload).await {
            Ok(intervals) => serde_json::to_vec(&SuccessResponse::new(request.id, intervals))?,
            Err(e) => {
                error!("Availability update failed: {}", e);
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
