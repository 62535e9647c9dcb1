//! Liveness handler

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use serde_json::json;

pub async fn handle_ping(client: Client, mut subscriber: Subscriber) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        if let Some(reply) = msg.reply {
            let _ = client
                .publish(reply, serde_json::to_vec(&json!({"status": "ok"}))?.into())
                .await;
        }
    }
    Ok(())
}
