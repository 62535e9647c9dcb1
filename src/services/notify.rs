//! Best-effort post-commit notifications.
//!
//! Delivery (push, email) lives outside this worker; the trait is the
//! seam. Notifications run strictly after the transaction has committed
//! and a failure is logged, never propagated into the booking result.

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use crate::types::UnixMs;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TourChange {
    Booked,
    Cancelled,
    Moved,
}

#[derive(Debug, Clone, Copy)]
pub struct TourNotification {
    pub change: TourChange,
    pub tour: Uuid,
    pub vehicle: Uuid,
    pub pickup_time: UnixMs,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn tour_changed(&self, notification: TourNotification) -> anyhow::Result<()>;
}

/// Default sink: structured log lines picked up by the ops tooling.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn tour_changed(&self, notification: TourNotification) -> anyhow::Result<()> {
        info!(
            "tour change: {:?} tour={} vehicle={} pickup_time={}",
            notification.change, notification.tour, notification.vehicle, notification.pickup_time
        );
        Ok(())
    }
}

/// Fire a notification, swallowing (but logging) failures.
pub async fn notify_best_effort(notifier: &dyn Notifier, notification: TourNotification) {
    if let Err(e) = notifier.tour_changed(notification).await {
        tracing::warn!("notification failed (ignored): {e}");
    }
}
