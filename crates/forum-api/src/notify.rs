//! [`BroadcastTransport`] — in-process fan-out of persisted notifications.
//!
//! Each audience target becomes one [`Delivery`] on a
//! [`tokio::sync::broadcast`] channel, addressed to the group a live
//! connection of that user or class would have joined.

use std::sync::Arc;

use forum_core::notify::{Notification, NotificationTransport, Target};
use tokio::sync::broadcast;
use tracing::debug;

/// The channel group a target's subscribers listen on.
pub fn group_name(target: Target) -> String {
  match target {
    Target::User(id) => format!("notification-user-{id}"),
    Target::Class(id) => format!("notification-class-{id}"),
  }
}

/// One notification bound for one group.
#[derive(Debug, Clone)]
pub struct Delivery {
  pub group:        String,
  pub notification: Arc<Notification>,
}

#[derive(Debug, Clone)]
pub struct BroadcastTransport {
  sender: broadcast::Sender<Delivery>,
}

impl BroadcastTransport {
  /// `capacity` bounds how far a slow subscriber may lag before it starts
  /// missing deliveries.
  pub fn new(capacity: usize) -> Self {
    let (sender, _) = broadcast::channel(capacity.max(1));
    Self { sender }
  }

  pub fn subscribe(&self) -> broadcast::Receiver<Delivery> { self.sender.subscribe() }
}

impl Default for BroadcastTransport {
  fn default() -> Self { Self::new(256) }
}

impl NotificationTransport for BroadcastTransport {
  async fn deliver(&self, notification: &Notification) {
    let shared = Arc::new(notification.clone());
    for &target in &notification.audience {
      let delivery = Delivery { group: group_name(target), notification: Arc::clone(&shared) };
      match self.sender.send(delivery) {
        Ok(receivers) => debug!(audience = %target, receivers, "notification delivered"),
        // Nobody is listening; the record is already persisted.
        Err(_) => debug!(audience = %target, "no subscribers for notification"),
      }
    }
  }
}
