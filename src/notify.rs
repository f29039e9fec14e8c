//! Account lifecycle notifications.
//!
//! Emits welcome and cancellation events for downstream mail delivery. The
//! delivery channel is an external collaborator; here the events are recorded
//! on the application log, and a notification must never fail the request
//! that triggered it.

use log::info;

pub fn send_welcome(email: &str, name: &str) {
    info!("welcome notification queued for {} <{}>", name, email);
}

pub fn send_cancellation(email: &str, name: &str) {
    info!("cancellation notification queued for {} <{}>", name, email);
}
