// SPDX-FileCopyrightText: 2026 Turnkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Notification channel trait for OTP and status message delivery.

use async_trait::async_trait;

use crate::error::TurnkeyError;
use crate::types::{Delivery, HealthStatus, Phone};

/// Adapter for outbound notification delivery (SMS providers).
///
/// Delivery is best-effort: an implementation that cannot reach its
/// provider must return [`Delivery::Fallback`] with a manually-shareable
/// deep link built from `context`, not an error. `Err` is reserved for
/// misuse (e.g. an unconfigured adapter asked to build a link without
/// context), which callers treat as fatal to the send operation only,
/// never to the surrounding flow.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Adapter name for logs and the doctor report.
    fn name(&self) -> &str;

    /// Deliver `message` to `to`. `context` is an opaque token (the OTP
    /// record id) used to mint the fallback deep link.
    async fn send(
        &self,
        to: &Phone,
        message: &str,
        context: &str,
    ) -> Result<Delivery, TurnkeyError>;

    /// Adapter health, for startup diagnostics.
    async fn health_check(&self) -> Result<HealthStatus, TurnkeyError> {
        Ok(HealthStatus::Healthy)
    }
}
