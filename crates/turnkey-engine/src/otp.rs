// SPDX-FileCopyrightText: 2026 Turnkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OTP issuance and verification, scoped to one (lead, project)
//! association.
//!
//! Codes are 6 digits; only a keyed HMAC-SHA256 hash is stored. Delivery
//! goes through the pluggable notification channel and degrades to a
//! manually-shareable deep link, never to a failure of issuance.

use std::sync::Arc;

use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;
use tracing::{info, warn};
use turnkey_config::model::OtpConfig;
use turnkey_core::types::{new_id, now_iso};
use turnkey_core::{
    Capability, ConflictReason, Delivery, NotificationChannel, Phone, TurnkeyError,
};
use turnkey_storage::queries::otp as otp_queries;
use turnkey_storage::queries::{associations, employees, leads};
use turnkey_storage::{Database, Employee, OtpRecord};

type HmacSha256 = Hmac<Sha256>;

/// Outcome of an OTP send.
#[derive(Debug)]
pub struct OtpIssue {
    pub record: OtpRecord,
    /// `None` when an active record was reused instead of issuing anew.
    pub delivery: Option<Delivery>,
    pub reused: bool,
}

/// OTP issuance and verification service.
pub struct OtpVerifier {
    db: Database,
    config: OtpConfig,
    channel: Arc<dyn NotificationChannel>,
}

/// Generate a 6-digit code. Leading zeros are preserved.
fn generate_code() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}

/// Keyed hash of a code, bound to its association so a code issued for one
/// project can never verify another.
fn hash_code(secret: &str, association_id: &str, code: &str) -> Result<String, TurnkeyError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| TurnkeyError::Internal(format!("otp secret unusable: {e}")))?;
    mac.update(association_id.as_bytes());
    mac.update(b":");
    mac.update(code.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time comparison of a submitted code against the stored hash.
fn code_matches(
    secret: &str,
    association_id: &str,
    code: &str,
    stored_hex: &str,
) -> Result<bool, TurnkeyError> {
    let stored = hex::decode(stored_hex)
        .map_err(|e| TurnkeyError::Internal(format!("stored otp hash is not hex: {e}")))?;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| TurnkeyError::Internal(format!("otp secret unusable: {e}")))?;
    mac.update(association_id.as_bytes());
    mac.update(b":");
    mac.update(code.as_bytes());
    Ok(mac.verify_slice(&stored).is_ok())
}

fn iso_in(duration: chrono::Duration) -> String {
    (chrono::Utc::now() + duration)
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

impl OtpVerifier {
    pub fn new(db: Database, config: OtpConfig, channel: Arc<dyn NotificationChannel>) -> Self {
        Self { db, config, channel }
    }

    fn secret(&self) -> Result<&str, TurnkeyError> {
        self.config
            .secret
            .as_deref()
            .ok_or_else(|| TurnkeyError::Config("otp.secret is not configured".to_string()))
    }

    /// Issue (or re-surface) a verification code for an association.
    ///
    /// While an unexpired, unverified record exists, its state is returned
    /// instead of minting a new code, which keeps re-send from becoming an
    /// enumeration or spam vector. Delivery failure downgrades to the
    /// manual fallback link and never fails the issuance.
    pub async fn send(&self, association_id: &str) -> Result<OtpIssue, TurnkeyError> {
        let secret = self.secret()?.to_string();
        let association = associations::get(&self.db, association_id)
            .await?
            .ok_or_else(|| TurnkeyError::not_found("association", association_id))?;
        if association.phone_verified {
            return Err(TurnkeyError::Conflict(ConflictReason::AlreadyVerified));
        }

        if let Some(existing) = otp_queries::active_record(&self.db, association_id).await? {
            info!(association_id, "active code reused for re-send");
            return Ok(OtpIssue {
                record: existing,
                delivery: None,
                reused: true,
            });
        }

        let lead = leads::get(&self.db, &association.lead_id)
            .await?
            .ok_or_else(|| TurnkeyError::not_found("lead", association.lead_id.clone()))?;
        let phone = Phone::normalize(&lead.phone)?;

        let code = generate_code();
        let record = OtpRecord {
            id: new_id(),
            association_id: association_id.to_string(),
            code_hash: hash_code(&secret, association_id, &code)?,
            expires_at: iso_in(chrono::Duration::minutes(self.config.ttl_minutes as i64)),
            attempts: 0,
            max_attempts: self.config.max_attempts as i64,
            verified: false,
            verified_at: None,
            fallback_link: None,
            created_at: now_iso(),
        };
        otp_queries::insert(&self.db, &record).await?;

        let message = format!("{code} is your site-visit verification code");
        let delivery = match self.channel.send(&phone, &message, &record.id).await {
            Ok(delivery) => delivery,
            Err(e) => {
                // Channel misbehavior is delivery degradation, not an
                // issuance failure; staff reads the code path manually.
                warn!(association_id, error = %e, "notification channel errored");
                Delivery::Fallback {
                    link: String::new(),
                }
            }
        };

        let mut record = record;
        match &delivery {
            Delivery::Sent { provider_id } => {
                info!(
                    association_id,
                    provider_id = provider_id.as_deref().unwrap_or("-"),
                    "verification code sent"
                );
            }
            Delivery::Fallback { link } if !link.is_empty() => {
                warn!(association_id, %link, "delivery degraded to manual link");
                otp_queries::set_fallback_link(&self.db, &record.id, link).await?;
                record.fallback_link = Some(link.clone());
            }
            Delivery::Fallback { .. } => {
                warn!(association_id, "delivery degraded with no link");
            }
        }

        Ok(OtpIssue {
            record,
            delivery: Some(delivery),
            reused: false,
        })
    }

    /// Verify a submitted code against the association's active record.
    ///
    /// The attempt counter moves on every comparison, success included.
    /// On success the association is updated per the verifier's role, and
    /// a pretagged association's record becomes trusted far into the
    /// future, scoped to this association only.
    pub async fn verify(
        &self,
        association_id: &str,
        code: &str,
        verifier: &Employee,
    ) -> Result<(), TurnkeyError> {
        let secret = self.secret()?.to_string();
        let role = employees::role_of(verifier)?;
        if !role.can(Capability::VerifyOtp) {
            return Err(TurnkeyError::PermissionDenied {
                role,
                action: Capability::VerifyOtp,
            });
        }

        let association = associations::get(&self.db, association_id)
            .await?
            .ok_or_else(|| TurnkeyError::not_found("association", association_id))?;
        if association.phone_verified {
            return Err(TurnkeyError::Conflict(ConflictReason::AlreadyVerified));
        }

        let record = otp_queries::active_record(&self.db, association_id)
            .await?
            .ok_or(TurnkeyError::Conflict(ConflictReason::NoActiveOtp))?;
        if record.attempts >= record.max_attempts {
            return Err(TurnkeyError::Conflict(ConflictReason::AttemptsExceeded));
        }

        otp_queries::increment_attempts(&self.db, &record.id).await?;

        if !code_matches(&secret, association_id, code, &record.code_hash)? {
            warn!(association_id, attempt = record.attempts + 1, "incorrect code");
            return Err(TurnkeyError::Validation(
                "incorrect verification code".to_string(),
            ));
        }

        let update = crate::association::verification_update(&association, &verifier.id, role)?;
        // A verified pretag record represents "this association's phone is
        // trusted", not a rolling session, so its expiry moves far out.
        let new_expiry = association.is_pretagged.then(|| {
            iso_in(chrono::Duration::days(self.config.pretag_trust_days as i64))
        });
        otp_queries::finalize_verification(&self.db, &record.id, new_expiry, update).await?;

        info!(association_id, verifier = %verifier.id, role = %role, "phone verified");
        Ok(())
    }
}
