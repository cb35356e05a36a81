use chrono::{DateTime, Duration, Utc};
use rand::{Rng, rngs::OsRng};
use subtle::ConstantTimeEq;

use crate::{
    errors::ApiResult,
    mailer::{Mailer, OtpPurpose, otp_email},
    models::User,
    repository::Repository,
};

pub const OTP_TTL_MINUTES: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpOutcome {
    Accepted,
    Rejected,
}

/// Six digits, uniform over 100000..=999999, from the OS CSPRNG.
pub fn generate() -> String {
    OsRng.gen_range(100_000..=999_999u32).to_string()
}

/// Puts a fresh code on the user, overwriting any unconsumed one. Returns the code.
pub fn attach(user: &mut User, now: DateTime<Utc>) -> String {
    let code = generate();
    user.otp = Some(code.clone());
    user.otp_expires = Some(now + Duration::minutes(OTP_TTL_MINUTES));
    code
}

/// issue_for
///
/// Attaches a new code, persists the user and mails the code. A mail failure
/// surfaces as an error; the code stays stored and a retry simply replaces it.
pub async fn issue_for(
    repo: &dyn Repository,
    mailer: &dyn Mailer,
    user: &mut User,
    purpose: OtpPurpose,
) -> ApiResult<()> {
    let code = attach(user, Utc::now());
    repo.save_user(user).await?;
    mailer.send(otp_email(&user.email, &code, purpose)).await?;

    tracing::info!(user_id = %user.id, ?purpose, "otp issued");
    Ok(())
}

/// consume
///
/// Rejects when no code is set, when the code differs or after expiry. On acceptance
/// both challenge fields are cleared and the account is marked verified; the caller
/// persists the user.
pub fn consume(user: &mut User, submitted: &str, now: DateTime<Utc>) -> OtpOutcome {
    let (Some(code), Some(expires)) = (user.otp.as_deref(), user.otp_expires) else {
        return OtpOutcome::Rejected;
    };

    if now > expires || !bool::from(code.as_bytes().ct_eq(submitted.trim().as_bytes())) {
        return OtpOutcome::Rejected;
    }

    user.otp = None;
    user.otp_expires = None;
    user.is_verified = true;
    OtpOutcome::Accepted
}
