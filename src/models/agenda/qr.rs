//! QR tokens for agenda check-in: `AGENDA-` followed by random alphanumerics.

use rand::Rng;
use rand::distr::Alphanumeric;
use sqlx::PgConnection;

use crate::errors::AppError;

pub const QR_PREFIX: &str = "AGENDA-";
const SUFFIX_LEN: usize = 8;
const FALLBACK_SUFFIX_LEN: usize = 16;
const MAX_ATTEMPTS: usize = 10;

/// Answers "is this token already assigned to an agenda?".
#[allow(async_fn_in_trait)]
pub trait QrLookup {
    async fn is_taken(&mut self, code: &str) -> Result<bool, AppError>;
}

/// Lookup against the `agendas` table on an open connection or transaction.
pub struct PgQrLookup<'c>(pub &'c mut PgConnection);

impl QrLookup for PgQrLookup<'_> {
    async fn is_taken(&mut self, code: &str) -> Result<bool, AppError> {
        let (taken,): (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM agendas WHERE qr_code = $1)")
                .bind(code)
                .fetch_one(&mut *self.0)
                .await?;
        Ok(taken)
    }
}

fn random_code(rng: &mut impl Rng, suffix_len: usize) -> String {
    let suffix: String = (0..suffix_len)
        .map(|_| char::from(rng.sample(Alphanumeric)))
        .collect();
    format!("{QR_PREFIX}{suffix}")
}

/// Generate a token not yet present according to `lookup`.
///
/// Gives up on the short form after `MAX_ATTEMPTS` collisions and returns a
/// longer token instead; the unique index on `agendas.qr_code` still guards
/// the insert.
pub async fn generate_unique(
    rng: &mut impl Rng,
    lookup: &mut impl QrLookup,
) -> Result<String, AppError> {
    for attempt in 1..=MAX_ATTEMPTS {
        let code = random_code(rng, SUFFIX_LEN);
        if !lookup.is_taken(&code).await? {
            return Ok(code);
        }
        log::warn!("QR code collision on attempt {attempt}, regenerating");
    }

    log::warn!("QR code space exhausted after {MAX_ATTEMPTS} attempts, using long token");
    Ok(random_code(rng, FALLBACK_SUFFIX_LEN))
}
