use lazy_static::lazy_static;
use tracing::error;

/// bcrypt work factor for stored password hashes.
pub const BCRYPT_COST: u32 = 10;

lazy_static! {
    /// Verified against on unknown-email logins so both failure paths pay
    /// for one bcrypt verify.
    static ref DUMMY_HASH: Option<String> =
        bcrypt::hash("techstock-timing-equalizer", BCRYPT_COST).ok();
}

fn hash_blocking(plain: &str) -> anyhow::Result<String> {
    bcrypt::hash(plain, BCRYPT_COST).map_err(|e| {
        error!(error = %e, "bcrypt hash error");
        anyhow::anyhow!(e.to_string())
    })
}

fn verify_blocking(plain: &str, hash: &str) -> anyhow::Result<bool> {
    bcrypt::verify(plain, hash).map_err(|e| {
        error!(error = %e, "bcrypt verify error");
        anyhow::anyhow!(e.to_string())
    })
}

/// Hash on the blocking pool; bcrypt at cost 10 takes tens of milliseconds.
pub async fn hash_password(plain: &str) -> anyhow::Result<String> {
    let plain = plain.to_owned();
    tokio::task::spawn_blocking(move || hash_blocking(&plain)).await?
}

pub async fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let (plain, hash) = (plain.to_owned(), hash.to_owned());
    tokio::task::spawn_blocking(move || verify_blocking(&plain, &hash)).await?
}

/// Spend the same bcrypt work as a real verify, always failing.
pub async fn verify_dummy(plain: &str) {
    let plain = plain.to_owned();
    let _ = tokio::task::spawn_blocking(move || {
        if let Some(hash) = DUMMY_HASH.as_deref() {
            let _ = bcrypt::verify(&plain, hash);
        }
    })
    .await;
}
