use crate::entry::{Algorithm, OtpConfig};
use crate::error::OtpError;
use crate::secret::decode_base32;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Sha256, Sha512};
use time::OffsetDateTime;

/// 31-битный код короче 10^10, больше цифр дали бы только ведущие нули.
pub const MAX_DIGITS: u32 = 10;

/// Источник текущего времени (unix-секунды).
pub trait Clock {
    fn now_unix(&self) -> u64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> u64 {
        u64::try_from(OffsetDateTime::now_utc().unix_timestamp()).unwrap_or(0)
    }
}

/// Номер временного шага: `floor(unix / period)`.
pub fn counter_at(unix: u64, period: u32) -> u64 {
    unix / u64::from(period.max(1))
}

/// Сколько секунд осталось в текущем шаге, всегда в `[1, period]`.
pub fn remaining_seconds(unix: u64, period: u32) -> u32 {
    let period = u64::from(period.max(1));
    (period - unix % period) as u32
}

fn mac_digest<M: Mac + hmac::digest::KeyInit>(key: &[u8], msg: &[u8]) -> Result<Vec<u8>, OtpError> {
    let mut mac = <M as Mac>::new_from_slice(key)
        .map_err(|e| OtpError::DerivationFailure(format!("hmac key error: {e}")))?;
    mac.update(msg);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn hmac_digest(algorithm: Algorithm, key: &[u8], msg: &[u8]) -> Result<Vec<u8>, OtpError> {
    match algorithm {
        Algorithm::SHA1 => mac_digest::<Hmac<Sha1>>(key, msg),
        Algorithm::SHA256 => mac_digest::<Hmac<Sha256>>(key, msg),
        Algorithm::SHA512 => mac_digest::<Hmac<Sha512>>(key, msg),
    }
}

/// HOTP (RFC 4226): HMAC от 8-байтного big-endian счётчика,
/// dynamic truncation и `mod 10^digits` с ведущими нулями.
pub fn hotp(key: &[u8], counter: u64, algorithm: Algorithm, digits: u32) -> Result<String, OtpError> {
    if digits == 0 || digits > MAX_DIGITS {
        return Err(OtpError::DerivationFailure(format!(
            "digits must be between 1 and {MAX_DIGITS}, got {digits}"
        )));
    }

    let hash = hmac_digest(algorithm, key, &counter.to_be_bytes())?;
    let last = *hash
        .last()
        .ok_or_else(|| OtpError::DerivationFailure("empty hmac output".to_string()))?;
    let offset = (last & 0x0F) as usize;
    let chunk = hash
        .get(offset..offset + 4)
        .ok_or_else(|| OtpError::DerivationFailure("hmac output too short".to_string()))?;

    let binary = (u32::from(chunk[0] & 0x7F) << 24)
        | (u32::from(chunk[1]) << 16)
        | (u32::from(chunk[2]) << 8)
        | u32::from(chunk[3]);

    let code = u64::from(binary) % 10u64.pow(digits);

    Ok(format!("{:0width$}", code, width = digits as usize))
}

/// TOTP-код конфигурации в момент `unix`.
pub fn generate_code_at(cfg: &OtpConfig, unix: u64) -> Result<String, OtpError> {
    if cfg.period == 0 {
        return Err(OtpError::DerivationFailure(
            "period must be a positive integer".to_string(),
        ));
    }
    let key = decode_base32(&cfg.secret)?;
    hotp(&key, counter_at(unix, cfg.period), cfg.algorithm, cfg.digits)
}

/// Текущий TOTP-код конфигурации.
pub fn generate_code(cfg: &OtpConfig, clock: &impl Clock) -> Result<String, OtpError> {
    generate_code_at(cfg, clock.now_unix())
}
