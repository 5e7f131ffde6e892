use crate::error::OtpError;
use crate::otp::MAX_DIGITS;
use crate::secret::{decode_base32, normalize_secret};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Algorithm {
    #[default]
    SHA1,
    SHA256,
    SHA512,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::SHA1 => "SHA1",
            Algorithm::SHA256 => "SHA256",
            Algorithm::SHA512 => "SHA512",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace('-', "").as_str() {
            "SHA1" => Ok(Algorithm::SHA1),
            "SHA256" => Ok(Algorithm::SHA256),
            "SHA512" => Ok(Algorithm::SHA512),
            other => Err(format!(
                "unsupported algorithm '{other}', expected SHA1/SHA256/SHA512"
            )),
        }
    }
}

/// Значения, которые подставляются, когда поле не задано
/// (в otpauth:// URI или в форме `add`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    pub algorithm: Algorithm,
    pub digits: u32,
    pub period: u32,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::SHA1,
            digits: 6,
            period: 30,
        }
    }
}

fn default_digits() -> u32 {
    Defaults::default().digits
}

fn default_period() -> u32 {
    Defaults::default().period
}

/// Одна сохранённая OTP-конфигурация.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct OtpConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub issuer: Option<String>,
    pub secret: String,
    #[serde(default)]
    pub algorithm: Algorithm,
    #[serde(default = "default_digits")]
    pub digits: u32,
    #[serde(default = "default_period")]
    pub period: u32,
}

impl OtpConfig {
    /// Собрать и проверить новую конфигурацию со свежим id.
    ///
    /// Секрет хранится уже очищенным (без пробелов, в верхнем регистре).
    pub fn new(
        name: &str,
        issuer: Option<&str>,
        secret: &str,
        algorithm: Algorithm,
        digits: u32,
        period: u32,
    ) -> Result<Self, OtpError> {
        let cfg = OtpConfig {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            issuer: issuer
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            secret: normalize_secret(secret),
            algorithm,
            digits,
            period,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), OtpError> {
        if self.name.trim().is_empty() {
            return Err(OtpError::MissingRequiredField("name"));
        }
        if self.secret.trim().is_empty() {
            return Err(OtpError::MissingRequiredField("secret"));
        }
        decode_base32(&self.secret)?;
        if self.digits == 0 || self.digits > MAX_DIGITS {
            return Err(OtpError::InvalidField {
                field: "digits",
                reason: format!("must be between 1 and {MAX_DIGITS}, got {}", self.digits),
            });
        }
        if self.period == 0 {
            return Err(OtpError::InvalidField {
                field: "period",
                reason: "must be a positive integer".to_string(),
            });
        }
        Ok(())
    }

    /// Подпись для вывода: `issuer (name)` или просто `name`.
    pub fn label(&self) -> String {
        match self.issuer {
            Some(ref issuer) if issuer != &self.name => format!("{} ({})", issuer, self.name),
            _ => self.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_cleans_secret_and_assigns_unique_ids() {
        let a = OtpConfig::new("GitHub", Some(" "), "jbsw y3dp ehpk 3pxp", Algorithm::SHA1, 6, 30)
            .unwrap();
        let b = OtpConfig::new("GitHub", None, "JBSWY3DPEHPK3PXP", Algorithm::SHA1, 6, 30).unwrap();

        assert_eq!(a.secret, "JBSWY3DPEHPK3PXP");
        assert_eq!(a.issuer, None);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn new_requires_name_and_secret() {
        assert_eq!(
            OtpConfig::new("  ", None, "JBSWY3DPEHPK3PXP", Algorithm::SHA1, 6, 30).unwrap_err(),
            OtpError::MissingRequiredField("name")
        );
        assert_eq!(
            OtpConfig::new("x", None, "", Algorithm::SHA1, 6, 30).unwrap_err(),
            OtpError::MissingRequiredField("secret")
        );
        assert!(matches!(
            OtpConfig::new("x", None, "1234", Algorithm::SHA1, 6, 30).unwrap_err(),
            OtpError::InvalidSecret(_)
        ));
    }

    #[test]
    fn new_rejects_unusable_secrets_and_field_values() {
        assert!(matches!(
            OtpConfig::new("x", None, "A", Algorithm::SHA1, 6, 30).unwrap_err(),
            OtpError::InvalidSecret(_)
        ));
        assert!(matches!(
            OtpConfig::new("x", None, "JBSWY3DP", Algorithm::SHA1, 0, 30).unwrap_err(),
            OtpError::InvalidField { field: "digits", .. }
        ));
        assert!(matches!(
            OtpConfig::new("x", None, "JBSWY3DP", Algorithm::SHA1, 4_000_000_000, 30).unwrap_err(),
            OtpError::InvalidField { field: "digits", .. }
        ));
        assert!(matches!(
            OtpConfig::new("x", None, "JBSWY3DP", Algorithm::SHA1, 6, 0).unwrap_err(),
            OtpError::InvalidField { field: "period", .. }
        ));
        assert!(OtpConfig::new("x", None, "JBSWY3DP", Algorithm::SHA1, 10, 30).is_ok());
    }

    #[test]
    fn algorithm_parses_loosely() {
        assert_eq!("sha256".parse::<Algorithm>().unwrap(), Algorithm::SHA256);
        assert_eq!("SHA-512".parse::<Algorithm>().unwrap(), Algorithm::SHA512);
        assert!("md5".parse::<Algorithm>().is_err());
    }

    #[test]
    fn deserializes_persisted_layout_with_defaults() {
        let json = r#"{"id":"1","name":"GitHub","secret":"JBSWY3DPEHPK3PXP"}"#;
        let cfg: OtpConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.algorithm, Algorithm::SHA1);
        assert_eq!(cfg.digits, 6);
        assert_eq!(cfg.period, 30);
        assert_eq!(cfg.issuer, None);

        let out = serde_json::to_value(&cfg).unwrap();
        assert_eq!(out["algorithm"], "SHA1");
    }
}
