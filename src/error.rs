use thiserror::Error;

/// Ошибки OTP-движка.
///
/// Валидационные ошибки (`InvalidSecret`, `MissingRequiredField`, `InvalidField`, `InvalidUri`,
/// `MissingSecret`, `DuplicateName`) разрешаются на границе: форма `add` или импорт.
/// В генератор и планировщик они не попадают.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OtpError {
    #[error("invalid base32 secret: {0}")]
    InvalidSecret(String),
    #[error("missing required field `{0}`")]
    MissingRequiredField(&'static str),
    #[error("invalid value for `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },
    #[error("invalid otpauth URI: {0}")]
    InvalidUri(String),
    #[error("otpauth URI has no `secret` parameter")]
    MissingSecret,
    #[error("an OTP config named '{0}' already exists")]
    DuplicateName(String),
    #[error("stored OTP configs are corrupt: {0}")]
    StorageReadCorrupt(String),
    #[error("cannot derive code: {0}")]
    DerivationFailure(String),
    #[error("import file must be a JSON array of otpauth:// strings: {0}")]
    InvalidImport(String),
}
