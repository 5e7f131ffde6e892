//! `otpauth://totp/...` URI: разбор, сериализация и пакетный импорт/экспорт.
//!
//! Таблица подстановки значений по умолчанию (`Defaults`):
//!
//! | параметр    | если нет в URI        |
//! |-------------|-----------------------|
//! | `secret`    | ошибка `MissingSecret`|
//! | `algorithm` | `defaults.algorithm`  |
//! | `digits`    | `defaults.digits`     |
//! | `period`    | `defaults.period`     |
//! | `issuer`    | префикс метки `Issuer:account`, иначе нет |

use crate::entry::{Algorithm, Defaults, OtpConfig};
use crate::error::OtpError;
use crate::secret::normalize_secret;
use log::warn;
use url::Url;

fn invalid(msg: impl Into<String>) -> OtpError {
    OtpError::InvalidUri(msg.into())
}

fn parse_positive(name: &str, value: &str) -> Result<u32, OtpError> {
    match value.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(invalid(format!("'{name}' must be a positive integer, got '{value}'"))),
    }
}

/// Разобрать один otpauth:// URI в новую конфигурацию.
pub fn parse(uri: &str, defaults: &Defaults) -> Result<OtpConfig, OtpError> {
    let mut cleaned = uri.trim().to_string();

    // URI, завёрнутый в JSON-кавычки
    if cleaned.len() >= 2 && cleaned.starts_with('"') && cleaned.ends_with('"') {
        if let Ok(inner) = serde_json::from_str::<String>(&cleaned) {
            cleaned = inner;
        }
    }

    // старые экспортеры не кодируют '#'
    let cleaned = cleaned.replace('#', "%23");

    let url = Url::parse(&cleaned).map_err(|e| invalid(format!("{e}")))?;

    if url.scheme() != "otpauth" {
        return Err(invalid(format!("scheme must be 'otpauth', got '{}'", url.scheme())));
    }
    let kind = url.host_str().unwrap_or("");
    if kind != "totp" {
        return Err(invalid(format!(
            "unsupported otpauth type '{kind}', only 'totp' is supported"
        )));
    }

    let label = urlencoding::decode(url.path().trim_start_matches('/'))
        .map_err(|e| invalid(format!("label is not valid UTF-8: {e}")))?
        .into_owned();

    let mut secret: Option<String> = None;
    let mut issuer: Option<String> = None;
    let mut algorithm: Option<Algorithm> = None;
    let mut digits: Option<u32> = None;
    let mut period: Option<u32> = None;

    for (k, v) in url.query_pairs() {
        match k.as_ref() {
            "secret" => secret = Some(v.into_owned()),
            "issuer" => issuer = Some(v.into_owned()),
            "algorithm" => algorithm = Some(v.parse::<Algorithm>().map_err(invalid)?),
            "digits" => digits = Some(parse_positive("digits", &v)?),
            "period" => period = Some(parse_positive("period", &v)?),
            _ => {}
        }
    }

    let secret = secret
        .map(|s| normalize_secret(&s))
        .filter(|s| !s.is_empty())
        .ok_or(OtpError::MissingSecret)?;

    let issuer = issuer
        .map(|i| match i.strip_suffix("period") {
            Some(stripped) if !stripped.is_empty() => stripped.to_string(),
            _ => i,
        })
        .or_else(|| {
            label
                .split_once(':')
                .map(|(prefix, _)| prefix.trim().to_string())
        })
        .filter(|i| !i.trim().is_empty());

    if label.trim().is_empty() {
        return Err(OtpError::MissingRequiredField("name"));
    }

    OtpConfig::new(
        &label,
        issuer.as_deref(),
        &secret,
        algorithm.unwrap_or(defaults.algorithm),
        digits.unwrap_or(defaults.digits),
        period.unwrap_or(defaults.period),
    )
}

/// Сериализовать конфигурацию обратно в otpauth:// URI со всеми полями.
pub fn serialize(cfg: &OtpConfig) -> String {
    let mut uri = format!(
        "otpauth://totp/{}?secret={}",
        urlencoding::encode(&cfg.name),
        urlencoding::encode(&cfg.secret)
    );
    if let Some(ref issuer) = cfg.issuer {
        uri.push_str("&issuer=");
        uri.push_str(&urlencoding::encode(issuer));
    }
    uri.push_str(&format!(
        "&algorithm={}&digits={}&period={}",
        cfg.algorithm, cfg.digits, cfg.period
    ));
    uri
}

/// Разобрать JSON-массив URI; результат по каждому элементу отдельно.
/// Ошибкой целиком считается только файл, который не является массивом строк.
pub fn parse_each(
    json: &str,
    defaults: &Defaults,
) -> Result<Vec<Result<OtpConfig, OtpError>>, OtpError> {
    let uris: Vec<String> =
        serde_json::from_str(json).map_err(|e| OtpError::InvalidImport(e.to_string()))?;
    Ok(uris.iter().map(|u| parse(u, defaults)).collect())
}

/// Итог импорта: успешно разобранные конфигурации и число пропущенных URI.
#[derive(Debug, Default)]
pub struct ImportReport {
    pub configs: Vec<OtpConfig>,
    pub skipped: usize,
}

/// Разобрать JSON-массив URI, пропуская невалидные элементы.
pub fn parse_many(json: &str, defaults: &Defaults) -> Result<ImportReport, OtpError> {
    let mut report = ImportReport::default();
    for (idx, item) in parse_each(json, defaults)?.into_iter().enumerate() {
        match item {
            Ok(cfg) => report.configs.push(cfg),
            Err(e) => {
                warn!("Skipping import entry #{}: {}", idx, e);
                report.skipped += 1;
            }
        }
    }
    Ok(report)
}

/// Экспорт: JSON-массив URI.
pub fn serialize_many(configs: &[OtpConfig]) -> anyhow::Result<String> {
    let uris: Vec<String> = configs.iter().map(serialize).collect();
    Ok(serde_json::to_string_pretty(&uris)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d() -> Defaults {
        Defaults::default()
    }

    #[test]
    fn parses_full_uri() {
        let cfg = parse(
            "otpauth://totp/GitHub?secret=JBSWY3DPEHPK3PXP&algorithm=SHA256&digits=8&period=60&issuer=GitHub%20Inc",
            &d(),
        )
        .unwrap();
        assert_eq!(cfg.name, "GitHub");
        assert_eq!(cfg.issuer.as_deref(), Some("GitHub Inc"));
        assert_eq!(cfg.secret, "JBSWY3DPEHPK3PXP");
        assert_eq!(cfg.algorithm, Algorithm::SHA256);
        assert_eq!(cfg.digits, 8);
        assert_eq!(cfg.period, 60);
        assert!(!cfg.id.is_empty());
    }

    #[test]
    fn missing_parameters_take_defaults() {
        let cfg = parse("otpauth://totp/alice%40example.com?secret=jbsw%20y3dp", &d()).unwrap();
        assert_eq!(cfg.name, "alice@example.com");
        assert_eq!(cfg.issuer, None);
        assert_eq!(cfg.secret, "JBSWY3DP");
        assert_eq!(cfg.algorithm, Algorithm::SHA1);
        assert_eq!(cfg.digits, 6);
        assert_eq!(cfg.period, 30);

        let custom = Defaults {
            algorithm: Algorithm::SHA512,
            digits: 8,
            period: 10,
        };
        let cfg = parse("otpauth://totp/x?secret=JBSWY3DP", &custom).unwrap();
        assert_eq!((cfg.algorithm, cfg.digits, cfg.period), (Algorithm::SHA512, 8, 10));
    }

    #[test]
    fn issuer_falls_back_to_label_prefix() {
        let cfg = parse("otpauth://totp/ACME%3Ajohn?secret=JBSWY3DP", &d()).unwrap();
        assert_eq!(cfg.name, "ACME:john");
        assert_eq!(cfg.issuer.as_deref(), Some("ACME"));

        let cfg = parse("otpauth://totp/ACME:john?secret=JBSWY3DP&issuer=Other", &d()).unwrap();
        assert_eq!(cfg.issuer.as_deref(), Some("Other"));
    }

    #[test]
    fn legacy_quirks_are_tolerated() {
        let cfg = parse(r#""otpauth://totp/a?secret=JBSWY3DP&issuer=Ente period""#, &d()).unwrap();
        assert_eq!(cfg.issuer.as_deref(), Some("Ente"));

        let cfg = parse("otpauth://totp/a#1?secret=JBSWY3DP", &d()).unwrap();
        assert_eq!(cfg.name, "a#1");
    }

    #[test]
    fn rejects_wrong_scheme_or_type() {
        assert!(matches!(
            parse("https://totp/x?secret=JBSWY3DP", &d()),
            Err(OtpError::InvalidUri(_))
        ));
        assert!(matches!(
            parse("otpauth://hotp/x?secret=JBSWY3DP&counter=1", &d()),
            Err(OtpError::InvalidUri(_))
        ));
        assert!(matches!(parse("not a uri", &d()), Err(OtpError::InvalidUri(_))));
    }

    #[test]
    fn rejects_bad_fields() {
        assert_eq!(
            parse("otpauth://totp/x?digits=6", &d()).unwrap_err(),
            OtpError::MissingSecret
        );
        assert!(matches!(
            parse("otpauth://totp/x?secret=JBSWY3DP&digits=0", &d()),
            Err(OtpError::InvalidUri(_))
        ));
        assert!(matches!(
            parse("otpauth://totp/x?secret=JBSWY3DP&period=abc", &d()),
            Err(OtpError::InvalidUri(_))
        ));
        assert!(matches!(
            parse("otpauth://totp/x?secret=JBSWY3DP&algorithm=MD5", &d()),
            Err(OtpError::InvalidUri(_))
        ));
        assert!(matches!(
            parse("otpauth://totp/x?secret=JBSWY3DP&digits=4000000000", &d()),
            Err(OtpError::InvalidField { field: "digits", .. })
        ));
        assert!(matches!(
            parse("otpauth://totp/x?secret=ABC", &d()),
            Err(OtpError::InvalidSecret(_))
        ));
        assert!(matches!(
            parse("otpauth://totp/x?secret=0189", &d()),
            Err(OtpError::InvalidSecret(_))
        ));
        assert_eq!(
            parse("otpauth://totp/?secret=JBSWY3DP", &d()).unwrap_err(),
            OtpError::MissingRequiredField("name")
        );
    }

    #[test]
    fn serialize_then_parse_keeps_fields() {
        let original = OtpConfig::new(
            "me & you/work: 100%",
            Some("Big Corp"),
            "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ",
            Algorithm::SHA512,
            8,
            45,
        )
        .unwrap();
        let uri = serialize(&original);
        assert!(uri.starts_with("otpauth://totp/"));

        let back = parse(&uri, &d()).unwrap();
        assert_eq!(back.name, original.name);
        assert_eq!(back.issuer, original.issuer);
        assert_eq!(back.secret, original.secret);
        assert_eq!(back.algorithm, original.algorithm);
        assert_eq!(back.digits, original.digits);
        assert_eq!(back.period, original.period);
        assert_ne!(back.id, original.id);
    }

    #[test]
    fn parse_many_skips_bad_entries() {
        let json = r#"[
            "otpauth://totp/GitHub?secret=JBSWY3DPEHPK3PXP&algorithm=SHA1&digits=6&period=30",
            "otpauth://totp/Broken?digits=6",
            "otpauth://totp/GitLab?secret=GEZDGNBVGY3TQOJQ"
        ]"#;
        let report = parse_many(json, &d()).unwrap();
        assert_eq!(report.configs.len(), 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.configs[1].name, "GitLab");

        let each = parse_each(json, &d()).unwrap();
        assert_eq!(each[1], Err(OtpError::MissingSecret));
    }

    #[test]
    fn parse_many_rejects_non_array() {
        assert!(matches!(
            parse_many("{\"uri\": 1}", &d()),
            Err(OtpError::InvalidImport(_))
        ));
    }

    #[test]
    fn export_is_a_json_array_of_uris() {
        let cfg = OtpConfig::new("GitHub", None, "JBSWY3DPEHPK3PXP", Algorithm::SHA1, 6, 30).unwrap();
        let out = serialize_many(&[cfg]).unwrap();
        let uris: Vec<String> = serde_json::from_str(&out).unwrap();
        assert_eq!(
            uris,
            ["otpauth://totp/GitHub?secret=JBSWY3DPEHPK3PXP&algorithm=SHA1&digits=6&period=30"]
        );
    }
}
