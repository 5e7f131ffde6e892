use crate::error::OtpError;
use base32::Alphabet;
use zeroize::Zeroizing;

/// Убрать все пробельные символы и привести к верхнему регистру.
pub fn normalize_secret(secret: &str) -> String {
    secret
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

fn is_base32_symbol(c: char) -> bool {
    matches!(c, 'A'..='Z' | '2'..='7')
}

/// Декодировать Base32-секрет (RFC 4648) в байты.
///
/// Пробелы и регистр игнорируются, хвостовой `=` допускается.
/// Сначала проверяем весь ввод и только потом декодируем:
/// невалидные символы не выбрасываются молча.
pub fn decode_base32(secret: &str) -> Result<Zeroizing<Vec<u8>>, OtpError> {
    let cleaned = normalize_secret(secret);
    let body = cleaned.trim_end_matches('=');

    if body.is_empty() {
        return Err(OtpError::InvalidSecret("secret is empty".to_string()));
    }

    if let Some((pos, bad)) = body.char_indices().find(|(_, c)| !is_base32_symbol(*c)) {
        return Err(OtpError::InvalidSecret(format!(
            "character '{bad}' at position {pos} is not in the base32 alphabet"
        )));
    }

    // 1, 3 и 6 символов в последней группе не складываются в целый байт
    if matches!(body.len() % 8, 1 | 3 | 6) {
        return Err(OtpError::InvalidSecret(format!(
            "length {} is not a valid base32 length",
            body.len()
        )));
    }

    let bytes = base32::decode(Alphabet::Rfc4648 { padding: false }, body)
        .map(Zeroizing::new)
        .ok_or_else(|| OtpError::InvalidSecret("cannot decode base32".to_string()))?;

    if bytes.is_empty() {
        return Err(OtpError::InvalidSecret(
            "secret decoded to empty byte string".to_string(),
        ));
    }

    Ok(bytes)
}
