use anyhow::Result;
use std::io::{self, Write};

pub fn prompt_string(prompt: &str) -> Result<String> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut s = String::new();
    io::stdin().read_line(&mut s)?;
    Ok(s.trim_end_matches(['\r', '\n']).to_string())
}

/// Необязательное поле: пустой ввод превращается в `None`.
pub fn prompt_optional(prompt: &str) -> Result<Option<String>> {
    let s = prompt_string(prompt)?;
    let s = s.trim();
    Ok(if s.is_empty() { None } else { Some(s.to_string()) })
}

/// Секрет вводится без эха.
pub fn prompt_secret(prompt: &str) -> Result<String> {
    let s = rpassword::prompt_password(prompt)?;
    Ok(s)
}
