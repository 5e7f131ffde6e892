use anyhow::{Result, anyhow};
use copypasta::{ClipboardContext, ClipboardProvider};
use std::io::Write;
use std::process::{Command, Stdio};

/// Внешние утилиты для Linux: (переменная окружения сессии, команда, аргументы).
#[cfg(target_os = "linux")]
const LINUX_TOOLS: &[(&str, &str, &[&str])] = &[
    ("WAYLAND_DISPLAY", "wl-copy", &[]),
    ("DISPLAY", "xclip", &["-selection", "clipboard"]),
    ("DISPLAY", "xsel", &["--clipboard", "--input"]),
];

/// Положить код в буфер обмена.
///
/// На Linux сначала пробуем wl-copy/xclip/xsel (copypasta в X11 теряет буфер
/// при выходе процесса), затем copypasta.
pub fn copy_to_clipboard(value: &str) -> Result<()> {
    #[cfg(target_os = "linux")]
    {
        let mut has_session = false;
        for (env, cmd, args) in LINUX_TOOLS {
            if std::env::var_os(env).is_none() {
                continue;
            }
            has_session = true;
            match pipe_to(cmd, args, value) {
                Ok(()) => return Ok(()),
                Err(e) => log::debug!("clipboard tool {} failed: {}", cmd, e),
            }
        }
        if !has_session {
            return Err(anyhow!(
                "No GUI clipboard detected (no DISPLAY or WAYLAND_DISPLAY). \
                 Use:\n  otpm code <target> --plain | xclip -selection clipboard"
            ));
        }
    }

    let mut ctx =
        ClipboardContext::new().map_err(|e| anyhow!("Failed to initialize clipboard: {e}"))?;
    ctx.set_contents(value.to_string())
        .map_err(|e| anyhow!("Failed to copy to clipboard: {e}"))?;
    Ok(())
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn pipe_to(cmd: &str, args: &[&str], value: &str) -> Result<()> {
    let mut child = Command::new(cmd)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| anyhow!("failed to spawn {}: {e}", cmd))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(value.as_bytes())?;
    }

    let status = child.wait()?;
    if !status.success() {
        return Err(anyhow!("{} exited with status {}", cmd, status));
    }
    Ok(())
}
