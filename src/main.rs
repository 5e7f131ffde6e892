mod clipboard;
mod config;
mod entry;
mod error;
mod kv;
mod otp;
mod prompt;
mod scheduler;
mod secret;
mod store;
mod uri;

use crate::clipboard::copy_to_clipboard;
use crate::config::{Settings, default_root};
use crate::entry::{Algorithm, OtpConfig};
use crate::kv::FileKv;
use crate::otp::{Clock, SystemClock, generate_code, remaining_seconds};
use crate::prompt::{prompt_optional, prompt_secret, prompt_string};
use crate::scheduler::Scheduler;
use crate::store::ConfigStore;
use anyhow::Context;
use clap::{Parser, Subcommand};
use log::{debug, info};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "otpm", version, about = "Terminal TOTP authenticator")]
struct Cli {
    /// Store directory (defaults to the platform data dir)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Add a new OTP config (prompts for name, issuer and secret)
    ///
    /// The secret prompt also accepts a full otpauth://totp/... URI.
    Add {
        #[arg(long)]
        algorithm: Option<Algorithm>,
        #[arg(long)]
        digits: Option<u32>,
        #[arg(long)]
        period: Option<u32>,
    },

    /// Replace fields of an existing config
    Edit {
        /// Id, id prefix or name
        target: String,
        #[arg(long)]
        name: Option<String>,
        /// New issuer; pass an empty string to clear it
        #[arg(long)]
        issuer: Option<String>,
        #[arg(long)]
        algorithm: Option<Algorithm>,
        #[arg(long)]
        digits: Option<u32>,
        #[arg(long)]
        period: Option<u32>,
        /// Prompt for a new secret
        #[arg(long)]
        secret: bool,
    },

    /// List configs
    Ls,

    /// Print the current code
    Code {
        /// Id, id prefix or name
        target: String,
        /// Print only the code
        #[arg(long)]
        plain: bool,
    },

    /// Copy the current code to the clipboard
    Clip {
        /// Id, id prefix or name
        target: String,
    },

    /// Remove a config
    Rm {
        /// Id, id prefix or name
        target: String,
    },

    /// Print the otpauth:// URI of a config
    Uri {
        /// Id, id prefix or name
        target: String,
    },

    /// Show all codes, refreshed every tick
    Watch {
        /// Render a single frame and exit
        #[arg(long)]
        once: bool,
    },

    /// Import a JSON array of otpauth:// URIs
    Import {
        file: PathBuf,
        /// Replace all existing configs instead of appending
        #[arg(long)]
        replace: bool,
    },

    /// Export all configs as a JSON array of otpauth:// URIs
    Export {
        /// Output file (stdout when omitted)
        file: Option<PathBuf>,
    },
}

struct App {
    settings: Settings,
    store: ConfigStore<FileKv>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let root = match cli.store {
        Some(dir) => dir,
        None => default_root()?,
    };
    let settings = Settings::load(&root)?;
    debug!("Using store at {} with {:?}", root.display(), settings);
    let store = ConfigStore::new(
        FileKv::new(&root),
        settings.storage_key.clone(),
        settings.unique_names,
    );
    let app = App { settings, store };

    match cli.command {
        Commands::Add {
            algorithm,
            digits,
            period,
        } => cmd_add(&app, algorithm, digits, period)?,
        Commands::Edit {
            target,
            name,
            issuer,
            algorithm,
            digits,
            period,
            secret,
        } => cmd_edit(&app, &target, name, issuer, algorithm, digits, period, secret)?,
        Commands::Ls => cmd_ls(&app),
        Commands::Code { target, plain } => cmd_code(&app, &target, plain)?,
        Commands::Clip { target } => cmd_clip(&app, &target)?,
        Commands::Rm { target } => cmd_rm(&app, &target)?,
        Commands::Uri { target } => println!("{}", uri::serialize(&app.store.find(&target)?)),
        Commands::Watch { once } => cmd_watch(&app, once)?,
        Commands::Import { file, replace } => cmd_import(&app, &file, replace)?,
        Commands::Export { file } => cmd_export(&app, file)?,
    }

    Ok(())
}

fn cmd_add(
    app: &App,
    algorithm: Option<Algorithm>,
    digits: Option<u32>,
    period: Option<u32>,
) -> anyhow::Result<()> {
    let defaults = &app.settings.defaults;

    let raw = prompt_secret("Secret (base32) OR otpauth:// URI: ")?;
    let raw = raw.trim();

    let config = if raw.starts_with("otpauth://") {
        uri::parse(raw, defaults)?
    } else {
        let name = prompt_string("Name: ")?;
        let issuer = prompt_optional("Issuer (optional): ")?;
        OtpConfig::new(
            &name,
            issuer.as_deref(),
            raw,
            algorithm.unwrap_or(defaults.algorithm),
            digits.unwrap_or(defaults.digits),
            period.unwrap_or(defaults.period),
        )?
    };

    let label = config.label();
    app.store.add(config)?;
    info!("Added OTP config {}", label);
    println!("Saved {}", label);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_edit(
    app: &App,
    target: &str,
    name: Option<String>,
    issuer: Option<String>,
    algorithm: Option<Algorithm>,
    digits: Option<u32>,
    period: Option<u32>,
    new_secret: bool,
) -> anyhow::Result<()> {
    let mut config = app.store.find(target)?;

    if let Some(name) = name {
        config.name = name.trim().to_string();
    }
    if let Some(issuer) = issuer {
        let issuer = issuer.trim();
        config.issuer = if issuer.is_empty() {
            None
        } else {
            Some(issuer.to_string())
        };
    }
    if let Some(algorithm) = algorithm {
        config.algorithm = algorithm;
    }
    if let Some(digits) = digits {
        config.digits = digits;
    }
    if let Some(period) = period {
        config.period = period;
    }
    if new_secret {
        config.secret = secret::normalize_secret(&prompt_secret("New secret (base32): ")?);
    }

    config.validate()?;
    let label = config.label();
    app.store.update(config)?;
    println!("Updated {}", label);
    Ok(())
}

fn cmd_ls(app: &App) {
    for c in app.store.list() {
        let short_id: String = c.id.chars().take(8).collect();
        println!(
            "{}  {:<24} {}",
            short_id,
            c.name,
            c.issuer.as_deref().unwrap_or("")
        );
    }
}

fn cmd_code(app: &App, target: &str, plain: bool) -> anyhow::Result<()> {
    let config = app.store.find(target)?;
    let clock = SystemClock;
    let code = generate_code(&config, &clock)?;

    if plain {
        println!("{code}");
    } else {
        let left = remaining_seconds(clock.now_unix(), config.period);
        println!("{code}  ({left}s left)  {}", config.label());
    }
    Ok(())
}

fn cmd_clip(app: &App, target: &str) -> anyhow::Result<()> {
    let config = app.store.find(target)?;
    let code = generate_code(&config, &SystemClock)?;
    copy_to_clipboard(&code)?;
    println!("Code for {} copied to clipboard.", config.label());
    Ok(())
}

fn cmd_rm(app: &App, target: &str) -> anyhow::Result<()> {
    let config = app.store.find(target)?;
    if app.store.remove(&config.id)? {
        println!("Removed {}", config.label());
    } else {
        println!("{} was already removed", config.label());
    }
    Ok(())
}

fn render(scheduler: &Scheduler, out: &mut impl Write) -> std::io::Result<()> {
    for v in scheduler.views() {
        match v.code {
            Ok(ref code) => writeln!(
                out,
                "{:>10}  {:>3}/{}s  {}",
                code, v.remaining, v.period, v.label
            )?,
            Err(ref e) => writeln!(
                out,
                "{:>10}  {:>3}/{}s  {}  ({})",
                "------", v.remaining, v.period, v.label, e
            )?,
        }
    }
    out.flush()
}

fn cmd_watch(app: &App, once: bool) -> anyhow::Result<()> {
    let clock = SystemClock;
    let mut scheduler = Scheduler::new();
    scheduler.sync(&app.store.list(), clock.now_unix());

    if scheduler.is_empty() {
        println!("No OTP configs yet, add one with `otpm add`.");
        return Ok(());
    }

    let stdout = std::io::stdout();
    if once {
        render(&scheduler, &mut stdout.lock())?;
        return Ok(());
    }

    let tick = Duration::from_millis(app.settings.tick_millis.max(100));
    loop {
        let now = clock.now_unix();
        scheduler.sync(&app.store.list(), now);
        scheduler.tick(now);

        let mut out = stdout.lock();
        // очистить экран и вернуть курсор
        write!(out, "\x1b[2J\x1b[H")?;
        render(&scheduler, &mut out)?;
        drop(out);

        std::thread::sleep(tick);
    }
}

fn cmd_import(app: &App, file: &PathBuf, replace: bool) -> anyhow::Result<()> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("cannot read import file {}", file.display()))?;
    let report = uri::parse_many(&json, &app.settings.defaults)?;
    let imported = report.configs.len();

    if replace {
        app.store.replace_all(report.configs)?;
    } else {
        app.store.extend(report.configs)?;
    }

    info!("Imported {} OTP configs from {}", imported, file.display());
    println!("Imported {} configs, skipped {}", imported, report.skipped);
    Ok(())
}

fn cmd_export(app: &App, file: Option<PathBuf>) -> anyhow::Result<()> {
    let configs = app.store.list();
    let json = uri::serialize_many(&configs)?;
    match file {
        Some(path) => {
            std::fs::write(&path, json)
                .with_context(|| format!("cannot write {}", path.display()))?;
            println!("Exported {} configs to {}", configs.len(), path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
