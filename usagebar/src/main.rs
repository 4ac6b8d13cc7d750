//! usagebar - Claude usage tracker for the menu bar
//!
//! `usagebar run` keeps the refresh loop going, writes the current icon as a
//! PNG for the tray shell and sends threshold notifications. The other
//! subcommands are one-shot views and settings edits over the same store.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Preferences: $XDG_DATA_HOME/usagebar/preferences.db (~/.local/share/usagebar/preferences.db)
//! - Logs and icon: $XDG_STATE_HOME/usagebar/ (~/.local/state/usagebar/)
//! - Config: $XDG_CONFIG_HOME/usagebar/config.toml (~/.config/usagebar/config.toml)

mod display;
mod process_lock;
mod run;

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use usagebar_core::icon::{render, IconParams, IconSink, PngFileSink};
use usagebar_core::setup::{self, ValidationStatus};
use usagebar_core::store::PrefKey;
use usagebar_core::{
    Appearance, ClaudeClient, Config, Credentials, EventBus, IconStyle, Preferences, SqliteStore,
    UsageSource,
};

#[derive(Parser)]
#[command(name = "usagebar")]
#[command(about = "Track Claude usage from the menu bar")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the refresh loop until interrupted
    Run {
        /// Log threshold crossings instead of showing desktop notifications
        #[arg(long)]
        no_notify: bool,

        /// Don't print usage updates to stdout
        #[arg(short, long)]
        quiet: bool,
    },

    /// Fetch usage once, store it and print it
    Refresh {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Show the last stored usage without touching the network
    Status {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Validate a session key and save it
    Setup {
        /// Session key (read from stdin when omitted)
        #[arg(long)]
        session_key: Option<String>,

        /// Organization to track (defaults to the first one)
        #[arg(long)]
        organization: Option<String>,

        /// Console session key for API credit tracking
        #[arg(long, requires = "api_organization")]
        api_session_key: Option<String>,

        /// Console organization for API credit tracking
        #[arg(long, requires = "api_session_key")]
        api_organization: Option<String>,
    },

    /// List organizations available to a session key
    Orgs {
        /// Session key (defaults to the stored one)
        #[arg(long)]
        session_key: Option<String>,
    },

    /// Read and change preferences
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Render the menu-bar icon to a PNG file
    Icon {
        /// Percentage to draw (defaults to the stored session usage)
        #[arg(long)]
        percentage: Option<f64>,

        /// battery, progress_bar, percentage_text, ring or dot
        #[arg(long)]
        style: Option<IconStyle>,

        /// light or dark
        #[arg(long)]
        appearance: Option<Appearance>,

        /// Draw the fill in the text color
        #[arg(long)]
        monochrome: Option<bool>,

        /// Output file (defaults to the configured icon path)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print every preference
    List,

    /// Print one preference
    Get { key: PrefKey },

    /// Change one preference
    Set { key: PrefKey, value: String },

    /// Remove every stored preference
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },
}

/// Shared handles built once per invocation
pub struct AppContext {
    pub config: Config,
    pub store_path: PathBuf,
    pub prefs: Preferences,
    pub events: EventBus,
}

impl AppContext {
    fn open(config: Config) -> Result<Self> {
        let store_path = Config::preferences_path();
        tracing::debug!(path = %store_path.display(), "Opening preference store");
        let store = SqliteStore::open(&store_path).context("failed to open preference store")?;

        let events = EventBus::new();
        let prefs = Preferences::new(Arc::new(store))
            .with_events(events.clone())
            .with_legacy_key_path(config.legacy_session_key_path());

        Ok(Self {
            config,
            store_path,
            prefs,
            events,
        })
    }

    fn client(&self) -> Result<ClaudeClient> {
        ClaudeClient::new(&self.config).context("failed to create HTTP client")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Ensure XDG environment variables are set before using core library
    Config::ensure_xdg_env();

    let config = Config::load().context("failed to load configuration")?;

    // A foreground `run` shows refresh failures as they happen
    let mirror_warnings = matches!(args.command, Command::Run { quiet: false, .. });
    let _log_guard = usagebar_core::logging::init(&config.logging, mirror_warnings)
        .context("failed to initialize logging")?;

    let ctx = AppContext::open(config)?;

    match args.command {
        Command::Run { no_notify, quiet } => run::run(ctx, run::RunOptions { no_notify, quiet }).await,
        Command::Refresh { json } => cmd_refresh(&ctx, json).await,
        Command::Status { json } => cmd_status(&ctx, json),
        Command::Setup {
            session_key,
            organization,
            api_session_key,
            api_organization,
        } => {
            cmd_setup(
                &ctx,
                session_key,
                organization,
                api_session_key.zip(api_organization),
            )
            .await
        }
        Command::Orgs { session_key } => cmd_orgs(&ctx, session_key).await,
        Command::Config { action } => cmd_config(&ctx, action),
        Command::Icon {
            percentage,
            style,
            appearance,
            monochrome,
            output,
        } => cmd_icon(
            &ctx,
            IconOverrides {
                percentage,
                style,
                appearance,
                monochrome,
            },
            output,
        ),
    }
}

async fn cmd_refresh(ctx: &AppContext, json: bool) -> Result<()> {
    let creds = ctx
        .prefs
        .credentials()?
        .context("no session key configured; run `usagebar setup` first")?;
    let client = ctx.client()?;

    let usage = client
        .fetch_usage(&creds)
        .await
        .context("failed to fetch usage")?;
    ctx.prefs
        .save_usage_snapshot(&usage)
        .context("failed to store usage snapshot")?;

    let api_usage = match ctx.prefs.api_credentials()? {
        Some(api_creds) => match client.fetch_api_usage(&api_creds).await {
            Ok(api_usage) => {
                ctx.prefs.save_api_usage_snapshot(&api_usage)?;
                Some(api_usage)
            }
            Err(e) => {
                eprintln!("warning: failed to fetch API usage: {}", e);
                ctx.prefs.load_api_usage_snapshot()?
            }
        },
        None => None,
    };

    let service_status = if ctx.prefs.check_service_status()? {
        match client.fetch_service_status().await {
            Ok(status) => Some(status),
            Err(e) => {
                eprintln!("warning: failed to fetch service status: {}", e);
                None
            }
        }
    } else {
        None
    };

    // Keep the tray icon current even when no loop is running
    let params = icon_params(ctx, IconOverrides::default(), Some(usage.session_percentage))?;
    let key = params.key();
    if let Err(e) = PngFileSink::new(ctx.config.icon_path()).deliver(&key, &render(&params)) {
        tracing::warn!(error = %e, "Failed to write icon after refresh");
    }

    let report = display::UsageReport {
        usage: Some(&usage),
        api_usage: api_usage.as_ref(),
        service_status: service_status.as_ref(),
        popover_style: ctx.prefs.popover_style()?,
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&report.to_json())?);
    } else {
        print!("{}", report.render(chrono::Utc::now()));
    }
    Ok(())
}

fn cmd_status(ctx: &AppContext, json: bool) -> Result<()> {
    let usage = ctx.prefs.load_usage_snapshot()?;
    let api_usage = ctx.prefs.load_api_usage_snapshot()?;

    let report = display::UsageReport {
        usage: usage.as_ref(),
        api_usage: api_usage.as_ref(),
        service_status: None,
        popover_style: ctx.prefs.popover_style()?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report.to_json())?);
        return Ok(());
    }

    if usage.is_none() {
        println!("No usage recorded yet.");
        if !ctx.prefs.has_completed_setup()? {
            println!("Run `usagebar setup` to connect your account.");
        } else {
            println!("Run `usagebar refresh` or `usagebar run` to fetch it.");
        }
        return Ok(());
    }

    print!("{}", report.render(chrono::Utc::now()));
    Ok(())
}

fn read_secret_line(prompt: &str) -> Result<String> {
    eprint!("{}", prompt);
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read from stdin")?;
    Ok(line.trim().to_string())
}

async fn cmd_setup(
    ctx: &AppContext,
    session_key: Option<String>,
    organization: Option<String>,
    api: Option<(String, String)>,
) -> Result<()> {
    let session_key = match session_key {
        Some(key) => key,
        None => read_secret_line("Session key: ")?,
    };
    let client = ctx.client()?;

    let status = setup::complete_setup(&ctx.prefs, &client, &session_key, organization.as_deref())
        .await
        .context("failed to save setup")?;
    report_validation(&status)?;
    println!("Setup complete.");

    if let Some((api_key, api_org)) = api {
        let creds = Credentials {
            session_key: api_key,
            organization_id: api_org,
        };
        let status = setup::enable_api_tracking(&ctx.prefs, &client, &creds)
            .await
            .context("failed to save API credentials")?;
        // The session key above is already saved; only this step failed
        report_validation(&status)
            .context("session key saved, but API credit tracking was not enabled")?;
    }

    Ok(())
}

fn report_validation(status: &ValidationStatus) -> Result<()> {
    match status {
        ValidationStatus::Success(msg) => {
            println!("✓ {}", msg);
            Ok(())
        }
        ValidationStatus::Error(msg) => anyhow::bail!("{}", msg),
    }
}

async fn cmd_orgs(ctx: &AppContext, session_key: Option<String>) -> Result<()> {
    let session_key = match session_key {
        Some(key) => key,
        None => ctx
            .prefs
            .session_key()?
            .context("no session key configured; pass --session-key or run `usagebar setup`")?,
    };
    let selected = ctx.prefs.organization_id()?;

    let orgs = ctx
        .client()?
        .fetch_organizations(&session_key)
        .await
        .context("failed to list organizations")?;

    if orgs.is_empty() {
        println!("No organizations found.");
        return Ok(());
    }

    for org in orgs {
        let marker = if selected.as_deref() == Some(org.uuid.as_str()) {
            "*"
        } else {
            " "
        };
        println!("{} {}  {}", marker, org.uuid, org.name);
    }
    Ok(())
}

fn cmd_config(ctx: &AppContext, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::List => {
            for key in PrefKey::ALL {
                println!("{:<24} {}", key.as_str(), ctx.prefs.display_value(key)?);
            }
            for key in ctx.prefs.unknown_keys()? {
                println!("{:<24} (unrecognized)", key);
            }
        }
        ConfigAction::Get { key } => {
            println!("{}", ctx.prefs.display_value(key)?);
        }
        ConfigAction::Set { key, value } => {
            ctx.prefs
                .set_from_str(key, &value)
                .with_context(|| format!("failed to set {}", key.as_str()))?;
            let shown = if key.is_secret() {
                "<set>".to_string()
            } else {
                ctx.prefs.display_value(key)?
            };
            println!("{} = {}", key.as_str(), shown);
        }
        ConfigAction::Reset { yes } => {
            if !yes {
                anyhow::bail!("refusing to reset preferences without --yes");
            }
            ctx.prefs.reset()?;
            println!("Preferences reset.");
        }
    }
    Ok(())
}

/// Icon settings given on the command line, falling back to preferences
#[derive(Default)]
struct IconOverrides {
    percentage: Option<f64>,
    style: Option<IconStyle>,
    appearance: Option<Appearance>,
    monochrome: Option<bool>,
}

fn icon_params(
    ctx: &AppContext,
    overrides: IconOverrides,
    fallback_percentage: Option<f64>,
) -> Result<IconParams> {
    let percentage = match overrides.percentage.or(fallback_percentage) {
        Some(p) => p,
        None => ctx
            .prefs
            .load_usage_snapshot()?
            .map(|u| u.session_percentage)
            .unwrap_or(0.0),
    };

    Ok(IconParams {
        percentage,
        style: match overrides.style {
            Some(style) => style,
            None => ctx.prefs.icon_style()?,
        },
        appearance: match overrides.appearance {
            Some(appearance) => appearance,
            None => ctx.prefs.appearance()?,
        },
        monochrome: match overrides.monochrome {
            Some(monochrome) => monochrome,
            None => ctx.prefs.monochrome_icon()?,
        },
    })
}

fn cmd_icon(ctx: &AppContext, overrides: IconOverrides, output: Option<PathBuf>) -> Result<()> {
    let params = icon_params(ctx, overrides, None)?;
    let image = render(&params);
    let path = output.unwrap_or_else(|| ctx.config.icon_path());

    PngFileSink::new(path.clone())
        .deliver(&params.key(), &image)
        .with_context(|| format!("failed to write icon to {}", path.display()))?;

    println!(
        "Wrote {}x{} {} icon ({}) to {}",
        image.width(),
        image.height(),
        params.style.as_str(),
        usagebar_core::format::format_percentage(params.percentage),
        path.display()
    );
    Ok(())
}
