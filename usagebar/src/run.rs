//! `usagebar run`: the long-lived refresh loop.
//!
//! The status manager only hears about settings changes made in this
//! process. Edits from `usagebar config set` land in the shared store from
//! another process, so the loop also polls the display-related preferences
//! and republishes any change on the local event bus.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use usagebar_core::icon::PngFileSink;
use usagebar_core::notify::{DesktopNotifier, LogNotifier, Notifier};
use usagebar_core::{
    AppEvent, Appearance, Config, EventBus, IconStyle, PopoverStyle, Preferences, StatusManager,
};

use crate::display::UsageReport;
use crate::process_lock::acquire_run_guard;
use crate::AppContext;

/// How often preferences written by other processes are picked up
const PREF_POLL_INTERVAL: Duration = Duration::from_secs(2);

pub struct RunOptions {
    pub no_notify: bool,
    pub quiet: bool,
}

pub async fn run(ctx: AppContext, opts: RunOptions) -> Result<()> {
    let _guard = acquire_run_guard(&ctx.store_path)?;

    if !ctx.prefs.has_completed_setup()? {
        anyhow::bail!("setup has not been completed; run `usagebar setup` first");
    }

    let client = Arc::new(ctx.client()?);
    let notifier: Arc<dyn Notifier> = if opts.no_notify {
        Arc::new(LogNotifier)
    } else {
        Arc::new(DesktopNotifier)
    };
    let icon_path = ctx.config.icon_path();

    let manager = StatusManager::new(ctx.prefs.clone(), client, ctx.events.clone())
        .with_notifier(notifier)
        .with_icon_sink(Arc::new(PngFileSink::new(icon_path.clone())))
        .with_thresholds(&ctx.config.notifications.thresholds)
        .start();

    let (stop_tx, mut stop_rx) = mpsc::unbounded_channel();
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })
    .context("failed to set Ctrl+C handler")?;

    if !opts.quiet {
        println!(
            "usagebar running every {}s, icon at {} (Ctrl+C to stop)",
            ctx.prefs.refresh_interval()?.as_secs_f64(),
            icon_path.display()
        );
        println!("Logs: {}", Config::state_dir().display());
    }

    let mut state_rx = manager.subscribe();
    let mut watcher = PreferenceWatcher::read(&ctx.prefs)?;
    let mut poll = tokio::time::interval(PREF_POLL_INTERVAL);
    let mut last_printed: Option<DateTime<Utc>> = None;

    loop {
        tokio::select! {
            _ = stop_rx.recv() => {
                tracing::info!("Interrupted, shutting down");
                break;
            }
            changed = state_rx.changed() => {
                if changed.is_err() {
                    tracing::warn!("Status manager stopped unexpectedly");
                    break;
                }
                let state = state_rx.borrow_and_update().clone();
                let fetched_at = state.usage.as_ref().map(|u| u.fetched_at);
                if !opts.quiet && fetched_at.is_some() && fetched_at != last_printed {
                    last_printed = fetched_at;
                    let report = UsageReport {
                        usage: state.usage.as_ref(),
                        api_usage: state.api_usage.as_ref(),
                        service_status: state.service_status.as_ref(),
                        popover_style: watcher.popover_style,
                    };
                    println!("{}", report.compact_line(Utc::now()));
                }
            }
            _ = poll.tick() => {
                if let Err(e) = watcher.poll(&ctx.prefs, &ctx.events) {
                    tracing::warn!(error = %e, "Failed to poll preferences");
                }
            }
        }
    }

    let stats = manager.state().stats;
    manager.shutdown().await;

    if !opts.quiet {
        println!(
            "Stopped after {} ticks ({} usage ok, {} failed)",
            stats.ticks, stats.usage_ok, stats.usage_err
        );
    }
    Ok(())
}

/// Last seen values of the settings the manager reacts to
#[derive(Debug, Clone, PartialEq)]
struct PreferenceWatcher {
    refresh_interval: Duration,
    icon_style: IconStyle,
    popover_style: PopoverStyle,
    appearance: Appearance,
    monochrome: bool,
}

impl PreferenceWatcher {
    fn read(prefs: &Preferences) -> usagebar_core::Result<Self> {
        Ok(Self {
            refresh_interval: prefs.refresh_interval()?,
            icon_style: prefs.icon_style()?,
            popover_style: prefs.popover_style()?,
            appearance: prefs.appearance()?,
            monochrome: prefs.monochrome_icon()?,
        })
    }

    /// Re-read preferences and publish an event for each changed value.
    fn poll(&mut self, prefs: &Preferences, events: &EventBus) -> usagebar_core::Result<usize> {
        let current = Self::read(prefs)?;
        let mut changed = Vec::new();

        if current.refresh_interval != self.refresh_interval {
            changed.push(AppEvent::RefreshIntervalChanged(current.refresh_interval));
        }
        if current.icon_style != self.icon_style {
            changed.push(AppEvent::IconStyleChanged(current.icon_style));
        }
        if current.popover_style != self.popover_style {
            changed.push(AppEvent::PopoverStyleChanged(current.popover_style));
        }
        if current.appearance != self.appearance {
            changed.push(AppEvent::AppearanceChanged(current.appearance));
        }
        if current.monochrome != self.monochrome {
            changed.push(AppEvent::MonochromeChanged(current.monochrome));
        }

        *self = current;
        let count = changed.len();
        for event in changed {
            tracing::info!(?event, "Preference changed outside this process");
            events.publish(event);
        }
        Ok(count)
    }
}
