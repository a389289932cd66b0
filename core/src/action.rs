pub mod error {
    #[allow(unused_imports)]
    pub(crate) use anyhow::{anyhow, bail, ensure, Context as _};
    pub use anyhow::{Error, Result};
}

use std::future::Future;

use error::*;
use indicatif::{ProgressBar, ProgressStyle};
use passupd_store::{GenerateOptions, Store};
use passupd_webclient::Session;

use crate::classify::{AutoCredential, Classification, Classifier, ManualCredential};
use crate::instance::InstanceCatalog;
use crate::interactive::{Prompter, SpinnerExt as _};
use crate::rotate::{self, OverwriteOutcome};
use crate::sequencer::{FlowAborted, Sequencer, SequencerOptions};
use crate::style::Reporter;

/// Everything one update run needs, injected by the caller.
pub struct UpdateContext<'a, S: Store + ?Sized> {
    pub store: &'a S,
    pub catalog: &'a InstanceCatalog,
    pub reporter: &'a dyn Reporter,
    pub prompter: &'a dyn Prompter,
    pub sequencer: SequencerOptions,
    /// Show a spinner while a browser flow runs.
    pub progress: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateReport {
    /// Rotated through the browser, stored in place.
    pub rotated: Vec<String>,
    /// Rotated through the browser, stored at `<path>.new`.
    pub side_by_side: Vec<String>,
    /// Updates that did not go through.
    pub failed: Vec<String>,
    /// Manual entries regenerated after confirmation.
    pub regenerated: Vec<String>,
    /// Manual entries left as they were.
    pub skipped: Vec<String>,
}

impl UpdateReport {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

pub async fn classify_paths<S: Store + ?Sized>(
    store: &S,
    catalog: &InstanceCatalog,
    paths: &[String],
) -> Result<Classification> {
    Classifier::new(store, catalog)
        .classify_all(paths)
        .await
        .context("Failed to index the password store")
}

pub fn report_classification(c: &Classification, reporter: &dyn Reporter) {
    for m in &c.manual {
        log::warn!("{} {}", m.path(), m.reason);
    }
    for i in &c.invalid {
        log::warn!("{} {}", i.path, i.reason);
    }

    reporter.success("The following passwords are going to be automatically updated:");
    reporter.listing(
        &c.automatic
            .iter()
            .map(|a| format!("{} (instance: {})", a.path(), a.instance.name))
            .collect::<Vec<_>>(),
    );

    reporter.warning("The following passwords are not going to be automatically updated:");
    reporter.listing(
        &c.manual
            .iter()
            .map(|m| format!("{}: {}", m.path(), m.reason))
            .chain(c.invalid.iter().map(|i| format!("{}: {}", i.path, i.reason)))
            .collect::<Vec<_>>(),
    );
}

/// Classify `paths`, rotate the automatic ones in one browser session, then
/// offer in-place regeneration for the manual ones.
///
/// Nothing is touched when any path is invalid. `open_session` is only called
/// when there is at least one automatic update; the session is closed once,
/// whatever happened to the updates run inside it.
pub async fn update_passwords<S, F, Fut>(
    ctx: &UpdateContext<'_, S>,
    paths: &[String],
    open_session: F,
) -> Result<UpdateReport>
where
    S: Store + ?Sized,
    F: FnOnce() -> Fut,
    Fut: Future<Output = passupd_webclient::Result<Box<dyn Session>>>,
{
    let classification = self::classify_paths(ctx.store, ctx.catalog, paths).await?;
    self::report_classification(&classification, ctx.reporter);

    let Classification {
        automatic,
        manual,
        invalid,
    } = classification;

    if !invalid.is_empty() {
        for i in &invalid {
            ctx.reporter.error(&format!("{} {}", i.path, i.reason));
        }
        bail!(
            "{} password(s) cannot be updated at all, nothing has been changed",
            invalid.len()
        );
    }

    let mut report = UpdateReport::default();

    if !automatic.is_empty() {
        self::update_automatic(ctx, &automatic, open_session, &mut report).await;
    }

    if manual.is_empty() {
        ctx.reporter.message("No manual passwords to update");
    } else {
        self::update_manual(ctx, &manual, &mut report).await;
    }

    Ok(report)
}

async fn update_automatic<S, F, Fut>(
    ctx: &UpdateContext<'_, S>,
    automatic: &[AutoCredential],
    open_session: F,
    report: &mut UpdateReport,
) where
    S: Store + ?Sized,
    F: FnOnce() -> Fut,
    Fut: Future<Output = passupd_webclient::Result<Box<dyn Session>>>,
{
    let mut session = match open_session().await {
        Ok(s) => s,
        Err(e) => {
            ctx.reporter
                .error(&format!("Cannot open a browser session: {}", e));
            report
                .failed
                .extend(automatic.iter().map(|a| a.path().to_owned()));
            return;
        }
    };

    let sequencer = Sequencer::new(ctx.store, ctx.sequencer);
    for auto in automatic {
        let path = auto.path();
        ctx.reporter.message(&format!("Updating password for {}", path));

        let spinner = ctx.progress.then(|| {
            let bar = ProgressBar::new_spinner().with_message(format!("Running {}", auto.instance.name));
            if let Ok(style) = ProgressStyle::default_spinner().template("{spinner} {msg}") {
                bar.set_style(style);
            }
            bar.with_ticking()
        });

        let flow = sequencer.run(auto, session.as_mut()).await;

        if let Some(spinner) = spinner {
            spinner.lock().await.finish_and_clear();
        }

        let new_password = match flow {
            Ok(p) => p,
            Err(FlowAborted {
                error,
                new_password,
            }) => {
                ctx.reporter.warning(&format!("{}: {:#}", path, anyhow!(error)));
                if let Some(p) = new_password {
                    self::keep_unconfirmed_password(ctx, path, &p).await;
                }
                report.failed.push(path.to_owned());
                continue;
            }
        };

        match rotate::overwrite(ctx.store, path, &new_password, ctx.reporter).await {
            Ok(OverwriteOutcome::Replaced) => {
                ctx.reporter.success(&format!("{} updated", path));
                report.rotated.push(path.to_owned());
            }
            Ok(OverwriteOutcome::SideBySide { path: side }) => {
                ctx.reporter
                    .warning(&format!("{} updated, new password stored in {}", path, side));
                report.side_by_side.push(path.to_owned());
            }
            Err(e) => {
                ctx.reporter.error(&format!("{:#}", anyhow!(e)));
                report.failed.push(path.to_owned());
            }
        }
    }

    if let Err(e) = session.close().await {
        log::warn!("Failed to close the browser session: {}", e);
    }
}

/// The site may already use `new_password` although the flow failed, so it
/// must not be dropped.
async fn keep_unconfirmed_password<S: Store + ?Sized>(
    ctx: &UpdateContext<'_, S>,
    path: &str,
    new_password: &str,
) {
    match rotate::save_side_by_side(ctx.store, path, new_password, ctx.reporter).await {
        Ok(side) => ctx.reporter.warning(&format!(
            "The site may already use the new password, it is stored in {}",
            side
        )),
        Err(e) => ctx.reporter.error(&format!("{:#}", anyhow!(e))),
    }
}

async fn update_manual<S: Store + ?Sized>(
    ctx: &UpdateContext<'_, S>,
    manual: &[ManualCredential],
    report: &mut UpdateReport,
) {
    ctx.reporter.message("Manual passwords update");
    for m in manual {
        let path = m.path();
        ctx.reporter.message(&format!("Updating password for {}", path));

        let confirmed = match ctx
            .prompter
            .confirm("Are you ready to generate a new password?")
        {
            Ok(yes) => yes,
            Err(e) => {
                ctx.reporter
                    .warning(&format!("No answer ({}), leaving {} untouched", e, path));
                false
            }
        };
        if !confirmed {
            report.skipped.push(path.to_owned());
            continue;
        }

        let opts = GenerateOptions {
            in_place: true,
            ..Default::default()
        };
        match ctx.store.generate(path, opts).await {
            Ok(_) => {
                ctx.reporter.success(&format!("{} regenerated", path));
                report.regenerated.push(path.to_owned());
            }
            Err(e) => {
                ctx.reporter
                    .warning(&format!("{}: {:#}", path, anyhow!(e)));
                report.failed.push(path.to_owned());
            }
        }
    }
}
