use std::path::PathBuf;

use anyhow::ensure;
use passupd_core::{
    action::{self, UpdateContext},
    interactive::TerminalPrompter,
    print_success,
    style::ConsoleReporter,
};
use passupd_webclient::{Browser, Url};

use super::{GlobalArgs, SubcmdResult};
use crate::config::GlobalConfig;

#[derive(Debug, clap::Args)]
pub struct Args {
    /// Entries to update, as paths in the store
    #[arg(required = true)] // positional argument
    pub paths: Vec<String>,

    /// Directory holding the instance descriptors [default: $UPDATER_DIR]
    #[arg(long)]
    pub instances_dir: Option<PathBuf>,

    /// Browser driving the updates: firefox, chrome or form
    #[arg(long)]
    pub browser: Option<Browser>,

    /// Run the browser with its window
    #[arg(long)]
    pub show_browser: bool,

    /// WebDriver endpoint
    #[arg(long)]
    pub webdriver_url: Option<Url>,
}

pub async fn exec(args: &Args, global_args: &GlobalArgs) -> SubcmdResult {
    let cfg = GlobalConfig::from_file_and_args(global_args)?;
    let store = cfg.store()?;
    let catalog = cfg.catalog(args.instances_dir.as_deref())?;

    let mut browser = cfg.core.browser.clone();
    args.browser.map(|b| browser.kind = b);
    args.webdriver_url.as_ref().map(|u| browser.webdriver_url = u.clone());
    if args.show_browser {
        browser.headless = false;
    }
    let session_opts = browser.session_options();

    let ctx = UpdateContext {
        store: &store,
        catalog: &catalog,
        reporter: &ConsoleReporter,
        prompter: &TerminalPrompter,
        sequencer: cfg.core.sequencer.options(),
        progress: true,
    };

    let report = action::update_passwords(&ctx, &args.paths, move || async move {
        passupd_webclient::new_session(&session_opts).await
    })
    .await?;

    ensure!(
        !report.has_failures(),
        "{} password(s) were not updated: {}",
        report.failed.len(),
        report.failed.join(", ")
    );
    print_success!(
        "Done: {} rotated, {} regenerated, {} left as is",
        report.rotated.len() + report.side_by_side.len(),
        report.regenerated.len(),
        report.skipped.len()
    );
    Ok(())
}
