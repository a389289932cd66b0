//! Replays an instance's page flow in a browser session.
//!
//! The flow is a small state machine: it starts by visiting the entry url,
//! then moves through the described pages one by one. A page transition
//! happens once the expected title showed up and its form was submitted.

use std::{error::Error as StdError, fmt, time::Duration};

use passupd_store::{PolicyOverrides, Store};
use passupd_webclient::{Session, Url};

use crate::{
    classify::{AutoCredential, Credential},
    instance::{FormPage, InputKind, Instance, Page},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequencerOptions {
    /// Upper bound on waiting for a page title.
    pub title_timeout: Duration,
    pub poll_interval: Duration,
    /// Pause after a page showed up, before typing into it.
    pub settle_delay: Duration,
}

impl Default for SequencerOptions {
    fn default() -> Self {
        Self {
            title_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(250),
            settle_delay: Duration::from_millis(4000),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum InputResolutionError {
    #[error("OTP is not supported yet")]
    UnsupportedOtp,

    #[error("{0} does not have a login")]
    MissingLogin(String),

    #[error("Cannot generate a new password")]
    Generate(#[source] passupd_store::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum UpdateFlowError {
    #[error("Cannot build the entry url of instance '{instance}'")]
    EntryUrl {
        instance: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Cannot open {url}")]
    Navigate {
        url: Url,
        #[source]
        source: passupd_webclient::Error,
    },

    #[error("Page '{page}' did not show up")]
    TitleWait {
        page: String,
        #[source]
        source: passupd_webclient::Error,
    },

    #[error("Cannot resolve the input of field '{field}' on page '{page}'")]
    Input {
        page: String,
        field: String,
        #[source]
        source: InputResolutionError,
    },

    #[error("Cannot fill field '{field}' on page '{page}'")]
    Fill {
        page: String,
        field: String,
        #[source]
        source: passupd_webclient::Error,
    },

    #[error("Cannot submit page '{page}'")]
    Submit {
        page: String,
        #[source]
        source: passupd_webclient::Error,
    },

    #[error("Instance '{0}' never asks for a new password")]
    NoNewPassword(String),
}

/// A flow that stopped before its end.
#[derive(Debug)]
pub struct FlowAborted {
    pub error: UpdateFlowError,
    /// Generated before the failure. The site may already use it.
    pub new_password: Option<String>,
}

impl fmt::Display for FlowAborted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl StdError for FlowAborted {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.error.source()
    }
}

/// Supplies field values. The new password is generated on first use and
/// reused afterwards.
pub struct InputResolver<'a, S: Store + ?Sized> {
    store: &'a S,
    credential: &'a Credential,
    policy: &'a PolicyOverrides,
    new_password: Option<String>,
}

impl<'a, S: Store + ?Sized> InputResolver<'a, S> {
    pub fn new(store: &'a S, credential: &'a Credential, policy: &'a PolicyOverrides) -> Self {
        Self {
            store,
            credential,
            policy,
            new_password: None,
        }
    }

    pub async fn resolve(&mut self, kind: InputKind) -> Result<String, InputResolutionError> {
        use InputKind::*;
        log::debug!("Resolving input: {}", kind);
        match kind {
            Login => self
                .credential
                .login
                .clone()
                .ok_or_else(|| InputResolutionError::MissingLogin(self.credential.path.clone())),
            Password => Ok(self.credential.password.clone()),
            NewPassword => {
                if let Some(p) = &self.new_password {
                    return Ok(p.clone());
                }
                let p = self
                    .store
                    .generate_password(self.policy)
                    .await
                    .map_err(InputResolutionError::Generate)?;
                self.new_password = Some(p.clone());
                Ok(p)
            }
            Otp => Err(InputResolutionError::UnsupportedOtp),
        }
    }

    pub fn new_password(&self) -> Option<&str> {
        self.new_password.as_deref()
    }

    pub fn into_new_password(self) -> Option<String> {
        self.new_password
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Visit,
    Page(usize),
    Done,
}

/// Update flow of one credential.
pub struct UpdateFlow<'a, S: Store + ?Sized> {
    auto: &'a AutoCredential,
    resolver: InputResolver<'a, S>,
    opts: SequencerOptions,
    state: FlowState,
}

impl<'a, S: Store + ?Sized> UpdateFlow<'a, S> {
    pub fn new(store: &'a S, auto: &'a AutoCredential, opts: SequencerOptions) -> Self {
        Self {
            auto,
            resolver: InputResolver::new(
                store,
                &auto.credential,
                &auto.instance.password_policy,
            ),
            opts,
            state: FlowState::Visit,
        }
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    fn instance(&self) -> &'a Instance {
        &self.auto.instance
    }

    fn state_after(&self, page_index: usize) -> FlowState {
        if page_index < self.instance().pages.len() {
            FlowState::Page(page_index)
        } else {
            FlowState::Done
        }
    }

    /// Advance by one state. Once `Done`, stepping is a no-op.
    pub async fn step(&mut self, session: &mut dyn Session) -> Result<FlowState, UpdateFlowError> {
        self.state = match self.state {
            FlowState::Visit => {
                self.visit(session).await?;
                self.state_after(0)
            }
            FlowState::Page(i) => {
                match &self.instance().pages[i] {
                    Page::TwoFactor => log::info!("Skipping two-factor page (not supported)"),
                    Page::Form(page) => self.fill_page(page, session).await?,
                }
                self.state_after(i + 1)
            }
            FlowState::Done => FlowState::Done,
        };
        Ok(self.state)
    }

    /// Drive the flow to its end and return the new password it submitted.
    /// On failure the password generated so far, if any, comes back with the error.
    pub async fn run(mut self, session: &mut dyn Session) -> Result<String, FlowAborted> {
        loop {
            match self.step(session).await {
                Ok(FlowState::Done) => break,
                Ok(_) => {}
                Err(error) => {
                    return Err(FlowAborted {
                        error,
                        new_password: self.resolver.into_new_password(),
                    })
                }
            }
        }

        let instance = self.instance().name.clone();
        self.resolver.into_new_password().ok_or(FlowAborted {
            error: UpdateFlowError::NoNewPassword(instance),
            new_password: None,
        })
    }

    async fn visit(&self, session: &mut dyn Session) -> Result<(), UpdateFlowError> {
        let instance = self.instance();
        let url = instance
            .entry_url(self.auto.url.as_ref())
            .map_err(|source| UpdateFlowError::EntryUrl {
                instance: instance.name.clone(),
                source,
            })?;

        session
            .navigate(&url)
            .await
            .map_err(|source| UpdateFlowError::Navigate {
                url: url.clone(),
                source,
            })?;

        match session.current_url().await {
            Ok(u) => log::debug!("Website url: {}", u),
            Err(e) => log::debug!("Cannot read the current url: {}", e),
        }
        Ok(())
    }

    async fn fill_page(
        &mut self,
        page: &FormPage,
        session: &mut dyn Session,
    ) -> Result<(), UpdateFlowError> {
        let title = session
            .wait_for_title_contains(
                &page.title_contains,
                self.opts.title_timeout,
                self.opts.poll_interval,
            )
            .await
            .map_err(|source| UpdateFlowError::TitleWait {
                page: page.name.clone(),
                source,
            })?;
        tokio::time::sleep(self.opts.settle_delay).await;
        log::debug!("Page title: {}", title);

        for field in &page.fields {
            let value = self
                .resolver
                .resolve(field.input)
                .await
                .map_err(|source| UpdateFlowError::Input {
                    page: page.name.clone(),
                    field: field.name.clone(),
                    source,
                })?;
            session
                .fill_field(&field.name, &value)
                .await
                .map_err(|source| UpdateFlowError::Fill {
                    page: page.name.clone(),
                    field: field.name.clone(),
                    source,
                })?;
        }

        if let Some(last) = page.fields.last() {
            session
                .submit(&last.name)
                .await
                .map_err(|source| UpdateFlowError::Submit {
                    page: page.name.clone(),
                    source,
                })?;
        }
        Ok(())
    }
}

/// Runs update flows one after another, all in the same session.
pub struct Sequencer<'a, S: Store + ?Sized> {
    store: &'a S,
    opts: SequencerOptions,
}

impl<'a, S: Store + ?Sized> Sequencer<'a, S> {
    pub fn new(store: &'a S, opts: SequencerOptions) -> Self {
        Self { store, opts }
    }

    pub fn options(&self) -> &SequencerOptions {
        &self.opts
    }

    /// Replay the instance flow for `auto`. Returns the new password.
    pub async fn run(
        &self,
        auto: &AutoCredential,
        session: &mut dyn Session,
    ) -> Result<String, FlowAborted> {
        log::info!("Running instance '{}' for {}", auto.instance.name, auto.path());
        UpdateFlow::new(self.store, auto, self.opts).run(session).await
    }
}
