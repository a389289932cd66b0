// exported modules
pub mod error;
pub mod util;

// session impls
pub mod form;
pub mod webdriver;

// re-exports
pub use error::*;
pub use form::FormSession;
pub use url::Url;
pub use webdriver::WebDriverSession;

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Browser {
    Firefox,
    Chrome,
    /// Script-free HTTP client submitting plain HTML forms.
    Form,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub browser: Browser,
    pub headless: bool,
    pub webdriver_url: Url,
}

/// One live browser, shared by every automatic update of a run.
#[async_trait]
pub trait Session: Send {
    async fn navigate(&mut self, url: &Url) -> Result<()>;

    async fn current_url(&mut self) -> Result<Url>;

    async fn title(&mut self) -> Result<String>;

    /// Poll the title until it contains `needle`. Returns the matching title.
    async fn wait_for_title_contains(
        &mut self,
        needle: &str,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<String> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let title = self.title().await?;
            if title.contains(needle) {
                return Ok(title);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(Error::TitleTimeout {
                    expected: needle.to_owned(),
                    last_title: title,
                    timeout,
                });
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Type `value` into the field named `name` on the current page.
    async fn fill_field(&mut self, name: &str, value: &str) -> Result<()>;

    /// Submit the form enclosing the field named `name`.
    async fn submit(&mut self, name: &str) -> Result<()>;

    async fn close(&mut self) -> Result<()>;
}

pub async fn new_session(opts: &SessionOptions) -> Result<Box<dyn Session>> {
    use Browser::*;
    log::info!("Opening {} browser session", opts.browser);
    match opts.browser {
        Firefox | Chrome => {
            let s = WebDriverSession::start(&opts.webdriver_url, opts.browser, opts.headless).await?;
            Ok(Box::new(s))
        }
        Form => Ok(Box::new(FormSession::new()?)),
    }
}
