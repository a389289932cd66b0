//! Minimal W3C WebDriver client (geckodriver, chromedriver, selenium).

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use url::Url;

use crate::{error::*, util, Browser, Session};

/// Key under which WebDriver returns element references.
const ELEMENT_KEY: &str = "element-6066-11e4-a6c6-f4b9ea0ff0e4";

const SUBMIT_SCRIPT: &str = r#"
const field = arguments[0];
if (!field.form) { throw new Error("field is not inside a form"); }
if (typeof field.form.requestSubmit === "function") { field.form.requestSubmit(); }
else { field.form.submit(); }
"#;

#[derive(Debug, Deserialize)]
struct Reply<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
struct ErrorValue {
    error: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct NewSession {
    #[serde(rename = "sessionId")]
    session_id: String,
}

pub struct WebDriverSession {
    http: reqwest::Client,
    /// Endpoint with a trailing slash, so that joining keeps its path.
    base: Url,
    session_id: String,
    closed: bool,
}

/// Relative path of a session (`command` empty) or of one of its commands.
/// The session itself has no trailing slash: `DELETE /session/{id}`.
fn session_path(session_id: &str, command: &str) -> String {
    if command.is_empty() {
        format!("session/{}", session_id)
    } else {
        format!("session/{}/{}", session_id, command)
    }
}

fn with_trailing_slash(url: &Url) -> Url {
    let mut url = url.clone();
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

impl WebDriverSession {
    pub async fn start(endpoint: &Url, browser: Browser, headless: bool) -> Result<Self> {
        let http = reqwest::Client::new();
        let base = self::with_trailing_slash(endpoint);
        let caps = Self::capabilities(browser, headless)?;

        let new_session_url = util::complete_url(&base, "session")?;
        let reply: NewSession = Self::send(http.post(new_session_url).json(&caps)).await?;
        log::debug!("WebDriver session: {}", reply.session_id);

        Ok(Self {
            http,
            base,
            session_id: reply.session_id,
            closed: false,
        })
    }

    pub fn capabilities(browser: Browser, headless: bool) -> Result<Value> {
        let always_match = match browser {
            Browser::Firefox => {
                let args: &[&str] = if headless { &["-headless"] } else { &[] };
                json!({
                    "browserName": "firefox",
                    "moz:firefoxOptions": { "args": args },
                })
            }
            Browser::Chrome => {
                let args: &[&str] = if headless { &["--headless=new"] } else { &[] };
                json!({
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": args },
                })
            }
            Browser::Form => return Err(Error::NotWebDriverBrowser(browser)),
        };
        Ok(json!({ "capabilities": { "alwaysMatch": always_match } }))
    }

    async fn send<T: DeserializeOwned>(req: RequestBuilder) -> Result<T> {
        let resp = req.send().await?;
        let status = resp.status();
        let body: Value = resp.json().await?;

        if !status.is_success() {
            let Reply { value } = serde_json::from_value::<Reply<ErrorValue>>(body)?;
            return Err(Error::WebDriver {
                error: value.error,
                message: value.message,
            });
        }
        let Reply { value } = serde_json::from_value(body)?;
        Ok(value)
    }

    fn command_url(&self, path: &str) -> Result<Url> {
        if self.closed {
            return Err(Error::Closed);
        }
        util::complete_url(&self.base, &self::session_path(&self.session_id, path))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.command_url(path)?;
        Self::send(self.http.get(url)).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: Value) -> Result<T> {
        let url = self.command_url(path)?;
        Self::send(self.http.post(url).json(&body)).await
    }

    async fn find_field(&self, name: &str) -> Result<String> {
        let body = json!({ "using": "css selector", "value": util::name_selector(name) });
        let element: HashMap<String, String> = match self.post("element", body).await {
            Ok(el) => el,
            Err(Error::WebDriver { error, .. }) if error == "no such element" => {
                return Err(Error::NoSuchField(name.to_owned()))
            }
            Err(e) => return Err(e),
        };
        element
            .get(ELEMENT_KEY)
            .cloned()
            .ok_or_else(|| Error::NoSuchField(name.to_owned()))
    }
}

#[async_trait]
impl Session for WebDriverSession {
    async fn navigate(&mut self, url: &Url) -> Result<()> {
        log::debug!("Navigating to {}", url);
        let _: Value = self.post("url", json!({ "url": url.as_str() })).await?;
        Ok(())
    }

    async fn current_url(&mut self) -> Result<Url> {
        let url: String = self.get("url").await?;
        util::parse_url(url)
    }

    async fn title(&mut self) -> Result<String> {
        self.get("title").await
    }

    async fn fill_field(&mut self, name: &str, value: &str) -> Result<()> {
        let id = self.find_field(name).await?;
        let _: Value = self.post(&format!("element/{}/clear", id), json!({})).await?;
        let _: Value = self
            .post(&format!("element/{}/value", id), json!({ "text": value }))
            .await?;
        Ok(())
    }

    async fn submit(&mut self, name: &str) -> Result<()> {
        let id = self.find_field(name).await?;
        let body = json!({
            "script": SUBMIT_SCRIPT,
            "args": [{ ELEMENT_KEY: id }],
        });
        match self.post::<Value>("execute/sync", body).await {
            Ok(_) => Ok(()),
            Err(Error::WebDriver { error, .. }) if error == "javascript error" => {
                Err(Error::NoEnclosingForm(name.to_owned()))
            }
            Err(e) => Err(e),
        }
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let url = util::complete_url(&self.base, &self::session_path(&self.session_id, ""))?;
        log::debug!("Deleting WebDriver session {}", self.session_id);
        let _: Value = Self::send(self.http.delete(url)).await?;
        Ok(())
    }
}
