use std::time::Duration;

use reqwest::StatusCode;

pub type Result<T> = ::std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Failed to parse as URL '{url}'")]
    InvalidSyntaxUrl {
        url: String,

        #[source]
        source: url::ParseError,
    },

    #[error("Unexpected response code '{got}' while requesting to {requested_url}")]
    UnexpectedResponseCode {
        got: StatusCode,
        requested_url: String,
    },

    #[error("No page has been loaded yet")]
    NoPageLoaded,

    #[error("No such form field named '{0}'")]
    NoSuchField(String),

    #[error("Field '{0}' is not inside a form")]
    NoEnclosingForm(String),

    #[error("Page title did not contain '{expected}' within {timeout:?} (last title: '{last_title}')")]
    TitleTimeout {
        expected: String,
        last_title: String,
        timeout: Duration,
    },

    #[error("WebDriver error '{error}': {message}")]
    WebDriver { error: String, message: String },

    #[error("'{0}' is not driven through WebDriver")]
    NotWebDriverBrowser(crate::Browser),

    #[error("Browser session is already closed")]
    Closed,

    #[error("Http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
