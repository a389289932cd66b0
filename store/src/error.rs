use std::{path::PathBuf, process::ExitStatus};

pub type Result<T> = ::std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("`pass {subcommand}` exited with {status}: {detail}")]
    Command {
        subcommand: &'static str,
        status: ExitStatus,
        detail: String,
    },

    #[error("Failed to spawn '{binary}'")]
    Spawn {
        binary: PathBuf,

        #[source]
        source: std::io::Error,
    },

    #[error("Failed to talk to `pass {subcommand}`")]
    Pipe {
        subcommand: &'static str,

        #[source]
        source: std::io::Error,
    },

    #[error("`pass {0}` printed non UTF-8 output")]
    NonUtf8Output(&'static str),

    #[error("{0} is not in the password store")]
    NotInStore(String),

    #[error("Generated password length must be a positive integer")]
    ZeroLength,

    #[error("Empty character set '{0}'")]
    EmptyCharacterSet(String),

    #[error("Invalid password store environment: {0}")]
    Env(#[from] envy::Error),

    #[error(transparent)]
    Fs(#[from] fsutil::error::Error),
}
