use std::{io, time::Duration};

use thiserror::Error;

use crate::options::ParsedOptions;

pub const OPTIONS_DIAGNOSTIC: &str = "ERROR MESSAGE - PARSING PROGRAM OPTIONS NOT SUCCEEDED!";
pub const FETCH_DIAGNOSTIC: &str =
    "ERROR MESSAGE - CREATING A CONNECTION WITH THE INTERNET SERVICE NOT SUCCEEDED!";
pub const RENDER_DIAGNOSTIC: &str = "ERROR MESSAGE - PARSING TO SPECIFIC OBJECTS NOT SUCCEEDED!";

/// What went wrong while matching an argument vector against the declared options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Two declarations share a long or short name.
    Conflict(String),
    UnknownOption(String),
    MissingValue(String),
    InvalidValue(String),
    UnexpectedPositional(String),
    RepeatedOption(String),
    Other(String),
}

impl std::fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseErrorKind::Conflict(name) => write!(f, "option '{name}' is declared twice"),
            ParseErrorKind::UnknownOption(detail) => write!(f, "unknown option: {detail}"),
            ParseErrorKind::MissingValue(detail) => write!(f, "missing value: {detail}"),
            ParseErrorKind::InvalidValue(detail) => write!(f, "invalid value: {detail}"),
            ParseErrorKind::UnexpectedPositional(detail) => {
                write!(f, "unexpected positional argument: {detail}")
            }
            ParseErrorKind::RepeatedOption(detail) => write!(f, "option given twice: {detail}"),
            ParseErrorKind::Other(detail) => f.write_str(detail),
        }
    }
}

/// A failed parse, together with whatever had been bound before the failure.
#[derive(Debug, Clone, Error)]
#[error("failed to parse program options: {kind}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub partial: ParsedOptions,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, partial: ParsedOptions) -> Self {
        Self { kind, partial }
    }

    pub fn into_partial(self) -> ParsedOptions {
        self.partial
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid host name '{0}'")]
    InvalidHost(String),

    #[error("failed to set up TLS client: {0}")]
    Tls(#[from] tokio_rustls::rustls::Error),

    #[error("failed to connect to {host}:{port}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("TLS handshake with {host} failed")]
    Handshake {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("I/O error while talking to the weather service")]
    Io(#[from] io::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed HTTP response: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("response body is not valid JSON")]
    InvalidJson(#[from] serde_json::Error),

    #[error("field '{0}' is missing or not numeric")]
    MissingField(String),

    #[error("failed to write report")]
    Output(#[from] io::Error),
}

/// Any failure of the weather pipeline.
#[derive(Debug, Error)]
pub enum WeatherError {
    #[error(transparent)]
    Options(#[from] ParseError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

impl WeatherError {
    /// The fixed console line printed for this family of failure.
    pub fn diagnostic(&self) -> &'static str {
        match self {
            WeatherError::Options(_) => OPTIONS_DIAGNOSTIC,
            WeatherError::Fetch(_) => FETCH_DIAGNOSTIC,
            WeatherError::Render(_) => RENDER_DIAGNOSTIC,
        }
    }
}
