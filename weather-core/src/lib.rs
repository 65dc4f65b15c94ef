//! Core library for the `weather` CLI.
//!
//! This crate defines:
//! - A declarative option model producing typed, possibly-defaulted values
//! - The OpenWeatherMap query workflow (request line, fetch, field rendering)
//! - A TLS transport for the single outbound request
//! - Configuration & credentials handling
//!
//! It is used by `weather-cli`, but can also be reused by other binaries or services.

pub mod config;
pub mod error;
pub mod model;
pub mod options;
pub mod query;
pub mod transport;

pub use config::Config;
pub use error::{FetchError, ParseError, ParseErrorKind, RenderError, WeatherError};
pub use model::{FieldSelector, METRICS, Metric, MetricInfo, QueryTarget, build_field_selectors};
pub use options::{OptionKind, OptionParser, OptionSpec, OptionValue, ParsedOptions};
pub use query::{WeatherQuery, build_request_line, render};
pub use transport::{SecureTransport, TlsTransport};
