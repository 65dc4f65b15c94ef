//! The single-request weather workflow: build the request line, fetch the
//! body, print the selected fields.

use std::io::Write;

use serde_json::Value;

use crate::{
    config::Config,
    error::{FetchError, RenderError, WeatherError},
    model::{FieldSelector, QueryTarget, build_field_selectors},
    options::ParsedOptions,
    transport::SecureTransport,
};

pub const DEFAULT_HOST: &str = "api.openweathermap.org";
pub const DEFAULT_PATH_PREFIX: &str = "/data/2.5/weather?q=";

/// Raw `GET` request for the current weather of `target`.
///
/// City and country are inserted verbatim, without URL encoding; a missing
/// one leaves its slot empty (`q=,NL`).
pub fn build_request_line(
    host: &str,
    path_prefix: &str,
    api_key: &str,
    target: &QueryTarget,
) -> String {
    format!(
        "GET {path_prefix}{},{}&appid={api_key} HTTP/1.1\nHost: {host}\nConnection: close\n\n",
        target.city_name, target.country_code,
    )
}

/// Everything needed to ask for and print one weather report.
#[derive(Debug, Clone)]
pub struct WeatherQuery {
    pub host: String,
    pub path_prefix: String,
    pub api_key: String,
    pub target: QueryTarget,
    pub selectors: Vec<FieldSelector>,
}

impl WeatherQuery {
    pub fn new(
        api_key: impl Into<String>,
        target: QueryTarget,
        selectors: Vec<FieldSelector>,
    ) -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            path_prefix: DEFAULT_PATH_PREFIX.to_owned(),
            api_key: api_key.into(),
            target,
            selectors,
        }
    }

    /// Builds the query from parsed options, taking endpoint and key from `config`.
    pub fn from_options(parsed: &ParsedOptions, config: &Config, api_key: &str) -> Self {
        Self {
            host: config.host.clone(),
            path_prefix: config.path_prefix.clone(),
            api_key: api_key.to_owned(),
            target: QueryTarget::from_options(parsed),
            selectors: build_field_selectors(parsed),
        }
    }

    pub fn request_line(&self) -> String {
        build_request_line(&self.host, &self.path_prefix, &self.api_key, &self.target)
    }

    pub async fn fetch(&self, transport: &dyn SecureTransport) -> Result<String, FetchError> {
        tracing::info!(
            host = %self.host,
            country = %self.target.country_code,
            city = %self.target.city_name,
            "requesting current weather"
        );
        transport.fetch(&self.host, &self.request_line()).await
    }

    pub fn render<W: Write>(&self, out: &mut W, body: &str) -> Result<(), RenderError> {
        render(out, body, &self.target, &self.selectors)
    }

    /// Fetch followed by render, stopping at the first failure.
    pub async fn execute<W: Write>(
        &self,
        transport: &dyn SecureTransport,
        out: &mut W,
    ) -> Result<(), WeatherError> {
        let body = self.fetch(transport).await?;
        self.render(out, &body)?;
        Ok(())
    }
}

/// Prints the header and one line per selected metric.
///
/// Stops at invalid JSON or at the first selected field that is missing or
/// not numeric; whatever was written before that stays written.
pub fn render<W: Write>(
    out: &mut W,
    body: &str,
    target: &QueryTarget,
    selectors: &[FieldSelector],
) -> Result<(), RenderError> {
    let tree: Value = serde_json::from_str(body)?;

    writeln!(
        out,
        "WEATHER FOR: {}, {}",
        target.country_label(),
        target.city_label()
    )?;

    for selector in selectors.iter().filter(|selector| selector.selected) {
        let path = selector.path();
        let raw = lookup_number(&tree, &path).ok_or(RenderError::MissingField(path))?;
        let info = selector.metric.info();

        writeln!(
            out,
            "{}: {}{}",
            info.label,
            format_number(info.display_value(raw)),
            info.unit
        )?;
    }

    Ok(())
}

/// Numeric value at a dotted path such as `main.temp`. Numeric strings count.
fn lookup_number(tree: &Value, path: &str) -> Option<f64> {
    let pointer = format!("/{}", path.replace('.', "/"));

    match tree.pointer(&pointer)? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Six significant digits with trailing zeros dropped, scientific notation
/// outside `1e-4..1e6` (the `%g` rules).
pub fn format_number(value: f64) -> String {
    const PRECISION: i32 = 6;

    if value == 0.0 {
        return "0".to_owned();
    }
    if !value.is_finite() {
        return value.to_string();
    }

    // Round first so a carry (999999.7 -> 1e6) moves the exponent.
    let scientific = format!("{value:.prec$e}", prec = (PRECISION - 1) as usize);
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((scientific.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or_default();

    if (-4..PRECISION).contains(&exponent) {
        let decimals = (PRECISION - 1 - exponent) as usize;
        return trim_fraction(format!("{value:.decimals$}"));
    }

    let sign = if exponent < 0 { '-' } else { '+' };
    format!(
        "{}e{sign}{:02}",
        trim_fraction(mantissa.to_owned()),
        exponent.abs()
    )
}

fn trim_fraction(text: String) -> String {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_owned()
    } else {
        text
    }
}
