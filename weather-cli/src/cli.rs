use std::{
    env,
    ffi::OsString,
    io::{self, Write},
    path::Path,
};

use anyhow::Result;
use inquire::{Password, PasswordDisplayMode};
use weather_core::{
    Config, METRICS, OptionKind, OptionParser, ParsedOptions, SecureTransport, TlsTransport,
    WeatherError, WeatherQuery,
    model::{CITY_NAME, COUNTRY_CODE},
};

pub const HELP_FLAG: &str = "help_desc,d";
pub const CONFIGURE_FLAG: &str = "configure,c";
pub const NO_API_KEY_DIAGNOSTIC: &str = "ERROR MESSAGE - NO API KEY CONFIGURED!";
pub const NO_API_KEY_HINT: &str = "Hint: run `weather --configure` or set OPENWEATHER_API_KEY.";
pub const STORE_KEY_DIAGNOSTIC: &str = "ERROR MESSAGE - STORING THE API KEY NOT SUCCEEDED!";

/// Every option the `weather` tool understands.
pub fn option_parser(program: &str) -> OptionParser {
    let mut parser = OptionParser::new(program);

    parser
        .declare_help(HELP_FLAG, "prints help diagnostics")
        .declare_positional(
            COUNTRY_CODE,
            "the country code of the location, e.g. NL",
            OptionKind::String,
        )
        .declare_positional(
            CITY_NAME,
            "the city name of the location, e.g. Amsterdam",
            OptionKind::String,
        );

    for info in &METRICS {
        parser.declare_flag(&info.declaration(), info.description);
    }

    parser.declare_flag(
        CONFIGURE_FLAG,
        "prompts for the OpenWeatherMap API key and stores it",
    );

    parser
}

/// Parsed invocation of the tool.
#[derive(Debug)]
pub struct Cli {
    pub options: ParsedOptions,
}

impl Cli {
    /// Parses the process arguments. Malformed arguments leave a partial table.
    pub fn parse() -> Self {
        Self::parse_from(env::args_os(), &mut io::stdout(), &mut io::stderr())
    }

    /// Parses `args` (program name first), printing usage and diagnostics to
    /// `out` and `err`.
    pub fn parse_from<I, T, O, E>(args: I, out: &mut O, err: &mut E) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
        O: Write,
        E: Write,
    {
        let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
        let program = args
            .first()
            .and_then(|arg| Path::new(arg).file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "weather".to_owned());

        Self {
            options: option_parser(&program).parse_to(args, out, err),
        }
    }

    pub async fn run(self) -> Result<()> {
        let mut config = Config::load().unwrap_or_else(|err| {
            tracing::warn!("{err:#}");
            Config::default()
        });

        if self.options.flag("configure") == Some(true) {
            configure(&mut config, &mut io::stdout(), &mut io::stderr());
            return Ok(());
        }

        config.apply_env_overrides(|name| env::var(name).ok());

        let transport = TlsTransport::new(config.timeout());
        self.query(&config, &transport, &mut io::stdout(), &mut io::stderr())
            .await;

        Ok(())
    }

    /// Runs the weather request and prints the report. Failures end up as
    /// fixed diagnostics on `err`; nothing is returned.
    pub async fn query<O: Write, E: Write>(
        &self,
        config: &Config,
        transport: &dyn SecureTransport,
        out: &mut O,
        err: &mut E,
    ) {
        let Some(api_key) = config.api_key() else {
            write_line(err, NO_API_KEY_DIAGNOSTIC);
            write_line(err, NO_API_KEY_HINT);
            return;
        };

        let query = WeatherQuery::from_options(&self.options, config, api_key);

        match query.execute(transport, &mut *out).await {
            Ok(()) => {}
            Err(failure @ WeatherError::Fetch(_)) => {
                report(err, &failure);
                // A failed fetch still goes through render with an empty body.
                if let Err(render_err) = query.render(&mut *out, "") {
                    report(err, &render_err.into());
                }
            }
            Err(failure) => report(err, &failure),
        }
    }
}

fn report<E: Write>(err: &mut E, failure: &WeatherError) {
    tracing::debug!(error = ?failure, "weather query failed");
    write_line(err, failure.diagnostic());
}

fn write_line<W: Write>(stream: &mut W, text: &str) {
    if let Err(io_err) = writeln!(stream, "{text}") {
        tracing::warn!(%io_err, "failed to write to the console");
    }
}

fn configure<O: Write, E: Write>(config: &mut Config, out: &mut O, err: &mut E) {
    let answer = Password::new("OpenWeatherMap API key:")
        .without_confirmation()
        .with_display_mode(PasswordDisplayMode::Masked)
        .prompt();

    let api_key = match answer {
        Ok(key) if !key.trim().is_empty() => key,
        Ok(_) => {
            write_line(err, "No API key entered; configuration left unchanged.");
            return;
        }
        Err(prompt_err) => {
            tracing::warn!(%prompt_err, "could not prompt for the API key");
            write_line(err, &format!("Could not read the API key: {prompt_err}"));
            return;
        }
    };

    match Config::config_file_path() {
        Ok(path) => store_api_key(config, api_key, &path, out, err),
        Err(path_err) => {
            tracing::warn!("{path_err:#}");
            write_line(err, STORE_KEY_DIAGNOSTIC);
        }
    }
}

/// Saves `api_key` into the config file at `path`.
pub fn store_api_key<O: Write, E: Write>(
    config: &mut Config,
    api_key: String,
    path: &Path,
    out: &mut O,
    err: &mut E,
) {
    config.set_api_key(api_key);

    match config.save_to(path) {
        Ok(()) => write_line(out, &format!("API key saved to {}", path.display())),
        Err(save_err) => {
            tracing::warn!("{save_err:#}");
            write_line(err, STORE_KEY_DIAGNOSTIC);
        }
    }
}
