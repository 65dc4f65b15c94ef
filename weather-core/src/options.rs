//! Declarative command-line options.
//!
//! An [`OptionParser`] collects option declarations (flags, typed values and
//! positionals, each with an optional default), matches one argument vector
//! against them and hands back a [`ParsedOptions`] table keyed by long name.
//! Matching itself is done by `clap`'s builder API; this module owns the
//! declarations, the typed table and the usage listing.

use std::{
    collections::HashMap,
    ffi::OsString,
    fmt,
    io::{self, Write},
};

use clap::{
    Arg, ArgAction, ArgMatches, Command,
    builder::ValueParser,
    error::{ContextKind, ErrorKind},
    parser::ValueSource,
    value_parser,
};

use crate::error::{OPTIONS_DIAGNOSTIC, ParseError, ParseErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionKind {
    Flag,
    String,
    Int,
    Double,
}

impl OptionKind {
    /// Tag shown next to the description in the usage listing.
    pub fn tag(&self) -> &'static str {
        match self {
            OptionKind::Flag => "[bool]",
            OptionKind::String => "[string]",
            OptionKind::Int => "[int]",
            OptionKind::Double => "[double]",
        }
    }

    fn value_parser(&self) -> ValueParser {
        match self {
            OptionKind::Flag => ValueParser::bool(),
            OptionKind::String => ValueParser::string(),
            OptionKind::Int => value_parser!(i64).into(),
            OptionKind::Double => value_parser!(f64).into(),
        }
    }
}

/// A typed option value.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Bool(bool),
    String(String),
    Int(i64),
    Double(f64),
}

impl OptionValue {
    pub fn kind(&self) -> OptionKind {
        match self {
            OptionValue::Bool(_) => OptionKind::Flag,
            OptionValue::String(_) => OptionKind::String,
            OptionValue::Int(_) => OptionKind::Int,
            OptionValue::Double(_) => OptionKind::Double,
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(value) => write!(f, "{value}"),
            OptionValue::String(value) => f.write_str(value),
            OptionValue::Int(value) => write!(f, "{value}"),
            OptionValue::Double(value) => write!(f, "{value}"),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Bool(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::String(value.to_owned())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::String(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        OptionValue::Int(value)
    }
}

impl From<i32> for OptionValue {
    fn from(value: i32) -> Self {
        OptionValue::Int(i64::from(value))
    }
}

impl From<f64> for OptionValue {
    fn from(value: f64) -> Self {
        OptionValue::Double(value)
    }
}

/// One declared option or positional argument.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionSpec {
    pub long: String,
    pub short: Option<char>,
    pub description: String,
    pub kind: OptionKind,
    pub default: Option<OptionValue>,
    /// 0-based rank among positionals, `None` for named options.
    pub position: Option<usize>,
    help: bool,
}

impl OptionSpec {
    /// Splits a `"name,x"` declaration into its long name and short letter.
    fn named(declaration: &str, description: &str, kind: OptionKind) -> Self {
        let (long, short) = match declaration.split_once(',') {
            Some((long, short)) => (long, short.chars().next()),
            None => (declaration, None),
        };

        Self {
            long: long.to_owned(),
            short,
            description: description.to_owned(),
            kind,
            default: None,
            position: None,
            help: false,
        }
    }

    pub fn is_help(&self) -> bool {
        self.help
    }

    fn usage_line(&self) -> String {
        let mut description = self.description.clone();

        if !self.help {
            description.push(' ');
            description.push_str(self.kind.tag());
        }

        if let Some(default) = &self.default {
            description.push_str(&format!(" - DEFAULT: {default}"));
        }

        format!("\"{}\"\t\t{}", self.long, description)
    }

    fn to_arg(&self) -> Arg {
        let arg = Arg::new(self.long.clone()).help(self.description.clone());

        if let Some(position) = self.position {
            return arg
                .index(position + 1)
                .action(ArgAction::Set)
                .value_parser(self.kind.value_parser());
        }

        let mut arg = arg.long(self.long.clone());
        if let Some(short) = self.short {
            arg = arg.short(short);
        }

        match self.kind {
            OptionKind::Flag => arg.action(ArgAction::SetTrue),
            kind => arg
                .action(ArgAction::Set)
                .value_parser(kind.value_parser())
                .allow_negative_numbers(matches!(kind, OptionKind::Int | OptionKind::Double)),
        }
    }

    /// Value bound on the command line, if this option was given there.
    fn read(&self, matches: &ArgMatches) -> Option<OptionValue> {
        let id = self.long.as_str();

        if !matches!(matches.value_source(id), Some(ValueSource::CommandLine)) {
            return None;
        }

        if self.position.is_none() && self.kind == OptionKind::Flag {
            return Some(OptionValue::Bool(true));
        }

        match self.kind {
            OptionKind::Flag => matches
                .try_get_one::<bool>(id)
                .ok()
                .flatten()
                .map(|value| OptionValue::Bool(*value)),
            OptionKind::String => matches
                .try_get_one::<String>(id)
                .ok()
                .flatten()
                .map(|value| OptionValue::String(value.clone())),
            OptionKind::Int => matches
                .try_get_one::<i64>(id)
                .ok()
                .flatten()
                .map(|value| OptionValue::Int(*value)),
            OptionKind::Double => matches
                .try_get_one::<f64>(id)
                .ok()
                .flatten()
                .map(|value| OptionValue::Double(*value)),
        }
    }
}

/// Option values produced by one parse, keyed by long name.
///
/// Options that were neither supplied nor given a default are absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedOptions {
    values: HashMap<String, OptionValue>,
}

impl ParsedOptions {
    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn flag(&self, name: &str) -> Option<bool> {
        match self.values.get(name) {
            Some(OptionValue::Bool(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn string(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(OptionValue::String(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(OptionValue::Int(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn double(&self, name: &str) -> Option<f64> {
        match self.values.get(name) {
            Some(OptionValue::Double(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: OptionValue) {
        self.values.insert(name.into(), value);
    }
}

/// Collects option declarations and parses argument vectors against them.
#[derive(Debug, Clone)]
pub struct OptionParser {
    program: String,
    specs: Vec<OptionSpec>,
    help: Option<String>,
    conflict: Option<String>,
}

impl OptionParser {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            specs: Vec::new(),
            help: None,
            conflict: None,
        }
    }

    pub fn specs(&self) -> &[OptionSpec] {
        &self.specs
    }

    /// Registers the help flag. When it is present after parsing, the usage
    /// listing is printed; parsing carries on either way.
    pub fn declare_help(&mut self, flag: &str, description: &str) -> &mut Self {
        let mut spec = OptionSpec::named(flag, description, OptionKind::Flag);
        spec.help = true;
        let long = spec.long.clone();
        if self.declare(spec) {
            self.help = Some(long);
        }
        self
    }

    pub fn declare_flag(&mut self, name: &str, description: &str) -> &mut Self {
        self.declare(OptionSpec::named(name, description, OptionKind::Flag));
        self
    }

    /// A flag that reads as `default` when it is absent from the command line.
    pub fn declare_flag_with_default(
        &mut self,
        name: &str,
        description: &str,
        default: bool,
    ) -> &mut Self {
        let mut spec = OptionSpec::named(name, description, OptionKind::Flag);
        spec.default = Some(OptionValue::Bool(default));
        self.declare(spec);
        self
    }

    pub fn declare_value(&mut self, name: &str, description: &str, kind: OptionKind) -> &mut Self {
        self.declare(OptionSpec::named(name, description, kind));
        self
    }

    /// The option's kind follows the default; a `bool` default makes it a flag.
    pub fn declare_value_with_default(
        &mut self,
        name: &str,
        description: &str,
        default: impl Into<OptionValue>,
    ) -> &mut Self {
        let default = default.into();
        let mut spec = OptionSpec::named(name, description, default.kind());
        spec.default = Some(default);
        self.declare(spec);
        self
    }

    pub fn declare_positional(
        &mut self,
        name: &str,
        description: &str,
        kind: OptionKind,
    ) -> &mut Self {
        let spec = self.positional(name, description, kind);
        self.declare(spec);
        self
    }

    pub fn declare_positional_with_default(
        &mut self,
        name: &str,
        description: &str,
        default: impl Into<OptionValue>,
    ) -> &mut Self {
        let default = default.into();
        let mut spec = self.positional(name, description, default.kind());
        spec.default = Some(default);
        self.declare(spec);
        self
    }

    fn positional(&self, name: &str, description: &str, kind: OptionKind) -> OptionSpec {
        let mut spec = OptionSpec::named(name, description, kind);
        spec.short = None;
        spec.position = Some(self.specs.iter().filter(|s| s.position.is_some()).count());
        spec
    }

    /// Adds `spec` unless it clashes with an earlier declaration; the first
    /// clash is kept for `try_parse` to report.
    fn declare(&mut self, spec: OptionSpec) -> bool {
        let clash = self.specs.iter().any(|existing| {
            existing.long == spec.long || (spec.short.is_some() && existing.short == spec.short)
        });

        if clash {
            tracing::warn!(option = %spec.long, "option declared twice");
            if self.conflict.is_none() {
                self.conflict = Some(spec.long);
            }
            return false;
        }

        self.specs.push(spec);
        true
    }

    fn command(&self) -> Command {
        self.specs.iter().fold(
            Command::new(self.program.clone())
                .disable_help_flag(true)
                .disable_version_flag(true),
            |command, spec| command.arg(spec.to_arg()),
        )
    }

    /// Parses `args` (program name first) into a typed table.
    pub fn try_parse<I, T>(&self, args: I) -> Result<ParsedOptions, ParseError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        if let Some(name) = &self.conflict {
            return Err(ParseError::new(
                ParseErrorKind::Conflict(name.clone()),
                ParsedOptions::default(),
            ));
        }

        let matches = self
            .command()
            .try_get_matches_from(args)
            .map_err(|err| ParseError::new(classify(&err), ParsedOptions::default()))?;

        let mut parsed = ParsedOptions::default();
        for spec in &self.specs {
            if let Some(value) = spec.read(&matches).or_else(|| spec.default.clone()) {
                parsed.insert(spec.long.clone(), value);
            }
        }

        tracing::debug!(options = parsed.len(), "parsed program options");
        Ok(parsed)
    }

    /// Parses `args` without ever failing: a malformed invocation prints the
    /// fixed diagnostic to stderr and yields the partial table.
    pub fn parse<I, T>(&self, args: I) -> ParsedOptions
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        self.parse_to(args, &mut io::stdout().lock(), &mut io::stderr().lock())
    }

    /// [`parse`](Self::parse) with explicit output and error streams.
    pub fn parse_to<I, T, O, E>(&self, args: I, out: &mut O, err: &mut E) -> ParsedOptions
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
        O: Write,
        E: Write,
    {
        let parsed = match self.try_parse(args) {
            Ok(parsed) => parsed,
            Err(error) => {
                tracing::debug!(%error, "falling back to partial options");
                if let Err(io_err) = writeln!(err, "{OPTIONS_DIAGNOSTIC}") {
                    tracing::warn!(%io_err, "failed to write diagnostic");
                }
                error.into_partial()
            }
        };

        if self.help_requested(&parsed) {
            if let Err(io_err) = writeln!(out, "{}", self.usage_text()) {
                tracing::warn!(%io_err, "failed to write usage");
            }
        }

        parsed
    }

    pub fn help_requested(&self, parsed: &ParsedOptions) -> bool {
        self.help
            .as_deref()
            .is_some_and(|help| parsed.flag(help) == Some(true))
    }

    /// Human-readable listing of every declaration, in declaration order.
    pub fn usage_text(&self) -> String {
        let mut text = format!("Usage: ./{} ", self.program);

        if self.specs.is_empty() {
            return text;
        }

        text.push_str("[FLAGS] ");
        for spec in self.specs.iter().filter(|spec| spec.position.is_some()) {
            text.push_str(&format!("<{}> ", spec.long));
        }
        text.push('\n');

        for spec in &self.specs {
            text.push_str(&spec.usage_line());
            text.push('\n');
        }

        text
    }
}

fn classify(err: &clap::Error) -> ParseErrorKind {
    let context = |kind| {
        err.get(kind)
            .map(|value| value.to_string())
            .unwrap_or_default()
    };

    match err.kind() {
        ErrorKind::UnknownArgument => {
            let token = context(ContextKind::InvalidArg);
            if token.starts_with('-') {
                ParseErrorKind::UnknownOption(token)
            } else {
                ParseErrorKind::UnexpectedPositional(token)
            }
        }
        ErrorKind::InvalidValue if context(ContextKind::InvalidValue).is_empty() => {
            ParseErrorKind::MissingValue(context(ContextKind::InvalidArg))
        }
        ErrorKind::InvalidValue | ErrorKind::ValueValidation => {
            ParseErrorKind::InvalidValue(context(ContextKind::InvalidArg))
        }
        ErrorKind::ArgumentConflict => {
            ParseErrorKind::RepeatedOption(context(ContextKind::InvalidArg))
        }
        _ => ParseErrorKind::Other(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weather_parser() -> OptionParser {
        let mut parser = OptionParser::new("weather");
        parser
            .declare_help("help_desc,d", "prints help diagnostics")
            .declare_positional("country_code", "country code", OptionKind::String)
            .declare_positional("city_name", "city name", OptionKind::String)
            .declare_flag("temperature,t", "displays the temperature")
            .declare_flag("pressure,p", "displays the pressure")
            .declare_flag("humidity,v", "displays the humidity")
            .declare_flag("max_temperature,h", "displays the maximum temperature");
        parser
    }

    #[test]
    fn absent_flags_are_missing_and_present_flags_are_true() {
        let parsed = weather_parser()
            .try_parse(["weather", "--temperature", "-p"])
            .expect("parse should succeed");

        assert_eq!(parsed.flag("temperature"), Some(true));
        assert_eq!(parsed.flag("pressure"), Some(true));
        assert!(!parsed.contains("humidity"));
        assert!(!parsed.contains("help_desc"));
    }

    #[test]
    fn short_flags_can_be_grouped() {
        let parsed = weather_parser()
            .try_parse(["weather", "-tvh"])
            .expect("parse should succeed");

        assert_eq!(parsed.flag("temperature"), Some(true));
        assert_eq!(parsed.flag("humidity"), Some(true));
        assert_eq!(parsed.flag("max_temperature"), Some(true));
    }

    #[test]
    fn positionals_bind_in_declaration_order() {
        let parsed = weather_parser()
            .try_parse(["weather", "NL", "Amsterdam"])
            .expect("parse should succeed");

        assert_eq!(parsed.string("country_code"), Some("NL"));
        assert_eq!(parsed.string("city_name"), Some("Amsterdam"));
    }

    #[test]
    fn missing_positional_without_default_is_absent() {
        let parsed = weather_parser()
            .try_parse(["weather", "NL"])
            .expect("parse should succeed");

        assert_eq!(parsed.string("country_code"), Some("NL"));
        assert!(!parsed.contains("city_name"));
    }

    #[test]
    fn value_defaults_apply_and_can_be_overridden() {
        let mut parser = OptionParser::new("tool");
        parser
            .declare_value_with_default("port,P", "port number", 80)
            .declare_value_with_default("version", "HTTP version", 1.1)
            .declare_value("target", "request target", OptionKind::String);

        let defaults = parser.try_parse(["tool"]).expect("parse should succeed");
        assert_eq!(defaults.int("port"), Some(80));
        assert_eq!(defaults.double("version"), Some(1.1));
        assert!(!defaults.contains("target"));

        let supplied = parser
            .try_parse(["tool", "-P", "8080", "--version=2", "--target", "/"])
            .expect("parse should succeed");
        assert_eq!(supplied.int("port"), Some(8080));
        assert_eq!(supplied.double("version"), Some(2.0));
        assert_eq!(supplied.string("target"), Some("/"));
    }

    #[test]
    fn negative_numbers_are_values() {
        let mut parser = OptionParser::new("tool");
        parser.declare_value("offset", "offset", OptionKind::Int);

        let parsed = parser
            .try_parse(["tool", "--offset", "-3"])
            .expect("parse should succeed");
        assert_eq!(parsed.int("offset"), Some(-3));
    }

    #[test]
    fn positional_defaults_fill_unmatched_slots() {
        let mut parser = OptionParser::new("http");
        parser
            .declare_positional("host_name", "host", OptionKind::String)
            .declare_positional_with_default("port_number", "port", 80)
            .declare_positional_with_default("target", "target", "/");

        let parsed = parser
            .try_parse(["http", "example.com", "8080"])
            .expect("parse should succeed");

        assert_eq!(parsed.string("host_name"), Some("example.com"));
        assert_eq!(parsed.int("port_number"), Some(8080));
        assert_eq!(parsed.string("target"), Some("/"));
    }

    #[test]
    fn flag_default_is_used_when_absent() {
        let mut parser = OptionParser::new("tool");
        parser.declare_flag_with_default("verbose", "chatty output", false);

        let parsed = parser.try_parse(["tool"]).expect("parse should succeed");
        assert_eq!(parsed.flag("verbose"), Some(false));

        let parsed = parser
            .try_parse(["tool", "--verbose"])
            .expect("parse should succeed");
        assert_eq!(parsed.flag("verbose"), Some(true));
    }

    #[test]
    fn non_convertible_value_is_an_invalid_value() {
        let mut parser = OptionParser::new("tool");
        parser.declare_value_with_default("port", "port number", 80);

        let err = parser
            .try_parse(["tool", "--port", "eighty"])
            .unwrap_err();

        assert!(matches!(err.kind, ParseErrorKind::InvalidValue(_)));
        assert!(err.partial.is_empty());
    }

    #[test]
    fn value_without_argument_fails() {
        let mut parser = OptionParser::new("tool");
        parser.declare_value("target", "request target", OptionKind::String);

        let err = parser.try_parse(["tool", "--target"]).unwrap_err();
        assert!(matches!(
            err.kind,
            ParseErrorKind::MissingValue(_) | ParseErrorKind::InvalidValue(_)
        ));
    }

    #[test]
    fn unknown_option_is_reported() {
        let err = weather_parser()
            .try_parse(["weather", "--wind"])
            .unwrap_err();

        assert!(matches!(err.kind, ParseErrorKind::UnknownOption(_)));
    }

    #[test]
    fn surplus_positional_is_reported() {
        let err = weather_parser()
            .try_parse(["weather", "NL", "Amsterdam", "Utrecht"])
            .unwrap_err();

        assert!(matches!(err.kind, ParseErrorKind::UnexpectedPositional(_)));
    }

    #[test]
    fn duplicate_declaration_is_a_conflict() {
        let mut parser = weather_parser();
        parser.declare_flag("tides,t", "short letter already taken");

        let err = parser.try_parse(["weather"]).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::Conflict("tides".into()));
        assert_eq!(parser.specs().len(), weather_parser().specs().len());
    }

    #[test]
    fn parse_degrades_to_partial_table_with_diagnostic() {
        let mut out = Vec::new();
        let mut err = Vec::new();

        let parsed = weather_parser().parse_to(["weather", "--wind", "NL"], &mut out, &mut err);

        assert!(parsed.is_empty());
        assert!(out.is_empty());
        assert_eq!(String::from_utf8(err).unwrap().trim_end(), OPTIONS_DIAGNOSTIC);
    }

    #[test]
    fn help_prints_usage_and_keeps_parsing() {
        let parser = weather_parser();
        let mut out = Vec::new();
        let mut err = Vec::new();

        let parsed = parser.parse_to(["weather", "-d", "NL", "Paris"], &mut out, &mut err);

        assert_eq!(parsed.string("city_name"), Some("Paris"));
        assert!(err.is_empty());
        let printed = String::from_utf8(out).unwrap();
        assert!(printed.starts_with(&parser.usage_text()));
    }

    #[test]
    fn usage_lists_every_option_once_in_order() {
        let mut parser = weather_parser();
        parser.declare_value_with_default("units", "unit system", "standard");

        let usage = parser.usage_text();
        let mut lines = usage.lines();

        assert_eq!(
            lines.next(),
            Some("Usage: ./weather [FLAGS] <country_code> <city_name> ")
        );

        let rest: Vec<&str> = lines.collect();
        assert_eq!(
            rest,
            vec![
                "\"help_desc\"\t\tprints help diagnostics",
                "\"country_code\"\t\tcountry code [string]",
                "\"city_name\"\t\tcity name [string]",
                "\"temperature\"\t\tdisplays the temperature [bool]",
                "\"pressure\"\t\tdisplays the pressure [bool]",
                "\"humidity\"\t\tdisplays the humidity [bool]",
                "\"max_temperature\"\t\tdisplays the maximum temperature [bool]",
                "\"units\"\t\tunit system [string] - DEFAULT: standard",
            ]
        );
    }

    #[test]
    fn usage_of_empty_parser_is_just_the_invocation() {
        assert_eq!(OptionParser::new("bare").usage_text(), "Usage: ./bare ");
    }

    #[test]
    fn typed_accessors_reject_kind_mismatch() {
        let mut parsed = ParsedOptions::default();
        parsed.insert("port", OptionValue::Int(80));

        assert_eq!(parsed.int("port"), Some(80));
        assert_eq!(parsed.string("port"), None);
        assert_eq!(parsed.flag("port"), None);
        assert_eq!(parsed.get("port").map(OptionValue::kind), Some(OptionKind::Int));
    }
}
