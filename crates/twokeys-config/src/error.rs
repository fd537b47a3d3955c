use miette::Diagnostic;
use thiserror::Error;

/// Errors raised while loading a detector configuration
#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("Configuration is not valid KDL")]
    #[diagnostic(
        code(twokeys::config::parse_error),
        help("Hotkey combinations with symbols must be quoted, e.g. \"<^A\" \"doThing\"")
    )]
    ParseError {
        #[source_code]
        src: String,
        #[label("here")]
        span: miette::SourceSpan,
        #[source]
        source: kdl::KdlError,
    },

    #[error("Invalid configuration: {message}")]
    #[diagnostic(code(twokeys::config::invalid))]
    Invalid { message: String },

    #[error("Missing {field}")]
    #[diagnostic(
        code(twokeys::config::missing_field),
        help("Every keyboard needs a name, at least one device path and a hotkeys block")
    )]
    MissingField { field: String },

    #[error("Cannot read configuration: {0}")]
    #[diagnostic(code(twokeys::config::io))]
    Io(#[from] std::io::Error),
}
