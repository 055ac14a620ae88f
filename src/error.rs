//! Rich diagnostic error types for the helper bot.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so operators know exactly
//! what went wrong and how to fix it.
//!
//! Resolver outcomes (`NoMatch`, `Suggestions`) are not errors and never appear
//! here; they always produce a user-facing reply.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the helper bot.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain through to the operator.
#[derive(Debug, Error, Diagnostic)]
pub enum BotError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Catalog errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum CatalogError {
    #[error("fetch error for URL \"{url}\": {message}")]
    #[diagnostic(
        code(helper::catalog::fetch),
        help(
            "Failed to download the listing page. Check that the URL is reachable \
             and the network is available. The bot retries on the next restart."
        )
    )]
    Fetch { url: String, message: String },

    #[error("unexpected page layout at \"{url}\": {message}")]
    #[diagnostic(
        code(helper::catalog::layout),
        help(
            "The scraped page no longer has the expected structure. \
             The upstream site may have changed its markup; update the selectors."
        )
    )]
    Layout { url: String, message: String },

    #[error("empty catalog: no entries scraped from \"{url}\"")]
    #[diagnostic(
        code(helper::catalog::empty),
        help(
            "The listing table was found but produced no rows. \
             Verify the page in a browser and check for anti-bot interstitials."
        )
    )]
    Empty { url: String },
}

// ---------------------------------------------------------------------------
// Command errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
pub enum CommandError {
    #[error("summon phrase \"{phrase}\" has no argument")]
    #[diagnostic(
        code(helper::command::missing_argument),
        help("The invocation is answered with a usage reply instead of a lookup.")
    )]
    MissingArgument { phrase: String },
}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum TransportError {
    /// A collaborator-reported failure. The display text is the raw payload,
    /// e.g. `RATELIMIT: 'Take a break for 3 minutes ...' on field 'ratelimit'`.
    #[error("{message}")]
    #[diagnostic(
        code(helper::transport::api),
        help(
            "The forum API rejected the request. Rate-limit notices are waited \
             out automatically; anything else marks the comment handled."
        )
    )]
    Api { message: String },

    #[error("HTTP error for \"{url}\": {message}")]
    #[diagnostic(
        code(helper::transport::http),
        help("The request did not complete. Check network connectivity and the API host.")
    )]
    Http { url: String, message: String },

    #[error("authentication failed: {message}")]
    #[diagnostic(
        code(helper::transport::auth),
        help(
            "Check REDDIT_CLIENT_ID, REDDIT_CLIENT_SECRET, REDDIT_USERNAME and \
             REDDIT_PASSWORD. Script apps must list the bot account as a developer."
        )
    )]
    Auth { message: String },

    #[error("could not decode response from \"{url}\": {message}")]
    #[diagnostic(
        code(helper::transport::decode),
        help("The response body was not in the expected format.")
    )]
    Decode { url: String, message: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Detail(#[from] CatalogError),
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config file: {path}")]
    #[diagnostic(
        code(helper::config::read),
        help("Check that the file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write config file: {path}")]
    #[diagnostic(
        code(helper::config::write),
        help("Check directory permissions and available disk space.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {message}")]
    #[diagnostic(
        code(helper::config::parse),
        help("The file must be valid TOML. Run `helper-bot config` to print a working default.")
    )]
    Parse { path: String, message: String },

    #[error("invalid configuration: {message}")]
    #[diagnostic(code(helper::config::invalid), help("{message}"))]
    Invalid { message: String },

    #[error("missing environment variable {name}")]
    #[diagnostic(
        code(helper::config::missing_env),
        help("Credentials are read from the environment only, never from the config file.")
    )]
    MissingEnv { name: String },
}

/// Convenience alias for catalog operations.
pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

/// Convenience alias for transport operations.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Convenience alias for configuration loading.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Convenience alias for functions returning helper-bot results.
pub type BotResult<T> = std::result::Result<T, BotError>;
