//! Summon-phrase command parsing.
//!
//! A comment invokes a bot by containing its summon phrase ("CPUBot!")
//! followed by one or more lookup terms separated by `", "`. The argument run
//! ends at the end of the line, at `?` or `!`, or where any registered phrase
//! begins, so that `CPUBot! Ryzen 5 GPUBot! RTX 3080` gives the CPU bot only
//! "Ryzen 5".

use regex::{Regex, RegexBuilder};

use crate::error::{CommandError, ConfigError, ConfigResult};

/// Literal separator between terms of a multi-lookup invocation.
pub const TERM_SEPARATOR: &str = ", ";

/// The arguments captured for one summon phrase in one comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub phrase: String,
    pub raw_arguments: Vec<String>,
}

/// A parser for one phrase, compiled against the full phrase registry.
#[derive(Debug, Clone)]
pub struct CommandParser {
    phrase: String,
    locate: Regex,
    terminator: Regex,
}

impl CommandParser {
    /// Compile a parser for `phrase`. `all_phrases` is every registered
    /// phrase; any of them starting inside the argument run ends it.
    pub fn new<'a>(
        phrase: &str,
        all_phrases: impl IntoIterator<Item = &'a str>,
    ) -> ConfigResult<Self> {
        if phrase.trim().is_empty() {
            return Err(ConfigError::Invalid {
                message: "summon phrase must not be empty".into(),
            });
        }

        let locate = case_insensitive(&regex::escape(phrase))?;

        let mut alternatives = vec![r"[\n\r?!]".to_string()];
        alternatives.extend(
            all_phrases
                .into_iter()
                .filter(|p| !p.is_empty())
                .map(regex::escape),
        );
        let terminator = case_insensitive(&alternatives.join("|"))?;

        Ok(Self {
            phrase: phrase.to_string(),
            locate,
            terminator,
        })
    }

    pub fn phrase(&self) -> &str {
        &self.phrase
    }

    /// Whether the phrase occurs anywhere in `body`, ignoring case.
    pub fn is_summoned(&self, body: &str) -> bool {
        self.locate.is_match(body)
    }

    /// Terms following the first occurrence of the phrase.
    ///
    /// Returns an empty list when the phrase is absent, and
    /// [`CommandError::MissingArgument`] when it is present with nothing
    /// usable after it.
    pub fn terms(&self, body: &str) -> Result<Vec<String>, CommandError> {
        let Some(found) = self.locate.find(body) else {
            return Ok(Vec::new());
        };

        let rest = &body[found.end()..];
        let run = match self.terminator.find(rest) {
            Some(stop) => &rest[..stop.start()],
            None => rest,
        };

        let terms: Vec<String> = run
            .split(TERM_SEPARATOR)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();

        if terms.is_empty() {
            return Err(CommandError::MissingArgument {
                phrase: self.phrase.clone(),
            });
        }
        Ok(terms)
    }

    /// Like [`terms`](Self::terms), but `None` when the phrase is absent.
    pub fn parse(&self, body: &str) -> Result<Option<ParsedCommand>, CommandError> {
        if !self.is_summoned(body) {
            return Ok(None);
        }
        let raw_arguments = self.terms(body)?;
        Ok(Some(ParsedCommand {
            phrase: self.phrase.clone(),
            raw_arguments,
        }))
    }
}

/// One-shot form of [`CommandParser::terms`].
pub fn parse_command(
    body: &str,
    phrase: &str,
    all_phrases: &[&str],
) -> ConfigResult<Result<Vec<String>, CommandError>> {
    let parser = CommandParser::new(phrase, all_phrases.iter().copied())?;
    Ok(parser.terms(body))
}

fn case_insensitive(pattern: &str) -> ConfigResult<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| ConfigError::Invalid {
            message: format!("summon phrase pattern: {e}"),
        })
}
