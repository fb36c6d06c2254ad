//! Input parser: classifies one raw line as a plain message or a command.

use super::command::{COMMAND_SENTINEL, Command};

/// A classified line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedInput {
    /// Plain text for the active session, forwarded unchanged.
    Message { content: String },
    /// A recognised slash command.
    Command {
        command: Command,
        /// Text after the command token, leading whitespace removed.
        argument: String,
        /// The full line as typed.
        raw: String,
    },
}

/// Parses raw user input into `ParsedInput`.
pub struct InputParser;

impl InputParser {
    /// Classify a raw line.
    ///
    /// The line is split at its first whitespace run. Unknown commands fall
    /// back to a plain message holding the whole line.
    pub fn parse(raw: &str) -> ParsedInput {
        let (head, rest) = split_head(raw);

        if head.starts_with(COMMAND_SENTINEL)
            && let Some(command) = Command::from_token(head)
        {
            return ParsedInput::Command {
                command,
                argument: rest.to_string(),
                raw: raw.to_string(),
            };
        }

        ParsedInput::Message {
            content: raw.to_string(),
        }
    }
}

/// Split at the first whitespace run into `(head, rest)`.
fn split_head(raw: &str) -> (&str, &str) {
    match raw.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim_start()),
        None => (raw, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_forwarded_unchanged() {
        assert_eq!(
            InputParser::parse("hello world"),
            ParsedInput::Message {
                content: "hello world".into()
            }
        );
    }

    #[test]
    fn known_command_extracts_argument() {
        assert_eq!(
            InputParser::parse("/summarize some long text"),
            ParsedInput::Command {
                command: Command::Summarize,
                argument: "some long text".into(),
                raw: "/summarize some long text".into(),
            }
        );
    }

    #[test]
    fn whitespace_run_after_token_is_skipped() {
        let parsed = InputParser::parse("/explain \t  black holes  ");
        assert!(matches!(
            parsed,
            ParsedInput::Command { command: Command::Explain, ref argument, .. }
                if argument == "black holes  "
        ));
    }

    #[test]
    fn command_without_argument() {
        let parsed = InputParser::parse("/idea");
        assert!(matches!(
            parsed,
            ParsedInput::Command { command: Command::Idea, ref argument, .. } if argument.is_empty()
        ));
    }

    #[test]
    fn newline_separates_token_from_argument() {
        let parsed = InputParser::parse("/summarize\nfirst line\nsecond line");
        assert!(matches!(
            parsed,
            ParsedInput::Command { command: Command::Summarize, ref argument, .. }
                if argument == "first line\nsecond line"
        ));
    }

    #[test]
    fn unknown_command_falls_back_to_message() {
        assert_eq!(
            InputParser::parse("/bogus hello"),
            ParsedInput::Message {
                content: "/bogus hello".into()
            }
        );
    }

    #[test]
    fn sentinel_must_lead_the_line() {
        assert_eq!(
            InputParser::parse("please /summarize this"),
            ParsedInput::Message {
                content: "please /summarize this".into()
            }
        );
    }

    #[test]
    fn mixed_case_command_is_recognised() {
        assert!(matches!(
            InputParser::parse("/Imagine a red fox"),
            ParsedInput::Command { command: Command::Imagine, .. }
        ));
    }

    #[test]
    fn token_prefix_is_not_a_match() {
        assert!(matches!(
            InputParser::parse("/summarizeX text"),
            ParsedInput::Message { .. }
        ));
    }
}
