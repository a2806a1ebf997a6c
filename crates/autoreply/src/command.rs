//! Console commands.

use std::fmt;
use std::str::FromStr;

use autoreply_core::{EmailId, ResponseLength, ResponseTone, SettingsPolicy};

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start Google sign-in.
    Login,
    /// Handle the address the provider redirected to.
    Callback(String),
    /// Show the signed-in user.
    WhoAmI,
    /// Open (or refresh) the unread worklist.
    Emails,
    /// Generate a reply for one email.
    Generate(EmailId),
    /// Send a reply; without text the generated reply is sent as-is.
    Send {
        /// Email to answer.
        id: EmailId,
        /// Edited reply text.
        text: Option<String>,
    },
    /// Open the settings page.
    Settings,
    /// Change one settings field and save.
    Set(SettingChange),
    /// Sign out.
    Logout,
    /// List commands.
    Help,
    /// Exit.
    Quit,
}

/// A single-field edit of the [`SettingsPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingChange {
    /// Toggle manual review.
    ManualReview(bool),
    /// Change the reply tone.
    Tone(ResponseTone),
    /// Change the reply length.
    Length(ResponseLength),
}

impl SettingChange {
    /// Returns `policy` with this change applied.
    #[must_use]
    pub const fn apply(self, policy: SettingsPolicy) -> SettingsPolicy {
        match self {
            Self::ManualReview(manual_review) => SettingsPolicy {
                manual_review,
                ..policy
            },
            Self::Tone(response_tone) => SettingsPolicy {
                response_tone,
                ..policy
            },
            Self::Length(response_length) => SettingsPolicy {
                response_length,
                ..policy
            },
        }
    }
}

/// Input that is not a valid command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError(String);

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ParseError {}

fn usage(text: &str) -> ParseError {
    ParseError(format!("usage: {text}"))
}

impl FromStr for Command {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(word, rest)| (word, rest.trim()));

        match word.to_ascii_lowercase().as_str() {
            "login" => Ok(Self::Login),
            "callback" if rest.is_empty() => Err(usage("callback <redirect url>")),
            "callback" => Ok(Self::Callback(rest.to_string())),
            "whoami" => Ok(Self::WhoAmI),
            "emails" | "refresh" => Ok(Self::Emails),
            "generate" if rest.is_empty() => Err(usage("generate <email id>")),
            "generate" => Ok(Self::Generate(EmailId::from(rest))),
            "send" => {
                let (id, text) = rest
                    .split_once(char::is_whitespace)
                    .map_or((rest, ""), |(id, text)| (id, text.trim()));
                if id.is_empty() {
                    return Err(usage("send <email id> [reply text]"));
                }
                Ok(Self::Send {
                    id: EmailId::from(id),
                    text: (!text.is_empty()).then(|| text.to_string()),
                })
            }
            "settings" => Ok(Self::Settings),
            "set" => parse_setting(rest).map(Self::Set),
            "logout" => Ok(Self::Logout),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" => Ok(Self::Quit),
            "" => Err(ParseError("empty command".to_string())),
            other => Err(ParseError(format!(
                "unknown command `{other}` (type `help` for a list)"
            ))),
        }
    }
}

fn parse_setting(rest: &str) -> Result<SettingChange, ParseError> {
    const USAGE: &str = "set <manual_review on|off | tone professional|friendly|formal | length short|medium|long>";

    let Some((field, value)) = rest.split_once(char::is_whitespace) else {
        return Err(usage(USAGE));
    };
    let value = value.trim();
    match field.to_ascii_lowercase().as_str() {
        "manual_review" | "review" => parse_bool(value)
            .map(SettingChange::ManualReview)
            .ok_or_else(|| ParseError(format!("expected on or off, got `{value}`"))),
        "tone" | "response_tone" => value
            .parse()
            .map(SettingChange::Tone)
            .map_err(ParseError),
        "length" | "response_length" => value
            .parse()
            .map(SettingChange::Length)
            .map_err(ParseError),
        _ => Err(usage(USAGE)),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Some(true),
        "off" | "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// Text printed by `help`.
pub const HELP: &str = "\
Commands:
  login                      sign in with Google
  callback <url>             finish sign-in with the address Google redirected to
  whoami                     show the signed-in user
  emails                     show unread emails (refreshes)
  generate <id>              generate a reply for an email
  send <id> [text]           send the generated reply, or your edited text
  settings                   show reply settings
  set <field> <value>        change manual_review, tone or length
  logout                     sign out
  quit                       exit";
