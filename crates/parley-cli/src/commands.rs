//! Input line parsing.
//!
//! Lines starting with `/` are commands; anything else is a message for the
//! open conversation.

use parley_app::Command;
use parley_client::MessageKey;
use parley_proto::ConversationId;
use thiserror::Error;

/// Usage text printed by `/help`.
pub const HELP: &str = "\
commands:
  /connect              connect to the gateway
  /disconnect           disconnect, keeping the session
  /logout               disconnect and forget everything
  /refresh              reload the conversation list
  /list                 show conversations
  /open <id>            open a conversation
  /close                close the open conversation
  /new <user id>        start a conversation
  /read [id]            mark a conversation read
  /older                load older messages of the open conversation
  /typing               signal typing in the open conversation
  /retry <id|temp id>   resend a pending or failed message
  /reply <text>         simulate an answer from the other participant
  /quit                 leave
anything else is sent to the open conversation";

/// What one input line asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Forward to the runtime.
    Run(Command),
    /// Have the counterpart of the open conversation send this text.
    Reply(String),
    /// Print the conversation list.
    List,
    /// Print usage.
    Help,
    /// Leave.
    Quit,
    /// Blank line.
    Nothing,
}

/// Lines that cannot be turned into an [`Input`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InputError {
    /// Slash command nobody knows.
    #[error("unknown command /{0}, try /help")]
    UnknownCommand(String),

    /// Missing argument.
    #[error("usage: {0}")]
    Usage(&'static str),

    /// Argument is not a numeric id.
    #[error("not an id: {0}")]
    InvalidId(String),

    /// Command needs an open conversation.
    #[error("no conversation open, use /open <id>")]
    NoActiveConversation,
}

/// Parse one line typed while `active` is open.
pub fn parse(line: &str, active: Option<ConversationId>) -> Result<Input, InputError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Input::Nothing);
    }

    let Some(command) = line.strip_prefix('/') else {
        let conversation_id = active.ok_or(InputError::NoActiveConversation)?;
        return Ok(Input::Run(Command::SendMessage { conversation_id, content: line.to_owned() }));
    };

    let (name, rest) = command
        .split_once(char::is_whitespace)
        .map_or((command, ""), |(name, rest)| (name, rest.trim()));

    let input = match name {
        "connect" => Input::Run(Command::Connect),
        "disconnect" => Input::Run(Command::Disconnect),
        "logout" => Input::Run(Command::Logout),
        "refresh" => Input::Run(Command::RefreshConversations),
        "list" => Input::List,
        "open" => Input::Run(Command::SetActiveConversation(Some(id(rest, "/open <id>")?))),
        "close" => Input::Run(Command::SetActiveConversation(None)),
        "new" => {
            Input::Run(Command::CreateConversation { counterpart: id(rest, "/new <user id>")? })
        },
        "read" => {
            let conversation_id = if rest.is_empty() {
                active.ok_or(InputError::NoActiveConversation)?
            } else {
                id(rest, "/read [id]")?
            };
            Input::Run(Command::MarkRead { conversation_id })
        },
        "older" => {
            let conversation_id = active.ok_or(InputError::NoActiveConversation)?;
            Input::Run(Command::LoadOlderHistory { conversation_id })
        },
        "typing" => {
            let conversation_id = active.ok_or(InputError::NoActiveConversation)?;
            Input::Run(Command::Keystroke { conversation_id })
        },
        "retry" => {
            if rest.is_empty() {
                return Err(InputError::Usage("/retry <id|temp id>"));
            }
            let conversation_id = active.ok_or(InputError::NoActiveConversation)?;
            let key =
                rest.parse().map_or_else(|_| MessageKey::Temp(rest.to_owned()), MessageKey::Id);
            Input::Run(Command::RetryMessage { conversation_id, key })
        },
        "reply" => {
            if rest.is_empty() {
                return Err(InputError::Usage("/reply <text>"));
            }
            Input::Reply(rest.to_owned())
        },
        "help" => Input::Help,
        "quit" | "exit" => Input::Quit,
        other => return Err(InputError::UnknownCommand(other.to_owned())),
    };
    Ok(input)
}

fn id(text: &str, usage: &'static str) -> Result<u64, InputError> {
    if text.is_empty() {
        return Err(InputError::Usage(usage));
    }
    text.parse().map_err(|_| InputError::InvalidId(text.to_owned()))
}
