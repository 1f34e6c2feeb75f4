use std::path::PathBuf;

use crate::scenario::ScenarioKind;

pub const CHAT_HELP_COMMANDS: &[&str] = &[
    "/upload <path>",
    "/expand <scenario>",
    "/close",
    "/status",
    "/save",
    "/help",
    "/quit",
];

/// One line of chat input, resolved to the intent it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Noop,
    Help,
    Upload(PathBuf),
    Expand(ScenarioKind),
    Close,
    Status,
    Save,
    Quit,
    /// A known command with a missing or unusable argument.
    Invalid(String),
    Unknown(String),
}

pub fn parse_command(text: &str) -> ChatCommand {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return ChatCommand::Noop;
    }
    let Some(slash_tail) = trimmed.strip_prefix('/') else {
        return ChatCommand::Unknown(trimmed.to_string());
    };
    let command_len = slash_tail
        .chars()
        .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
        .count();
    let command = slash_tail[..command_len].to_ascii_lowercase();
    let arg = slash_tail[command_len..].trim();

    match command.as_str() {
        "help" => ChatCommand::Help,
        "close" => ChatCommand::Close,
        "status" => ChatCommand::Status,
        "save" => ChatCommand::Save,
        "quit" | "exit" => ChatCommand::Quit,
        "upload" => match first_arg(arg) {
            Some(path) => ChatCommand::Upload(PathBuf::from(path)),
            None => ChatCommand::Invalid("/upload requires a path".to_string()),
        },
        "expand" => match first_arg(arg) {
            Some(raw) => raw
                .parse::<ScenarioKind>()
                .map(ChatCommand::Expand)
                .unwrap_or_else(ChatCommand::Invalid),
            None => ChatCommand::Invalid("/expand requires a scenario".to_string()),
        },
        _ => ChatCommand::Unknown(trimmed.to_string()),
    }
}

fn first_arg(arg: &str) -> Option<String> {
    if arg.is_empty() {
        return None;
    }
    let parts = shell_words::split(arg)
        .unwrap_or_else(|_| arg.split_whitespace().map(str::to_string).collect());
    parts.into_iter().find(|value| !value.is_empty())
}
