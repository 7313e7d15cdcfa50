// Console command parsing
use vigil_core::{PromptSelector, UserCommand};

pub const HELP: &str = "\
commands:
  prompts              reload the prompt list
  prompt <id|text>     select a prompt by id, or by text on older backends
  resume               resume alert processing
  annotated on|off     show the annotated or the raw frame
  alarm on|off         arm or disarm the alarm
  status               print the current view
  help                 this text
  quit                 exit";

/// What a console line asks for
#[derive(Debug, PartialEq, Eq)]
pub enum Input {
    Command(UserCommand),
    Status,
    Help,
}

pub fn parse_line(line: &str) -> Result<Option<Input>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };

    let input = match head.to_ascii_lowercase().as_str() {
        "prompts" => Input::Command(UserCommand::RefreshPrompts),
        "prompt" => {
            if rest.is_empty() {
                return Err("usage: prompt <id|text>".into());
            }
            let selector = match rest.parse::<i64>() {
                Ok(id) => PromptSelector::Id(id),
                Err(_) => PromptSelector::Text(rest.to_string()),
            };
            Input::Command(UserCommand::SetPrompt(selector))
        }
        "resume" => Input::Command(UserCommand::ResumeEvents),
        "annotated" => Input::Command(UserCommand::ShowAnnotated(on_off(rest)?)),
        "alarm" => Input::Command(UserCommand::ArmAlarm(on_off(rest)?)),
        "status" => Input::Status,
        "help" | "?" => Input::Help,
        "quit" | "exit" | "q" => Input::Command(UserCommand::Shutdown),
        other => return Err(format!("unknown command {other:?}; type help")),
    };
    Ok(Some(input))
}

fn on_off(arg: &str) -> Result<bool, String> {
    match arg.to_ascii_lowercase().as_str() {
        "on" | "1" | "true" | "yes" => Ok(true),
        "off" | "0" | "false" | "no" => Ok(false),
        _ => Err(format!("expected on|off, got {arg:?}")),
    }
}
