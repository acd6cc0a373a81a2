//! Prompt construction and reply parsing for the tool-using runtime.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt::Write as _;
use stepwise_memory::SearchResult;

use crate::context::RuntimeContext;
use crate::error::{RuntimeError, RuntimeResult};
use crate::model::ChatMessage;

/// Command name that ends the execution.
pub const FINISH_COMMAND: &str = "finish";

const RESPONSE_FORMAT: &str = r#"{
    "thoughts": {
        "text": "thought",
        "reasoning": "reasoning",
        "plan": "short bulleted list that conveys the long-term plan",
        "criticism": "constructive self-criticism"
    },
    "command": {
        "name": "command name",
        "args": {"arg name": "value"}
    }
}"#;

const NEXT_COMMAND: &str = "Determine which next command to use, and respond using the format specified above:";

/// Messages for one step: the system prompt, then the request for a command.
pub fn build_messages(ctx: &RuntimeContext, goals: &[String], memories: &[SearchResult]) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(system_prompt(ctx, goals, memories)),
        ChatMessage::user(NEXT_COMMAND),
    ]
}

fn system_prompt(ctx: &RuntimeContext, goals: &[String], memories: &[SearchResult]) -> String {
    let mut prompt = String::new();
    let _ = writeln!(prompt, "You are {}, {}", ctx.name, ctx.role);
    prompt.push_str(
        "Your decisions must always be made independently without seeking user assistance.\n\
         Play to your strengths as a language model and pursue simple strategies.\n\n",
    );

    prompt.push_str("GOALS:\n");
    numbered(&mut prompt, goals.iter().map(String::as_str));

    if !ctx.config.constraints.is_empty() {
        prompt.push_str("\nCONSTRAINTS:\n");
        numbered(&mut prompt, ctx.config.constraints.iter().map(String::as_str));
    }

    prompt.push_str("\nCOMMANDS:\n");
    let mut index = 0;
    for tool in ctx.tools.iter() {
        index += 1;
        let _ = writeln!(
            prompt,
            "{}. \"{}\": {}, args json schema: {}",
            index,
            tool.name(),
            tool.description(),
            tool.args_schema()
        );
    }
    let _ = writeln!(
        prompt,
        "{}. \"{}\": use this to signal that you have finished all your objectives, args: \"reason\": \"<reason>\"",
        index + 1,
        FINISH_COMMAND
    );

    if !memories.is_empty() {
        prompt.push_str("\nRELEVANT MEMORIES:\n");
        for memory in memories {
            let _ = writeln!(prompt, "- {}", memory.entry.content);
        }
    }

    let _ = write!(
        prompt,
        "\nYou should only respond in JSON format as described below\nResponse Format:\n{}\nEnsure the response can be parsed by a JSON parser.",
        RESPONSE_FORMAT
    );
    prompt
}

fn numbered<'a>(out: &mut String, items: impl Iterator<Item = &'a str>) {
    for (i, item) in items.enumerate() {
        let _ = writeln!(out, "{}. {}", i + 1, item);
    }
}

/// The command the model chose.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentCommand {
    pub name: String,
    /// Always a JSON object.
    pub args: Value,
    /// The model's own summary of its reasoning, if it gave one.
    pub thought: Option<String>,
}

impl AgentCommand {
    pub fn is_finish(&self) -> bool {
        self.name.eq_ignore_ascii_case(FINISH_COMMAND)
    }
}

#[derive(Deserialize)]
struct Reply {
    #[serde(default)]
    thoughts: Option<Value>,
    command: RawCommand,
}

#[derive(Deserialize)]
struct RawCommand {
    name: String,
    #[serde(default)]
    args: Value,
}

/// Extract the command from a model reply.
///
/// The JSON object may be wrapped in prose or a fenced code block.
pub fn parse_command(reply: &str) -> RuntimeResult<AgentCommand> {
    let json = json_object(reply)
        .ok_or_else(|| RuntimeError::InvalidReply(format!("no JSON object in reply: {}", snippet(reply))))?;
    let parsed: Reply =
        serde_json::from_str(json).map_err(|e| RuntimeError::InvalidReply(format!("{}: {}", e, snippet(reply))))?;

    let name = parsed.command.name.trim().to_string();
    if name.is_empty() {
        return Err(RuntimeError::InvalidReply("command name is empty".to_string()));
    }
    let args = match parsed.command.args {
        Value::Object(map) => Value::Object(map),
        Value::Null => Value::Object(Map::new()),
        other => {
            return Err(RuntimeError::InvalidReply(format!(
                "command args must be an object, got {}",
                other
            )));
        }
    };
    let thought = parsed
        .thoughts
        .as_ref()
        .and_then(|thoughts| thoughts.get("text"))
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(AgentCommand { name, args, thought })
}

fn json_object(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    (end > start).then(|| &reply[start..=end])
}

fn snippet(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(120) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_plain_command() {
        let command = parse_command(
            r#"{"thoughts": {"text": "search first"}, "command": {"name": "Web Search", "args": {"query": "rust"}}}"#,
        )
        .unwrap();
        assert_eq!(command.name, "Web Search");
        assert_eq!(command.args, json!({"query": "rust"}));
        assert_eq!(command.thought.as_deref(), Some("search first"));
        assert!(!command.is_finish());
    }

    #[test]
    fn parses_fenced_reply_and_defaults_args() {
        let reply = "Sure, here it is:\n```json\n{\"command\": {\"name\": \"finish\"}}\n```";
        let command = parse_command(reply).unwrap();
        assert!(command.is_finish());
        assert_eq!(command.args, json!({}));
        assert_eq!(command.thought, None);
    }

    #[test]
    fn rejects_replies_without_command() {
        assert!(matches!(parse_command("I am done"), Err(RuntimeError::InvalidReply(_))));
        assert!(matches!(
            parse_command(r#"{"thoughts": {}}"#),
            Err(RuntimeError::InvalidReply(_))
        ));
        assert!(matches!(
            parse_command(r#"{"command": {"name": "Read File", "args": ["a"]}}"#),
            Err(RuntimeError::InvalidReply(_))
        ));
    }
}
