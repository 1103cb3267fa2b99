//! Command protocol embedded in assistant replies.
//!
//! Grammar (bit-exact, shared with the system prompt):
//!
//! ```text
//! 🔧[CMD:NAME]            NAME = one or more of A-Z
//! 🔧[CMD:NAME|arg|arg...]  arguments split on '|', each trimmed
//! ```
//!
//! Brackets do not nest: a payload ends at the first `]`. Anything other than `|` or `]`
//! right after the name (a tab, a space, lowercase letters) makes that occurrence malformed:
//! it is reported as a warning and never executed, but it is still stripped from the text
//! shown to the user.

pub mod executor;
pub mod render;

use regex::Regex;
use std::fmt;
use std::ops::Range;
use std::sync::OnceLock;

/// Sentinel that opens every command.
pub const MARKER: &str = "🔧";

/// Argument delimiter.
pub const DELIMITER: char = '|';

/// First-argument values of SETDUEDATE that mean "the task created last in this reply".
pub const LATEST_SENTINELS: &[&str] = &["@latest", "@"];

fn command_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"🔧\[CMD:([A-Z]+)([^\]]*)\]").expect("command pattern is valid"))
}

fn blank_run_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n\s*\n\s*\n").expect("blank-line pattern is valid"))
}

/// Command names. Unrecognized names are kept so they can be reported.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CommandName {
    Add,
    Complete,
    Delete,
    Update,
    SetDueDate,
    Unknown(String),
}

impl CommandName {
    pub fn from_token(token: &str) -> Self {
        match token {
            "ADD" => CommandName::Add,
            "COMPLETE" => CommandName::Complete,
            "DELETE" => CommandName::Delete,
            "UPDATE" => CommandName::Update,
            "SETDUEDATE" => CommandName::SetDueDate,
            other => CommandName::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            CommandName::Add => "ADD",
            CommandName::Complete => "COMPLETE",
            CommandName::Delete => "DELETE",
            CommandName::Update => "UPDATE",
            CommandName::SetDueDate => "SETDUEDATE",
            CommandName::Unknown(name) => name,
        }
    }
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One well-formed command occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: CommandName,
    pub args: Vec<String>,
    /// Byte range of the occurrence in the reply.
    pub span: Range<usize>,
    /// Exact matched text, e.g. `🔧[CMD:ADD|Buy milk]`.
    pub raw: String,
}

impl Command {
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    /// Arguments from `index` on, rejoined with the delimiter (free-text last parameter).
    pub fn rest(&self, index: usize) -> Option<String> {
        if index >= self.args.len() {
            return None;
        }
        let sep = DELIMITER.to_string();
        Some(self.args[index..].join(sep.as_str()))
    }
}

/// A recognized marker whose argument syntax is wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedCommand {
    pub span: Range<usize>,
    pub raw: String,
}

impl MalformedCommand {
    /// Warning line shown in the execution record.
    pub fn warning(&self) -> String {
        format!(
            "⚠️ Malformed command: {} (separate arguments with |, not tabs or spaces)",
            self.raw
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Command(Command),
    Malformed(MalformedCommand),
}

impl Token {
    fn span(&self) -> &Range<usize> {
        match self {
            Token::Command(c) => &c.span,
            Token::Malformed(m) => &m.span,
        }
    }
}

/// Result of scanning one reply.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedReply {
    /// Executable commands, left to right.
    pub commands: Vec<Command>,
    /// Malformed occurrences, left to right.
    pub malformed: Vec<MalformedCommand>,
    /// Reply with every occurrence removed (see `strip_commands`).
    pub clean_text: String,
}

impl ParsedReply {
    pub fn warnings(&self) -> Vec<String> {
        self.malformed.iter().map(MalformedCommand::warning).collect()
    }

    pub fn has_markup(&self) -> bool {
        !self.commands.is_empty() || !self.malformed.is_empty()
    }
}

/// Single left-to-right pass classifying each marker occurrence.
fn scan(text: &str) -> Vec<Token> {
    command_regex()
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let name = caps.get(1)?.as_str();
            let tail = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            let span = whole.range();
            let raw = whole.as_str().to_string();

            if tail.is_empty() {
                return Some(Token::Command(Command {
                    name: CommandName::from_token(name),
                    args: Vec::new(),
                    span,
                    raw,
                }));
            }
            match tail.strip_prefix(DELIMITER) {
                Some(payload) => Some(Token::Command(Command {
                    name: CommandName::from_token(name),
                    args: payload.split(DELIMITER).map(|a| a.trim().to_string()).collect(),
                    span,
                    raw,
                })),
                None => Some(Token::Malformed(MalformedCommand { span, raw })),
            }
        })
        .collect()
}

/// Parse a reply into executable commands, malformed warnings, and the clean text.
pub fn parse_reply(text: &str) -> ParsedReply {
    let tokens = scan(text);
    let clean_text = clean_text(text, &tokens);
    let mut parsed = ParsedReply {
        clean_text,
        ..ParsedReply::default()
    };
    for token in tokens {
        match token {
            Token::Command(c) => parsed.commands.push(c),
            Token::Malformed(m) => parsed.malformed.push(m),
        }
    }
    parsed
}

/// Remove all command markup (well-formed and malformed) from a reply.
///
/// Runs of three or more line breaks left behind collapse to one blank line and the result is
/// trimmed. A reply without markup is only trimmed.
pub fn strip_commands(text: &str) -> String {
    clean_text(text, &scan(text))
}

fn is_horizontal_space(c: char) -> bool {
    c == ' ' || c == '\t'
}

fn clean_text(text: &str, tokens: &[Token]) -> String {
    if tokens.is_empty() {
        return text.trim().to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for token in tokens {
        let span = token.span();
        push_segment(&mut out, &text[cursor..span.start]);
        cursor = span.end;
    }
    push_segment(&mut out, &text[cursor..]);
    blank_run_regex().replace_all(&out, "\n\n").trim().to_string()
}

/// Append a segment; when a removed command sat between two spaces, keep only one of them.
fn push_segment(out: &mut String, segment: &str) {
    if out.ends_with(is_horizontal_space) {
        out.push_str(segment.trim_start_matches(is_horizontal_space));
    } else {
        out.push_str(segment);
    }
}

/// True if `arg` is a forward reference to the last task created in the batch.
pub fn is_latest_sentinel(arg: &str) -> bool {
    LATEST_SENTINELS.contains(&arg.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_markup_is_identity_after_trim() {
        let text = "  Nothing to do here.\n\n\n\nReally.  ";
        let parsed = parse_reply(text);
        assert!(parsed.commands.is_empty());
        assert!(parsed.malformed.is_empty());
        assert_eq!(parsed.clean_text, text.trim());
    }

    #[test]
    fn parses_commands_in_order_with_args() {
        let text = "ok 🔧[CMD:ADD|Buy milk|2025-01-01 10:00] then 🔧[CMD:COMPLETE| 3 ] and 🔧[CMD:DELETE|4]";
        let parsed = parse_reply(text);
        let names: Vec<&str> = parsed.commands.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["ADD", "COMPLETE", "DELETE"]);
        assert_eq!(parsed.commands[0].args, vec!["Buy milk", "2025-01-01 10:00"]);
        assert_eq!(parsed.commands[1].args, vec!["3"]);
        assert_eq!(&text[parsed.commands[2].span.clone()], "🔧[CMD:DELETE|4]");
        assert_eq!(parsed.commands[2].raw, "🔧[CMD:DELETE|4]");
    }

    #[test]
    fn command_without_args_is_well_formed() {
        let parsed = parse_reply("🔧[CMD:ADD]");
        assert_eq!(parsed.commands.len(), 1);
        assert!(parsed.commands[0].args.is_empty());
        assert_eq!(parsed.clean_text, "");
    }

    #[test]
    fn whitespace_instead_of_delimiter_is_malformed() {
        let text = "a 🔧[CMD:ADD\tTask] b 🔧[CMD:COMPLETE 5] c 🔧[CMD:DELETE|1]";
        let parsed = parse_reply(text);
        assert_eq!(parsed.commands.len(), 1);
        assert_eq!(parsed.commands[0].name, CommandName::Delete);
        assert_eq!(parsed.malformed.len(), 2);
        assert_eq!(parsed.malformed[0].raw, "🔧[CMD:ADD\tTask]");
        assert_eq!(parsed.malformed[1].raw, "🔧[CMD:COMPLETE 5]");
        assert!(parsed.warnings()[1].contains("🔧[CMD:COMPLETE 5]"));
        assert_eq!(parsed.clean_text, "a b c");
    }

    #[test]
    fn unknown_names_are_kept() {
        let parsed = parse_reply("🔧[CMD:ARCHIVE|2]");
        assert_eq!(parsed.commands.len(), 1);
        assert_eq!(parsed.commands[0].name, CommandName::Unknown("ARCHIVE".to_string()));
        assert_eq!(parsed.commands[0].name.to_string(), "ARCHIVE");
    }

    #[test]
    fn lowercase_names_are_not_commands() {
        let text = "🔧[CMD:add|x]";
        let parsed = parse_reply(text);
        assert!(!parsed.has_markup());
        assert_eq!(parsed.clean_text, text);
    }

    #[test]
    fn payload_ends_at_first_bracket_and_is_not_rescanned() {
        let text = "🔧[CMD:UPDATE|1|see 🔧[CMD:DELETE|2] tail";
        let parsed = parse_reply(text);
        assert_eq!(parsed.commands.len(), 1);
        assert_eq!(parsed.commands[0].name, CommandName::Update);
        assert_eq!(parsed.commands[0].args, vec!["1", "see 🔧[CMD:DELETE", "2"]);
        assert_eq!(parsed.clean_text, "tail");
    }

    #[test]
    fn rest_rejoins_free_text() {
        let parsed = parse_reply("🔧[CMD:UPDATE|7|Call Bob | Alice]");
        let cmd = &parsed.commands[0];
        assert_eq!(cmd.arg(0), Some("7"));
        assert_eq!(cmd.rest(1).as_deref(), Some("Call Bob|Alice"));
        assert_eq!(cmd.rest(5), None);
    }

    #[test]
    fn clean_text_collapses_blank_runs() {
        let text = "Plan:\n\n🔧[CMD:ADD|A]\n\n🔧[CMD:ADD|B]\n\nDone.";
        assert_eq!(strip_commands(text), "Plan:\n\nDone.");
    }

    #[test]
    fn end_to_end_clean_text() {
        let parsed = parse_reply("Sure! 🔧[CMD:ADD|Finish report] Also 🔧[CMD:COMPLETE|9999]");
        assert_eq!(parsed.clean_text, "Sure! Also");
        assert_eq!(parsed.commands.len(), 2);
    }

    #[test]
    fn reinserting_commands_restores_text() {
        let text = "Line one.\n🔧[CMD:ADD|Write tests]\nLine two 🔧[CMD:SETDUEDATE|@latest|2025-01-01 10:00]\nEnd.";
        let parsed = parse_reply(text);
        let mut rebuilt = String::new();
        let mut cursor = 0;
        for c in &parsed.commands {
            rebuilt.push_str(&text[cursor..c.span.start]);
            rebuilt.push_str(&c.raw);
            cursor = c.span.end;
        }
        rebuilt.push_str(&text[cursor..]);
        assert_eq!(rebuilt, text);
        assert_eq!(parsed.clean_text, "Line one.\n\nLine two \nEnd.");
    }

    #[test]
    fn sentinels() {
        assert!(is_latest_sentinel("@latest"));
        assert!(is_latest_sentinel(" @ "));
        assert!(!is_latest_sentinel("@last"));
        assert!(!is_latest_sentinel("12"));
    }
}
