use anyhow::{anyhow, bail};
use tracing::debug;

use crate::category::{CategoryDraft, CategoryId};
use crate::filter::{CategoryFilter, FilterPatch, QuickFilter, StatusFilter};
use crate::store::auth::Credentials;
use crate::store::theme::ThemeMode;
use crate::task::{Priority, TaskId, TaskPatch};

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "login",
        "demo",
        "logout",
        "whoami",
        "list",
        "all",
        "show",
        "add",
        "edit",
        "toggle",
        "done",
        "delete",
        "filter",
        "clear",
        "quick",
        "categories",
        "category",
        "stats",
        "theme",
        "status",
        "reload",
        "help",
        "quit",
        "exit",
    ]
}

/// Resolves `token` to a command name, accepting any unique prefix.
pub fn expand_command_abbrev<'a>(token: &str, known: &[&'a str]) -> Option<&'a str> {
    if let Some(exact) = known.iter().copied().find(|name| *name == token) {
        return Some(exact);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThemeChange {
    Toggle,
    Set(ThemeMode),
}

/// Task fields collected from `add`; the category falls back to the first
/// known one when omitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddArgs {
    pub title: String,
    pub description: Option<String>,
    pub category: Option<CategoryId>,
    pub priority: Option<Priority>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login(Credentials),
    Demo,
    Logout,
    Whoami,
    List,
    All,
    Show(TaskId),
    Add(AddArgs),
    Edit { id: TaskId, patch: TaskPatch },
    Toggle(TaskId),
    Delete(TaskId),
    Filter(FilterPatch),
    Clear,
    Quick(QuickFilter),
    Categories,
    Category(CategoryDraft),
    Stats,
    Theme(ThemeChange),
    Status,
    Reload,
    Help,
    Quit,
}

impl Command {
    /// Parses one input line. Blank lines and `#` comments yield `None`.
    #[tracing::instrument(skip_all)]
    pub fn parse(line: &str) -> anyhow::Result<Option<Command>> {
        let tokens = tokenize(line)?;
        let Some((head, args)) = tokens.split_first() else {
            return Ok(None);
        };
        if head.starts_with('#') {
            return Ok(None);
        }

        let lowered = head.to_ascii_lowercase();
        let name = expand_command_abbrev(&lowered, &known_command_names())
            .ok_or_else(|| anyhow!("unknown command: {head} (try help)"))?;
        debug!(command = name, args = args.len(), "parsed command");

        let command = match name {
            "login" => {
                let [email, password] = args else {
                    bail!("usage: login <email> <password>");
                };
                Command::Login(Credentials::new(email, password))
            }
            "demo" => Command::Demo,
            "logout" => Command::Logout,
            "whoami" => Command::Whoami,
            "list" => Command::List,
            "all" => Command::All,
            "show" => Command::Show(single_id(name, args)?),
            "add" => Command::Add(parse_add(args)?),
            "edit" => parse_edit(args)?,
            "toggle" | "done" => Command::Toggle(single_id(name, args)?),
            "delete" => Command::Delete(single_id(name, args)?),
            "filter" => Command::Filter(parse_filter(args)?),
            "clear" => Command::Clear,
            "quick" => {
                let [which] = args else {
                    bail!("usage: quick pending|completed|all");
                };
                Command::Quick(which.parse()?)
            }
            "categories" => Command::Categories,
            "category" => Command::Category(parse_category(args)?),
            "stats" => Command::Stats,
            "theme" => Command::Theme(match args {
                [] => ThemeChange::Toggle,
                [arg] if arg.eq_ignore_ascii_case("toggle") => ThemeChange::Toggle,
                [arg] => ThemeChange::Set(arg.parse()?),
                _ => bail!("usage: theme [toggle|dark|light]"),
            }),
            "status" => Command::Status,
            "reload" => Command::Reload,
            "help" => Command::Help,
            _ => Command::Quit,
        };
        Ok(Some(command))
    }

    /// Whether the command needs a logged-in session.
    pub fn requires_session(&self) -> bool {
        !matches!(
            self,
            Command::Login(_) | Command::Demo | Command::Theme(_) | Command::Help | Command::Quit
        )
    }
}

/// Splits on whitespace; double quotes group words and `\"` escapes a quote.
pub fn tokenize(line: &str) -> anyhow::Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quoted = false;
    let mut chars = line.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '\\' if quoted => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            '"' => {
                quoted = !quoted;
                in_token = true;
            }
            c if c.is_whitespace() && !quoted => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                current.push(c);
                in_token = true;
            }
        }
    }

    if quoted {
        bail!("unterminated quote");
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

fn single_id(name: &str, args: &[String]) -> anyhow::Result<TaskId> {
    let [id] = args else {
        bail!("usage: {name} <id>");
    };
    Ok(id.parse()?)
}

/// Splits `key:value` modifiers from free words. Everything after `--` is
/// taken literally.
fn split_mods<'a>(
    args: &'a [String],
    keys: &[&'static str],
) -> (Vec<&'a str>, Vec<(&'static str, &'a str)>) {
    let mut words = Vec::new();
    let mut mods = Vec::new();
    let mut literal = false;

    for arg in args {
        if arg == "--" && !literal {
            literal = true;
            continue;
        }
        if !literal
            && let Some((key, value)) = arg.split_once(':')
            && let Some(known) = keys.iter().find(|k| k.eq_ignore_ascii_case(key))
        {
            mods.push((*known, value));
            continue;
        }
        words.push(arg.as_str());
    }

    (words, mods)
}

fn parse_add(args: &[String]) -> anyhow::Result<AddArgs> {
    let (words, mods) = split_mods(args, &["cat", "prio", "desc"]);
    if words.is_empty() {
        bail!("usage: add <title> [cat:<id>] [prio:<low|medium|high>] [desc:<text>]");
    }

    let mut out = AddArgs {
        title: words.join(" "),
        description: None,
        category: None,
        priority: None,
    };
    for (key, value) in mods {
        match key {
            "cat" => out.category = Some(value.parse()?),
            "prio" => out.priority = Some(value.parse()?),
            _ => out.description = Some(value.to_string()),
        }
    }
    Ok(out)
}

fn parse_edit(args: &[String]) -> anyhow::Result<Command> {
    let Some((id, rest)) = args.split_first() else {
        bail!("usage: edit <id> [title:<t>] [cat:<id>] [prio:<p>] [desc:<text>] [done:<yes|no>]");
    };
    let id: TaskId = id.parse()?;
    let (words, mods) = split_mods(rest, &["title", "cat", "prio", "desc", "done"]);

    let mut patch = TaskPatch::default();
    if !words.is_empty() {
        patch.title = Some(words.join(" "));
    }
    for (key, value) in mods {
        match key {
            "title" => patch.title = Some(value.to_string()),
            "cat" => patch.category_id = Some(value.parse()?),
            "prio" => patch.priority = Some(value.parse()?),
            "desc" => patch.description = Some(value.to_string()),
            _ => patch.completed = Some(parse_yes_no(value)?),
        }
    }
    if patch.is_empty() {
        bail!("edit: nothing to change");
    }
    Ok(Command::Edit { id, patch })
}

fn parse_filter(args: &[String]) -> anyhow::Result<FilterPatch> {
    let (words, mods) = split_mods(args, &["cat", "status", "search"]);
    let mut patch = FilterPatch::default();
    for (key, value) in mods {
        patch = match key {
            "cat" => patch.category(value.parse::<CategoryFilter>()?),
            "status" => patch.status(value.parse::<StatusFilter>()?),
            _ => patch.search(value),
        };
    }
    if !words.is_empty() {
        patch = patch.search(words.join(" "));
    }
    if patch.is_empty() {
        bail!("usage: filter [cat:<id|all>] [status:<all|pending|completed>] [search:<text>]");
    }
    Ok(patch)
}

fn parse_category(args: &[String]) -> anyhow::Result<CategoryDraft> {
    let (words, mods) = split_mods(args, &["color"]);
    let mut draft = CategoryDraft::new(words.join(" "));
    if let Some((_, color)) = mods.last() {
        draft = draft.with_color(*color);
    }
    Ok(draft)
}

fn parse_yes_no(value: &str) -> anyhow::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" | "true" | "on" | "1" => Ok(true),
        "n" | "no" | "false" | "off" | "0" => Ok(false),
        other => Err(anyhow!("expected yes or no, got: {other}")),
    }
}
