//! CLI transport for direct terminal interaction
//!
//! Reads lines from stdin and turns them into controller intents; prints
//! streamed replies, rendered code blocks and execution results as they
//! arrive.

use std::collections::HashMap;
use std::io::{self, Write};

use anyhow::Result;
use colored::Colorize;
use crossterm::style::{Attribute, ContentStyle, PrintStyledContent, StyledContent};
use crossterm::QueueableCommand;
use ratatui::style::{Color, Modifier};
use ratatui::text::Line;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::config::Config;
use crate::controller::{BlockTarget, Intent, SessionController, SessionEvent};
use crate::core::transcript::ReplyOutcome;
use crate::core::types::{BlockRef, CodeBlockState, Message, MessageId, Role};
use crate::render::{Palette, RenderTree};

/// One line of terminal input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Intent(Intent),
    Help,
    Quit,
    Invalid(String),
}

/// Parse a line typed at the prompt
///
/// Plain text is chat input; `/copy`, `/run`, `/history`, `/help` and
/// `/quit` are commands. Blocks are addressed as `N` (latest reply) or
/// `M:N` / `#M:N` (reply `M`).
pub fn parse_input(line: &str) -> Input {
    let line = line.trim();
    let Some(command) = line.strip_prefix('/') else {
        return Input::Intent(Intent::Send(line.to_string()));
    };

    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let arg = parts.next();

    match name {
        "quit" | "exit" | "q" => Input::Quit,
        "history" => Input::Intent(Intent::History),
        "help" | "?" => Input::Help,
        "copy" | "run" => {
            let Some(target) = arg.and_then(parse_target) else {
                return Input::Invalid(format!("Usage: /{} <block> or /{} <msg>:<block>", name, name));
            };
            if name == "copy" {
                Input::Intent(Intent::Copy(target))
            } else {
                Input::Intent(Intent::Execute(target))
            }
        }
        other => Input::Invalid(format!("Unknown command: /{}", other)),
    }
}

fn parse_target(arg: &str) -> Option<BlockTarget> {
    let arg = arg.trim_start_matches('#');
    match arg.split_once(':') {
        Some((message, index)) => Some(BlockTarget::in_message(
            MessageId(message.parse().ok()?),
            index.parse().ok()?,
        )),
        None => Some(BlockTarget::Latest(arg.parse().ok()?)),
    }
}

fn to_crossterm(color: Color) -> crossterm::style::Color {
    use crossterm::style::Color as C;
    match color {
        Color::Reset => C::Reset,
        Color::Black => C::Black,
        Color::Red => C::DarkRed,
        Color::Green => C::DarkGreen,
        Color::Yellow => C::DarkYellow,
        Color::Blue => C::DarkBlue,
        Color::Magenta => C::DarkMagenta,
        Color::Cyan => C::DarkCyan,
        Color::Gray => C::Grey,
        Color::DarkGray => C::DarkGrey,
        Color::LightRed => C::Red,
        Color::LightGreen => C::Green,
        Color::LightYellow => C::Yellow,
        Color::LightBlue => C::Blue,
        Color::LightMagenta => C::Magenta,
        Color::LightCyan => C::Cyan,
        Color::White => C::White,
        Color::Rgb(r, g, b) => C::Rgb { r, g, b },
        Color::Indexed(i) => C::AnsiValue(i),
    }
}

fn write_lines(out: &mut impl Write, lines: &[Line<'static>]) -> io::Result<()> {
    for line in lines {
        for span in &line.spans {
            let mut style = ContentStyle::new();
            style.foreground_color = span.style.fg.map(to_crossterm);
            style.background_color = span.style.bg.map(to_crossterm);
            let modifier = span.style.add_modifier;
            if modifier.contains(Modifier::BOLD) {
                style.attributes.set(Attribute::Bold);
            }
            if modifier.contains(Modifier::ITALIC) {
                style.attributes.set(Attribute::Italic);
            }
            if modifier.contains(Modifier::UNDERLINED) {
                style.attributes.set(Attribute::Underlined);
            }
            if modifier.contains(Modifier::CROSSED_OUT) {
                style.attributes.set(Attribute::CrossedOut);
            }
            out.queue(PrintStyledContent(StyledContent::new(
                style,
                span.content.as_ref(),
            )))?;
        }
        writeln!(out)?;
    }
    out.flush()
}

/// Terminal view of the session, driven by controller events
struct TerminalView {
    palette: Palette,
    states: HashMap<BlockRef, CodeBlockState>,
}

impl TerminalView {
    fn new(palette: Palette) -> Self {
        Self {
            palette,
            states: HashMap::new(),
        }
    }

    fn print_tree(&self, tree: &RenderTree) -> io::Result<()> {
        let lines = tree.display_lines(&self.palette, |block| self.states.get(&block).copied());
        write_lines(&mut io::stdout(), &lines)
    }

    fn show(&mut self, event: SessionEvent) -> io::Result<()> {
        match event {
            SessionEvent::UserMessage { .. } => {}
            SessionEvent::Queued { position, .. } => {
                println!("{}", format!("(queued, position {})", position).dimmed());
            }
            SessionEvent::ExchangeStarted { id } => {
                print!("{} ", format!("bota {}>", id).bold().cyan());
                io::stdout().flush()?;
            }
            SessionEvent::Delta { text, .. } => {
                print!("{}", text);
                io::stdout().flush()?;
            }
            SessionEvent::Rendered { .. } => {}
            SessionEvent::Finalized { id, tree, blocks } => {
                for block in &blocks {
                    self.states
                        .insert(BlockRef::new(id, block.index), block.state);
                }
                println!();
                println!("{}", "─".repeat(40).dimmed());
                self.print_tree(&tree)?;
                if !blocks.is_empty() {
                    println!(
                        "{}",
                        format!("/copy N or /run N (N = 0..{})", blocks.len() - 1).dimmed()
                    );
                }
                println!();
            }
            SessionEvent::ExchangeSettled { reply, .. } => {
                if reply == ReplyOutcome::Discarded {
                    println!();
                }
            }
            SessionEvent::BlockState { block, state } => {
                self.states.insert(block, state);
                let label = format!("[{}] {}", block, state.label());
                let label = match state {
                    CodeBlockState::Copied | CodeBlockState::Succeeded => label.green(),
                    CodeBlockState::CopyFailed | CodeBlockState::Failed => label.red(),
                    CodeBlockState::Running => label.yellow(),
                    CodeBlockState::Idle => label.dimmed(),
                };
                println!("{}", label);
            }
            SessionEvent::ExecutionResult { block, tree, .. } => {
                println!("{}", format!("Result of {}:", block).bold());
                self.print_tree(&tree)?;
                println!();
            }
            SessionEvent::History(messages) => {
                for line in format_history(&messages) {
                    println!("{}", line);
                }
            }
            SessionEvent::Notice { text, .. } => {
                println!("{}", text.yellow());
            }
            SessionEvent::Error(message) => {
                eprintln!("{} {}", "Error:".red().bold(), message);
            }
        }
        Ok(())
    }
}

/// Conversation history as printable lines, system instruction left out
fn format_history(messages: &[Message]) -> Vec<String> {
    let mut lines = Vec::new();
    for message in messages.iter().filter(|m| m.role != Role::System) {
        let stamp = message
            .timestamp
            .with_timezone(&chrono::Local)
            .format("%H:%M:%S");
        let who = match message.role {
            Role::User => "you",
            _ => "bota",
        };
        lines.push(format!("{} [{}] {}", who.bold(), stamp, message.id));
        if message.content.is_empty() {
            lines.push("(no content)".dimmed().to_string());
        } else {
            lines.push(message.content.clone());
        }
        lines.push(String::new());
    }
    if lines.is_empty() {
        lines.push("(no messages yet)".dimmed().to_string());
    }
    lines
}

fn print_help() {
    println!("{}", "Commands:".bold());
    println!("  /copy N      copy block N of the latest reply");
    println!("  /copy M:N    copy block N of reply #M");
    println!("  /run N       run block N of the latest reply (also /run M:N)");
    println!("  /history     show the conversation so far");
    println!("  /quit        leave");
}

/// Run interactive chat mode on stdin/stdout
pub async fn run_chat(config: Config) -> Result<()> {
    let (event_tx, mut events) = mpsc::unbounded_channel();
    let (intent_tx, intent_rx) = mpsc::unbounded_channel();

    let controller = SessionController::from_config(&config, event_tx);
    let mut controller_task = tokio::spawn(controller.run(intent_rx));
    let mut view = TerminalView::new(Palette::for_theme(config.render.theme));

    println!("{}", "bota chat mode".bold().cyan());
    println!("Chat service: {}", config.chat.endpoint);
    println!("Type /help for commands, /quit to exit\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut at_eof = false;
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    at_eof = true;
                    break;
                };
                match parse_input(&line) {
                    Input::Quit => {
                        println!("Goodbye!");
                        break;
                    }
                    Input::Help => print_help(),
                    Input::Invalid(message) => eprintln!("{}", message.red()),
                    Input::Intent(intent) => {
                        if intent_tx.send(intent).is_err() {
                            tracing::error!("Session controller stopped unexpectedly");
                            break;
                        }
                    }
                }
            }
            Some(event) = events.recv() => view.show(event)?,
        }
    }

    let controller = if at_eof && intent_tx.send(Intent::QuitWhenIdle).is_ok() {
        tracing::debug!("Input closed, waiting for the session to go idle");
        loop {
            tokio::select! {
                Some(event) = events.recv() => view.show(event)?,
                controller = &mut controller_task => break controller?,
            }
        }
    } else {
        let _ = intent_tx.send(Intent::Quit);
        controller_task.await?
    };
    while let Ok(event) = events.try_recv() {
        view.show(event)?;
    }
    tracing::info!(
        "Chat ended with {} messages in history",
        controller.session().history_len()
    );
    Ok(())
}

/// Print the effective configuration and where it is read from
pub fn run_show_config(config: &Config) -> Result<()> {
    let path = Config::config_path()?;
    println!("{}", "=== bota configuration ===".bold().cyan());
    println!("# {}", path.display());
    println!();
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
