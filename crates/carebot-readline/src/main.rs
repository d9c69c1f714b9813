use std::borrow::Cow::{self, Borrowed, Owned};
use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::Editor;
use rustyline::{Context, Helper};
use tracing_subscriber::EnvFilter;

use carebot_application::ConversationController;
use carebot_core::message::{ChatMessage, MessageSender, MessageStatus};
use carebot_core::state::{ConnectionStatus, Theme};
use carebot_infrastructure::JsonFileStorage;
use carebot_interaction::HttpChatApi;

/// CLI helper for rustyline that provides completion, highlighting, and hints.
#[derive(Clone)]
struct CliHelper {
    commands: Vec<String>,
}

impl CliHelper {
    fn new() -> Self {
        Self {
            commands: vec![
                "/actions".to_string(),
                "/end".to_string(),
                "/health".to_string(),
                "/retry".to_string(),
                "/theme".to_string(),
            ],
        }
    }
}

impl Helper for CliHelper {}

impl Completer for CliHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];

        if line.starts_with('/') {
            let candidates: Vec<Pair> = self
                .commands
                .iter()
                .filter(|cmd| cmd.starts_with(line))
                .map(|cmd| Pair {
                    display: cmd.clone(),
                    replacement: cmd.clone(),
                })
                .collect();
            Ok((0, candidates))
        } else {
            Ok((0, vec![]))
        }
    }
}

impl Highlighter for CliHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.starts_with('/') {
            Owned(line.bright_cyan().to_string())
        } else {
            Borrowed(line)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Hinter for CliHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let line = &line[..pos];

        if line.starts_with('/') && !line.contains(' ') {
            self.commands
                .iter()
                .find(|cmd| cmd.starts_with(line) && cmd.len() > line.len())
                .map(|cmd| cmd[line.len()..].to_string())
        } else {
            None
        }
    }
}

impl Validator for CliHelper {}

/// Prints every message appended since the last render and returns the new
/// cursor. Quick replies and buttons of the latest bot message are listed as
/// numbered choices.
fn render_new_messages(messages: &[ChatMessage], printed: usize) -> usize {
    for message in &messages[printed.min(messages.len())..] {
        match message.sender {
            MessageSender::User => {
                let marker = match message.status {
                    MessageStatus::Failed => " (failed)".red().to_string(),
                    MessageStatus::Sending | MessageStatus::Sent => {
                        " (sending)".bright_black().to_string()
                    }
                    MessageStatus::Delivered => String::new(),
                };
                println!("{}{}", format!("> {}", message.text).green(), marker);
            }
            MessageSender::Bot => {
                for line in message.text.lines() {
                    println!("{}", line.bright_blue());
                }
                for (i, reply) in message.metadata.quick_replies.iter().enumerate() {
                    println!("{}", format!("  [{}] {}", i + 1, reply.text).cyan());
                }
                for (i, button) in message.metadata.buttons.iter().enumerate() {
                    println!("{}", format!("  [b{}] {}", i + 1, button.text).cyan());
                }
            }
        }
    }
    messages.len()
}

/// Collects the active form field-by-field and submits it. Validation
/// failures re-prompt the whole form; CTRL-C cancels it.
async fn run_form<H: Helper>(
    rl: &mut Editor<H, rustyline::history::DefaultHistory>,
    controller: &ConversationController,
) -> Result<()> {
    loop {
        let Some(form) = controller.state().await.current_form else {
            return Ok(());
        };

        println!("{}", format!("--- {} ---", form.title).bright_yellow());
        if !form.description.is_empty() {
            println!("{}", form.description.yellow());
        }

        let mut data = HashMap::new();
        for field in &form.fields {
            let prompt = if field.required {
                format!("{}: ", field.label)
            } else {
                format!("{} (optional): ", field.label)
            };
            let value = match rl.readline(&prompt) {
                Ok(value) => value,
                Err(rustyline::error::ReadlineError::Interrupted) => {
                    controller.cancel_form().await;
                    println!("{}", "Form cancelled.".yellow());
                    return Ok(());
                }
                Err(err) => return Err(err.into()),
            };
            data.insert(field.name.clone(), value.trim().to_string());
        }

        match controller.submit_form(&data).await {
            Ok(()) => return Ok(()),
            Err(err) => {
                println!("{}", format!("{err}").red());
                if let Some(error) = controller.state().await.error {
                    println!("{}", error.red());
                }
            }
        }
    }
}

fn status_label(status: ConnectionStatus) -> colored::ColoredString {
    match status {
        ConnectionStatus::Connected => "connected".bright_green(),
        ConnectionStatus::Connecting => "connecting".yellow(),
        ConnectionStatus::Disconnected => "disconnected".red(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let api = Arc::new(HttpChatApi::from_env()?);
    let storage = Arc::new(JsonFileStorage::default_location().await?);
    let controller = ConversationController::new(api, storage, true);
    controller.init().await?;

    let helper = CliHelper::new();
    let mut rl = Editor::new()?;
    rl.set_helper(Some(helper));

    println!("{}", "=== Carebot ===".bright_magenta().bold());
    println!(
        "{}",
        "Type a message, a number to pick a quick reply, or '/actions', '/retry', '/health', '/theme', '/end'. 'quit' exits."
            .bright_black()
    );
    println!();

    let mut printed = 0usize;
    let state = controller.state().await;
    printed = render_new_messages(&state.messages, printed);
    println!("{}", format!("[{}]", status_label(state.connection_status)).bright_black());

    loop {
        let readline = rl.readline(">> ");

        match readline {
            Ok(line) => {
                let trimmed = line.trim();

                if trimmed == "quit" || trimmed == "exit" {
                    println!("{}", "Goodbye!".bright_green());
                    break;
                }
                if trimmed.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(&line);

                match trimmed {
                    "/end" => {
                        controller.end_session().await;
                        printed = 0;
                        println!("{}", "Session ended.".bright_yellow());
                        continue;
                    }
                    "/retry" => {
                        if let Err(err) = controller.retry_message().await {
                            println!("{}", format!("{err}").red());
                        }
                    }
                    "/actions" => {
                        let actions = controller.state().await.quick_actions;
                        if actions.is_empty() {
                            println!("{}", "No quick actions available.".bright_black());
                        }
                        for action in &actions {
                            println!(
                                "{} {}",
                                format!("- {}:", action.title).cyan(),
                                action.description
                            );
                        }
                        continue;
                    }
                    "/health" => {
                        match controller.check_health().await {
                            Ok(health) => println!(
                                "{}",
                                format!("Backend status: {}", health.status).bright_green()
                            ),
                            Err(err) => println!("{}", format!("{err}").red()),
                        }
                        let status = controller.state().await.connection_status;
                        println!("{}", format!("[{}]", status_label(status)).bright_black());
                        continue;
                    }
                    "/theme" => {
                        controller.toggle_theme().await;
                        let theme = controller.state().await.theme;
                        let name = match theme {
                            Theme::Light => "light",
                            Theme::Dark => "dark",
                        };
                        println!("{}", format!("Theme: {name}").bright_yellow());
                        continue;
                    }
                    _ => {
                        let outcome = dispatch_input(&controller, trimmed).await;
                        if let Err(err) = outcome {
                            println!("{}", format!("{err}").red());
                        }
                    }
                }

                let state = controller.state().await;
                printed = render_new_messages(&state.messages, printed);
                if let Some(error) = &state.error {
                    println!("{}", error.red());
                }
                if state.current_form.is_some() {
                    run_form(&mut rl, &controller).await?;
                    let state = controller.state().await;
                    printed = render_new_messages(&state.messages, printed);
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                println!("{}", "CTRL-C detected. Type 'quit' to exit.".yellow());
            }
            Err(rustyline::error::ReadlineError::Eof) => {
                println!("{}", "CTRL-D detected. Exiting...".bright_green());
                break;
            }
            Err(err) => {
                eprintln!("{}", format!("Error: {:?}", err).red());
                break;
            }
        }
    }

    Ok(())
}

/// Routes free-form input: a bare number picks a quick reply, `bN` clicks a
/// button, anything else is sent as a message.
async fn dispatch_input(
    controller: &ConversationController,
    input: &str,
) -> carebot_core::error::Result<()> {
    let state = controller.state().await;
    let last_bot = state
        .messages
        .iter()
        .rev()
        .find(|m| m.sender == MessageSender::Bot);

    if let Ok(index) = input.parse::<usize>() {
        if let Some(reply) = last_bot
            .and_then(|m| index.checked_sub(1).and_then(|i| m.metadata.quick_replies.get(i)))
        {
            return controller.send_quick_reply(&reply.clone()).await;
        }
    }

    if let Some(index) = input
        .strip_prefix('b')
        .and_then(|rest| rest.parse::<usize>().ok())
    {
        if let Some(button) = last_bot
            .and_then(|m| index.checked_sub(1).and_then(|i| m.metadata.buttons.get(i)))
        {
            if let Some(route) = controller.click_button(&button.clone()).await? {
                println!("{}", format!("-> open {route}").bright_magenta());
            }
            return Ok(());
        }
    }

    controller.send_message(input).await
}
