//! Interactive chat with one of the maintenance assistants.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use crate::cli::output::get_formatter;
use crate::models::{Category, Config, OutputFormat};
use crate::services::{ChatSession, OpenAiProvider, Turn, image_mime_type};

#[derive(Debug, Args)]
pub struct ChatArgs {
    /// Assistant to talk to: plumbing, hvac, appliances, pest, roofing
    #[arg(default_value = "plumbing")]
    pub category: Category,

    /// Send a single message and exit instead of starting a session
    #[arg(long, short = 'm')]
    pub message: Option<String>,

    /// Photo to analyze (jpg or png)
    #[arg(long, short = 'i')]
    pub image: Option<PathBuf>,
}

/// A REPL line, parsed.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Message(&'a str),
    Image(&'a str),
    Reset,
    Help,
    Quit,
    Empty,
}

fn parse_input(line: &str) -> Input<'_> {
    let line = line.trim();
    match line {
        "" => Input::Empty,
        "/quit" | "/exit" => Input::Quit,
        "/reset" | "/new" => Input::Reset,
        "/help" => Input::Help,
        _ => match line.strip_prefix("/image") {
            Some(rest) if rest.is_empty() || rest.starts_with(' ') => Input::Image(rest.trim()),
            _ => Input::Message(line),
        },
    }
}

pub async fn handle_chat(
    args: ChatArgs,
    format: OutputFormat,
    _verbose: bool,
    cancel: CancellationToken,
) -> Result<()> {
    let config = Config::load()?;
    let provider = Arc::new(OpenAiProvider::new(&config.openai)?);
    let mut session = ChatSession::new(args.category, provider, &config.chat);
    let formatter = get_formatter(format);

    if args.message.is_some() || args.image.is_some() {
        if let Some(ref path) = args.image {
            let analysis = analyze(&mut session, path).await?;
            print!("{}", formatter.format_message(&analysis));
        }
        if let Some(ref text) = args.message {
            let reply = render_turn(session.send(text).await);
            print!("{}", formatter.format_message(&reply));
        }
        return Ok(());
    }

    println!(
        "{} {}",
        style(session.category().display_name()).bold(),
        style("assistant").dim()
    );
    println!(
        "{}",
        style("Type a question. /image <path> sends a photo, /reset starts over, /quit exits.")
            .dim()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        eprint!(
            "{} ",
            style(format!(
                "[{}/{}] >",
                session.message_count(),
                session.max_messages()
            ))
            .cyan()
        );

        let line = tokio::select! {
            line = lines.next_line() => line.context("failed to read input")?,
            _ = cancel.cancelled() => None,
        };
        let Some(line) = line else {
            break;
        };

        match parse_input(&line) {
            Input::Empty => continue,
            Input::Quit => break,
            Input::Help => {
                println!("/image <path>  analyze a jpg or png photo");
                println!("/reset         start a new session");
                println!("/quit          leave");
            }
            Input::Reset => {
                session.reset();
                println!("{}", style("Started a new session.").dim());
            }
            Input::Image("") => {
                println!("{}", formatter.format_error("usage: /image <path>"));
            }
            Input::Image(path) => match analyze(&mut session, Path::new(path)).await {
                Ok(analysis) => println!("{}\n", analysis),
                Err(e) => println!("{}", formatter.format_error(&format!("{e:#}"))),
            },
            Input::Message(text) => {
                let reply = render_turn(session.send(text).await);
                println!("{}\n", reply);
                if session.waiting_for_image() {
                    println!("{}", style("Send a photo with /image <path>.").dim());
                }
            }
        }
    }

    Ok(())
}

async fn analyze(session: &mut ChatSession, path: &Path) -> Result<String> {
    let mime = image_mime_type(path)
        .ok_or_else(|| anyhow::anyhow!("unsupported image type (use jpg, jpeg or png)"))?;
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(session.submit_image(&bytes, mime).await)
}

fn render_turn(turn: Turn) -> String {
    match turn {
        Turn::Reply(text) | Turn::ImageRequested(text) => text,
        Turn::LimitReached { max_messages } => format!(
            "You have reached the maximum limit of {max_messages} messages. \
             Use /reset to start a new session."
        ),
    }
}
