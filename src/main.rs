use std::io::Write;
use std::time::Duration;

use clap::Parser;
use naya_relay::chat_fsm::ChatPhase;
use naya_relay::client::{ChatClient, ChatSession, TurnOutcome};
use naya_relay::config::{Persona, DEFAULT_IDLE_TIMEOUT_SECS};
use naya_relay::domains::chat::ChatRole;
use naya_relay::error::{NayaError, Result};
use naya_relay::transcript::Transcript;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(name = "naya")]
#[command(about = "Chat with NaYa from the terminal")]
struct Cli {
    #[arg(long, env = "NAYA_RELAY_URL", default_value = "http://127.0.0.1:8787/naya-chat")]
    endpoint: String,

    #[arg(long, env = "NAYA_PUBLIC_KEY", default_value = "")]
    public_key: String,

    #[arg(long, default_value_t = DEFAULT_IDLE_TIMEOUT_SECS)]
    idle_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    naya_relay::logging::init_tracing("naya");
    let cli = Cli::parse();

    let persona = Persona::default();
    let client = ChatClient::new(cli.endpoint, cli.public_key, persona)
        .with_idle_timeout(Duration::from_secs(cli.idle_timeout_secs.max(1)));
    let session = ChatSession::new(client);

    let assistant_label = session.client().persona().assistant_label.clone();
    if let Some(greeting) = session.transcript().last() {
        println!("{assistant_label}: {}", greeting.content);
    }
    println!("(/whatsapp pour contacter un conseiller, /quit pour quitter)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        flush();
        let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| NayaError::Runtime(format!("stdin: {e}")))?
        else {
            break;
        };

        match line.trim() {
            "" => continue,
            "/quit" => break,
            "/whatsapp" => {
                match session.handoff_url() {
                    Some(url) => println!("{url}"),
                    None => println!("Discutez encore un peu avec NaYa avant le transfert."),
                }
                continue;
            }
            text => converse(&session, text, &assistant_label).await?,
        }
    }
    Ok(())
}

async fn converse(session: &ChatSession, text: &str, label: &str) -> Result<()> {
    let start = session.transcript().len() + 1;
    let handle = session
        .submit(text)
        .map_err(|e| NayaError::Runtime(e.to_string()))?;

    let mut updates = session.subscribe();
    let mut phase = session.subscribe_phase();
    let mut printer = ReplyPrinter::new(start, label);
    loop {
        printer.render(&updates.borrow_and_update());
        if *phase.borrow_and_update() == ChatPhase::Idle && handle.is_finished() {
            break;
        }
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            changed = phase.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                handle.abort();
            }
            _ = tokio::time::sleep(Duration::from_millis(250)) => {}
        }
    }
    printer.render(&session.transcript());
    println!();

    match handle.finished().await {
        Ok(TurnOutcome::Cancelled) => println!("(réponse interrompue)"),
        Ok(TurnOutcome::Failed { reason }) => tracing::debug!(%reason, "turn ended with fallback"),
        Ok(TurnOutcome::Completed { .. }) => {}
        Err(err) => return Err(NayaError::Runtime(err.to_string())),
    }
    Ok(())
}

fn flush() {
    let _ = std::io::stdout().flush();
}

/// Prints assistant messages from `next` onward, writing only what grew since
/// the last render.
struct ReplyPrinter {
    next: usize,
    printed: Option<usize>,
    label: String,
}

impl ReplyPrinter {
    fn new(next: usize, label: &str) -> Self {
        Self {
            next,
            printed: None,
            label: label.to_string(),
        }
    }

    fn render(&mut self, transcript: &Transcript) {
        print!("{}", self.pending(transcript));
        flush();
    }

    fn pending(&mut self, transcript: &Transcript) -> String {
        let mut out = String::new();
        let messages = transcript.messages();
        while let Some(message) = messages.get(self.next) {
            if message.role == ChatRole::Assistant {
                match self.printed {
                    None => {
                        out.push_str(&self.label);
                        out.push_str(": ");
                        out.push_str(&message.content);
                    }
                    Some(done) => {
                        if let Some(tail) = message.content.get(done..) {
                            out.push_str(tail);
                        }
                    }
                }
                self.printed = Some(message.content.len());
            }
            if self.next + 1 >= messages.len() {
                break;
            }
            if self.printed.is_some() {
                out.push('\n');
            }
            self.next += 1;
            self.printed = None;
        }
        out
    }
}
