//! Line-oriented chat front end over stdin/stdout.

use crate::conversation::{ChatLog, Command, Message, QUICK_QUESTIONS, Role, parse_input};
use concierge_chat::AppContext;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

const HELP: &str = "Commands:
  /quick       list common questions
  /quick N     ask common question N
  /stats       show chat statistics
  /clear       start a new conversation
  /help        show this help
  /quit        leave";

pub fn render_message(message: &Message) -> String {
    let label = match message.role {
        Role::User => "You",
        Role::Assistant => "AI Assistant",
    };
    let body = message
        .content
        .lines()
        .map(|line| format!("  {line}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{label} • {}\n{body}\n", message.timestamp)
}

pub fn render_quick_questions() -> String {
    QUICK_QUESTIONS
        .iter()
        .enumerate()
        .map(|(i, q)| format!("  {}. {q}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_stats(log: &ChatLog) -> String {
    let stats = log.stats();
    format!(
        "Total Messages: {}\nYour Questions: {}\nAI Responses: {}\nRemembered Exchanges: {}",
        stats.total,
        stats.user,
        stats.assistant,
        log.session().len()
    )
}

/// Reads questions until `/quit` or end of input.
pub async fn run(context: &AppContext) -> anyhow::Result<()> {
    let mut log = ChatLog::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    print_transcript(&log);
    println!("Type /help for commands.\n");

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let question = match parse_input(&line) {
            Command::Empty => continue,
            Command::Ask(question) => question,
            Command::Quick(index) => QUICK_QUESTIONS[index].to_string(),
            Command::QuickList => {
                println!("{}\n", render_quick_questions());
                continue;
            }
            Command::Stats => {
                println!("{}\n", render_stats(&log));
                continue;
            }
            Command::Clear => {
                log.clear();
                print_transcript(&log);
                continue;
            }
            Command::Help => {
                println!("{HELP}\n");
                continue;
            }
            Command::Quit => break,
            Command::Unknown(input) => {
                println!("Unknown command: {input} (try /help)\n");
                continue;
            }
        };

        debug!("Question: {question}");
        let before = log.messages().len();
        log.submit(context, &question).await;
        for message in &log.messages()[before..] {
            println!("{}", render_message(message));
        }
    }

    Ok(())
}

fn print_transcript(log: &ChatLog) {
    for message in log.messages() {
        println!("{}", render_message(message));
    }
}
