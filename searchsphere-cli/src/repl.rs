//! Interactive mode.
//!
//! Each line is dispatched in the background so that typing a new query
//! while the previous one is still in flight supersedes it: only the newest
//! search and the newest chat answer are ever printed.

use crate::render;
use searchsphere_core::client::{SearchRequest, Slot, SupersessionController};
use searchsphere_core::{ClientError, GatewayClient, Outcome, SearchSphereConfig};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

/// A parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Search(String),
    Chat(String),
    /// Abort the in-flight chat request.
    Clear,
    Help,
    Quit,
    Empty,
}

fn parse_line(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };
    match command {
        "/chat" | "/c" => Input::Chat(rest.to_string()),
        "/search" | "/s" => Input::Search(rest.to_string()),
        "/clear" => Input::Clear,
        "/help" | "/?" => Input::Help,
        "/quit" | "/exit" | "/q" => Input::Quit,
        _ => Input::Search(line.to_string()),
    }
}

const HELP: &str = "\
  <query>          search (an empty /search matches everything)
  /chat <question> ask the assistant
  /clear           cancel the pending chat answer
  /quit            exit";

pub async fn run_interactive(config: SearchSphereConfig) -> anyhow::Result<()> {
    let client = GatewayClient::from_config(&config)?;
    let controller = Arc::new(SupersessionController::new());

    println!("SearchSphere interactive mode (gateway: {})", client.base());
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_line(&line) {
            Input::Empty => {}
            Input::Help => println!("{HELP}"),
            Input::Quit => break,
            Input::Clear => {
                if controller.cancel(Slot::Chat) {
                    println!("(chat cancelled)");
                }
            }
            Input::Search(query) => {
                let client = client.clone();
                let controller = Arc::clone(&controller);
                tokio::spawn(async move {
                    let request = SearchRequest::new(query);
                    let outcome = controller
                        .run(Slot::Search, |token| async move {
                            client.search(&request, &token).await
                        })
                        .await;
                    report(outcome, |r| render::search_results(&r));
                });
            }
            Input::Chat(query) => {
                let client = client.clone();
                let controller = Arc::clone(&controller);
                tokio::spawn(async move {
                    let request = SearchRequest::new(query);
                    let outcome = controller
                        .run(Slot::Chat, |token| async move {
                            client.chat(&request, &token).await
                        })
                        .await;
                    report(outcome, |r| render::chat_answer(&r));
                });
            }
        }
    }

    controller.cancel_all();
    Ok(())
}

fn report<T>(outcome: Result<Outcome<T>, ClientError>, show: impl FnOnce(T) -> String) {
    match outcome {
        Ok(Outcome::Applied(value)) => print!("\n{}", show(value)),
        Ok(Outcome::Superseded) => debug!("Dropped superseded result"),
        Err(err) => eprintln!("error: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line() {
        assert_eq!(parse_line("  "), Input::Empty);
        assert_eq!(
            parse_line("hybrid search"),
            Input::Search("hybrid search".into())
        );
        assert_eq!(
            parse_line("/chat what is BM25?"),
            Input::Chat("what is BM25?".into())
        );
        assert_eq!(parse_line("/search"), Input::Search(String::new()));
        assert_eq!(parse_line("/clear"), Input::Clear);
        assert_eq!(parse_line("/q"), Input::Quit);
    }
}
