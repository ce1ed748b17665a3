//! Line commands standing in for the app's screens.

use anyhow::Result;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use notesync::{ManualAuth, NoteService, SessionController};
use notesync_api::{AuthSession, ControllerEvent, NoteItem, StoreEvent};

const HELP: &str = "\
commands:
  login <user> [token]      establish a session
  logout                    end the session
  add <name> [description]  create a note
  rm <position>             delete the note at position
  ls                        list notes
  quit";

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Login { user: String, token: String },
    Logout,
    Add { name: String, description: Option<String> },
    Remove(usize),
    List,
    Help,
    Quit,
}

pub fn parse(line: &str) -> Result<Command> {
    let line = line.trim();
    let (verb, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();

    match verb {
        "login" => {
            let mut parts = rest.split_whitespace();
            let user = parts
                .next()
                .ok_or_else(|| anyhow::anyhow!("usage: login <user> [token]"))?;
            let token = parts.next().unwrap_or(user);
            Ok(Command::Login {
                user: user.to_string(),
                token: token.to_string(),
            })
        }
        "logout" => Ok(Command::Logout),
        "add" => {
            let (name, description) = match rest.split_once(' ') {
                Some((name, description)) => (name, Some(description.trim().to_string())),
                None => (rest, None),
            };
            Ok(Command::Add {
                name: name.to_string(),
                description,
            })
        }
        "rm" => Ok(Command::Remove(rest.parse().map_err(|e| {
            anyhow::anyhow!("rm expects a position, got {:?}: {}", rest, e)
        })?)),
        "ls" => Ok(Command::List),
        "help" | "" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        other => Err(anyhow::anyhow!("unknown command {:?} (try `help`)", other)),
    }
}

fn render(items: &[NoteItem]) {
    if items.is_empty() {
        println!("  (no notes)");
    }
    for (position, item) in items.iter().enumerate() {
        let id = item.id().map(|id| id.to_string()).unwrap_or_default();
        match item.description() {
            Some(description) => println!("  {position}. {} - {description} [{id}]", item.name()),
            None => println!("  {position}. {} [{id}]", item.name()),
        }
    }
}

pub async fn run(
    auth: Arc<ManualAuth>,
    controller: SessionController,
    service: NoteService,
) -> Result<()> {
    // Observers: print refresh outcomes and collection changes as they land
    let mut controller_events = BroadcastStream::new(controller.subscribe());
    tokio::spawn(async move {
        while let Some(Ok(event)) = controller_events.next().await {
            match event {
                ControllerEvent::Refreshed { count } => println!("refreshed: {count} notes"),
                ControllerEvent::RefreshFailed(e) => println!("refresh failed: {e}"),
                ControllerEvent::Transitioned(state) => println!("session: {state:?}"),
                ControllerEvent::StaleRefreshDropped => {}
            }
        }
    });
    let mut store_events = BroadcastStream::new(service.subscribe());
    tokio::spawn(async move {
        while let Some(Ok(event)) = store_events.next().await {
            tracing::debug!("collection version {}", event.version());
            if let StoreEvent::Replaced { items, .. } = event {
                render(&items);
            }
        }
    });

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match parse(&line) {
            Ok(command) => command,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };

        match command {
            Command::Login { user, token } => auth.sign_in(AuthSession::new(user, token)).await,
            Command::Logout => auth.sign_out().await,
            Command::Add { name, description } => {
                match service.create_note(name, description, None).await {
                    Ok(pending) => {
                        tokio::spawn(async move {
                            match pending.wait().await {
                                Ok(record) => println!("saved {}", record.id),
                                Err(e) => println!("save failed: {e}"),
                            }
                        });
                    }
                    Err(e) => println!("{e}"),
                }
            }
            Command::Remove(position) => match service.delete_at(position).await {
                Ok(pending) => {
                    tokio::spawn(async move {
                        match pending.wait().await {
                            Ok(record) => println!("deleted {}", record.id),
                            Err(e) => println!("delete failed: {e}"),
                        }
                    });
                }
                Err(e) => println!("{e}"),
            },
            Command::List => render(&service.notes().await?),
            Command::Help => println!("{HELP}"),
            Command::Quit => break,
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            parse("login alice").unwrap(),
            Command::Login {
                user: "alice".to_string(),
                token: "alice".to_string()
            }
        );
        assert_eq!(
            parse("add Groceries milk and eggs").unwrap(),
            Command::Add {
                name: "Groceries".to_string(),
                description: Some("milk and eggs".to_string())
            }
        );
        assert_eq!(parse("rm 2").unwrap(), Command::Remove(2));
        assert_eq!(parse("  ls ").unwrap(), Command::List);
        assert!(parse("rm two").is_err());
        assert!(parse("frobnicate").is_err());
    }
}
