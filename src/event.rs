use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::commands::{self, UiCommand};

/// Application events
#[derive(Debug)]
pub enum Event {
  /// A parsed console command
  Command(UiCommand),
  /// Input that didn't parse; carries the message to show
  Invalid(String),
  /// Input closed
  Eof,
}

/// Event handler that turns console lines into events
pub struct EventHandler {
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  /// Read events from standard input
  pub fn stdin() -> Self {
    Self::from_reader(BufReader::new(tokio::io::stdin()))
  }

  /// Read events from any line-oriented source
  pub fn from_reader<R>(reader: R) -> Self
  where
    R: AsyncBufRead + Unpin + Send + 'static,
  {
    let (tx, rx) = mpsc::unbounded_channel();

    // Spawn input reader
    tokio::spawn(async move {
      let mut lines = reader.lines();
      loop {
        let event = match lines.next_line().await {
          Ok(Some(line)) => match commands::parse_line(&line) {
            Ok(command) => Event::Command(command),
            Err(message) => Event::Invalid(message),
          },
          Ok(None) | Err(_) => Event::Eof,
        };
        let done = matches!(event, Event::Eof);
        if tx.send(event).is_err() || done {
          break;
        }
      }
    });

    Self { rx }
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_lines_become_events() {
    let input: &'static [u8] = b"/rust\nbogus\nquit\n";
    let mut events = EventHandler::from_reader(BufReader::new(input));

    assert!(matches!(
      events.next().await,
      Some(Event::Command(UiCommand::Search(text))) if text == "rust"
    ));
    assert!(matches!(events.next().await, Some(Event::Invalid(_))));
    assert!(matches!(
      events.next().await,
      Some(Event::Command(UiCommand::Quit))
    ));
    assert!(matches!(events.next().await, Some(Event::Eof)));
    assert!(events.next().await.is_none());
  }
}
