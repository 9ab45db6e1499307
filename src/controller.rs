use std::time::Duration;
use tracing::trace;

use crate::domain::{Message, TableConfig, TableError};
use ratatui::crossterm::event::{self, Event, KeyCode, KeyModifiers};

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &TableConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    /// Waits up to the poll time for a terminal event. While the command line
    /// is active every key goes through unmapped.
    pub fn handle_event(&self, raw_keys: bool) -> Result<Option<Message>, TableError> {
        if event::poll(Duration::from_millis(self.event_poll_time))? {
            match event::read()? {
                Event::Key(key) if key.kind == event::KeyEventKind::Press => {
                    if raw_keys {
                        return Ok(Some(Message::RawKey(key)));
                    }
                    return Ok(self.handle_key(key));
                }
                Event::Resize(width, height) => {
                    return Ok(Some(Message::Resize(width as usize, height as usize)));
                }
                _ => {}
            }
        }
        Ok(None)
    }

    pub fn handle_key(&self, key: event::KeyEvent) -> Option<Message> {
        let message = match (key.code, key.modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(Message::Quit),
            (KeyCode::Char('q'), _) => Some(Message::Quit),
            (KeyCode::Up | KeyCode::Char('k'), _) => Some(Message::MoveUp),
            (KeyCode::Down | KeyCode::Char('j'), _) => Some(Message::MoveDown),
            (KeyCode::Left | KeyCode::Char('h'), _) => Some(Message::MoveLeft),
            (KeyCode::Right | KeyCode::Char('l'), _) => Some(Message::MoveRight),
            (KeyCode::Home | KeyCode::Char('g'), _) => Some(Message::MoveBeginning),
            (KeyCode::End | KeyCode::Char('G'), _) => Some(Message::MoveEnd),
            (KeyCode::PageDown | KeyCode::Char('n'), _) => Some(Message::NextPage),
            (KeyCode::PageUp | KeyCode::Char('p'), _) => Some(Message::PreviousPage),
            (KeyCode::Char('N'), _) => Some(Message::LastPage),
            (KeyCode::Char('P'), _) => Some(Message::FirstPage),
            (KeyCode::Char('+'), _) => Some(Message::PageSizeUp),
            (KeyCode::Char('-'), _) => Some(Message::PageSizeDown),
            (KeyCode::Enter, _) => Some(Message::Enter),
            (KeyCode::Esc, _) => Some(Message::Exit),
            (KeyCode::Char('?'), _) => Some(Message::Help),
            (KeyCode::Char('/'), _) => Some(Message::Search),
            (KeyCode::Char('f'), _) => Some(Message::Filters),
            (KeyCode::Char('F'), _) => Some(Message::ClearFilters),
            (KeyCode::Char('c'), _) => Some(Message::Columns),
            (KeyCode::Char('e'), _) => Some(Message::ExportMenu),
            (KeyCode::Char('b'), _) => Some(Message::BulkActions),
            (KeyCode::Char('s'), _) => Some(Message::Sort),
            (KeyCode::Char(' '), _) => Some(Message::ToggleSelect),
            (KeyCode::Char('a'), _) => Some(Message::TogglePageSelection),
            (KeyCode::Char('x'), _) => Some(Message::ClearSelection),
            (KeyCode::Char('K'), _) => Some(Message::MoveColumnUp),
            (KeyCode::Char('J'), _) => Some(Message::MoveColumnDown),
            (KeyCode::Char('R'), _) => Some(Message::ResetPreferences),
            (KeyCode::Char('z'), _) => Some(Message::Fullscreen),
            (KeyCode::Char('r'), _) => Some(Message::Refresh),
            (KeyCode::Char('y'), _) => Some(Message::CopyCell),
            (KeyCode::Char('Y'), _) => Some(Message::CopyRow),
            (KeyCode::Char('A'), _) => Some(Message::AddRow),
            (KeyCode::Char('E'), _) => Some(Message::EditRow),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::KeyEvent;

    #[test]
    fn maps_table_keys() {
        let controller = Controller::new(&TableConfig::default());
        let key = |c| KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE);
        assert_eq!(controller.handle_key(key('q')), Some(Message::Quit));
        assert_eq!(controller.handle_key(key('s')), Some(Message::Sort));
        assert_eq!(controller.handle_key(key('K')), Some(Message::MoveColumnUp));
        assert_eq!(controller.handle_key(key('§')), None);
        assert_eq!(
            controller.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(Message::Quit)
        );
        assert_eq!(
            controller.handle_key(KeyEvent::new(KeyCode::PageDown, KeyModifiers::NONE)),
            Some(Message::NextPage)
        );
    }
}
