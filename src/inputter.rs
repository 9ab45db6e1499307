use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::trace;

/// Single line editor behind the command line. Cursor positions count chars.
#[derive(Default)]
pub struct Inputter {
    chars: Vec<char>,
    curser_pos: usize,
    finished: bool,
    canceled: bool,
}

/// Snapshot of the editor after a key press.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct InputResult {
    pub input: String,
    pub finished: bool,
    pub canceled: bool,
    pub curser_pos: usize,
}

enum Edit {
    Submit,
    Cancel,
    DeleteBack,
    DeleteForward,
    DeleteWord,
    ClearLine,
    Left,
    Right,
    Start,
    End,
    Insert(char),
    Ignore,
}

fn edit_for(key: KeyEvent) -> Edit {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Enter => Edit::Submit,
        KeyCode::Esc => Edit::Cancel,
        KeyCode::Backspace => Edit::DeleteBack,
        KeyCode::Delete => Edit::DeleteForward,
        KeyCode::Left => Edit::Left,
        KeyCode::Right => Edit::Right,
        KeyCode::Home => Edit::Start,
        KeyCode::End => Edit::End,
        KeyCode::Char('a') if ctrl => Edit::Start,
        KeyCode::Char('e') if ctrl => Edit::End,
        KeyCode::Char('u') if ctrl => Edit::ClearLine,
        KeyCode::Char('w') if ctrl => Edit::DeleteWord,
        KeyCode::Char(_) if ctrl => Edit::Ignore,
        code => code.as_char().map(Edit::Insert).unwrap_or(Edit::Ignore),
    }
}

impl Inputter {
    pub fn read(&mut self, key: KeyEvent) -> InputResult {
        match edit_for(key) {
            Edit::Submit => self.finished = true,
            Edit::Cancel => {
                self.clear();
                self.canceled = true;
                self.finished = true;
            }
            Edit::DeleteBack if self.curser_pos > 0 => {
                self.curser_pos -= 1;
                self.chars.remove(self.curser_pos);
            }
            Edit::DeleteForward if self.curser_pos < self.chars.len() => {
                self.chars.remove(self.curser_pos);
            }
            Edit::DeleteWord => {
                let end = self.curser_pos;
                let mut start = end;
                while start > 0 && self.chars[start - 1] == ' ' {
                    start -= 1;
                }
                while start > 0 && self.chars[start - 1] != ' ' {
                    start -= 1;
                }
                self.chars.drain(start..end);
                self.curser_pos = start;
            }
            Edit::ClearLine => {
                self.chars.clear();
                self.curser_pos = 0;
            }
            Edit::Left => self.curser_pos = self.curser_pos.saturating_sub(1),
            Edit::Right => self.curser_pos = (self.curser_pos + 1).min(self.chars.len()),
            Edit::Start => self.curser_pos = 0,
            Edit::End => self.curser_pos = self.chars.len(),
            Edit::Insert(chr) => {
                self.chars.insert(self.curser_pos, chr);
                self.curser_pos += 1;
            }
            Edit::Ignore => trace!("Ignoring key {:?}", key.code),
            Edit::DeleteBack | Edit::DeleteForward => (),
        }
        self.get()
    }

    /// Replaces the input, cursor at the end.
    pub fn set(&mut self, s: &str) {
        self.chars = s.chars().collect();
        self.curser_pos = self.chars.len();
    }

    pub fn get(&self) -> InputResult {
        InputResult {
            input: self.chars.iter().collect(),
            finished: self.finished,
            canceled: self.canceled,
            curser_pos: self.curser_pos,
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(input: &mut Inputter, code: KeyCode) -> InputResult {
        input.read(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_str(input: &mut Inputter, s: &str) {
        for c in s.chars() {
            press(input, KeyCode::Char(c));
        }
    }

    #[test]
    fn edits_in_the_middle() {
        let mut input = Inputter::default();
        type_str(&mut input, "km/h");
        press(&mut input, KeyCode::Left);
        press(&mut input, KeyCode::Backspace);
        type_str(&mut input, "-");
        let res = press(&mut input, KeyCode::Enter);
        assert_eq!(res.input, "km-h");
        assert!(res.finished);
        assert!(!res.canceled);
    }

    #[test]
    fn multibyte_chars_are_one_position() {
        let mut input = Inputter::default();
        input.set("Zürich");
        assert_eq!(input.get().curser_pos, 6);
        press(&mut input, KeyCode::Home);
        press(&mut input, KeyCode::Right);
        press(&mut input, KeyCode::Right);
        let res = press(&mut input, KeyCode::Delete);
        assert_eq!(res.input, "Züich");
    }

    #[test]
    fn ctrl_w_deletes_the_previous_word() {
        let mut input = Inputter::default();
        input.set("status Moving  ");
        let res = input.read(KeyEvent::new(KeyCode::Char('w'), KeyModifiers::CONTROL));
        assert_eq!(res.input, "status ");
        assert_eq!(res.curser_pos, 7);
    }

    #[test]
    fn escape_cancels_and_clears() {
        let mut input = Inputter::default();
        type_str(&mut input, "abc");
        let res = press(&mut input, KeyCode::Esc);
        assert!(res.canceled && res.finished);
        assert!(res.input.is_empty());
        input.clear();
        assert_eq!(input.get(), InputResult::default());
    }
}
