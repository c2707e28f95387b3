use crate::dom::{Dom, NodeId, Page};
use crate::theme::Theme;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::crossterm::event as rt_event;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear};
use tui_textarea::TextArea;

pub enum EditOutcome {
    Continue,
    Commit,
    Cancel,
}

/// Modal editor for one page control, backed by tui-textarea.
pub struct FieldEditor {
    pub node: NodeId,
    label: String,
    multiline: bool,
    ta: TextArea<'static>,
}

impl FieldEditor {
    pub fn open(page: &Page, node: NodeId) -> Option<Self> {
        let e = page.element(node)?;
        let multiline = e.tag == crate::dom::Tag::TextArea;
        let mut ta = TextArea::default();
        if !e.value.is_empty() {
            ta.insert_str(&e.value);
        }
        Some(Self {
            node,
            label: e.label.clone().or_else(|| e.name.clone()).unwrap_or_default(),
            multiline,
            ta,
        })
    }

    pub fn text(&self) -> String {
        self.ta.lines().join("\n")
    }

    pub fn on_key(&mut self, key: KeyEvent) -> EditOutcome {
        match key.code {
            KeyCode::Esc => return EditOutcome::Cancel,
            KeyCode::Char('s') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return EditOutcome::Commit
            }
            // Single-line inputs submit on Enter
            KeyCode::Enter if !self.multiline => return EditOutcome::Commit,
            _ => {}
        }
        if let Some(k) = to_textarea_key(key) {
            let _ = self.ta.input(k);
        }
        EditOutcome::Continue
    }

    /// Write the edited text back into the control.
    pub fn commit(&self, page: &mut Page) {
        page.set_value(self.node, &self.text());
    }

    pub fn render(&mut self, f: &mut Frame, area: Rect, theme: &Theme) {
        self.ta.set_block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(theme.border_focused())
                .title(format!("Editing: {} | Ctrl+S Save  Esc Cancel", self.label)),
        );
        let rect = if self.multiline {
            centered_rect(80, 70, area)
        } else {
            let r = centered_rect(80, 100, area);
            Rect {
                y: r.y + r.height.saturating_sub(3) / 2,
                height: r.height.min(3),
                ..r
            }
        };
        f.render_widget(Clear, rect);
        f.render_widget(&self.ta, rect);
    }
}

// The terminal and the editor use different crossterm releases; map the keys across.
fn to_textarea_key(key: KeyEvent) -> Option<rt_event::KeyEvent> {
    let code = match key.code {
        KeyCode::Char(c) => rt_event::KeyCode::Char(c),
        KeyCode::Backspace => rt_event::KeyCode::Backspace,
        KeyCode::Delete => rt_event::KeyCode::Delete,
        KeyCode::Enter => rt_event::KeyCode::Enter,
        KeyCode::Tab => rt_event::KeyCode::Tab,
        KeyCode::Left => rt_event::KeyCode::Left,
        KeyCode::Right => rt_event::KeyCode::Right,
        KeyCode::Up => rt_event::KeyCode::Up,
        KeyCode::Down => rt_event::KeyCode::Down,
        KeyCode::Home => rt_event::KeyCode::Home,
        KeyCode::End => rt_event::KeyCode::End,
        KeyCode::PageUp => rt_event::KeyCode::PageUp,
        KeyCode::PageDown => rt_event::KeyCode::PageDown,
        _ => return None,
    };
    let mut mods = rt_event::KeyModifiers::NONE;
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        mods |= rt_event::KeyModifiers::CONTROL;
    }
    if key.modifiers.contains(KeyModifiers::ALT) {
        mods |= rt_event::KeyModifiers::ALT;
    }
    if key.modifiers.contains(KeyModifiers::SHIFT) {
        mods |= rt_event::KeyModifiers::SHIFT;
    }
    Some(rt_event::KeyEvent::new(code, mods))
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let v = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
    let h = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(v[1]);
    h[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::page::Element;
    use crate::dom::Tag;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn typing_then_ctrl_s_commits_into_the_page() {
        let mut page = Page::default();
        let root = page.root();
        let body = page.append(
            root,
            Element::new(Tag::TextArea).name("body").value("Hello"),
        );
        let mut ed = FieldEditor::open(&page, body).unwrap();
        assert!(matches!(ed.on_key(key(KeyCode::Char('!'))), EditOutcome::Continue));
        assert!(matches!(ed.on_key(key(KeyCode::Enter)), EditOutcome::Continue));
        ed.on_key(key(KeyCode::Char('x')));
        let save = KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL);
        assert!(matches!(ed.on_key(save), EditOutcome::Commit));
        ed.commit(&mut page);
        assert_eq!(page.value(body).as_deref(), Some("Hello!\nx"));
    }

    #[test]
    fn single_line_input_commits_on_enter_and_esc_cancels() {
        let mut page = Page::default();
        let root = page.root();
        let title = page.append(root, Element::new(Tag::Input).name("title"));
        let mut ed = FieldEditor::open(&page, title).unwrap();
        assert!(matches!(ed.on_key(key(KeyCode::Enter)), EditOutcome::Commit));
        assert!(matches!(ed.on_key(key(KeyCode::Esc)), EditOutcome::Cancel));
        assert!(FieldEditor::open(&page, NodeId(99)).is_none());
    }
}
