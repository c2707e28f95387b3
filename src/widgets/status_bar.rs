use ratatui::prelude::*;
use ratatui::text::{Line, Span};
use ratatui::widgets::*;

use crate::aigen_core::registry::Phase;
use crate::ui::AppState;

pub const HELP: &str = "↑/↓ select  Enter edit/generate  a add row  x remove row  r rescan  q quit";
pub const EDIT_HELP: &str = "Ctrl+S save  Esc cancel";

pub fn draw_footer(f: &mut Frame, area: Rect, state: &AppState) {
    let theme = &state.theme;
    let mut spans: Vec<Span> = Vec::new();
    let in_flight = state
        .ctl
        .registry
        .triggers()
        .filter(|t| state.ctl.phase(*t) == Some(Phase::Submitting))
        .count();
    if in_flight > 0 {
        let spinner = ["⠋", "⠙", "⠸", "⠴", "⠦", "⠇"][state.tick as usize % 6];
        spans.push(Span::styled(
            format!(" {spinner} generating {in_flight}"),
            Style::default().fg(theme.primary),
        ));
        spans.push(Span::raw("  |  "));
    }
    spans.push(Span::styled(
        format!("{} widget(s)", state.ctl.registry.len()),
        Style::default().fg(Color::Magenta),
    ));
    spans.push(Span::raw("  |  "));
    let help = if state.editor.is_some() { EDIT_HELP } else { HELP };
    spans.push(Span::styled(help, theme.text_muted()));
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}
