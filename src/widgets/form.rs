use crate::dom::markup::*;
use crate::dom::page::Element;
use crate::dom::{NodeId, Page, Tag};
use crate::theme::Theme;
use crate::widgets::chrome::panel_block;
use ratatui::prelude::*;
use ratatui::widgets::*;

/// First and one-past-last line to show so that `selected` stays inside a window of `inner_h` rows.
pub(crate) fn compute_scroll_window(total: usize, selected: usize, inner_h: u16) -> (usize, usize) {
    if inner_h == 0 || total == 0 {
        return (0, 0);
    }
    let ih = inner_h as usize;
    let sel = selected.min(total.saturating_sub(1));
    let start = if sel >= ih.saturating_sub(1) {
        sel - ih.saturating_sub(1)
    } else {
        0
    };
    let end = (start + ih).min(total);
    (start, end)
}

fn label_of(e: &Element) -> String {
    e.label
        .clone()
        .or_else(|| e.name.clone())
        .unwrap_or_default()
}

// The caption a button currently shows: its visible label or loading span.
fn button_caption(page: &Page, e: &Element) -> String {
    e.children()
        .iter()
        .filter_map(|c| page.element(*c))
        .find(|c| c.tag == Tag::Span && c.visible)
        .map(|c| c.text.clone())
        .unwrap_or_else(|| e.text.clone())
}

/// Lines for the whole page in document order, plus the line index of `selected`.
pub fn page_lines(
    page: &Page,
    selected: Option<NodeId>,
    editing: bool,
    theme: &Theme,
) -> (Vec<Line<'static>>, usize) {
    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut sel_line = 0;
    for (n, depth) in page.walk() {
        let Some(e) = page.element(n) else { continue };
        if !e.visible {
            continue;
        }
        let indent = "  ".repeat(depth.saturating_sub(1));
        let is_sel = selected == Some(n);
        if is_sel {
            sel_line = lines.len();
        }
        let marker = if is_sel { '›' } else { ' ' };
        let value_style = match (is_sel, editing) {
            (true, true) => theme.text_editing_bold(),
            (true, false) => theme.text_active_bold(),
            _ => Style::default(),
        };
        match e.tag {
            Tag::Form => lines.push(Line::from(Span::styled(
                format!("-- {} --", e.text),
                theme.heading(),
            ))),
            Tag::Div if e.has_class(INLINE_GROUP_CLASS) => lines.push(Line::from(Span::styled(
                format!("{indent}== {} ==", e.text),
                theme.heading(),
            ))),
            Tag::Div if e.has_class(INLINE_ROW_CLASS) => lines.push(Line::from(Span::styled(
                format!("{indent}{}", e.text),
                theme.text_muted(),
            ))),
            Tag::Input if !e.hidden_input => lines.push(Line::from(vec![
                Span::raw(format!("{marker} {indent}{}: ", label_of(e))),
                Span::styled(e.value.clone(), value_style),
            ])),
            Tag::TextArea => {
                lines.push(Line::from(Span::raw(format!(
                    "{marker} {indent}{}:",
                    label_of(e)
                ))));
                let body: Vec<&str> = if e.value.is_empty() {
                    vec![""]
                } else {
                    e.value.lines().collect()
                };
                for l in body {
                    lines.push(Line::from(vec![
                        Span::raw(format!("  {indent}  ")),
                        Span::styled(l.to_string(), value_style),
                    ]));
                }
            }
            Tag::Button => {
                let style = if e.disabled {
                    theme.text_muted()
                } else if is_sel {
                    theme.text_active_bold()
                } else {
                    Style::default().fg(theme.accent)
                };
                lines.push(Line::from(vec![
                    Span::raw(format!("{marker} {indent}")),
                    Span::styled(format!("[ {} ]", button_caption(page, e)), style),
                ]));
            }
            Tag::Span if e.has_class(STATUS_CLASS) => {
                let style = if e.has_class("error") {
                    theme.text_error()
                } else if e.has_class("success") {
                    theme.text_success()
                } else {
                    theme.text_muted()
                };
                lines.push(Line::from(Span::styled(
                    format!("  {indent}{}", e.text),
                    style,
                )));
            }
            // Containers, hidden inputs and button parts have no line of their own
            _ => {}
        }
    }
    (lines, sel_line)
}

pub fn draw_page(
    f: &mut Frame,
    area: Rect,
    page: &Page,
    selected: Option<NodeId>,
    editing: bool,
    theme: &Theme,
) {
    let (lines, sel_line) = page_lines(page, selected, editing, theme);
    let block = panel_block(&page.title, true, theme);
    let inner_h = block.inner(area).height;
    let (start, _) = compute_scroll_window(lines.len(), sel_line, inner_h);
    let p = Paragraph::new(lines)
        .block(block)
        .scroll((start as u16, 0));
    f.render_widget(p, area);
}
