use crate::aigen_core::csrf::CookieCsrf;
use crate::aigen_core::focus::FocusState;
use crate::app::{update, AppMsg, Controller, Effect};
use crate::dom::markup::{INLINE_ROW_CLASS, TRIGGER_CLASS};
use crate::dom::{Dom, NodeId, Page, Selector, Tag};
use crate::services::endpoint::{spawn_generate, GenerateMsg, GenerationEndpoint, HttpEndpoint};
use crate::services::settings::{env_flag, load_page, Settings};
use crate::widgets::form::draw_page;
use crate::widgets::form_widget::{EditOutcome, FieldEditor};
use crate::widgets::status_bar::draw_footer;
use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::prelude::*;
use ratatui::widgets::*;
use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub(crate) struct AppState {
    pub(crate) ctl: Controller<Page>,
    pub(crate) endpoint: Arc<dyn GenerationEndpoint>,
    pub(crate) tx: Sender<GenerateMsg>,
    pub(crate) rx: Receiver<GenerateMsg>,
    // Lines from the global logger
    pub(crate) log_rx: Option<Receiver<String>>,
    pub(crate) focus: FocusState,
    pub(crate) editor: Option<FieldEditor>,
    pub(crate) tick: u64,
    pub(crate) changes_seen: usize,
    // Debug log (rendered in bottom debug pane)
    pub(crate) debug_log: VecDeque<String>,
    pub(crate) theme: crate::theme::Theme,
}

impl AppState {
    pub(crate) fn new(page: Page, settings: &Settings, endpoint: Arc<dyn GenerationEndpoint>) -> Self {
        let csrf = CookieCsrf::new(settings.csrf_cookie.clone(), settings.csrf_input.clone());
        let ctl = Controller::new(page, Box::new(csrf), settings.status_hide_after);
        let (tx, rx) = mpsc::channel::<GenerateMsg>();
        let mut state = Self {
            ctl,
            endpoint,
            tx,
            rx,
            log_rx: None,
            focus: FocusState::default(),
            editor: None,
            tick: 0,
            changes_seen: 0,
            debug_log: VecDeque::new(),
            theme: crate::theme::Theme::synthwave_dark(),
        };
        let effs = update(&mut state.ctl, AppMsg::Register { root: None });
        run_effects(&mut state, effs);
        if state.ctl.registry.is_empty() {
            state.dbg("no generate widgets on this page");
        }
        state
    }

    pub fn dbg(&mut self, msg: impl Into<String>) {
        const MAX_LOG_LINES: usize = 200;
        if self.debug_log.len() >= MAX_LOG_LINES {
            self.debug_log.pop_front();
        }
        self.debug_log.push_back(msg.into());
    }

    pub(crate) fn focused(&self) -> Option<NodeId> {
        self.focus.current(&self.ctl.doc.focusables())
    }

    fn focus_node(&mut self, node: Option<NodeId>) {
        let items = self.ctl.doc.focusables();
        self.focus.follow(&items, node);
    }
}

fn run_effects(state: &mut AppState, effects: Vec<Effect>) {
    for eff in effects {
        match eff {
            Effect::Generate {
                trigger,
                request,
                csrf_token,
            } => {
                state.dbg(format!(
                    "POST {} -> {}",
                    request.prompt_type, request.field_name
                ));
                spawn_generate(
                    state.endpoint.clone(),
                    trigger,
                    request,
                    csrf_token,
                    state.tx.clone(),
                );
            }
        }
    }
}

/// One loop iteration's background work: endpoint results, log lines, change
/// notifications and due status auto-hides.
pub(crate) fn pump(state: &mut AppState, now: Instant) {
    let drained: Vec<GenerateMsg> = state.rx.try_iter().collect();
    for msg in drained {
        if !state.ctl.doc.is_connected(msg.trigger) {
            state.dbg(format!("response for detached widget {:?}", msg.trigger));
        }
        let effs = update(
            &mut state.ctl,
            AppMsg::Generated {
                trigger: msg.trigger,
                outcome: msg.outcome,
                now,
            },
        );
        run_effects(state, effs);
    }
    for node in state.ctl.doc.take_changes() {
        state.changes_seen += 1;
        let name = state.ctl.doc.attr(node, "name").unwrap_or_default();
        state.dbg(format!("change: {name}"));
    }
    let effs = update(&mut state.ctl, AppMsg::Tick { now });
    run_effects(state, effs);
    let lines: Vec<String> = match &state.log_rx {
        Some(rx) => rx.try_iter().collect(),
        None => Vec::new(),
    };
    for l in lines {
        state.dbg(l);
    }
}

/// Activate a trigger the way a click does.
pub(crate) fn click(state: &mut AppState, trigger: NodeId) {
    let effs = update(&mut state.ctl, AppMsg::Activate { trigger });
    run_effects(state, effs);
}

fn add_row(state: &mut AppState) {
    let doc = &state.ctl.doc;
    let prefix = state
        .focused()
        .and_then(|n| doc.inline_prefix_of(n))
        .or_else(|| doc.inline_prefixes().into_iter().next());
    let Some(prefix) = prefix else {
        state.dbg("no inline group to add a row to");
        return;
    };
    let Some(row) = state.ctl.doc.add_inline_row(&prefix) else {
        return;
    };
    let effs = update(&mut state.ctl, AppMsg::RowAdded { root: row });
    run_effects(state, effs);
    let first = state
        .ctl
        .doc
        .focusables()
        .into_iter()
        .find(|n| state.ctl.doc.closest(*n, &Selector::Class(INLINE_ROW_CLASS)) == Some(row));
    state.focus_node(first);
    state.dbg(format!("added {prefix} row"));
}

fn remove_row(state: &mut AppState) {
    let Some(node) = state.focused() else { return };
    let Some(row) = state
        .ctl
        .doc
        .closest(node, &Selector::Class(INLINE_ROW_CLASS))
    else {
        return;
    };
    let id = state.ctl.doc.attr(row, "id").unwrap_or_default();
    state.ctl.doc.remove(row);
    let effs = update(&mut state.ctl, AppMsg::RowRemoved { root: row });
    run_effects(state, effs);
    state.focus_node(None);
    state.dbg(format!("removed row {id}"));
}

/// Returns true when the operator asked to quit.
pub(crate) fn on_key(state: &mut AppState, key: KeyEvent) -> bool {
    if let Some(ed) = state.editor.as_mut() {
        match ed.on_key(key) {
            EditOutcome::Continue => {}
            EditOutcome::Commit => {
                if let Some(ed) = state.editor.take() {
                    ed.commit(&mut state.ctl.doc);
                }
            }
            EditOutcome::Cancel => state.editor = None,
        }
        return false;
    }
    let len = state.ctl.doc.focusables().len();
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => return true,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return true,
        KeyCode::Down | KeyCode::Tab | KeyCode::Char('j') => state.focus.next(len),
        KeyCode::Up | KeyCode::BackTab | KeyCode::Char('k') => state.focus.prev(len),
        KeyCode::Enter | KeyCode::Char(' ') => {
            let Some(node) = state.focused() else {
                return false;
            };
            let tag = state.ctl.doc.element(node).map(|e| e.tag);
            match tag {
                Some(Tag::Button) if state.ctl.doc.matches(node, &Selector::Class(TRIGGER_CLASS)) => {
                    click(state, node)
                }
                Some(Tag::Input) | Some(Tag::TextArea) => {
                    state.editor = FieldEditor::open(&state.ctl.doc, node);
                }
                _ => {}
            }
        }
        KeyCode::Char('a') => add_row(state),
        KeyCode::Char('x') => remove_row(state),
        KeyCode::Char('r') => {
            let effs = update(&mut state.ctl, AppMsg::Register { root: None });
            run_effects(state, effs);
        }
        _ => {}
    }
    false
}

pub fn run() -> Result<()> {
    let settings = Settings::from_env();
    let log_rx = crate::logging::init(&settings.log_filter)?;
    // Load the page anchored by AIGEN_CONFIG_DIR or by discovering aigen-page.yaml
    let (cfg, path) = load_page()?;
    let mut page = Page::from_config(&cfg);
    if let Some(cookie) = &settings.cookie {
        page.set_cookie(cookie.clone());
    }
    let endpoint: Arc<dyn GenerationEndpoint> = Arc::new(HttpEndpoint::new(&settings)?);
    let mut state = AppState::new(page, &settings, endpoint);
    state.log_rx = Some(log_rx);
    state.dbg(format!("page {} -> {}", path.display(), settings.endpoint));

    // Headless smoke mode
    let headless = env_flag("AIGEN_HEADLESS");
    let headless_ticks: u64 = std::env::var("AIGEN_TICKS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(10);
    let headless_click: Option<usize> = std::env::var("AIGEN_HEADLESS_CLICK")
        .ok()
        .and_then(|s| s.parse::<usize>().ok());
    let headless_summary = env_flag("AIGEN_SMOKE_SUMMARY");
    if headless {
        let backend = ratatui::backend::TestBackend::new(80, 24);
        let mut terminal = Terminal::new(backend)?;
        let tick_rate = Duration::from_millis(200);
        let mut clicked = false;
        for _ in 0..headless_ticks {
            if !clicked {
                // 1-based, like the operator counts buttons on screen
                if let Some(n) = headless_click {
                    let trigger = state
                        .ctl
                        .registry
                        .triggers()
                        .nth(n.saturating_sub(1));
                    if let Some(t) = trigger {
                        click(&mut state, t);
                    }
                    clicked = true;
                }
            }
            terminal.draw(|f| ui(f, &mut state))?;
            pump(&mut state, Instant::now());
            state.tick = state.tick.wrapping_add(1);
            std::thread::sleep(tick_rate);
        }
        if headless_summary {
            println!("{}", smoke_summary(&state, clicked));
        }
        return Ok(());
    }

    // Setup terminal (interactive)
    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    let tick_rate = Duration::from_millis(200);
    let mut last_tick = Instant::now();
    let res: Result<()> = loop {
        if let Err(e) = terminal.draw(|f| ui(f, &mut state)) {
            break Err(e.into());
        }
        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_millis(0));
        match event::poll(timeout) {
            Ok(true) => match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                    if on_key(&mut state, key) {
                        break Ok(());
                    }
                }
                Ok(_) => {}
                Err(e) => break Err(e.into()),
            },
            Ok(false) => {}
            Err(e) => break Err(e.into()),
        }
        pump(&mut state, Instant::now());
        if last_tick.elapsed() >= tick_rate {
            state.tick = state.tick.wrapping_add(1);
            last_tick = Instant::now();
        }
    };
    // Restore
    disable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    res
}

pub(crate) fn smoke_summary(state: &AppState, clicked: bool) -> serde_json::Value {
    let doc = &state.ctl.doc;
    let mut statuses = Vec::new();
    let mut ok = true;
    for t in state.ctl.registry.triggers() {
        let Some(el) = state.ctl.registry.get(t).and_then(|w| w.parts.status) else {
            continue;
        };
        if !doc.is_visible(el) {
            continue;
        }
        let class = doc.attr(el, "class").unwrap_or_default();
        if class.split_whitespace().any(|c| c == "error") {
            ok = false;
        }
        statuses.push(serde_json::json!({
            "class": class,
            "text": doc.text(el).unwrap_or_default(),
        }));
    }
    serde_json::json!({
        "ok": ok,
        "widgets": state.ctl.registry.len(),
        "clicked": clicked,
        "changes": state.changes_seen,
        "statuses": statuses,
    })
}

fn ui(f: &mut Frame, state: &mut AppState) {
    let screen = f.area();
    let bg = Block::default().style(state.theme.base_style());
    f.render_widget(bg, screen);

    const DEBUG_H: u16 = 4;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(DEBUG_H),
            Constraint::Length(1),
        ])
        .split(screen);

    let selected = state.focused();
    draw_page(
        f,
        chunks[0],
        &state.ctl.doc,
        selected,
        state.editor.is_some(),
        &state.theme,
    );
    draw_debug(f, chunks[1], state);
    draw_footer(f, chunks[2], state);
    if let Some(ed) = state.editor.as_mut() {
        ed.render(f, chunks[0], &state.theme);
    }
}

fn draw_debug(f: &mut Frame, area: Rect, state: &AppState) {
    let b = Block::default()
        .borders(Borders::TOP)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            "Debug",
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        ));
    // Take last `area.height` lines
    let h = area.height as usize;
    let start = state.debug_log.len().saturating_sub(h);
    let lines: Vec<Line> = state
        .debug_log
        .iter()
        .skip(start)
        .map(|s| Line::raw(s.clone()))
        .collect();
    let p = Paragraph::new(lines)
        .style(Style::default().fg(Color::Gray))
        .block(b)
        .wrap(Wrap { trim: true });
    f.render_widget(p, area);
}
