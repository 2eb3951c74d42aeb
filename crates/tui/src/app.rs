use std::{collections::VecDeque, io, thread, time::Duration};

use anyhow::{Context, Result};
use backlog_core::{
    controller::{BacklogController, BacklogEvent, Operation},
    models::GameRecord,
    notify::Notice,
    validate::GameForm,
};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};
use tokio::{
    sync::mpsc,
    time::{timeout, Instant},
};
use tracing::{error, info, warn};

const TICK_RATE: Duration = Duration::from_millis(250);
const SHUTDOWN_WAIT: Duration = Duration::from_secs(2);
const MAX_TEXT_LEN: usize = 64;

#[derive(Debug, Clone)]
struct Theme {
    primary_fg: Color,
    accent: Color,
    muted: Color,
    selection_bg: Color,
    warning: Color,
    danger: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary_fg: Color::White,
            accent: Color::Cyan,
            muted: Color::DarkGray,
            selection_bg: Color::DarkGray,
            warning: Color::Yellow,
            danger: Color::Red,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Screen {
    Home,
    AddGame,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Platform,
    Day,
    Month,
    Year,
}

impl Field {
    const ALL: [Field; 5] = [
        Field::Title,
        Field::Platform,
        Field::Day,
        Field::Month,
        Field::Year,
    ];

    fn label(self) -> &'static str {
        match self {
            Field::Title => "Title",
            Field::Platform => "Platform",
            Field::Day => "Day",
            Field::Month => "Month",
            Field::Year => "Year",
        }
    }

    fn max_len(self) -> usize {
        match self {
            Field::Title | Field::Platform => MAX_TEXT_LEN,
            Field::Day | Field::Month => 2,
            Field::Year => 4,
        }
    }

    fn numeric(self) -> bool {
        matches!(self, Field::Day | Field::Month | Field::Year)
    }

    fn step(self, delta: isize) -> Field {
        let len = Self::ALL.len() as isize;
        let index = Self::ALL.iter().position(|f| *f == self).unwrap_or(0) as isize;
        Self::ALL[(index + delta).rem_euclid(len) as usize]
    }
}

#[derive(Debug, Clone)]
struct FormState {
    form: GameForm,
    focus: Field,
}

impl Default for FormState {
    fn default() -> Self {
        Self {
            form: GameForm::default(),
            focus: Field::Title,
        }
    }
}

impl FormState {
    fn value(&self, field: Field) -> &str {
        match field {
            Field::Title => &self.form.title,
            Field::Platform => &self.form.platform,
            Field::Day => &self.form.day,
            Field::Month => &self.form.month,
            Field::Year => &self.form.year,
        }
    }

    fn value_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::Title => &mut self.form.title,
            Field::Platform => &mut self.form.platform,
            Field::Day => &mut self.form.day,
            Field::Month => &mut self.form.month,
            Field::Year => &mut self.form.year,
        }
    }

    fn insert(&mut self, ch: char) {
        let field = self.focus;
        if ch.is_control() || (field.numeric() && !ch.is_ascii_digit()) {
            return;
        }
        let value = self.value_mut(field);
        if value.chars().count() < field.max_len() {
            value.push(ch);
        }
    }

    fn backspace(&mut self) {
        let field = self.focus;
        self.value_mut(field).pop();
    }
}

#[derive(Debug)]
struct ActiveNotice {
    notice: Notice,
    shown_at: Instant,
}

impl ActiveNotice {
    fn new(notice: Notice) -> Self {
        Self {
            notice,
            shown_at: Instant::now(),
        }
    }

    fn expired(&self) -> bool {
        match &self.notice.pending {
            Some(pending) => !pending.is_armed(),
            None => self.shown_at.elapsed() >= self.notice.duration,
        }
    }

    fn remaining(&self) -> Duration {
        match &self.notice.pending {
            Some(pending) => pending.remaining(),
            None => self.notice.duration.saturating_sub(self.shown_at.elapsed()),
        }
    }
}

enum AppEvent {
    Input(Event),
    Tick,
}

/// Terminal front end: the backlog list and the add-game form.
pub struct BacklogApp {
    controller: BacklogController,
    backlog_rx: Option<mpsc::Receiver<BacklogEvent>>,
    notice_rx: Option<mpsc::UnboundedReceiver<Notice>>,
    screen: Screen,
    form: FormState,
    games: Vec<GameRecord>,
    cursor: usize,
    notices: VecDeque<ActiveNotice>,
    status: String,
    should_quit: bool,
    theme: Theme,
}

impl BacklogApp {
    pub fn new(
        controller: BacklogController,
        backlog_rx: mpsc::Receiver<BacklogEvent>,
        notice_rx: mpsc::UnboundedReceiver<Notice>,
    ) -> Self {
        Self {
            controller,
            backlog_rx: Some(backlog_rx),
            notice_rx: Some(notice_rx),
            screen: Screen::Home,
            form: FormState::default(),
            games: Vec::new(),
            cursor: 0,
            notices: VecDeque::new(),
            status: "Ready".to_string(),
            should_quit: false,
            theme: Theme::default(),
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        self.refresh_games();
        self.status = format!("{} games in backlog", self.games.len());

        let mut stdout = io::stdout();
        enable_raw_mode().context("failed to enter raw mode")?;
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("failed to create terminal")?;
        terminal.hide_cursor()?;
        terminal.clear()?;

        let (event_tx, mut event_rx) = mpsc::channel::<AppEvent>(128);
        spawn_input_thread(event_tx);

        let mut backlog_rx = self
            .backlog_rx
            .take()
            .context("backlog event channel already consumed")?;
        let mut notice_rx = self
            .notice_rx
            .take()
            .context("notice channel already consumed")?;

        loop {
            self.refresh_games();
            terminal.draw(|frame| self.draw(frame))?;
            if self.should_quit {
                break;
            }

            tokio::select! {
                maybe_event = event_rx.recv() => match maybe_event {
                    Some(AppEvent::Input(event)) => {
                        if let Err(err) = self.handle_input(event) {
                            self.status = format!("Error: {err}");
                        }
                    }
                    Some(AppEvent::Tick) => self.handle_tick(),
                    None => break,
                },
                Some(event) = backlog_rx.recv() => self.handle_backlog_event(event),
                Some(notice) = notice_rx.recv() => {
                    self.notices.push_back(ActiveNotice::new(notice));
                }
            }
        }

        restore_terminal(&mut terminal)?;
        self.flush_pending(&mut backlog_rx).await;
        Ok(())
    }

    // Prompts still open at exit count as dismissed, so their deletes run.
    async fn flush_pending(&mut self, backlog_rx: &mut mpsc::Receiver<BacklogEvent>) {
        let committed = self.controller.commit_pending();
        if committed == 0 {
            return;
        }
        info!(committed, "Committing pending deletions before exit");
        let mut landed = 0;
        while landed < committed {
            match timeout(SHUTDOWN_WAIT, backlog_rx.recv()).await {
                Ok(Some(event)) => {
                    if is_deletion(&event) {
                        landed += 1;
                    }
                    self.handle_backlog_event(event);
                }
                Ok(None) => break,
                Err(_) => {
                    warn!("Timed out waiting for pending deletions");
                    break;
                }
            }
        }
    }

    fn refresh_games(&mut self) {
        self.games = self.controller.visible_games();
        if self.games.is_empty() {
            self.cursor = 0;
        } else if self.cursor >= self.games.len() {
            self.cursor = self.games.len() - 1;
        }
    }

    fn handle_tick(&mut self) {
        self.notices.retain(|active| !active.expired());
    }

    fn handle_backlog_event(&mut self, event: BacklogEvent) {
        match event {
            BacklogEvent::Inserted(record) => {
                info!(id = record.id().0, title = %record.title, "Game added");
                self.status = format!("Added {}", record.title);
            }
            BacklogEvent::Deleted { id, removed } => {
                info!(id = id.0, removed, "Game deletion finished");
                if removed {
                    self.status = "Game removed from backlog".to_string();
                }
            }
            BacklogEvent::Cleared { removed } => {
                info!(removed, "Backlog cleared");
                self.status = format!("Removed {removed} games");
            }
            BacklogEvent::Failed { operation, error } => {
                error!(?operation, %error, "Backlog operation failed");
                self.status = format!("Error: {error}");
            }
        }
    }

    fn handle_input(&mut self, event: Event) -> Result<()> {
        if let Event::Key(key) = event {
            if key.modifiers == KeyModifiers::CONTROL && key.code == KeyCode::Char('c') {
                self.should_quit = true;
                return Ok(());
            }
            match self.screen {
                Screen::Home => self.handle_home_key(key)?,
                Screen::AddGame => self.handle_form_key(key)?,
            }
        }
        Ok(())
    }

    fn handle_home_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('j') | KeyCode::Down => self.move_cursor(1),
            KeyCode::Char('k') | KeyCode::Up => self.move_cursor(-1),
            KeyCode::Char('a') => {
                self.form = FormState::default();
                self.screen = Screen::AddGame;
                self.status = "Add a game".to_string();
            }
            KeyCode::Char('d') | KeyCode::Delete => {
                if let Some(record) = self.games.get(self.cursor).cloned() {
                    self.controller.arm_delete_one(record);
                }
            }
            KeyCode::Char('D') => {
                if self.games.is_empty() {
                    self.status = "Backlog is already empty".to_string();
                } else if let Err(err) = self.controller.arm_delete_all() {
                    self.status = err.to_string();
                }
            }
            KeyCode::Char('u') => {
                let undone = self
                    .latest_prompt()
                    .map(|active| active.notice.trigger_action())
                    .unwrap_or(false);
                if undone {
                    self.status = "Deletion undone".to_string();
                    self.notices.retain(|active| !active.expired());
                } else {
                    self.status = "Nothing to undo".to_string();
                }
            }
            KeyCode::Char('x') | KeyCode::Enter => {
                if let Some(pending) = self
                    .latest_prompt()
                    .and_then(|active| active.notice.pending.clone())
                {
                    pending.commit_now();
                    self.notices.retain(|active| !active.expired());
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_form_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Esc => {
                self.screen = Screen::Home;
                self.status = "Add cancelled".to_string();
            }
            KeyCode::Tab | KeyCode::Down => self.form.focus = self.form.focus.step(1),
            KeyCode::BackTab | KeyCode::Up => self.form.focus = self.form.focus.step(-1),
            KeyCode::Backspace => self.form.backspace(),
            KeyCode::Enter => {
                if self.controller.add_game(&self.form.form).is_ok() {
                    self.status = format!("Saving {}", self.form.form.title.trim());
                    self.screen = Screen::Home;
                }
            }
            KeyCode::Char(ch) => {
                if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT {
                    self.form.insert(ch);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn move_cursor(&mut self, delta: isize) {
        if self.games.is_empty() {
            self.cursor = 0;
            return;
        }
        let last = self.games.len() as isize - 1;
        self.cursor = (self.cursor as isize + delta).clamp(0, last) as usize;
    }

    fn latest_prompt(&self) -> Option<&ActiveNotice> {
        self.notices.iter().rev().find(|active| {
            active
                .notice
                .pending
                .as_ref()
                .map(|pending| pending.is_armed())
                .unwrap_or(false)
        })
    }

    fn draw(&mut self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(6),
                Constraint::Length(3),
                Constraint::Length(3),
            ])
            .split(frame.size());

        match self.screen {
            Screen::Home => self.render_game_list(frame, chunks[0]),
            Screen::AddGame => self.render_form(frame, chunks[0]),
        }
        self.render_snackbar(frame, chunks[1]);
        self.render_status(frame, chunks[2]);
    }

    fn render_game_list(&self, frame: &mut Frame, area: Rect) {
        let items: Vec<ListItem> = self
            .games
            .iter()
            .map(|game| {
                let title = Line::from(Span::styled(
                    game.title.clone(),
                    Style::default()
                        .fg(self.theme.primary_fg)
                        .add_modifier(Modifier::BOLD | Modifier::ITALIC),
                ));
                let details = Line::from(vec![
                    Span::styled(
                        format!("{:<24}", game.platform),
                        Style::default().fg(self.theme.muted),
                    ),
                    Span::raw(format!("Release: {}", game.release_label())),
                ]);
                ListItem::new(Text::from(vec![title, details]))
            })
            .collect();

        let mut list_state = ListState::default();
        if !self.games.is_empty() {
            list_state.select(Some(self.cursor));
        }
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!("Game Backlog ({})", self.games.len()));
        let list = List::new(items)
            .block(block)
            .highlight_style(Style::default().bg(self.theme.selection_bg))
            .highlight_symbol("▶ ");
        frame.render_stateful_widget(list, area, &mut list_state);
    }

    fn render_form(&self, frame: &mut Frame, area: Rect) {
        let mut lines = Vec::with_capacity(Field::ALL.len() + 2);
        for field in Field::ALL {
            let focused = field == self.form.focus;
            let label_style = if focused {
                Style::default()
                    .fg(self.theme.accent)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(self.theme.muted)
            };
            lines.push(Line::from(vec![
                Span::styled(format!("{:<10}", field.label()), label_style),
                Span::raw(self.form.value(field).to_string()),
            ]));
        }
        lines.push(Line::from(""));
        lines.push(Line::from(vec![
            Span::styled("Enter", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" save  "),
            Span::styled("Tab", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" next field  "),
            Span::styled("Esc", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" back"),
        ]));

        let paragraph = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("Add Game"))
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, area);

        let row = Field::ALL
            .iter()
            .position(|field| *field == self.form.focus)
            .unwrap_or(0) as u16;
        let column = 10 + self.form.value(self.form.focus).chars().count() as u16;
        let cursor_x = (area.x + 1 + column).min(area.x + area.width.saturating_sub(2));
        let cursor_y = (area.y + 1 + row).min(area.y + area.height.saturating_sub(2));
        frame.set_cursor(cursor_x, cursor_y);
    }

    fn render_snackbar(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::ALL).title("Notifications");
        let line = match self.notices.iter().rev().find(|active| !active.expired()) {
            Some(active) => {
                let style = if active.notice.pending.is_some() {
                    Style::default().fg(self.theme.warning)
                } else {
                    Style::default().fg(self.theme.danger)
                };
                let mut spans = vec![Span::styled(active.notice.message.clone(), style)];
                if let Some(label) = active.notice.action_label.as_deref() {
                    spans.push(Span::raw("  "));
                    spans.push(Span::styled(
                        format!("[u] {label}"),
                        Style::default()
                            .fg(self.theme.accent)
                            .add_modifier(Modifier::BOLD),
                    ));
                    spans.push(Span::styled(
                        format!(" ({}s)", active.remaining().as_secs() + 1),
                        Style::default().fg(self.theme.muted),
                    ));
                }
                Line::from(spans)
            }
            None => Line::from(""),
        };
        frame.render_widget(Paragraph::new(line).block(block), area);
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        let help = match self.screen {
            Screen::Home => "a add  d delete  D clear all  u undo  x dismiss  q quit",
            Screen::AddGame => "Day is optional and defaults to the 1st",
        };
        let block = Block::default().borders(Borders::ALL).title(help);
        let paragraph = Paragraph::new(Line::from(self.status.clone()))
            .block(block)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor()?;
    Ok(())
}

fn is_deletion(event: &BacklogEvent) -> bool {
    match event {
        BacklogEvent::Deleted { .. } | BacklogEvent::Cleared { .. } => true,
        BacklogEvent::Failed { operation, .. } => {
            matches!(operation, Operation::Delete | Operation::DeleteAll)
        }
        BacklogEvent::Inserted(_) => false,
    }
}

fn spawn_input_thread(sender: mpsc::Sender<AppEvent>) {
    thread::spawn(move || loop {
        match event::poll(TICK_RATE) {
            Ok(true) => match event::read() {
                Ok(evt) => {
                    if sender.blocking_send(AppEvent::Input(evt)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            },
            Ok(false) => {
                if sender.blocking_send(AppEvent::Tick).is_err() {
                    break;
                }
            }
            Err(_) => break,
        }
    });
}
