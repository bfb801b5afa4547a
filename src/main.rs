use std::io;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

use mlb_voice::assistant::ConnectionState;
use mlb_voice::commentary;
use mlb_voice::config::Config;
use mlb_voice::fixtures;
use mlb_voice::game::PlayKind;
use mlb_voice::logging;
use mlb_voice::plays::Scenario;
use mlb_voice::provider::{self, Backends, ProviderCommand};
use mlb_voice::scheduler::{self, SchedulerHandle, SystemClock};
use mlb_voice::state::{
    Action, AppState, Delta, GameStore, InputMode, Speaker, apply_delta,
};

struct App {
    state: AppState,
    should_quit: bool,
    tx: mpsc::Sender<Delta>,
    cmd_tx: Option<mpsc::Sender<ProviderCommand>>,
    scheduler: Option<SchedulerHandle>,
}

impl App {
    fn new(
        tx: mpsc::Sender<Delta>,
        cmd_tx: Option<mpsc::Sender<ProviderCommand>>,
        scheduler: Option<SchedulerHandle>,
    ) -> Self {
        Self {
            state: AppState::new(GameStore::new(fixtures::opening_game())),
            should_quit: false,
            tx,
            cmd_tx,
            scheduler,
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        if self.state.input_mode == InputMode::Question {
            self.on_question_key(key);
            return;
        }
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('o') => self.dispatch(Action::AddOut),
            KeyCode::Char('b') => self.dispatch(Action::AddBall),
            KeyCode::Char('k') => self.dispatch(Action::AddStrike),
            KeyCode::Char('1') => self.dispatch(Action::Scenario(Scenario::Single)),
            KeyCode::Char('h') => self.dispatch(Action::Scenario(Scenario::HomeRun)),
            KeyCode::Char('s') => self.dispatch(Action::Scenario(Scenario::Strikeout)),
            KeyCode::Char('d') => self.dispatch(Action::Scenario(Scenario::DoublePlay)),
            KeyCode::Char('g') => self.dispatch(Action::Scenario(Scenario::Groundout)),
            KeyCode::Char('r') => {
                self.dispatch(Action::Reset(Box::new(fixtures::opening_game())))
            }
            KeyCode::Char('x') => {
                self.dispatch(Action::Reset(Box::new(fixtures::exciting_moment())))
            }
            KeyCode::Char('p') => self.toggle_scheduler(),
            KeyCode::Char('v') => {
                self.state.speak_replies = !self.state.speak_replies;
                let mode = if self.state.speak_replies { "on" } else { "off" };
                self.state.push_log(format!("[INFO] Speech output {mode}"));
            }
            KeyCode::Char('e') => self.request_explanation(),
            KeyCode::Char('c') => self.send_command(ProviderCommand::Reconnect, "Reconnect"),
            KeyCode::Char('/') | KeyCode::Enter => self.state.input_mode = InputMode::Question,
            KeyCode::Char('?') => self.state.help_overlay = !self.state.help_overlay,
            _ => {}
        }
    }

    fn on_question_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.state.input.clear();
                self.state.input_mode = InputMode::Normal;
            }
            KeyCode::Enter => {
                if let Some(question) = self.state.take_question() {
                    let context = self.state.store.snapshot();
                    let speak = self.state.speak_replies;
                    self.send_command(
                        ProviderCommand::Ask {
                            question,
                            context,
                            speak,
                        },
                        "Question",
                    );
                }
            }
            KeyCode::Backspace => {
                self.state.input.pop();
            }
            KeyCode::Char(ch) => self.state.input.push(ch),
            _ => {}
        }
    }

    /// Manual triggers go through the same channel as scheduler ticks so both
    /// are applied in arrival order against the latest state.
    fn dispatch(&mut self, action: Action) {
        if self.tx.send(Delta::Dispatch(action)).is_err() {
            self.state.push_log("[WARN] Update channel closed");
        }
    }

    fn toggle_scheduler(&mut self) {
        let Some(handle) = &self.scheduler else {
            self.state.push_log("[INFO] Scenario feed unavailable");
            return;
        };
        let paused = handle.toggle_pause();
        self.state.scheduler_paused = paused;
        let mode = if paused { "paused" } else { "resumed" };
        self.state.push_log(format!("[INFO] Scenario feed {mode}"));
    }

    fn request_explanation(&mut self) {
        let snapshot = self.state.store.snapshot();
        let Some(play) = snapshot.latest_play() else {
            self.state.push_log("[INFO] No play to explain yet");
            return;
        };
        self.state
            .push_message(Speaker::Fan, format!("Explain: {}", play.description));
        self.send_command(ProviderCommand::ExplainPlay(play.clone()), "Explanation");
    }

    fn send_command(&mut self, cmd: ProviderCommand, what: &str) {
        let Some(tx) = &self.cmd_tx else {
            self.state.push_log(format!("[INFO] {what} unavailable"));
            return;
        };
        if tx.send(cmd).is_err() {
            self.state.push_log(format!("[WARN] {what} request failed"));
        } else {
            self.state.push_log(format!("[INFO] {what} request sent"));
        }
    }
}

fn main() -> anyhow::Result<()> {
    let config = Config::load();
    if let Err(err) = logging::init_file_tracing(&config.log_file) {
        eprintln!("warning: {err:#}");
    }

    let (tx, rx) = mpsc::channel();
    let (cmd_tx, cmd_rx) = mpsc::channel();
    let provider = provider::spawn_assistant_provider(tx.clone(), cmd_rx, Backends::from_config(&config));
    let feed = scheduler::spawn_scheduler(tx.clone(), config.scenario_interval, SystemClock);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let mut app = App::new(tx, Some(cmd_tx), Some(feed));
    if !config.has_text_api() {
        app.state
            .push_log("[INFO] No GEMINI_API_KEY or PROXY_URL; questions need the assistant channel");
    }
    let res = run_app(&mut terminal, &mut app, rx);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Some(feed) = app.scheduler.take() {
        feed.stop();
    }
    app.cmd_tx = None;
    if provider.join().is_err() {
        tracing::warn!("assistant provider panicked");
    }

    if let Err(err) = res {
        eprintln!("error: {err}");
    }
    Ok(())
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    rx: mpsc::Receiver<Delta>,
) -> io::Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();

    loop {
        while let Ok(delta) = rx.try_recv() {
            apply_delta(&mut app.state, delta);
        }

        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.on_key(key);
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn ui(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(3),
        ])
        .split(frame.size());

    let header = Paragraph::new(header_text(&app.state))
        .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, chunks[0]);

    render_body(frame, chunks[1], &app.state);

    let footer = Paragraph::new(footer_text(&app.state))
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(footer, chunks[2]);

    if app.state.help_overlay {
        let area = frame.size();
        render_help_overlay(frame, area);
    }
}

fn header_text(state: &AppState) -> String {
    let game = state.store.snapshot();
    let feed = if state.scheduler_paused { "paused" } else { "live" };
    let line1 = format!(
        "  MLB VOICE | {} @ {} | {} | Assistant: {} | Feed: {}",
        game.teams.away.team.name,
        game.teams.home.team.name,
        game.venue.name,
        state.connection.label(),
        feed
    );
    let voice = if state.speak_replies { "on" } else { "off" };
    let line2 = format!("  {} | Speech: {}", game.status.detailed_state, voice);
    format!("{line1}\n{line2}")
}

fn footer_text(state: &AppState) -> String {
    match state.input_mode {
        InputMode::Question => format!("Ask> {}_\nEnter Send | Esc Cancel", state.input),
        InputMode::Normal => {
            "o Out | b Ball | k Strike | 1 Single | h HR | s K | d DP | g Groundout\n/ Ask | e Explain | v Speech | p Pause | r Reset | x Drama | c Reconnect | ? Help | q Quit".to_string()
        }
    }
}

fn render_body(frame: &mut Frame, area: Rect, state: &AppState) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(area);

    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(9), Constraint::Min(1)])
        .split(columns[0]);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(8)])
        .split(columns[1]);

    let scoreboard = Paragraph::new(scoreboard_lines(state))
        .block(Block::default().title("Game Status").borders(Borders::ALL));
    frame.render_widget(scoreboard, left[0]);

    let plays = Paragraph::new(play_lines(state))
        .wrap(Wrap { trim: true })
        .block(Block::default().title("Plays").borders(Borders::ALL));
    frame.render_widget(plays, left[1]);

    let chat = Paragraph::new(transcript_lines(state, right[0].height))
        .wrap(Wrap { trim: false })
        .block(Block::default().title("Assistant").borders(Borders::ALL));
    frame.render_widget(chat, right[0]);

    let logs = Paragraph::new(log_lines(state, right[1].height))
        .block(Block::default().title("Console").borders(Borders::ALL));
    frame.render_widget(logs, right[1]);
}

fn scoreboard_lines(state: &AppState) -> Vec<Line<'static>> {
    let game = state.store.snapshot();
    let play = &game.current_play;
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let batting = game.batting().team.id;
    let team_line = |name: &str, score: u32, id: u32| {
        let marker = if id == batting { "▶ " } else { "  " };
        Line::from(vec![
            Span::raw(marker.to_string()),
            Span::styled(format!("{name:<22}"), bold),
            Span::styled(score.to_string(), bold.fg(Color::Yellow)),
        ])
    };

    let mut lines = vec![
        team_line(&game.teams.away.team.name, game.teams.away.score, game.teams.away.team.id),
        team_line(&game.teams.home.team.name, game.teams.home.score, game.teams.home.team.id),
        Line::from(""),
        Line::from(format!("Inning: {}", play.inning_label())),
        Line::from(format!("Outs: {}", play.outs)),
        Line::from(format!("Count: {}", game.count_label())),
    ];
    if let Some(description) = &play.description {
        lines.push(Line::styled(
            description.clone(),
            Style::default().fg(Color::DarkGray),
        ));
    }
    lines
}

fn play_lines(state: &AppState) -> Vec<Line<'static>> {
    let game = state.store.snapshot();
    if game.plays.is_empty() {
        return vec![Line::styled(
            "No plays yet",
            Style::default().fg(Color::DarkGray),
        )];
    }
    game.plays
        .iter()
        .map(|p| {
            Line::from(vec![
                Span::styled(
                    format!("{:<6} {:>2} ", p.inning_half.label(), p.inning),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(
                    format!("{:<11} ", p.kind.label()),
                    Style::default().fg(play_color(p.kind)),
                ),
                Span::raw(p.description.clone()),
            ])
        })
        .collect()
}

fn play_color(kind: PlayKind) -> Color {
    match kind {
        PlayKind::HomeRun => Color::Yellow,
        PlayKind::Strikeout => Color::Magenta,
        PlayKind::DoublePlay | PlayKind::Groundout => Color::Blue,
        PlayKind::Single => Color::Green,
    }
}

fn transcript_lines(state: &AppState, height: u16) -> Vec<Line<'static>> {
    let keep = height.saturating_sub(2) as usize;
    let skip = state.transcript.len().saturating_sub(keep);
    let mut lines = Vec::new();
    for message in state.transcript.iter().skip(skip) {
        match message.speaker {
            Speaker::Fan => lines.push(Line::from(vec![
                Span::styled("You: ", Style::default().fg(Color::Cyan)),
                Span::raw(message.content.clone()),
            ])),
            Speaker::Assistant => {
                let mut spans = vec![Span::styled(
                    "AI: ",
                    Style::default().fg(Color::Magenta),
                )];
                for (emphasized, run) in commentary::emphasis_runs(&message.content) {
                    if emphasized {
                        spans.push(Span::styled(
                            run.to_string(),
                            Style::default().add_modifier(Modifier::BOLD),
                        ));
                    } else {
                        spans.push(Span::raw(run.to_string()));
                    }
                }
                lines.push(Line::from(spans));
            }
        }
    }
    if lines.is_empty() {
        let hint = match state.connection {
            ConnectionState::Open => "Press / to ask about the game",
            ConnectionState::Connecting => "Connecting to assistant...",
            ConnectionState::Closed => "Assistant offline; press / to ask the text API",
        };
        lines.push(Line::styled(hint, Style::default().fg(Color::DarkGray)));
    }
    lines
}

fn log_lines(state: &AppState, height: u16) -> Vec<Line<'static>> {
    let keep = height.saturating_sub(2) as usize;
    let skip = state.logs.len().saturating_sub(keep);
    state
        .logs
        .iter()
        .skip(skip)
        .map(|line| {
            let color = if line.starts_with("[WARN]") {
                Color::Red
            } else if line.starts_with("[PLAY]") {
                Color::Green
            } else {
                Color::Gray
            };
            Line::styled(line.clone(), Style::default().fg(color))
        })
        .collect()
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 70, area);
    frame.render_widget(Clear, popup_area);

    let text = [
        "MLB Voice - Help",
        "",
        "Game:",
        "  o            Add out",
        "  b / k        Add ball / strike",
        "  1 h s d g    Single, home run, strikeout, double play, groundout",
        "  p            Pause/resume the scenario feed",
        "  r            Reset to the opening fixture",
        "  x            Load the late-inning fixture",
        "",
        "Assistant:",
        "  / or Enter   Ask a question",
        "  e            Explain the latest play",
        "  v            Toggle speech output (saved as MP3)",
        "  c            Reconnect the assistant channel",
        "",
        "  ?            Toggle help",
        "  q            Quit",
    ]
    .join("\n");

    let help = Paragraph::new(text)
        .block(Block::default().title("Help").borders(Borders::ALL))
        .style(Style::default());
    frame.render_widget(help, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}
