pub mod ui;

use anyhow::Context;
use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{
        DisableBracketedPaste, DisableFocusChange, EnableBracketedPaste, EnableFocusChange,
        KeyCode, KeyEvent, KeyModifiers,
    },
    execute,
    style::Print,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use pomonotes::{
    api::{HttpSessionApi, RequestWorker, SessionApi},
    app_dirs::AppDirs,
    config::{Config, ConfigStore, FileConfigStore},
    controller::{Intent, StudyController},
    logging::init_logging,
    models::SessionId,
    notes::NotesEdit,
    runtime::{CrosstermEventSource, FixedTicker, Runner, StudyEvent, StudyEventSource, Ticker},
    timer::Phase,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Frame, Terminal,
};
use std::{
    io::{self, stdin, Write},
    path::{Path, PathBuf},
    time::{Duration, Instant},
};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;

const TICK_RATE_MS: u64 = 100;

/// pomodoro timer with session notes, backed by a study-session API
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A pomodoro study timer for the terminal. Sessions, counters and notes are stored by a study-session HTTP API; notes auto-save while you type."
)]
pub struct Cli {
    /// base URL of the study-session API
    #[clap(long)]
    api_url: Option<String>,

    /// length of a focus interval in minutes
    #[clap(long)]
    work_minutes: Option<u64>,

    /// length of a short break in minutes
    #[clap(long)]
    short_break_minutes: Option<u64>,

    /// length of a long break in minutes
    #[clap(long)]
    long_break_minutes: Option<u64>,

    /// take a long break after this many completed pomodoros
    #[clap(long)]
    long_break_every: Option<u32>,

    /// directory exported notes are written to
    #[clap(long)]
    export_dir: Option<PathBuf>,

    /// write the merged settings back to the config file
    #[clap(long)]
    save_config: bool,
}

impl Cli {
    /// Flags win over whatever the config file says.
    fn apply(&self, mut cfg: Config) -> Config {
        if let Some(url) = &self.api_url {
            cfg.api_base_url = url.clone();
        }
        if let Some(m) = self.work_minutes {
            cfg.work_minutes = m;
        }
        if let Some(m) = self.short_break_minutes {
            cfg.short_break_minutes = m;
        }
        if let Some(m) = self.long_break_minutes {
            cfg.long_break_minutes = m;
        }
        if let Some(n) = self.long_break_every {
            cfg.long_break_every = n;
        }
        if let Some(dir) = &self.export_dir {
            cfg.export_dir = Some(dir.clone());
        }
        cfg
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Timer,
    History,
}

/// Which pane of the timer screen receives keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Controls,
    Notes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirm {
    EndSession,
    Interrupt,
    DeleteSession(SessionId),
    Quit,
}

impl Confirm {
    pub fn question(&self) -> &'static str {
        match self {
            Confirm::EndSession => "End this study session? It will be saved to your history.",
            Confirm::Interrupt => {
                "Did you get distracted? Mark this Pomodoro as interrupted? It will not count."
            }
            Confirm::DeleteSession(_) => "Delete this session? This cannot be undone.",
            Confirm::Quit => "You have unsaved notes. Save them and quit?",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    SessionName(String),
    Confirm(Confirm),
}

pub struct App {
    pub controller: StudyController,
    pub state: AppState,
    pub focus: Focus,
    pub prompt: Option<Prompt>,
    pub should_quit: bool,
}

impl App {
    pub fn new(controller: StudyController) -> Self {
        Self {
            controller,
            state: AppState::Timer,
            focus: Focus::Controls,
            prompt: None,
            should_quit: false,
        }
    }

    pub fn on_key(&mut self, key: KeyEvent, now: Instant) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.request_quit();
            return;
        }

        if let Some(prompt) = self.prompt.take() {
            self.on_prompt_key(prompt, key, now);
            return;
        }

        match self.state {
            AppState::Timer => match self.focus {
                Focus::Notes => self.on_notes_key(key, now),
                Focus::Controls => self.on_timer_key(key, now),
            },
            AppState::History => self.on_history_key(key, now),
        }
    }

    pub fn on_paste(&mut self, text: String, now: Instant) {
        match &mut self.prompt {
            Some(Prompt::SessionName(name)) => name.push_str(text.trim_end_matches(['\r', '\n'])),
            Some(Prompt::Confirm(_)) => {}
            None if self.state == AppState::Timer && self.focus == Focus::Notes => {
                let text = text.replace("\r\n", "\n").replace('\r', "\n");
                self.controller
                    .dispatch(Intent::EditNotes(NotesEdit::InsertStr(text)), now);
            }
            None => {}
        }
    }

    /// Losing focus mid-pomodoro asks whether the user got distracted.
    pub fn on_focus_lost(&mut self) {
        let timer = self.controller.timer();
        if self.prompt.is_none() && timer.is_running() && timer.phase() == Phase::Work {
            self.prompt = Some(Prompt::Confirm(Confirm::Interrupt));
        }
    }

    fn request_quit(&mut self) {
        if self.controller.has_unsaved_notes() {
            self.prompt = Some(Prompt::Confirm(Confirm::Quit));
        } else {
            self.should_quit = true;
        }
    }

    fn on_prompt_key(&mut self, prompt: Prompt, key: KeyEvent, now: Instant) {
        match prompt {
            Prompt::SessionName(mut name) => match key.code {
                KeyCode::Enter => self.controller.dispatch(Intent::StartSession(name), now),
                KeyCode::Esc => {}
                KeyCode::Backspace => {
                    name.pop();
                    self.prompt = Some(Prompt::SessionName(name));
                }
                KeyCode::Char(c) => {
                    name.push(c);
                    self.prompt = Some(Prompt::SessionName(name));
                }
                _ => self.prompt = Some(Prompt::SessionName(name)),
            },
            Prompt::Confirm(confirm) => match key.code {
                KeyCode::Char('y') | KeyCode::Enter => self.confirm(confirm, now),
                KeyCode::Char('n') | KeyCode::Esc => {}
                _ => self.prompt = Some(Prompt::Confirm(confirm)),
            },
        }
    }

    fn confirm(&mut self, confirm: Confirm, now: Instant) {
        match confirm {
            Confirm::EndSession => self.controller.dispatch(Intent::EndSession, now),
            Confirm::Interrupt => self.controller.dispatch(Intent::Interrupt, now),
            Confirm::DeleteSession(id) => self.controller.dispatch(Intent::DeleteSession(id), now),
            Confirm::Quit => self.should_quit = true,
        }
    }

    fn on_timer_key(&mut self, key: KeyEvent, now: Instant) {
        match key.code {
            KeyCode::Char('n') => self.prompt = Some(Prompt::SessionName(String::new())),
            KeyCode::Char(' ') => self.controller.dispatch(Intent::ToggleTimer, now),
            KeyCode::Char('s') => self.controller.dispatch(Intent::SkipBreak, now),
            KeyCode::Char('i') => {
                let timer = self.controller.timer();
                if timer.is_running() && timer.phase() == Phase::Work {
                    self.prompt = Some(Prompt::Confirm(Confirm::Interrupt));
                }
            }
            KeyCode::Char('e') => {
                if self.controller.lifecycle().is_active() {
                    self.prompt = Some(Prompt::Confirm(Confirm::EndSession));
                } else {
                    self.controller.dispatch(Intent::EndSession, now);
                }
            }
            KeyCode::Tab => self.focus = Focus::Notes,
            KeyCode::Char('h') => {
                self.state = AppState::History;
                self.controller.dispatch(Intent::LoadHistory, now);
            }
            KeyCode::Char('q') | KeyCode::Esc => self.request_quit(),
            _ => {}
        }
    }

    fn on_notes_key(&mut self, key: KeyEvent, now: Instant) {
        let edit = match key.code {
            KeyCode::Esc | KeyCode::Tab => {
                self.focus = Focus::Controls;
                return;
            }
            KeyCode::Char('s') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.controller.dispatch(Intent::SaveNotes, now);
                return;
            }
            KeyCode::Enter => NotesEdit::Newline,
            KeyCode::Backspace => NotesEdit::Backspace,
            KeyCode::Char(c) => NotesEdit::Insert(c),
            _ => return,
        };
        self.controller.dispatch(Intent::EditNotes(edit), now);
    }

    fn on_history_key(&mut self, key: KeyEvent, now: Instant) {
        let open_detail = self.controller.history().detail().map(|s| s.id.clone());
        if let Some(id) = open_detail {
            match key.code {
                KeyCode::Char('d') => {
                    self.prompt = Some(Prompt::Confirm(Confirm::DeleteSession(id)));
                }
                KeyCode::Char('x') => self.controller.dispatch(Intent::ExportDetail, now),
                KeyCode::Esc => self.controller.dispatch(Intent::CloseDetail, now),
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Up => self.controller.history_mut().select_previous(),
            KeyCode::Down => self.controller.history_mut().select_next(),
            KeyCode::Enter => {
                if let Some(id) = self.controller.history().selected_id().cloned() {
                    self.controller.dispatch(Intent::ShowDetail(id), now);
                }
            }
            KeyCode::Char('r') => self.controller.dispatch(Intent::LoadHistory, now),
            KeyCode::Char('t') | KeyCode::Esc => self.state = AppState::Timer,
            KeyCode::Char('q') => self.request_quit(),
            _ => {}
        }
    }
}

/// Installs file logging, then loads the config so a malformed file ends up
/// in the log.
fn bootstrap(
    cli: &Cli,
    log_dir: Option<&Path>,
    store: &impl ConfigStore,
) -> anyhow::Result<(Option<WorkerGuard>, Config)> {
    let guard = log_dir.map(init_logging).transpose()?;
    Ok((guard, cli.apply(store.load())))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let store = FileConfigStore::new();
    let (_log_guard, config) = bootstrap(&cli, AppDirs::state_dir().as_deref(), &store)?;
    if cli.save_config {
        store
            .save(&config)
            .with_context(|| format!("failed to save config to {}", store.path().display()))?;
    }

    info!(api = %config.api_base_url, "starting pomonotes");

    let api = HttpSessionApi::new(config.api_base_url.clone());
    let events = CrosstermEventSource::new();
    let worker = RequestWorker::spawn(api.clone(), events.sender());
    let controller = StudyController::new(config.controller_settings(), Box::new(worker));
    let mut app = App::new(controller);

    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(
        stdout,
        EnterAlternateScreen,
        EnableFocusChange,
        EnableBracketedPaste
    )?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let runner = Runner::new(events, FixedTicker::new(Duration::from_millis(TICK_RATE_MS)));
    let result = start_tui(&mut terminal, &mut app, &runner);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableBracketedPaste,
        DisableFocusChange,
        LeaveAlternateScreen,
    )?;
    terminal.show_cursor()?;

    salvage_notes(&app, &api);
    result
}

fn start_tui<B, E, T>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    runner: &Runner<E, T>,
) -> anyhow::Result<()>
where
    B: Backend + Write,
    E: StudyEventSource,
    T: Ticker,
{
    loop {
        terminal.draw(|f| ui(app, f))?;

        let now = Instant::now();
        match runner.step() {
            StudyEvent::Tick => app.controller.on_tick(now),
            StudyEvent::Key(key) => app.on_key(key, now),
            StudyEvent::Paste(text) => app.on_paste(text, now),
            StudyEvent::FocusLost => app.on_focus_lost(),
            StudyEvent::Api(response) => app.controller.on_response(response, now),
            StudyEvent::Resize => {}
        }

        if app.controller.take_bell() {
            execute!(terminal.backend_mut(), Print('\x07'))?;
        }
        if app.should_quit {
            return Ok(());
        }
    }
}

/// Best-effort synchronous save of notes the server has not seen yet.
fn salvage_notes(app: &App, api: &dyn SessionApi) {
    let Some(request) = app.controller.unload_request() else {
        return;
    };
    match request.execute(api) {
        Ok(_) => info!("saved pending notes on exit"),
        Err(err) => warn!(error = %err, "could not save pending notes on exit"),
    }
}

fn ui(app: &mut App, f: &mut Frame) {
    let now = Instant::now();
    ui::screen::current_screen(&app.state).render(app, f);
    ui::render_overlays(app, f, now);
}
