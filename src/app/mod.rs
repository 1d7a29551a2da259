use std::io::Stdout;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::widgets::ListState;
use ratatui::Terminal;

use crate::config::AppConfig;
use crate::providers::{KeyStore, ReadSet};
use crate::repo::BlogRepo;
use crate::storage::StorageHandle;
use crate::ui;

pub mod actions;
pub mod state;

pub use actions::ActionDispatcher;
pub use state::{BlogViewState, Notice, NoticeLevel, OverlayState, Row, SaveOutcome, TextInput};

const NOTICE_TTL: Duration = Duration::from_secs(5);

enum Action {
    Quit,
    SelectNext,
    SelectPrevious,
    NextGroup,
    PreviousGroup,
    CycleMode,
    OpenPost,
    ToggleEdit,
    ToggleSelect,
    SelectAll,
    SelectGroup,
    DeselectAll,
    DeleteSelected,
    ManageCategories,
    Save,
    Reload,
}

pub struct App {
    pub storage: StorageHandle,
    repo: BlogRepo,
    keys: KeyStore,
    reads: ReadSet,
    state: BlogViewState,
    list_state: ListState,
    should_quit: bool,
    tick_rate: Duration,
    notice_seen: Option<(Notice, Instant)>,
    pending_save: Option<Vec<String>>,
}

impl App {
    pub fn new(
        config: Arc<AppConfig>,
        storage: StorageHandle,
        repo: BlogRepo,
        keys: KeyStore,
    ) -> Result<Self> {
        let mut state = BlogViewState::new(config.site.clone(), config.default_display_mode);
        let reads = storage
            .fetch_read_slugs()
            .context("loading read state for initial view")?;
        {
            let dispatcher = ActionDispatcher::new(&storage, &repo, &keys);
            if let Err(err) = dispatcher.reload(&mut state) {
                tracing::error!(?err, "failed to load blog index");
                state.set_notice(Notice::error(format!("Failed to load posts: {err:#}")));
            }
        }
        Ok(Self {
            storage,
            repo,
            keys,
            reads,
            state,
            list_state: ListState::default(),
            should_quit: false,
            tick_rate: Duration::from_millis(250),
            notice_seen: None,
            pending_save: None,
        })
    }

    pub fn state(&self) -> &BlogViewState {
        &self.state
    }

    pub fn run(&mut self) -> Result<()> {
        let mut terminal = setup_terminal()?;
        let result = self.event_loop(&mut terminal);
        restore_terminal(&mut terminal)?;
        result
    }

    fn dispatcher(&self) -> ActionDispatcher<'_> {
        ActionDispatcher::new(&self.storage, &self.repo, &self.keys)
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        loop {
            terminal
                .draw(|frame| {
                    self.list_state.select(self.state.cursor_row());
                    ui::draw_app(frame, &self.state, &self.reads, &mut self.list_state);
                })
                .context("rendering frame")?;
            self.run_pending_save();

            if self.should_quit {
                break;
            }

            let timeout = self
                .tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(0));

            if event::poll(timeout).context("polling for terminal events")? {
                if let Event::Key(key) = event::read().context("reading terminal event")? {
                    self.handle_key(key);
                }
            }

            if last_tick.elapsed() >= self.tick_rate {
                self.on_tick();
                last_tick = Instant::now();
            }
        }
        Ok(())
    }

    /// Expires notices once they have been on screen for a while.
    fn on_tick(&mut self) {
        let current = self.state.notice().cloned();
        match (current, self.notice_seen.take()) {
            (None, _) => {}
            (Some(notice), Some((seen, since))) if notice == seen => {
                if since.elapsed() >= NOTICE_TTL {
                    self.state.clear_notice();
                } else {
                    self.notice_seen = Some((seen, since));
                }
            }
            (Some(notice), _) => self.notice_seen = Some((notice, Instant::now())),
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }

        if self.handle_overlay_key(key) {
            return;
        }

        let plain = !key.modifiers.intersects(
            KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER,
        );
        let action = match key.code {
            KeyCode::Char('q') => Some(Action::Quit),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(Action::Quit)
            }
            KeyCode::Char('j') | KeyCode::Down => Some(Action::SelectNext),
            KeyCode::Char('k') | KeyCode::Up => Some(Action::SelectPrevious),
            KeyCode::Tab | KeyCode::PageDown => Some(Action::NextGroup),
            KeyCode::BackTab | KeyCode::PageUp => Some(Action::PreviousGroup),
            KeyCode::Enter => Some(Action::OpenPost),
            KeyCode::Char('m') if plain => Some(Action::CycleMode),
            KeyCode::Char('e') if plain => Some(Action::ToggleEdit),
            KeyCode::Char(' ') if plain => Some(Action::ToggleSelect),
            KeyCode::Char('a') if plain => Some(Action::SelectAll),
            KeyCode::Char('g') if plain => Some(Action::SelectGroup),
            KeyCode::Char('D') => Some(Action::DeselectAll),
            KeyCode::Char('d') if plain => Some(Action::DeleteSelected),
            KeyCode::Char('c') if plain => Some(Action::ManageCategories),
            KeyCode::Char('s') if plain => Some(Action::Save),
            KeyCode::Char('r') if plain => Some(Action::Reload),
            _ => None,
        };

        if let Some(action) = action {
            self.handle_action(action);
        }
    }

    fn handle_action(&mut self, action: Action) {
        let editing_only = matches!(
            action,
            Action::ToggleSelect
                | Action::SelectAll
                | Action::SelectGroup
                | Action::DeselectAll
                | Action::DeleteSelected
                | Action::Save
        );
        if editing_only && !self.state.is_editing() {
            self.state
                .set_notice(Notice::info("Press e to enter edit mode first"));
            return;
        }

        match action {
            Action::Quit => self.should_quit = true,
            Action::SelectNext => self.state.move_cursor(1),
            Action::SelectPrevious => self.state.move_cursor(-1),
            Action::NextGroup => self.state.jump_group(true),
            Action::PreviousGroup => self.state.jump_group(false),
            Action::CycleMode => {
                let mode = self.state.cycle_display_mode();
                self.state
                    .set_notice(Notice::info(format!("Grouping by {}", mode.title())));
            }
            Action::OpenPost => self.handle_open_post(),
            Action::ToggleEdit => {
                self.state.toggle_edit_mode();
            }
            Action::ToggleSelect => self.state.toggle_select_current(),
            Action::SelectAll => self.state.select_all(),
            Action::SelectGroup => self.state.select_current_group(),
            Action::DeselectAll => self.state.deselect_all(),
            Action::DeleteSelected => {
                self.state.delete_selected();
            }
            Action::ManageCategories => {
                self.state.open_category_overlay();
            }
            Action::Save => self.handle_save(),
            Action::Reload => self.handle_reload(),
        }
    }

    fn handle_open_post(&mut self) {
        let Some((slug, title)) = self
            .state
            .current_post()
            .map(|post| (post.slug.clone(), post.title().to_string()))
        else {
            return;
        };
        let result = self.dispatcher().mark_read(&slug);
        match result {
            Ok(()) => {
                self.reads.insert(slug);
                self.state
                    .set_notice(Notice::info(format!("Marked \"{title}\" as read")));
            }
            Err(err) => {
                tracing::error!(?err, slug, "failed to mark post as read");
                self.state
                    .set_notice(Notice::error("Failed to record read state"));
            }
        }
    }

    /// Starts a save; the write itself runs after the next frame so the
    /// status line can show it in flight.
    fn handle_save(&mut self) {
        match self.state.begin_save(&self.keys) {
            Ok(removed) => self.pending_save = Some(removed),
            Err(SaveOutcome::NeedsCredential) => {
                self.state.open_import_key_overlay();
                self.state.set_notice(Notice::info(
                    "A private key is required to save; enter the path to a .pem file",
                ));
            }
            Err(_) => {}
        }
    }

    fn run_pending_save(&mut self) {
        let Some(removed) = self.pending_save.take() else {
            return;
        };
        let dispatcher = ActionDispatcher::new(&self.storage, &self.repo, &self.keys);
        match dispatcher.finish_save(&mut self.state, removed) {
            Ok(SaveOutcome::Saved { removed }) => {
                for slug in &removed {
                    tracing::debug!(slug = slug.as_str(), "post removed");
                }
                match dispatcher.read_set() {
                    Ok(reads) => self.reads = reads,
                    Err(err) => tracing::warn!(?err, "failed to refresh read state"),
                }
            }
            Ok(_) => {}
            Err(err) => {
                tracing::error!(?err, "refreshing after save failed");
                self.state
                    .set_notice(Notice::error(format!("Saved, but reload failed: {err:#}")));
            }
        }
    }

    fn handle_reload(&mut self) {
        if self.state.is_editing() {
            self.state.set_notice(Notice::info(
                "Leave edit mode (e) before reloading, the draft would go stale",
            ));
            return;
        }
        let dispatcher = ActionDispatcher::new(&self.storage, &self.repo, &self.keys);
        match dispatcher.reload(&mut self.state) {
            Ok(()) => {
                let count = self.state.items().len();
                self.state
                    .set_notice(Notice::info(format!("Reloaded {count} posts")));
            }
            Err(err) => {
                tracing::error!(?err, "failed to reload blog index");
                self.state
                    .set_notice(Notice::error(format!("Failed to load posts: {err:#}")));
            }
        }
    }

    fn handle_overlay_key(&mut self, key: KeyEvent) -> bool {
        let plain = !key.modifiers.intersects(
            KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER,
        );
        let Some(overlay) = self.state.overlay_mut() else {
            return false;
        };
        let input = match overlay {
            OverlayState::Categories(input) | OverlayState::ImportKey(input) => input,
        };
        match key.code {
            KeyCode::Esc => {
                self.state.close_overlay();
            }
            KeyCode::Backspace => input.pop(),
            KeyCode::Char(ch) if plain => input.push(ch),
            KeyCode::Enter => {
                let value = input.take();
                self.submit_overlay(value);
            }
            _ => {}
        }
        true
    }

    fn submit_overlay(&mut self, value: String) {
        match self.state.overlay() {
            Some(OverlayState::Categories(_)) => {
                let name = value.trim().to_string();
                if self.state.add_category(&value) {
                    self.state
                        .set_notice(Notice::info(format!("Staged category \"{name}\"")));
                }
            }
            Some(OverlayState::ImportKey(_)) => {
                let path = expand_home(value.trim());
                if self.state.import_credential(&self.keys, &path) {
                    self.state.close_overlay();
                }
            }
            None => {}
        }
    }
}

fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(dirs) = directories::BaseDirs::new() {
            return dirs.home_dir().join(rest);
        }
    }
    PathBuf::from(raw)
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
        .context("switching to alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("creating terminal backend")?;
    terminal.hide_cursor().context("hiding cursor")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    terminal.show_cursor().ok();
    disable_raw_mode().context("disabling raw mode")?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )
    .context("restoring screen state")?;
    Ok(())
}
