use std::io::{self, stdout};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyModifiers,
    MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use ratatui::backend::CrosstermBackend;
use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Layout, Rect as UiRect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Paragraph, Widget};
use ratatui::{Frame, Terminal};
use tracing_subscriber::EnvFilter;

use tagsight::color::Rgb;
use tagsight::reconcile::HostEvent;
use tagsight::rows::RowView;
use tagsight::session::{HostRequest, PanelFrame, PanelSession, PANEL_TITLE};
use tagsight::vault::{self, FsVault};
use tagsight::PanelConfig;

/// Approximate pixel geometry of one terminal cell, used to map the
/// panel's layout space onto the grid.
const CELL_PX_X: f32 = 8.0;
const ROW_PITCH_PX: f32 = 30.0;
const PANEL_BG: (u8, u8, u8) = (18, 18, 20);

#[derive(Parser)]
#[command(name = "tagsight-tui", about = "Tag tree panel over a markdown vault")]
struct Args {
    /// Vault directory to index and watch.
    #[arg(default_value = ".")]
    vault: PathBuf,
    /// Config file; defaults to <vault>/.tagsight.json.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Append logs here; without it logging is off (the terminal is busy).
    #[arg(long)]
    log_file: Option<PathBuf>,
}

struct App {
    session: PanelSession<FsVault>,
    selected: usize,
    status: String,
    /// Rows of the last drawn frame, for key and mouse mapping.
    visible: Vec<RowView>,
    tree_area: Option<UiRect>,
    should_quit: bool,
}

impl App {
    fn new(session: PanelSession<FsVault>) -> Self {
        Self {
            session,
            selected: 0,
            status: String::from("ready"),
            visible: Vec::new(),
            tree_area: None,
            should_quit: false,
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        let now = Instant::now();
        self.session.note_input(now);

        if key.modifiers.contains(KeyModifiers::CONTROL) && matches!(key.code, KeyCode::Char('c')) {
            self.should_quit = true;
            return;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected = self.selected.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected + 1 < self.visible.len() {
                    self.selected += 1;
                }
            }
            KeyCode::Enter | KeyCode::Char(' ') | KeyCode::Right | KeyCode::Char('l') => {
                self.toggle_or_search(now);
            }
            KeyCode::Left | KeyCode::Char('h') => {
                if let Some(row) = self.visible.get(self.selected) {
                    if row.expanded {
                        let path = row.path.clone();
                        self.session.toggle(&path, now);
                    }
                }
            }
            KeyCode::Char('o') => self.search_selected(now),
            KeyCode::Char('y') => {
                if let Some(row) = self.visible.get(self.selected) {
                    let payload = self.session.drag_payload(&row.path);
                    self.status = format!("drag text: {}", payload.text);
                }
            }
            _ => {}
        }
    }

    fn on_mouse(&mut self, event: MouseEvent) {
        let now = Instant::now();
        self.session.note_input(now);

        match event.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                if let Some(i) = self.row_at(event.column, event.row) {
                    self.selected = i;
                    self.toggle_or_search(now);
                }
            }
            MouseEventKind::Down(MouseButton::Right) => {
                if let Some(i) = self.row_at(event.column, event.row) {
                    self.selected = i;
                    self.search_selected(now);
                }
            }
            MouseEventKind::ScrollUp => self.selected = self.selected.saturating_sub(1),
            MouseEventKind::ScrollDown => {
                if self.selected + 1 < self.visible.len() {
                    self.selected += 1;
                }
            }
            _ => {}
        }
    }

    /// Expand/collapse a branch; a leaf opens the tag search instead.
    fn toggle_or_search(&mut self, now: Instant) {
        let Some(row) = self.visible.get(self.selected) else {
            return;
        };
        if row.has_children {
            let path = row.path.clone();
            self.session.toggle(&path, now);
        } else {
            self.search_selected(now);
        }
    }

    fn search_selected(&mut self, now: Instant) {
        let Some(row) = self.visible.get(self.selected) else {
            return;
        };
        let path = row.path.clone();
        let HostRequest::OpenSearch { query } = self.session.activate(&path, now);
        self.status = format!("search: {query}");
    }

    fn row_at(&self, x: u16, y: u16) -> Option<usize> {
        let area = self.tree_area?;
        if x < area.x || x >= area.x.saturating_add(area.width) || y < area.y {
            return None;
        }
        let cell_y = y.checked_sub(area.y)?;
        self.visible
            .iter()
            .position(|row| (row.top / ROW_PITCH_PX).round() as u16 == cell_y)
    }

    fn drain_watcher(&mut self, rx: &Receiver<notify::Result<notify::Event>>) {
        loop {
            match rx.try_recv() {
                Ok(Ok(raw)) => {
                    let events = map_notify(self.session.store(), &raw);
                    let now = Instant::now();
                    for event in events {
                        self.session.handle_event(event, now);
                    }
                }
                Ok(Err(err)) => {
                    self.status = format!("watch error: {err}");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
    }
}

/// Translates a filesystem notification into panel events, settling the
/// vault cache for the touched paths first so the panel sees a cache that
/// already reflects the write.
fn map_notify(store: &FsVault, raw: &notify::Event) -> Vec<HostEvent> {
    use notify::event::{EventKind, ModifyKind, RenameMode};

    let rel = |p: &Path| -> Option<String> {
        if vault::is_markdown(p) {
            store.rel_path(p)
        } else {
            None
        }
    };

    match &raw.kind {
        EventKind::Create(_) => raw
            .paths
            .iter()
            .filter_map(|p| rel(p))
            .map(|path| {
                store.refresh_cache(&path);
                HostEvent::Created { path }
            })
            .collect(),
        EventKind::Remove(_) => raw
            .paths
            .iter()
            .filter_map(|p| rel(p))
            .map(|path| {
                store.evict(&path);
                HostEvent::Deleted { path }
            })
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if raw.paths.len() == 2 => {
            match (rel(&raw.paths[0]), rel(&raw.paths[1])) {
                (Some(old), Some(new)) => {
                    store.remap(&old, &new);
                    vec![HostEvent::Renamed { path: new, old_path: old }]
                }
                // renamed out of / into the markdown set
                (Some(old), None) => {
                    store.evict(&old);
                    vec![HostEvent::Deleted { path: old }]
                }
                (None, Some(new)) => {
                    store.refresh_cache(&new);
                    vec![HostEvent::Created { path: new }]
                }
                (None, None) => Vec::new(),
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => raw
            .paths
            .iter()
            .filter_map(|p| rel(p))
            .map(|path| {
                store.evict(&path);
                HostEvent::Deleted { path }
            })
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => raw
            .paths
            .iter()
            .filter_map(|p| rel(p))
            .map(|path| {
                store.refresh_cache(&path);
                HostEvent::Created { path }
            })
            .collect(),
        EventKind::Modify(_) => raw
            .paths
            .iter()
            .filter_map(|p| rel(p))
            .flat_map(|path| {
                store.refresh_cache(&path);
                [
                    HostEvent::Modified { path: path.clone() },
                    HostEvent::CacheChanged { path },
                ]
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn blend(c: Rgb, alpha: f32) -> Color {
    let mix = |fg: u8, bg: u8| (bg as f32 + (fg as f32 - bg as f32) * alpha).round() as u8;
    Color::Rgb(mix(c.r, PANEL_BG.0), mix(c.g, PANEL_BG.1), mix(c.b, PANEL_BG.2))
}

struct TreeWidget<'a> {
    frame: &'a PanelFrame,
    selected: Option<&'a str>,
}

impl Widget for TreeWidget<'_> {
    fn render(self, area: UiRect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 {
            return;
        }

        let bg = Color::Rgb(PANEL_BG.0, PANEL_BG.1, PANEL_BG.2);
        for y in area.y..area.y.saturating_add(area.height) {
            for x in area.x..area.x.saturating_add(area.width) {
                buf[(x, y)].set_char(' ').set_style(Style::default().bg(bg));
            }
        }

        // bars first, text over them
        let max_y = area.y.saturating_add(area.height);
        let max_x = area.x.saturating_add(area.width);
        for bar in &self.frame.bars {
            let alpha = (bar.alpha * self.frame.bar_alpha).clamp(0.0, 1.0);
            if alpha < 0.02 {
                continue;
            }
            let y = area.y.saturating_add((bar.top / ROW_PITCH_PX).round().max(0.0) as u16);
            if y >= max_y {
                continue;
            }
            let cells = ((bar.width * bar.scale) / CELL_PX_X).round() as u16;
            if cells == 0 {
                continue;
            }
            let x0 = area.x.saturating_add((bar.left / CELL_PX_X).round().max(0.0) as u16);
            let x1 = x0.saturating_add(cells).min(max_x);
            let fill = blend(bar.color, alpha);
            for x in x0..x1 {
                buf[(x, y)].set_bg(fill);
            }
        }

        let text_fg = if self.frame.idle {
            Color::Rgb(90, 90, 94)
        } else {
            Color::White
        };
        let muted = Color::Rgb(130, 130, 134);
        for row in &self.frame.rows {
            // rows inside a collapsing block clip away, drop them at half
            if row.clip < 0.5 {
                continue;
            }
            let y = area.y.saturating_add((row.top / ROW_PITCH_PX).round().max(0.0) as u16);
            if y >= max_y {
                continue;
            }
            let is_selected = self.selected.map(|s| s == row.path).unwrap_or(false);
            let arrow = if row.has_children {
                if row.expanded {
                    "▾ "
                } else {
                    "▸ "
                }
            } else {
                "  "
            };
            let label = format!("{arrow}{}", row.name);
            let fg = if is_selected { Color::Yellow } else { text_fg };
            let mut x = area.x.saturating_add((row.left / CELL_PX_X).round() as u16);
            for ch in label.chars() {
                if x >= max_x {
                    break;
                }
                let cell = buf[(x, y)].set_char(ch).set_fg(fg);
                if is_selected {
                    cell.set_style(Style::default().add_modifier(Modifier::BOLD));
                }
                x = x.saturating_add(1);
            }

            let count = row.count.to_string();
            let count_w = count.len() as u16;
            if max_x > area.x.saturating_add(count_w) {
                let mut x = max_x.saturating_sub(count_w).saturating_sub(1);
                for ch in count.chars() {
                    buf[(x, y)].set_char(ch).set_fg(muted);
                    x = x.saturating_add(1);
                }
            }
        }
    }
}

fn draw_ui(frame: &mut Frame, app: &mut App) {
    let root = frame.area();
    let outer = Block::default().title(format!(" {PANEL_TITLE} ")).borders(Borders::ALL);
    let inner = outer.inner(root);
    frame.render_widget(outer, root);

    let split = Layout::vertical([Constraint::Min(1), Constraint::Length(3)]).split(inner);
    let tree_area = split[0];
    let status_area = split[1];

    let now = Instant::now();
    app.session.set_viewport(tree_area.width as f32 * CELL_PX_X, now);
    let panel = app.session.frame(now);
    if app.selected >= panel.rows.len() {
        app.selected = panel.rows.len().saturating_sub(1);
    }
    app.visible = panel.rows.clone();
    app.tree_area = Some(tree_area);

    let selected_path = app.visible.get(app.selected).map(|r| r.path.clone());
    frame.render_widget(
        TreeWidget { frame: &panel, selected: selected_path.as_deref() },
        tree_area,
    );

    let lines = vec![
        Line::from(app.status.as_str()),
        Line::from("j/k move   enter toggle   o search   y drag   q quit"),
    ];
    frame.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::TOP)),
        status_area,
    );
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    session: PanelSession<FsVault>,
    fs_rx: Receiver<notify::Result<notify::Event>>,
) -> anyhow::Result<()> {
    let mut app = App::new(session);

    loop {
        app.drain_watcher(&fs_rx);
        app.session.tick(Instant::now());

        terminal.draw(|frame| draw_ui(frame, &mut app))?;

        if app.should_quit {
            app.session.dispose();
            break;
        }

        if event::poll(Duration::from_millis(33))? {
            match event::read()? {
                Event::Key(key) => app.on_key(key),
                Event::Mouse(mouse) => app.on_mouse(mouse),
                Event::Resize(_, _) => {}
                Event::FocusGained | Event::FocusLost | Event::Paste(_) => {}
            }
        }
    }

    Ok(())
}

fn init_tracing(log_file: Option<&Path>) -> anyhow::Result<()> {
    let Some(path) = log_file else {
        return Ok(());
    };
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_file.as_deref())?;

    let store = FsVault::open(&args.vault);
    let config_path = args.config.clone().unwrap_or_else(|| store.config_path());
    let config = PanelConfig::load_or_default(&config_path);

    let (fs_tx, fs_rx) = mpsc::channel();
    let mut watcher: RecommendedWatcher = notify::recommended_watcher(move |res| {
        let _ = fs_tx.send(res);
    })
    .context("create file watcher")?;
    watcher
        .watch(&args.vault, RecursiveMode::Recursive)
        .context("watch vault")?;

    let session = PanelSession::init(store, config, 42.0 * CELL_PX_X, Instant::now());

    enable_raw_mode()?;
    crossterm::execute!(stdout(), EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout());
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let result = run_app(&mut terminal, session, fs_rx);

    disable_raw_mode()?;
    crossterm::execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    result
}
