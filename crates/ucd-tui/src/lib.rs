use std::cell::Cell;
use std::io::{self, Stdout};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use tracing::{debug, info, warn};

use ucd_catalog::{load_catalog, SharedSource};
use ucd_core::{ControllerEvent, FilterController, Item, ItemCatalog};

const TICK_RATE: Duration = Duration::from_millis(200);
const SIDEBAR_WIDTH: u16 = 30;
const CARD_WIDTH: u16 = 32;
const CARD_HEIGHT: u16 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Search,
    Tags,
    Cards,
}

#[derive(Debug, Default, Clone)]
struct TextInput {
    content: String,
    // Counted in chars, not bytes.
    cursor: usize,
}

impl TextInput {
    fn byte_index(&self) -> usize {
        self.content
            .char_indices()
            .nth(self.cursor)
            .map_or(self.content.len(), |(index, _)| index)
    }

    fn char_len(&self) -> usize {
        self.content.chars().count()
    }

    fn insert(&mut self, c: char) {
        let index = self.byte_index();
        self.content.insert(index, c);
        self.cursor += 1;
    }

    fn delete_back(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let index = self.byte_index();
            self.content.remove(index);
        }
    }

    fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    fn move_right(&mut self) {
        if self.cursor < self.char_len() {
            self.cursor += 1;
        }
    }

    fn move_home(&mut self) {
        self.cursor = 0;
    }

    fn move_end(&mut self) {
        self.cursor = self.char_len();
    }
}

#[derive(Debug, Clone, Copy)]
enum Move {
    Up,
    Down,
    Left,
    Right,
    First,
    Last,
}

#[derive(Debug)]
struct App {
    controller: FilterController,
    focus: Focus,
    search: TextInput,
    tag_state: ListState,
    card_cursor: usize,
    // Written by the renderer, read by key handling.
    card_columns: Cell<usize>,
    loading: bool,
    show_help: bool,
    status: Option<String>,
    source_label: String,
    outcome: Option<String>,
}

impl App {
    fn new(source_label: impl Into<String>) -> Self {
        let mut controller = FilterController::new();
        controller.subscribe(|event: &ControllerEvent| debug!(?event, "controller event"));

        Self {
            controller,
            focus: Focus::Search,
            search: TextInput::default(),
            tag_state: ListState::default(),
            card_cursor: 0,
            card_columns: Cell::new(1),
            loading: true,
            show_help: false,
            status: None,
            source_label: source_label.into(),
            outcome: None,
        }
    }

    fn apply_catalog(&mut self, catalog: ItemCatalog) {
        let count = catalog.len();
        self.controller.replace_catalog(catalog);
        self.loading = false;
        self.status = Some(if count == 0 {
            "Catalog is empty".to_string()
        } else {
            format!("Loaded {count} items")
        });
        self.clamp_cursors();
    }

    fn next_focus(&mut self) {
        self.focus = match self.focus {
            Focus::Search => Focus::Tags,
            Focus::Tags => Focus::Cards,
            Focus::Cards => Focus::Search,
        };
    }

    fn prev_focus(&mut self) {
        self.focus = match self.focus {
            Focus::Search => Focus::Cards,
            Focus::Tags => Focus::Search,
            Focus::Cards => Focus::Tags,
        };
    }

    fn current_item_name(&self) -> Option<String> {
        self.controller
            .filtered_items()
            .get(self.card_cursor)
            .map(|item| item.name.clone())
    }

    fn highlighted_tag(&self) -> Option<String> {
        let index = self.tag_state.selected()?;
        self.controller.visible_tags().into_iter().nth(index)
    }

    fn clamp_cursors(&mut self) {
        let results = self.controller.result_count();
        if self.card_cursor >= results {
            self.card_cursor = results.saturating_sub(1);
        }

        let tags = self.controller.visible_tags().len();
        match self.tag_state.selected() {
            _ if tags == 0 => self.tag_state.select(None),
            None => self.tag_state.select(Some(0)),
            Some(i) if i >= tags => self.tag_state.select(Some(tags - 1)),
            Some(_) => {}
        }
    }

    fn sync_search(&mut self) {
        self.controller.set_search_text(&self.search.content);
        self.card_cursor = 0;
        self.clamp_cursors();
    }

    fn toggle_highlighted_tag(&mut self) {
        if let Some(tag) = self.highlighted_tag() {
            self.controller.toggle_tag(&tag);
            self.card_cursor = 0;
            self.clamp_cursors();
        }
    }

    fn reset_filters(&mut self) {
        self.controller.reset_filters();
        self.card_cursor = 0;
        self.clamp_cursors();
        self.status = Some("Filters reset".into());
    }

    fn select_current(&mut self) {
        if let Some(name) = self.current_item_name() {
            self.controller.select_item(&name);
            self.status = Some(if self.controller.is_selected(&name) {
                format!("Selected {name}")
            } else {
                format!("Deselected {name}")
            });
        }
    }

    /// Returns true when a selection was confirmed and the dashboard should close.
    fn confirm(&mut self) -> bool {
        let Some(name) = self.controller.confirm_selection() else {
            self.status = Some("Select an item before continuing".into());
            return false;
        };
        info!(%name, "selection confirmed");
        self.outcome = Some(name);
        true
    }

    /// Apply the loaded catalog once it arrives. A vanished loader counts as a failed load.
    fn poll_catalog(&mut self, catalog_rx: &Receiver<ItemCatalog>) {
        if !self.loading {
            return;
        }
        match catalog_rx.try_recv() {
            Ok(catalog) => self.apply_catalog(catalog),
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                warn!(source = %self.source_label, "catalog loader stopped without a result");
                self.apply_catalog(ItemCatalog::empty());
            }
        }
    }

    fn move_card(&mut self, movement: Move) {
        let len = self.controller.result_count();
        if len == 0 {
            return;
        }
        let columns = self.card_columns.get().max(1);
        let last = len - 1;
        self.card_cursor = match movement {
            Move::Left => self.card_cursor.saturating_sub(1),
            Move::Right => (self.card_cursor + 1).min(last),
            Move::Up => self.card_cursor.saturating_sub(columns),
            Move::Down if self.card_cursor + columns <= last => self.card_cursor + columns,
            Move::Down => self.card_cursor,
            Move::First => 0,
            Move::Last => last,
        };
    }

    fn move_tag(&mut self, movement: Move) {
        let len = self.controller.visible_tags().len();
        if len == 0 {
            self.tag_state.select(None);
            return;
        }
        let i = self.tag_state.selected().unwrap_or(0);
        let next = match movement {
            Move::Up | Move::Left => {
                if i == 0 {
                    len - 1
                } else {
                    i - 1
                }
            }
            Move::Down | Move::Right => {
                if i + 1 >= len {
                    0
                } else {
                    i + 1
                }
            }
            Move::First => 0,
            Move::Last => len - 1,
        };
        self.tag_state.select(Some(next));
    }
}

/// Run the dashboard until the user quits or confirms a selection.
///
/// The catalog is loaded in the background; the returned value is the
/// confirmed item name, if any.
pub fn run(source: SharedSource) -> Result<Option<String>> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to initialize runtime")?;

    let mut app = App::new(source.describe());
    let (sender, catalog_rx) = mpsc::channel();
    runtime.spawn(async move {
        let catalog = load_catalog(source).await;
        let _ = sender.send(catalog);
    });

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut terminal, &mut app, &catalog_rx);
    restore_terminal(terminal)?;
    result?;

    Ok(app.outcome.take())
}

fn event_loop(
    terminal: &mut Terminal<ratatui::backend::CrosstermBackend<Stdout>>,
    app: &mut App,
    catalog_rx: &Receiver<ItemCatalog>,
) -> Result<()> {
    let mut last_tick = Instant::now();

    loop {
        app.poll_catalog(catalog_rx);

        terminal.draw(|frame| render_app(frame, app))?;

        let timeout = TICK_RATE.saturating_sub(last_tick.elapsed());
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && handle_key(app, key) {
                    return Ok(());
                }
            }
        }

        if last_tick.elapsed() >= TICK_RATE {
            last_tick = Instant::now();
        }
    }
}

fn handle_key(app: &mut App, key: KeyEvent) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return true;
    }
    if app.show_help {
        app.show_help = false;
        return false;
    }

    match app.focus {
        Focus::Search => handle_search_input(app, key),
        Focus::Tags => handle_tags_input(app, key),
        Focus::Cards => handle_cards_input(app, key),
    }
}

fn handle_search_input(app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Esc | KeyCode::Enter => app.focus = Focus::Cards,
        KeyCode::Tab => app.next_focus(),
        KeyCode::BackTab => app.prev_focus(),
        KeyCode::Char('a') if key.modifiers.contains(KeyModifiers::CONTROL) => app.search.move_home(),
        KeyCode::Char('e') if key.modifiers.contains(KeyModifiers::CONTROL) => app.search.move_end(),
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.search = TextInput::default();
            app.sync_search();
        }
        KeyCode::Char(c) => {
            app.search.insert(c);
            app.sync_search();
        }
        KeyCode::Backspace => {
            app.search.delete_back();
            app.sync_search();
        }
        KeyCode::Left => app.search.move_left(),
        KeyCode::Right => app.search.move_right(),
        KeyCode::Home => app.search.move_home(),
        KeyCode::End => app.search.move_end(),
        _ => {}
    }
    false
}

fn handle_tags_input(app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Up | KeyCode::Char('k') => app.move_tag(Move::Up),
        KeyCode::Down | KeyCode::Char('j') => app.move_tag(Move::Down),
        KeyCode::Home | KeyCode::Char('g') => app.move_tag(Move::First),
        KeyCode::End | KeyCode::Char('G') => app.move_tag(Move::Last),
        KeyCode::Char(' ') | KeyCode::Enter => app.toggle_highlighted_tag(),
        _ => return handle_common_key(app, key),
    }
    false
}

fn handle_cards_input(app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Up | KeyCode::Char('k') => app.move_card(Move::Up),
        KeyCode::Down | KeyCode::Char('j') => app.move_card(Move::Down),
        KeyCode::Left | KeyCode::Char('h') => app.move_card(Move::Left),
        KeyCode::Right | KeyCode::Char('l') => app.move_card(Move::Right),
        KeyCode::Home | KeyCode::Char('g') => app.move_card(Move::First),
        KeyCode::End | KeyCode::Char('G') => app.move_card(Move::Last),
        KeyCode::Char(' ') | KeyCode::Enter => app.select_current(),
        _ => return handle_common_key(app, key),
    }
    false
}

fn handle_common_key(app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => return true,
        KeyCode::Tab => app.next_focus(),
        KeyCode::BackTab => app.prev_focus(),
        KeyCode::Char('/') => app.focus = Focus::Search,
        KeyCode::Char('?') => app.show_help = true,
        KeyCode::Char('r') => app.reset_filters(),
        KeyCode::Char('c') => return app.confirm(),
        _ => {}
    }
    false
}

fn render_app(frame: &mut Frame, app: &App) {
    let size = frame.size();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0), Constraint::Length(3)].as_ref())
        .split(size);

    render_header(frame, chunks[0], app);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(0)].as_ref())
        .split(chunks[1]);
    render_sidebar(frame, body[0], app);
    render_content(frame, body[1], app);

    render_footer(frame, chunks[2], app);

    if app.show_help {
        render_help_popup(frame, size, help_text());
    }
}

fn render_header(frame: &mut Frame, area: Rect, app: &App) {
    let mut spans = vec![Span::styled(
        app.source_label.clone(),
        Style::default().fg(Color::DarkGray),
    )];
    if let Some(status) = &app.status {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(status.clone(), Style::default().fg(Color::Cyan)));
    }
    let header = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).title("Use-Case Dashboard"));
    frame.render_widget(header, area);
}

fn focus_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    }
}

fn render_sidebar(frame: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0), Constraint::Length(3)].as_ref())
        .split(area);

    let search_focused = app.focus == Focus::Search;
    let search = Paragraph::new(app.search.content.as_str()).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Search")
            .border_style(focus_style(search_focused)),
    );
    frame.render_widget(search, chunks[0]);
    if search_focused {
        let cursor = u16::try_from(app.search.cursor).unwrap_or(u16::MAX);
        let cx = chunks[0].x + 1 + cursor.min(chunks[0].width.saturating_sub(3));
        frame.set_cursor(cx, chunks[0].y + 1);
    }

    let items = app
        .controller
        .visible_tags()
        .into_iter()
        .map(|tag| {
            let active = app.controller.is_tag_active(&tag);
            let checkbox = if active { "[x]" } else { "[ ]" };
            let style = if active {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(format!("{checkbox} {tag}")).style(style)
        })
        .collect::<Vec<_>>();
    let tags = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Filters")
                .border_style(focus_style(app.focus == Focus::Tags)),
        )
        .highlight_style(if app.focus == Focus::Tags {
            Style::default().bg(Color::DarkGray)
        } else {
            Style::default()
        });
    frame.render_stateful_widget(tags, chunks[1], &mut app.tag_state.clone());

    let reset = Paragraph::new("Reset Filters (r)")
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(reset, chunks[2]);
}

fn render_content(frame: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(0)].as_ref())
        .split(area);

    let count = app.controller.result_count();
    let info = Paragraph::new(format!(
        " {count} {}",
        if count == 1 { "result" } else { "results" }
    ));
    frame.render_widget(info, chunks[0]);

    let grid = chunks[1];
    if app.loading {
        let loading = Paragraph::new("Loading catalog…")
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(loading, grid);
        return;
    }
    if count == 0 {
        let empty = Paragraph::new("No items match the current filters.")
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(empty, grid);
        return;
    }

    render_card_grid(frame, grid, app);
}

fn card_columns(width: u16) -> usize {
    usize::from((width / CARD_WIDTH).max(1))
}

fn render_card_grid(frame: &mut Frame, area: Rect, app: &App) {
    let columns = card_columns(area.width);
    app.card_columns.set(columns);

    let visible_rows = usize::from((area.height / CARD_HEIGHT).max(1));
    let cursor_row = app.card_cursor / columns;
    let first_row = (cursor_row + 1).saturating_sub(visible_rows);

    // `columns` is at most `area.width`, so it fits in u16.
    let card_width = area.width / u16::try_from(columns).unwrap_or(1);
    let cards_focused = app.focus == Focus::Cards;

    for (index, item) in app.controller.filtered_items().into_iter().enumerate() {
        let row = index / columns;
        if row < first_row {
            continue;
        }
        let row_offset = u16::try_from(row - first_row).unwrap_or(u16::MAX);
        let column = u16::try_from(index % columns).unwrap_or(0);
        let y = area.y.saturating_add(row_offset.saturating_mul(CARD_HEIGHT));
        if y.saturating_add(CARD_HEIGHT) > area.bottom() && row > first_row {
            break;
        }
        let card_area = Rect {
            x: area.x + column * card_width,
            y,
            width: card_width,
            height: CARD_HEIGHT.min(area.bottom().saturating_sub(y)),
        };
        render_card(
            frame,
            card_area,
            item,
            app.controller.is_selected(&item.name),
            cards_focused && index == app.card_cursor,
        );
    }
}

/// Draw one item card. Selected cards get a thick border, the highlighted card a yellow one.
fn render_card(frame: &mut Frame, area: Rect, item: &Item, selected: bool, highlighted: bool) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(if selected { BorderType::Thick } else { BorderType::Plain })
        .border_style(focus_style(highlighted))
        .title(Span::styled(
            item.name.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        ));
    let inner = block.inner(area);
    frame.render_widget(block, area);
    if inner.height < 3 || inner.width == 0 {
        return;
    }

    let row = |y: u16| Rect {
        x: inner.x,
        y,
        width: inner.width,
        height: 1,
    };
    let button_y = inner.bottom() - 2;
    let link_y = inner.bottom() - 1;

    let image = Paragraph::new(format!("img: {}", item.image))
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(image, row(inner.y));

    let description_area = Rect {
        x: inner.x,
        y: inner.y + 1,
        width: inner.width,
        height: button_y.saturating_sub(inner.y + 1),
    };
    let description = Paragraph::new(item.description.as_str()).wrap(Wrap { trim: true });
    frame.render_widget(description, description_area);

    let (label, button_style) = if selected {
        (
            "[ Selected ]",
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        )
    } else {
        ("[ Select ]", Style::default())
    };
    frame.render_widget(Paragraph::new(label).style(button_style), row(button_y));

    if let Some(link) = &item.demo_link {
        let demo = Paragraph::new(format!("Demo: {link}")).style(
            Style::default()
                .fg(Color::Blue)
                .add_modifier(Modifier::UNDERLINED),
        );
        frame.render_widget(demo, row(link_y));
    }
}

fn render_footer(frame: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(0), Constraint::Length(16)].as_ref())
        .split(area);

    let spans: Vec<Span> = key_hints(app)
        .iter()
        .flat_map(|(key, desc)| {
            vec![
                Span::styled(
                    format!(" [{key}] "),
                    Style::default().add_modifier(Modifier::BOLD).fg(Color::Cyan),
                ),
                Span::raw(format!("{desc}  ")),
            ]
        })
        .collect();
    let guide = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).title("Guide"));
    frame.render_widget(guide, chunks[0]);

    let style = if app.controller.can_confirm() {
        Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let button = Paragraph::new("Continue (c)")
        .alignment(Alignment::Center)
        .style(style)
        .block(Block::default().borders(Borders::ALL).border_style(style));
    frame.render_widget(button, chunks[1]);
}

fn key_hints(app: &App) -> Vec<(&'static str, &'static str)> {
    if app.show_help {
        return vec![("any", "Close Help")];
    }
    match app.focus {
        Focus::Search => vec![("type", "Search"), ("Enter", "Cards"), ("Tab", "Next"), ("^U", "Clear")],
        Focus::Tags => vec![
            ("q", "Quit"),
            ("?", "Help"),
            ("↑/↓", "Nav"),
            ("Space", "Toggle"),
            ("r", "Reset"),
            ("Tab", "Next"),
        ],
        Focus::Cards => vec![
            ("q", "Quit"),
            ("?", "Help"),
            ("←↑↓→", "Nav"),
            ("Enter", "Select"),
            ("c", "Continue"),
            ("/", "Search"),
        ],
    }
}

fn help_text() -> &'static str {
    "tab / shift-tab: move between search, filters and cards\n\
     /: jump to search\n\
     space: toggle the highlighted tag or card\n\
     r: reset tag filters (search is kept)\n\
     c: continue with the selected item\n\
     q / esc: quit"
}

fn render_help_popup(frame: &mut Frame, area: Rect, content: &str) {
    let popup_area = centered_rect(70, 40, area);
    frame.render_widget(Clear, popup_area);
    let block = Block::default().borders(Borders::ALL).title("Help");
    let help = Paragraph::new(content).block(block).wrap(Wrap { trim: true });
    frame.render_widget(help, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Percentage((100 - percent_y) / 2),
                Constraint::Percentage(percent_y),
                Constraint::Percentage((100 - percent_y) / 2),
            ]
            .as_ref(),
        )
        .split(r);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Percentage((100 - percent_x) / 2),
                Constraint::Percentage(percent_x),
                Constraint::Percentage((100 - percent_x) / 2),
            ]
            .as_ref(),
        )
        .split(popup_layout[1])[1]
}

fn restore_terminal(mut terminal: Terminal<ratatui::backend::CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::backend::TestBackend;
    use ucd_core::Tag;

    fn item(name: &str, description: &str, tags: &[&str]) -> Item {
        let tags = tags.iter().map(|tag| Tag::new(*tag).unwrap()).collect();
        Item::new(name, description, format!("images/{}.png", name.to_lowercase()), tags).unwrap()
    }

    fn loaded_app() -> App {
        let mut app = App::new("test catalog");
        app.apply_catalog(ItemCatalog::new(vec![
            item("A", "first", &["x", "y"]),
            item("B", "second", &["y"]),
            item("C", "third", &["z"]),
        ]));
        app
    }

    fn press(app: &mut App, code: KeyCode) -> bool {
        handle_key(app, KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    fn filtered_names(app: &App) -> Vec<String> {
        app.controller
            .filtered_items()
            .iter()
            .map(|item| item.name.clone())
            .collect()
    }

    fn buffer_to_string(buffer: &ratatui::buffer::Buffer) -> String {
        let mut lines = Vec::new();
        for y in 0..buffer.area.height {
            let mut line = String::new();
            for x in 0..buffer.area.width {
                let cell = buffer.get(x, y);
                line.push_str(cell.symbol());
            }
            lines.push(line.trim_end().to_string());
        }
        lines.join("\n")
    }

    fn draw(app: &App, width: u16, height: u16) -> String {
        let backend = TestBackend::new(width, height);
        let mut terminal = Terminal::new(backend).expect("terminal");
        terminal
            .draw(|frame| render_app(frame, app))
            .expect("render");
        buffer_to_string(terminal.backend().buffer())
    }

    #[test]
    fn card_snapshot() {
        let backend = TestBackend::new(28, 8);
        let mut terminal = Terminal::new(backend).expect("terminal");
        let blog = item("Blog", "Write posts", &["personal"]);

        terminal
            .draw(|frame| {
                let area = frame.size();
                render_card(frame, area, &blog, false, false);
            })
            .expect("render");

        insta::assert_snapshot!(buffer_to_string(terminal.backend().buffer()), @r###"
        ┌Blog──────────────────────┐
        │img: images/blog.png      │
        │Write posts               │
        │                          │
        │                          │
        │[ Select ]                │
        │                          │
        └──────────────────────────┘
        "###);
    }

    #[test]
    fn selected_card_with_demo_link_snapshot() {
        let backend = TestBackend::new(28, 8);
        let mut terminal = Terminal::new(backend).expect("terminal");
        let blog = item("Blog", "Write posts", &["personal"])
            .with_demo_link(Some("https://x.io".into()));

        terminal
            .draw(|frame| {
                let area = frame.size();
                render_card(frame, area, &blog, true, false);
            })
            .expect("render");

        insta::assert_snapshot!(buffer_to_string(terminal.backend().buffer()), @r###"
        ┏Blog━━━━━━━━━━━━━━━━━━━━━━┓
        ┃img: images/blog.png      ┃
        ┃Write posts               ┃
        ┃                          ┃
        ┃                          ┃
        ┃[ Selected ]              ┃
        ┃Demo: https://x.io        ┃
        ┗━━━━━━━━━━━━━━━━━━━━━━━━━━┛
        "###);
    }

    #[test]
    fn dashboard_shows_loading_until_catalog_arrives() {
        let app = App::new("test catalog");
        let screen = draw(&app, 100, 30);
        assert!(screen.contains("Loading catalog…"));
        assert!(screen.contains("0 results"));
    }

    #[test]
    fn dashboard_renders_tags_cards_and_count() {
        let app = loaded_app();
        let screen = draw(&app, 100, 30);
        assert!(screen.contains("3 results"));
        assert!(screen.contains("[ ] x"));
        assert!(screen.contains("[ ] y"));
        assert!(screen.contains("[ ] z"));
        assert!(screen.contains("┌A"));
        assert!(screen.contains("┌C"));
        assert!(screen.contains("Continue (c)"));
    }

    #[test]
    fn dropped_loader_ends_loading_with_empty_catalog() {
        let mut app = App::new("test catalog");
        let (sender, catalog_rx) = mpsc::channel::<ItemCatalog>();

        app.poll_catalog(&catalog_rx);
        assert!(app.loading);

        drop(sender);
        app.poll_catalog(&catalog_rx);
        assert!(!app.loading);
        assert_eq!(app.status.as_deref(), Some("Catalog is empty"));
        assert!(!draw(&app, 100, 30).contains("Loading catalog…"));
    }

    #[test]
    fn empty_catalog_renders_placeholder() {
        let mut app = App::new("broken.json");
        app.apply_catalog(ItemCatalog::empty());
        let screen = draw(&app, 100, 30);
        assert!(screen.contains("No items match the current filters."));
        assert_eq!(app.status.as_deref(), Some("Catalog is empty"));
    }

    #[test]
    fn typing_filters_cards_and_tags() {
        let mut app = loaded_app();
        type_text(&mut app, "B");
        assert_eq!(app.controller.search_text(), "b");
        assert_eq!(filtered_names(&app), vec!["B"]);

        press(&mut app, KeyCode::Backspace);
        assert_eq!(filtered_names(&app), vec!["A", "B", "C"]);
    }

    #[test]
    fn space_toggles_highlighted_tag() {
        let mut app = loaded_app();
        press(&mut app, KeyCode::Tab);
        assert_eq!(app.focus, Focus::Tags);

        press(&mut app, KeyCode::Down);
        assert_eq!(app.highlighted_tag().as_deref(), Some("y"));
        press(&mut app, KeyCode::Char(' '));
        assert_eq!(filtered_names(&app), vec!["A", "B"]);

        let screen = draw(&app, 100, 30);
        assert!(screen.contains("[x] y"));
        assert!(screen.contains("2 results"));

        press(&mut app, KeyCode::Char(' '));
        assert!(app.controller.active_tags().is_empty());
    }

    #[test]
    fn reset_unchecks_tags_and_keeps_search() {
        let mut app = loaded_app();
        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Char(' '));
        press(&mut app, KeyCode::BackTab);
        type_text(&mut app, "b");
        assert_eq!(app.controller.visible_tags(), vec!["y"]);

        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Char('r'));

        assert!(app.controller.active_tags().is_empty());
        assert_eq!(app.search.content, "b");
        assert_eq!(filtered_names(&app), vec!["B"]);
        assert!(!draw(&app, 100, 30).contains("[x]"));
    }

    #[test]
    fn select_and_confirm_returns_outcome() {
        let mut app = loaded_app();
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.focus, Focus::Cards);

        press(&mut app, KeyCode::Right);
        press(&mut app, KeyCode::Enter);
        assert!(app.controller.is_selected("B"));

        assert!(press(&mut app, KeyCode::Char('c')));
        assert_eq!(app.outcome.as_deref(), Some("B"));
    }

    #[test]
    fn confirm_closes_even_with_extra_listeners() {
        let mut app = loaded_app();
        app.controller.subscribe(|_: &ControllerEvent| {});
        app.controller.select_item("C");

        assert!(app.confirm());
        assert_eq!(app.outcome.as_deref(), Some("C"));
    }

    #[test]
    fn confirm_is_disabled_without_selection() {
        let mut app = loaded_app();
        press(&mut app, KeyCode::Enter);

        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Enter);
        assert!(!app.controller.can_confirm());

        assert!(!press(&mut app, KeyCode::Char('c')));
        assert_eq!(app.outcome, None);
        assert_eq!(app.status.as_deref(), Some("Select an item before continuing"));
    }

    #[test]
    fn card_cursor_stays_within_filtered_results() {
        let mut app = loaded_app();
        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::End);
        assert_eq!(app.card_cursor, 2);

        press(&mut app, KeyCode::Char('/'));
        type_text(&mut app, "a");
        assert_eq!(app.card_cursor, 0);
        assert_eq!(app.current_item_name().as_deref(), Some("A"));
    }

    #[test]
    fn text_input_handles_multibyte_chars() {
        let mut input = TextInput::default();
        for c in "héllo".chars() {
            input.insert(c);
        }
        input.move_left();
        input.move_left();
        input.move_left();
        input.delete_back();
        assert_eq!(input.content, "hllo");
        input.move_end();
        assert_eq!(input.cursor, 4);
    }
}
