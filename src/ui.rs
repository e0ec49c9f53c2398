use crate::color::TaskColor;
use crate::commands::{default_export_path, write_export};
use crate::config::{Config, Theme};
use crate::grid::{fit, on_color, GridGeometry, GridView};
use crate::interaction::{Cell, DragState, GridContext, Intent, PointerEvent, TaskProposal};
use crate::model::{Day, Orientation, Schedule, Task, TaskDraft, TaskId, TimeOfDay};
use crate::storage::{Loaded, ScheduleEntry, Store};
use anyhow::{anyhow, bail, Result};
use chrono::Datelike;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::{Alignment, Color, Modifier, Rect, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Terminal;
use std::io::{stdout, Stdout};
use std::path::PathBuf;
use std::time::{Duration, Instant};

pub fn run(config: &Config, store: Store, entry: ScheduleEntry, loaded: Loaded) -> Result<()> {
    let mut terminal = setup_terminal()?;
    let mut app = App::new(config, store, entry, loaded);
    let result = app.event_loop(&mut terminal);
    teardown_terminal(&mut terminal)?;
    result
}

struct App {
    store: Store,
    entry: ScheduleEntry,
    schedule: Schedule,
    theme: Theme,
    hold: Duration,
    default_color: TaskColor,
    /// `(visible day index, hour index)`.
    cursor: (usize, usize),
    drag: DragState,
    /// Grid placement from the last draw, for mouse hit-testing.
    geometry: Option<GridGeometry>,
    last_save: Instant,
    status: String,
    mode: Mode,
}

enum Mode {
    Normal,
    Actions {
        cell: Cell,
        items: Vec<ActionItem>,
        selected: usize,
    },
    Creating(TaskForm),
    Editing {
        task_id: TaskId,
        form: TaskForm,
    },
    ConfirmDelete {
        task_id: TaskId,
    },
    Prompt {
        kind: PromptKind,
        field: FieldValue,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum ActionItem {
    Edit(TaskId),
    Delete(TaskId),
    Create,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum PromptKind {
    AddHour,
    RemoveHour,
    Rename,
    Export,
}

impl PromptKind {
    fn title(self) -> &'static str {
        match self {
            PromptKind::AddHour => "Add Hour",
            PromptKind::RemoveHour => "Remove Hour",
            PromptKind::Rename => "Rename Schedule",
            PromptKind::Export => "Export Grid",
        }
    }

    fn label(self) -> &'static str {
        match self {
            PromptKind::AddHour | PromptKind::RemoveHour => "Hour (HH:MM)",
            PromptKind::Rename => "Name",
            PromptKind::Export => "File",
        }
    }
}

struct TaskForm {
    name: FieldValue,
    days: FieldValue,
    start: FieldValue,
    end: FieldValue,
    color: FieldValue,
    field: FormField,
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum FormField {
    Name,
    Days,
    Start,
    End,
    Color,
}

enum FormAction {
    Create,
    Edit(TaskId),
}

#[derive(Clone)]
struct FieldValue {
    value: String,
    cursor: usize,
}

impl FieldValue {
    fn new(value: &str) -> Self {
        FieldValue {
            value: value.to_string(),
            cursor: value.len(),
        }
    }

    fn move_left(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor = prev_grapheme(self.cursor, &self.value);
    }

    fn move_right(&mut self) {
        if self.cursor >= self.value.len() {
            return;
        }
        self.cursor = next_grapheme(self.cursor, &self.value);
    }

    fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let prev = prev_grapheme(self.cursor, &self.value);
        self.value.drain(prev..self.cursor);
        self.cursor = prev;
    }

    fn insert_char(&mut self, ch: char) {
        self.value.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
    }

    fn with_caret(&self) -> String {
        let mut text = self.value.clone();
        text.insert_str(self.cursor, "▌");
        text
    }
}

impl App {
    fn new(config: &Config, store: Store, entry: ScheduleEntry, loaded: Loaded) -> Self {
        let status = match loaded.recovered {
            Some(notice) => notice,
            None => format!("Loaded {} from {}", entry.name, store.root().display()),
        };
        App {
            store,
            entry,
            schedule: loaded.schedule,
            theme: config.theme,
            hold: config.drag_hold(),
            default_color: config.defaults.color,
            cursor: (0, 0),
            drag: DragState::Idle,
            geometry: None,
            last_save: Instant::now(),
            status,
            mode: Mode::Normal,
        }
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        loop {
            terminal.draw(|f| self.draw(f))?;
            let timeout = if self.drag.is_idle() {
                Duration::from_millis(200)
            } else {
                Duration::from_millis(30)
            };
            if event::poll(timeout)? {
                match event::read()? {
                    Event::Key(key) => {
                        if key.kind != KeyEventKind::Press {
                            continue;
                        }
                        if self.handle_key(key)? {
                            break;
                        }
                    }
                    Event::Mouse(mouse) => self.handle_mouse(mouse),
                    _ => {}
                }
            }
            if !self.drag.is_idle() {
                self.pointer(PointerEvent::Tick);
            }
        }
        Ok(())
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        if !matches!(self.mode, Mode::Normal) {
            return;
        }
        let Some(geometry) = &self.geometry else {
            return;
        };
        let cell = geometry.cell_at(mouse.column, mouse.row);
        let event = match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => match cell {
                Some(cell) => PointerEvent::Down(cell),
                None => return,
            },
            MouseEventKind::Drag(MouseButton::Left) => match cell {
                Some(cell) => PointerEvent::Enter(cell),
                None => PointerEvent::Leave,
            },
            MouseEventKind::Up(MouseButton::Left) => PointerEvent::Up(cell),
            _ => return,
        };
        if let Some(cell) = cell {
            self.focus_cell(cell);
        }
        self.pointer(event);
    }

    fn pointer(&mut self, event: PointerEvent) {
        let grid = GridContext::new(&self.schedule, self.hold);
        let transition = self.drag.handle(event, Instant::now(), &grid);
        self.drag = transition.state;
        if let Some(intent) = transition.intent {
            self.apply_intent(intent);
        }
    }

    fn apply_intent(&mut self, intent: Intent) {
        match intent {
            Intent::Inspect { cell, tasks } => {
                let mut items = Vec::with_capacity(tasks.len() * 2 + 1);
                for id in &tasks {
                    items.push(ActionItem::Edit(id.clone()));
                    items.push(ActionItem::Delete(id.clone()));
                }
                items.push(ActionItem::Create);
                self.status = format!(
                    "{} task(s) at {} {} (Enter to choose, Esc to close)",
                    tasks.len(),
                    cell.day,
                    cell.hour
                );
                self.mode = Mode::Actions {
                    cell,
                    items,
                    selected: 0,
                };
            }
            Intent::Propose(proposal) => {
                self.status = format!(
                    "New task on {} {}-{} (Tab moves, Enter saves, Esc cancels)",
                    day_list(&proposal.days),
                    proposal.start,
                    proposal.end
                );
                self.mode = Mode::Creating(TaskForm::from_proposal(&proposal, self.default_color));
            }
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        match self.mode {
            Mode::Normal => self.handle_normal_key(key),
            Mode::Actions { .. } => self.handle_actions_key(key),
            Mode::Creating(_) | Mode::Editing { .. } => self.handle_form_key(key),
            Mode::ConfirmDelete { .. } => self.handle_confirm_key(key),
            Mode::Prompt { .. } => self.handle_prompt_key(key),
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> Result<bool> {
        match key.code {
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Esc => {
                if !self.drag.is_idle() {
                    self.drag = DragState::Idle;
                    self.status = "Selection canceled".into();
                }
            }
            KeyCode::Left | KeyCode::Char('h') => self.move_cursor(-1, 0),
            KeyCode::Right | KeyCode::Char('l') => self.move_cursor(1, 0),
            KeyCode::Up | KeyCode::Char('k') => self.move_cursor(0, -1),
            KeyCode::Down | KeyCode::Char('j') => self.move_cursor(0, 1),
            KeyCode::Enter | KeyCode::Char(' ') => self.click_cursor(),
            KeyCode::Char('n') => match self.cursor_cell() {
                Some(cell) => self.apply_intent(Intent::Propose(single_cell(cell))),
                None => self.status = "No visible cell (show a day with 1-7)".into(),
            },
            KeyCode::Char('e') => match self.first_task_at_cursor() {
                Some(id) => self.open_edit(&id),
                None => self.status = "No task at the cursor to edit".into(),
            },
            KeyCode::Char('d') => match self.first_task_at_cursor() {
                Some(id) => self.confirm_delete(id),
                None => self.status = "No task at the cursor to delete".into(),
            },
            KeyCode::Char(c @ '1'..='7') => {
                let day = Day::ALL[(c as u8 - b'1') as usize];
                self.commit_or_report(|schedule| {
                    let shown = schedule.toggle_day(day);
                    Ok(format!("{} {}", day, if shown { "shown" } else { "hidden" }))
                });
                self.clamp_cursor();
            }
            KeyCode::Char('+') | KeyCode::Char('a') => self.open_prompt(PromptKind::AddHour, ""),
            KeyCode::Char('-') => {
                let current = self
                    .cursor_cell()
                    .map(|c| c.hour.to_string())
                    .unwrap_or_default();
                self.open_prompt(PromptKind::RemoveHour, &current);
            }
            KeyCode::Char('o') => {
                let layout = self.schedule.layout.toggled();
                self.drag = DragState::Idle;
                self.commit_or_report(|schedule| {
                    schedule.set_layout(layout);
                    Ok(format!("Switched to {} layout", layout.label()))
                });
            }
            KeyCode::Char('r') => {
                let name = self.schedule.name.clone();
                self.open_prompt(PromptKind::Rename, &name);
            }
            KeyCode::Char('x') => {
                let path = default_export_path(&self.schedule);
                self.open_prompt(PromptKind::Export, &path.display().to_string());
            }
            _ => {}
        }
        Ok(false)
    }

    fn handle_actions_key(&mut self, key: KeyEvent) -> Result<bool> {
        let (cell, item, len, selected) = match &self.mode {
            Mode::Actions {
                cell,
                items,
                selected,
            } => (*cell, items.get(*selected).cloned(), items.len(), *selected),
            _ => return Ok(false),
        };
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.select_action(selected.saturating_sub(1)),
            KeyCode::Down | KeyCode::Char('j') => {
                self.select_action((selected + 1).min(len.saturating_sub(1)))
            }
            KeyCode::Esc | KeyCode::Char('q') => {
                self.mode = Mode::Normal;
                self.status = "Closed".into();
            }
            KeyCode::Enter => {
                self.mode = Mode::Normal;
                match item {
                    Some(ActionItem::Edit(id)) => self.open_edit(&id),
                    Some(ActionItem::Delete(id)) => self.confirm_delete(id),
                    Some(ActionItem::Create) => {
                        self.apply_intent(Intent::Propose(single_cell(cell)))
                    }
                    None => {}
                }
            }
            _ => {}
        }
        Ok(false)
    }

    fn select_action(&mut self, idx: usize) {
        if let Mode::Actions { selected, .. } = &mut self.mode {
            *selected = idx;
        }
    }

    fn handle_form_key(&mut self, key: KeyEvent) -> Result<bool> {
        let mut close_form = false;
        let mut mode = std::mem::replace(&mut self.mode, Mode::Normal);
        match &mut mode {
            Mode::Creating(form) => {
                close_form = self.process_form_key(FormAction::Create, form, key)?;
            }
            Mode::Editing { task_id, form } => {
                let id = task_id.clone();
                close_form = self.process_form_key(FormAction::Edit(id), form, key)?;
            }
            _ => {}
        }
        self.mode = if close_form { Mode::Normal } else { mode };
        Ok(false)
    }

    fn handle_confirm_key(&mut self, key: KeyEvent) -> Result<bool> {
        let task_id = match &self.mode {
            Mode::ConfirmDelete { task_id } => task_id.clone(),
            _ => return Ok(false),
        };
        match key.code {
            KeyCode::Char('y') | KeyCode::Enter => {
                let name = self.schedule.task(&task_id).map(|t| t.name.clone());
                match name {
                    Some(name) => self.commit_or_report(|schedule| {
                        schedule.delete_task(&task_id);
                        Ok(format!("Deleted {}", name))
                    }),
                    None => self.status = format!("Task {} no longer exists", task_id),
                }
                self.mode = Mode::Normal;
            }
            KeyCode::Char('n') | KeyCode::Esc => {
                self.status = "Delete canceled".into();
                self.mode = Mode::Normal;
            }
            _ => {}
        }
        Ok(false)
    }

    fn handle_prompt_key(&mut self, key: KeyEvent) -> Result<bool> {
        let Mode::Prompt { kind, field } = &mut self.mode else {
            return Ok(false);
        };
        let kind = *kind;
        match key.code {
            KeyCode::Esc => {
                self.mode = Mode::Normal;
                self.status = "Canceled".into();
            }
            KeyCode::Left => field.move_left(),
            KeyCode::Right => field.move_right(),
            KeyCode::Backspace => field.backspace(),
            KeyCode::Char(c) => {
                if !key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
                {
                    field.insert_char(c);
                }
            }
            KeyCode::Enter => {
                let value = field.value.clone();
                match self.submit_prompt(kind, &value) {
                    Ok(()) => self.mode = Mode::Normal,
                    Err(err) => self.status = format!("{} failed: {:#}", kind.title(), err),
                }
            }
            _ => {}
        }
        Ok(false)
    }

    fn submit_prompt(&mut self, kind: PromptKind, value: &str) -> Result<()> {
        match kind {
            PromptKind::AddHour => self.commit(|schedule| {
                let hour = schedule.add_hour(value)?;
                Ok(format!("Added hour {}", hour))
            }),
            PromptKind::RemoveHour => {
                self.commit(|schedule| {
                    let hour = schedule.remove_hour(value)?;
                    Ok(format!("Removed hour {}", hour))
                })?;
                self.clamp_cursor();
                Ok(())
            }
            PromptKind::Rename => {
                self.commit(|schedule| {
                    schedule.rename(value)?;
                    Ok(format!("Renamed to {}", schedule.name))
                })?;
                self.entry.name = self.schedule.name.clone();
                Ok(())
            }
            PromptKind::Export => {
                let path = PathBuf::from(value.trim());
                if path.as_os_str().is_empty() {
                    bail!("a file name is required");
                }
                write_export(&self.schedule, self.theme, &path)?;
                self.status = format!("Exported to {}", path.display());
                Ok(())
            }
        }
    }

    fn process_form_key(
        &mut self,
        action: FormAction,
        form: &mut TaskForm,
        key: KeyEvent,
    ) -> Result<bool> {
        let mut close_form = false;
        match key.code {
            KeyCode::Esc => {
                close_form = true;
                self.status = "Canceled".into();
            }
            KeyCode::Tab | KeyCode::Down => form.next_field(),
            KeyCode::BackTab | KeyCode::Up => form.prev_field(),
            KeyCode::Left => form.active_field_mut().move_left(),
            KeyCode::Right => form.active_field_mut().move_right(),
            KeyCode::Enter => close_form = self.try_submit(action, form)?,
            KeyCode::Backspace => form.active_field_mut().backspace(),
            KeyCode::Char(c) => {
                if !key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
                {
                    form.active_field_mut().insert_char(c);
                }
            }
            _ => {}
        }
        Ok(close_form)
    }

    fn try_submit(&mut self, action: FormAction, form: &TaskForm) -> Result<bool> {
        let outcome = match action {
            FormAction::Create => self
                .create_from_form(form)
                .map_err(|err| anyhow!("Could not create: {:#}", err)),
            FormAction::Edit(task_id) => self
                .edit_from_form(&task_id, form)
                .map_err(|err| anyhow!("Could not edit: {:#}", err)),
        };
        match outcome {
            Ok(()) => Ok(true),
            Err(err) => {
                self.status = err.to_string();
                Ok(false)
            }
        }
    }

    fn create_from_form(&mut self, form: &TaskForm) -> Result<()> {
        let drafts = form.drafts()?;
        let name = drafts
            .first()
            .map(|d| d.name.clone())
            .unwrap_or_default();
        self.commit(|schedule| {
            let ids = schedule.create_tasks(drafts)?;
            Ok(format!("Created {} ({} day(s))", name, ids.len()))
        })
    }

    fn edit_from_form(&mut self, task_id: &str, form: &TaskForm) -> Result<()> {
        let mut drafts = form.drafts()?;
        if drafts.len() != 1 {
            bail!("an existing task belongs to exactly one day");
        }
        let task = Task::new(task_id.to_string(), drafts.remove(0));
        let name = task.name.clone();
        self.commit(|schedule| {
            schedule.update_task(task)?;
            Ok(format!("Updated {}", name))
        })
    }

    fn open_edit(&mut self, task_id: &str) {
        match self.schedule.task(task_id) {
            Some(task) => {
                self.status = format!("Editing {}", task.name);
                self.mode = Mode::Editing {
                    task_id: task_id.to_string(),
                    form: TaskForm::from_task(task),
                };
            }
            None => self.status = format!("Task {} not found", task_id),
        }
    }

    fn confirm_delete(&mut self, task_id: TaskId) {
        self.status = "Delete task? (y to confirm, n/Esc to cancel)".into();
        self.mode = Mode::ConfirmDelete { task_id };
    }

    fn open_prompt(&mut self, kind: PromptKind, initial: &str) {
        self.status = format!("{} (Enter to apply, Esc to cancel)", kind.title());
        self.mode = Mode::Prompt {
            kind,
            field: FieldValue::new(initial),
        };
    }

    fn cursor_cell(&self) -> Option<Cell> {
        let day = *self.schedule.visible_days.get(self.cursor.0)?;
        let hour = *self.schedule.hours.get(self.cursor.1)?;
        Some(Cell::new(day, hour))
    }

    fn focus_cell(&mut self, cell: Cell) {
        let day = self.schedule.visible_days.iter().position(|d| *d == cell.day);
        let hour = self.schedule.hours.iter().position(|h| *h == cell.hour);
        if let (Some(day), Some(hour)) = (day, hour) {
            self.cursor = (day, hour);
        }
    }

    fn move_cursor(&mut self, dx: i32, dy: i32) {
        let (d_day, d_hour) = match self.schedule.layout {
            Orientation::Vertical => (dx, dy),
            Orientation::Horizontal => (dy, dx),
        };
        self.cursor.0 = step(self.cursor.0, d_day, self.schedule.visible_days.len());
        self.cursor.1 = step(self.cursor.1, d_hour, self.schedule.hours.len());
    }

    fn clamp_cursor(&mut self) {
        self.cursor.0 = self
            .cursor
            .0
            .min(self.schedule.visible_days.len().saturating_sub(1));
        self.cursor.1 = self.cursor.1.min(self.schedule.hours.len().saturating_sub(1));
    }

    /// Keyboard equivalent of a click on the cursor cell.
    fn click_cursor(&mut self) {
        let Some(cell) = self.cursor_cell() else {
            self.status = "No visible cell (show a day with 1-7)".into();
            return;
        };
        self.pointer(PointerEvent::Down(cell));
        self.pointer(PointerEvent::Up(Some(cell)));
    }

    fn first_task_at_cursor(&self) -> Option<TaskId> {
        let cell = self.cursor_cell()?;
        self.schedule
            .tasks_in_window(cell.day, cell.hour)
            .first()
            .map(|t| t.id.clone())
    }

    fn draw(&mut self, f: &mut ratatui::Frame<'_>) {
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(8),
                Constraint::Length(4),
            ])
            .split(f.size());

        self.draw_header(f, layout[0]);
        self.draw_grid(f, layout[1]);
        self.draw_footer(f, layout[2]);

        match &self.mode {
            Mode::Actions {
                cell,
                items,
                selected,
            } => self.draw_actions(f, *cell, items, *selected),
            Mode::Creating(form) => self.draw_form(f, "New Task", form),
            Mode::Editing { form, .. } => self.draw_form(f, "Edit Task", form),
            Mode::ConfirmDelete { task_id } => self.draw_confirm(f, task_id),
            Mode::Prompt { kind, field } => self.draw_prompt(f, *kind, field),
            Mode::Normal => {}
        }
    }

    fn draw_header(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let title = Line::from(vec![
            Span::styled(
                "weekgrid ",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                &self.schedule.name,
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::raw("  •  "),
            Span::styled(
                format!("{} layout", self.schedule.layout.label()),
                Style::default().fg(Color::Green),
            ),
            Span::raw("  •  "),
            Span::styled(
                format!("{} tasks", self.schedule.tasks.len()),
                Style::default().fg(Color::Magenta),
            ),
            Span::raw("  •  "),
            Span::styled(
                format!("{}", self.store.root().display()),
                Style::default().fg(Color::DarkGray),
            ),
            Span::raw("  •  "),
            Span::styled(
                format!("saved {}", format_elapsed(self.last_save)),
                Style::default().fg(Color::Gray),
            ),
        ]);

        let block = Block::default()
            .borders(Borders::BOTTOM)
            .border_style(Style::default().fg(Color::DarkGray));
        let paragraph = Paragraph::new(title)
            .alignment(Alignment::Center)
            .block(block);
        f.render_widget(paragraph, area);
    }

    fn draw_grid(&mut self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let dragging = self.drag.is_dragging();
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(if dragging {
                Color::Yellow
            } else {
                Color::DarkGray
            }))
            .title(Span::styled(
                if dragging { "Selecting" } else { "Week" },
                Style::default().add_modifier(Modifier::BOLD),
            ));
        let inner = block.inner(area);
        f.render_widget(block, area);

        let geometry = GridGeometry::new(inner, &self.schedule);
        let grid = GridContext::new(&self.schedule, self.hold);
        let view = GridView::new(&self.schedule, self.theme)
            .cursor(self.cursor_cell())
            .selection(self.drag.selection(&grid))
            .today(Some(Day::from_weekday(chrono::Local::now().weekday())));
        f.render_widget(view, inner);
        self.geometry = Some(geometry);
    }

    fn draw_footer(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(2), Constraint::Length(2)])
            .split(area);

        let help_bar = Paragraph::new(footer_help_line())
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(Color::DarkGray)),
            );
        f.render_widget(help_bar, rows[0]);

        let bottom = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(rows[1]);

        let status = Paragraph::new(self.status.clone())
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(Color::DarkGray)),
            );
        f.render_widget(status, bottom[0]);

        let (detail, title) = self.cursor_detail();
        let detail = Paragraph::new(detail).wrap(Wrap { trim: true }).block(
            Block::default()
                .borders(Borders::TOP)
                .border_style(Style::default().fg(Color::DarkGray))
                .title(title),
        );
        f.render_widget(detail, bottom[1]);
    }

    fn cursor_detail(&self) -> (Line<'static>, String) {
        let Some(cell) = self.cursor_cell() else {
            return (Line::raw("no cell"), "Cursor".into());
        };
        let title = format!("{} {}", cell.day.short(), cell.hour);
        let tasks = self.schedule.tasks_in_window(cell.day, cell.hour);
        if tasks.is_empty() {
            return (
                Line::from(Span::styled("free", Style::default().fg(Color::DarkGray))),
                title,
            );
        }
        let mut spans = Vec::new();
        for task in tasks {
            spans.push(Span::styled(
                format!(" {} ", fit(&task.name, 20)),
                on_color(task.color),
            ));
            spans.push(Span::styled(
                format!(" {}-{}  ", task.start_time, task.end_time),
                Style::default().fg(Color::Gray),
            ));
        }
        (Line::from(spans), title)
    }

    fn draw_actions(&self, f: &mut ratatui::Frame<'_>, cell: Cell, items: &[ActionItem], selected: usize) {
        let area = centered_rect(50, 40, f.size());
        let list_items: Vec<ListItem> = items
            .iter()
            .map(|item| match item {
                ActionItem::Edit(id) | ActionItem::Delete(id) => {
                    let verb = if matches!(item, ActionItem::Edit(_)) {
                        "Edit"
                    } else {
                        "Delete"
                    };
                    let detail = self
                        .schedule
                        .task(id)
                        .map(|t| format!("{} ({}-{})", t.name, t.start_time, t.end_time))
                        .unwrap_or_else(|| id.clone());
                    ListItem::new(format!("{} {}", verb, detail))
                }
                ActionItem::Create => ListItem::new("Create a new task here"),
            })
            .collect();
        let mut state = ListState::default();
        state.select(Some(selected));
        let list = List::new(list_items)
            .block(
                Block::default()
                    .title(Span::styled(
                        format!("{} {}", cell.day, cell.hour),
                        Style::default()
                            .fg(Color::Cyan)
                            .add_modifier(Modifier::BOLD),
                    ))
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan)),
            )
            .highlight_style(
                Style::default()
                    .bg(Color::LightCyan)
                    .fg(Color::Black)
                    .add_modifier(Modifier::BOLD),
            );
        f.render_widget(Clear, area);
        f.render_stateful_widget(list, area, &mut state);
    }

    fn draw_form(&self, f: &mut ratatui::Frame<'_>, title: &str, form: &TaskForm) {
        let area = centered_rect(70, 60, f.size());
        let mut fields = Vec::new();
        fields.extend(field_lines("Name", &form.name, form.field == FormField::Name));
        fields.extend(field_lines(
            "Days (comma separated)",
            &form.days,
            form.field == FormField::Days,
        ));
        fields.extend(field_lines(
            "Start (HH:MM)",
            &form.start,
            form.field == FormField::Start,
        ));
        fields.extend(field_lines(
            "End (HH:MM)",
            &form.end,
            form.field == FormField::End,
        ));
        fields.extend(field_lines(
            "Colour",
            &form.color,
            form.field == FormField::Color,
        ));
        if let Ok(color) = TaskColor::parse(&form.color.value) {
            fields.push(Line::from(Span::styled("        ", on_color(color))));
        }
        fields.push(Line::from(Span::styled(
            "Enter to save • Esc to cancel • Tab/Shift-Tab to move",
            Style::default().fg(Color::Gray),
        )));
        let dialog = Paragraph::new(fields)
            .block(
                Block::default()
                    .title(Span::styled(
                        title,
                        Style::default()
                            .fg(Color::Cyan)
                            .add_modifier(Modifier::BOLD),
                    ))
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan)),
            )
            .wrap(Wrap { trim: true });

        f.render_widget(Clear, area);
        f.render_widget(dialog, area);
    }

    fn draw_confirm(&self, f: &mut ratatui::Frame<'_>, task_id: &str) {
        let area = centered_rect(50, 30, f.size());
        let name = self
            .schedule
            .task(task_id)
            .map(|t| format!("{} ({} {}-{})", t.name, t.day, t.start_time, t.end_time))
            .unwrap_or_else(|| task_id.to_string());
        let body = vec![
            Line::from(Span::styled(
                format!("Delete \"{}\"?", name),
                Style::default()
                    .fg(Color::LightRed)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from("Press y to confirm, n or Esc to cancel"),
        ];
        let dialog = Paragraph::new(body).alignment(Alignment::Center).block(
            Block::default()
                .title(Span::styled(
                    "Confirm Delete",
                    Style::default()
                        .fg(Color::LightRed)
                        .add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::LightRed)),
        );
        f.render_widget(Clear, area);
        f.render_widget(dialog, area);
    }

    fn draw_prompt(&self, f: &mut ratatui::Frame<'_>, kind: PromptKind, field: &FieldValue) {
        let area = centered_rect(50, 25, f.size());
        let mut lines = field_lines(kind.label(), field, true);
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Enter to apply • Esc to cancel",
            Style::default().fg(Color::Gray),
        )));
        let dialog = Paragraph::new(lines).wrap(Wrap { trim: true }).block(
            Block::default()
                .title(Span::styled(
                    kind.title(),
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        );
        f.render_widget(Clear, area);
        f.render_widget(dialog, area);
    }

    /// Applies `change` to a copy of the schedule, which replaces the live one
    /// only after it is saved. On any error the schedule is left as it was.
    fn commit<F>(&mut self, change: F) -> Result<()>
    where
        F: FnOnce(&mut Schedule) -> Result<String>,
    {
        let mut next = self.schedule.clone();
        let message = change(&mut next)?;
        if let Err(err) = self.store.save(&self.entry.id, &next, None) {
            log::error!("saving schedule {} failed: {:#}", self.entry.id, err);
            return Err(err.context("not saved, change discarded"));
        }
        self.schedule = next;
        self.last_save = Instant::now();
        self.status = message;
        Ok(())
    }

    fn commit_or_report<F>(&mut self, change: F)
    where
        F: FnOnce(&mut Schedule) -> Result<String>,
    {
        if let Err(err) = self.commit(change) {
            self.status = format!("{:#}", err);
        }
    }
}

impl TaskForm {
    fn from_proposal(proposal: &TaskProposal, color: TaskColor) -> Self {
        TaskForm {
            name: FieldValue::new(""),
            days: FieldValue::new(&day_list(&proposal.days)),
            start: FieldValue::new(&proposal.start.to_string()),
            end: FieldValue::new(&proposal.end.to_string()),
            color: FieldValue::new(&color.to_hex()),
            field: FormField::Name,
        }
    }

    fn from_task(task: &Task) -> Self {
        TaskForm {
            name: FieldValue::new(&task.name),
            days: FieldValue::new(task.day.name()),
            start: FieldValue::new(&task.start_time.to_string()),
            end: FieldValue::new(&task.end_time.to_string()),
            color: FieldValue::new(&task.color.to_hex()),
            field: FormField::Name,
        }
    }

    fn next_field(&mut self) {
        self.field = match self.field {
            FormField::Name => FormField::Days,
            FormField::Days => FormField::Start,
            FormField::Start => FormField::End,
            FormField::End => FormField::Color,
            FormField::Color => FormField::Name,
        };
    }

    fn prev_field(&mut self) {
        self.field = match self.field {
            FormField::Name => FormField::Color,
            FormField::Days => FormField::Name,
            FormField::Start => FormField::Days,
            FormField::End => FormField::Start,
            FormField::Color => FormField::End,
        };
    }

    fn active_field_mut(&mut self) -> &mut FieldValue {
        match self.field {
            FormField::Name => &mut self.name,
            FormField::Days => &mut self.days,
            FormField::Start => &mut self.start,
            FormField::End => &mut self.end,
            FormField::Color => &mut self.color,
        }
    }

    /// One draft per listed day, all sharing the form's name, times and colour.
    fn drafts(&self) -> Result<Vec<TaskDraft>> {
        let days = parse_days(&self.days.value)?;
        let start_time = TimeOfDay::parse(&self.start.value)?;
        let end_time = TimeOfDay::parse(&self.end.value)?;
        let color = TaskColor::parse(&self.color.value)?;
        let name = self.name.value.trim().to_string();
        Ok(days
            .into_iter()
            .map(|day| TaskDraft {
                name: name.clone(),
                day,
                start_time,
                end_time,
                color,
            })
            .collect())
    }
}

fn parse_days(input: &str) -> Result<Vec<Day>> {
    let mut days = Vec::new();
    for part in input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
    {
        let day: Day = part.parse()?;
        if !days.contains(&day) {
            days.push(day);
        }
    }
    if days.is_empty() {
        bail!("at least one day is required");
    }
    days.sort();
    Ok(days)
}

fn day_list(days: &[Day]) -> String {
    days.iter().map(|d| d.name()).collect::<Vec<_>>().join(", ")
}

fn single_cell(cell: Cell) -> TaskProposal {
    TaskProposal {
        days: vec![cell.day],
        start: cell.hour,
        end: cell.hour.next_increment(),
    }
}

fn step(idx: usize, delta: i32, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    (idx as i64 + delta as i64).clamp(0, len as i64 - 1) as usize
}

fn footer_help_line() -> Line<'static> {
    let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::LightCyan));
    Line::from(vec![
        key("click/Enter"),
        Span::raw(" inspect  "),
        key("drag"),
        Span::raw(" select range  "),
        key("←↑↓→ / h j k l"),
        Span::raw(" move  "),
        key("n"),
        Span::raw(" new  "),
        key("e"),
        Span::raw(" edit  "),
        key("d"),
        Span::raw(" delete  "),
        key("1-7"),
        Span::raw(" days  "),
        key("+ -"),
        Span::raw(" hours  "),
        key("o"),
        Span::raw(" layout  "),
        key("r"),
        Span::raw(" rename  "),
        key("x"),
        Span::raw(" export  "),
        key("q"),
        Span::raw(" quit"),
    ])
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn teardown_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableMouseCapture,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;
    Ok(())
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

fn prev_grapheme(cursor: usize, text: &str) -> usize {
    if cursor == 0 {
        return 0;
    }
    let mut prev = 0;
    for (idx, _) in text.char_indices() {
        if idx >= cursor {
            break;
        }
        prev = idx;
    }
    prev
}

fn next_grapheme(cursor: usize, text: &str) -> usize {
    for (idx, ch) in text.char_indices() {
        if idx > cursor {
            return idx;
        }
        if idx == cursor {
            return cursor + ch.len_utf8();
        }
    }
    text.len()
}

fn field_lines(label: &str, field: &FieldValue, active: bool) -> Vec<Line<'static>> {
    let label_style = Style::default()
        .fg(Color::Gray)
        .add_modifier(Modifier::BOLD | Modifier::DIM);
    let value_style = Style::default().fg(if active { Color::Cyan } else { Color::White });
    let text = if active {
        field.with_caret()
    } else {
        field.value.clone()
    };
    vec![Line::from(vec![
        Span::styled(format!("{}: ", label), label_style),
        Span::styled(text, value_style),
    ])]
}

fn format_elapsed(last: Instant) -> String {
    let secs = last.elapsed().as_secs();
    if secs < 60 {
        format!("{}s ago", secs)
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else {
        format!("{}h ago", secs / 3600)
    }
}
