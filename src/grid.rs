use crate::color::TaskColor;
use crate::config::Theme;
use crate::interaction::Cell;
use crate::layout::{pack, Band};
use crate::model::{Day, Orientation, Schedule, Task, TimeOfDay};
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::Widget;

const HEADER_HEIGHT: u16 = 1;
const HOUR_LABEL_WIDTH: u16 = 6;
const DAY_LABEL_WIDTH: u16 = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct GridGeometry {
    area: Rect,
    orientation: Orientation,
    days: Vec<Day>,
    hours: Vec<TimeOfDay>,
    label_width: u16,
    header_height: u16,
    col_width: u16,
    row_height: u16,
}

impl GridGeometry {
    pub fn new(area: Rect, schedule: &Schedule) -> Self {
        let orientation = schedule.layout;
        let days = schedule.visible_days.clone();
        let hours = schedule.hours.clone();
        let (label_width, cols, rows, max_row) = match orientation {
            Orientation::Vertical => (HOUR_LABEL_WIDTH, days.len(), hours.len(), 3),
            Orientation::Horizontal => (DAY_LABEL_WIDTH, hours.len(), days.len(), 4),
        };
        let label_width = label_width.min(area.width);
        let header_height = HEADER_HEIGHT.min(area.height);
        GridGeometry {
            area,
            orientation,
            col_width: share(area.width - label_width, cols, u16::MAX),
            row_height: share(area.height - header_height, rows, max_row),
            days,
            hours,
            label_width,
            header_height,
        }
    }

    pub fn preferred_size(schedule: &Schedule) -> (u16, u16) {
        let days = schedule.visible_days.len() as u16;
        let hours = schedule.hours.len() as u16;
        let (width, height) = match schedule.layout {
            Orientation::Vertical => (HOUR_LABEL_WIDTH + days * 16, HEADER_HEIGHT + hours * 2),
            Orientation::Horizontal => (DAY_LABEL_WIDTH + hours * 12, HEADER_HEIGHT + days * 3),
        };
        (width.max(24), height.max(2))
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty() || self.hours.is_empty()
    }

    fn origin(&self) -> (u16, u16) {
        (
            self.area.x + self.label_width,
            self.area.y + self.header_height,
        )
    }

    fn dims(&self) -> (usize, usize) {
        match self.orientation {
            Orientation::Vertical => (self.days.len(), self.hours.len()),
            Orientation::Horizontal => (self.hours.len(), self.days.len()),
        }
    }

    fn cell_for(&self, col: usize, row: usize) -> Option<Cell> {
        match self.orientation {
            Orientation::Vertical => Some(Cell::new(*self.days.get(col)?, *self.hours.get(row)?)),
            Orientation::Horizontal => {
                Some(Cell::new(*self.days.get(row)?, *self.hours.get(col)?))
            }
        }
    }

    fn position_of(&self, cell: Cell) -> Option<(usize, usize)> {
        let day = self.days.iter().position(|d| *d == cell.day)?;
        let hour = self.hours.iter().position(|h| *h == cell.hour)?;
        Some(match self.orientation {
            Orientation::Vertical => (day, hour),
            Orientation::Horizontal => (hour, day),
        })
    }

    pub fn cell_at(&self, x: u16, y: u16) -> Option<Cell> {
        let (gx, gy) = self.origin();
        if x < gx || y < gy || x >= self.area.right() || y >= self.area.bottom() {
            return None;
        }
        let col = ((x - gx) / self.col_width) as usize;
        let row = ((y - gy) / self.row_height) as usize;
        self.cell_for(col, row)
    }

    pub fn cell_rect(&self, cell: Cell) -> Option<Rect> {
        let (col, row) = self.position_of(cell)?;
        let (gx, gy) = self.origin();
        let x = offset(gx, col, self.col_width)?;
        let y = offset(gy, row, self.row_height)?;
        let rect = Rect::new(x, y, self.col_width, self.row_height).intersection(self.area);
        (!rect.is_empty()).then_some(rect)
    }

    pub fn cells(&self) -> Vec<Cell> {
        let (cols, rows) = self.dims();
        (0..rows)
            .flat_map(|row| (0..cols).map(move |col| (col, row)))
            .filter_map(|(col, row)| self.cell_for(col, row))
            .collect()
    }

    fn inner(&self, rect: Rect) -> Rect {
        if rect.width > 2 {
            Rect::new(rect.x, rect.y, rect.width - 1, rect.height)
        } else {
            rect
        }
    }

    fn band_rect(&self, inner: Rect, band: Band) -> Rect {
        match self.orientation {
            Orientation::Vertical => {
                let (start, len) = band.span(inner.width);
                Rect::new(inner.x + start, inner.y, len, inner.height)
            }
            Orientation::Horizontal => {
                let (start, len) = band.span(inner.height);
                Rect::new(inner.x, inner.y + start, inner.width, len)
            }
        }
    }
}

fn share(extent: u16, count: usize, max: u16) -> u16 {
    if count == 0 {
        return 1;
    }
    ((extent as usize / count).min(u16::MAX as usize) as u16).clamp(1, max)
}

fn offset(base: u16, index: usize, size: u16) -> Option<u16> {
    u16::try_from(base as usize + index * size as usize).ok()
}

pub fn tui_color(color: TaskColor) -> Color {
    let (r, g, b) = color.rgb();
    Color::Rgb(r, g, b)
}

pub fn on_color(color: TaskColor) -> Style {
    let fg = if color.wants_dark_text() {
        Color::Black
    } else {
        Color::White
    };
    Style::default().bg(tui_color(color)).fg(fg)
}

pub fn fit(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    if max == 0 {
        return String::new();
    }
    let mut out: String = text.chars().take(max - 1).collect();
    out.push('…');
    out
}

fn put_str(buf: &mut Buffer, clip: Rect, x: u16, y: u16, text: &str, style: Style) {
    if x < clip.x || x >= clip.right() || y < clip.y || y >= clip.bottom() {
        return;
    }
    let width = (clip.right() - x) as usize;
    buf.set_stringn(x, y, fit(text, width), width, style);
}

pub struct GridView<'a> {
    schedule: &'a Schedule,
    theme: Theme,
    cursor: Option<Cell>,
    selection: Vec<Cell>,
    today: Option<Day>,
}

impl<'a> GridView<'a> {
    pub fn new(schedule: &'a Schedule, theme: Theme) -> Self {
        GridView {
            schedule,
            theme,
            cursor: None,
            selection: Vec::new(),
            today: None,
        }
    }

    pub fn cursor(mut self, cursor: Option<Cell>) -> Self {
        self.cursor = cursor;
        self
    }

    pub fn selection(mut self, cells: Vec<Cell>) -> Self {
        self.selection = cells;
        self
    }

    pub fn today(mut self, day: Option<Day>) -> Self {
        self.today = day;
        self
    }

    fn header_style(&self, today: bool) -> Style {
        let color = if today {
            self.theme.accent
        } else {
            self.theme.primary
        };
        on_color(color).add_modifier(Modifier::BOLD)
    }

    fn draw_headers(&self, geo: &GridGeometry, buf: &mut Buffer) {
        let (gx, gy) = geo.origin();
        let area = geo.area;
        let label_style = Style::default()
            .fg(Color::DarkGray)
            .bg(tui_color(self.theme.background));

        match geo.orientation {
            Orientation::Vertical => {
                for (col, day) in geo.days.iter().enumerate() {
                    let Some(x) = offset(gx, col, geo.col_width) else { break };
                    let rect = Rect::new(x, area.y, geo.col_width, geo.header_height)
                        .intersection(area);
                    if rect.is_empty() {
                        continue;
                    }
                    let today = self.today == Some(*day);
                    buf.set_style(rect, self.header_style(today));
                    let room = geo.col_width.saturating_sub(2) as usize;
                    let label = if day.name().len() <= room {
                        day.name()
                    } else {
                        day.short()
                    };
                    put_str(buf, rect, x + 1, area.y, label, self.header_style(today));
                }
                for (row, hour) in geo.hours.iter().enumerate() {
                    let Some(y) = offset(gy, row, geo.row_height) else { break };
                    put_str(buf, area, area.x, y, &hour.to_string(), label_style);
                }
            }
            Orientation::Horizontal => {
                for (col, hour) in geo.hours.iter().enumerate() {
                    let Some(x) = offset(gx, col, geo.col_width) else { break };
                    let rect = Rect::new(x, area.y, geo.col_width, geo.header_height)
                        .intersection(area);
                    if rect.is_empty() {
                        continue;
                    }
                    buf.set_style(rect, self.header_style(false));
                    put_str(buf, rect, x, area.y, &hour.to_string(), self.header_style(false));
                }
                for (row, day) in geo.days.iter().enumerate() {
                    let Some(y) = offset(gy, row, geo.row_height) else { break };
                    let style = if self.today == Some(*day) {
                        self.header_style(true)
                    } else {
                        label_style
                    };
                    put_str(buf, area, area.x, y, day.name(), style);
                }
            }
        }
    }

    fn labels_task_in(&self, task: &Task, cell: Cell) -> bool {
        task.start_time >= cell.hour
            || !self
                .schedule
                .hours
                .iter()
                .any(|h| *h < cell.hour && task.intersects_cell(cell.day, *h))
    }

    fn draw_cell(&self, geo: &GridGeometry, cell: Cell, buf: &mut Buffer) {
        let Some(rect) = geo.cell_rect(cell) else { return };
        let base = if self.selection.contains(&cell) {
            on_color(self.theme.accent)
        } else {
            Style::default()
                .bg(tui_color(self.theme.background))
                .fg(Color::DarkGray)
        };
        buf.set_style(rect, base);

        let inner = geo.inner(rect);
        if inner.width < rect.width {
            let x = rect.right() - 1;
            for y in rect.top()..rect.bottom() {
                buf.get_mut(x, y).set_symbol("│").set_style(
                    Style::default()
                        .fg(Color::Gray)
                        .bg(tui_color(self.theme.background)),
                );
            }
        }

        let tasks = self.schedule.tasks_in_window(cell.day, cell.hour);
        let layout = pack(tasks.iter().copied());
        for task in &tasks {
            let Some(band) = layout.band(&task.id) else { continue };
            let band_rect = geo.band_rect(inner, band).intersection(inner);
            if band_rect.is_empty() {
                continue;
            }
            let style = on_color(task.color);
            buf.set_style(band_rect, style);
            if self.labels_task_in(task, cell) {
                put_str(buf, band_rect, band_rect.x, band_rect.y, &task.name, style);
                let times = format!("{}-{}", task.start_time, task.end_time);
                put_str(buf, band_rect, band_rect.x, band_rect.y + 1, &times, style);
            }
        }

        if self.cursor == Some(cell) {
            buf.set_style(rect, Style::default().add_modifier(Modifier::REVERSED));
        }
    }
}

impl Widget for GridView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.is_empty() {
            return;
        }
        buf.set_style(
            area,
            Style::default()
                .bg(tui_color(self.theme.background))
                .fg(Color::DarkGray),
        );
        let geo = GridGeometry::new(area, self.schedule);
        if geo.is_empty() {
            put_str(
                buf,
                area,
                area.x,
                area.y,
                "No days visible (toggle with 1-7)",
                Style::default().fg(Color::DarkGray),
            );
            return;
        }
        self.draw_headers(&geo, buf);
        for cell in geo.cells() {
            self.draw_cell(&geo, cell, buf);
        }
    }
}

/// Draws `schedule` into an off-screen buffer and returns it as plain text.
pub fn render_text(schedule: &Schedule, theme: Theme) -> String {
    let (width, height) = GridGeometry::preferred_size(schedule);
    let area = Rect::new(0, 0, width, height);
    let mut buf = Buffer::empty(area);
    GridView::new(schedule, theme).render(area, &mut buf);

    let mut out = format!("{} ({} layout)\n\n", schedule.name, schedule.layout.label());
    for y in 0..height {
        let line: String = (0..width).map(|x| buf.get(x, y).symbol()).collect();
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::{draft, t};

    fn char_col(line: &str, needle: &str) -> Option<usize> {
        line.find(needle).map(|byte| line[..byte].chars().count())
    }

    #[test]
    fn vertical_hit_testing() {
        let schedule = Schedule::new("week");
        let geo = GridGeometry::new(Rect::new(0, 0, 56, 31), &schedule);

        assert_eq!(geo.cell_at(6, 1), Some(Cell::new(Day::Monday, t("06:00"))));
        assert_eq!(geo.cell_at(16, 3), Some(Cell::new(Day::Tuesday, t("07:00"))));
        assert_eq!(geo.cell_at(55, 30), Some(Cell::new(Day::Friday, t("20:00"))));
        assert_eq!(geo.cell_at(3, 5), None);
        assert_eq!(geo.cell_at(10, 0), None);
        assert_eq!(geo.cell_at(56, 5), None);

        let monday = Cell::new(Day::Monday, t("06:00"));
        assert_eq!(geo.cell_rect(monday), Some(Rect::new(6, 1, 10, 2)));
        for cell in geo.cells() {
            let rect = geo.cell_rect(cell).unwrap();
            assert_eq!(geo.cell_at(rect.x, rect.y), Some(cell));
        }
        assert_eq!(geo.cells().len(), 5 * 15);
    }

    #[test]
    fn horizontal_hit_testing_swaps_axes() {
        let mut schedule = Schedule::new("week");
        schedule.layout = Orientation::Horizontal;
        let geo = GridGeometry::new(Rect::new(0, 0, 85, 16), &schedule);

        assert_eq!(geo.cell_at(10, 1), Some(Cell::new(Day::Monday, t("06:00"))));
        assert_eq!(geo.cell_at(15, 4), Some(Cell::new(Day::Tuesday, t("07:00"))));
        assert_eq!(geo.cell_at(5, 4), None);
        let hidden = Cell::new(Day::Sunday, t("06:00"));
        assert_eq!(geo.cell_rect(hidden), None);
    }

    #[test]
    fn tiny_areas_do_not_panic() {
        let mut schedule = Schedule::new("week");
        schedule
            .create_task(draft("Standup", Day::Monday, "09:00", "10:00"))
            .unwrap();
        for (w, h) in [(0, 0), (1, 1), (5, 3), (12, 4)] {
            let area = Rect::new(0, 0, w, h);
            let mut buf = Buffer::empty(area);
            GridView::new(&schedule, Theme::default()).render(area, &mut buf);
        }
        schedule.visible_days.clear();
        let area = Rect::new(0, 0, 40, 5);
        let mut buf = Buffer::empty(area);
        GridView::new(&schedule, Theme::default()).render(area, &mut buf);
    }

    #[test]
    fn text_export_shows_headers_hours_and_tasks() {
        let mut schedule = Schedule::new("Week 42");
        schedule
            .create_task(draft("Alpha", Day::Monday, "09:00", "10:00"))
            .unwrap();
        schedule
            .create_task(draft("Beta", Day::Monday, "09:30", "10:30"))
            .unwrap();
        schedule
            .create_task(draft("Gamma", Day::Monday, "11:00", "12:00"))
            .unwrap();
        let text = render_text(&schedule, Theme::default());

        assert!(text.starts_with("Week 42 (vertical layout)"));
        assert!(text.contains("Monday"));
        assert!(text.contains("Friday"));
        assert!(!text.contains("Saturday"));
        assert!(text.contains("20:00"));

        let pair = text
            .lines()
            .find(|l| l.contains("Alpha"))
            .expect("Alpha drawn");
        let alpha = char_col(pair, "Alpha").unwrap();
        let beta = char_col(pair, "Beta").expect("Beta shares Alpha's row");
        assert_eq!(alpha, HOUR_LABEL_WIDTH as usize);
        assert!(beta > alpha);

        let gamma = text.lines().find(|l| l.contains("Gamma")).unwrap();
        assert_eq!(char_col(gamma, "Gamma"), Some(HOUR_LABEL_WIDTH as usize));
        assert_eq!(text.matches("Beta").count(), 1);
    }

    #[test]
    fn horizontal_export_lists_days_down_the_side() {
        let mut schedule = Schedule::new("Sideways");
        schedule.layout = Orientation::Horizontal;
        schedule
            .create_task(draft("Gym", Day::Wednesday, "18:00", "19:00"))
            .unwrap();
        let text = render_text(&schedule, Theme::default());
        let row = text.lines().find(|l| l.starts_with("Wednesday")).unwrap();
        assert!(row.contains("Gym"));
        assert!(text.contains("06:00"));
    }

    #[test]
    fn fit_marks_truncation() {
        assert_eq!(fit("Standup", 10), "Standup");
        assert_eq!(fit("Standup", 4), "Sta…");
        assert_eq!(fit("Standup", 0), "");
    }
}
