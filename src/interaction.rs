use crate::model::{Day, Orientation, Schedule, TaskId, TimeOfDay};
use std::time::{Duration, Instant};

pub const DEFAULT_HOLD: Duration = Duration::from_millis(150);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell {
    pub day: Day,
    pub hour: TimeOfDay,
}

impl Cell {
    pub fn new(day: Day, hour: TimeOfDay) -> Self {
        Cell { day, hour }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEvent {
    Down(Cell),
    Enter(Cell),
    /// Button released, over a cell or outside the grid.
    Up(Option<Cell>),
    Leave,
    Tick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Pending {
        origin: Cell,
        pressed_at: Instant,
    },
    Dragging {
        origin: Cell,
        current: Cell,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskProposal {
    pub days: Vec<Day>,
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// A click on a cell holding tasks: offer edit/delete per task or create.
    Inspect { cell: Cell, tasks: Vec<TaskId> },
    /// A click on an empty cell or a finished drag.
    Propose(TaskProposal),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: DragState,
    pub intent: Option<Intent>,
}

impl Transition {
    fn quiet(state: DragState) -> Self {
        Transition {
            state,
            intent: None,
        }
    }

    fn emit(intent: Intent) -> Self {
        Transition {
            state: DragState::Idle,
            intent: Some(intent),
        }
    }
}

pub struct GridContext<'a> {
    pub schedule: &'a Schedule,
    pub hold: Duration,
}

impl<'a> GridContext<'a> {
    pub fn new(schedule: &'a Schedule, hold: Duration) -> Self {
        GridContext { schedule, hold }
    }

    fn orientation(&self) -> Orientation {
        self.schedule.layout
    }

    fn on_drag_axis(&self, origin: Cell, cell: Cell) -> bool {
        match self.orientation() {
            Orientation::Vertical => cell.day == origin.day,
            Orientation::Horizontal => cell.hour == origin.hour,
        }
    }

    fn cells_between(&self, origin: Cell, current: Cell) -> Vec<Cell> {
        match self.orientation() {
            Orientation::Vertical => {
                let (lo, hi) = ordered(origin.hour, current.hour);
                self.schedule
                    .hours
                    .iter()
                    .filter(|h| **h >= lo && **h <= hi)
                    .map(|h| Cell::new(origin.day, *h))
                    .collect()
            }
            Orientation::Horizontal => {
                let (lo, hi) = ordered(origin.day, current.day);
                self.schedule
                    .visible_days
                    .iter()
                    .filter(|d| **d >= lo && **d <= hi)
                    .map(|d| Cell::new(*d, origin.hour))
                    .collect()
            }
        }
    }

    fn click(&self, cell: Cell) -> Intent {
        let tasks: Vec<TaskId> = self
            .schedule
            .tasks_in_window(cell.day, cell.hour)
            .into_iter()
            .map(|t| t.id.clone())
            .collect();
        if tasks.is_empty() {
            Intent::Propose(TaskProposal {
                days: vec![cell.day],
                start: cell.hour,
                end: cell.hour.next_increment(),
            })
        } else {
            Intent::Inspect { cell, tasks }
        }
    }

    fn range(&self, origin: Cell, current: Cell) -> Intent {
        match self.orientation() {
            Orientation::Vertical => {
                let (start, last) = ordered(origin.hour, current.hour);
                Intent::Propose(TaskProposal {
                    days: vec![origin.day],
                    start,
                    end: last.next_increment(),
                })
            }
            Orientation::Horizontal => Intent::Propose(TaskProposal {
                days: self
                    .cells_between(origin, current)
                    .into_iter()
                    .map(|c| c.day)
                    .collect(),
                start: origin.hour,
                end: origin.hour.next_increment(),
            }),
        }
    }
}

fn ordered<T: Ord>(a: T, b: T) -> (T, T) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl DragState {
    pub fn is_idle(&self) -> bool {
        matches!(self, DragState::Idle)
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self, DragState::Dragging { .. })
    }

    pub fn handle(self, event: PointerEvent, now: Instant, grid: &GridContext<'_>) -> Transition {
        let state = self.promote(now, grid.hold);
        match (state, event) {
            (_, PointerEvent::Down(cell)) => Transition::quiet(DragState::Pending {
                origin: cell,
                pressed_at: now,
            }),
            (DragState::Idle, _) => Transition::quiet(DragState::Idle),

            (DragState::Pending { origin, .. }, PointerEvent::Up(_)) => {
                Transition::emit(grid.click(origin))
            }
            (DragState::Pending { .. }, PointerEvent::Leave) => {
                Transition::quiet(DragState::Idle)
            }
            (pending @ DragState::Pending { .. }, _) => Transition::quiet(pending),

            (DragState::Dragging { origin, current }, PointerEvent::Enter(cell)) => {
                let current = if grid.on_drag_axis(origin, cell) {
                    cell
                } else {
                    current
                };
                Transition::quiet(DragState::Dragging { origin, current })
            }
            (DragState::Dragging { origin, current }, PointerEvent::Up(cell)) => {
                let current = cell
                    .filter(|c| grid.on_drag_axis(origin, *c))
                    .unwrap_or(current);
                Transition::emit(finish(origin, current, grid))
            }
            (DragState::Dragging { origin, current }, PointerEvent::Leave) => {
                Transition::emit(finish(origin, current, grid))
            }
            (dragging @ DragState::Dragging { .. }, PointerEvent::Tick) => {
                Transition::quiet(dragging)
            }
        }
    }

    pub fn selection(&self, grid: &GridContext<'_>) -> Vec<Cell> {
        match *self {
            DragState::Dragging { origin, current } => grid.cells_between(origin, current),
            _ => Vec::new(),
        }
    }

    fn promote(self, now: Instant, hold: Duration) -> DragState {
        match self {
            DragState::Pending { origin, pressed_at }
                if now.saturating_duration_since(pressed_at) >= hold =>
            {
                DragState::Dragging {
                    origin,
                    current: origin,
                }
            }
            other => other,
        }
    }
}

fn finish(origin: Cell, current: Cell, grid: &GridContext<'_>) -> Intent {
    if origin == current {
        grid.click(origin)
    } else {
        grid.range(origin, current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::{draft, t};

    fn cell(day: Day, hour: &str) -> Cell {
        Cell::new(day, t(hour))
    }

    fn run(schedule: &Schedule, events: &[(PointerEvent, u64)]) -> (DragState, Vec<Intent>) {
        let grid = GridContext::new(schedule, DEFAULT_HOLD);
        let start = Instant::now();
        let mut state = DragState::Idle;
        let mut intents = Vec::new();
        for (event, at_ms) in events {
            let step = state.handle(*event, start + Duration::from_millis(*at_ms), &grid);
            state = step.state;
            intents.extend(step.intent);
        }
        (state, intents)
    }

    fn busy_monday() -> Schedule {
        let mut schedule = Schedule::new("week");
        schedule
            .create_task(draft("Standup", Day::Monday, "09:00", "09:30"))
            .unwrap();
        schedule
            .create_task(draft("Review", Day::Monday, "09:30", "10:30"))
            .unwrap();
        schedule
    }

    #[test]
    fn vertical_drag_proposes_range_with_next_increment() {
        let schedule = Schedule::new("week");
        let (state, intents) = run(
            &schedule,
            &[
                (PointerEvent::Down(cell(Day::Monday, "09:00")), 0),
                (PointerEvent::Tick, 200),
                (PointerEvent::Enter(cell(Day::Monday, "10:00")), 220),
                (PointerEvent::Enter(cell(Day::Monday, "11:00")), 240),
                (PointerEvent::Up(Some(cell(Day::Monday, "11:00"))), 260),
            ],
        );
        assert!(state.is_idle());
        assert_eq!(
            intents,
            vec![Intent::Propose(TaskProposal {
                days: vec![Day::Monday],
                start: t("09:00"),
                end: t("12:00"),
            })]
        );
    }

    #[test]
    fn drag_upwards_is_order_independent() {
        let schedule = Schedule::new("week");
        let (_, intents) = run(
            &schedule,
            &[
                (PointerEvent::Down(cell(Day::Tuesday, "14:00")), 0),
                (PointerEvent::Enter(cell(Day::Tuesday, "12:00")), 300),
                (PointerEvent::Up(None), 320),
            ],
        );
        assert_eq!(
            intents,
            vec![Intent::Propose(TaskProposal {
                days: vec![Day::Tuesday],
                start: t("12:00"),
                end: t("15:00"),
            })]
        );
    }

    #[test]
    fn plain_click_on_busy_cell_inspects_its_tasks() {
        let schedule = busy_monday();
        let (_, intents) = run(
            &schedule,
            &[
                (PointerEvent::Down(cell(Day::Monday, "09:00")), 0),
                (PointerEvent::Up(Some(cell(Day::Monday, "09:00"))), 50),
            ],
        );
        let expected: Vec<TaskId> = schedule.tasks.iter().map(|t| t.id.clone()).collect();
        assert_eq!(
            intents,
            vec![Intent::Inspect {
                cell: cell(Day::Monday, "09:00"),
                tasks: expected,
            }]
        );
    }

    #[test]
    fn click_on_empty_cell_proposes_single_cell() {
        let schedule = busy_monday();
        let (_, intents) = run(
            &schedule,
            &[
                (PointerEvent::Down(cell(Day::Wednesday, "15:00")), 0),
                (PointerEvent::Up(Some(cell(Day::Wednesday, "15:00"))), 30),
            ],
        );
        assert_eq!(
            intents,
            vec![Intent::Propose(TaskProposal {
                days: vec![Day::Wednesday],
                start: t("15:00"),
                end: t("16:00"),
            })]
        );
    }

    #[test]
    fn held_press_without_movement_degrades_to_click() {
        let schedule = busy_monday();
        let (_, intents) = run(
            &schedule,
            &[
                (PointerEvent::Down(cell(Day::Monday, "10:00")), 0),
                (PointerEvent::Tick, 500),
                (PointerEvent::Up(Some(cell(Day::Monday, "10:00"))), 600),
            ],
        );
        assert!(matches!(intents.as_slice(), [Intent::Inspect { tasks, .. }] if tasks.len() == 1));
    }

    #[test]
    fn moves_before_hold_elapses_are_ignored() {
        let schedule = Schedule::new("week");
        let (_, intents) = run(
            &schedule,
            &[
                (PointerEvent::Down(cell(Day::Monday, "09:00")), 0),
                (PointerEvent::Enter(cell(Day::Monday, "10:00")), 40),
                (PointerEvent::Up(Some(cell(Day::Monday, "10:00"))), 80),
            ],
        );
        assert_eq!(
            intents,
            vec![Intent::Propose(TaskProposal {
                days: vec![Day::Monday],
                start: t("09:00"),
                end: t("10:00"),
            })]
        );
    }

    #[test]
    fn off_axis_moves_do_not_update_endpoint() {
        let schedule = Schedule::new("week");
        let (_, intents) = run(
            &schedule,
            &[
                (PointerEvent::Down(cell(Day::Monday, "09:00")), 0),
                (PointerEvent::Enter(cell(Day::Monday, "10:00")), 200),
                (PointerEvent::Enter(cell(Day::Tuesday, "13:00")), 220),
                (PointerEvent::Up(Some(cell(Day::Tuesday, "13:00"))), 240),
            ],
        );
        assert_eq!(
            intents,
            vec![Intent::Propose(TaskProposal {
                days: vec![Day::Monday],
                start: t("09:00"),
                end: t("11:00"),
            })]
        );
    }

    #[test]
    fn leaving_the_grid_ends_drag_at_last_cell() {
        let schedule = Schedule::new("week");
        let (state, intents) = run(
            &schedule,
            &[
                (PointerEvent::Down(cell(Day::Friday, "08:00")), 0),
                (PointerEvent::Enter(cell(Day::Friday, "09:00")), 200),
                (PointerEvent::Leave, 210),
                (PointerEvent::Up(None), 400),
            ],
        );
        assert!(state.is_idle());
        assert_eq!(
            intents,
            vec![Intent::Propose(TaskProposal {
                days: vec![Day::Friday],
                start: t("08:00"),
                end: t("10:00"),
            })]
        );
    }

    #[test]
    fn leaving_before_hold_cancels() {
        let schedule = Schedule::new("week");
        let (state, intents) = run(
            &schedule,
            &[
                (PointerEvent::Down(cell(Day::Friday, "08:00")), 0),
                (PointerEvent::Leave, 20),
                (PointerEvent::Up(None), 30),
            ],
        );
        assert!(state.is_idle());
        assert!(intents.is_empty());
    }

    #[test]
    fn horizontal_drag_spans_visible_days() {
        let mut schedule = Schedule::new("week");
        schedule.layout = Orientation::Horizontal;
        schedule.toggle_day(Day::Tuesday);
        let (_, intents) = run(
            &schedule,
            &[
                (PointerEvent::Down(cell(Day::Thursday, "10:00")), 0),
                (PointerEvent::Enter(cell(Day::Thursday, "11:00")), 200),
                (PointerEvent::Enter(cell(Day::Monday, "10:00")), 220),
                (PointerEvent::Up(None), 240),
            ],
        );
        assert_eq!(
            intents,
            vec![Intent::Propose(TaskProposal {
                days: vec![Day::Monday, Day::Wednesday, Day::Thursday],
                start: t("10:00"),
                end: t("11:00"),
            })]
        );
    }

    #[test]
    fn selection_follows_drag() {
        let schedule = Schedule::new("week");
        let grid = GridContext::new(&schedule, DEFAULT_HOLD);
        let now = Instant::now();
        let state = DragState::Idle
            .handle(PointerEvent::Down(cell(Day::Monday, "09:00")), now, &grid)
            .state;
        assert!(state.selection(&grid).is_empty());
        let later = now + Duration::from_millis(300);
        let state = state
            .handle(PointerEvent::Enter(cell(Day::Monday, "11:00")), later, &grid)
            .state;
        assert!(state.is_dragging());
        assert_eq!(
            state.selection(&grid),
            vec![
                cell(Day::Monday, "09:00"),
                cell(Day::Monday, "10:00"),
                cell(Day::Monday, "11:00"),
            ]
        );
    }
}
