use crate::model::{Task, TaskId, TimeOfDay};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub column: usize,
    pub columns: usize,
    /// Percent of the cross axis before the band starts.
    pub offset: f32,
    /// Percent of the cross axis covered by the band.
    pub width: f32,
}

impl Band {
    fn new(column: usize, columns: usize) -> Self {
        let width = 100.0 / columns as f32;
        Band {
            column,
            columns,
            offset: column as f32 * width,
            width,
        }
    }

    /// Integer `(start, len)` of this band within `extent` terminal cells.
    pub fn span(&self, extent: u16) -> (u16, u16) {
        let extent = extent as usize;
        let start = extent * self.column / self.columns;
        let end = extent * (self.column + 1) / self.columns;
        (start as u16, (end - start) as u16)
    }
}

#[derive(Debug, Default, Clone)]
pub struct OverlapLayout {
    bands: HashMap<TaskId, Band>,
}

impl OverlapLayout {
    pub fn band(&self, id: &str) -> Option<Band> {
        self.bands.get(id).copied()
    }
}

pub fn pack<'a, I>(tasks: I) -> OverlapLayout
where
    I: IntoIterator<Item = &'a Task>,
{
    let mut sorted: Vec<&Task> = tasks.into_iter().collect();
    sorted.sort_by(|a, b| {
        a.start_time
            .cmp(&b.start_time)
            .then_with(|| b.end_time.cmp(&a.end_time))
    });

    let mut layout = OverlapLayout::default();
    let mut group: Vec<(&Task, usize)> = Vec::new();
    let mut column_ends: Vec<TimeOfDay> = Vec::new();
    let mut group_end = TimeOfDay::MIDNIGHT;

    for task in sorted {
        if !group.is_empty() && task.start_time >= group_end {
            flush_group(&mut layout, &mut group, column_ends.len());
            column_ends.clear();
        }
        // Inverted intervals are clamped so they never extend a group backwards.
        let end = task.end_time.max(task.start_time);
        let column = match column_ends.iter().position(|last| *last <= task.start_time) {
            Some(idx) => {
                column_ends[idx] = end;
                idx
            }
            None => {
                column_ends.push(end);
                column_ends.len() - 1
            }
        };
        group_end = if group.is_empty() { end } else { group_end.max(end) };
        group.push((task, column));
    }
    flush_group(&mut layout, &mut group, column_ends.len());
    layout
}

fn flush_group(layout: &mut OverlapLayout, group: &mut Vec<(&Task, usize)>, columns: usize) {
    for (task, column) in group.drain(..) {
        layout.bands.insert(task.id.clone(), Band::new(column, columns));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::task;
    use crate::model::Day;

    impl OverlapLayout {
        fn len(&self) -> usize {
            self.bands.len()
        }

        fn max_columns(&self) -> usize {
            self.bands.values().map(|b| b.columns).max().unwrap_or(0)
        }
    }

    fn disjoint(a: Band, b: Band) -> bool {
        a.offset + a.width <= b.offset + 1e-3 || b.offset + b.width <= a.offset + 1e-3
    }

    #[test]
    fn overlapping_pair_splits_and_loner_stays_full() {
        let tasks = vec![
            task("A", Day::Monday, "09:00", "10:00"),
            task("B", Day::Monday, "09:30", "10:30"),
            task("C", Day::Monday, "11:00", "12:00"),
        ];
        let layout = pack(&tasks);

        let a = layout.band("A").unwrap();
        let b = layout.band("B").unwrap();
        let c = layout.band("C").unwrap();
        assert_eq!(a.width, 50.0);
        assert_eq!(b.width, 50.0);
        assert!(disjoint(a, b));
        assert_eq!(c.width, 100.0);
        assert_eq!(c.offset, 0.0);
        assert_eq!(c.columns, 1);
    }

    #[test]
    fn back_to_back_tasks_share_a_column() {
        let tasks = vec![
            task("A", Day::Monday, "09:00", "09:30"),
            task("B", Day::Monday, "09:30", "10:00"),
        ];
        let layout = pack(&tasks);
        assert_eq!(layout.band("A").unwrap().width, 100.0);
        assert_eq!(layout.band("B").unwrap().width, 100.0);
    }

    #[test]
    fn longer_task_claims_first_column_on_ties() {
        let tasks = vec![
            task("short", Day::Monday, "09:00", "09:30"),
            task("long", Day::Monday, "09:00", "11:00"),
        ];
        let layout = pack(&tasks);
        assert_eq!(layout.band("long").unwrap().column, 0);
        assert_eq!(layout.band("short").unwrap().column, 1);
    }

    #[test]
    fn column_count_equals_largest_clique() {
        // Chain A-B, B-C, C-D overlaps but never three at once.
        let tasks = vec![
            task("A", Day::Monday, "08:00", "09:00"),
            task("B", Day::Monday, "08:30", "09:30"),
            task("C", Day::Monday, "09:15", "10:00"),
            task("D", Day::Monday, "09:45", "10:30"),
        ];
        let layout = pack(&tasks);
        assert_eq!(layout.max_columns(), 2);
        for x in &tasks {
            for y in &tasks {
                if x.id != y.id && x.overlaps(y) {
                    assert!(disjoint(
                        layout.band(&x.id).unwrap(),
                        layout.band(&y.id).unwrap()
                    ));
                }
            }
        }

        let triple = vec![
            task("A", Day::Monday, "08:00", "10:00"),
            task("B", Day::Monday, "08:30", "09:30"),
            task("C", Day::Monday, "09:00", "09:45"),
        ];
        assert_eq!(pack(&triple).max_columns(), 3);
    }

    #[test]
    fn degenerate_intervals_do_not_panic() {
        let mut zero = task("zero", Day::Monday, "09:00", "10:00");
        zero.end_time = zero.start_time;
        let mut inverted = task("inv", Day::Monday, "11:00", "12:00");
        inverted.end_time = TimeOfDay::MIDNIGHT;
        let tasks = vec![zero, inverted, task("ok", Day::Monday, "09:00", "10:00")];
        let layout = pack(&tasks);
        assert_eq!(layout.len(), 3);
        assert_eq!(pack(std::iter::empty()).len(), 0);
    }

    #[test]
    fn spans_partition_the_extent() {
        let bands: Vec<Band> = (0..3).map(|c| Band::new(c, 3)).collect();
        let spans: Vec<(u16, u16)> = bands.iter().map(|b| b.span(10)).collect();
        assert_eq!(spans, vec![(0, 3), (3, 3), (6, 4)]);
        assert_eq!(Band::new(0, 1).span(7), (0, 7));
    }
}
