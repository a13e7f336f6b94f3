/// A routine re-instantiated on every matching weekday. It has no per-day
/// record of its own; completion lives only in the daily metrics snapshot.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Routine {
    pub id: &'static str,
    pub text: &'static str,
    pub axis_theme: &'static str,
    pub assigned_days: &'static [u8],
}

const EVERY_DAY: &[u8] = &[0, 1, 2, 3, 4, 5, 6];

pub const ROUTINES: &[Routine] = &[
    Routine {
        id: "routine_am",
        text: "Am Routine",
        axis_theme: "ON TRACK N+1",
        assigned_days: EVERY_DAY,
    },
    Routine {
        id: "routine_pm",
        text: "Pm Routine",
        axis_theme: "ON TRACK N+1",
        assigned_days: EVERY_DAY,
    },
    Routine {
        id: "routine_famclean",
        text: "Family Clean",
        axis_theme: "Environment",
        assigned_days: EVERY_DAY,
    },
    Routine {
        id: "routine_budget",
        text: "Budget",
        axis_theme: "Financial",
        assigned_days: &[2],
    },
    Routine {
        id: "routine_prepare",
        text: "Prepare",
        axis_theme: "Rest and preparation",
        assigned_days: &[0],
    },
    Routine {
        id: "routine_study",
        text: "Study",
        axis_theme: "Gear",
        assigned_days: EVERY_DAY,
    },
    Routine {
        id: "routine_exercise",
        text: "Exercise",
        axis_theme: "Physical",
        assigned_days: EVERY_DAY,
    },
    Routine {
        id: "routine_ready",
        text: "Ready For Work",
        axis_theme: "Financial",
        assigned_days: &[1, 2, 3, 4, 5],
    },
];

impl Routine {
    pub fn applies_on(&self, day_index: u8) -> bool {
        self.assigned_days.contains(&day_index)
    }
}

pub fn routines_for_day(day_index: u8) -> impl Iterator<Item = &'static Routine> {
    ROUTINES
        .iter()
        .filter(move |routine| routine.applies_on(day_index))
}

pub fn find_routine(id: &str) -> Option<&'static Routine> {
    ROUTINES.iter().find(|routine| routine.id == id)
}
