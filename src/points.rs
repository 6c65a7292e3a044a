use crate::models::LeaderboardEntry;

pub const POINTS_PER_BAG: u64 = 50;
pub const HAZARD_REPORT_POINTS: u64 = 25;
pub const PLANT_POST_POINTS: u64 = 15;
pub const EVENT_ATTENDANCE_POINTS: u64 = 100;
pub const EVENT_ORGANIZATION_POINTS: u64 = 200;

/// Every this-many points grants one level.
pub const POINTS_PER_LEVEL: u64 = 500;

// Floors applied by whoever collects cleanup input, before calling into the engine.
pub const MIN_TRASH_BAGS: u32 = 1;
pub const MIN_DURATION_MINUTES: u32 = 5;
pub const DURATION_STEP_MINUTES: u32 = 5;

/// Something a steward can be awarded points for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Cleanup { trash_bags: u32 },
    HazardReport,
    PlantPost,
    EventAttendance,
    EventOrganization,
}

impl Activity {
    pub fn points(&self) -> u64 {
        match self {
            Activity::Cleanup { trash_bags } => cleanup_points(*trash_bags),
            Activity::HazardReport => HAZARD_REPORT_POINTS,
            Activity::PlantPost => PLANT_POST_POINTS,
            Activity::EventAttendance => EVENT_ATTENDANCE_POINTS,
            Activity::EventOrganization => EVENT_ORGANIZATION_POINTS,
        }
    }

    /// Name under which awards for this activity are recorded in the ledger.
    pub fn ledger_name(&self) -> &'static str {
        match self {
            Activity::Cleanup { .. } => "cleanup",
            Activity::HazardReport => "hazard-report",
            Activity::PlantPost => "plant-post",
            Activity::EventAttendance => "event-attendance",
            Activity::EventOrganization => "event-organization",
        }
    }
}

/// Points earned for a cleanup. Callers clamp `trash_bags` to at least [`MIN_TRASH_BAGS`].
pub fn cleanup_points(trash_bags: u32) -> u64 {
    debug_assert!(trash_bags >= MIN_TRASH_BAGS, "cleanup with {trash_bags} bags");
    u64::from(trash_bags) * POINTS_PER_BAG
}

/// Levels are 1-based.
pub fn level(total_points: u64) -> u64 {
    total_points / POINTS_PER_LEVEL + 1
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelProgress {
    /// Portion of the current level already earned, in `[0, 1)`.
    pub fraction: f64,
    pub points_to_next: u64,
}

/// Progress towards the next level. At an exact level boundary (including zero points) the bar
/// is empty and a full level's worth of points remains.
pub fn level_progress(total_points: u64) -> LevelProgress {
    let into_level = total_points % POINTS_PER_LEVEL;
    LevelProgress {
        fraction: into_level as f64 / POINTS_PER_LEVEL as f64,
        points_to_next: POINTS_PER_LEVEL - into_level,
    }
}

/// 1-based position of `user_id` within `entries`, which are expected to already be sorted by
/// total points, descending. Returns `None` when the user is unranked.
pub fn rank(entries: &[LeaderboardEntry], user_id: i64) -> Option<usize> {
    entries
        .iter()
        .position(|entry| entry.user_id == user_id)
        .map(|index| index + 1)
}
