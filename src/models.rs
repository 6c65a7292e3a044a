use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;

use crate::points::{self, LevelProgress};

/// Error for text that names no variant of one of the enums below.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl std::fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "'{}' is not a valid {}", self.value, self.kind)
    }
}

impl std::error::Error for UnknownVariant {}

/// Declares a fieldless enum whose stored and displayed form is a fixed piece of text.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err(UnknownVariant { kind: stringify!($name), value: s.to_string() }),
                }
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                String::deserialize(deserializer)?
                    .parse()
                    .map_err(serde::de::Error::custom)
            }
        }
    };
}

text_enum!(HazardType {
    Pothole => "pothole",
    Debris => "debris",
    LargeTrash => "large-trash",
    Other => "other",
});

text_enum!(HazardSeverity {
    Low => "low",
    Medium => "medium",
    High => "high",
});

text_enum!(
    /// Every report starts out `reported`.
    HazardStatus {
        Reported => "reported",
        InProgress => "in-progress",
        Resolved => "resolved",
    }
);

text_enum!(EventType {
    Cleanup => "cleanup",
    BlockParty => "block-party",
    Planting => "planting",
    Other => "other",
});

text_enum!(
    /// Object-store buckets that photos are uploaded into.
    Bucket {
        Avatars => "avatars",
        CleanupPhotos => "cleanup-photos",
        HazardPhotos => "hazard-photos",
        PlantPhotos => "plant-photos",
    }
);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profile {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub total_points: u64,
    pub joined_date: DateTime<Utc>,
    pub adopted_streets: BTreeSet<String>,
}

impl Profile {
    /// Always derived from `total_points`; no level is ever stored.
    pub fn level(&self) -> u64 {
        points::level(self.total_points)
    }

    pub fn progress(&self) -> LevelProgress {
        points::level_progress(self.total_points)
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let progress = self.progress();
        write!(
            f,
            "**{}** (#{})\n\
             \tEmail: {}\n\
             \tBio: {}\n\
             \tPoints: {}\n\
             \tLevel: {} ({:.0}%, {} points to next)\n\
             \tJoined: {}\n\
             \tAdopted streets: {}",
            self.name, self.id,
            self.email,
            self.bio.as_deref().unwrap_or("-"),
            self.total_points,
            self.level(), progress.fraction * 100.0, progress.points_to_next,
            self.joined_date.format("%Y-%m-%d"),
            if self.adopted_streets.is_empty() {
                String::from("none")
            } else {
                self.adopted_streets.iter().cloned().collect::<Vec<_>>().join(", ")
            }
        )
    }
}

/// Partial profile edit; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.bio.is_none() && self.avatar_url.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanupLog {
    pub id: i64,
    pub user_id: i64,
    pub user_name: Option<String>,
    pub date: DateTime<Utc>,
    pub location: String,
    pub duration_minutes: u32,
    pub trash_bags: u32,
    /// Fixed at creation to `trash_bags * 50`.
    pub points: u64,
    pub notes: Option<String>,
    pub before_photo: Option<String>,
    pub after_photo: Option<String>,
    pub photos: Vec<String>,
}

impl std::fmt::Display for CleanupLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "**Cleanup #{}** at {} (+{} points)\n\
             \tBy: {}\n\
             \tDate: {}\n\
             \tDuration: {} min\n\
             \tTrash bags: {}\n\
             \tPhotos: {}",
            self.id, self.location, self.points,
            self.user_name.as_deref().unwrap_or("unknown"),
            self.date.format("%Y-%m-%d %H:%M"),
            self.duration_minutes,
            self.trash_bags,
            self.photos.len()
        )?;
        if let Some(notes) = &self.notes {
            write!(f, "\n\tNotes: {notes}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewCleanup {
    pub date: DateTime<Utc>,
    pub location: String,
    pub duration_minutes: u32,
    pub trash_bags: u32,
    pub notes: Option<String>,
    pub before_photo: Option<String>,
    pub after_photo: Option<String>,
    pub photos: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HazardReport {
    pub id: i64,
    pub user_id: i64,
    pub user_name: Option<String>,
    #[serde(rename = "type")]
    pub kind: HazardType,
    pub severity: HazardSeverity,
    pub status: HazardStatus,
    pub location: String,
    pub description: String,
    pub reported_date: DateTime<Utc>,
    pub photos: Vec<String>,
}

impl std::fmt::Display for HazardReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "**Hazard #{}**: {} at {}\n\
             \tSeverity: *{}*\n\
             \tStatus: *{}*\n\
             \tReported by: {} on {}\n\
             \t{}",
            self.id, self.kind, self.location,
            self.severity,
            self.status,
            self.user_name.as_deref().unwrap_or("unknown"),
            self.reported_date.format("%Y-%m-%d"),
            self.description
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewHazard {
    pub kind: HazardType,
    pub severity: HazardSeverity,
    pub location: String,
    pub description: String,
    pub photos: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlantPost {
    pub id: i64,
    pub user_id: i64,
    pub user_name: Option<String>,
    pub plant_name: String,
    pub scientific_name: Option<String>,
    pub location: String,
    pub description: String,
    pub pollinator_friendly: bool,
    pub care_instructions: Option<String>,
    pub posted_date: DateTime<Utc>,
    /// Size of the like set.
    pub likes: u64,
    /// Whether the viewing user is in the like set.
    pub viewer_has_liked: bool,
    pub photos: Vec<String>,
}

impl std::fmt::Display for PlantPost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "**Plant #{}**: {}", self.id, self.plant_name)?;
        if let Some(scientific) = &self.scientific_name {
            write!(f, " (*{scientific}*)")?;
        }
        write!(
            f,
            "\n\tSeen at: {}\n\
             \tPosted by: {} on {}\n\
             \tLikes: {}{}\n\
             \t{}",
            self.location,
            self.user_name.as_deref().unwrap_or("unknown"),
            self.posted_date.format("%Y-%m-%d"),
            self.likes,
            if self.viewer_has_liked { " (you liked this)" } else { "" },
            self.description
        )?;
        if self.pollinator_friendly {
            write!(f, "\n\tPollinator-friendly")?;
        }
        if let Some(care) = &self.care_instructions {
            write!(f, "\n\tCare: {care}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPlant {
    pub plant_name: String,
    pub scientific_name: Option<String>,
    pub location: String,
    pub description: String,
    pub pollinator_friendly: bool,
    pub care_instructions: Option<String>,
    pub photos: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommunityEvent {
    pub id: i64,
    pub organizer_id: i64,
    pub organizer_name: Option<String>,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: EventType,
    pub location: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub max_attendees: Option<u32>,
    pub attendees: Vec<i64>,
    pub viewer_is_attending: bool,
}

impl CommunityEvent {
    pub fn attendee_count(&self) -> usize {
        self.attendees.len()
    }

    pub fn is_full(&self) -> bool {
        self.max_attendees
            .is_some_and(|max| self.attendee_count() >= max as usize)
    }
}

impl std::fmt::Display for CommunityEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "**Event #{}**: {} ({})\n\
             \tWhere: {}\n\
             \tWhen: {} {}-{}\n\
             \tOrganizer: {}\n\
             \tAttendees: {}{}{}\n\
             \t{}",
            self.id, self.title, self.kind,
            self.location,
            self.date, self.start_time.format("%H:%M"), self.end_time.format("%H:%M"),
            self.organizer_name.as_deref().unwrap_or("unknown"),
            self.attendee_count(),
            self.max_attendees.map(|max| format!("/{max}")).unwrap_or_default(),
            if self.viewer_is_attending { " (you're going)" } else { "" },
            self.description
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    pub kind: EventType,
    pub location: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub max_attendees: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub user_id: i64,
    pub user_name: String,
    pub avatar_url: Option<String>,
    pub total_points: u64,
    pub cleanup_count: u64,
    pub rank: u64,
}

impl std::fmt::Display for LeaderboardEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "#{} {} - {} points, {} cleanups",
            self.rank, self.user_name, self.total_points, self.cleanup_count
        )
    }
}
