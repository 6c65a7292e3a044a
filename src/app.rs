use anyhow::{Context, Result, anyhow, bail};
use rusqlite::Connection;

use std::cmp::Ordering;

use crate::{
    config::Config,
    db,
    feed::Feed,
    models::{self, HazardStatus},
    points,
    storage::StorageClient,
};

fn cleanups_newest_first(a: &models::CleanupLog, b: &models::CleanupLog) -> Ordering {
    b.date.cmp(&a.date).then(b.id.cmp(&a.id))
}

fn hazards_newest_first(a: &models::HazardReport, b: &models::HazardReport) -> Ordering {
    b.reported_date.cmp(&a.reported_date).then(b.id.cmp(&a.id))
}

fn plants_newest_first(a: &models::PlantPost, b: &models::PlantPost) -> Ordering {
    b.posted_date.cmp(&a.posted_date).then(b.id.cmp(&a.id))
}

fn events_soonest_first(a: &models::CommunityEvent, b: &models::CommunityEvent) -> Ordering {
    (a.date, a.start_time, a.id).cmp(&(b.date, b.start_time, b.id))
}

fn most_points_first(a: &models::LeaderboardEntry, b: &models::LeaderboardEntry) -> Ordering {
    b.total_points.cmp(&a.total_points)
}

/// One steward's session: the signed-in user, the lists they're looking at, and every write
/// they can make.
///
/// Reads never fail; a list that can't be fetched stays as it was. Writes return their errors
/// and, once the store has accepted them, update the affected list in place.
pub struct Steward {
    connection: Connection,
    storage: Option<StorageClient>,
    user_id: Option<i64>,
    leaderboard_limit: usize,

    pub cleanups: Feed<models::CleanupLog>,
    pub hazards: Feed<models::HazardReport>,
    pub plants: Feed<models::PlantPost>,
    pub events: Feed<models::CommunityEvent>,
    pub leaderboard: Feed<models::LeaderboardEntry>,
}

impl Steward {
    pub fn open(config: &Config) -> Result<Self> {
        let connection = db::connect(&config.database_path)
            .with_context(|| format!("Could not open database {}", config.database_path.display()))?;
        let storage = config
            .storage
            .as_ref()
            .map(|storage| StorageClient::new(&storage.url, &storage.api_key));

        Self::with_connection(connection, storage, config.leaderboard_limit)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(db::connect_in_memory()?, None, 50)
    }

    fn with_connection(
        connection: Connection,
        storage: Option<StorageClient>,
        leaderboard_limit: usize,
    ) -> Result<Self> {
        db::initialize_db(&connection).context("Could not initialize database.")?;

        let mut steward = Self {
            connection,
            storage,
            user_id: None,
            leaderboard_limit,
            cleanups: Feed::new("cleanup logs", cleanups_newest_first),
            hazards: Feed::new("hazard reports", hazards_newest_first),
            plants: Feed::new("plant posts", plants_newest_first),
            events: Feed::new("community events", events_soonest_first),
            leaderboard: Feed::new("leaderboard entries", most_points_first),
        };
        steward.refresh_all();

        Ok(steward)
    }

    pub fn user_id(&self) -> Option<i64> {
        self.user_id
    }

    pub fn storage(&self) -> Option<&StorageClient> {
        self.storage.as_ref()
    }

    fn require_user(&self) -> Result<i64> {
        self.user_id.context("You need to sign in first.")
    }

    /// Creates a profile and signs in as it.
    pub fn sign_up(&mut self, name: &str, email: &str) -> Result<models::Profile> {
        let id = db::profiles::insert_profile(&self.connection, name, email)
            .with_context(|| format!("Could not create a profile for {email}"))?;
        self.sign_in(id)
    }

    /// Signs in as an existing profile. Lists that depend on who is looking are re-read.
    pub fn sign_in(&mut self, user_id: i64) -> Result<models::Profile> {
        let profile = db::profiles::query_profile(&self.connection, user_id)?
            .with_context(|| format!("No profile with id {user_id}"))?;

        log::info!("Signed in as {} (#{user_id}).", profile.name);
        self.user_id = Some(user_id);
        self.refresh_plants();
        self.refresh_events();
        self.refresh_leaderboard();

        Ok(profile)
    }

    pub fn sign_out(&mut self) {
        self.user_id = None;
        self.refresh_plants();
        self.refresh_events();
    }

    pub fn profile(&self) -> Result<models::Profile> {
        let user_id = self.require_user()?;
        db::profiles::query_profile(&self.connection, user_id)?
            .with_context(|| format!("Profile {user_id} no longer exists."))
    }

    /// The signed-in user's place on the loaded leaderboard, if they're on it.
    ///
    /// This is a list position, so tied users get distinct places, unlike the shared
    /// `LeaderboardEntry::rank`.
    pub fn rank(&self) -> Option<usize> {
        points::rank(self.leaderboard.items(), self.user_id?)
    }

    pub fn update_profile(&mut self, update: &models::ProfileUpdate) -> Result<models::Profile> {
        let user_id = self.require_user()?;
        if update.is_empty() {
            bail!("Nothing to update.");
        }

        db::profiles::update_profile(&self.connection, user_id, update)
            .context("Could not update profile.")?;
        self.refresh_leaderboard();
        self.profile()
    }

    /// Returns `true` if the street wasn't adopted yet.
    pub fn adopt_street(&mut self, street: &str) -> Result<bool> {
        let user_id = self.require_user()?;
        Ok(db::profiles::insert_adopted_street(&self.connection, user_id, street)?)
    }

    /// Returns `true` if the street had been adopted.
    pub fn release_street(&mut self, street: &str) -> Result<bool> {
        let user_id = self.require_user()?;
        Ok(db::profiles::delete_adopted_street(&self.connection, user_id, street)?)
    }

    pub fn refresh_all(&mut self) {
        self.refresh_cleanups();
        self.refresh_hazards();
        self.refresh_plants();
        self.refresh_events();
        self.refresh_leaderboard();
    }

    pub fn refresh_cleanups(&mut self) -> &[models::CleanupLog] {
        self.cleanups.refresh(db::cleanups::query_cleanups(&self.connection))
    }

    pub fn refresh_hazards(&mut self) -> &[models::HazardReport] {
        self.hazards.refresh(db::hazards::query_hazards(&self.connection))
    }

    pub fn refresh_plants(&mut self) -> &[models::PlantPost] {
        self.plants.refresh(db::plants::query_plants(&self.connection, self.user_id))
    }

    pub fn refresh_events(&mut self) -> &[models::CommunityEvent] {
        self.events.refresh(db::events::query_events(&self.connection, self.user_id))
    }

    pub fn refresh_leaderboard(&mut self) -> &[models::LeaderboardEntry] {
        self.leaderboard
            .refresh(db::leaderboard::query_leaderboard(&self.connection, self.leaderboard_limit))
    }

    pub fn log_cleanup(&mut self, cleanup: &models::NewCleanup) -> Result<models::CleanupLog> {
        let user_id = self.require_user()?;
        let id = db::cleanups::insert_cleanup(&self.connection, user_id, cleanup)
            .inspect_err(|err| log::error!("[log_cleanup] Error creating cleanup log: {err}"))
            .context("Could not log cleanup.")?;

        let log = db::cleanups::query_cleanup(&self.connection, id)?
            .with_context(|| format!("Cleanup {id} vanished after being logged."))?;
        self.cleanups.upsert(log.clone());
        self.refresh_leaderboard();

        Ok(log)
    }

    pub fn report_hazard(&mut self, hazard: &models::NewHazard) -> Result<models::HazardReport> {
        let user_id = self.require_user()?;
        let id = db::hazards::insert_hazard(&self.connection, user_id, hazard)
            .inspect_err(|err| log::error!("[report_hazard] Error creating hazard report: {err}"))
            .context("Could not report hazard.")?;

        let report = db::hazards::query_hazard(&self.connection, id)?
            .with_context(|| format!("Hazard {id} vanished after being reported."))?;
        self.hazards.upsert(report.clone());
        self.refresh_leaderboard();

        Ok(report)
    }

    pub fn set_hazard_status(&mut self, hazard_id: i64, status: HazardStatus) -> Result<models::HazardReport> {
        self.require_user()?;
        if !db::hazards::update_hazard_status(&self.connection, hazard_id, status)? {
            bail!("No hazard report with id {hazard_id}");
        }

        let report = db::hazards::query_hazard(&self.connection, hazard_id)?
            .with_context(|| format!("Hazard {hazard_id} vanished after being updated."))?;
        self.hazards.upsert(report.clone());

        Ok(report)
    }

    pub fn post_plant(&mut self, plant: &models::NewPlant) -> Result<models::PlantPost> {
        let user_id = self.require_user()?;
        let id = db::plants::insert_plant(&self.connection, user_id, plant)
            .inspect_err(|err| log::error!("[post_plant] Error creating plant post: {err}"))
            .context("Could not share plant.")?;

        let post = db::plants::query_plant(&self.connection, id, Some(user_id))?
            .with_context(|| format!("Plant post {id} vanished after being shared."))?;
        self.plants.upsert(post.clone());
        self.refresh_leaderboard();

        Ok(post)
    }

    /// Likes the post, or unlikes it if the user already does. Returns whether the user likes
    /// it afterwards.
    pub fn toggle_like(&mut self, plant_id: i64) -> Result<bool> {
        let user_id = self.require_user()?;
        if db::plants::query_plant(&self.connection, plant_id, Some(user_id))?.is_none() {
            bail!("No plant post with id {plant_id}");
        }

        let liked = if db::plants::has_liked(&self.connection, plant_id, user_id)? {
            db::plants::delete_like(&self.connection, plant_id, user_id)?;
            false
        } else {
            db::plants::insert_like(&self.connection, plant_id, user_id)?;
            true
        };

        let post = db::plants::query_plant(&self.connection, plant_id, Some(user_id))?
            .with_context(|| format!("Plant post {plant_id} vanished."))?;
        self.plants.upsert(post);

        Ok(liked)
    }

    pub fn create_event(&mut self, event: &models::NewEvent) -> Result<models::CommunityEvent> {
        let user_id = self.require_user()?;
        if event.end_time <= event.start_time {
            bail!("An event has to end after it starts.");
        }

        let id = db::events::insert_event(&self.connection, user_id, event)
            .inspect_err(|err| log::error!("[create_event] Error creating community event: {err}"))
            .context("Could not create event.")?;

        let created = db::events::query_event(&self.connection, id, Some(user_id))?
            .with_context(|| format!("Event {id} vanished after being created."))?;
        self.events.upsert(created.clone());
        self.refresh_leaderboard();

        Ok(created)
    }

    /// Signs the user up for the event, or takes them off the list if they're on it already.
    /// Returns whether the user attends afterwards.
    ///
    /// Joining a full event is an error. Leaving never costs points, and re-joining never earns
    /// them twice.
    pub fn toggle_attendance(&mut self, event_id: i64) -> Result<bool> {
        let user_id = self.require_user()?;
        let event = db::events::query_event(&self.connection, event_id, Some(user_id))?
            .ok_or_else(|| anyhow!("No community event with id {event_id}"))?;

        let attending = if event.viewer_is_attending {
            db::events::leave_event(&self.connection, event_id, user_id)?;
            false
        } else {
            if event.is_full() {
                bail!("{} is full ({} attendees).", event.title, event.attendee_count());
            }
            db::events::join_event(&self.connection, event_id, user_id)
                .inspect_err(|err| log::error!("[toggle_attendance] Error joining event: {err}"))?;
            true
        };

        let updated = db::events::query_event(&self.connection, event_id, Some(user_id))?
            .with_context(|| format!("Event {event_id} vanished."))?;
        self.events.upsert(updated);
        self.refresh_leaderboard();

        Ok(attending)
    }
}
