use chrono::{NaiveDate, NaiveTime, Utc};

use steward::app::Steward;
use steward::commands::Commands;
use steward::models::{EventType, HazardSeverity, HazardStatus, HazardType, NewCleanup, NewEvent, NewHazard, NewPlant};

fn cleanup(trash_bags: u32) -> NewCleanup {
    NewCleanup {
        date: Utc::now(),
        location: String::from("Elm St"),
        duration_minutes: 30,
        trash_bags,
        notes: Some(String::from("Lots of bottle caps")),
        before_photo: None,
        after_photo: None,
        photos: vec![String::from("https://photos.example.com/elm.jpg")],
    }
}

fn event(max_attendees: Option<u32>) -> NewEvent {
    NewEvent {
        title: String::from("Park sweep"),
        description: String::from("Bring gloves"),
        kind: EventType::Cleanup,
        location: String::from("Elm Park"),
        date: NaiveDate::from_ymd_opt(2026, 11, 7).unwrap(),
        start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        end_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
        max_attendees,
    }
}

fn plant() -> NewPlant {
    NewPlant {
        plant_name: String::from("Purple coneflower"),
        scientific_name: Some(String::from("Echinacea purpurea")),
        location: String::from("Corner garden"),
        description: String::from("Blooming along the fence"),
        pollinator_friendly: true,
        care_instructions: Some(String::from("Full sun")),
        photos: Vec::new(),
    }
}

#[test]
fn cleanup_points_feed_level_progress() {
    let mut app = Steward::open_in_memory().unwrap();
    app.sign_up("Ada", "ada@example.com").unwrap();

    let log = app.log_cleanup(&cleanup(3)).unwrap();
    assert_eq!(log.points, 150);
    assert_eq!(log.photos, vec!["https://photos.example.com/elm.jpg"]);

    // The new log shows up without a full refresh.
    assert_eq!(app.cleanups.get(log.id), Some(&log));

    app.log_cleanup(&cleanup(22)).unwrap();
    let profile = app.profile().unwrap();
    assert_eq!(profile.total_points, 1250);
    assert_eq!(profile.level(), 3);
    assert_eq!(profile.progress().fraction, 0.5);
    assert_eq!(profile.progress().points_to_next, 250);
}

#[test]
fn writes_need_a_signed_in_user() {
    let mut app = Steward::open_in_memory().unwrap();

    assert!(app.log_cleanup(&cleanup(1)).is_err());
    assert!(app.toggle_attendance(1).is_err());
    assert!(app.profile().is_err());
    assert!(app.cleanups.items().is_empty());
}

#[test]
fn toggling_attendance_twice_restores_the_original_state() {
    let mut app = Steward::open_in_memory().unwrap();
    let organizer = app.sign_up("Ada", "ada@example.com").unwrap();
    let created = app.create_event(&event(None)).unwrap();
    assert_eq!(created.attendees, vec![organizer.id]);

    let guest = app.sign_up("Bo", "bo@example.com").unwrap();
    let before = app.events.get(created.id).unwrap().clone();
    assert!(!before.viewer_is_attending);

    assert!(app.toggle_attendance(created.id).unwrap());
    assert_eq!(app.events.get(created.id).unwrap().attendee_count(), 2);
    assert!(!app.toggle_attendance(created.id).unwrap());

    let after = app.events.get(created.id).unwrap();
    assert!(!after.viewer_is_attending);
    assert_eq!(after.attendee_count(), before.attendee_count());

    // Attendance is awarded once and never taken back.
    assert!(app.toggle_attendance(created.id).unwrap());
    assert_eq!(app.profile().unwrap().total_points, 100);
    assert_eq!(app.sign_in(organizer.id).unwrap().total_points, 200);
    assert_ne!(guest.id, organizer.id);
}

#[test]
fn organizers_are_only_paid_for_organizing() {
    let mut app = Steward::open_in_memory().unwrap();
    app.sign_up("Ada", "ada@example.com").unwrap();
    let created = app.create_event(&event(None)).unwrap();

    assert!(!app.toggle_attendance(created.id).unwrap());
    assert!(app.toggle_attendance(created.id).unwrap());

    assert!(app.events.get(created.id).unwrap().viewer_is_attending);
    assert_eq!(app.profile().unwrap().total_points, 200);
}

#[test]
fn full_events_cannot_be_joined() {
    let mut app = Steward::open_in_memory().unwrap();
    app.sign_up("Ada", "ada@example.com").unwrap();
    let created = app.create_event(&event(Some(1))).unwrap();
    assert!(created.is_full());

    app.sign_up("Bo", "bo@example.com").unwrap();
    let err = app.toggle_attendance(created.id).unwrap_err();
    assert!(err.to_string().contains("is full"));
    assert_eq!(app.profile().unwrap().total_points, 0);
}

#[test]
fn events_must_end_after_they_start() {
    let mut app = Steward::open_in_memory().unwrap();
    app.sign_up("Ada", "ada@example.com").unwrap();

    let mut backwards = event(None);
    backwards.end_time = NaiveTime::from_hms_opt(8, 0, 0).unwrap();
    assert!(app.create_event(&backwards).is_err());
    assert!(app.events.items().is_empty());
}

#[test]
fn likes_toggle_per_viewer() {
    let mut app = Steward::open_in_memory().unwrap();
    app.sign_up("Ada", "ada@example.com").unwrap();
    let post = app.post_plant(&plant()).unwrap();
    assert_eq!(app.profile().unwrap().total_points, 15);

    app.sign_up("Bo", "bo@example.com").unwrap();
    assert!(app.toggle_like(post.id).unwrap());
    assert_eq!(app.plants.get(post.id).unwrap().likes, 1);
    assert!(app.plants.get(post.id).unwrap().viewer_has_liked);

    assert!(!app.toggle_like(post.id).unwrap());
    assert_eq!(app.plants.get(post.id).unwrap().likes, 0);
    assert!(app.toggle_like(post.id + 1).is_err());
}

#[test]
fn hazards_move_through_their_statuses() {
    let mut app = Steward::open_in_memory().unwrap();
    app.sign_up("Ada", "ada@example.com").unwrap();

    let report = app
        .report_hazard(&NewHazard {
            kind: HazardType::Pothole,
            severity: HazardSeverity::High,
            location: String::from("Oak & 3rd"),
            description: String::from("Deep enough to lose a wheel"),
            photos: Vec::new(),
        })
        .unwrap();
    assert_eq!(report.status, HazardStatus::Reported);
    assert_eq!(app.profile().unwrap().total_points, 25);

    let updated = app.set_hazard_status(report.id, HazardStatus::InProgress).unwrap();
    assert_eq!(updated.status, HazardStatus::InProgress);
    assert_eq!(app.hazards.get(report.id).unwrap().status, HazardStatus::InProgress);
    assert!(app.set_hazard_status(report.id + 1, HazardStatus::Resolved).is_err());
}

#[test]
fn rank_follows_the_leaderboard() {
    let mut app = Steward::open_in_memory().unwrap();
    let a = app.sign_up("A", "a@example.com").unwrap();
    app.log_cleanup(&cleanup(6)).unwrap();
    let b = app.sign_up("B", "b@example.com").unwrap();
    app.create_event(&event(None)).unwrap();
    let c = app.sign_up("C", "c@example.com").unwrap();
    app.create_event(&event(None)).unwrap();

    let board = app.refresh_leaderboard().to_vec();
    let ids = board.iter().map(|entry| entry.user_id).collect::<Vec<_>>();
    assert_eq!(ids, vec![a.id, b.id, c.id]);
    assert_eq!(board[0].cleanup_count, 1);
    assert_eq!(board[2].rank, 2);

    app.sign_in(b.id).unwrap();
    assert_eq!(app.rank(), Some(2));
    // Tied with B on the board, but one place further down the list.
    app.sign_in(c.id).unwrap();
    assert_eq!(app.rank(), Some(3));
    app.sign_out();
    assert_eq!(app.rank(), None);
}

#[test]
fn streets_are_adopted_once() {
    let mut app = Steward::open_in_memory().unwrap();
    app.sign_up("Ada", "ada@example.com").unwrap();

    assert!(app.adopt_street("Maple Street").unwrap());
    assert!(!app.adopt_street("Maple Street").unwrap());
    assert!(app.profile().unwrap().adopted_streets.contains("Maple Street"));
    assert!(app.release_street("Maple Street").unwrap());
    assert!(app.profile().unwrap().adopted_streets.is_empty());
}

#[tokio::test]
async fn commands_drive_a_session() {
    let mut app = Steward::open_in_memory().unwrap();

    let welcome = Commands::run_command(&mut app, "signup name=Ada email=ada@example.com").await.unwrap();
    assert!(welcome.starts_with("Welcome, Ada!"));

    let logged = Commands::run_command(&mut app, r#"cleanup location="Elm St" bags=0 minutes=2"#)
        .await
        .unwrap();
    assert!(logged.contains("You earned 50 points"));
    let log = &app.cleanups.items()[0];
    assert_eq!((log.trash_bags, log.duration_minutes), (1, 5));

    let created = Commands::run_command(
        &mut app,
        "event title=Sweep type=cleanup location=Park date=2026-11-07 start=09:00 end=11:00 max=5",
    )
    .await
    .unwrap();
    assert!(created.contains("Attendees: 1/5"));

    let profile = Commands::run_command(&mut app, "profile").await.unwrap();
    assert!(profile.contains("Points: 250"));
    assert!(profile.contains("Rank: #1"));

    let export = Commands::run_command(&mut app, "export").await.unwrap();
    let json: serde_json::Value = serde_json::from_str(&export).unwrap();
    assert_eq!(json["cleanups"][0]["points"], 50);
    assert_eq!(json["events"][0]["type"], "cleanup");
}

#[tokio::test]
async fn command_errors_are_reported() {
    let mut app = Steward::open_in_memory().unwrap();

    let unknown = Commands::run_command(&mut app, "teleport").await.unwrap_err();
    assert!(unknown.to_string().contains("No such command found"));

    let invalid = Commands::run_command(&mut app, "$$$").await.unwrap_err();
    assert_eq!(invalid.to_string(), "Invalid command syntax.");

    let missing = Commands::run_command(&mut app, "hazard location=Here").await.unwrap_err();
    assert!(missing.to_string().contains("description="));

    Commands::run_command(&mut app, "signup name=Ada email=ada@example.com").await.unwrap();
    let no_storage = Commands::run_command(&mut app, "hazard location=Here description=Glass photo=glass.jpg")
        .await
        .unwrap_err();
    assert!(no_storage.to_string().contains("storage isn't configured"));
    assert!(app.hazards.items().is_empty());

    assert_eq!(Commands::run_command(&mut app, "   ").await.unwrap(), "");
}
