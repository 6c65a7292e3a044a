pub const PROFILES_SCHEMA: &str =
    "CREATE TABLE IF NOT EXISTS profiles (
        id             INTEGER     PRIMARY KEY,
        name           TEXT        NOT NULL,
        email          TEXT        NOT NULL    UNIQUE,
        avatar_url     TEXT,
        bio            TEXT,

        total_points   INTEGER     NOT NULL    DEFAULT 0   CHECK (total_points >= 0),
        joined_date    TEXT        NOT NULL
    )";

pub const ADOPTED_STREETS_SCHEMA: &str =
    "CREATE TABLE IF NOT EXISTS adopted_streets (
        id             INTEGER     PRIMARY KEY,
        user_id        INTEGER     NOT NULL    REFERENCES profiles(id),
        street_name    TEXT        NOT NULL,

        UNIQUE (user_id, street_name)
    )";

pub const CLEANUP_LOGS_SCHEMA: &str =
    "CREATE TABLE IF NOT EXISTS cleanup_logs (
        id                INTEGER     PRIMARY KEY,
        user_id           INTEGER     NOT NULL    REFERENCES profiles(id),

        date              TEXT        NOT NULL,
        location          TEXT        NOT NULL,
        duration          INTEGER     NOT NULL    CHECK (duration > 0),
        trash_bags        INTEGER     NOT NULL    CHECK (trash_bags > 0),
        points            INTEGER     NOT NULL,
        notes             TEXT,
        before_photo_url  TEXT,
        after_photo_url   TEXT
    )";

pub const CLEANUP_PHOTOS_SCHEMA: &str =
    "CREATE TABLE IF NOT EXISTS cleanup_photos (
        id                INTEGER     PRIMARY KEY,
        cleanup_log_id    INTEGER     NOT NULL    REFERENCES cleanup_logs(id),
        photo_url         TEXT        NOT NULL
    )";

pub const HAZARD_REPORTS_SCHEMA: &str =
    "CREATE TABLE IF NOT EXISTS hazard_reports (
        id             INTEGER     PRIMARY KEY,
        user_id        INTEGER     NOT NULL    REFERENCES profiles(id),

        type           TEXT        NOT NULL,
        severity       TEXT        NOT NULL,
        status         TEXT        NOT NULL    DEFAULT 'reported',
        location       TEXT        NOT NULL,
        description    TEXT        NOT NULL,
        reported_date  TEXT        NOT NULL
    )";

pub const HAZARD_PHOTOS_SCHEMA: &str =
    "CREATE TABLE IF NOT EXISTS hazard_photos (
        id                INTEGER     PRIMARY KEY,
        hazard_report_id  INTEGER     NOT NULL    REFERENCES hazard_reports(id),
        photo_url         TEXT        NOT NULL
    )";

pub const PLANT_POSTS_SCHEMA: &str =
    "CREATE TABLE IF NOT EXISTS plant_posts (
        id                      INTEGER     PRIMARY KEY,
        user_id                 INTEGER     NOT NULL    REFERENCES profiles(id),

        plant_name              TEXT        NOT NULL,
        scientific_name         TEXT,
        location                TEXT        NOT NULL,
        description             TEXT        NOT NULL,
        is_pollinator_friendly  BOOLEAN     NOT NULL,
        care_instructions       TEXT,
        posted_date             TEXT        NOT NULL
    )";

pub const PLANT_PHOTOS_SCHEMA: &str =
    "CREATE TABLE IF NOT EXISTS plant_photos (
        id              INTEGER     PRIMARY KEY,
        plant_post_id   INTEGER     NOT NULL    REFERENCES plant_posts(id),
        photo_url       TEXT        NOT NULL
    )";

pub const PLANT_LIKES_SCHEMA: &str =
    "CREATE TABLE IF NOT EXISTS plant_likes (
        id              INTEGER     PRIMARY KEY,
        plant_post_id   INTEGER     NOT NULL    REFERENCES plant_posts(id),
        user_id         INTEGER     NOT NULL    REFERENCES profiles(id),

        UNIQUE (plant_post_id, user_id)
    )";

pub const COMMUNITY_EVENTS_SCHEMA: &str =
    "CREATE TABLE IF NOT EXISTS community_events (
        id              INTEGER     PRIMARY KEY,
        organizer_id    INTEGER     NOT NULL    REFERENCES profiles(id),

        title           TEXT        NOT NULL,
        description     TEXT        NOT NULL,
        type            TEXT        NOT NULL,
        location        TEXT        NOT NULL,
        date            TEXT        NOT NULL,
        start_time      TEXT        NOT NULL,
        end_time        TEXT        NOT NULL,
        max_attendees   INTEGER                 CHECK (max_attendees > 0)
    )";

pub const EVENT_ATTENDEES_SCHEMA: &str =
    "CREATE TABLE IF NOT EXISTS event_attendees (
        id              INTEGER     PRIMARY KEY,
        event_id        INTEGER     NOT NULL    REFERENCES community_events(id),
        user_id         INTEGER     NOT NULL    REFERENCES profiles(id),

        UNIQUE (event_id, user_id)
    )";

/// One row per points grant. `source_id` is the record the points were earned through, so the
/// same activity on the same record can only ever be awarded once.
pub const POINT_AWARDS_SCHEMA: &str =
    "CREATE TABLE IF NOT EXISTS point_awards (
        id              INTEGER     PRIMARY KEY,
        user_id         INTEGER     NOT NULL    REFERENCES profiles(id),
        activity        TEXT        NOT NULL,
        source_id       INTEGER     NOT NULL,
        points          INTEGER     NOT NULL,
        awarded_at      TEXT        NOT NULL,

        UNIQUE (user_id, activity, source_id)
    )";

/// Rank is one more than the number of stewards with strictly more points.
pub const LEADERBOARD_VIEW: &str =
    "CREATE VIEW IF NOT EXISTS leaderboard AS
        SELECT p.id            AS user_id,
               p.name          AS user_name,
               p.avatar_url    AS avatar_url,
               p.total_points  AS total_points,
               p.joined_date   AS joined_date,
               (SELECT COUNT(*) FROM cleanup_logs c WHERE c.user_id = p.id) AS cleanup_count,
               1 + (SELECT COUNT(*) FROM profiles o WHERE o.total_points > p.total_points) AS rank
        FROM profiles p";

pub const ALL: &[(&str, &str)] = &[
    ("profiles", PROFILES_SCHEMA),
    ("adopted_streets", ADOPTED_STREETS_SCHEMA),
    ("cleanup_logs", CLEANUP_LOGS_SCHEMA),
    ("cleanup_photos", CLEANUP_PHOTOS_SCHEMA),
    ("hazard_reports", HAZARD_REPORTS_SCHEMA),
    ("hazard_photos", HAZARD_PHOTOS_SCHEMA),
    ("plant_posts", PLANT_POSTS_SCHEMA),
    ("plant_photos", PLANT_PHOTOS_SCHEMA),
    ("plant_likes", PLANT_LIKES_SCHEMA),
    ("community_events", COMMUNITY_EVENTS_SCHEMA),
    ("event_attendees", EVENT_ATTENDEES_SCHEMA),
    ("point_awards", POINT_AWARDS_SCHEMA),
    ("leaderboard", LEADERBOARD_VIEW),
];
