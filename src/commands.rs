use crate::app::Steward;
use crate::models::{self, Bucket, EventType, HazardSeverity, HazardStatus, HazardType};
use crate::points::{self, DURATION_STEP_MINUTES, MIN_DURATION_MINUTES, MIN_TRASH_BAGS};

use anyhow::{Context, Result, anyhow, bail};
use chrono::{NaiveDate, NaiveTime, Utc};
use itertools::Itertools;
use regex::Regex;

use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;

const MAX_CMD_LENGTH: usize = 16;
const DEFAULT_DURATION_MINUTES: u32 = 30;

/// `key=value`, `key="quoted value"`, `"quoted positional"` or a bare positional.
static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z_][\w-]*)=(?:"([^"]*)"|(\S*))|"([^"]*)"|(\S+)"#)
        .expect("token pattern is valid")
});

static COMMAND_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_-]*$").expect("command pattern is valid")
});

/// A command line split into its name, positional arguments and `key=value` options.
#[derive(Debug, Default, PartialEq)]
pub struct ParsedLine {
    pub command: String,
    pub positional: Vec<String>,
    pub options: Vec<(String, String)>,
}

/// Splits `line` into a [`ParsedLine`]. Returns `None` for a blank line.
pub fn parse_line(line: &str) -> Option<ParsedLine> {
    let mut parsed = ParsedLine::default();
    let mut tokens = TOKEN.captures_iter(line);

    parsed.command = tokens.next()?.get(0)?.as_str().to_string();
    for token in tokens {
        match (token.get(1), token.get(2).or(token.get(3))) {
            (Some(key), Some(value)) => {
                parsed.options.push((key.as_str().to_string(), value.as_str().to_string()))
            }
            _ => {
                if let Some(value) = token.get(4).or(token.get(5)) {
                    parsed.positional.push(value.as_str().to_string());
                }
            }
        }
    }

    Some(parsed)
}

struct CommandInstance<'a> {
    app: &'a mut Steward,

    command: &'a str,
    positional: &'a [String],
    options: &'a [(String, String)],
}

pub struct Commands;
impl Commands {
    /// Runs one command line against `app` and returns what to print back.
    pub async fn run_command(app: &mut Steward, line: &str) -> Result<String> {
        let Some(parsed) = parse_line(line) else {
            return Ok(String::new());
        };
        let command = parsed.command.as_str();

        let mut cmd = CommandInstance {
            app,
            command,
            positional: &parsed.positional,
            options: &parsed.options,
        };

        // Execute the command
        let result: String = match command {
                      "help" => Self::get_help(),
                    "signup" => cmd.signup()?,
                    "signin" => cmd.signin()?,
                   "signout" => cmd.signout(),
                    "whoami" => cmd.whoami()?,
                   "profile" => cmd.profile()?,
            "update-profile" => cmd.update_profile()?,
                     "adopt" => cmd.adopt()?,
                   "release" => cmd.release()?,
                   "cleanup" => cmd.cleanup().await?,
                    "hazard" => cmd.hazard().await?,
             "hazard-status" => cmd.hazard_status()?,
                     "plant" => cmd.plant().await?,
                     "event" => cmd.event()?,
                    "attend" => cmd.attend()?,
                      "like" => cmd.like()?,
                  "cleanups" => cmd.list_cleanups(),
                   "hazards" => cmd.list_hazards(),
                    "plants" => cmd.list_plants(),
                    "events" => cmd.list_events(),
               "leaderboard" => cmd.list_leaderboard(),
                   "refresh" => cmd.refresh(),
                    "export" => cmd.export()?,
              "delete-photo" => cmd.delete_photo().await?,
            _ => {
                if Commands::is_valid_cmd(command) {
                    log::info!("User submitted unknown command: {}", command);
                    return Err(anyhow!("No such command found: {}, see `help` for commands.", command));
                } else {
                    log::info!("User submitted invalid command: {}", command);
                    return Err(anyhow!("Invalid command syntax."));
                }
            }
        };

        Ok(result)
    }
}

/// Argument helpers
impl<'a> CommandInstance<'a> {
    /// The last value given for `key`.
    fn option(&self, key: &str) -> Option<&'a str> {
        self.options
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, value)| value.as_str())
    }

    /// Every value given for `key`, in order.
    fn all_options(&self, key: &str) -> Vec<&'a str> {
        self.options
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, value)| value.as_str())
            .collect()
    }

    fn required(&self, key: &str, usage: &str) -> Result<&'a str> {
        self.option(key)
            .filter(|value| !value.trim().is_empty())
            .with_context(|| format!("`{}` needs `{key}=`. Expected usage: `{usage}`", self.command))
    }

    fn parsed<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.option(key)
            .map(|value| value.trim().parse::<T>().map_err(|err| anyhow!("Invalid {key}={value}: {err}")))
            .transpose()
    }

    fn positional_id(&self, usage: &str) -> Result<i64> {
        let id = self.positional
            .first()
            .with_context(|| format!("Expected an id. Expected usage: `{usage}`"))?;
        id.parse().map_err(|_| anyhow!("'{id}' is not an id. Expected usage: `{usage}`"))
    }

    /// Free text made of every positional argument.
    fn positional_text(&self, usage: &str) -> Result<String> {
        let text = self.positional.join(" ");
        if text.trim().is_empty() {
            bail!("Expected usage: `{usage}`");
        }
        Ok(text)
    }

    /// Resolves every `photo=` option to a URL, uploading local files into `bucket`.
    async fn photos(&self, bucket: Bucket) -> Result<Vec<String>> {
        let user_id = self.app.user_id().context("You need to sign in first.")?;
        let mut urls = Vec::new();

        for photo in self.all_options("photo") {
            if photo.starts_with("http://") || photo.starts_with("https://") {
                urls.push(photo.to_string());
                continue;
            }

            let storage = self.app
                .storage()
                .with_context(|| format!("Can't upload {photo}: photo storage isn't configured."))?;
            urls.push(storage.upload(Path::new(photo), bucket, user_id).await?);
        }

        Ok(urls)
    }
}

/// Account commands
impl CommandInstance<'_> {
    fn signup(&mut self) -> Result<String> {
        let usage = "signup name=<name> email=<email>";
        let name = self.required("name", usage)?;
        let email = self.required("email", usage)?;

        let profile = self.app.sign_up(name, email)?;
        Ok(format!("Welcome, {}! Your steward id is {}.", profile.name, profile.id))
    }

    fn signin(&mut self) -> Result<String> {
        let id = self.positional_id("signin <id>")?;
        let profile = self.app.sign_in(id)?;
        Ok(format!("Signed in as {} (#{}).", profile.name, profile.id))
    }

    fn signout(&mut self) -> String {
        self.app.sign_out();
        String::from("Signed out.")
    }

    fn whoami(&self) -> Result<String> {
        if self.app.user_id().is_none() {
            return Ok(String::from("Not signed in."));
        }
        let profile = self.app.profile()?;
        Ok(format!("Signed in as {} (#{}).", profile.name, profile.id))
    }

    fn profile(&mut self) -> Result<String> {
        let profile = self.app.profile()?;
        self.app.refresh_leaderboard();
        let rank = self.app
            .rank()
            .map_or_else(|| String::from("unranked"), |rank| format!("#{rank}"));

        Ok(format!("{profile}\n\tRank: {rank}"))
    }

    fn update_profile(&mut self) -> Result<String> {
        let update = models::ProfileUpdate {
            name: self.option("name").map(str::to_string),
            bio: self.option("bio").map(str::to_string),
            avatar_url: self.option("avatar").map(str::to_string),
        };

        let profile = self.app.update_profile(&update)?;
        Ok(format!("{profile}"))
    }

    fn adopt(&mut self) -> Result<String> {
        let street = self.positional_text("adopt <street name>")?;
        Ok(if self.app.adopt_street(&street)? {
            format!("You adopted {street}.")
        } else {
            format!("You've already adopted {street}.")
        })
    }

    fn release(&mut self) -> Result<String> {
        let street = self.positional_text("release <street name>")?;
        Ok(if self.app.release_street(&street)? {
            format!("You released {street}.")
        } else {
            format!("You haven't adopted {street}.")
        })
    }
}

/// Activity commands
impl CommandInstance<'_> {
    async fn cleanup(&mut self) -> Result<String> {
        let usage = "cleanup location=<where> bags=<n> [minutes=<n>] [notes=<text>] \
                     [before=<url>] [after=<url>] [photo=<file|url>]...";
        let location = self.required("location", usage)?;
        let trash_bags = at_least(
            self.parsed::<i64>("bags")?.unwrap_or(i64::from(MIN_TRASH_BAGS)),
            MIN_TRASH_BAGS,
            "bags",
        );
        let duration_minutes = round_up_to_step(
            at_least(
                self.parsed::<i64>("minutes")?.unwrap_or(i64::from(DEFAULT_DURATION_MINUTES)),
                MIN_DURATION_MINUTES,
                "minutes",
            ),
            DURATION_STEP_MINUTES,
        );
        let photos = self.photos(Bucket::CleanupPhotos).await?;

        let cleanup = models::NewCleanup {
            date: Utc::now(),
            location: location.to_string(),
            duration_minutes,
            trash_bags,
            notes: self.option("notes").map(str::to_string),
            before_photo: self.option("before").map(str::to_string),
            after_photo: self.option("after").map(str::to_string),
            photos,
        };

        let log = self.app.log_cleanup(&cleanup)?;
        Ok(format!("Thanks for cleaning up! You earned {} points.\n{log}", log.points))
    }

    async fn hazard(&mut self) -> Result<String> {
        let usage = "hazard location=<where> description=<text> [type=pothole|debris|large-trash|other] \
                     [severity=low|medium|high] [photo=<file|url>]...";
        let location = self.required("location", usage)?;
        let description = self.required("description", usage)?;
        let photos = self.photos(Bucket::HazardPhotos).await?;

        let hazard = models::NewHazard {
            kind: self.parsed::<HazardType>("type")?.unwrap_or(HazardType::Pothole),
            severity: self.parsed::<HazardSeverity>("severity")?.unwrap_or(HazardSeverity::Medium),
            location: location.to_string(),
            description: description.to_string(),
            photos,
        };

        let report = self.app.report_hazard(&hazard)?;
        Ok(format!(
            "Hazard reported. You earned {} points.\n{report}",
            points::Activity::HazardReport.points()
        ))
    }

    fn hazard_status(&mut self) -> Result<String> {
        let usage = "hazard-status <id> reported|in-progress|resolved";
        let id = self.positional_id(usage)?;
        let status = self.positional
            .get(1)
            .with_context(|| format!("Expected a status. Expected usage: `{usage}`"))?
            .parse::<HazardStatus>()?;

        let report = self.app.set_hazard_status(id, status)?;
        Ok(format!("{report}"))
    }

    async fn plant(&mut self) -> Result<String> {
        let usage = "plant name=<plant> location=<where> description=<text> [scientific=<name>] \
                     [pollinator=true|false] [care=<text>] [photo=<file|url>]...";
        let plant_name = self.required("name", usage)?;
        let location = self.required("location", usage)?;
        let description = self.required("description", usage)?;
        let photos = self.photos(Bucket::PlantPhotos).await?;

        let plant = models::NewPlant {
            plant_name: plant_name.to_string(),
            scientific_name: self.option("scientific").map(str::to_string),
            location: location.to_string(),
            description: description.to_string(),
            pollinator_friendly: self.parsed::<bool>("pollinator")?.unwrap_or(false),
            care_instructions: self.option("care").map(str::to_string),
            photos,
        };

        let post = self.app.post_plant(&plant)?;
        Ok(format!(
            "Thanks for sharing! You earned {} points.\n{post}",
            points::Activity::PlantPost.points()
        ))
    }

    fn event(&mut self) -> Result<String> {
        let usage = "event title=<title> type=cleanup|block-party|planting|other location=<where> \
                     date=YYYY-MM-DD start=HH:MM end=HH:MM [description=<text>] [max=<n>]";
        let title = self.required("title", usage)?;
        let location = self.required("location", usage)?;
        let date = NaiveDate::parse_from_str(self.required("date", usage)?, "%Y-%m-%d")
            .context("Expected date=YYYY-MM-DD")?;

        let event = models::NewEvent {
            title: title.to_string(),
            description: self.option("description").unwrap_or_default().to_string(),
            kind: self.parsed::<EventType>("type")?.unwrap_or(EventType::Other),
            location: location.to_string(),
            date,
            start_time: parse_time(self.required("start", usage)?)?,
            end_time: parse_time(self.required("end", usage)?)?,
            max_attendees: self.parsed::<u32>("max")?.filter(|max| *max > 0),
        };

        let created = self.app.create_event(&event)?;
        Ok(format!(
            "Event created. You earned {} points.\n{created}",
            points::Activity::EventOrganization.points()
        ))
    }

    fn attend(&mut self) -> Result<String> {
        let id = self.positional_id("attend <event id>")?;
        Ok(if self.app.toggle_attendance(id)? {
            format!("You're going to event {id}.")
        } else {
            format!("You're no longer going to event {id}.")
        })
    }

    fn like(&mut self) -> Result<String> {
        let id = self.positional_id("like <plant id>")?;
        Ok(if self.app.toggle_like(id)? {
            format!("You liked plant {id}.")
        } else {
            format!("You unliked plant {id}.")
        })
    }

    async fn delete_photo(&mut self) -> Result<String> {
        let usage = "delete-photo bucket=<bucket> url=<public url>";
        let bucket = self.required("bucket", usage)?.parse::<Bucket>()?;
        let url = self.required("url", usage)?;

        self.app
            .storage()
            .context("Photo storage isn't configured.")?
            .delete(url, bucket)
            .await?;
        Ok(String::from("Photo deleted."))
    }
}

/// Listing commands
impl CommandInstance<'_> {
    fn list_cleanups(&mut self) -> String {
        listing("**Cleanups:**", "No cleanups logged yet.", self.app.refresh_cleanups())
    }

    fn list_hazards(&mut self) -> String {
        listing("**Hazards:**", "No hazards reported.", self.app.refresh_hazards())
    }

    fn list_plants(&mut self) -> String {
        listing("**Plants:**", "No plants shared yet.", self.app.refresh_plants())
    }

    fn list_events(&mut self) -> String {
        listing("**Upcoming events:**", "No events planned.", self.app.refresh_events())
    }

    fn list_leaderboard(&mut self) -> String {
        let entries = self.app.refresh_leaderboard();
        if entries.is_empty() {
            return String::from("Nobody has signed up yet.");
        }
        format!("**Leaderboard:**\n{}", entries.iter().join("\n"))
    }

    fn refresh(&mut self) -> String {
        self.app.refresh_all();
        format!(
            "Loaded {} cleanups, {} hazards, {} plants, {} events.",
            self.app.cleanups.items().len(),
            self.app.hazards.items().len(),
            self.app.plants.items().len(),
            self.app.events.items().len()
        )
    }

    fn export(&self) -> Result<String> {
        let export = serde_json::json!({
            "cleanups": self.app.cleanups.items(),
            "hazards": self.app.hazards.items(),
            "plants": self.app.plants.items(),
            "events": self.app.events.items(),
            "leaderboard": self.app.leaderboard.items(),
        });

        Ok(serde_json::to_string_pretty(&export)?)
    }
}

/// Non-async helpers
impl Commands {
    /// Ensures that the string slice looks like a command name
    fn is_valid_cmd(s: &str) -> bool {
        s.len() <= MAX_CMD_LENGTH && COMMAND_NAME.is_match(s)
    }

    /// Gets a help string. Should be updated after a new command is added
    pub fn get_help() -> String {
        String::from(
            r#"
**Command List:**
`signup name=<name> email=<email>`:  Create a profile and sign in.
`signin <id>` / `signout` / `whoami`:  Switch who you are.
`profile`:  Your points, level and rank.
`update-profile [name=] [bio=] [avatar=]`:  Edit your profile.
`adopt <street>` / `release <street>`:  Adopt or release a street.
`cleanup location= bags= [minutes=] [notes=] [photo=]...`:  Log a cleanup (50 pts per bag).
`hazard location= description= [type=] [severity=] [photo=]...`:  Report a hazard (25 pts).
`hazard-status <id> <status>`:  Move a hazard to reported, in-progress or resolved.
`plant name= location= description= [scientific=] [pollinator=] [care=] [photo=]...`:  Share a plant (15 pts).
`event title= type= location= date= start= end= [description=] [max=]`:  Organize an event (200 pts).
`attend <event id>`:  Join or leave an event (100 pts the first time you join).
`like <plant id>`:  Like or unlike a plant post.
`cleanups` / `hazards` / `plants` / `events` / `leaderboard`:  Browse.
`refresh`:  Reload everything.
`export`:  Dump everything loaded as JSON.
`delete-photo bucket= url=`:  Delete an uploaded photo.
`quit`:  Leave.
"#,
        )
    }
}

fn listing<T: std::fmt::Display>(title: &str, empty: &str, items: &[T]) -> String {
    if items.is_empty() {
        return String::from(empty);
    }
    format!("{title}\n{}", items.iter().join("\n\n"))
}

/// Raises `value` to `floor`, warning when it had to.
fn at_least(value: i64, floor: u32, what: &str) -> u32 {
    if value < i64::from(floor) {
        log::warn!("Raising {what}={value} to the minimum of {floor}.");
        return floor;
    }
    u32::try_from(value).unwrap_or(u32::MAX)
}

/// Durations are logged in whole steps of `step` minutes.
fn round_up_to_step(minutes: u32, step: u32) -> u32 {
    let rounded = minutes.div_ceil(step).saturating_mul(step);
    if rounded != minutes {
        log::warn!("Rounding minutes={minutes} up to {rounded}.");
    }
    rounded
}

fn parse_time(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .with_context(|| format!("Expected a time like 09:30, got '{value}'"))
}
