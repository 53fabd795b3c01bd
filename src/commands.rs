//! Line-oriented front end over the session controller.

use std::fmt::Write as _;

use anyhow::{anyhow, bail, Result};
use log::warn;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::{
    stats::GlobalStats,
    timer::{CommitOutcome, TimerSnapshot, TimerStatus},
    AppState,
};

pub const HELP: &str = "\
commands:
  signup NAME     create a profile and sign in
  signin NAME     sign in to an existing profile
  signout         sign out
  duration MIN    set the session length (5-180 minutes)
  start           start meditating
  stop            end the session early
  + / -           adjust the distraction count while reviewing
  commit          save the reviewed session
  discard         throw the reviewed session away
  status          show the timer
  history         list your sessions
  stats           show everyone's totals
  help            show this message
  quit            leave";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SignUp(String),
    SignIn(String),
    SignOut,
    Duration(u32),
    Start,
    Stop,
    Increment,
    Decrement,
    Commit,
    Discard,
    Status,
    History,
    Stats,
    Help,
    Quit,
}

impl Command {
    /// `Ok(None)` for a blank line.
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let name = |what: &str| -> Result<String> {
            if rest.is_empty() {
                bail!("usage: {what} NAME");
            }
            Ok(rest.to_string())
        };

        let command = match word.to_ascii_lowercase().as_str() {
            "signup" => Command::SignUp(name("signup")?),
            "signin" => Command::SignIn(name("signin")?),
            "signout" => Command::SignOut,
            "duration" => Command::Duration(
                rest.parse()
                    .map_err(|_| anyhow!("usage: duration MINUTES"))?,
            ),
            "start" => Command::Start,
            "stop" => Command::Stop,
            "+" => Command::Increment,
            "-" => Command::Decrement,
            "commit" => Command::Commit,
            "discard" => Command::Discard,
            "status" => Command::Status,
            "history" => Command::History,
            "stats" => Command::Stats,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => bail!("unknown command '{other}' (try 'help')"),
        };
        Ok(Some(command))
    }
}

pub fn format_clock(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

pub fn describe(snapshot: &TimerSnapshot) -> String {
    match (snapshot.state.status, &snapshot.review) {
        (TimerStatus::Idle, _) => format!(
            "ready: {} minutes ({})",
            snapshot.state.duration_minutes,
            format_clock(snapshot.remaining_secs)
        ),
        (TimerStatus::Running, _) => {
            format!("meditating: {} left", format_clock(snapshot.remaining_secs))
        }
        (TimerStatus::Stopped, Some(review)) => format!(
            "review: {} minute(s), {} distraction(s) (+/-, commit, discard)",
            review.duration_minutes(),
            review.distractions()
        ),
        (TimerStatus::Stopped, None) => "saving...".to_string(),
    }
}

pub fn describe_stats(stats: &GlobalStats) -> String {
    let (hours, minutes) = stats.total_time();
    format!(
        "everyone: {} session(s), {}h {}m total, {} min average",
        stats.total_sessions, hours, minutes, stats.average_minutes
    )
}

/// Run one command and return what to show. Rejections become notices;
/// only infrastructure failures are errors.
pub async fn execute(app: &AppState, command: Command) -> Result<String> {
    let notice = |err: &dyn std::fmt::Display| format!("notice: {err}");

    let output = match command {
        Command::SignUp(name) => match app.identity.sign_up(&name).await {
            Ok(user) => format!("welcome, {}", user.display_name),
            Err(err) => notice(&err),
        },
        Command::SignIn(name) => match app.identity.sign_in(&name).await {
            Ok(user) => format!("welcome back, {}", user.display_name),
            Err(err) => notice(&err),
        },
        Command::SignOut => {
            app.identity.sign_out();
            "signed out".to_string()
        }
        Command::Duration(minutes) => match app.timer.set_duration(minutes).await {
            Ok(()) => {
                if let Err(err) = app.settings.update_default_duration(minutes) {
                    warn!("Could not remember duration: {err:#}");
                }
                describe(&app.timer.snapshot().await)
            }
            Err(err) => notice(&err),
        },
        Command::Start => match app.timer.start().await {
            Ok(snapshot) => describe(&snapshot),
            Err(err) => notice(&err),
        },
        Command::Stop => match app.timer.stop().await {
            Ok(_) => describe(&app.timer.snapshot().await),
            Err(err) => notice(&err),
        },
        Command::Increment => match app.timer.increment_distractions().await {
            Ok(count) => format!("distractions: {count}"),
            Err(err) => notice(&err),
        },
        Command::Decrement => match app.timer.decrement_distractions().await {
            Ok(count) => format!("distractions: {count}"),
            Err(err) => notice(&err),
        },
        Command::Commit => match app.timer.commit().await {
            Ok(CommitOutcome::Saved(record)) => {
                format!("saved {} minute(s)", record.duration_minutes)
            }
            Ok(CommitOutcome::Lost) => "session could not be saved".to_string(),
            Err(err) => notice(&err),
        },
        Command::Discard => match app.timer.discard().await {
            Ok(()) => "discarded".to_string(),
            Err(err) => notice(&err),
        },
        Command::Status => describe(&app.timer.snapshot().await),
        Command::History => {
            let sessions = app.timer.sessions().await;
            if sessions.is_empty() {
                "no sessions yet".to_string()
            } else {
                let mut out = String::new();
                for session in sessions {
                    let _ = writeln!(
                        out,
                        "{}  {:>3} min  {} distraction(s)",
                        session.completed_at.format("%Y-%m-%d %H:%M"),
                        session.duration_minutes,
                        session.distractions
                    );
                }
                out.trim_end().to_string()
            }
        }
        Command::Stats => describe_stats(&app.stats.current()),
        Command::Help => HELP.to_string(),
        Command::Quit => String::new(),
    };

    Ok(output)
}

/// Read commands from stdin until `quit` or end of input.
pub async fn repl(app: &AppState) -> Result<()> {
    println!("{HELP}");
    println!("{}", describe(&app.timer.snapshot().await));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                println!("{err}");
                continue;
            }
        };
        if command == Command::Quit {
            break;
        }
        println!("{}", execute(app, command).await?);
    }

    Ok(())
}
