//! Interactive session shell
//!
//! Line-oriented front end over the store, the output synchronizer and the
//! update pipeline. Owns the transient per-session state the documents do
//! not carry: the active profile, the current selection, the lock and the
//! output toggle. Streak rules live in the store; this layer only decides
//! when they may run.

use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::characters::{CharacterKey, KILLERS, SurvivorMode};
use crate::constants::artifacts;
use crate::output::OutputSync;
use crate::persist::AppPaths;
use crate::settings::Settings;
use crate::store::{CharacterRecord, StoreError, StreakStore};
use crate::update::manifest::VersionOrdering;
use crate::update::{UpdateCoordinator, UpdateEvent, UpdateNotice, UpdatePhase};

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Quit,
    Status,
    Roster,
    ProfileList,
    ProfileNew(String),
    ProfileDelete(String),
    ProfileUse(String),
    Select(String),
    Mode(String),
    Lock,
    Unlock,
    Win,
    Finish,
    Reset,
    Output(bool),
    Image(Option<PathBuf>),
    Import(PathBuf),
    Export(PathBuf),
    UpdateCheck,
    UpdateApply,
    UpdateDismiss,
    UpdateMute(bool),
    UpdateCancel,
}

impl Command {
    /// Parses one line. `Ok(None)` is a blank line; `Err` carries the usage
    /// hint to print.
    pub fn parse(line: &str) -> Result<Option<Command>, String> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(&verb) = tokens.first() else {
            return Ok(None);
        };
        let command = match verb.to_ascii_lowercase().as_str() {
            "help" => Command::Help,
            "quit" | "exit" => Command::Quit,
            "status" => Command::Status,
            "roster" => Command::Roster,
            "profile" => return parse_profile(&tokens[1..]).map(Some),
            "select" => {
                let name = tokens[1..].join(" ");
                if name.is_empty() {
                    return Err("usage: select <character>".to_string());
                }
                Command::Select(name)
            }
            "mode" => {
                let mode = tokens[1..].join(" ");
                if mode.is_empty() {
                    return Err("usage: mode <solo|2|3|4>".to_string());
                }
                Command::Mode(mode)
            }
            "lock" => Command::Lock,
            "unlock" => Command::Unlock,
            "win" => Command::Win,
            "finish" => Command::Finish,
            "reset" => Command::Reset,
            "output" => match tokens.get(1).copied() {
                Some("on") => Command::Output(true),
                Some("off") => Command::Output(false),
                _ => return Err("usage: output <on|off>".to_string()),
            },
            "image" => match tokens.get(1).copied() {
                Some("clear") => Command::Image(None),
                Some(_) => Command::Image(Some(PathBuf::from(tokens[1..].join(" ")))),
                None => return Err("usage: image <path> | image clear".to_string()),
            },
            "import" => {
                let path = tokens[1..].join(" ");
                if path.is_empty() {
                    return Err("usage: import <file>".to_string());
                }
                Command::Import(PathBuf::from(path))
            }
            "export" => {
                let path = tokens[1..].join(" ");
                if path.is_empty() {
                    return Err("usage: export <file>".to_string());
                }
                Command::Export(PathBuf::from(path))
            }
            "update" => return parse_update(tokens.get(1).copied()).map(Some),
            other => return Err(format!("unknown command '{other}', try 'help'")),
        };
        Ok(Some(command))
    }
}

fn parse_profile(args: &[&str]) -> Result<Command, String> {
    const USAGE: &str = "usage: profile <list|new|delete|use> [name]";
    let Some(&sub) = args.first() else {
        return Err(USAGE.to_string());
    };
    let name = args[1..].join(" ");
    match sub.to_ascii_lowercase().as_str() {
        "list" => Ok(Command::ProfileList),
        "new" if !name.is_empty() => Ok(Command::ProfileNew(name)),
        "delete" if !name.is_empty() => Ok(Command::ProfileDelete(name)),
        "use" if !name.is_empty() => Ok(Command::ProfileUse(name)),
        _ => Err(USAGE.to_string()),
    }
}

fn parse_update(sub: Option<&str>) -> Result<Command, String> {
    match sub.map(|sub| sub.to_ascii_lowercase()).as_deref() {
        Some("check") => Ok(Command::UpdateCheck),
        Some("apply") => Ok(Command::UpdateApply),
        Some("dismiss") => Ok(Command::UpdateDismiss),
        Some("mute") => Ok(Command::UpdateMute(true)),
        Some("unmute") => Ok(Command::UpdateMute(false)),
        Some("cancel") => Ok(Command::UpdateCancel),
        _ => Err("usage: update <check|apply|dismiss|cancel|mute|unmute>".to_string()),
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Session {
    store: StreakStore,
    settings: Settings,
    paths: AppPaths,
    output: OutputSync,
    updates: UpdateCoordinator,
    exe_path: PathBuf,
    active_profile: Option<String>,
    selection: CharacterKey,
    survivor_mode: SurvivorMode,
    lock_active: bool,
    output_enabled: bool,
    last_percent: Option<u8>,
    last_mib: u64,
}

impl Session {
    pub fn new(paths: AppPaths, events: Sender<UpdateEvent>) -> Result<Self> {
        let store = StreakStore::load_or_default(paths.profiles_file());
        let settings = Settings::load_or_default(&paths.settings_file());
        let output = OutputSync::new(paths.output_dir.clone(), paths.image_dir());
        if let Err(err) = output.ensure_dirs() {
            warn!(error = %err, "could not prepare the output directory");
        }
        let exe_path =
            std::env::current_exe().context("could not resolve the running binary")?;
        let mut updates = UpdateCoordinator::new(env!("CARGO_PKG_VERSION"), events);
        // UPDATE_MANIFEST_URL points a session at a staging manifest;
        // UPDATE_VERSION_ORDER=legacy restores plain string comparison
        if let Ok(url) = std::env::var("UPDATE_MANIFEST_URL") {
            updates = updates.with_manifest_url(url);
        }
        if std::env::var("UPDATE_VERSION_ORDER").is_ok_and(|order| order == "legacy") {
            updates = updates.with_ordering(VersionOrdering::Lexicographic);
        }
        Ok(Self {
            store,
            settings,
            paths,
            output,
            updates,
            exe_path,
            active_profile: None,
            selection: CharacterKey::Survivor(SurvivorMode::Solo),
            survivor_mode: SurvivorMode::Solo,
            lock_active: false,
            output_enabled: true,
            last_percent: None,
            last_mib: 0,
        })
    }

    /// Prints the banner and kicks off the automatic update check.
    pub fn start(&mut self) {
        println!("Winstreak Tracker {}", self.updates.current_version());
        println!("Profiles: {}", self.store.path().display());
        println!("Output:   {}", self.output.output_dir().display());
        let names = self.store.profile_names();
        if names.is_empty() {
            println!("No profiles yet. Create one with 'profile new <name>'.");
        } else {
            println!("Available profiles: {}", names.join(", "));
        }
        println!("Type 'help' for commands.");

        if self.settings.suppress_updates {
            debug!("automatic update check suppressed");
        } else if let Err(err) = self.updates.begin_check(false) {
            warn!(error = %err, "could not start the update check");
        }
    }

    /// Runs one command. Errors are rendered, never propagated; the session
    /// outlives every failed command.
    pub fn dispatch(&mut self, line: &str) -> Flow {
        let command = match Command::parse(line) {
            Ok(Some(command)) => command,
            Ok(None) => return Flow::Continue,
            Err(usage) => {
                println!("{usage}");
                return Flow::Continue;
            }
        };
        match command {
            Command::Quit => return Flow::Quit,
            Command::Help => print_help(),
            Command::Status => self.show_status(),
            Command::Roster => print_roster(),
            Command::ProfileList => self.list_profiles(),
            Command::ProfileNew(name) => self.create_profile(&name),
            Command::ProfileDelete(name) => self.delete_profile(&name),
            Command::ProfileUse(name) => self.use_profile(&name),
            Command::Select(name) => self.select_character(&name),
            Command::Mode(mode) => self.select_mode(&mode),
            Command::Lock => self.engage_lock(),
            Command::Unlock => self.release_lock(),
            Command::Win => self.record_win(),
            Command::Finish => self.finish_streak(),
            Command::Reset => self.reset_streak(),
            Command::Output(enabled) => self.toggle_output(enabled),
            Command::Image(path) => self.set_image(path),
            Command::Import(path) => self.import_profiles(&path),
            Command::Export(path) => self.export_profiles(&path),
            Command::UpdateCheck => self.update_check(),
            Command::UpdateApply => self.update_apply(),
            Command::UpdateDismiss => self.update_dismiss(),
            Command::UpdateMute(mute) => self.update_mute(mute),
            Command::UpdateCancel => self.update_cancel(),
        }
        Flow::Continue
    }

    /// Absorbs one worker event. Extraction and replacement run here, on the
    /// shell thread.
    pub fn handle_update_event(&mut self, event: UpdateEvent) {
        let image_dir = self.output.image_dir().to_path_buf();
        let notice = self.updates.handle_event(event, &image_dir, &self.exe_path);
        self.render_notice(notice);
    }

    fn require_profile(&mut self) -> Option<String> {
        match &self.active_profile {
            Some(name) => Some(name.clone()),
            None => {
                println!("No active profile. Pick one with 'profile use <name>'.");
                None
            }
        }
    }

    fn show_record(&self, record: &CharacterRecord) {
        let best = if record.live {
            artifacts::LIVE_SENTINEL.to_string()
        } else {
            record.personal_best.to_string()
        };
        println!(
            "{} | streak {} | best {} | wins {}",
            self.selection, record.current_streak, best, record.wins
        );
    }

    /// Mirrors a record to the overlay artifacts when output is enabled and
    /// the selection is committed.
    fn sync_output(&self, record: &CharacterRecord) {
        if !(self.output_enabled && self.lock_active) {
            return;
        }
        if let Err(err) = self.output.sync(&self.selection, record) {
            println!("warning: overlay output failed: {err:#}");
        }
    }

    fn list_profiles(&self) {
        let names = self.store.profile_names();
        if names.is_empty() {
            println!("No profiles yet. Create one with 'profile new <name>'.");
            return;
        }
        for name in names {
            if self.active_profile.as_deref() == Some(name.as_str()) {
                println!("* {name}");
            } else {
                println!("  {name}");
            }
        }
    }

    /// Activating a profile returns the selection to its starting point,
    /// Survivor in solo mode.
    fn activate_profile(&mut self, name: &str) {
        self.active_profile = Some(name.to_string());
        self.survivor_mode = SurvivorMode::Solo;
        self.selection = CharacterKey::Survivor(SurvivorMode::Solo);
    }

    fn create_profile(&mut self, name: &str) {
        if self.lock_active {
            println!("Unlock before switching profiles.");
            return;
        }
        match self.store.create_profile(name) {
            Ok(()) => {
                self.activate_profile(name);
                println!("Profile '{name}' created and active.");
            }
            Err(err) => println!("error: {err}"),
        }
    }

    fn delete_profile(&mut self, name: &str) {
        if self.lock_active && self.active_profile.as_deref() == Some(name) {
            println!("Unlock before deleting the active profile.");
            return;
        }
        match self.store.delete_profile(name) {
            Ok(()) => {
                if self.active_profile.as_deref() == Some(name) {
                    self.active_profile = None;
                }
                println!("Profile '{name}' deleted.");
            }
            Err(err) => println!("error: {err}"),
        }
    }

    fn use_profile(&mut self, name: &str) {
        if self.lock_active {
            println!("Unlock before switching profiles.");
            return;
        }
        if !self.store.has_profile(name) {
            println!("error: {}", StoreError::ProfileNotFound(name.to_string()));
            return;
        }
        self.activate_profile(name);
        // Peek only; switching profiles should not mint records
        let record = self
            .store
            .get(name, &self.selection.storage_key())
            .cloned()
            .unwrap_or_default();
        println!("Profile '{name}' active.");
        self.show_record(&record);
    }

    fn select_character(&mut self, name: &str) {
        if self.lock_active {
            println!("Selection is locked. 'unlock' first.");
            return;
        }
        let Some(profile) = self.require_profile() else {
            return;
        };
        // Bare "survivor" keeps the remembered group size
        let key = if name.trim().eq_ignore_ascii_case("survivor") {
            CharacterKey::Survivor(self.survivor_mode)
        } else {
            match CharacterKey::parse(name) {
                Some(key) => key,
                None => {
                    println!("Unknown character '{name}'. 'roster' lists everyone.");
                    return;
                }
            }
        };
        if let CharacterKey::Survivor(mode) = &key {
            self.survivor_mode = *mode;
        }
        self.selection = key;
        let record = self
            .store
            .get_or_create(&profile, &self.selection.storage_key());
        self.show_record(&record);
    }

    fn select_mode(&mut self, input: &str) {
        if self.lock_active {
            println!("Selection is locked. 'unlock' first.");
            return;
        }
        let Some(mode) = SurvivorMode::parse(input) else {
            println!("Unknown mode '{input}'. Use solo, 2, 3 or 4.");
            return;
        };
        self.survivor_mode = mode;
        if matches!(self.selection, CharacterKey::Survivor(_)) {
            self.selection = CharacterKey::Survivor(mode);
            if let Some(profile) = self.active_profile.clone() {
                let record = self
                    .store
                    .get_or_create(&profile, &self.selection.storage_key());
                self.show_record(&record);
            }
        } else {
            println!("Survivor mode set to {}.", mode.label());
        }
    }

    fn engage_lock(&mut self) {
        let Some(profile) = self.require_profile() else {
            return;
        };
        if self.lock_active {
            println!("Already locked on {}.", self.selection);
            return;
        }
        self.lock_active = true;
        let record = self
            .store
            .get_or_create(&profile, &self.selection.storage_key());
        println!("Locked on {}. Wins now count.", self.selection);
        self.sync_output(&record);
    }

    fn release_lock(&mut self) {
        if !self.lock_active {
            println!("Not locked.");
            return;
        }
        self.lock_active = false;
        println!("Unlocked. Selection may change; wins are ignored.");
    }

    fn record_win(&mut self) {
        let Some(profile) = self.require_profile() else {
            return;
        };
        if !self.lock_active {
            debug!("win ignored without an active lock");
            println!("Not locked; win not recorded. 'lock' first.");
            return;
        }
        match self.store.record_win(&profile, &self.selection.storage_key()) {
            Ok(record) => {
                self.show_record(&record);
                self.sync_output(&record);
            }
            Err(err) => println!("error: {err}"),
        }
    }

    fn finish_streak(&mut self) {
        let Some(profile) = self.require_profile() else {
            return;
        };
        match self
            .store
            .finish_streak(&profile, &self.selection.storage_key())
        {
            Ok(record) => {
                if record.current_streak == 0 {
                    println!("No running streak to finalize.");
                } else {
                    self.show_record(&record);
                }
                self.sync_output(&record);
            }
            Err(err) => println!("error: {err}"),
        }
    }

    fn reset_streak(&mut self) {
        let Some(profile) = self.require_profile() else {
            return;
        };
        match self
            .store
            .reset_streak(&profile, &self.selection.storage_key())
        {
            Ok(record) => {
                println!("Counters reset.");
                self.show_record(&record);
                self.sync_output(&record);
            }
            Err(err) => println!("error: {err}"),
        }
    }

    fn toggle_output(&mut self, enabled: bool) {
        self.output_enabled = enabled;
        if enabled {
            println!(
                "Overlay output on -> {}",
                self.output.output_dir().display()
            );
            if self.lock_active
                && let Some(profile) = self.active_profile.clone()
            {
                let record = self
                    .store
                    .get_or_create(&profile, &self.selection.storage_key());
                self.sync_output(&record);
            }
        } else {
            println!("Overlay output off.");
        }
    }

    fn set_image(&mut self, image: Option<PathBuf>) {
        let Some(profile) = self.require_profile() else {
            return;
        };
        if let Some(path) = &image
            && !path.exists()
        {
            println!("warning: {} does not exist yet", path.display());
        }
        let cleared = image.is_none();
        match self
            .store
            .set_image_override(&profile, &self.selection.storage_key(), image)
        {
            Ok(record) => {
                if cleared {
                    println!("Portrait override cleared.");
                } else {
                    println!("Portrait override saved.");
                }
                self.sync_output(&record);
            }
            Err(err) => println!("error: {err}"),
        }
    }

    fn import_profiles(&mut self, path: &Path) {
        match self.store.import(path) {
            Ok(count) => println!("Imported {count} profile(s)."),
            Err(err) => println!("error: {err}"),
        }
    }

    fn export_profiles(&self, path: &Path) {
        match self.store.export(path) {
            Ok(()) => println!("Profiles exported to {}.", path.display()),
            Err(err) => println!("error: {err}"),
        }
    }

    fn update_check(&mut self) {
        match self.updates.begin_check(true) {
            Ok(()) => println!("Checking for updates..."),
            Err(err) => println!("error: {err}"),
        }
    }

    fn update_apply(&mut self) {
        if self.updates.phase() != UpdatePhase::UpdateAvailable {
            println!("No pending update. 'update check' first.");
            return;
        }
        match self.updates.begin_download() {
            Ok(()) => {
                self.last_percent = None;
                self.last_mib = 0;
                println!("Downloading update...");
            }
            Err(err) => println!("error: {err}"),
        }
    }

    fn update_dismiss(&mut self) {
        let offered = self
            .updates
            .pending_manifest()
            .map(|manifest| manifest.version.clone());
        if self.updates.dismiss() {
            match offered {
                Some(version) => println!(
                    "Update {version} dismissed; staying on {}.",
                    self.updates.current_version()
                ),
                None => println!("Update dismissed."),
            }
        } else {
            println!("No pending update to dismiss.");
        }
    }

    fn update_mute(&mut self, mute: bool) {
        self.settings.suppress_updates = mute;
        if let Err(err) = self.settings.save(&self.paths.settings_file()) {
            println!("error: {err}");
            return;
        }
        if mute {
            println!("Automatic update checks muted.");
        } else {
            println!("Automatic update checks restored.");
        }
    }

    fn update_cancel(&mut self) {
        if self.updates.cancel_download() {
            println!("Cancelling download...");
        } else {
            println!("No download in progress.");
        }
    }

    fn show_status(&mut self) {
        println!("Version:   {}", self.updates.current_version());
        match &self.active_profile {
            Some(name) => println!("Profile:   {name}"),
            None => println!("Profile:   (none)"),
        }
        println!("Selected:  {}", self.selection);
        println!("Mode:      {}", self.survivor_mode.label());
        println!(
            "Lock:      {}",
            if self.lock_active { "engaged" } else { "off" }
        );
        println!(
            "Output:    {} -> {}",
            if self.output_enabled { "on" } else { "off" },
            self.output.output_dir().display()
        );
        println!("Update:    {}", self.updates.phase().label());
        if let Some(profile) = self.active_profile.clone() {
            let record = self
                .store
                .get_or_create(&profile, &self.selection.storage_key());
            self.show_record(&record);
        }
    }

    fn render_notice(&mut self, notice: UpdateNotice) {
        match notice {
            UpdateNotice::CheckFailed { manual, error } => {
                if manual {
                    println!("Update check failed: {error}");
                } else {
                    debug!(error = %error, "automatic update check failed");
                }
            }
            UpdateNotice::UpToDate {
                manual,
                current,
                remote,
            } => {
                if manual {
                    println!("Already on the latest version ({current}).");
                } else {
                    debug!(current = %current, remote = %remote, "already up to date");
                }
            }
            UpdateNotice::Available { version, changelog } => {
                println!("Update {version} is available.");
                if !changelog.is_empty() {
                    println!("{changelog}");
                }
                println!("'update apply' installs it, 'update dismiss' hides it, 'update mute' stops automatic checks.");
            }
            UpdateNotice::Progress {
                received,
                total,
                percent,
            } => match (percent, total) {
                (Some(percent), Some(total)) => {
                    if Some(percent) != self.last_percent {
                        self.last_percent = Some(percent);
                        println!("Downloading... {percent}% ({received} of {total} bytes)");
                    }
                }
                _ => {
                    let mib = received >> 20;
                    if mib > self.last_mib {
                        self.last_mib = mib;
                        println!("Downloading... {received} bytes");
                    }
                }
            },
            UpdateNotice::DownloadFailed(error) => println!("Download failed: {error}"),
            UpdateNotice::Cancelled => println!("Download cancelled."),
            UpdateNotice::InstallFailed(error) => println!("Update failed: {error}"),
            UpdateNotice::PartiallyInstalled {
                assets_updated,
                error,
            } => {
                println!("Assets updated ({assets_updated} file(s)) but {error}.");
                println!("The previous binary is still in place.");
            }
            UpdateNotice::Installed {
                assets_updated,
                binary_replaced,
            } => {
                if binary_replaced {
                    println!(
                        "Update installed ({assets_updated} asset(s) refreshed). Restart to run the new version."
                    );
                } else {
                    println!(
                        "Assets updated ({assets_updated} file(s)); this release carried no new binary."
                    );
                }
            }
        }
    }
}

fn print_help() {
    println!("Commands:");
    println!("  profile list | new <name> | delete <name> | use <name>");
    println!("  select <character>       pick a killer or 'Survivor'");
    println!("  mode <solo|2|3|4>        survivor group size");
    println!("  lock / unlock            commit or release the selection");
    println!("  win                      record a win (needs the lock)");
    println!("  finish / reset           finalize or restart the streak");
    println!("  image <path> | clear     portrait override for the selection");
    println!("  output on|off            overlay artifact writing");
    println!("  import <file> / export <file>");
    println!("  update check|apply|dismiss|cancel|mute|unmute");
    println!("  status / roster / help / quit");
}

fn print_roster() {
    for name in KILLERS {
        println!("  {name}");
    }
    for mode in SurvivorMode::ALL {
        println!("  Survivor - {}", mode.label());
    }
}

/// Forwards stdin lines to the session channel, closing it on EOF.
pub fn spawn_input_reader(lines: Sender<String>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if lines.send(line).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    warn!(error = %err, "stdin read failed");
                    break;
                }
            }
        }
    })
}

/// Main loop: worker events are absorbed between input lines, so progress
/// keeps flowing while the prompt sits idle.
pub fn run(
    mut session: Session,
    lines: Receiver<String>,
    updates: Receiver<UpdateEvent>,
) -> Result<()> {
    loop {
        while let Ok(event) = updates.try_recv() {
            session.handle_update_event(event);
        }
        match lines.recv_timeout(Duration::from_millis(150)) {
            Ok(line) => {
                if session.dispatch(&line) == Flow::Quit {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn test_session(dir: &tempfile::TempDir) -> Session {
        let paths = AppPaths {
            config_dir: dir.path().join("config"),
            output_dir: dir.path().join("output"),
        };
        let (events, _rx) = mpsc::channel();
        Session::new(paths, events).unwrap()
    }

    fn record(session: &Session, profile: &str, key: &str) -> CharacterRecord {
        session.store.get(profile, key).cloned().unwrap()
    }

    #[test]
    fn test_parse_profile_commands() {
        assert_eq!(
            Command::parse("profile new Main Run").unwrap().unwrap(),
            Command::ProfileNew("Main Run".to_string())
        );
        assert_eq!(
            Command::parse("profile use Alt").unwrap().unwrap(),
            Command::ProfileUse("Alt".to_string())
        );
        assert_eq!(
            Command::parse("profile list").unwrap().unwrap(),
            Command::ProfileList
        );
        assert!(Command::parse("profile new").is_err());
        assert!(Command::parse("profile").is_err());
    }

    #[test]
    fn test_parse_multi_word_selection() {
        assert_eq!(
            Command::parse("select The Skull Merchant").unwrap().unwrap(),
            Command::Select("The Skull Merchant".to_string())
        );
    }

    #[test]
    fn test_parse_is_case_insensitive_on_verbs() {
        assert_eq!(Command::parse("WIN").unwrap().unwrap(), Command::Win);
        assert_eq!(Command::parse("Lock").unwrap().unwrap(), Command::Lock);
    }

    #[test]
    fn test_parse_blank_line_is_nothing() {
        assert_eq!(Command::parse("   ").unwrap(), None);
    }

    #[test]
    fn test_parse_update_subcommands() {
        assert_eq!(
            Command::parse("update check").unwrap().unwrap(),
            Command::UpdateCheck
        );
        assert_eq!(
            Command::parse("update mute").unwrap().unwrap(),
            Command::UpdateMute(true)
        );
        assert_eq!(
            Command::parse("update unmute").unwrap().unwrap(),
            Command::UpdateMute(false)
        );
        assert!(Command::parse("update").is_err());
        assert!(Command::parse("update sideways").is_err());
    }

    #[test]
    fn test_parse_image_clear_and_path() {
        assert_eq!(
            Command::parse("image clear").unwrap().unwrap(),
            Command::Image(None)
        );
        assert_eq!(
            Command::parse("image custom icons/trapper.png").unwrap().unwrap(),
            Command::Image(Some(PathBuf::from("custom icons/trapper.png")))
        );
    }

    #[test]
    fn test_parse_unknown_verb_is_an_error() {
        assert!(Command::parse("teleport").is_err());
    }

    #[test]
    fn test_wins_require_the_lock() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = test_session(&dir);
        session.dispatch("profile new Main");
        // Selecting materializes a zeroed record; the rejected win must
        // leave it untouched
        session.dispatch("select The Trapper");

        session.dispatch("win");
        let trapper = record(&session, "Main", "The Trapper");
        assert_eq!(trapper.wins, 0);
        assert_eq!(trapper.current_streak, 0);

        session.dispatch("lock");
        session.dispatch("win");
        assert_eq!(record(&session, "Main", "The Trapper").wins, 1);
    }

    #[test]
    fn test_activating_a_profile_resets_the_selection() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = test_session(&dir);
        session.dispatch("profile new Main");
        assert_eq!(session.selection.storage_key(), "Survivor - Solo");

        session.dispatch("select The Nurse");
        session.dispatch("profile new Alt");
        session.dispatch("profile use Main");
        assert_eq!(session.selection.storage_key(), "Survivor - Solo");
    }

    #[test]
    fn test_selection_is_frozen_while_locked() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = test_session(&dir);
        session.dispatch("profile new Main");
        session.dispatch("lock");

        session.dispatch("select The Nurse");
        assert_eq!(session.selection.storage_key(), "Survivor - Solo");

        session.dispatch("unlock");
        session.dispatch("select The Nurse");
        assert_eq!(session.selection.storage_key(), "The Nurse");
    }

    #[test]
    fn test_profile_switch_rejected_while_locked() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = test_session(&dir);
        session.dispatch("profile new Main");
        session.dispatch("profile new Alt");
        session.dispatch("profile use Main");
        session.dispatch("lock");

        session.dispatch("profile use Alt");
        assert_eq!(session.active_profile.as_deref(), Some("Main"));

        session.dispatch("unlock");
        session.dispatch("profile use Alt");
        assert_eq!(session.active_profile.as_deref(), Some("Alt"));
    }

    #[test]
    fn test_mode_follows_survivor_selection() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = test_session(&dir);
        session.dispatch("profile new Main");

        session.dispatch("select Survivor");
        session.dispatch("mode 3");
        assert_eq!(
            session.selection.storage_key(),
            "Survivor - 3 Survivors"
        );

        // Switching to a killer keeps the remembered group size
        session.dispatch("select The Nurse");
        session.dispatch("select Survivor");
        assert_eq!(
            session.selection.storage_key(),
            "Survivor - 3 Survivors"
        );
    }

    #[test]
    fn test_streak_flow_through_commands() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = test_session(&dir);
        session.dispatch("profile new Main");
        session.dispatch("select The Trapper");
        session.dispatch("lock");
        session.dispatch("win");
        session.dispatch("win");
        session.dispatch("win");
        session.dispatch("finish");

        let trapper = record(&session, "Main", "The Trapper");
        assert_eq!(trapper.personal_best, 3);
        assert!(!trapper.live);

        session.dispatch("win");
        session.dispatch("finish");
        let trapper = record(&session, "Main", "The Trapper");
        assert_eq!(trapper.wins, 4);
        assert_eq!(trapper.personal_best, 4);
    }

    #[test]
    fn test_lock_and_wins_drive_overlay_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = test_session(&dir);
        session.dispatch("profile new Main");
        session.dispatch("lock");
        session.dispatch("win");

        let streak_file = dir.path().join("output").join(artifacts::CURRENT_STREAK);
        assert_eq!(std::fs::read_to_string(&streak_file).unwrap(), "1");
        let best_file = dir.path().join("output").join(artifacts::CURRENT_BEST);
        assert_eq!(std::fs::read_to_string(&best_file).unwrap(), "LIVE");
    }

    #[test]
    fn test_output_toggle_suppresses_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = test_session(&dir);
        session.dispatch("profile new Main");
        session.dispatch("output off");
        session.dispatch("lock");
        session.dispatch("win");

        let streak_file = dir.path().join("output").join(artifacts::CURRENT_STREAK);
        assert!(!streak_file.exists());
    }

    #[test]
    fn test_deleting_active_profile_clears_it() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = test_session(&dir);
        session.dispatch("profile new Main");
        session.dispatch("profile delete Main");
        assert_eq!(session.active_profile, None);
    }

    #[test]
    fn test_quit_ends_the_loop() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = test_session(&dir);
        assert_eq!(session.dispatch("quit"), Flow::Quit);
        assert_eq!(session.dispatch("status"), Flow::Continue);
    }
}
