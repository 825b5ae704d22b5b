use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

mod cli_style;

use cli_style::{get_styles, print_command_echo, print_error, print_song, print_songs};
use song_stats_server::song_store::{NewSong, SongStore, SqliteSongStore};

use rustyline::{
    completion::Completer, highlight::Highlighter, history::FileHistory, validate::Validator,
    CompletionType, Config, Editor, Helper,
};

const SONGS_DB_FILE: &str = "songs.db";

fn parse_path(s: &str) -> Result<PathBuf> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[command(styles=get_styles())]
struct CliArgs {
    /// The songs database file, or the directory containing songs.db.
    #[clap(value_parser = parse_path)]
    pub path: PathBuf,
}

#[derive(Parser)]
#[command(styles=get_styles(),name = "")]
struct InnerCli {
    #[command(subcommand)]
    command: InnerCommand,
}

#[derive(Subcommand)]
enum InnerCommand {
    /// Creates a playlist with the given name.
    AddPlaylist { name: String },

    /// Shows all playlists.
    Playlists,

    /// Deletes a playlist together with all of its songs.
    RemovePlaylist { playlist_id: i64 },

    /// Adds a song with zeroed counters. It counts as just updated, so the
    /// stats sync only refreshes it once it has gone stale.
    AddSong {
        media_id: String,
        title: String,
        artist: String,
        #[clap(long)]
        playlist: Option<i64>,
        #[clap(long)]
        cover_url: Option<String>,
    },

    /// Deletes the song with the given media id.
    RemoveSong { media_id: String },

    /// Shows songs, optionally only those of one playlist.
    Songs {
        #[clap(long)]
        playlist: Option<i64>,
    },

    /// Shows all stored information of a song.
    Show { media_id: String },

    /// Shows the songs the next sync pass would pick up.
    Stale {
        /// Staleness threshold in minutes.
        #[clap(long, default_value_t = 10)]
        minutes: i64,
    },

    /// Shows the path of the current songs db.
    Where,

    /// Close this program.
    Exit,
}

enum CommandExecutionResult {
    Ok,
    Exit,
    Error(String),
}

fn execute_command(
    line: String,
    store: &dyn SongStore,
    db_path: &str,
) -> CommandExecutionResult {
    if line.is_empty() {
        return CommandExecutionResult::Ok;
    }

    let args =
        shlex::split(&line).unwrap_or_else(|| line.split_whitespace().map(String::from).collect());

    let cli = InnerCli::try_parse_from(std::iter::once(" ").chain(args.iter().map(String::as_str)));

    match cli {
        Ok(cli) => {
            print_command_echo(&line);
            match cli.command {
                InnerCommand::AddPlaylist { name } => match store.create_playlist(&name) {
                    Ok(playlist) => cli_style::print_success(&format!(
                        "Playlist '{}' created with id {}",
                        playlist.name, playlist.id
                    )),
                    Err(err) => return CommandExecutionResult::Error(format!("{:#}", err)),
                },
                InnerCommand::Playlists => match store.list_playlists() {
                    Ok(playlists) => cli_style::print_playlists(&playlists),
                    Err(err) => return CommandExecutionResult::Error(format!("{:#}", err)),
                },
                InnerCommand::RemovePlaylist { playlist_id } => {
                    match store.delete_playlist(playlist_id) {
                        Ok(true) => cli_style::print_success(&format!(
                            "Playlist {} deleted",
                            playlist_id
                        )),
                        Ok(false) => {
                            return CommandExecutionResult::Error(format!(
                                "Playlist {} not found",
                                playlist_id
                            ))
                        }
                        Err(err) => return CommandExecutionResult::Error(format!("{:#}", err)),
                    }
                }
                InnerCommand::AddSong {
                    media_id,
                    title,
                    artist,
                    playlist,
                    cover_url,
                } => {
                    let new_song = NewSong {
                        playlist_id: playlist,
                        title,
                        artist,
                        cover_url,
                        media_id,
                    };
                    match store.create_song(&new_song) {
                        Ok(song) => cli_style::print_success(&format!(
                            "Song '{}' added ({})",
                            song.title, song.media_id
                        )),
                        Err(err) => return CommandExecutionResult::Error(format!("{:#}", err)),
                    }
                }
                InnerCommand::RemoveSong { media_id } => match store.delete_song(&media_id) {
                    Ok(true) => cli_style::print_success(&format!("Song {} deleted", media_id)),
                    Ok(false) => {
                        return CommandExecutionResult::Error(format!(
                            "Song {} not found",
                            media_id
                        ))
                    }
                    Err(err) => return CommandExecutionResult::Error(format!("{:#}", err)),
                },
                InnerCommand::Songs { playlist } => match store.list_songs(playlist) {
                    Ok(songs) => print_songs(&songs),
                    Err(err) => return CommandExecutionResult::Error(format!("{:#}", err)),
                },
                InnerCommand::Show { media_id } => match store.get_song(&media_id) {
                    Ok(Some(song)) => print_song(&song),
                    Ok(None) => {
                        return CommandExecutionResult::Error(format!(
                            "Song {} not found",
                            media_id
                        ))
                    }
                    Err(err) => return CommandExecutionResult::Error(format!("{:#}", err)),
                },
                InnerCommand::Stale { minutes } => {
                    if minutes < 0 {
                        return CommandExecutionResult::Error(
                            "minutes must not be negative".to_string(),
                        );
                    }
                    let Some(cutoff) = chrono::Duration::try_minutes(minutes)
                        .and_then(|threshold| Utc::now().checked_sub_signed(threshold))
                    else {
                        return CommandExecutionResult::Error(format!(
                            "{} minutes is out of range",
                            minutes
                        ));
                    };
                    match store.list_stale_songs(cutoff) {
                        Ok(songs) => print_songs(&songs),
                        Err(err) => return CommandExecutionResult::Error(format!("{:#}", err)),
                    }
                }
                InnerCommand::Where => {
                    println!("{}", db_path);
                }
                InnerCommand::Exit => return CommandExecutionResult::Exit,
            }
        }

        Err(e) => {
            if e.print().is_err() {
                println!("{}", e);
            }
        }
    }
    CommandExecutionResult::Ok
}

#[derive(rustyline_derive::Hinter)]
struct CommandHelper {
    commands_names: Vec<String>,
}

impl CommandHelper {
    pub fn new() -> Self {
        let commands_names: Vec<String> = InnerCli::command()
            .get_subcommands()
            .map(|sc| sc.get_name().to_string())
            .collect();

        CommandHelper { commands_names }
    }
}

impl Completer for CommandHelper {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        _pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        if line.contains(' ') {
            return Ok((0, Vec::with_capacity(0)));
        }
        let matches = self
            .commands_names
            .iter()
            .filter(|c| c.starts_with(line))
            .cloned()
            .collect::<Vec<_>>();

        Ok((0, matches))
    }
}

impl Highlighter for CommandHelper {}
impl Validator for CommandHelper {}
impl Helper for CommandHelper {}

fn resolve_db_path(path: PathBuf) -> Result<PathBuf> {
    if path.is_dir() {
        return Ok(path.join(SONGS_DB_FILE));
    }
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.is_dir() => {
            bail!("Directory does not exist: {}", parent.display())
        }
        _ => Ok(path),
    }
}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();
    let db_path = resolve_db_path(cli_args.path)?;
    let store = SqliteSongStore::new(&db_path)
        .with_context(|| format!("Could not open songs database at {}", db_path.display()))?;
    let db_path = db_path.display().to_string();

    cli_style::print_welcome(&db_path);

    let config = Config::builder()
        .completion_type(CompletionType::List)
        .build();

    let mut rl = Editor::<CommandHelper, FileHistory>::with_config(config)?;
    rl.set_helper(Some(CommandHelper::new()));

    let prompt = cli_style::get_prompt();
    loop {
        match rl.readline(&prompt) {
            Ok(line) => {
                let _ = rl.add_history_entry(&line);
                match execute_command(line.trim().to_string(), &store, &db_path) {
                    CommandExecutionResult::Ok => {}
                    CommandExecutionResult::Exit => {
                        break;
                    }
                    CommandExecutionResult::Error(err) => {
                        print_error(&err);
                        continue;
                    }
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(rustyline::error::ReadlineError::Eof) => {
                println!("CTRL-D: exiting.");
                break;
            }
            Err(e) => {
                cli_style::print_warning(&format!("Error: {:?}", e));
                break;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn run(line: &str, store: &dyn SongStore) -> CommandExecutionResult {
        execute_command(line.to_string(), store, "songs.db")
    }

    #[test]
    fn test_add_and_remove_song() {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteSongStore::new(temp_dir.path().join(SONGS_DB_FILE)).unwrap();

        assert!(matches!(
            run("add-playlist 'Road trip'", &store),
            CommandExecutionResult::Ok
        ));
        let playlist = &store.list_playlists().unwrap()[0];
        assert_eq!(playlist.name, "Road trip");

        let line = format!(
            "add-song abc123 \"Some Song\" \"Some Artist\" --playlist {}",
            playlist.id
        );
        assert!(matches!(run(&line, &store), CommandExecutionResult::Ok));
        let song = store.get_song("abc123").unwrap().unwrap();
        assert_eq!(song.title, "Some Song");
        assert_eq!(song.playlist_id, Some(playlist.id));

        assert!(matches!(
            run("add-song abc123 Other Artist", &store),
            CommandExecutionResult::Error(_)
        ));

        assert!(matches!(
            run("remove-song abc123", &store),
            CommandExecutionResult::Ok
        ));
        assert!(matches!(
            run("remove-song abc123", &store),
            CommandExecutionResult::Error(_)
        ));
    }

    #[test]
    fn test_exit_and_unknown_commands() {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteSongStore::new(temp_dir.path().join(SONGS_DB_FILE)).unwrap();

        assert!(matches!(run("exit", &store), CommandExecutionResult::Exit));
        assert!(matches!(run("", &store), CommandExecutionResult::Ok));
        // Parse errors are printed, not returned.
        assert!(matches!(run("frobnicate", &store), CommandExecutionResult::Ok));
        assert!(matches!(
            run("stale --minutes=-5", &store),
            CommandExecutionResult::Error(_)
        ));
        assert!(matches!(
            run(&format!("stale --minutes={}", i64::MAX), &store),
            CommandExecutionResult::Error(_)
        ));
        assert!(matches!(
            run("stale --minutes=10", &store),
            CommandExecutionResult::Ok
        ));
    }

    #[test]
    fn test_resolve_db_path() {
        let temp_dir = TempDir::new().unwrap();
        assert_eq!(
            resolve_db_path(temp_dir.path().to_path_buf()).unwrap(),
            temp_dir.path().join(SONGS_DB_FILE)
        );
        let file = temp_dir.path().join("custom.db");
        assert_eq!(resolve_db_path(file.clone()).unwrap(), file);
        assert!(resolve_db_path(temp_dir.path().join("missing/songs.db")).is_err());
    }
}
