//! Terminal rendering for the songs admin CLI.

use clap::builder::styling::{AnsiColor, Color, Style};
use clap::builder::Styles;
use crossterm::style::{Attribute, Color as TermColor, Stylize};
use song_stats_server::song_store::{Playlist, Song};
use unicode_width::UnicodeWidthStr;

const ACCENT: TermColor = TermColor::Rgb {
    r: 0,
    g: 200,
    b: 255,
};
const OK: TermColor = TermColor::Rgb {
    r: 80,
    g: 220,
    b: 120,
};
const WARN: TermColor = TermColor::Rgb {
    r: 255,
    g: 170,
    b: 40,
};
const ERR: TermColor = TermColor::Rgb {
    r: 255,
    g: 90,
    b: 90,
};
const MUTED: TermColor = TermColor::Rgb {
    r: 130,
    g: 130,
    b: 130,
};

fn ansi(color: AnsiColor) -> Style {
    Style::new().fg_color(Some(Color::Ansi(color)))
}

pub fn get_styles() -> Styles {
    Styles::styled()
        .usage(ansi(AnsiColor::Cyan).bold().underline())
        .header(ansi(AnsiColor::Cyan).bold().underline())
        .literal(ansi(AnsiColor::Green).bold())
        .invalid(ansi(AnsiColor::Red).bold())
        .error(ansi(AnsiColor::Red).bold())
        .placeholder(ansi(AnsiColor::BrightBlack))
}

pub fn print_success(message: &str) {
    println!(" {} {}", "✓".with(OK).bold(), message.with(OK));
}

pub fn print_error(message: &str) {
    eprintln!(" {} {}", "✗".with(ERR).bold(), message.with(ERR));
}

pub fn print_warning(message: &str) {
    println!(" {} {}", "!".with(WARN).bold(), message.with(WARN));
}

pub fn print_empty_list(message: &str) {
    println!(
        "  {}",
        message.with(MUTED).attribute(Attribute::Italic)
    );
}

fn print_field(key: &str, value: &str) {
    println!("  {:<12} {}", format!("{}:", key).with(MUTED), value);
}

pub fn get_prompt() -> String {
    format!("{} ", "songs>".with(ACCENT).bold())
}

pub fn print_command_echo(command: &str) {
    println!("{} {}", "songs>".with(ACCENT).bold(), command.bold());
}

pub fn print_welcome(db_path: &str) {
    println!();
    println!("  {}", "SONG STATS".with(ACCENT).bold());
    print_field("Database", db_path);
    print_field(
        "Version",
        &format!("{} ({})", env!("CARGO_PKG_VERSION"), env!("GIT_HASH")),
    );
    println!("  {}", "Type 'help' for available commands".with(MUTED));
    println!();
}

/// Plain-text table; cells are padded by display width.
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn add_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    fn widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.width()).collect();
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.width());
            }
        }
        widths
    }

    fn line(cells: &[String], widths: &[usize]) -> String {
        let padded: Vec<String> = widths
            .iter()
            .enumerate()
            .map(|(i, width)| {
                let cell = cells.get(i).map(String::as_str).unwrap_or("");
                format!("{}{}", cell, " ".repeat(width.saturating_sub(cell.width())))
            })
            .collect();
        format!("│ {} │", padded.join(" │ "))
    }

    fn rule(widths: &[usize], left: &str, mid: &str, right: &str) -> String {
        let parts: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
        format!("{}{}{}", left, parts.join(mid), right)
    }

    /// The table as undecorated lines: top rule, header, rule, rows, bottom rule.
    pub fn lines(&self) -> Vec<String> {
        let widths = self.widths();
        let mut lines = vec![
            Self::rule(&widths, "╭", "┬", "╮"),
            Self::line(&self.headers, &widths),
            Self::rule(&widths, "├", "┼", "┤"),
        ];
        lines.extend(self.rows.iter().map(|row| Self::line(row, &widths)));
        lines.push(Self::rule(&widths, "╰", "┴", "╯"));
        lines
    }

    pub fn print(&self) {
        let lines = self.lines();
        let last = lines.len() - 1;
        for (i, line) in lines.into_iter().enumerate() {
            match i {
                1 => println!("{}", line.with(ACCENT).bold()),
                0 | 2 => println!("{}", line.with(ACCENT)),
                i if i == last => println!("{}", line.with(ACCENT)),
                _ => println!("{}", line),
            }
        }
    }
}

pub fn songs_table(songs: &[Song]) -> Table {
    let mut table = Table::new(&["Media id", "Title", "Artist", "Views", "Likes", "Updated"]);
    for song in songs {
        table.add_row(vec![
            song.media_id.clone(),
            song.title.clone(),
            song.artist.clone(),
            song.views.to_string(),
            song.likes.to_string(),
            song.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ]);
    }
    table
}

pub fn playlists_table(playlists: &[Playlist]) -> Table {
    let mut table = Table::new(&["Id", "Name", "Created"]);
    for playlist in playlists {
        table.add_row(vec![
            playlist.id.to_string(),
            playlist.name.clone(),
            playlist.created_at.format("%Y-%m-%d").to_string(),
        ]);
    }
    table
}

pub fn print_songs(songs: &[Song]) {
    if songs.is_empty() {
        print_empty_list("No songs");
    } else {
        songs_table(songs).print();
    }
}

pub fn print_playlists(playlists: &[Playlist]) {
    if playlists.is_empty() {
        print_empty_list("No playlists");
    } else {
        playlists_table(playlists).print();
    }
}

pub fn print_song(song: &Song) {
    let playlist = song
        .playlist_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_string());
    print_field("Media id", &song.media_id);
    print_field("Title", &song.title);
    print_field("Artist", &song.artist);
    print_field("Playlist", &playlist);
    print_field("Cover", song.cover_url.as_deref().unwrap_or("-"));
    print_field("Views", &song.views.to_string());
    print_field("Likes", &song.likes.to_string());
    print_field("Updated at", &song.updated_at.to_rfc3339());
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use song_stats_server::song_store::MetricValue;

    fn song(media_id: &str, views: MetricValue) -> Song {
        Song {
            id: 1,
            playlist_id: None,
            title: "Título".to_string(),
            artist: "Artist".to_string(),
            cover_url: None,
            media_id: media_id.to_string(),
            views,
            likes: MetricValue::Known(3),
            updated_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_songs_table_pads_to_widest_cell() {
        let table = songs_table(&[
            song("abc123", MetricValue::Known(150)),
            song("xyz789", MetricValue::Unknown),
        ]);
        let lines = table.lines();

        assert_eq!(lines.len(), 6);
        assert!(lines[0].starts_with('╭') && lines[0].ends_with('╮'));
        assert!(lines[5].starts_with('╰') && lines[5].ends_with('╯'));
        assert!(lines[3].contains("│ 150     │"));
        assert!(lines[4].contains("│ unknown │"));
        assert!(lines[3].contains("2024-05-01 12:00:00"));

        let width = lines[0].width();
        assert!(lines.iter().all(|line| line.width() == width));
    }

    #[test]
    fn test_empty_table_has_header_only() {
        let lines = playlists_table(&[]).lines();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1], "│ Id │ Name │ Created │");
    }
}
