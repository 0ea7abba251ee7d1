use album_press::imaging::{self, RustBackend};
use album_press::model::{EditingContext, Registry};
use album_press::pipeline::{self, BuildOptions, OutputKind};
use album_press::store::{NewAlbum, Store};
use album_press::{config, output};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

#[derive(Parser)]
#[command(name = "album-press")]
#[command(about = "Author photo albums and publish them as a website or an e-book")]
#[command(long_about = "\
Author photo albums and publish them as a website or an e-book

Every album lives in its own directory under the data root:

  data/
  ├── albums.xml                   # Registry of all albums
  ├── config.toml                  # Optional labels, date format, thumbnail sizes
  ├── Thumbs/lq3x9k.jpg            # Album list thumbnails
  └── lq3x9k/
      ├── mimetype
      ├── META-INF/container.xml
      └── EPUB/
          ├── album.xml            # Title, dates, preface, chapter list
          ├── ch001/chapter.xml    # Paragraphs and photos
          ├── ch001/dawn.jpg
          └── ch001/thumbs/dawn.jpg

ALBUM and CHAPTER arguments take a 1-based position or a directory name.

Run 'album-press gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Data root holding albums.xml and one directory per album
    #[arg(long, default_value = "albums", global = true)]
    data_root: PathBuf,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum Target {
    Website,
    Ebook,
}

impl From<Target> for OutputKind {
    fn from(target: Target) -> Self {
        match target {
            Target::Website => OutputKind::Website,
            Target::Ebook => OutputKind::EbookContainer,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// List albums
    List,
    /// Show an album with its chapters and photos
    Show { album: String },
    /// Create an album with one empty chapter
    New {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        author: String,
        #[arg(long, default_value = "")]
        location: String,
        /// First date, yyyy-mm-dd (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Delete an album and its directory
    Delete { album: String },
    /// Append a chapter
    AddChapter {
        album: String,
        #[arg(long)]
        title: Option<String>,
    },
    /// Move a chapter to a new directory name
    RenameChapter {
        album: String,
        chapter: String,
        new_dir: String,
    },
    /// Delete a chapter and its directory
    DeleteChapter { album: String, chapter: String },
    /// Copy photos into a chapter and render their thumbnails
    AddPhotos {
        album: String,
        chapter: String,
        /// 1-based paragraph (defaults to the last one)
        #[arg(long)]
        paragraph: Option<usize>,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Choose a chapter photo as the cover source
    SetCover {
        album: String,
        chapter: String,
        file: String,
    },
    /// Crop an image file into the album's cover.jpg
    SetCoverImage { album: String, file: PathBuf },
    /// Delete the cover image and forget the cover source
    RemoveCover { album: String },
    /// Re-render thumbnails whose size no longer matches their paragraph
    RefreshThumbs { album: String },
    /// Regenerate stale pages and package the album
    Build {
        album: String,
        #[arg(long, value_enum, default_value = "website")]
        target: Target,
        /// Archive path (e-book default: <data-root>/<dir>.epub)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Regenerate every page
        #[arg(long)]
        force: bool,
        /// Print the build report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Import an album from an e-book archive
    Import { archive: PathBuf },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let config = config::load_config(&cli.data_root)?;
    let store = Store::new(&cli.data_root);
    let mut registry = store.load_registry()?;
    let backend = RustBackend::new();

    match cli.command {
        Command::List => output::print_album_list(&registry),
        Command::Show { album } => {
            let index = resolve_album(&registry, &album)?;
            let album = album_at(&mut registry, index)?;
            store.load_all(album)?;
            output::print_album_detail(index + 1, album);
        }
        Command::New {
            title,
            author,
            location,
            date,
        } => {
            let date = date.unwrap_or_else(|| chrono::Local::now().date_naive());
            let new = NewAlbum {
                title,
                author,
                location,
                date,
            };
            let index = store.create_album(&mut registry, new, &config.labels.new_chapter)?;
            let album = album_at(&mut registry, index)?;
            println!("Created {} \u{2192} {}/", album.title(), album.dir());
        }
        Command::Delete { album } => {
            let index = resolve_album(&registry, &album)?;
            let removed = store.delete_album(&mut registry, index)?;
            println!("Deleted {}", removed.dir());
        }
        Command::AddChapter { album, title } => {
            let index = resolve_album(&registry, &album)?;
            let album = album_at(&mut registry, index)?;
            let title = title.unwrap_or_else(|| config.labels.new_chapter.clone());
            let chapter = store.create_chapter(album, &title)?;
            if let Some(c) = album.chapter(chapter) {
                println!("Created {} \u{2192} {}/", c.title(), c.dir());
            }
        }
        Command::RenameChapter {
            album,
            chapter,
            new_dir,
        } => {
            let index = resolve_album(&registry, &album)?;
            let album = album_at(&mut registry, index)?;
            store.load_album_body(album)?;
            let chapter = resolve_chapter(album, &chapter)?;
            store.rename_chapter(album, chapter, &new_dir)?;
        }
        Command::DeleteChapter { album, chapter } => {
            let index = resolve_album(&registry, &album)?;
            let album = album_at(&mut registry, index)?;
            store.load_album_body(album)?;
            let chapter = resolve_chapter(album, &chapter)?;
            store.delete_chapter(album, chapter)?;
        }
        Command::AddPhotos {
            album,
            chapter,
            paragraph,
            files,
        } => {
            let index = resolve_album(&registry, &album)?;
            let album = album_at(&mut registry, index)?;
            store.load_album_body(album)?;
            let chapter = resolve_chapter(album, &chapter)?;
            let mut ctx = EditingContext::for_album(index).with_chapter(chapter);
            if let Some(n) = paragraph {
                ctx = ctx.with_paragraph(paragraph_index(n)?);
            }
            let report =
                imaging::import_photos(&store, album, ctx, &files, &backend, &config.thumbnails)?;
            output::print_import_report(&report);
        }
        Command::SetCover {
            album,
            chapter,
            file,
        } => {
            let index = resolve_album(&registry, &album)?;
            let album = album_at(&mut registry, index)?;
            store.load_album_body(album)?;
            let chapter = resolve_chapter(album, &chapter)?;
            imaging::set_cover_source(
                &store,
                album,
                chapter,
                &file,
                &backend,
                &config.thumbnails,
            )?;
        }
        Command::SetCoverImage { album, file } => {
            let index = resolve_album(&registry, &album)?;
            let album = album_at(&mut registry, index)?;
            imaging::set_cover_image(&store, album, &file, &backend, &config.thumbnails)?;
            println!("Cover set \u{2192} {}/{}", album.dir(), imaging::COVER_FILE);
        }
        Command::RemoveCover { album } => {
            let index = resolve_album(&registry, &album)?;
            let album = album_at(&mut registry, index)?;
            if imaging::remove_cover(&store, album)? {
                println!("Removed cover of {}", album.dir());
            } else {
                println!("{} has no cover", album.dir());
            }
        }
        Command::RefreshThumbs { album } => {
            let index = resolve_album(&registry, &album)?;
            let album = album_at(&mut registry, index)?;
            let rendered =
                imaging::refresh_thumbnails(&store, album, &backend, &config.thumbnails)?;
            println!("Rendered {} thumbnails", rendered);
        }
        Command::Build {
            album,
            target,
            output: archive,
            force,
            json,
        } => {
            let index = resolve_album(&registry, &album)?;
            let album = album_at(&mut registry, index)?;
            let options = BuildOptions {
                output: archive,
                force,
            };
            let report = if json {
                pipeline::build(&store, album, &config, target.into(), &options, None)?
            } else {
                let (tx, rx) = std::sync::mpsc::channel();
                let printer = std::thread::spawn(move || {
                    for event in rx {
                        for line in output::format_build_event(&event) {
                            println!("{}", line);
                        }
                    }
                });
                let result =
                    pipeline::build(&store, album, &config, target.into(), &options, Some(tx));
                let _ = printer.join();
                result?
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                output::print_build_report(&report);
            }
        }
        Command::Import { archive } => {
            let index = store.import_album(&mut registry, &archive)?;
            let album = album_at(&mut registry, index)?;
            println!("Imported {} \u{2192} {}/", album.title(), album.dir());
        }
        Command::GenConfig => {}
    }

    if registry.needs_save() {
        store.save_registry(&mut registry)?;
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let filter = EnvFilter::builder()
        .with_default_directive(default.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Resolve a 1-based position or a directory name to a registry index.
fn resolve_album(registry: &Registry, key: &str) -> Result<usize, String> {
    if let Some(index) = registry.find(key) {
        return Ok(index);
    }
    match key.parse::<usize>() {
        Ok(n) if n >= 1 && n <= registry.len() => Ok(n - 1),
        _ => Err(format!("no album '{key}' (see 'album-press list')")),
    }
}

fn album_at(
    registry: &mut Registry,
    index: usize,
) -> Result<&mut album_press::model::Album, String> {
    registry
        .album_mut(index)
        .ok_or_else(|| format!("no album at position {}", index + 1))
}

/// 1-based paragraph position to an index.
fn paragraph_index(position: usize) -> Result<usize, String> {
    position
        .checked_sub(1)
        .ok_or_else(|| "paragraph positions start at 1".to_string())
}

/// Resolve a 1-based position or a directory name to a chapter index.
fn resolve_chapter(album: &album_press::model::Album, key: &str) -> Result<usize, String> {
    if let Some(index) = album.find_chapter(key) {
        return Ok(index);
    }
    match key.parse::<usize>() {
        Ok(n) if n >= 1 && n <= album.chapters().len() => Ok(n - 1),
        _ => Err(format!("no chapter '{key}' in album {}", album.dir())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use album_press::model::{Album, AlbumBody, AlbumHeader, Chapter};

    fn registry() -> Registry {
        let mut registry = Registry::default();
        for dir in ["lq3x9k", "7"] {
            let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
            registry.push(Album::from_header(AlbumHeader::new("id", dir, date)));
        }
        registry
    }

    #[test]
    fn paragraph_positions_are_one_based() {
        assert_eq!(paragraph_index(1), Ok(0));
        assert_eq!(paragraph_index(3), Ok(2));
        assert!(paragraph_index(0).is_err());
    }

    #[test]
    fn album_key_prefers_directory_name() {
        let registry = registry();
        assert_eq!(resolve_album(&registry, "lq3x9k"), Ok(0));
        assert_eq!(resolve_album(&registry, "7"), Ok(1));
        assert_eq!(resolve_album(&registry, "1"), Ok(0));
        assert!(resolve_album(&registry, "0").is_err());
        assert!(resolve_album(&registry, "3").is_err());
        assert!(resolve_album(&registry, "nope").is_err());
    }

    #[test]
    fn chapter_key_accepts_position_or_directory() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let body = AlbumBody {
            chapters: vec![
                Chapter::from_header("Arrival", "arrival", 0),
                Chapter::from_header("Second", "ch002", 0),
            ],
            ..AlbumBody::default()
        };
        let album = Album::new(AlbumHeader::new("id", "lq3x9k", date), body);
        assert_eq!(resolve_chapter(&album, "ch002"), Ok(1));
        assert_eq!(resolve_chapter(&album, "1"), Ok(0));
        assert!(resolve_chapter(&album, "0").is_err());
        assert!(resolve_chapter(&album, "ch001").is_err());
    }
}
