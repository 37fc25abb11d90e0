// Discovery of the data files of a state.

use crate::oe::*;

use std::path::{Path, PathBuf};

use precinct_cleaning::source::SourceFile;
use walkdir::WalkDir;

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct DiscoveredFile {
    pub year: i64,
    pub dir: PathBuf,
    pub filename: String,
}

impl DiscoveredFile {
    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.filename)
    }
}

/// The `.csv` files of a state directory, grouped under year directories.
///
/// The files are listed lazily, in name order, every time [FileDiscovery::iter]
/// is called.
#[derive(Debug, Clone)]
pub struct FileDiscovery {
    source_dir: PathBuf,
    // (directory name, path), sorted by name
    year_dirs: Vec<(String, PathBuf)>,
}

impl FileDiscovery {
    pub fn new(source_dir: &Path) -> OeResult<FileDiscovery> {
        let path = source_dir.display().to_string();
        let entries = fs::read_dir(source_dir).context(ReadingSourceDirSnafu { path: &path })?;
        let mut year_dirs: Vec<(String, PathBuf)> = Vec::new();
        for entry in entries {
            let entry = entry.context(ReadingSourceDirSnafu { path: &path })?;
            let name = entry.file_name().to_string_lossy().to_string();
            if entry.path().is_dir() && starts_with_year(&name) {
                year_dirs.push((name, entry.path()));
            }
        }
        year_dirs.sort();
        debug!(
            "FileDiscovery: {}: year directories: {:?}",
            path,
            year_dirs.iter().map(|(n, _)| n).collect::<Vec<_>>()
        );
        Ok(FileDiscovery {
            source_dir: source_dir.to_path_buf(),
            year_dirs,
        })
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    /// An entry that cannot be read under a year directory is an error.
    pub fn iter(&self) -> impl Iterator<Item = OeResult<DiscoveredFile>> + '_ {
        self.year_dirs.iter().flat_map(|(name, dir)| {
            let year = name.parse::<i64>().ok();
            WalkDir::new(dir)
                .follow_links(true)
                .sort_by_file_name()
                .into_iter()
                .filter_map(move |entry_r| {
                    let entry = match entry_r {
                        Ok(e) => e,
                        Err(e) => {
                            let path = e
                                .path()
                                .unwrap_or(dir.as_path())
                                .display()
                                .to_string();
                            error!("Cannot read {}: {}", path, e);
                            return Some(
                                Err(std::io::Error::from(e))
                                    .context(ReadingSourceDirSnafu { path }),
                            );
                        }
                    };
                    let filename = entry.file_name().to_string_lossy().to_string();
                    if !entry.file_type().is_file() || !filename.ends_with(".csv") {
                        return None;
                    }
                    match year {
                        Some(year) => Some(Ok(DiscoveredFile {
                            year,
                            dir: entry.path().parent().unwrap_or(dir).to_path_buf(),
                            filename,
                        })),
                        None => {
                            error!(
                                "Directory {:?} is not a year, skipping file {:?}",
                                name, filename
                            );
                            None
                        }
                    }
                })
        })
    }
}

fn starts_with_year(name: &str) -> bool {
    name.len() >= 4 && name.chars().take(4).all(|c| c.is_ascii_digit())
}

/// The precinct files of a state, bound to its metadata.
///
/// A file name that does not belong to the state, or that carries an invalid
/// date, stops the processing.
pub fn discover_source_files(metadata: &StateMetadata) -> OeResult<Vec<SourceFile>> {
    let discovery = FileDiscovery::new(metadata.source_dir())?;
    let mut res: Vec<SourceFile> = Vec::new();
    for df_r in discovery.iter() {
        let df = df_r?;
        let sf = SourceFile::from_filename(df.year, &df.dir, &df.filename, metadata).context(
            CleaningSnafu {
                state: metadata.state(),
            },
        )?;
        if let Some(sf) = sf {
            res.push(sf);
        }
    }
    info!(
        "Discovered {} precinct files for state {} in {}",
        res.len(),
        metadata.state(),
        discovery.source_dir().display()
    );
    Ok(res)
}
