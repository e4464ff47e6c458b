//! Hostfile housekeeping for launching the benchmark.
//!
//! Two operations, neither of which touches its input: sort a hostfile, or
//! remove from it every host listed in a filter file (e.g. nodes known to be
//! bad). Results go to a new file; if the requested name is taken, the
//! numeric suffix after the last `_` is bumped (`sorted_hostfile_1.txt`
//! becomes `sorted_hostfile_2.txt`, then `_3`, ...).

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use crate::error::{Error, Result};

/// Default output name for [`sort_file`].
pub const DEFAULT_SORTED: &str = "sorted_hostfile_1.txt";

/// Default output name for [`filter_file`].
pub const DEFAULT_FILTERED: &str = "filtered_file_1.txt";

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write_lines(path: &Path, lines: &[String]) -> Result<()> {
    let mut content = lines.join("\n");
    content.push('\n');
    fs::write(path, content).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn entries(content: &str) -> impl Iterator<Item = &str> {
    content.lines().map(str::trim).filter(|line| !line.is_empty())
}

/// First unused path derived from `base`.
///
/// `base` itself if it does not exist, otherwise `<stem-prefix>_<n><ext>`
/// for `n = 2, 3, ...`, where `stem-prefix` is the file stem up to its last
/// `_` (the whole stem if it has none).
pub fn next_free_path(base: &Path) -> PathBuf {
    if !base.exists() {
        return base.to_path_buf();
    }
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let prefix = stem.rsplit_once('_').map_or(stem.as_str(), |(prefix, _)| prefix);
    let extension = base
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    (2..)
        .map(|n| base.with_file_name(format!("{prefix}_{n}{extension}")))
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| base.to_path_buf())
}

/// Non-empty trimmed lines of `content`, sorted; duplicates are kept.
pub fn sorted_lines(content: &str) -> Vec<String> {
    let mut lines: Vec<String> = entries(content).map(String::from).collect();
    lines.sort();
    lines
}

/// Distinct hosts of `content` not listed in `filter`, sorted.
pub fn filtered_lines(content: &str, filter: &str) -> Vec<String> {
    let excluded: BTreeSet<&str> = entries(filter).collect();
    entries(content)
        .filter(|host| !excluded.contains(host))
        .collect::<BTreeSet<&str>>()
        .into_iter()
        .map(String::from)
        .collect()
}

/// Write the sorted contents of `infile` to the first free name derived
/// from `outfile`, returning the path written.
pub fn sort_file(infile: &Path, outfile: &Path) -> Result<PathBuf> {
    let target = next_free_path(outfile);
    let lines = sorted_lines(&read(infile)?);
    write_lines(&target, &lines)?;
    info!("Sorted file written to {}", target.display());
    Ok(target)
}

/// Write the hosts of `infile` minus those of `filterfile` to the first free
/// name derived from `outfile`, returning the path written.
pub fn filter_file(infile: &Path, filterfile: &Path, outfile: &Path) -> Result<PathBuf> {
    let target = next_free_path(outfile);
    let lines = filtered_lines(&read(infile)?, &read(filterfile)?);
    write_lines(&target, &lines)?;
    info!("Filtered file written to {}", target.display());
    Ok(target)
}
