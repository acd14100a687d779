//! Data file naming: base name plus optional suffix, and parallel-file discovery.

use std::path::{Path, PathBuf};

use covdata_core::errors::StorageError;
use covdata_core::types::Suffix;
use uuid::Uuid;

use crate::connection::DataLocation;

const SUFFIX_LETTERS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Compute the suffix string for a suffix mode.
///
/// `Generated` yields `<host>.<pid>.X<six random letters>x`; it is computed at
/// call time so a forked child gets its own.
pub fn filename_suffix(suffix: &Suffix) -> Option<String> {
    match suffix {
        Suffix::None => None,
        Suffix::Literal(s) => Some(s.clone()),
        Suffix::Generated => {
            let random = Uuid::new_v4();
            let rolls: String = random.as_bytes()[..6]
                .iter()
                .map(|b| SUFFIX_LETTERS[usize::from(*b) % SUFFIX_LETTERS.len()] as char)
                .collect();
            Some(format!("{}.{}.X{rolls}x", hostname(), std::process::id()))
        }
    }
}

/// Where the data for `basename` + `suffix` lives.
pub fn choose_location(basename: &Path, suffix: &Suffix, no_disk: bool) -> DataLocation {
    if no_disk {
        return DataLocation::Memory;
    }
    let mut name = basename.as_os_str().to_owned();
    if let Some(suffix) = filename_suffix(suffix) {
        name.push(".");
        name.push(suffix);
    }
    DataLocation::File(PathBuf::from(name))
}

/// Absolute form of a base name, relative to the working directory.
pub fn absolute_basename(basename: &Path) -> PathBuf {
    std::path::absolute(basename).unwrap_or_else(|_| basename.to_path_buf())
}

/// Files named `<data_file>.*`, as written by parallel collection.
pub fn parallel_files(data_file: &Path) -> Result<Vec<PathBuf>, StorageError> {
    let pattern = format!("{}.*", glob::Pattern::escape(&data_file.to_string_lossy()));
    let paths = glob::glob(&pattern).map_err(|e| StorageError::Io {
        path: pattern.clone(),
        message: e.to_string(),
    })?;

    let mut result = Vec::new();
    for entry in paths {
        let path = entry.map_err(|e| StorageError::Io {
            path: e.path().display().to_string(),
            message: e.error().to_string(),
        })?;
        result.push(path);
    }
    Ok(result)
}

/// Delete a file, treating "already gone" as success.
pub fn remove_if_exists(path: &Path) -> Result<bool, StorageError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StorageError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        }),
    }
}

fn hostname() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .ok()
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|s| s.trim().to_string())
        })
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_suffix_has_host_pid_and_random_part() {
        let suffix = filename_suffix(&Suffix::Generated).unwrap();
        let parts: Vec<&str> = suffix.rsplitn(3, '.').collect();
        let random = parts[0];
        assert_eq!(parts[1], std::process::id().to_string());
        assert_eq!(random.len(), 8);
        assert!(random.starts_with('X') && random.ends_with('x'));
        assert!(random[1..7].chars().all(|c| c.is_ascii_alphabetic()));
    }

    #[test]
    fn literal_suffix_is_appended_with_a_dot() {
        let loc = choose_location(Path::new("/tmp/.coverage"), &Suffix::Literal("w1".into()), false);
        assert_eq!(loc, DataLocation::File(PathBuf::from("/tmp/.coverage.w1")));
    }

    #[test]
    fn no_disk_ignores_the_name() {
        let loc = choose_location(Path::new(".coverage"), &Suffix::Generated, true);
        assert_eq!(loc, DataLocation::Memory);
    }
}
