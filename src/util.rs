use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::Result;

/// Formats the given [Duration] as "HH:MM:SS".
pub fn format_time(t: Duration) -> String {
    let hours = t.as_secs() / 3600;
    let minutes = (t.as_secs() % 3600) / 60;
    let seconds = t.as_secs() % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

/// Checks if the given path points to a frame vector artifact.
pub fn is_vector_artifact(path: impl AsRef<Path>) -> bool {
    path.as_ref()
        .to_string_lossy()
        .ends_with(crate::detect::FRAME_VECTOR_DATA_FILE_EXT)
}

/// Expands the given paths into a naturally-sorted list of frame vector artifacts.
///
/// Directories are scanned one level deep for files with the artifact extension;
/// files are used as-is. The result is ordered with a natural, case-insensitive
/// sort so that e.g. `ep2` comes before `ep10`, and the order is stable across runs.
pub fn find_vector_artifacts(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut artifacts = Vec::new();

    for path in paths {
        if path.is_dir() {
            for entry in std::fs::read_dir(path)? {
                let entry = entry?.path();
                if entry.is_file() && is_vector_artifact(&entry) {
                    artifacts.push(entry);
                }
            }
        } else if is_vector_artifact(path) {
            artifacts.push(path.clone());
        }
    }

    artifacts.sort_by(|a, b| {
        natord::compare_ignore_case(&a.to_string_lossy(), &b.to_string_lossy())
    });

    Ok(artifacts)
}

pub(crate) fn compute_header_md5sum(path: impl AsRef<Path>) -> Result<String> {
    // A plain read() may return short; take() + read_to_end always yields the
    // full header (or the whole file, when smaller).
    let f = std::fs::File::open(path.as_ref())?;
    let mut buf = Vec::with_capacity(8192);
    f.take(8192).read_to_end(&mut buf)?;
    let hash = format!("{:x}", md5::compute(&buf));
    Ok(hash)
}
