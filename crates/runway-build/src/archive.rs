use std::fs::File;
use std::path::{Component, Path, PathBuf};
use std::process::Command;

use zip::write::SimpleFileOptions;

/// File name of the source archive uploaded for remote builds.
pub const ARCHIVE_NAME: &str = "source.zip";

/// Directories excluded at any depth: VCS metadata and dependency caches.
const EXCLUDED_ANYWHERE: &[&str] = &[".git", "node_modules", "__pycache__", ".pytest_cache"];

/// Directories excluded only at the project root: virtualenvs and build outputs.
const EXCLUDED_AT_ROOT: &[&str] = &[
    ".venv", "venv", "target", "dist", "build", "cdk.out", ".runway",
];

/// A zip of the project source, ready for upload.
#[derive(Debug)]
pub struct SourceArchive {
    pub path: PathBuf,
    pub file_count: usize,
}

/// Packages the project into `<out_dir>/source.zip`.
///
/// Uses `git ls-files` to respect `.gitignore` when the project is a git
/// work tree, and walks the directory otherwise. `extra_excludes` are
/// project-relative paths (files or directories) left out in addition to
/// the built-in exclusions.
pub fn create_archive(
    project_dir: &Path,
    out_dir: &Path,
    extra_excludes: &[String],
) -> Result<SourceArchive, ArchiveError> {
    let mut files = match git_ls_files(project_dir)? {
        Some(files) => files,
        None => {
            tracing::debug!(dir = %project_dir.display(), "not a git work tree, walking directory");
            let mut files = Vec::new();
            walk_dir(project_dir, Path::new(""), &mut files)?;
            files
        }
    };
    files.sort();

    let excludes: Vec<PathBuf> = extra_excludes
        .iter()
        .map(|e| PathBuf::from(e.trim_end_matches('/')))
        .filter(|p| !p.as_os_str().is_empty())
        .collect();

    let archive_path = out_dir.join(ARCHIVE_NAME);
    let file = File::create(&archive_path).map_err(|e| ArchiveError::Create {
        path: archive_path.clone(),
        source: e,
    })?;
    let mut writer = zip::ZipWriter::new(file);
    let base_options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let mut file_count = 0;
    for relative in &files {
        if is_excluded(relative, &excludes) {
            continue;
        }

        let src = project_dir.join(relative);
        match std::fs::metadata(&src) {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => {
                // submodules show up in git ls-files as directories
                tracing::warn!(path = %relative.display(), "not a regular file, left out of archive");
                continue;
            }
            // git ls-files still lists tracked files deleted from the work tree
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %relative.display(), "listed by git but missing, skipped");
                continue;
            }
            Err(e) => {
                return Err(ArchiveError::ReadFile {
                    path: src.clone(),
                    source: e,
                });
            }
        }

        let mode = unix_mode(&src).map_err(|e| ArchiveError::ReadFile {
            path: src.clone(),
            source: e,
        })?;
        let options = match mode {
            Some(mode) => base_options.unix_permissions(mode),
            None => base_options,
        };

        writer
            .start_file(entry_name(relative), options)
            .map_err(|e| ArchiveError::Entry {
                path: relative.clone(),
                source: e,
            })?;

        let mut input = File::open(&src).map_err(|e| ArchiveError::ReadFile {
            path: src.clone(),
            source: e,
        })?;
        std::io::copy(&mut input, &mut writer).map_err(|e| ArchiveError::ReadFile {
            path: src.clone(),
            source: e,
        })?;

        file_count += 1;
    }

    writer.finish().map_err(|e| ArchiveError::Finish {
        path: archive_path.clone(),
        source: e,
    })?;

    tracing::debug!(files = file_count, archive = %archive_path.display(), "source archived");

    Ok(SourceArchive {
        path: archive_path,
        file_count,
    })
}

/// Returns the list of files git considers part of the project:
/// tracked files + untracked files that are not .gitignored.
///
/// `Ok(None)` when git is missing or the directory is not a work tree.
fn git_ls_files(project_dir: &Path) -> Result<Option<Vec<PathBuf>>, ArchiveError> {
    let output = match Command::new("git")
        .args(["ls-files", "-z", "--cached", "--others", "--exclude-standard"])
        .current_dir(project_dir)
        .output()
    {
        Ok(output) => output,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("git not installed, falling back to directory walk");
            return Ok(None);
        }
        Err(e) => {
            return Err(ArchiveError::GitCommand {
                detail: "failed to execute git ls-files".to_owned(),
                source: e,
            });
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("not a git repository") {
            return Ok(None);
        }
        return Err(ArchiveError::GitFailed {
            detail: format!(
                "git ls-files exited with {}: {}",
                output.status,
                stderr.trim()
            ),
        });
    }

    // -z keeps paths verbatim; without it git C-quotes non-ASCII names
    output
        .stdout
        .split(|b| *b == 0)
        .filter(|raw| !raw.is_empty())
        .map(path_from_bytes)
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

#[cfg(unix)]
fn path_from_bytes(raw: &[u8]) -> Result<PathBuf, ArchiveError> {
    use std::os::unix::ffi::OsStrExt;
    Ok(PathBuf::from(std::ffi::OsStr::from_bytes(raw)))
}

#[cfg(not(unix))]
fn path_from_bytes(raw: &[u8]) -> Result<PathBuf, ArchiveError> {
    std::str::from_utf8(raw)
        .map(PathBuf::from)
        .map_err(|e| ArchiveError::GitFailed {
            detail: format!("git ls-files printed a non UTF-8 path: {e}"),
        })
}

fn walk_dir(root: &Path, relative: &Path, out: &mut Vec<PathBuf>) -> Result<(), ArchiveError> {
    let dir = root.join(relative);
    let entries = std::fs::read_dir(&dir).map_err(|e| ArchiveError::ReadDir {
        path: dir.clone(),
        source: e,
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| ArchiveError::ReadDir {
            path: dir.clone(),
            source: e,
        })?;
        let path = relative.join(entry.file_name());
        let file_type = entry.file_type().map_err(|e| ArchiveError::ReadDir {
            path: entry.path(),
            source: e,
        })?;

        if file_type.is_dir() {
            if !is_excluded(&path, &[]) {
                walk_dir(root, &path, out)?;
            }
        } else if file_type.is_file() {
            out.push(path);
        }
    }

    Ok(())
}

fn is_excluded(relative: &Path, extra: &[PathBuf]) -> bool {
    let mut components = relative.components().filter_map(|c| match c {
        Component::Normal(name) => name.to_str(),
        _ => None,
    });

    let at_root = components.next().is_some_and(|first| {
        EXCLUDED_AT_ROOT.contains(&first) || EXCLUDED_ANYWHERE.contains(&first)
    });

    at_root
        || components.any(|name| EXCLUDED_ANYWHERE.contains(&name))
        || extra.iter().any(|ex| relative.starts_with(ex))
}

/// Zip entry names always use `/`.
fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Keeps the executable bit on entrypoint scripts.
#[cfg(unix)]
fn unix_mode(path: &Path) -> std::io::Result<Option<u32>> {
    use std::os::unix::fs::PermissionsExt;
    Ok(Some(std::fs::metadata(path)?.permissions().mode() & 0o777))
}

#[cfg(not(unix))]
fn unix_mode(_path: &Path) -> std::io::Result<Option<u32>> {
    Ok(None)
}

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("failed to create archive {path}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read directory {path}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read file {path}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to add {path} to archive")]
    Entry {
        path: PathBuf,
        source: zip::result::ZipError,
    },
    #[error("failed to finalize archive {path}")]
    Finish {
        path: PathBuf,
        source: zip::result::ZipError,
    },
    #[error("git command failed: {detail}")]
    GitCommand {
        detail: String,
        source: std::io::Error,
    },
    #[error("git failed: {detail}")]
    GitFailed { detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excludes_caches_at_any_depth() {
        assert!(is_excluded(Path::new("app/__pycache__/x.pyc"), &[]));
        assert!(is_excluded(Path::new("web/node_modules/a/index.js"), &[]));
        assert!(is_excluded(Path::new(".git/HEAD"), &[]));
    }

    #[test]
    fn excludes_build_outputs_only_at_root() {
        assert!(is_excluded(Path::new("build/out.bin"), &[]));
        assert!(is_excluded(Path::new(".venv/bin/python"), &[]));
        assert!(!is_excluded(Path::new("src/build/mod.py"), &[]));
    }

    #[test]
    fn extra_excludes_match_path_prefixes() {
        let extra = vec![PathBuf::from("docs")];
        assert!(is_excluded(Path::new("docs/index.md"), &extra));
        assert!(!is_excluded(Path::new("docsite/index.md"), &extra));
    }

    #[test]
    fn entry_names_use_forward_slashes() {
        assert_eq!(entry_name(Path::new("app/main.py")), "app/main.py");
    }
}
