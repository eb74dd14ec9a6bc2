//! Turning caller-supplied names into normalized absolute paths.

use std::path::{Component, Path, PathBuf};

use crate::{Error, Result};

/// Join `name` onto `root` (or the current directory) and normalize `.` and
/// `..` lexically. Does not touch the filesystem beyond reading the
/// current directory.
pub fn absolutize(name: impl AsRef<Path>, root: Option<&Path>) -> Result<PathBuf> {
    let name = name.as_ref();
    let joined = if name.is_absolute() {
        name.to_path_buf()
    } else {
        let root = match root {
            Some(root) => root.to_path_buf(),
            None => std::env::current_dir().map_err(|e| Error::Read {
                path:   PathBuf::from("."),
                source: e,
            })?,
        };
        root.join(name)
    };
    Ok(normalize(&joined))
}

/// Like [`absolutize`], but the result must exist. Directories pass only
/// when `allow_dir` is set; anything else that is not a regular file is
/// rejected.
pub fn resolve_checked(
    name: impl AsRef<Path>,
    root: Option<&Path>,
    allow_dir: bool,
) -> Result<PathBuf> {
    let path = absolutize(name, root)?;
    let metadata = std::fs::metadata(&path).map_err(|e| Error::on_read(&path, e))?;

    if metadata.is_dir() {
        if !allow_dir {
            return Err(Error::NotFound {
                path,
                reason: "expected a file but found a directory",
            });
        }
    } else if !metadata.is_file() {
        return Err(Error::not_regular(path));
    }

    Ok(path)
}

pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                // `..` at the root stays at the root
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other),
        }
    }
    out
}
