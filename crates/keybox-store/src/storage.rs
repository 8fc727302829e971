//! Atomic file replacement for keybox saves.
//!
//! A save never touches the existing file until the replacement is fully on
//! disk: the new bytes go to a `<path>.tmp` sibling, which is fsynced and
//! then renamed over the target. If anything fails mid-way, the original
//! file is untouched and the temp file is removed.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// The `<path>.tmp` sibling used for staging.
pub(crate) fn tmp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

/// Write `data` to `path` via tmp-file + fsync + rename.
pub(crate) fn atomic_write(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let tmp = tmp_path(path);

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&tmp)?;
    if let Err(e) = file.write_all(data).and_then(|()| file.sync_all()) {
        drop(file);
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    drop(file);

    if let Err(e) = replace(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }

    // Persist the rename itself. Not supported on all platforms; failure to
    // open the directory is not fatal.
    if let Some(parent) = path.parent() {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }
    Ok(())
}

/// `rename` is atomic on POSIX when source and target share a filesystem.
#[cfg(not(windows))]
fn replace(tmp: &Path, path: &Path) -> std::io::Result<()> {
    fs::rename(tmp, path)
}

/// Windows `rename` refuses to overwrite; remove the target first. The
/// guarantee is narrower there — a crash between the two steps can leave
/// only the `.tmp` file behind.
#[cfg(windows)]
fn replace(tmp: &Path, path: &Path) -> std::io::Result<()> {
    if path.exists() {
        fs::remove_file(path)?;
    }
    fs::rename(tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tmp_path_appends_suffix() {
        let tmp = tmp_path(Path::new("/home/u/.keybox/keybox.safe"));
        assert_eq!(tmp, Path::new("/home/u/.keybox/keybox.safe.tmp"));
    }

    #[test]
    fn write_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("box.safe");
        atomic_write(&path, b"first").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"first");
        atomic_write(&path, b"second").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"second");
    }

    #[test]
    fn no_tmp_file_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("box.safe");
        atomic_write(&path, b"data").unwrap();
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, ["box.safe"]);
    }
}
