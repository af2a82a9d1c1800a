use crate::counters::CounterEntry;
use crate::error::{Result, TrafmonError};
use std::ffi::OsString;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// One `username,outgoing,incoming` line per entry.
pub fn render_snapshot(entries: &[CounterEntry]) -> String {
    let mut out = String::with_capacity(entries.len() * 32);
    for entry in entries {
        let _ = writeln!(out, "{},{},{}", entry.username, entry.outgoing, entry.incoming);
    }
    out
}

/// Replace `path` with the rendered snapshot.
///
/// The content goes to a sibling temp file first and is renamed over the
/// target, so readers see either the previous or the new file in full.
pub async fn write_snapshot_file(path: &Path, entries: &[CounterEntry]) -> Result<()> {
    let tmp = temp_path(path);
    let wrap = |source| TrafmonError::SnapshotFile {
        path: path.to_path_buf(),
        source,
    };

    let contents = render_snapshot(entries);
    let mut file = fs::File::create(&tmp).await.map_err(wrap)?;
    file.write_all(contents.as_bytes()).await.map_err(wrap)?;
    file.sync_all().await.map_err(wrap)?;
    drop(file);

    if let Err(source) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(wrap(source));
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("snapshot"));
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(username: &str, outgoing: u64, incoming: u64) -> CounterEntry {
        CounterEntry {
            username: username.to_string(),
            outgoing,
            incoming,
        }
    }

    #[test]
    fn renders_one_line_per_user() {
        let rendered = render_snapshot(&[entry("alice", 120, 50), entry("bob", 0, 7)]);
        assert_eq!(rendered, "alice,120,50\nbob,0,7\n");
        assert_eq!(render_snapshot(&[]), "");
    }

    #[tokio::test]
    async fn write_overwrites_previous_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dante_trafmon.data");

        write_snapshot_file(&path, &[entry("alice", 1, 1), entry("bob", 2, 2)])
            .await
            .unwrap();
        write_snapshot_file(&path, &[entry("alice", 5, 6)])
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "alice,5,6\n");
        assert!(!temp_path(&path).exists());
    }

    #[tokio::test]
    async fn missing_directory_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("out.data");

        let err = write_snapshot_file(&path, &[entry("alice", 1, 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, TrafmonError::SnapshotFile { .. }));
    }

    #[test]
    fn temp_file_sits_next_to_target() {
        assert_eq!(
            temp_path(Path::new("/var/lib/trafmon/out.data")),
            PathBuf::from("/var/lib/trafmon/out.data.tmp")
        );
    }
}
