//! Per-player CSV artifacts.

use crate::error::Result;
use crate::export::CleanedRecord;
use crate::input::InputRow;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::debug;

const TMP_PREFIX: &str = ".player_";
const TMP_SUFFIX: &str = ".csv.tmp";
/// Temp files this old belong to an attempt that was killed mid-write.
const STALE_AFTER: Duration = Duration::from_secs(60);

pub struct OutputSink {
    dir: PathBuf,
}

impl OutputSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `player_<idx>_<Name_With_Underscores>.csv`
    pub fn path_for(&self, row: &InputRow) -> PathBuf {
        self.dir.join(format!("player_{}_{}.csv", row.index, row.player.replace(' ', "_")))
    }

    /// Writes to a hidden temp file beside the target, then renames over it,
    /// so the final path holds either the old artifact or the complete new one.
    pub fn write(&self, row: &InputRow, record: &CleanedRecord) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        self.sweep_stale_temps();
        let target = self.path_for(row);
        let tmp = self.dir.join(format!(
            ".{}.tmp",
            target.file_name().and_then(|n| n.to_str()).unwrap_or("player.csv")
        ));

        if let Err(e) = write_csv(&tmp, record) {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        fs::rename(&tmp, &target)?;
        Ok(target)
    }

    fn sweep_stale_temps(&self) {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return;
        };
        let now = SystemTime::now();
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !(name.starts_with(TMP_PREFIX) && name.ends_with(TMP_SUFFIX)) {
                continue;
            }
            let stale = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .is_some_and(|age| age >= STALE_AFTER);
            if stale && fs::remove_file(entry.path()).is_ok() {
                debug!("removed leftover temp file {}", name);
            }
        }
    }
}

fn write_csv(path: &Path, record: &CleanedRecord) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&record.headers)?;
    for row in &record.rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    fn row(index: usize, player: &str) -> InputRow {
        InputRow { index, player: player.into(), pos: "WR".into(), url: String::new() }
    }

    fn record() -> CleanedRecord {
        CleanedRecord {
            headers: vec!["Season".into(), "Team".into(), "Player".into(), "Pos".into()],
            rows: vec![vec!["2021".into(), "A, B".into(), "Jane Doe".into(), "WR".into()]],
        }
    }

    #[test]
    fn path_is_deterministic() {
        let sink = OutputSink::new("/tmp/receiving");
        assert_eq!(
            sink.path_for(&row(12, "Marvin Harrison Jr.")),
            PathBuf::from("/tmp/receiving/player_12_Marvin_Harrison_Jr..csv")
        );
    }

    #[test]
    fn write_overwrites_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let sink = OutputSink::new(dir.path().join("out"));
        let jane = row(0, "Jane Doe");

        fs::create_dir_all(sink.dir()).unwrap();
        fs::write(sink.path_for(&jane), "stale").unwrap();

        let path = sink.write(&jane, &record()).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "Season,Team,Player,Pos\n2021,\"A, B\",Jane Doe,WR\n");

        let names: Vec<_> = fs::read_dir(sink.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["player_0_Jane_Doe.csv".to_string()]);
    }

    #[test]
    fn leftovers_from_killed_writes_are_swept() {
        let dir = tempfile::tempdir().unwrap();
        let sink = OutputSink::new(dir.path());
        let old = dir.path().join(".player_5_Old_Timer.csv.tmp");
        let fresh = dir.path().join(".player_6_In_Flight.csv.tmp");
        let unrelated = dir.path().join("notes.tmp");
        for p in [&old, &fresh, &unrelated] {
            fs::write(p, "partial").unwrap();
        }
        let hour_ago = SystemTime::now() - Duration::from_secs(3600);
        for p in [&old, &unrelated] {
            File::options().write(true).open(p).unwrap().set_modified(hour_ago).unwrap();
        }

        sink.write(&row(0, "Jane Doe"), &record()).unwrap();

        assert!(!old.exists());
        assert!(fresh.exists());
        assert!(unrelated.exists());
    }
}
