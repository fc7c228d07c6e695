//! Run directory layout.
//!
//! ```text
//! <output_dir>/run_<YYYYMMDD_HHMMSS>/
//!   manuscripts/<source>_<manuscript_id>.json
//!   all_manuscripts.json
//!   collection_metadata.json
//!   summary_statistics.json
//!   README.txt
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use peerbrief_common::CollectionConfig;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::models::{CollectionMetadata, Manuscript};
use crate::stats::SummaryStatistics;

pub const RUN_PREFIX: &str = "run_";
pub const MANUSCRIPTS_DIR: &str = "manuscripts";
pub const ALL_MANUSCRIPTS_FILE: &str = "all_manuscripts.json";
pub const METADATA_FILE: &str = "collection_metadata.json";
pub const SUMMARY_FILE: &str = "summary_statistics.json";
pub const README_FILE: &str = "README.txt";

/// `run_<YYYYMMDD_HHMMSS>`
pub fn run_dir_name(at: DateTime<Utc>) -> String {
    format!("{}{}", RUN_PREFIX, at.format("%Y%m%d_%H%M%S"))
}

/// Write every output file of one collection run and return its directory.
pub fn write_run(
    config: &CollectionConfig,
    manuscripts: &[Manuscript],
    metadata: &[CollectionMetadata],
    summary: &SummaryStatistics,
) -> anyhow::Result<PathBuf> {
    let settings = &config.output;
    let output_dir = Path::new(&settings.output_dir);
    let run_dir = create_run_dir(output_dir, Utc::now())?;

    if settings.save_individual_files {
        let dir = run_dir.join(MANUSCRIPTS_DIR);
        fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
        for m in manuscripts {
            write_json(&dir.join(format!("{}.json", m.file_stem())), m)?;
        }
        info!("Saved {} individual manuscript files to {}", manuscripts.len(), dir.display());
    }

    if settings.save_combined_file {
        write_json(&run_dir.join(ALL_MANUSCRIPTS_FILE), manuscripts)?;
        info!("Saved combined manuscripts file");
    }

    write_json(&run_dir.join(METADATA_FILE), metadata)?;

    if settings.save_summary_stats {
        write_json(&run_dir.join(SUMMARY_FILE), summary)?;
    }

    let readme = render_readme(config, &run_dir, manuscripts.len());
    fs::write(run_dir.join(README_FILE), readme)
        .with_context(|| format!("writing README in {}", run_dir.display()))?;

    info!("💾 All files saved to: {}", run_dir.display());
    Ok(run_dir)
}

/// Create `run_<timestamp>`; two runs in the same second get a numeric suffix.
fn create_run_dir(output_dir: &Path, at: DateTime<Utc>) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("creating output directory {}", output_dir.display()))?;

    let base = run_dir_name(at);
    let mut candidate = output_dir.join(&base);
    let mut n = 2;
    while candidate.exists() {
        candidate = output_dir.join(format!("{}_{}", base, n));
        n += 1;
    }
    fs::create_dir(&candidate).with_context(|| format!("creating {}", candidate.display()))?;
    Ok(candidate)
}

fn render_readme(config: &CollectionConfig, run_dir: &Path, total: usize) -> String {
    let stamp = run_dir
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.strip_prefix(RUN_PREFIX))
        .unwrap_or_default();

    let mut sources = Vec::new();
    if config.sources.elife {
        sources.push("eLife");
    }
    if config.sources.f1000 {
        sources.push("F1000Research");
    }

    format!(
        "Peer Review Data Collection Run\n\
         ================================\n\n\
         Collection Date: {stamp}\n\
         Total Manuscripts: {total}\n\
         Sources: {sources}\n\n\
         Files:\n\
         - {MANUSCRIPTS_DIR}/: Individual manuscript JSON files\n\
         - {ALL_MANUSCRIPTS_FILE}: All manuscripts in one file\n\
         - {METADATA_FILE}: Collection process metadata\n\
         - {SUMMARY_FILE}: Summary statistics\n",
        sources = sources.join(" "),
    )
}

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> anyhow::Result<()> {
    let body = serde_json::to_string_pretty(value)?;
    fs::write(path, body).with_context(|| format!("writing {}", path.display()))?;
    debug!("Wrote {}", path.display());
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let body = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&body).with_context(|| format!("parsing {}", path.display()))
}

// ── Reading runs back ─────────────────────────────────────────────────────────

/// A run directory found on disk.
#[derive(Debug, Clone)]
pub struct RunInfo {
    pub name: String,
    pub path: PathBuf,
    /// `None` when the run has no (readable) summary file
    pub summary: Option<SummaryStatistics>,
}

/// All `run_*` directories under `collection_dir`, newest first.
pub fn list_runs(collection_dir: &Path) -> anyhow::Result<Vec<RunInfo>> {
    if !collection_dir.exists() {
        return Ok(Vec::new());
    }

    let mut runs = Vec::new();
    for entry in fs::read_dir(collection_dir)
        .with_context(|| format!("listing {}", collection_dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            continue;
        };
        if !path.is_dir() || !name.starts_with(RUN_PREFIX) {
            continue;
        }
        let summary = load_summary(&path).ok();
        runs.push(RunInfo { name, path, summary });
    }

    runs.sort_by(|a, b| run_order_key(&b.name).cmp(&run_order_key(&a.name)));
    Ok(runs)
}

/// Orders `run_<stamp>` before `run_<stamp>_2` before `run_<stamp>_10`.
fn run_order_key(name: &str) -> (&str, u32) {
    let rest = name.strip_prefix(RUN_PREFIX).unwrap_or(name);
    match rest.rsplit_once('_') {
        // The stamp itself contains one '_', so only a third part is a suffix.
        Some((stamp, n)) if stamp.contains('_') => match n.parse() {
            Ok(n) => (stamp, n),
            Err(_) => (rest, 1),
        },
        _ => (rest, 1),
    }
}

/// The newest run directory, if any.
pub fn latest_run(collection_dir: &Path) -> anyhow::Result<Option<PathBuf>> {
    Ok(list_runs(collection_dir)?.into_iter().next().map(|r| r.path))
}

pub fn load_manuscripts(run_dir: &Path) -> anyhow::Result<Vec<Manuscript>> {
    read_json(&run_dir.join(ALL_MANUSCRIPTS_FILE))
}

pub fn load_metadata(run_dir: &Path) -> anyhow::Result<Vec<CollectionMetadata>> {
    read_json(&run_dir.join(METADATA_FILE))
}

pub fn load_summary(run_dir: &Path) -> anyhow::Result<SummaryStatistics> {
    read_json(&run_dir.join(SUMMARY_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ManuscriptDraft, ReviewSource};

    fn config_for(dir: &Path) -> CollectionConfig {
        let mut config = CollectionConfig::default();
        config.output.output_dir = dir.to_string_lossy().into_owned();
        config
    }

    #[test]
    fn test_run_dir_name() {
        let at = DateTime::parse_from_rfc3339("2024-03-05T07:08:09Z").unwrap().with_timezone(&Utc);
        assert_eq!(run_dir_name(at), "run_20240305_070809");
    }

    #[test]
    fn test_write_run_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_for(tmp.path());
        let manuscripts = vec![ManuscriptDraft::new("97433", ReviewSource::Elife, "u", "T").build()];
        let summary = SummaryStatistics::compute(&manuscripts, &[]);

        let run_dir = write_run(&config, &manuscripts, &[], &summary).unwrap();
        assert!(run_dir.join("manuscripts/elife_97433.json").is_file());
        assert!(run_dir.join(ALL_MANUSCRIPTS_FILE).is_file());
        assert!(run_dir.join(METADATA_FILE).is_file());
        assert!(run_dir.join(SUMMARY_FILE).is_file());

        let readme = fs::read_to_string(run_dir.join(README_FILE)).unwrap();
        assert!(readme.contains("Total Manuscripts: 1"));
        assert!(readme.contains("Sources: eLife F1000Research"));

        let back = load_manuscripts(&run_dir).unwrap();
        assert_eq!(back, manuscripts);
    }

    #[test]
    fn test_disabled_outputs_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = config_for(tmp.path());
        config.output.save_individual_files = false;
        config.output.save_summary_stats = false;
        let summary = SummaryStatistics::compute(&[], &[]);

        let run_dir = write_run(&config, &[], &[], &summary).unwrap();
        assert!(!run_dir.join(MANUSCRIPTS_DIR).exists());
        assert!(!run_dir.join(SUMMARY_FILE).exists());
        assert!(run_dir.join(METADATA_FILE).is_file());
    }

    #[test]
    fn test_same_second_runs_do_not_collide() {
        let tmp = tempfile::tempdir().unwrap();
        let at = Utc::now();
        let first = create_run_dir(tmp.path(), at).unwrap();
        let second = create_run_dir(tmp.path(), at).unwrap();
        assert_ne!(first, second);
        assert!(second.file_name().unwrap().to_str().unwrap().ends_with("_2"));
    }

    #[test]
    fn test_list_runs_newest_first() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("run_20240101_000000")).unwrap();
        fs::create_dir(tmp.path().join("run_20240202_000000")).unwrap();
        fs::create_dir(tmp.path().join("scratch")).unwrap();
        fs::write(tmp.path().join("run_notes.txt"), "").unwrap();

        let runs = list_runs(tmp.path()).unwrap();
        let names: Vec<_> = runs.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["run_20240202_000000", "run_20240101_000000"]);
    }

    #[test]
    fn test_collision_suffixes_sort_numerically() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["run_20240101_000000", "run_20240101_000000_2", "run_20240101_000000_9", "run_20240101_000000_10"] {
            fs::create_dir(tmp.path().join(name)).unwrap();
        }
        fs::create_dir(tmp.path().join("run_20231231_235959_11")).unwrap();

        let runs = list_runs(tmp.path()).unwrap();
        let names: Vec<_> = runs.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "run_20240101_000000_10",
                "run_20240101_000000_9",
                "run_20240101_000000_2",
                "run_20240101_000000",
                "run_20231231_235959_11",
            ]
        );
        assert_eq!(latest_run(tmp.path()).unwrap(), Some(tmp.path().join("run_20240101_000000_10")));
        assert!(runs[0].summary.is_none());
        assert_eq!(
            latest_run(tmp.path()).unwrap(),
            Some(tmp.path().join("run_20240202_000000"))
        );

        assert!(list_runs(&tmp.path().join("missing")).unwrap().is_empty());
    }
}
