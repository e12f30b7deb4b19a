use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use incseg::models::results::Artifact;
use incseg::pipeline::{BuildMode, Manifest, MetroOutcome};
use incseg::utils::test::SyntheticData;

use crate::utils::{FailingCalculator, Workspace};

fn snapshot(dir: &std::path::Path) -> BTreeMap<PathBuf, Vec<u8>> {
    fs::read_dir(dir)
        .unwrap()
        .map(|entry| {
            let path = entry.unwrap().path();
            let bytes = fs::read(&path).unwrap();
            (path, bytes)
        })
        .collect()
}

#[test]
fn test_store_data_is_idempotent() {
    let workspace = Workspace::new(&SyntheticData::single("99997", 6, 0, vec![2012, 2013], 21));
    let driver = workspace.driver(1);
    let paths = workspace.metro_paths("99997");

    let manifest = match driver.store_data("99997") {
        MetroOutcome::Completed(manifest) => manifest,
        other => panic!("Expected a completed build, got {other:?}"),
    };
    assert_eq!(manifest.mode, BuildMode::Standard);
    assert_eq!(manifest.units, 6);
    assert_eq!(manifest.artifacts.len(), Artifact::RESULTS.len() + 1);
    assert_eq!(manifest.entry(Artifact::IncomeData).map(|e| e.rows), Some(12));
    for entry in &manifest.artifacts {
        assert!(paths.dir().join(&entry.file).exists(), "{} missing", entry.file);
    }
    assert_eq!(Manifest::read(&paths).unwrap(), Some(manifest));

    let before = snapshot(paths.dir());
    assert_eq!(
        driver.store_data("99997"),
        MetroOutcome::Skipped {
            metro: "99997".to_string()
        }
    );
    assert_eq!(snapshot(paths.dir()), before);
}

#[test]
fn test_failed_build_rolls_back() {
    let workspace = Workspace::new(&SyntheticData::single("99997", 4, 0, vec![2012], 2));
    let driver = workspace.driver_with(FailingCalculator, 1);

    let outcome = driver.store_data("99997");
    assert!(outcome.is_failure());
    assert!(matches!(&outcome, MetroOutcome::Failed { reason, .. } if reason.contains("on purpose")));
    assert!(!workspace.metro_paths("99997").dir().exists());
}

#[test]
fn test_stale_directory_is_rebuilt() {
    let workspace = Workspace::new(&SyntheticData::single("99997", 4, 0, vec![2012, 2013], 4));
    let paths = workspace.metro_paths("99997");
    fs::create_dir_all(paths.dir()).unwrap();
    fs::write(paths.dir().join("leftover.parquet"), b"junk").unwrap();

    let outcome = workspace.driver(1).store_data("99997");
    assert!(matches!(outcome, MetroOutcome::Completed(_)));
    assert!(!paths.dir().join("leftover.parquet").exists());
    assert!(paths.manifest().exists());
}

#[test]
fn test_corrupt_manifest_is_rebuilt() {
    let workspace = Workspace::new(&SyntheticData::single("99997", 4, 0, vec![2012], 8));
    let paths = workspace.metro_paths("99997");
    fs::create_dir_all(paths.dir()).unwrap();
    fs::write(paths.manifest(), b"{not json").unwrap();

    let outcome = workspace.driver(1).store_data("99997");
    assert!(matches!(outcome, MetroOutcome::Completed(_)));
    assert!(Manifest::read(&paths).unwrap().is_some());
}

/// Boundary-based SpatialDissim needs one connected region
#[test]
fn test_islands_need_island_handling() {
    let workspace = Workspace::new(&SyntheticData::single("99996", 5, 1, vec![2012, 2013], 13));
    let driver = workspace.driver(1);
    let paths = workspace.metro_paths("99996");

    let outcome = driver.store_data("99996");
    assert!(
        matches!(&outcome, MetroOutcome::Failed { reason, .. } if reason.contains("not contiguous")),
        "{outcome:?}"
    );
    assert!(!paths.dir().exists());

    match driver.store_data_with_island_handling("99996") {
        MetroOutcome::Completed(manifest) => {
            assert_eq!(manifest.mode, BuildMode::LargestComponent);
            assert_eq!(manifest.units, 5);
        }
        other => panic!("Expected a completed build, got {other:?}"),
    }
}

#[test]
fn test_run_batch_continues_past_failures() -> incseg::Result<()> {
    let workspace = Workspace::new(&SyntheticData::demo(17));
    let metros = vec!["31080".to_string(), "41740".to_string(), "00000".to_string()];

    let report = workspace.driver(2).run_batch(&metros, BuildMode::Standard)?;

    let order: Vec<&str> = report.outcomes.iter().map(MetroOutcome::metro).collect();
    assert_eq!(order, vec!["31080", "41740", "00000"]);
    assert_eq!(report.completed(), 1);
    assert_eq!(report.skipped(), 0);
    assert!(report.has_failures());
    let failed: Vec<&str> = report.failures().into_iter().map(|(metro, _)| metro).collect();
    assert_eq!(failed, vec!["41740", "00000"]);
    assert!(report.to_string().starts_with("3 metros: 1 completed, 0 skipped, 2 failed"));

    let rerun = workspace.driver(1).run_batch(&metros[..1], BuildMode::Standard)?;
    assert_eq!(rerun.skipped(), 1);
    Ok(())
}
