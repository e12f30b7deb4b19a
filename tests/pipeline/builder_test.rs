use incseg::IncsegError;
use incseg::utils::test::SyntheticData;

use crate::utils::Workspace;

/// Two block groups over two years give four rows restricted to the metro
#[test]
fn test_generate_dataset_joins_years() -> incseg::Result<()> {
    let workspace = Workspace::new(&SyntheticData::single("99999", 2, 0, vec![2012, 2013], 7));
    let dataset = workspace.builder().generate_dataset("99999")?;

    assert_eq!(dataset.len(), 4);
    assert_eq!(dataset.units.len(), 2);
    assert_eq!(dataset.years(), vec![2012, 2013]);
    assert!(dataset.rows.iter().all(|row| row.record.geoid.starts_with("99001")));
    assert_eq!(dataset.crs.zone, 11);
    assert!(dataset.crs.north);
    Ok(())
}

#[test]
fn test_shares_are_consistent() -> incseg::Result<()> {
    let workspace = Workspace::new(&SyntheticData::single("99999", 4, 0, vec![2014], 11));
    let dataset = workspace.builder().generate_dataset("99999")?;

    for row in &dataset.rows {
        let record = &row.record;
        let counts = record.very_low_inc
            + record.low_inc
            + record.med_inc
            + record.high_inc
            + record.very_high_inc;
        assert!((counts - record.total).abs() < 1e-9, "{}", record.geoid);
        let shares = record.share_very_low_inc
            + record.share_low_inc
            + record.share_med_inc
            + record.share_high_inc
            + record.share_very_high_inc;
        assert!((shares - 1.0).abs() < 1e-9, "{}", record.geoid);
    }
    Ok(())
}

/// Projected coordinates are metres, far outside the lon/lat range
#[test]
fn test_dataset_is_projected() -> incseg::Result<()> {
    let workspace = Workspace::new(&SyntheticData::single("99999", 3, 0, vec![2012], 3));
    let dataset = workspace.builder().generate_dataset("99999")?;

    for unit in &dataset.units {
        for polygon in &unit.geometry.0 {
            for coord in polygon.exterior().coords() {
                assert!(coord.x > 100_000.0 && coord.x < 900_000.0);
                assert!(coord.y > 3_000_000.0);
            }
        }
    }
    Ok(())
}

#[test]
fn test_unknown_metro() {
    let workspace = Workspace::new(&SyntheticData::single("99999", 2, 0, vec![2012], 1));
    let result = workspace.builder().generate_dataset("00000");
    assert!(matches!(result, Err(IncsegError::UnknownMetro(code)) if code == "00000"));
}

#[test]
fn test_island_handling_keeps_largest_component() -> incseg::Result<()> {
    let workspace = Workspace::new(&SyntheticData::single("99998", 5, 1, vec![2012, 2013], 5));
    let builder = workspace.builder();

    let full = builder.generate_dataset("99998")?;
    let trimmed = builder.generate_dataset_with_island_handling("99998")?;

    assert_eq!(full.units.len(), 6);
    assert_eq!(trimmed.units.len(), 5);
    assert_eq!(trimmed.len(), 10);
    assert!(trimmed.rows.iter().all(|row| row.unit < trimmed.units.len()));
    Ok(())
}

#[tokio::test]
async fn test_async_matches_sync() -> incseg::Result<()> {
    let workspace = Workspace::new(&SyntheticData::single("99999", 3, 0, vec![2012, 2013, 2014], 9));
    let builder = workspace.builder();

    let sync = builder.generate_dataset("99999")?;
    let concurrent = builder.generate_dataset_async("99999").await?;
    assert_eq!(sync, concurrent);
    Ok(())
}
