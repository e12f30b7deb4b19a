//! Index values over time and across spatial scales

use rayon::prelude::*;

use super::{Frame, MultiGroupIndex, SingleGroupIndex};
use crate::algorithm::spatial::SpatialContext;
use crate::error::{IncsegError, Result};
use crate::models::dataset::MetroDataset;
use crate::models::income::IncomeGroup;
use crate::models::results::{IndexTable, ProfileTable};

fn ensure_years(dataset: &MetroDataset) -> Result<Vec<i32>> {
    let years = dataset.years();
    if years.is_empty() {
        return Err(IncsegError::EmptyDataset(dataset.metro.clone()));
    }
    Ok(years)
}

/// Every single-group index of one group for every year of a dataset
pub fn singlegroup_tempdyn(
    dataset: &MetroDataset,
    ctx: &SpatialContext,
    group: IncomeGroup,
) -> Result<IndexTable> {
    let years = ensure_years(dataset)?;
    let values = years
        .par_iter()
        .map(|&year| {
            let frame = Frame::for_year(dataset, ctx, year);
            SingleGroupIndex::ALL
                .iter()
                .map(|index| index.compute(&frame, group))
                .collect::<Result<Vec<_>>>()
        })
        .collect::<Result<Vec<_>>>()?;

    IndexTable::new(
        SingleGroupIndex::ALL.iter().map(|index| index.name().to_string()).collect(),
        years,
        values,
    )
}

/// Every multi-group index for every year of a dataset
pub fn multigroup_tempdyn(dataset: &MetroDataset, ctx: &SpatialContext) -> Result<IndexTable> {
    let years = ensure_years(dataset)?;
    let values = years
        .par_iter()
        .map(|&year| {
            let frame = Frame::for_year(dataset, ctx, year);
            MultiGroupIndex::ALL
                .iter()
                .map(|index| index.compute(&frame))
                .collect::<Result<Vec<_>>>()
        })
        .collect::<Result<Vec<_>>>()?;

    IndexTable::new(
        MultiGroupIndex::ALL.iter().map(|index| index.name().to_string()).collect(),
        years,
        values,
    )
}

/// Multiscalar profile: one index computed on kernel smoothed counts for
/// each distance band and year
pub fn spacetime_dyn(
    dataset: &MetroDataset,
    ctx: &SpatialContext,
    index: SingleGroupIndex,
    group: IncomeGroup,
    distances: &[u32],
) -> Result<ProfileTable> {
    let years = ensure_years(dataset)?;
    let frames: Vec<Frame<'_>> = years
        .iter()
        .map(|&year| Frame::for_year(dataset, ctx, year))
        .collect();

    let values = distances
        .par_iter()
        .map(|&distance| {
            frames
                .iter()
                .map(|frame| index.compute(&frame.lagged(f64::from(distance)), group))
                .collect::<Result<Vec<_>>>()
        })
        .collect::<Result<Vec<_>>>()?;

    ProfileTable::new(distances.to_vec(), years, values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::projection::UtmZone;
    use crate::algorithm::segregation::test_support::strip;
    use crate::models::dataset::{BlockGroup, DatasetRow};
    use crate::models::income::IncomeGroupRecord;
    use geo_types::MultiPolygon;

    /// Four units over two years: high income households move from the
    /// first pair of units in 2012 to an even spread in 2013
    fn dataset() -> MetroDataset {
        let counts = |year: i32, unit: usize| -> (f64, f64) {
            match (year, unit) {
                (2012, 0 | 1) => (8.0, 2.0),
                (2012, _) => (0.0, 10.0),
                _ => (4.0, 6.0),
            }
        };
        let rows = [2012, 2013]
            .into_iter()
            .flat_map(|year| {
                (0..4).map(move |unit| {
                    let (high, low) = counts(year, unit);
                    let mut brackets = [0.0; 16];
                    brackets[0] = low;
                    brackets[15] = high;
                    DatasetRow {
                        unit,
                        record: IncomeGroupRecord::from_brackets(
                            format!("bg{unit}"),
                            year,
                            high + low,
                            &brackets,
                        ),
                    }
                })
            })
            .collect();

        MetroDataset {
            metro: "00001".to_string(),
            crs: UtmZone { zone: 11, north: true },
            units: (0..4)
                .map(|unit| BlockGroup {
                    geoid: format!("bg{unit}"),
                    geometry: MultiPolygon(vec![]),
                })
                .collect(),
            rows,
        }
    }

    #[test]
    fn test_singlegroup_tempdyn_shape() {
        let data = dataset();
        let ctx = strip(4);
        let table = singlegroup_tempdyn(&data, &ctx, IncomeGroup::VeryHigh).unwrap();

        assert_eq!(table.years(), &[2012, 2013]);
        assert_eq!(table.indices().len(), SingleGroupIndex::ALL.len());
        let dissim = table.series("Dissim").unwrap();
        assert!(dissim[0] > 0.5);
        assert!(dissim[1].abs() < 1e-12);
    }

    #[test]
    fn test_multigroup_tempdyn_shape() {
        let data = dataset();
        let ctx = strip(4);
        let table = multigroup_tempdyn(&data, &ctx).unwrap();
        assert_eq!(table.indices().len(), MultiGroupIndex::ALL.len());
        assert!(table.value("MultiDissim", 2012).unwrap() > table.value("MultiDissim", 2013).unwrap());
    }

    #[test]
    fn test_spacetime_profile_decreases_with_scale() {
        let data = dataset();
        let ctx = strip(4);
        let profile = spacetime_dyn(
            &data,
            &ctx,
            SingleGroupIndex::Entropy,
            IncomeGroup::VeryHigh,
            &[500, 5000],
        )
        .unwrap();

        assert_eq!(profile.distances(), &[500, 5000]);
        let y2012 = profile.profile(2012).unwrap();
        // At 500m the kernel only sees each unit itself
        let plain = singlegroup_tempdyn(&data, &ctx, IncomeGroup::VeryHigh)
            .unwrap()
            .value("Entropy", 2012)
            .unwrap();
        assert!((y2012[0] - plain).abs() < 1e-12);
        assert!(y2012[1] < y2012[0]);
    }

    #[test]
    fn test_empty_dataset_is_an_error() {
        let mut data = dataset();
        data.rows.clear();
        let ctx = strip(4);
        assert!(matches!(
            multigroup_tempdyn(&data, &ctx),
            Err(IncsegError::EmptyDataset(_))
        ));
    }
}
