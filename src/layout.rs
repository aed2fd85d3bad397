//! Tiling subsets of the input dimensions.
//!
//! A [`Layout`] splits an input vector into groups of dimensions; the
//! [`AggregateTiler`] codes every group separately and concatenates the tiles.
//! The group number is hashed in as a leading integer coordinate, so two groups
//! over the same values still land on different tiles.

use crate::error::TileError;
use crate::tiles::{IndexSpace, Tiler, UnhHasher};
use clap::ValueEnum;
use serde::Serialize;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    /// All inputs tiled together in a single call.
    #[default]
    Joint,
    /// Every input dimension tiled on its own.
    Singles,
    /// Every unordered pair of input dimensions tiled together.
    Pairs,
}

impl Layout {
    /// Groups of dimension indices for an input of width `num_dims`.
    pub fn groups(self, num_dims: usize) -> Vec<Vec<usize>> {
        match self {
            Layout::Joint => vec![(0..num_dims).collect()],
            Layout::Singles => (0..num_dims).map(|i| vec![i]).collect(),
            Layout::Pairs => (0..num_dims)
                .flat_map(|i| (i + 1..num_dims).map(move |j| vec![i, j]))
                .collect(),
        }
    }

    /// Appended to the reported function name.
    pub fn suffix(self) -> &'static str {
        match self {
            Layout::Joint => "",
            Layout::Singles => "_singles",
            Layout::Pairs => "_pairs",
        }
    }
}

/// Runs one tile coding per group of input dimensions.
#[derive(Clone, Debug)]
pub struct AggregateTiler {
    tiler: Tiler,
    groups: Vec<Vec<usize>>,
    subset: Vec<f32>,
    ints: Vec<i32>,
}

impl AggregateTiler {
    pub fn new(hasher: UnhHasher, groups: Vec<Vec<usize>>) -> Result<Self, TileError> {
        if groups.is_empty() {
            return Err(TileError::NoGroups);
        }
        Ok(Self {
            tiler: Tiler::new(hasher),
            groups,
            subset: Vec::new(),
            ints: Vec::new(),
        })
    }

    pub fn with_layout(
        hasher: UnhHasher,
        layout: Layout,
        num_dims: usize,
    ) -> Result<Self, TileError> {
        Self::new(hasher, layout.groups(num_dims))
    }

    pub fn num_groups(&self) -> usize {
        self.groups.len()
    }

    /// Fill `out` group by group; each group gets `out.len() / num_groups` tilings.
    pub fn tiles(
        &mut self,
        out: &mut [usize],
        mut space: IndexSpace<'_>,
        floats: &[f32],
        ints: Option<&[i32]>,
    ) -> Result<(), TileError> {
        let groups = self.groups.len();
        if out.is_empty() {
            return Err(TileError::NoTilings);
        }
        if out.len() % groups != 0 {
            return Err(TileError::UnevenTilings {
                outputs: out.len(),
                groups,
            });
        }
        let per_group = out.len() / groups;

        for (g, (group, chunk)) in self.groups.iter().zip(out.chunks_mut(per_group)).enumerate() {
            self.subset.clear();
            for &dim in group {
                let value = floats.get(dim).ok_or(TileError::DimensionOutOfRange {
                    index: dim,
                    inputs: floats.len(),
                })?;
                self.subset.push(*value);
            }
            self.ints.clear();
            self.ints
                .push(i32::try_from(g).map_err(|_| TileError::TooManyTilings(g))?);
            if let Some(ints) = ints {
                self.ints.extend_from_slice(ints);
            }
            self.tiler
                .tiles(chunk, space.reborrow(), &self.subset, Some(self.ints.as_slice()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiles::IndexTable;

    #[test]
    fn test_layout_groups() {
        assert_eq!(Layout::Joint.groups(3), vec![vec![0, 1, 2]]);
        assert_eq!(Layout::Singles.groups(3), vec![vec![0], vec![1], vec![2]]);
        assert_eq!(
            Layout::Pairs.groups(4),
            vec![
                vec![0, 1],
                vec![0, 2],
                vec![0, 3],
                vec![1, 2],
                vec![1, 3],
                vec![2, 3]
            ]
        );
        assert!(Layout::Pairs.groups(1).is_empty());
    }

    #[test]
    fn test_pairs_need_two_inputs() {
        assert!(matches!(
            AggregateTiler::with_layout(UnhHasher::new(0), Layout::Pairs, 1),
            Err(TileError::NoGroups)
        ));
    }

    #[test]
    fn test_singles_fill_one_chunk_per_dimension() {
        let mut agg = AggregateTiler::with_layout(UnhHasher::new(5), Layout::Singles, 3).unwrap();
        let mut table = IndexTable::new(1024);
        let mut out = vec![usize::MAX; 3 * 4];
        agg.tiles(&mut out, IndexSpace::Indexed(&mut table), &[1.0, 1.0, 1.0], None)
            .unwrap();
        // Same value in every dimension, but the group number keeps tiles apart.
        assert_eq!(out, (0..12).collect::<Vec<_>>());
    }

    #[test]
    fn test_group_matches_plain_tiler_with_group_int() {
        let hasher = UnhHasher::new(9);
        let mut agg = AggregateTiler::with_layout(hasher.clone(), Layout::Pairs, 3).unwrap();
        let floats = [0.5f32, 4.25, 8.0];
        let mut out = vec![0usize; 3 * 8];
        agg.tiles(&mut out, IndexSpace::Modulo(4096), &floats, None).unwrap();

        // Third pair is (1, 2), group number 2.
        let mut plain = Tiler::new(hasher);
        let mut expected = vec![0usize; 8];
        plain
            .tiles(&mut expected, IndexSpace::Modulo(4096), &[4.25, 8.0], Some(&[2][..]))
            .unwrap();
        assert_eq!(&out[16..24], expected.as_slice());
    }

    #[test]
    fn test_rejects_uneven_outputs_and_missing_dimensions() {
        let mut agg = AggregateTiler::with_layout(UnhHasher::new(1), Layout::Singles, 2).unwrap();
        let mut out = vec![0usize; 3];
        assert!(matches!(
            agg.tiles(&mut out, IndexSpace::Modulo(64), &[1.0, 2.0], None),
            Err(TileError::UnevenTilings { outputs: 3, groups: 2 })
        ));
        let mut out = vec![0usize; 4];
        assert!(matches!(
            agg.tiles(&mut out, IndexSpace::Modulo(64), &[1.0], None),
            Err(TileError::DimensionOutOfRange { index: 1, inputs: 1 })
        ));
    }
}
