/*
 * Copyright (c) 2025-present Dawid Pawlik
 *
 * For educational use only by employees and students of MIMUW.
 * See LICENSE file for details.
 */

//! # Column grouping
//!
//! Deciding which columns to store together is left to a [`ColumnGrouper`].
//! The crate ships two: [`SingleColumnGrouper`], which keeps every
//! compressible column on its own, and [`FixedGrouping`], which hands back a
//! plan chosen by the caller. Whatever a grouper returns is checked by
//! [`validate_plan`] before any group is built.

use crate::CompressionType;
use crate::error::CompressionError;
use crate::error::Result;
use crate::estimate::CompressedSizeInfo;
use crate::settings::CompressionSettings;
use serde::Deserialize;
use serde::Serialize;

/// Columns to store together and the encoding to request for them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnGroupPlan {
    pub columns: Vec<usize>,
    pub compression: CompressionType,
}

impl ColumnGroupPlan {
    pub fn new(columns: Vec<usize>, compression: CompressionType) -> Self {
        ColumnGroupPlan {
            columns,
            compression,
        }
    }
}

pub trait ColumnGrouper: Send + Sync {
    /// Group the columns described by `infos`. Columns left out of every group
    /// end up in one trailing uncompressed group.
    fn co_code(
        &self,
        infos: &CompressedSizeInfo,
        settings: &CompressionSettings,
    ) -> Result<Vec<ColumnGroupPlan>>;

    /// Whether the grouper reads the classify estimates. When it does not,
    /// the classify phase is skipped and cannot abort the compression.
    fn requires_estimates(&self) -> bool {
        true
    }
}

/// Every compressible column alone, with its cheapest encoding
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleColumnGrouper;

impl ColumnGrouper for SingleColumnGrouper {
    fn co_code(
        &self,
        infos: &CompressedSizeInfo,
        _settings: &CompressionSettings,
    ) -> Result<Vec<ColumnGroupPlan>> {
        Ok(infos
            .infos
            .iter()
            .filter(|info| info.is_compressible())
            .map(|info| ColumnGroupPlan::new(info.columns.clone(), info.best))
            .collect())
    }
}

/// A grouping fixed up front
#[derive(Debug, Clone, Default)]
pub struct FixedGrouping(pub Vec<ColumnGroupPlan>);

impl ColumnGrouper for FixedGrouping {
    fn co_code(
        &self,
        _infos: &CompressedSizeInfo,
        _settings: &CompressionSettings,
    ) -> Result<Vec<ColumnGroupPlan>> {
        Ok(self.0.clone())
    }

    fn requires_estimates(&self) -> bool {
        false
    }
}

/// Sort each group's columns and check that groups are non-empty, in range,
/// pairwise disjoint and request an encoding the settings allow
pub fn validate_plan(
    mut plans: Vec<ColumnGroupPlan>,
    num_cols: usize,
    settings: &CompressionSettings,
) -> Result<Vec<ColumnGroupPlan>> {
    let mut owner: Vec<Option<usize>> = vec![None; num_cols];
    for (i, plan) in plans.iter_mut().enumerate() {
        if plan.columns.is_empty() {
            return Err(CompressionError::InvalidPlan(format!("group {} has no columns", i)));
        }
        if !settings.is_valid(plan.compression) {
            return Err(CompressionError::InvalidPlan(format!(
                "group {} requests {}, which is not enabled",
                i, plan.compression
            )));
        }
        plan.columns.sort_unstable();
        for &c in &plan.columns {
            let slot = owner.get_mut(c).ok_or_else(|| {
                CompressionError::InvalidPlan(format!(
                    "column {} in group {} is out of range for {} columns",
                    c, i, num_cols
                ))
            })?;
            if let Some(other) = slot.replace(i) {
                return Err(CompressionError::InvalidPlan(format!(
                    "column {} is claimed by groups {} and {}",
                    c, other, i
                )));
            }
        }
    }
    Ok(plans)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> CompressionSettings {
        CompressionSettings::default()
    }

    #[test]
    fn test_plan_columns_are_sorted() {
        let plans = validate_plan(
            vec![
                ColumnGroupPlan::new(vec![3, 1], CompressionType::Ddc),
                ColumnGroupPlan::new(vec![0], CompressionType::Sdc),
            ],
            4,
            &settings(),
        )
        .unwrap();
        assert_eq!(plans[0].columns, vec![1, 3]);
    }

    #[test]
    fn test_invalid_plans() {
        let s = settings();
        let overlap = vec![
            ColumnGroupPlan::new(vec![0, 1], CompressionType::Ddc),
            ColumnGroupPlan::new(vec![1], CompressionType::Ole),
        ];
        assert!(validate_plan(overlap, 2, &s).is_err());
        let duplicate = vec![ColumnGroupPlan::new(vec![1, 1], CompressionType::Ddc)];
        assert!(validate_plan(duplicate, 2, &s).is_err());
        let out_of_range = vec![ColumnGroupPlan::new(vec![5], CompressionType::Ddc)];
        assert!(validate_plan(out_of_range, 2, &s).is_err());
        let empty = vec![ColumnGroupPlan::new(vec![], CompressionType::Ddc)];
        assert!(validate_plan(empty, 2, &s).is_err());
        let forced_const = vec![ColumnGroupPlan::new(vec![0], CompressionType::Const)];
        assert!(validate_plan(forced_const, 2, &s).is_err());

        let ddc_only = CompressionSettings::builder()
            .valid_compressions([CompressionType::Ddc])
            .build()
            .unwrap();
        let rle = vec![ColumnGroupPlan::new(vec![0], CompressionType::Rle)];
        assert!(validate_plan(rle, 2, &ddc_only).is_err());
    }
}
