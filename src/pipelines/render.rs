// SPDX-License-Identifier: GPL-3.0-only

//! Filter pipeline
//!
//! An ordered list of stage configs owned by one frame record. Rendering
//! always starts from the record's original pixels; nothing derived is
//! cached, so the output depends only on `(original, stages)`.

use super::filters::{FilterParams, FilterStageConfig};
use crate::errors::FilterError;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A single change to a pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PipelineEdit {
    /// Swap the whole stage list
    ReplaceAll { stages: Vec<FilterStageConfig> },
    /// Insert before `index`; `index == len` appends
    Insert {
        index: usize,
        stage: FilterStageConfig,
    },
    Remove { index: usize },
    /// Take the stage at `from` out and reinsert it at `to`
    Move { from: usize, to: usize },
    SetEnabled { index: usize, enabled: bool },
    /// New parameters for an existing stage of the same kind
    SetParams { index: usize, params: FilterParams },
}

/// Ordered, validated filter stages
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<FilterStageConfig>", into = "Vec<FilterStageConfig>")]
pub struct FilterPipeline {
    stages: Vec<FilterStageConfig>,
}

impl TryFrom<Vec<FilterStageConfig>> for FilterPipeline {
    type Error = FilterError;

    fn try_from(stages: Vec<FilterStageConfig>) -> Result<Self, Self::Error> {
        Self::from_stages(stages)
    }
}

impl From<FilterPipeline> for Vec<FilterStageConfig> {
    fn from(pipeline: FilterPipeline) -> Self {
        pipeline.stages
    }
}

fn check_index(index: usize, len: usize) -> Result<(), FilterError> {
    if index < len {
        Ok(())
    } else {
        Err(FilterError::NoSuchStage { index, len })
    }
}

impl FilterPipeline {
    /// Empty pipeline (renders the original unchanged)
    pub fn new() -> Self {
        Self::default()
    }

    /// Pipeline from a stage list, rejecting any invalid stage
    pub fn from_stages(stages: Vec<FilterStageConfig>) -> Result<Self, FilterError> {
        for stage in &stages {
            stage.validate()?;
        }
        Ok(Self { stages })
    }

    pub fn stages(&self) -> &[FilterStageConfig] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Pipeline that would result from `edit`, leaving `self` untouched
    pub fn edited(&self, edit: &PipelineEdit) -> Result<Self, FilterError> {
        let mut stages = self.stages.clone();
        let len = stages.len();

        match edit {
            PipelineEdit::ReplaceAll { stages: new } => return Self::from_stages(new.clone()),
            PipelineEdit::Insert { index, stage } => {
                if *index > len {
                    return Err(FilterError::NoSuchStage { index: *index, len });
                }
                stage.validate()?;
                stages.insert(*index, stage.clone());
            }
            PipelineEdit::Remove { index } => {
                check_index(*index, len)?;
                stages.remove(*index);
            }
            PipelineEdit::Move { from, to } => {
                check_index(*from, len)?;
                check_index(*to, len)?;
                let stage = stages.remove(*from);
                stages.insert(*to, stage);
            }
            PipelineEdit::SetEnabled { index, enabled } => {
                check_index(*index, len)?;
                stages[*index].enabled = *enabled;
            }
            PipelineEdit::SetParams { index, params } => {
                check_index(*index, len)?;
                let expected = stages[*index].kind();
                if params.kind() != expected {
                    return Err(FilterError::KindMismatch {
                        index: *index,
                        expected: expected.name(),
                        found: params.kind().name(),
                    });
                }
                params.validate()?;
                stages[*index].params = params.clone();
            }
        }

        Ok(Self { stages })
    }

    /// Apply `edit` in place; on error the pipeline is unchanged
    pub fn apply_edit(&mut self, edit: &PipelineEdit) -> Result<(), FilterError> {
        *self = self.edited(edit)?;
        Ok(())
    }

    /// Run the enabled stages in order over a copy of `original`
    pub fn render(&self, original: &RgbImage) -> RgbImage {
        let mut image = original.clone();
        for stage in self.stages.iter().filter(|s| s.enabled) {
            image = stage.params.apply(&image);
        }
        debug!(
            stages = self.stages.len(),
            enabled = self.stages.iter().filter(|s| s.enabled).count(),
            "Rendered pipeline"
        );
        image
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn bc(brightness: f64, contrast: f64) -> FilterStageConfig {
        FilterStageConfig::brightness_contrast(brightness, contrast)
    }

    fn cast() -> RgbImage {
        RgbImage::from_pixel(2, 2, Rgb([240, 120, 60]))
    }

    #[test]
    fn test_stage_order_changes_the_result() {
        let wb_last =
            FilterPipeline::from_stages(vec![bc(0.0, 2.0), FilterStageConfig::white_balance()])
                .unwrap();
        let mut wb_first = wb_last.clone();
        wb_first
            .apply_edit(&PipelineEdit::Move { from: 1, to: 0 })
            .unwrap();

        assert_eq!(wb_last.render(&cast()).get_pixel(0, 0), &Rgb([123, 123, 0]));
        assert_eq!(wb_first.render(&cast()).get_pixel(0, 0), &Rgb([153, 153, 153]));
    }

    #[test]
    fn test_disabled_stages_are_skipped_but_kept() {
        let mut pipeline = FilterPipeline::from_stages(vec![bc(50.0, 1.0)]).unwrap();
        pipeline
            .apply_edit(&PipelineEdit::SetEnabled {
                index: 0,
                enabled: false,
            })
            .unwrap();
        assert_eq!(pipeline.len(), 1);
        assert_eq!(pipeline.render(&cast()), cast());
    }

    #[test]
    fn test_invalid_edit_leaves_pipeline_unchanged() {
        let mut pipeline = FilterPipeline::from_stages(vec![bc(10.0, 1.0)]).unwrap();
        let before = pipeline.clone();

        let err = pipeline
            .apply_edit(&PipelineEdit::SetParams {
                index: 0,
                params: FilterParams::BrightnessContrast {
                    brightness: 0.0,
                    contrast: -1.0,
                },
            })
            .unwrap_err();
        assert!(matches!(err, FilterError::InvalidParameter { .. }));
        assert_eq!(pipeline, before);

        let err = pipeline
            .apply_edit(&PipelineEdit::ReplaceAll {
                stages: vec![FilterStageConfig::white_balance(), bc(0.0, 9.0)],
            })
            .unwrap_err();
        assert!(matches!(err, FilterError::InvalidParameter { .. }));
        assert_eq!(pipeline, before);
    }

    #[test]
    fn test_index_and_kind_checks() {
        let mut pipeline = FilterPipeline::new();
        assert_eq!(
            pipeline.apply_edit(&PipelineEdit::Remove { index: 0 }),
            Err(FilterError::NoSuchStage { index: 0, len: 0 })
        );
        pipeline
            .apply_edit(&PipelineEdit::Insert {
                index: 0,
                stage: FilterStageConfig::clahe(2.0, 8),
            })
            .unwrap();
        assert!(matches!(
            pipeline.apply_edit(&PipelineEdit::Insert {
                index: 5,
                stage: FilterStageConfig::white_balance(),
            }),
            Err(FilterError::NoSuchStage { index: 5, len: 1 })
        ));
        assert!(matches!(
            pipeline.apply_edit(&PipelineEdit::SetParams {
                index: 0,
                params: FilterParams::WhiteBalance,
            }),
            Err(FilterError::KindMismatch { .. })
        ));
    }

    #[test]
    fn test_render_never_mutates_original() {
        let original = cast();
        let pipeline = FilterPipeline::from_stages(vec![
            bc(30.0, 1.5),
            FilterStageConfig::clahe(3.0, 2),
            FilterStageConfig::white_balance(),
        ])
        .unwrap();
        let first = pipeline.render(&original);
        let second = pipeline.render(&original);
        assert_eq!(first, second);
        assert_eq!(original, cast());
    }

    #[test]
    fn test_deserializing_invalid_stage_fails() {
        let ok: FilterPipeline =
            serde_json::from_str(r#"[{"kind": "white_balance"}]"#).unwrap();
        assert_eq!(ok.len(), 1);
        assert!(
            serde_json::from_str::<FilterPipeline>(r#"[{"kind": "clahe", "grid_size": 0}]"#)
                .is_err()
        );
    }
}
