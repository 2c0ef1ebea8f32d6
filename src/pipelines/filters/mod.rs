// SPDX-License-Identifier: GPL-3.0-only

//! Image enhancement filter stages
//!
//! Every stage is a pure `RgbImage -> RgbImage` transform that keeps the
//! image dimensions. Parameters are validated before a stage is ever applied;
//! see [`FilterParams::validate`].
//!
//! | kind | parameters |
//! |---|---|
//! | `brightness_contrast` | `brightness` -255..=255, `contrast` 0..=3 |
//! | `clahe` | `clip_limit` 1..=40, `grid_size` 1..=64 |
//! | `white_balance` | none (gray world) |

pub mod brightness_contrast;
pub mod clahe;
pub mod white_balance;

use crate::constants::filters as ranges;
use crate::errors::FilterError;
use image::RgbImage;
use serde::{Deserialize, Serialize};

/// The three stage kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    BrightnessContrast,
    Clahe,
    WhiteBalance,
}

impl FilterKind {
    /// All kinds in display order
    pub const ALL: [FilterKind; 3] = [
        FilterKind::BrightnessContrast,
        FilterKind::Clahe,
        FilterKind::WhiteBalance,
    ];

    /// Identifier used in serialized configs and error messages
    pub fn name(&self) -> &'static str {
        match self {
            FilterKind::BrightnessContrast => "brightness_contrast",
            FilterKind::Clahe => "clahe",
            FilterKind::WhiteBalance => "white_balance",
        }
    }

    /// Parameters a freshly added stage of this kind starts with
    pub fn default_params(&self) -> FilterParams {
        match self {
            FilterKind::BrightnessContrast => FilterParams::BrightnessContrast {
                brightness: ranges::BRIGHTNESS_DEFAULT,
                contrast: ranges::CONTRAST_DEFAULT,
            },
            FilterKind::Clahe => FilterParams::Clahe {
                clip_limit: ranges::CLIP_LIMIT_DEFAULT,
                grid_size: ranges::GRID_SIZE_DEFAULT,
            },
            FilterKind::WhiteBalance => FilterParams::WhiteBalance,
        }
    }
}

impl std::fmt::Display for FilterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

fn default_brightness() -> f64 {
    ranges::BRIGHTNESS_DEFAULT
}

fn default_contrast() -> f64 {
    ranges::CONTRAST_DEFAULT
}

fn default_clip_limit() -> f64 {
    ranges::CLIP_LIMIT_DEFAULT
}

fn default_grid_size() -> u32 {
    ranges::GRID_SIZE_DEFAULT
}

/// Kind plus its parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterParams {
    BrightnessContrast {
        #[serde(default = "default_brightness")]
        brightness: f64,
        #[serde(default = "default_contrast")]
        contrast: f64,
    },
    Clahe {
        #[serde(default = "default_clip_limit")]
        clip_limit: f64,
        #[serde(default = "default_grid_size")]
        grid_size: u32,
    },
    WhiteBalance,
}

fn check_range(
    stage: &'static str,
    name: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<(), FilterError> {
    // NaN fails both comparisons, so test for the valid case
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(FilterError::InvalidParameter {
            stage,
            name,
            value,
            min,
            max,
        })
    }
}

impl FilterParams {
    pub fn kind(&self) -> FilterKind {
        match self {
            FilterParams::BrightnessContrast { .. } => FilterKind::BrightnessContrast,
            FilterParams::Clahe { .. } => FilterKind::Clahe,
            FilterParams::WhiteBalance => FilterKind::WhiteBalance,
        }
    }

    /// Reject out-of-range or non-finite parameters
    pub fn validate(&self) -> Result<(), FilterError> {
        let stage = self.kind().name();
        match *self {
            FilterParams::BrightnessContrast {
                brightness,
                contrast,
            } => {
                check_range(
                    stage,
                    "brightness",
                    brightness,
                    ranges::BRIGHTNESS_MIN,
                    ranges::BRIGHTNESS_MAX,
                )?;
                check_range(
                    stage,
                    "contrast",
                    contrast,
                    ranges::CONTRAST_MIN,
                    ranges::CONTRAST_MAX,
                )
            }
            FilterParams::Clahe {
                clip_limit,
                grid_size,
            } => {
                check_range(
                    stage,
                    "clip_limit",
                    clip_limit,
                    ranges::CLIP_LIMIT_MIN,
                    ranges::CLIP_LIMIT_MAX,
                )?;
                check_range(
                    stage,
                    "grid_size",
                    grid_size as f64,
                    ranges::GRID_SIZE_MIN as f64,
                    ranges::GRID_SIZE_MAX as f64,
                )
            }
            FilterParams::WhiteBalance => Ok(()),
        }
    }

    /// Apply the transform; parameters must already be validated
    pub fn apply(&self, image: &RgbImage) -> RgbImage {
        match *self {
            FilterParams::BrightnessContrast {
                brightness,
                contrast,
            } => brightness_contrast::apply(image, brightness, contrast),
            FilterParams::Clahe {
                clip_limit,
                grid_size,
            } => clahe::apply(image, clip_limit, grid_size),
            FilterParams::WhiteBalance => white_balance::apply(image),
        }
    }
}

fn enabled_default() -> bool {
    true
}

/// One entry of a record's filter pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterStageConfig {
    /// Disabled stages stay in the list but are skipped when rendering
    #[serde(default = "enabled_default")]
    pub enabled: bool,
    #[serde(flatten)]
    pub params: FilterParams,
}

impl FilterStageConfig {
    /// Enabled stage with the given parameters
    pub fn new(params: FilterParams) -> Self {
        Self {
            enabled: true,
            params,
        }
    }

    pub fn brightness_contrast(brightness: f64, contrast: f64) -> Self {
        Self::new(FilterParams::BrightnessContrast {
            brightness,
            contrast,
        })
    }

    pub fn clahe(clip_limit: f64, grid_size: u32) -> Self {
        Self::new(FilterParams::Clahe {
            clip_limit,
            grid_size,
        })
    }

    pub fn white_balance() -> Self {
        Self::new(FilterParams::WhiteBalance)
    }

    pub fn kind(&self) -> FilterKind {
        self.params.kind()
    }

    pub fn validate(&self) -> Result<(), FilterError> {
        self.params.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contrast_below_zero_is_rejected() {
        let err = FilterStageConfig::brightness_contrast(0.0, -1.0)
            .validate()
            .unwrap_err();
        assert!(matches!(
            err,
            FilterError::InvalidParameter {
                name: "contrast",
                ..
            }
        ));
    }

    #[test]
    fn test_non_finite_parameters_are_rejected() {
        assert!(
            FilterStageConfig::brightness_contrast(f64::NAN, 1.0)
                .validate()
                .is_err()
        );
        assert!(
            FilterStageConfig::clahe(f64::INFINITY, 8)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_range_bounds_are_inclusive() {
        assert!(
            FilterStageConfig::brightness_contrast(-255.0, 3.0)
                .validate()
                .is_ok()
        );
        assert!(FilterStageConfig::clahe(40.0, 64).validate().is_ok());
        assert!(FilterStageConfig::clahe(1.0, 1).validate().is_ok());
        assert!(FilterStageConfig::clahe(0.5, 8).validate().is_err());
        assert!(FilterStageConfig::clahe(2.0, 0).validate().is_err());
        assert!(FilterStageConfig::clahe(2.0, 65).validate().is_err());
    }

    #[test]
    fn test_defaults_are_valid() {
        for kind in FilterKind::ALL {
            assert!(kind.default_params().validate().is_ok(), "{}", kind);
            assert_eq!(kind.default_params().kind(), kind);
        }
    }

    #[test]
    fn test_stage_json_layout() {
        let stage = FilterStageConfig::clahe(2.0, 8);
        let json = serde_json::to_value(&stage).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"enabled": true, "kind": "clahe", "clip_limit": 2.0, "grid_size": 8})
        );

        let parsed: FilterStageConfig =
            serde_json::from_str(r#"{"kind": "brightness_contrast", "brightness": 20}"#).unwrap();
        assert!(parsed.enabled);
        assert_eq!(
            parsed.params,
            FilterParams::BrightnessContrast {
                brightness: 20.0,
                contrast: 1.0
            }
        );

        let wb: FilterStageConfig =
            serde_json::from_str(r#"{"kind": "white_balance", "enabled": false}"#).unwrap();
        assert_eq!(wb, FilterStageConfig {
            enabled: false,
            params: FilterParams::WhiteBalance
        });
    }
}
