//! Mode-specific image cleanup ahead of recognition.

use super::filters;
use crate::TextType;
use image::{DynamicImage, GrayImage};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PreprocessMode {
    Standard,
    Historical,
    Handwriting,
    LowQuality,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    Denoise { strength: f32 },
    Clahe { clip_limit: f32, tiles: (u32, u32) },
    Close { kernel: (u32, u32) },
    Bilateral { diameter: u32, sigma_color: f64, sigma_space: f64 },
    Sharpen,
    AdaptiveThreshold { block: u32, offset: i32 },
    OtsuThreshold,
}

const STANDARD_STEPS: &[Step] = &[
    Step::Denoise { strength: 10.0 },
    Step::AdaptiveThreshold { block: 11, offset: 2 },
];

const HISTORICAL_STEPS: &[Step] = &[
    Step::Clahe {
        clip_limit: 3.0,
        tiles: (8, 8),
    },
    Step::Denoise { strength: 15.0 },
    Step::Close { kernel: (2, 2) },
    Step::AdaptiveThreshold { block: 15, offset: 5 },
];

const HANDWRITING_STEPS: &[Step] = &[
    Step::Denoise { strength: 20.0 },
    Step::Clahe {
        clip_limit: 4.0,
        tiles: (4, 4),
    },
    Step::Bilateral {
        diameter: 9,
        sigma_color: 75.0,
        sigma_space: 75.0,
    },
    Step::OtsuThreshold,
    Step::Close { kernel: (1, 1) },
];

const LOW_QUALITY_STEPS: &[Step] = &[
    Step::Denoise { strength: 25.0 },
    Step::Sharpen,
    Step::Clahe {
        clip_limit: 3.0,
        tiles: (8, 8),
    },
    Step::AdaptiveThreshold { block: 11, offset: 2 },
];

impl PreprocessMode {
    /// Steps applied in order to the grayscale image.
    pub fn steps(self) -> &'static [Step] {
        match self {
            PreprocessMode::Standard => STANDARD_STEPS,
            PreprocessMode::Historical => HISTORICAL_STEPS,
            PreprocessMode::Handwriting => HANDWRITING_STEPS,
            PreprocessMode::LowQuality => LOW_QUALITY_STEPS,
        }
    }
}

impl From<TextType> for PreprocessMode {
    fn from(text_type: TextType) -> Self {
        match text_type {
            TextType::Standard => PreprocessMode::Standard,
            TextType::Historical => PreprocessMode::Historical,
            TextType::Handwriting => PreprocessMode::Handwriting,
        }
    }
}

impl Step {
    pub fn apply(&self, gray: &GrayImage) -> GrayImage {
        match *self {
            Step::Denoise { strength } => filters::nl_means_denoise(gray, strength),
            Step::Clahe { clip_limit, tiles } => filters::clahe(gray, clip_limit, tiles.0, tiles.1),
            Step::Close { kernel } => filters::morph_close(gray, kernel.0, kernel.1),
            Step::Bilateral {
                diameter,
                sigma_color,
                sigma_space,
            } => filters::bilateral(gray, diameter, sigma_color, sigma_space),
            Step::Sharpen => filters::sharpen(gray),
            Step::AdaptiveThreshold { block, offset } => {
                filters::adaptive_threshold_gaussian(gray, block, offset)
            }
            Step::OtsuThreshold => filters::otsu_threshold(gray),
        }
    }
}

/// Converts to grayscale and runs the mode's steps. Output is binary (0/255)
/// and keeps the input dimensions.
pub fn preprocess(image: &DynamicImage, mode: PreprocessMode) -> GrayImage {
    mode.steps()
        .iter()
        .fold(image.to_luma8(), |gray, step| step.apply(&gray))
}
