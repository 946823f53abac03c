use super::filters::{canny, intensity_variance};
use crate::TextType;
use image::{DynamicImage, GrayImage};

pub const CANNY_LOW_THRESHOLD: f32 = 50.0;
pub const CANNY_HIGH_THRESHOLD: f32 = 150.0;
pub const HANDWRITING_MIN_EDGE_DENSITY: f64 = 0.15;
pub const HANDWRITING_MIN_VARIANCE: f64 = 2000.0;
pub const HISTORICAL_MAX_VARIANCE: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageStatistics {
    /// Fraction of pixels that are Canny edges, 0-1.
    pub edge_density: f64,
    pub variance: f64,
}

impl ImageStatistics {
    pub fn measure(gray: &GrayImage) -> Self {
        let total = gray.as_raw().len();
        let edge_density = if total == 0 {
            0.0
        } else {
            let edges = canny(gray, CANNY_LOW_THRESHOLD, CANNY_HIGH_THRESHOLD);
            let edge_pixels = edges.as_raw().iter().filter(|&&value| value > 0).count();
            edge_pixels as f64 / total as f64
        };

        Self {
            edge_density,
            variance: intensity_variance(gray),
        }
    }

    pub fn text_type(&self) -> TextType {
        if self.edge_density > HANDWRITING_MIN_EDGE_DENSITY && self.variance > HANDWRITING_MIN_VARIANCE {
            TextType::Handwriting
        } else if self.variance < HISTORICAL_MAX_VARIANCE {
            TextType::Historical
        } else {
            TextType::Standard
        }
    }
}

/// Labels an image as standard print, historical print or handwriting.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextTypeClassifier;

impl TextTypeClassifier {
    pub fn classify(&self, image: &DynamicImage) -> TextType {
        let gray = image.to_luma8();
        let stats = ImageStatistics::measure(&gray);
        let text_type = stats.text_type();
        tracing::debug!(
            edge_density = stats.edge_density,
            variance = stats.variance,
            ?text_type,
            "classified page image"
        );
        text_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn stats(edge_density: f64, variance: f64) -> ImageStatistics {
        ImageStatistics {
            edge_density,
            variance,
        }
    }

    #[test]
    fn thresholds_decide_text_type() {
        assert_eq!(stats(0.2, 2500.0).text_type(), TextType::Handwriting);
        assert_eq!(stats(0.2, 1500.0).text_type(), TextType::Standard);
        assert_eq!(stats(0.05, 500.0).text_type(), TextType::Historical);
        assert_eq!(stats(0.3, 999.0).text_type(), TextType::Historical);
        assert_eq!(stats(0.15, 2500.0).text_type(), TextType::Standard);
        assert_eq!(stats(0.01, 1000.0).text_type(), TextType::Standard);
    }

    #[test]
    fn uniform_image_is_historical() {
        let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(32, 32, Luma([200])));
        assert_eq!(TextTypeClassifier.classify(&image), TextType::Historical);
    }

    #[test]
    fn sparse_high_contrast_blocks_are_standard() {
        // Two large flat halves: high variance, few edge pixels.
        let gray = GrayImage::from_fn(64, 64, |x, _| Luma([if x < 32 { 0 } else { 255 }]));
        let measured = ImageStatistics::measure(&gray);
        assert!(measured.edge_density < HANDWRITING_MIN_EDGE_DENSITY);
        assert!(measured.variance > HANDWRITING_MIN_VARIANCE);
        assert_eq!(
            TextTypeClassifier.classify(&DynamicImage::ImageLuma8(gray)),
            TextType::Standard
        );
    }

    #[test]
    fn dense_thin_strokes_are_handwriting() {
        let gray = GrayImage::from_fn(64, 64, |x, _| Luma([if x % 4 == 0 { 0 } else { 255 }]));
        let measured = ImageStatistics::measure(&gray);
        assert!(measured.edge_density > HANDWRITING_MIN_EDGE_DENSITY);
        assert_eq!(measured.text_type(), TextType::Handwriting);
    }
}
