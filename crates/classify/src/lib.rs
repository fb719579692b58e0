//! Classification-stage computations: page quality and vendor detection.
//!
//! Both are pure functions of their inputs. No network or storage access
//! happens here.

mod error;
mod quality;
mod vendor;

pub use error::ClassifyError;
pub use quality::{assess_image, validate_all_images, ImageQuality, QualityConfig, QualityReport};
pub use vendor::{Classification, ClassifierConfig, DetectionMethod, VendorClassifier, VendorRule};
