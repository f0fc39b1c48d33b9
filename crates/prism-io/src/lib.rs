//! prism-io: Image acquisition and export for the prism filter pipeline.
//!
//! Decodes user-supplied image bytes into a [`PixelBuffer`], enforcing
//! size and shape limits before anything reaches the pipeline, and
//! encodes results back to PNG.

pub mod export;
pub mod load;

pub use export::{encode_png, export_filename};
pub use load::{
    LoadError, MAX_ASPECT_RATIO, MAX_DIMENSION, MAX_FILE_SIZE, MIN_ASPECT_RATIO, MIN_DIMENSION,
    load_image, load_path, validate_dimensions,
};
pub use prism_pipeline::PixelBuffer;
