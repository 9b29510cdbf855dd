//! Use case implementations.

mod optimize_image_use_case;

pub use optimize_image_use_case::OptimizeImageUseCase;
