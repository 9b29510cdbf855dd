//! Application layer with the optimization pipeline and its services.

/// Pipeline services.
pub mod services;
/// Use case implementations.
pub mod use_cases;

pub use services::{
    MetadataManager, NegativeResultCache, Normalized, ObjectCache, Redirect, RequestCoalescer,
    RewriteRules, Transcoder, UrlNormalizer,
};
pub use use_cases::OptimizeImageUseCase;
