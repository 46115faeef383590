pub mod cache;
pub mod emitter;
pub mod generation;
pub mod mapper;
pub mod nested;
pub mod pipeline;
pub mod resolver;

pub use cache::ExtractionCache;
pub use generation::{DEFAULT_OUT_DIR, GenerateOptions, GeneratedFile, Generation, generate};
pub use mapper::{GeneratedPosition, to_generated, to_source};
pub use nested::Extraction;
