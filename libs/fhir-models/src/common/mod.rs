//! Version-agnostic FHIR instance types
//!
//! Types that work across every registered model generation

pub mod bundle;
pub mod element;
pub mod error;
pub mod id;
pub mod reference;
pub mod resource;

// Re-export commonly used types
pub use bundle::*;
pub use element::*;
pub use error::{Error, Result};
pub use id::*;
pub use reference::*;
pub use resource::*;
