// Template module - named, persisted watermark configurations
mod store;
mod types;

pub use store::TemplateStore;
pub use types::*;
