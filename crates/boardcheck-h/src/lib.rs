pub mod backend;
pub mod cdp;
mod inject;

pub use backend::HeadlessBackend;
