//! CLI Commands

mod analyze;
mod authorize;
mod context;
mod decrypt;
mod demo;
mod init;
mod records;
mod status;
mod submit;

pub use analyze::AnalyzeCommand;
pub use authorize::AuthorizeCommand;
pub use decrypt::DecryptCommand;
pub use demo::DemoCommand;
pub use init::InitCommand;
pub use records::RecordsCommand;
pub use status::StatusCommand;
pub use submit::SubmitCommand;
