pub mod init;
pub mod serve;
pub mod version;

pub use init::Init;
pub use serve::Serve;
pub use version::Version;
