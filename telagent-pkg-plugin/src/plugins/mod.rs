pub mod debian;
pub mod rhel;

pub use debian::DebianPlugin;
pub use rhel::RhelPlugin;
