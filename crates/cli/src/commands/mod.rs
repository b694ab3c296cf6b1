pub mod build;
pub mod deploy;
pub mod migrate;
pub mod serve;
pub mod test;
pub mod version;
