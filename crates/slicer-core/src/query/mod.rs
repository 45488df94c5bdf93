pub mod calls;
pub mod guards;
pub mod references;
