pub mod cfl;
pub mod raw;
