pub mod contract;
pub mod mention;
