pub mod broker;
pub mod device;
