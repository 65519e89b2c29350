pub mod analytics;
pub mod core;
pub mod leads;
pub mod main_module;
