// Library for tests to access modules

pub mod aggregation;
pub mod config;
pub mod exporter;
pub mod models;
pub mod registry;
pub mod routes;
pub mod source;
pub mod version;
pub mod worker;
