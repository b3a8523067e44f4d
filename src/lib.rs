// Library for tests and demos to access modules

pub mod catalog;
pub mod config;
pub mod error;
pub mod journal;
pub mod maintenance;
pub mod models;
pub mod query;
pub mod routes;
pub mod sampler;
pub mod source;
pub mod store;
pub mod version;
