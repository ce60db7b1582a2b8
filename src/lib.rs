pub mod entity;
pub mod error;
pub mod quorum;
pub mod service;
pub mod status;
pub mod store;
