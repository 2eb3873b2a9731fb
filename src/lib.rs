pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod notifications;
pub mod payments;
pub mod pricing;
pub mod repository;
pub mod service;
