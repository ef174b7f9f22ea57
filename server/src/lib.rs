pub mod auth;
pub mod config;
pub mod db;
pub mod environment;
pub mod errors;
pub mod io;
pub mod media;
pub mod moderation;
pub mod normalization;
pub mod profile;
pub mod registrant;
pub mod registration;
pub mod routes;
pub mod saga;
pub mod store;
pub mod urls;
pub mod validation;
