pub mod comment;
pub mod config;
pub mod db;
pub mod error;
pub mod form;
pub mod listing;
pub mod middleware;
pub mod orm;
pub mod policy;
pub mod post;
pub mod session;
pub mod site_time;
pub mod template;
pub mod upload;
pub mod url;
pub mod user;
pub mod web;
