//! CRM Insights API Library
//!
//! A CRM backend for leads, contacts, deals, notes and users, with rule-based
//! lead scoring, hot/warm/cold categorization, canned email drafting and
//! lexicon-based sentiment analysis.
//!
//! # Modules
//!
//! - `api`: Router construction and API docs.
//! - `core`: The pure rule engine (scoring, categorization, sentiment, email, access).
//! - `access`: Roles, permissions and the access policy.
//! - `ai_handlers`: HTTP handlers for the AI endpoints.
//! - `auth`: Bearer token authentication.
//! - `categorization`: Hot/warm/cold categorization and recommended actions.
//! - `config`: Configuration management.
//! - `db`: Database connection and pool management.
//! - `db_storage`: Database storage operations.
//! - `email_generator`: Email template rendering.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP handlers for leads, contacts, deals, notes and users.
//! - `models`: Database rows and API payloads.
//! - `scoring`: Lead scoring rules.
//! - `sentiment`: Lexicon-based sentiment analysis.
//! - `services`: Runs the rule engine against stored leads.

pub mod api;
pub mod core;

pub mod access;
pub mod ai_handlers;
pub mod auth;
pub mod categorization;
pub mod config;
pub mod db;
pub mod db_storage;
pub mod email_generator;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod scoring;
pub mod sentiment;
pub mod services;
