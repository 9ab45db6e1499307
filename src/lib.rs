//! A terminal fleet dashboard built around one configurable smart table.

pub mod columns;
pub mod controller;
pub mod display;
pub mod domain;
pub mod export;
pub mod filter;
pub mod fleet;
pub mod inputter;
pub mod loader;
pub mod model;
pub mod prefs;
pub mod record;
pub mod selection;
pub mod table;
pub mod ui;
pub mod view;
