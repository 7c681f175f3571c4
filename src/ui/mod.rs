//! Ratatui front-end: a single student table with modal forms layered on top.
//! `app` holds the state machine, `forms` and `screens` the data each mode
//! edits, and `terminal` the crossterm event loop.

mod app;
mod forms;
mod helpers;
mod screens;
mod terminal;

pub use app::App;
pub use terminal::run_app;
