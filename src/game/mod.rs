pub mod event;
pub mod quiz;
pub mod scoreboard;
pub mod timer;
pub mod user;
