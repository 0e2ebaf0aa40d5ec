pub mod duration;
pub mod fetch;
pub mod retention;
pub mod schedule;
pub mod template;
pub mod thumbnail;
