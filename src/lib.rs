pub mod catalog;
pub mod config;
pub mod error;
pub mod events;
pub mod pipeline;
pub mod router;
pub mod session;
pub mod testkit;
pub mod tasks {
    pub mod driver;
    pub mod signals;
    pub mod window;
}
