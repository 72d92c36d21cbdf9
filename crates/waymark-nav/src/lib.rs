pub mod corridor;
pub mod course;
pub mod doctor;
pub mod error;
pub mod feedback;
pub mod geo;
pub mod gnss;
pub mod nav;
pub mod route;
pub mod runner;
pub mod sensor;

pub use error::NavError;
pub use nav::{NavEngine, NavOutput, NavParams, Progress};
