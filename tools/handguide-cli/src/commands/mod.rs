pub mod calibrate;
pub mod check;
pub mod config;
pub mod link;
pub mod run;
pub mod serial;
pub mod validate;
