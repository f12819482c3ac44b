// Drive-control runtime for a four-wheel mecanum base
pub mod config;
pub mod drive;
pub mod error;
pub mod io;
pub mod messages;
pub mod runtime;
pub mod transport;
