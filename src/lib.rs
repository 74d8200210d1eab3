pub mod api;
pub mod audit;
pub mod config;
pub mod credential;
pub mod engine;
pub mod handshake;
pub mod io;
pub mod probe;
pub mod report;
pub mod sentence;
pub mod signal;
pub mod stats;

pub mod prelude {
    pub use crate::credential::{Credential, Target};
    pub use crate::probe::{LoginProbe, Method, Outcome};
}
