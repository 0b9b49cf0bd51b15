pub mod manifest;
pub mod net;
pub mod paths;
pub mod progress;
