pub mod chunker;
pub mod gate;
pub mod pipeline;
pub mod pool;
pub mod tools;
