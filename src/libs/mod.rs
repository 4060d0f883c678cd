pub mod anchor;
pub mod chaining;
pub mod compare;
pub mod genome;
pub mod io;
pub mod nt;
pub mod pool;
pub mod tree;
