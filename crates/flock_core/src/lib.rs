pub mod bird;
pub mod episode;
pub mod fitness;
pub mod io;
pub mod mask;
pub mod pipe;
pub mod policy;
pub mod rng;
pub mod trainer;
