pub mod geom;
pub mod interaction;
pub mod interp;
pub mod net;
pub mod pool;
pub mod predictor;
pub mod profile;
pub mod session;
pub mod world;
