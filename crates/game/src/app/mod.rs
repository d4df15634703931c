mod bootstrap;
mod loop_runner;
mod plaza_scene;
mod profile_worker;
mod room_layout;

pub(crate) use bootstrap::build_app;
pub(crate) use loop_runner::run;
