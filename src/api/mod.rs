pub mod allocate;
pub mod attendance;
pub mod dashboard;
pub mod guard;
pub mod patrol;
pub mod premise;
pub mod shift;
