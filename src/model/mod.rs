pub mod attendance;
pub mod guard;
pub mod patrol;
pub mod premise;
pub mod role;
pub mod shift;
pub mod user;
