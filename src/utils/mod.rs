pub mod db_utils;
pub mod geo;
pub mod params;
pub mod patrol_throttle;
pub mod qr;
pub mod window;
