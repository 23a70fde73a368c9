pub mod attendance;
pub mod classes;
pub mod core;
pub mod enrollment;
pub mod requests;
pub mod students;
