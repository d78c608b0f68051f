pub mod annotations;
pub mod detector;
pub mod helper;
pub mod provider;
