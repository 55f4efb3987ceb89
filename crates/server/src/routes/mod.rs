pub mod artifacts;
pub mod billing;
pub mod clients;
pub mod credits;
pub mod health;
pub mod leads;
pub mod messages;
pub mod projects;
pub mod publish;
pub mod tools;
