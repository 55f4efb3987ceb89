pub mod artifact;
pub mod client;
pub mod lead;
pub mod message;
pub mod preview_token;
pub mod project;
pub mod published_website;
pub mod user_profile;
