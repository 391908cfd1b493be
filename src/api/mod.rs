pub mod admin;
pub mod communities;
pub mod feed;
pub mod groups;
pub mod messages;
pub mod subgroups;
pub mod uploads;
pub mod users;
