pub mod join_request;
pub mod membership;
pub mod notification;
pub mod record;
pub mod time_entry;
