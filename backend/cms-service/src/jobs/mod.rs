/// Background jobs
pub mod scheduled_publisher;
