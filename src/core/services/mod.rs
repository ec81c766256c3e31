pub mod publisher_service;
pub mod query_service;
pub mod subscriber_service;
pub mod topic;
