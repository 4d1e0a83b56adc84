pub mod dispatcher;
pub mod query;
pub mod queue;
pub mod workflow;
