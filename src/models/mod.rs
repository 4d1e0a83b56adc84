pub mod match_record;
pub mod operator;
pub mod order;
pub mod page;
