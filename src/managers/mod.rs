pub mod ledger;
pub mod link;
pub mod mirror;
pub mod poll;
pub mod results;
pub mod session;
pub mod timer;
