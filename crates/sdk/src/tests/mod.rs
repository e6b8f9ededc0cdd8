//! Scenario tests over in-memory nodes

mod channel;
mod commit;
mod mock;
