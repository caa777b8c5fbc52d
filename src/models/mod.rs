pub mod dependency;
pub mod ledger;
pub mod message;
pub mod plan;
pub mod review_packet;
pub mod task;
pub mod worker;

pub use dependency::*;
pub use ledger::*;
pub use message::*;
pub use plan::*;
pub use review_packet::*;
pub use task::*;
pub use worker::*;
