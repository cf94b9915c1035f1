//! Multi-link session layer: connection table, bounded guard, event queue
//! and the manager that ties them to the radio transports.

pub mod guard;
pub mod manager;
pub mod queue;
pub mod table;

pub use guard::Guard;
pub use manager::{BroadcastReport, DeviceName, ReceiveHandler, SessionManager};
pub use queue::{Direction, EventQueue, QueuedMessage};
pub use table::{ConnectionTable, LinkInfo, LinkSlot, LinkState, SlotIndex};
