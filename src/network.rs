pub mod address_book;
pub mod memory;
pub mod tcp;
pub mod topology;
pub mod transport;

pub use address_book::AddressBook;
pub use memory::{Frame, MemoryNetwork, MemoryTransport};
pub use tcp::TcpTransport;
pub use topology::Topology;
pub use transport::{Subscription, Transport};
