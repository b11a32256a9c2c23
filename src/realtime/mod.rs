pub mod channel;
pub mod messages;
pub mod transport;

pub use channel::{ChannelEvent, ChannelEvents, ChannelState, SessionChannel};
pub use messages::{ClientEvent, ErrorDetail, ServerEvent, SessionUpdate, TurnDetection};
pub use transport::{Connector, Outbound, TransportEvent, TransportHandle, WebSocketConnector};
