mod ws_transport;

pub use ws_transport::{
    INBOUND_QUEUE_CAPACITY, MAX_MESSAGE_SIZE, READ_TIMEOUT, SignalTransport, TransportReader,
    WRITE_TIMEOUT,
};
