pub mod decoders;
pub mod fetch;
pub mod session;
