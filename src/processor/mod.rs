pub mod encoder;
pub mod resizer;
pub mod sniffer;
