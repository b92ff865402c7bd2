//! The embedded Silverlight client binary. The original connector
//! `#include`s a generated `xap.h` byte array at build time; we do the
//! same with `include_bytes!` over a checked-in placeholder blob, since
//! the real Silverlight client package is an external asset outside
//! this repository.

pub static XAP_BYTES: &[u8] = include_bytes!("xap.bin");
