//! Restores legacy TCVN3 (".VnTime") Vietnamese text in tabular data to Unicode.
//!
//! Offline, [`mapping::MapBuilder`] turns loosely structured reference tables into a
//! [`mapping::CharacterMapping`]. At conversion time the mapping is compiled into a
//! [`transduce::Transducer`] and [`convert::ConversionOrchestrator`] applies it to every cell of a
//! [`convert::Grid`] that [`classify::is_already_unicode`] does not accept as Unicode.

pub mod classify;
pub mod config;
pub mod convert;
pub mod error;
pub mod mapping;
pub mod progress;
pub mod repair;
pub mod textutil;
pub mod transduce;

pub use classify::is_already_unicode;
pub use convert::{
    ConversionLogEntry, ConversionOptions, ConversionOrchestrator, ConversionStats, Grid,
    SkipSelection,
};
pub use error::{Error, Result};
pub use mapping::{CharacterMapping, MapBuilder};
pub use transduce::Transducer;
