#![forbid(unsafe_code)]

pub mod error;
pub mod model;
pub mod stream;
pub mod time;

pub use error::Error;
pub use stream::{
    ContentDelta, StreamCompletion, StreamDecoder, StreamEnd, StreamPhase, Utf8Decoder,
};
pub use time::Clock;
