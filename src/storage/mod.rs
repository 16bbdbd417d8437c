pub mod cache;
pub mod codec;
pub mod engine;
pub mod memory;

pub use cache::{CacheStore, MemoryCache};
pub use codec::{Codec, ContentCodec, JsonCodec, MessagePackCodec};
pub use engine::{EntityKey, StorageEngine};
pub use memory::MemoryEngine;
