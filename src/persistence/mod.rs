pub mod snapshot;
pub mod store;

pub use snapshot::{
    decode, decode_text, encode, encode_text, SaveError, SaveMetadata, SaveSnapshot,
    FORMAT_VERSION,
};
pub use store::{sanitize_name, SaveStore};
