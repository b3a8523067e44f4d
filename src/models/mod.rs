// Domain models: snapshot tree, attribute paths, stored records

mod path;
mod record;
mod value;

pub use path::{AttributePath, MAX_SEGMENTS, MIN_SEGMENTS};
pub use record::{FlatLeaf, FlatValue, Record, encode_snapshot, flatten, unflatten};
pub use value::{Scalar, Snapshot, Value, mapping, resolve};
