pub mod crack;
pub mod extract;
pub mod hashes;
pub mod list;
pub mod streams;
pub mod validate;

pub use crack::run as crack;
pub use extract::run as extract;
pub use hashes::run as hashes;
pub use list::run as list;
pub use streams::run as streams;
pub use validate::run as validate;
