//! Request middleware and extractors

mod identity;

pub use identity::CurrentWorker;
