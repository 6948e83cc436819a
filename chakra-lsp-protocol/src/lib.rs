pub mod handlers;

pub use handlers::{CompletionContext, Handlers};
