pub mod server;

pub use server::ChakraLanguageServer;
