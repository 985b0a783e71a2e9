pub mod arxiv;

pub use arxiv::{ArxivClient, ArxivClientConfig};
