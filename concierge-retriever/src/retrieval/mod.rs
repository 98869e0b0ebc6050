pub mod corpus_index;
pub mod indexer;
pub mod loader;
pub mod retriever;
