pub mod normalizer;

pub use normalizer::{
    dedup_normalize, generate_variations, reduce_query, search_filter_normalize,
};
