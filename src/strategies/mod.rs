pub mod htf_bias;

pub use htf_bias::{BiasService, BiasVoter, FixedBias, LaneVote};
