//! The block lifecycle: genesis, begin/deliver/end/commit, and the rank
//! boundary.

pub mod genesis;
pub mod lifecycle;
pub mod rank;

pub use genesis::{GenesisAccount, GenesisLink, GenesisState};
pub use lifecycle::{
    AppError, BlockMetadata, BlockOutcome, CortexApp, EndBlockResult, ValidatorUpdate,
};
pub use rank::{decode_score, DegreeRank, RankAlgorithm};
