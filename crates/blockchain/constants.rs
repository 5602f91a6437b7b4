pub const WEI_PER_GWEI: u64 = 1_000_000_000;

/// Static block rewards before the merge, in ether.
pub const FRONTIER_BLOCK_REWARD: u64 = 5;
pub const BYZANTIUM_BLOCK_REWARD: u64 = 3;
pub const CONSTANTINOPLE_BLOCK_REWARD: u64 = 2;

/// Ommers a pre-merge block may include.
pub const MAX_OMMERS: usize = 2;
/// How many generations back an ommer may branch off.
pub const MAX_OMMER_DEPTH: u64 = 6;
