/// Pipeline lifecycle of a chunk. The ordering is load-bearing: neighbor
/// gating compares states, and a chunk only ever moves forward.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChunkState {
    AdjacencyGenerationPending = 0,
    InternalLightGenerationPending = 1,
    LightPropagationPending = 2,
    FullLightConnectivityPending = 3,
    Complete = 4,
}

impl ChunkState {
    pub fn from_u8(v: u8) -> ChunkState {
        match v {
            0 => ChunkState::AdjacencyGenerationPending,
            1 => ChunkState::InternalLightGenerationPending,
            2 => ChunkState::LightPropagationPending,
            3 => ChunkState::FullLightConnectivityPending,
            _ => ChunkState::Complete,
        }
    }

    pub fn next(self) -> Option<ChunkState> {
        match self {
            ChunkState::AdjacencyGenerationPending => {
                Some(ChunkState::InternalLightGenerationPending)
            }
            ChunkState::InternalLightGenerationPending => Some(ChunkState::LightPropagationPending),
            ChunkState::LightPropagationPending => Some(ChunkState::FullLightConnectivityPending),
            ChunkState::FullLightConnectivityPending => Some(ChunkState::Complete),
            ChunkState::Complete => None,
        }
    }
}
