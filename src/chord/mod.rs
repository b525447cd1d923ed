pub mod id;
pub mod node;
pub mod workers;

use std::time::Duration;

// Number of bits in the identifier circle (SHA-1 digest width).
pub const KEY_SIZE: usize = 160;

// A FindSuccessor chain that delegates this many times is considered lost.
pub const MAX_LOOKUP_STEPS: u32 = 32;

pub const DEFAULT_PORT: u16 = 3410;
pub const DEFAULT_SUCCESSOR_LIST_SIZE: usize = 20;

// Deadline for calls issued by the ring-maintenance machinery.
pub const RPC_TIMEOUT: Duration = Duration::from_secs(5);
// Deadline for calls issued on behalf of an interactive user.
pub const CLIENT_RPC_TIMEOUT: Duration = Duration::from_secs(1);
