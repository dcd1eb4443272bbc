//! Composition root: the handles every connection and dispatcher call
//! shares. Constructed once in `main` and cloned (cheaply, via `Arc`) into
//! each socket task.

use std::sync::Arc;

use rand::RngCore;

use crate::infrastructure::config::AppConfig;
use crate::infrastructure::ports::{ClockPort, PersistencePort, RandomPort};
use crate::party::registry::Registry;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PersistencePort>,
    pub clock: Arc<dyn ClockPort>,
    pub random: Arc<dyn RandomPort>,
    pub config: Arc<AppConfig>,
    pub registry: Arc<Registry>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn PersistencePort>,
        clock: Arc<dyn ClockPort>,
        random: Arc<dyn RandomPort>,
        config: AppConfig,
    ) -> Self {
        Self {
            store,
            clock,
            random,
            config: Arc::new(config),
            registry: Arc::new(Registry::new()),
        }
    }

    /// A `rand::Rng` adapter over the injected [`RandomPort`] — the Dice
    /// Engine's `roll_die`/`evaluate_with_rng`/`resolve_multi_die_attack`
    /// all take `impl Rng`, so every roll goes through the same seam tests
    /// substitute `FixedRandom` for.
    pub fn random_rng(&self) -> PortRng<'_> {
        PortRng(self.random.as_ref())
    }
}

/// Bridges the engine's [`RandomPort`] seam to `rand::RngCore` so dice-engine
/// functions written against `impl Rng` can draw from it directly.
pub struct PortRng<'a>(&'a dyn RandomPort);

impl RngCore for PortRng<'_> {
    fn next_u32(&mut self) -> u32 {
        self.0.gen_range(i32::MIN, i32::MAX) as u32
    }

    fn next_u64(&mut self) -> u64 {
        let hi = self.next_u32() as u64;
        let lo = self.next_u32() as u64;
        (hi << 32) | lo
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = self.next_u32().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}
