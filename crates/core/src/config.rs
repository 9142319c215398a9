//! Simulator configuration (spec §6 "Configuration keys").
//!
//! One `serde`-deserializable struct per key group, exactly the flat
//! enumeration spec.md gives, in the shape of the teacher's `config.rs`: a
//! private `defaults` module of named constants backing `#[serde(default =
//! ...)]` on every field, so a config file only needs to name the keys it
//! wants to override. Loading a config file from disk (TOML/JSON parsing,
//! `--config` flag wiring) is external (§1's "configuration loading"
//! Non-goal); this module only defines the shape and validates it.

use serde::Deserialize;

use crate::common::{CoreError, FaultKind};

mod defaults {
    pub const BPU_ADVANCED: bool = false;
    pub const BPU_INDEX_BITS: u32 = 4;
    pub const BPU_INIT_COUNTER: u8 = 0;

    pub const CACHE_SETS: usize = 4;
    pub const CACHE_WAYS: usize = 2;
    pub const CACHE_LINE_SIZE: usize = 4;
    pub const CACHE_HIT_CYCLES: u32 = 1;
    pub const CACHE_MISS_CYCLES: u32 = 10;

    pub const MEMORY_WRITE_CYCLES: u32 = 1;
    pub const MEMORY_FAULT_CYCLES: u32 = 1;

    pub const FRONTEND_MAX_QUEUE_LENGTH: usize = 5;

    pub const RESERVATION_STATION_SLOTS: usize = 8;
    pub const RESERVATION_STATION_REGISTERS: usize = 32;
}

/// Which replacement policy a cache uses (§6 `Cache.replacement_policy`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReplacementPolicyKind {
    /// Random replacement.
    #[default]
    Rr,
    /// Least-recently-used.
    Lru,
    /// First-in-first-out.
    Fifo,
}

impl std::str::FromStr for ReplacementPolicyKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "RR" => Ok(Self::Rr),
            "LRU" => Ok(Self::Lru),
            "FIFO" => Ok(Self::Fifo),
            other => Err(CoreError::UnknownReplacementPolicy(other.to_owned())),
        }
    }
}

/// `BPU.*` — branch predictor shape (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BpuConfig {
    /// `BPU.advanced`: `false` selects the single-counter simple predictor,
    /// `true` selects the `2^index_bits`-entry indexed predictor.
    pub advanced: bool,
    /// `BPU.index_bits`: `k` for the indexed predictor. Unused if `!advanced`.
    pub index_bits: u32,
    /// `BPU.init_counter`: initial bimodal counter state, `0..=3`.
    pub init_counter: u8,
}

impl Default for BpuConfig {
    fn default() -> Self {
        Self {
            advanced: defaults::BPU_ADVANCED,
            index_bits: defaults::BPU_INDEX_BITS,
            init_counter: defaults::BPU_INIT_COUNTER,
        }
    }
}

impl BpuConfig {
    /// Validates `init_counter` is in range and, if indexed, `index_bits` is
    /// nonzero-sized (`2^index_bits` must be representable and nonzero).
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.init_counter > 3 {
            return Err(CoreError::InvalidConfig {
                field: "BPU.init_counter",
                reason: format!("must be in 0..=3, got {}", self.init_counter),
            });
        }
        if self.advanced && self.index_bits == 0 {
            return Err(CoreError::InvalidConfig {
                field: "BPU.index_bits",
                reason: "must be at least 1 for the indexed predictor".to_owned(),
            });
        }
        Ok(())
    }
}

/// `Cache.*` — tagged-cache shape and timing (§3 "Cache", §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// `Cache.sets`.
    pub sets: usize,
    /// `Cache.ways`.
    pub ways: usize,
    /// `Cache.line_size`, in bytes.
    pub line_size: usize,
    /// `Cache.cache_hit_cycles`.
    pub cache_hit_cycles: u32,
    /// `Cache.cache_miss_cycles`.
    pub cache_miss_cycles: u32,
    /// `Cache.replacement_policy`.
    pub replacement_policy: ReplacementPolicyKind,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            sets: defaults::CACHE_SETS,
            ways: defaults::CACHE_WAYS,
            line_size: defaults::CACHE_LINE_SIZE,
            cache_hit_cycles: defaults::CACHE_HIT_CYCLES,
            cache_miss_cycles: defaults::CACHE_MISS_CYCLES,
            replacement_policy: ReplacementPolicyKind::default(),
        }
    }
}

/// `Memory.*` — backing-store timing (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// `Memory.num_write_cycles`.
    pub num_write_cycles: u32,
    /// `Memory.num_fault_cycles`.
    pub num_fault_cycles: u32,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            num_write_cycles: defaults::MEMORY_WRITE_CYCLES,
            num_fault_cycles: defaults::MEMORY_FAULT_CYCLES,
        }
    }
}

/// `Microprograms.<kind>` — filename of assembly to inject on fault of that
/// kind, or `None` (§4.1, §6). Resolving the filename to parsed instructions
/// is external (the assembler lives in `specsim-cli`); this struct only
/// carries the user's intent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MicroprogramConfig {
    /// Injected on a `Load` fault.
    pub load: Option<String>,
    /// Injected on a `Store` fault.
    pub store: Option<String>,
    /// Injected on a `Branch` misprediction.
    pub branch: Option<String>,
}

impl MicroprogramConfig {
    /// The configured filename for the given fault kind, if any.
    #[must_use]
    pub fn filename_for(&self, kind: FaultKind) -> Option<&str> {
        match kind {
            FaultKind::Load => self.load.as_deref(),
            FaultKind::Store => self.store.as_deref(),
            FaultKind::Branch => self.branch.as_deref(),
        }
    }
}

/// `Frontend.*` — front-end queue shape (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FrontendConfig {
    /// `Frontend.max_queue_length`, default 5.
    pub max_queue_length: usize,
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self { max_queue_length: defaults::FRONTEND_MAX_QUEUE_LENGTH }
    }
}

/// `ReservationStation.*` — engine sizing (§3 "Reservation-Station Slot").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReservationStationConfig {
    /// `ReservationStation.slots`, default 8.
    pub slots: usize,
    /// `ReservationStation.registers`, default 32.
    pub registers: usize,
}

impl Default for ReservationStationConfig {
    fn default() -> Self {
        Self {
            slots: defaults::RESERVATION_STATION_SLOTS,
            registers: defaults::RESERVATION_STATION_REGISTERS,
        }
    }
}

/// The full, flat configuration surface of §6, assembled into one
/// deserializable tree.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Branch predictor configuration.
    pub bpu: BpuConfig,
    /// Cache configuration.
    pub cache: CacheConfig,
    /// Backing-store timing configuration.
    pub memory: MemoryConfig,
    /// Front-end queue configuration.
    pub frontend: FrontendConfig,
    /// Reservation-station sizing.
    pub reservation_station: ReservationStationConfig,
    /// Per-fault-kind microprogram filenames.
    pub microprogram: MicroprogramConfig,
}

impl Config {
    /// Validates every nested config group, returning the first error found.
    /// `ReservationStation.registers` must be exactly
    /// [`crate::regfile::NUM_REGISTERS`] (spec §3: "fixed 32 entries"), and
    /// `slots` must be nonzero.
    pub fn validate(&self) -> Result<(), CoreError> {
        self.bpu.validate()?;

        if self.reservation_station.slots == 0 {
            return Err(CoreError::InvalidConfig {
                field: "ReservationStation.slots",
                reason: "must be at least 1".to_owned(),
            });
        }
        if self.reservation_station.registers != crate::regfile::NUM_REGISTERS {
            return Err(CoreError::InvalidConfig {
                field: "ReservationStation.registers",
                reason: format!("the register file is fixed at {} entries", crate::regfile::NUM_REGISTERS),
            });
        }
        if self.frontend.max_queue_length == 0 {
            return Err(CoreError::InvalidConfig {
                field: "Frontend.max_queue_length",
                reason: "must be at least 1".to_owned(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, FaultKind, MicroprogramConfig};

    #[test]
    fn default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn register_count_is_pinned_to_the_fixed_file_size() {
        let mut config = Config::default();
        config.reservation_station.registers = 16;
        assert!(config.validate().is_err());
    }

    #[test]
    fn microprogram_lookup_is_per_fault_kind() {
        let config = MicroprogramConfig {
            load: Some("mitigate_load.asm".to_owned()),
            store: None,
            branch: None,
        };
        assert_eq!(config.filename_for(FaultKind::Load), Some("mitigate_load.asm"));
        assert_eq!(config.filename_for(FaultKind::Store), None);
    }
}
