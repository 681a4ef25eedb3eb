use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error as _};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DimensionError {
    #[error("Unknown {dimension} code: {code}")]
    UnknownCode { dimension: &'static str, code: u8 },
    #[error("Unknown {dimension} label: {label}")]
    UnknownLabel {
        dimension: &'static str,
        label: String,
    },
}

/// Config files may name a level either by label or by its integer code
#[derive(Deserialize)]
#[serde(untagged)]
enum LevelRepr {
    Code(u8),
    Label(String),
}

/// Declares a configuration dimension: the integer code handed to the
/// `machine` binary, the label used in paths and logs, and the chart tick label.
macro_rules! dimension {
    (
        $(#[$meta:meta])*
        $name:ident, $dim:literal,
        { $($variant:ident = $code:literal => $label:literal, $tick:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn code(self) -> u8 {
                match self {
                    $($name::$variant => $code),+
                }
            }

            pub fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }

            pub fn tick_label(self) -> &'static str {
                match self {
                    $($name::$variant => $tick),+
                }
            }
        }

        impl TryFrom<u8> for $name {
            type Error = DimensionError;

            fn try_from(code: u8) -> Result<Self, Self::Error> {
                match code {
                    $($code => Ok($name::$variant),)+
                    _ => Err(DimensionError::UnknownCode { dimension: $dim, code }),
                }
            }
        }

        impl FromStr for $name {
            type Err = DimensionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($label => Ok($name::$variant),)+
                    _ => Err(DimensionError::UnknownLabel {
                        dimension: $dim,
                        label: s.to_owned(),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.label())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                match LevelRepr::deserialize(deserializer)? {
                    LevelRepr::Code(code) => $name::try_from(code).map_err(D::Error::custom),
                    LevelRepr::Label(label) => label.parse().map_err(D::Error::custom),
                }
            }
        }
    };
}

dimension!(
    /// Storage tiers the benchmark runs on
    HierarchyType, "hierarchy", {
        Nvm = 1 => "nvm", "NVM",
        DramNvm = 2 => "dram-nvm", "DRAM-NVM",
        DramDisk = 3 => "dram-disk", "DRAM-SSD",
        NvmDisk = 4 => "nvm-disk", "NVM-SSD",
        DramNvmDisk = 5 => "dram-nvm-disk", "DRAM-NVM-SSD",
    }
);

dimension!(
    DiskModeType, "disk mode", {
        Ssd = 1 => "ssd", "SSD",
        Hdd = 2 => "hdd", "HDD",
    }
);

dimension!(
    /// Working-set size class
    SizeType, "size", {
        Size1 = 1 => "size-1", "A",
        Size2 = 2 => "size-2", "B",
        Size3 = 3 => "size-3", "C",
        Size4 = 4 => "size-4", "D",
    }
);

dimension!(
    /// Capacity ratio between adjacent tiers
    SizeRatioType, "size ratio", {
        Ratio1 = 1 => "ratio-1", "R1",
        Ratio2 = 2 => "ratio-2", "R2",
        Ratio3 = 3 => "ratio-3", "R3",
        Ratio4 = 4 => "ratio-4", "R4",
    }
);

dimension!(
    /// NVM read/write latency relative to DRAM
    LatencyType, "latency", {
        Latency1 = 1 => "1", "1x-1x",
        Latency2 = 2 => "2", "2x-4x",
        Latency3 = 3 => "3", "4x-10x",
        Latency4 = 4 => "4", "10x-20x",
    }
);

dimension!(
    /// Cache replacement policy
    CachingType, "caching", {
        Fifo = 1 => "fifo", "FIFO",
        Lfu = 2 => "lfu", "LFU",
        Lru = 3 => "lru", "LRU",
    }
);

dimension!(
    /// Workload trace replayed by the benchmark
    TraceType, "trace", {
        Tpcc = 1 => "tpcc", "TPCC",
        Ycsb = 2 => "ycsb", "YCSB",
        Voter = 3 => "voter", "VOTER",
        YcsbRead = 4 => "ycsb-read", "YCSB-READ",
        YcsbInsert = 5 => "ycsb-insert", "YCSB-INSERT",
        ChBenchmark = 6 => "chbenchmark", "CHBENCHMARK",
        AuctionMark = 7 => "auctionmark", "AUCTIONMARK",
        SmallBank = 8 => "smallbank", "SMALLBANK",
    }
);

impl HierarchyType {
    /// Whether the hierarchy ends in a disk tier
    pub fn has_disk(self) -> bool {
        matches!(
            self,
            HierarchyType::DramDisk | HierarchyType::NvmDisk | HierarchyType::DramNvmDisk
        )
    }
}

/// A dimension a sweep can vary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Dimension {
    Hierarchy,
    DiskMode,
    Size,
    SizeRatio,
    Latency,
    Caching,
}

impl Dimension {
    pub fn name(self) -> &'static str {
        match self {
            Dimension::Hierarchy => "hierarchy",
            Dimension::DiskMode => "disk_mode",
            Dimension::Size => "size",
            Dimension::SizeRatio => "size_ratio",
            Dimension::Latency => "latency",
            Dimension::Caching => "caching",
        }
    }
}

/// One value of one [`Dimension`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Hierarchy(HierarchyType),
    DiskMode(DiskModeType),
    Size(SizeType),
    SizeRatio(SizeRatioType),
    Latency(LatencyType),
    Caching(CachingType),
}

impl Level {
    pub fn dimension(self) -> Dimension {
        match self {
            Level::Hierarchy(_) => Dimension::Hierarchy,
            Level::DiskMode(_) => Dimension::DiskMode,
            Level::Size(_) => Dimension::Size,
            Level::SizeRatio(_) => Dimension::SizeRatio,
            Level::Latency(_) => Dimension::Latency,
            Level::Caching(_) => Dimension::Caching,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Level::Hierarchy(v) => v.code(),
            Level::DiskMode(v) => v.code(),
            Level::Size(v) => v.code(),
            Level::SizeRatio(v) => v.code(),
            Level::Latency(v) => v.code(),
            Level::Caching(v) => v.code(),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Level::Hierarchy(v) => v.label(),
            Level::DiskMode(v) => v.label(),
            Level::Size(v) => v.label(),
            Level::SizeRatio(v) => v.label(),
            Level::Latency(v) => v.label(),
            Level::Caching(v) => v.label(),
        }
    }

    pub fn tick_label(self) -> &'static str {
        match self {
            Level::Hierarchy(v) => v.tick_label(),
            Level::DiskMode(v) => v.tick_label(),
            Level::Size(v) => v.tick_label(),
            Level::SizeRatio(v) => v.tick_label(),
            Level::Latency(v) => v.tick_label(),
            Level::Caching(v) => v.tick_label(),
        }
    }
}

/// One concrete assignment of every dimension for a single benchmark run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigPoint {
    pub trace: TraceType,
    pub hierarchy: HierarchyType,
    pub disk_mode: DiskModeType,
    pub size: SizeType,
    pub size_ratio: SizeRatioType,
    pub latency: LatencyType,
    pub caching: CachingType,
}

impl Default for ConfigPoint {
    fn default() -> Self {
        Self {
            trace: TraceType::Tpcc,
            hierarchy: HierarchyType::Nvm,
            disk_mode: DiskModeType::Ssd,
            size: SizeType::Size2,
            size_ratio: SizeRatioType::Ratio4,
            latency: LatencyType::Latency2,
            caching: CachingType::Lru,
        }
    }
}

impl ConfigPoint {
    pub fn level(&self, dimension: Dimension) -> Level {
        match dimension {
            Dimension::Hierarchy => Level::Hierarchy(self.hierarchy),
            Dimension::DiskMode => Level::DiskMode(self.disk_mode),
            Dimension::Size => Level::Size(self.size),
            Dimension::SizeRatio => Level::SizeRatio(self.size_ratio),
            Dimension::Latency => Level::Latency(self.latency),
            Dimension::Caching => Level::Caching(self.caching),
        }
    }

    pub fn set(&mut self, level: Level) {
        match level {
            Level::Hierarchy(v) => self.hierarchy = v,
            Level::DiskMode(v) => self.disk_mode = v,
            Level::Size(v) => self.size = v,
            Level::SizeRatio(v) => self.size_ratio = v,
            Level::Latency(v) => self.latency = v,
            Level::Caching(v) => self.caching = v,
        }
    }

    pub fn with(mut self, level: Level) -> Self {
        self.set(level);
        self
    }
}

impl fmt::Display for ConfigPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "trace_type: {} caching_type: {} size_type: {} size_ratio_type: {} latency_type: {} disk_mode_type: {} hierarchy_type: {}",
            self.trace,
            self.caching,
            self.size,
            self.size_ratio,
            self.latency,
            self.disk_mode,
            self.hierarchy
        )
    }
}
