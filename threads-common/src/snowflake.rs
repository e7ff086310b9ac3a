//! Time-ordered 64 bit ids.
//!
//! From the most significant bit a snowflake holds 42 bits of milliseconds
//! since the epoch, a 5 bit worker id, a 5 bit process id and a 12 bit
//! sequence number. Comparing two snowflakes numerically therefore compares
//! their creation times first.

use derive_where::derive_where;
use std::{
    fmt::{Display, Formatter},
    marker::PhantomData,
};
use thiserror::Error;
use time::{Duration, UtcDateTime};

pub const TIMESTAMP_BITS: u32 = 42;
pub const WORKER_ID_BITS: u32 = 5;
pub const PROCESS_ID_BITS: u32 = 5;
pub const SEQUENCE_BITS: u32 = 12;

const PROCESS_ID_SHIFT: u32 = SEQUENCE_BITS;
const WORKER_ID_SHIFT: u32 = PROCESS_ID_SHIFT + PROCESS_ID_BITS;
const TIMESTAMP_SHIFT: u32 = WORKER_ID_SHIFT + WORKER_ID_BITS;

const fn mask(bits: u32) -> u64 {
    (1 << bits) - 1
}

pub trait Epoch {
    const EPOCH_TIME: UtcDateTime;
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
pub enum SnowflakeError {
    #[error("Specified time was before the snowflake epoch.")]
    BeforeEpoch,
    #[error("Specified time does not fit into the snowflake timestamp.")]
    TimestampOverflow,
}

/// The worker/process pair that keeps generators on different nodes from
/// handing out the same id.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct NodeId {
    worker_id: u8,
    process_id: u8,
}

impl NodeId {
    #[must_use]
    pub fn new(worker_id: u8, process_id: u8) -> Option<Self> {
        let fits = u64::from(worker_id) <= mask(WORKER_ID_BITS)
            && u64::from(process_id) <= mask(PROCESS_ID_BITS);

        fits.then_some(Self {
            worker_id,
            process_id,
        })
    }

    #[must_use]
    pub fn worker_id(self) -> u8 {
        self.worker_id
    }

    #[must_use]
    pub fn process_id(self) -> u8 {
        self.process_id
    }
}

#[derive_where(
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Debug,
    Default,
    Hash,
    Serialize,
    Deserialize
)]
#[serde(transparent)]
pub struct Snowflake<SnowflakeEpoch>(u64, #[serde(skip)] PhantomData<SnowflakeEpoch>);

impl<SnowflakeEpoch> Snowflake<SnowflakeEpoch> {
    #[must_use]
    pub fn new(inner: u64) -> Self {
        Self(inner, PhantomData)
    }

    fn from_parts(millis: u64, node: NodeId, sequence: u16) -> Self {
        let snowflake = (millis & mask(TIMESTAMP_BITS)) << TIMESTAMP_SHIFT
            | u64::from(node.worker_id) << WORKER_ID_SHIFT
            | u64::from(node.process_id) << PROCESS_ID_SHIFT
            | (u64::from(sequence) & mask(SEQUENCE_BITS));

        Self::new(snowflake)
    }

    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }

    /// Milliseconds since the epoch at which this id was generated.
    #[must_use]
    pub fn millis(self) -> u64 {
        self.0 >> TIMESTAMP_SHIFT
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn node(self) -> NodeId {
        NodeId {
            worker_id: ((self.0 >> WORKER_ID_SHIFT) & mask(WORKER_ID_BITS)) as u8,
            process_id: ((self.0 >> PROCESS_ID_SHIFT) & mask(PROCESS_ID_BITS)) as u8,
        }
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn sequence(self) -> u16 {
        (self.0 & mask(SEQUENCE_BITS)) as u16
    }

    #[must_use]
    pub fn created_at(self) -> UtcDateTime
    where
        SnowflakeEpoch: Epoch,
    {
        // 42 bits always fit into an i64
        SnowflakeEpoch::EPOCH_TIME + Duration::milliseconds(self.millis().cast_signed())
    }
}

impl<SnowflakeEpoch> Display for Snowflake<SnowflakeEpoch> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<SnowflakeEpoch> From<u64> for Snowflake<SnowflakeEpoch> {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

impl<SnowflakeEpoch> From<Snowflake<SnowflakeEpoch>> for u64 {
    fn from(value: Snowflake<SnowflakeEpoch>) -> Self {
        value.get()
    }
}

fn millis_since_epoch<SnowflakeEpoch: Epoch>(time: UtcDateTime) -> Result<u64, SnowflakeError> {
    let millis = (time - SnowflakeEpoch::EPOCH_TIME).whole_milliseconds();
    if millis < 0 {
        return Err(SnowflakeError::BeforeEpoch);
    }

    u64::try_from(millis)
        .ok()
        .filter(|&millis| millis <= mask(TIMESTAMP_BITS))
        .ok_or(SnowflakeError::TimestampOverflow)
}

#[derive_where(Copy, Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct SnowflakeGenerator<SnowflakeEpoch> {
    node: NodeId,
    next_sequence: u16,
    phantom_data: PhantomData<SnowflakeEpoch>,
}

impl<SnowflakeEpoch> SnowflakeGenerator<SnowflakeEpoch> {
    #[must_use]
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            next_sequence: 0,
            phantom_data: PhantomData,
        }
    }

    #[must_use]
    pub fn node(&self) -> NodeId {
        self.node
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn generate_at(
        &mut self,
        time: UtcDateTime,
    ) -> Result<Snowflake<SnowflakeEpoch>, SnowflakeError>
    where
        SnowflakeEpoch: Epoch,
    {
        let millis = millis_since_epoch::<SnowflakeEpoch>(time)?;

        let sequence = self.next_sequence;
        self.next_sequence = ((u64::from(sequence) + 1) & mask(SEQUENCE_BITS)) as u16;

        Ok(Snowflake::from_parts(millis, self.node, sequence))
    }

    pub fn generate(&mut self) -> Result<Snowflake<SnowflakeEpoch>, SnowflakeError>
    where
        SnowflakeEpoch: Epoch,
    {
        self.generate_at(UtcDateTime::now())
    }
}
