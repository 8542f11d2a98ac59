//! Deterministic bucketing of visitors.

pub trait Sharder {
    /// Map `input` onto `0..total_shards`. Must return the same shard for the same input.
    fn get_shard(&self, input: impl AsRef<[u8]>, total_shards: u64) -> u64;
}

/// The default sharder. Takes the first four bytes of the md5 digest as a big-endian integer.
pub struct Md5Sharder;

impl Sharder for Md5Sharder {
    fn get_shard(&self, input: impl AsRef<[u8]>, total_shards: u64) -> u64 {
        let hash = md5::compute(input);
        let value = u32::from_be_bytes([hash[0], hash[1], hash[2], hash[3]]);
        u64::from(value) % total_shards
    }
}

#[cfg(test)]
pub(crate) struct FixedSharder(pub u64);

#[cfg(test)]
impl Sharder for FixedSharder {
    fn get_shard(&self, _input: impl AsRef<[u8]>, total_shards: u64) -> u64 {
        self.0 % total_shards
    }
}
