const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Derives an instrument's random-stream seed from the run's base seed.
///
/// 64-bit FNV-1a over the base seed's little-endian bytes followed by the
/// instrument id, so the result is stable across runs, platforms and thread
/// scheduling.
pub fn instrument_seed(base_seed: u64, instrument: &str) -> u64 {
    base_seed
        .to_le_bytes()
        .iter()
        .chain(instrument.as_bytes())
        .fold(FNV_OFFSET_BASIS, |hash, byte| (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME))
}
