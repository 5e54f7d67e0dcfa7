//! Block CRC-32 used by the Femtomes binary logs.
//!
//! This is the reflected CRC-32 polynomial without pre/post inversion: the register
//! starts at the caller's seed and is returned as is, so a frame checksum is computed
//! in two chained stages (header with seed 0, then payload seeded with the header CRC).

const CRC32_POLYNOMIAL: u32 = 0xedb8_8320;

/// Runs the 8 shift/xor steps for the low byte of `icrc`.
const fn crc32_value(icrc: u32) -> u32 {
    let mut crc = icrc;
    let mut i = 0;
    while i < 8 {
        if crc & 1 != 0 {
            crc = (crc >> 1) ^ CRC32_POLYNOMIAL;
        } else {
            crc >>= 1;
        }
        i += 1;
    }
    crc
}

/// Folds every byte of `buffer` into the CRC register, starting from `crc`.
pub const fn calculate_block_crc32(buffer: &[u8], crc: u32) -> u32 {
    let mut crc = crc;
    let mut i = 0;
    while i < buffer.len() {
        crc = ((crc >> 8) & 0x00ff_ffff) ^ crc32_value((crc ^ buffer[i] as u32) & 0xff);
        i += 1;
    }
    crc
}

/// Streaming form of [`calculate_block_crc32`], chaining every `update` call
#[derive(Default, Debug, Clone, Copy)]
pub(crate) struct FrameCrc {
    crc: u32,
}

impl FrameCrc {
    pub(crate) const fn new() -> Self {
        Self { crc: 0 }
    }

    pub(crate) const fn update(&mut self, bytes: &[u8]) {
        self.crc = calculate_block_crc32(bytes, self.crc);
    }

    pub(crate) const fn result(self) -> u32 {
        self.crc
    }

    pub(crate) const fn is_valid(self, received: u32) -> bool {
        self.crc == received
    }
}

/// Two-stage frame checksum: header bytes first, then the payload.
pub(crate) const fn frame_crc(header: &[u8], payload: &[u8]) -> u32 {
    let mut calc = FrameCrc::new();
    calc.update(header);
    calc.update(payload);
    calc.result()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_buffer_keeps_seed() {
        assert_eq!(calculate_block_crc32(&[], 0), 0);
        assert_eq!(calculate_block_crc32(&[], 0xdead_beef), 0xdead_beef);
    }

    #[test]
    fn test_single_byte_matches_table_entry() {
        // Entry 1 of the classic reflected CRC-32 table
        assert_eq!(calculate_block_crc32(&[0x01], 0), 0x7707_3096);
        assert_eq!(calculate_block_crc32(&[0x00], 0), 0);
    }

    #[test]
    fn test_check_string() {
        assert_eq!(calculate_block_crc32(b"123456789", 0), 0x2dfd_2d88);
    }

    #[test]
    fn test_chained_stages_equal_single_pass() {
        let data = b"header bytes then payload bytes";
        let (header, payload) = data.split_at(12);
        let chained = calculate_block_crc32(payload, calculate_block_crc32(header, 0));
        assert_eq!(chained, calculate_block_crc32(data, 0));
        assert_eq!(frame_crc(header, payload), chained);
    }

    #[test]
    fn test_streaming_in_chunks() {
        let data: Vec<u8> = (0..=255).collect();
        let mut calc = FrameCrc::new();
        for chunk in data.chunks(7) {
            calc.update(chunk);
        }
        assert!(calc.is_valid(calculate_block_crc32(&data, 0)));
        assert!(!calc.is_valid(calculate_block_crc32(&data[1..], 0)));
    }

    // Compute checksum at compile time
    #[test]
    fn test_const_checksum_computation() {
        const _: () = {
            assert!(calculate_block_crc32(&[0x01], 0) == 0x7707_3096);
        };
    }
}
