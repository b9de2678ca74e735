use crc::{CRC_32_ISO_HDLC, Crc};

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// The DFU suffix checksum: the standard CRC-32 with its final inversion
/// undone, as stored in `dwCRC`.
pub fn dfu_crc(bytes: &[u8]) -> u32 {
    !CRC32.checksum(bytes)
}
