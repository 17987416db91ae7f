//! Bit packing helpers shared by the OT engines
//!
//! Bits are packed least significant bit first: bit `i` lives in byte
//! `i / 8` at position `i % 8`.

/// Number of bytes needed to hold `bits` bits
pub fn packed_len(bits: usize) -> usize {
    (bits + 7) / 8
}

/// Pack bits into bytes, LSB first
pub fn pack(bits: &[bool]) -> Vec<u8> {
    let mut out = vec![0u8; packed_len(bits.len())];
    for (i, bit) in bits.iter().enumerate() {
        if *bit {
            out[i / 8] |= 1 << (i % 8);
        }
    }
    out
}

/// Read bit `index` of a packed buffer
pub fn get_bit(bytes: &[u8], index: usize) -> bool {
    (bytes[index / 8] >> (index % 8)) & 1 == 1
}

/// XOR `other` into `acc`; both must have the same length
pub fn xor_inplace(acc: &mut [u8], other: &[u8]) {
    debug_assert_eq!(acc.len(), other.len());
    for (a, b) in acc.iter_mut().zip(other) {
        *a ^= b;
    }
}

/// Turn `columns` (each holding at least `rows` bits) into `rows` packed rows
///
/// Row `j` has bit `i` set iff column `i` has bit `j` set.
pub fn transpose(columns: &[Vec<u8>], rows: usize) -> Vec<Vec<u8>> {
    let width = packed_len(columns.len());
    let mut out = vec![vec![0u8; width]; rows];
    for (i, column) in columns.iter().enumerate() {
        for (j, row) in out.iter_mut().enumerate() {
            if get_bit(column, j) {
                row[i / 8] |= 1 << (i % 8);
            }
        }
    }
    out
}
