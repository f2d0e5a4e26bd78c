//! Padding for the final Reed-Solomon sub-block.
//!
//! The last sub-block of a partial payload group is padded to the 128-byte
//! codec boundary with the classical scheme where every pad byte equals the
//! pad length, and an already-aligned block gains a whole new 128-byte block.
//!
//! Unpadding is deliberately tolerant: a pad length of zero, a pad length
//! over 128, or an input shorter than one full block is treated as "no
//! padding" and the input is returned unchanged. Corrupted trailing blocks
//! must degrade into garbage output (caught by the payload MAC), never into
//! a panic.

use crate::config::RS_DATA_SIZE;

/// Pads `data` up to the next [`RS_DATA_SIZE`] boundary.
#[must_use]
pub fn pad(data: &[u8]) -> Vec<u8> {
    let pad_len = RS_DATA_SIZE - (data.len() % RS_DATA_SIZE);
    let mut padded = Vec::with_capacity(data.len() + pad_len);
    padded.extend_from_slice(data);
    padded.resize(data.len() + pad_len, pad_len as u8);
    padded
}

/// Removes padding applied by [`pad`], returning the original prefix.
///
/// Inputs that cannot carry valid padding are returned unchanged.
#[must_use]
pub fn unpad(data: &[u8]) -> &[u8] {
    if data.len() < RS_DATA_SIZE {
        return data;
    }
    let pad_len = match data.last() {
        Some(&last) => last as usize,
        None => return data,
    };
    if pad_len == 0 || pad_len > RS_DATA_SIZE || pad_len > data.len() {
        return data;
    }
    &data[..data.len() - pad_len]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_short_inputs() {
        for len in 0..=RS_DATA_SIZE {
            let data: Vec<u8> = (0..len).map(|i| i as u8).collect();
            let padded = pad(&data);
            assert_eq!(padded.len() % RS_DATA_SIZE, 0);
            assert_eq!(unpad(&padded), &data[..]);
        }
    }

    #[test]
    fn aligned_input_gains_full_block() {
        let data = [7u8; RS_DATA_SIZE];
        let padded = pad(&data);
        assert_eq!(padded.len(), 2 * RS_DATA_SIZE);
        assert!(padded[RS_DATA_SIZE..].iter().all(|&b| b == RS_DATA_SIZE as u8));
        assert_eq!(unpad(&padded), &data[..]);
    }

    #[test]
    fn unpad_tolerates_garbage() {
        // Too short to carry padding.
        let short = [3u8; 12];
        assert_eq!(unpad(&short), &short[..]);

        // Pad length of zero.
        let mut zero_tail = vec![1u8; RS_DATA_SIZE];
        zero_tail[RS_DATA_SIZE - 1] = 0;
        assert_eq!(unpad(&zero_tail), &zero_tail[..]);

        // Pad length beyond the block size.
        let mut oversized = vec![1u8; RS_DATA_SIZE];
        oversized[RS_DATA_SIZE - 1] = 200;
        assert_eq!(unpad(&oversized), &oversized[..]);
    }
}
