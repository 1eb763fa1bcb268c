/// Compute the log-base-two of the next power of two: 8 -> 3, 9 -> 4.
///
pub fn ceil_log2(x: usize) -> usize {
    let mut n = 0;
    while 1 << n < x {
        n += 1
    }
    n
}

/// Concatenate a sequence of byte buffers into one, each prefixed by its
/// length as a little-endian u64.
///
pub fn pack(parts: &[Vec<u8>]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(parts.iter().map(|p| p.len() + 8).sum());

    for part in parts {
        bytes.extend_from_slice(&(part.len() as u64).to_le_bytes());
        bytes.extend_from_slice(part);
    }
    bytes
}

/// Split a buffer produced by `pack` back into its parts. A truncated
/// trailing part is dropped.
///
pub fn unpack(mut bytes: &[u8]) -> Vec<Vec<u8>> {
    let mut parts = Vec::new();

    while bytes.len() >= 8 {
        let mut size = [0; 8];
        size.copy_from_slice(&bytes[..8]);
        let size = u64::from_le_bytes(size) as usize;

        if bytes.len() - 8 < size {
            break
        }
        parts.push(bytes[8..8 + size].to_vec());
        bytes = &bytes[8 + size..];
    }
    parts
}




#[cfg(test)]
mod test {

    use super::{ceil_log2, pack, unpack};

    #[test]
    fn ceil_log2_rounds_up() {
        assert_eq!(ceil_log2(1), 0);
        assert_eq!(ceil_log2(2), 1);
        assert_eq!(ceil_log2(5), 3);
        assert_eq!(ceil_log2(8), 3);
    }

    #[test]
    fn packed_parts_are_recovered() {
        let parts = vec![vec![1, 2, 3], vec![], vec![9; 17]];
        assert_eq!(unpack(&pack(&parts)), parts);
    }
}
