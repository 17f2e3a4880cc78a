//! Fletcher-16 running sums and check bytes.
//!
//! Every protected run on the wire (header or payload chunk) is at most 130
//! bytes, so plain 32-bit accumulators never overflow and reduction modulo
//! 255 can be deferred to the end of the run.

/// Compute the reduced Fletcher-16 sums over `data`.
///
/// Returns `(upper, lower)`, both already reduced modulo 255, with the sums
/// initialized to zero before the first byte.
pub fn fletcher16(data: &[u8]) -> (u8, u8) {
    let (lower, upper) = running_sums(data);
    ((upper % 0xff) as u8, (lower % 0xff) as u8)
}

/// Compute the two check bytes for `data`.
///
/// Appending the returned bytes to `data` makes the running Fletcher-16 over
/// the whole run evaluate to zero in both sums when initialized to zero.
pub fn fletcher16_checkbytes(data: &[u8]) -> [u8; 2] {
    let (lower, upper) = running_sums(data);
    let check0 = 0xff - ((lower + upper) % 0xff);
    let check1 = 0xff - ((lower + check0) % 0xff);
    [check0 as u8, check1 as u8]
}

/// Verify a run that already includes its trailing check bytes.
pub fn fletcher16_verify(data_and_check: &[u8]) -> bool {
    let (lower, upper) = running_sums(data_and_check);
    lower % 0xff == 0 && upper % 0xff == 0
}

fn running_sums(data: &[u8]) -> (u32, u32) {
    let mut lower: u32 = 0;
    let mut upper: u32 = 0;
    for &byte in data {
        lower += u32::from(byte);
        upper += lower;
    }
    (lower, upper)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkbytes_known_vector() {
        // The two-byte run 0x41 0x42 has lower=0x83, upper=0xC4.
        assert_eq!(fletcher16(b"AB"), (0xc4, 0x83));
        assert_eq!(fletcher16_checkbytes(b"AB"), [0xb7, 0xc4]);
    }

    #[test]
    fn test_checkbytes_make_run_verify() {
        let samples: [&[u8]; 5] = [
            b"",
            b"\x00",
            b"AB",
            b"The quick brown fox jumps over the lazy dog",
            &[0xff; 128],
        ];
        for data in samples {
            let check = fletcher16_checkbytes(data);
            let mut run = data.to_vec();
            run.extend_from_slice(&check);
            assert!(fletcher16_verify(&run), "run failed for {:02x?}", data);
            assert_eq!(fletcher16(&run), (0, 0));
        }
    }

    #[test]
    fn test_verify_rejects_corruption() {
        let mut run = b"hello world".to_vec();
        let check = fletcher16_checkbytes(&run);
        run.extend_from_slice(&check);
        assert!(fletcher16_verify(&run));

        run[3] ^= 0x01;
        assert!(!fletcher16_verify(&run));
    }

    #[test]
    fn test_largest_protected_run() {
        // Headers and chunks are never longer than 128 data bytes plus the
        // two check bytes; the worst case must not overflow the accumulators.
        let data = [0xffu8; 128];
        let check = fletcher16_checkbytes(&data);
        let mut run = data.to_vec();
        run.extend_from_slice(&check);
        assert!(fletcher16_verify(&run));
    }
}
