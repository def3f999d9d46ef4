/// Key tag of a DNSKEY (RFC 4034 Appendix B), computed over its wire rdata.
pub fn calculate_key_tag(flags: u16, protocol: u8, algorithm: u8, public_key: &[u8]) -> u16 {
    // RSAMD5 keys use the low 16 bits of the modulus
    if algorithm == 1 {
        return match public_key {
            [.., hi, lo] => u16::from_be_bytes([*hi, *lo]),
            _ => 0,
        };
    }

    let [f0, f1] = flags.to_be_bytes();
    let header = [f0, f1, protocol, algorithm];

    let mut accumulator: u32 = header
        .iter()
        .chain(public_key)
        .enumerate()
        .map(|(i, &byte)| {
            if i % 2 == 0 {
                u32::from(byte) << 8
            } else {
                u32::from(byte)
            }
        })
        .sum();

    accumulator += accumulator >> 16;
    (accumulator & 0xFFFF) as u16
}
