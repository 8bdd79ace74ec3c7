#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Interpret the input as u16 register stream in big-endian pairs
    let regs: Vec<u16> = data
        .chunks_exact(2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .collect();

    // Status decoding must reject unknown codes, never panic
    if let Ok(code) = chargerkit::modbus::decode_u16(&regs) {
        let _ = chargerkit::charger::etrel::status_from_code(code);
    }
    let _ = chargerkit::modbus::decode_32bit_float(&regs);
    let _ = chargerkit::modbus::decode_u64(&regs);
    let _ = chargerkit::modbus::decode_string(&regs, Some(20));
});
