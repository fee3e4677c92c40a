#![no_main]

use libfuzzer_sys::fuzz_target;
use psx_core::{
    decode_region, disassemble, validate_alignment, AccessKind, AccessWidth, CoreConfig, Decoder,
    Instruction, Psx,
};

const TICKS_PER_INPUT: u64 = 256;

fuzz_target!(|data: &[u8]| {
    if data.len() < 8 {
        return;
    }

    let addr = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    let _ = decode_region(addr);
    let _ = validate_alignment(addr, AccessWidth::Halfword, AccessKind::Load);
    let _ = validate_alignment(addr, AccessWidth::Word, AccessKind::Store);

    let mut bios = vec![0u8; 512 * 1024];
    let program = &data[4..data.len().min(4 + bios.len())];
    bios[..program.len()].copy_from_slice(program);

    for chunk in program.chunks_exact(4) {
        let word = Instruction(u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
        let _ = Decoder::decode(word);
        let _ = disassemble(0xBFC0_0000, word);
    }

    let config = CoreConfig {
        vblank_interval_ticks: 64,
        ..CoreConfig::default()
    };
    let Ok(mut psx) = Psx::new(&bios, config) else {
        return;
    };
    psx.run(TICKS_PER_INPUT);

    let state = psx.save_state();
    let mut replay = psx.clone();
    assert!(replay.load_state(&state).is_ok());
    assert_eq!(replay.save_state(), state);
});
